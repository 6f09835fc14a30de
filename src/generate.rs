//! Text generation providers and split-point extraction.
//!
//! The crate does not drive LLM-guided chunking itself. Its only obligation
//! is to turn whatever a model answered into a usable split index, and to
//! never fail while doing so: an answer that cannot be used becomes the
//! caller's fallback, with a warning.
//!
//! Accepted answers, in order of preference:
//!
//! ```text
//! {"split_index": 3}        JSON object
//! 3                         bare integer (or JSON string "3")
//! I would split at 3.       first integer in free text
//! ```
//!
//! An index is valid when it lies in `1..candidates`: splitting before the
//! first candidate or after the last one would not split anything.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::ProviderError;

/// Anything that completes prompts.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Provider or model name, for logs.
    fn name(&self) -> &str;

    /// Complete `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Complete `prompt` as JSON. Callers deserialize the value into their
    /// own types with `serde_json::from_value`.
    ///
    /// The default parses the output of [`GenerationProvider::generate`].
    async fn generate_structured(&self, prompt: &str) -> Result<Value, ProviderError> {
        let text = self.generate(prompt).await?;
        serde_json::from_str(text.trim()).map_err(|e| ProviderError::MalformedResponse(e.to_string()))
    }
}

impl std::fmt::Debug for dyn GenerationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationProvider")
            .field("name", &self.name())
            .finish()
    }
}

/// Extract a split index from a model's answer.
///
/// Returns `fallback` (and logs a warning) when no integer can be found or
/// the integer is outside `1..candidates`. Never fails.
///
/// ```rust
/// use tranche::extract_split_index;
///
/// assert_eq!(extract_split_index(r#"{"split_index": 3}"#, 5, 1), 3);
/// assert_eq!(extract_split_index("Split after sentence 2.", 5, 1), 2);
/// assert_eq!(extract_split_index("no idea", 5, 1), 1);
/// assert_eq!(extract_split_index("7", 5, 1), 1);
/// ```
#[must_use]
pub fn extract_split_index(response: &str, candidates: usize, fallback: usize) -> usize {
    accept(parse_index(response), candidates, fallback)
}

fn parse_index(response: &str) -> Option<i64> {
    let trimmed = response.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(index) = index_from_value(&value) {
            return Some(index);
        }
    }
    first_integer(trimmed)
}

fn index_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => first_integer(s),
        Value::Object(map) => map.get("split_index").and_then(index_from_value),
        _ => None,
    }
}

fn first_integer(text: &str) -> Option<i64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits = &text[start..];
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value: i64 = digits[..end].parse().ok()?;
    Some(if text[..start].ends_with('-') { -value } else { value })
}

fn accept(parsed: Option<i64>, candidates: usize, fallback: usize) -> usize {
    let Some(index) = parsed else {
        warn!(candidates, fallback, "no split index in response, using fallback");
        return fallback;
    };
    match usize::try_from(index) {
        Ok(index) if (1..candidates).contains(&index) => index,
        _ => {
            warn!(index, candidates, fallback, "split index out of range, using fallback");
            fallback
        }
    }
}

/// Asks a [`GenerationProvider`] where to split.
///
/// Provider failures are logged and mapped to the fallback, like unusable
/// answers.
#[derive(Debug, Clone)]
pub struct SplitOracle {
    provider: Arc<dyn GenerationProvider>,
    structured: bool,
}

impl SplitOracle {
    /// Use plain-text generation.
    #[must_use]
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self {
            provider,
            structured: false,
        }
    }

    /// Use [`GenerationProvider::generate_structured`] instead.
    #[must_use]
    pub fn with_structured_output(mut self, structured: bool) -> Self {
        self.structured = structured;
        self
    }

    /// Ask for a split index among `candidates` pieces.
    pub async fn split_index(&self, prompt: &str, candidates: usize, fallback: usize) -> usize {
        let parsed = if self.structured {
            match self.provider.generate_structured(prompt).await {
                Ok(value) => index_from_value(&value),
                Err(error) => return self.provider_failed(&error, fallback),
            }
        } else {
            match self.provider.generate(prompt).await {
                Ok(text) => parse_index(&text),
                Err(error) => return self.provider_failed(&error, fallback),
            }
        };
        accept(parsed, candidates, fallback)
    }

    fn provider_failed(&self, error: &ProviderError, fallback: usize) -> usize {
        warn!(
            provider = self.provider.name(),
            %error,
            fallback,
            "generation failed, using fallback split index"
        );
        fallback
    }
}
