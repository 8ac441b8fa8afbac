/// Recognition gateway
///
/// This module defines the contract for turning a shelf photo into a list
/// of (label, count) pairs, plus its production implementation against a
/// Gemini-style `generateContent` endpoint.
///
/// # Gateway Contract
///
/// Implementations must:
/// 1. Build an instruction embedding the optional user-supplied product hint
/// 2. Send the image and instruction to the vision model
/// 3. Parse the textual response as a JSON array of `{label, count}`,
///    tolerating surrounding code-fence markers
/// 4. Fail with `RecognitionError` on transport errors or any response
///    that does not match the expected array shape — never substitute an
///    empty result for a failure
///
/// # Example
///
/// ```no_run
/// use stocklens_api::recognition::{GeminiGateway, RecognitionGateway};
/// use stocklens_api::config::RecognitionConfig;
///
/// # async fn example(image: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
/// let config = RecognitionConfig {
///     api_key: std::env::var("RECOGNITION_API_KEY")?,
///     model: "gemini-2.0-flash".to_string(),
///     base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
/// };
///
/// let gateway = GeminiGateway::new(config);
/// let items = gateway.recognize(&image, Some("bottled water")).await?;
///
/// for item in items {
///     println!("{} x{}", item.label, item.count);
/// }
/// # Ok(())
/// # }
/// ```

use crate::config::RecognitionConfig;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// One recognized product line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountedItem {
    /// Product label as reported by the model (user-editable afterwards)
    pub label: String,

    /// How many units the model counted
    pub count: i64,
}

/// Recognition error types
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    /// Network-level failure talking to the vision endpoint
    #[error("Vision endpoint request failed: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status
    #[error("Vision endpoint returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The response carried no candidate text at all
    #[error("Vision endpoint returned no content")]
    EmptyResponse,

    /// The response text did not parse as the expected array shape
    #[error("Unexpected response shape: {0}")]
    InvalidShape(String),
}

/// Recognition gateway contract
#[async_trait]
pub trait RecognitionGateway: Send + Sync {
    /// Counts products in one image
    ///
    /// # Arguments
    ///
    /// * `image` - JPEG bytes of the capture
    /// * `hint` - Optional product name supplied by the user
    ///
    /// # Errors
    ///
    /// Returns `RecognitionError` when the external call fails or the
    /// response cannot be validated against the expected shape
    async fn recognize(
        &self,
        image: &[u8],
        hint: Option<&str>,
    ) -> Result<Vec<CountedItem>, RecognitionError>;
}

/// Builds the model instruction
///
/// With a hint the model is told the product name and asked only to count;
/// without one it identifies and counts everything in frame. Either way the
/// output format is pinned to a bare JSON array.
pub fn build_instruction(hint: Option<&str>) -> String {
    let lead = match hint {
        Some(name) => format!(
            "The product is called \"{}\". Count how many there are.",
            name
        ),
        None => "Identify and count the products.".to_string(),
    };

    format!(
        "{} Return ONLY a JSON array: [{{\"label\": \"product name\", \"count\": number}}]",
        lead
    )
}

/// Strips markdown code fences the model tends to wrap around JSON
fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Raw item as the model may phrase it
///
/// Aliases cover the field names the model occasionally substitutes.
#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(alias = "product", alias = "producto", alias = "name")]
    label: String,

    #[serde(alias = "quantity", alias = "cantidad")]
    count: i64,
}

/// Validates the model's textual answer against the expected array shape
///
/// # Errors
///
/// Returns `RecognitionError::InvalidShape` when the text is not a JSON
/// array of `{label, count}` objects, a label is empty, or a count is
/// negative
pub fn parse_items(text: &str) -> Result<Vec<CountedItem>, RecognitionError> {
    let cleaned = strip_code_fences(text);

    let raw: Vec<RawItem> = serde_json::from_str(&cleaned)
        .map_err(|e| RecognitionError::InvalidShape(format!("not a {{label, count}} array: {}", e)))?;

    let mut items = Vec::with_capacity(raw.len());
    for item in raw {
        if item.label.trim().is_empty() {
            return Err(RecognitionError::InvalidShape("empty label".to_string()));
        }
        if item.count < 0 {
            return Err(RecognitionError::InvalidShape(format!(
                "negative count for \"{}\"",
                item.label
            )));
        }
        items.push(CountedItem {
            label: item.label.trim().to_string(),
            count: item.count,
        });
    }

    Ok(items)
}

// Wire types for the generateContent request/response.

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum Part {
    Text(String),
    InlineData { mime_type: String, data: String },
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Production gateway against a Gemini-style `generateContent` endpoint
pub struct GeminiGateway {
    http: reqwest::Client,
    config: RecognitionConfig,
}

impl GeminiGateway {
    /// Creates a gateway from endpoint configuration
    pub fn new(config: RecognitionConfig) -> Self {
        GeminiGateway {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }
}

#[async_trait]
impl RecognitionGateway for GeminiGateway {
    async fn recognize(
        &self,
        image: &[u8],
        hint: Option<&str>,
    ) -> Result<Vec<CountedItem>, RecognitionError> {
        let instruction = build_instruction(hint);
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text(instruction),
                    Part::InlineData {
                        mime_type: "image/jpeg".to_string(),
                        data: encoded,
                    },
                ],
            }],
        };

        tracing::debug!(
            model = %self.config.model,
            image_bytes = image.len(),
            has_hint = hint.is_some(),
            "Sending recognition request"
        );

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RecognitionError::Transport(e.to_string()))?;

        let text: String = payload
            .candidates
            .first()
            .ok_or(RecognitionError::EmptyResponse)?
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();

        if text.trim().is_empty() {
            return Err(RecognitionError::EmptyResponse);
        }

        parse_items(&text)
    }
}

/// Deterministic gateway for testing and demos
///
/// Returns a fixed item list, or fails on demand to exercise the
/// workflow's failure paths.
pub struct MockGateway {
    items: Vec<CountedItem>,
    should_fail: bool,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockGateway {
    /// Creates a gateway that answers with the given items
    pub fn with_items(items: Vec<CountedItem>) -> Self {
        MockGateway {
            items,
            should_fail: false,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Creates a gateway that fails every call
    pub fn failing() -> Self {
        MockGateway {
            items: Vec::new(),
            should_fail: true,
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of recognize calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionGateway for MockGateway {
    async fn recognize(
        &self,
        _image: &[u8],
        _hint: Option<&str>,
    ) -> Result<Vec<CountedItem>, RecognitionError> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        if self.should_fail {
            return Err(RecognitionError::Transport(
                "mock gateway failure".to_string(),
            ));
        }

        Ok(self.items.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_with_hint() {
        let instruction = build_instruction(Some("bottled water"));
        assert!(instruction.contains("The product is called \"bottled water\""));
        assert!(instruction.contains("Return ONLY a JSON array"));
    }

    #[test]
    fn test_instruction_without_hint() {
        let instruction = build_instruction(None);
        assert!(instruction.starts_with("Identify and count the products."));
    }

    #[test]
    fn test_parse_plain_array() {
        let items = parse_items(r#"[{"label": "Cola 330ml", "count": 6}]"#).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].label, "Cola 330ml");
        assert_eq!(items[0].count, 6);
    }

    #[test]
    fn test_parse_with_code_fences() {
        let text = "```json\n[{\"label\": \"Chips\", \"count\": 3}]\n```";
        let items = parse_items(text).unwrap();
        assert_eq!(items, vec![CountedItem { label: "Chips".to_string(), count: 3 }]);
    }

    #[test]
    fn test_parse_field_aliases() {
        let items = parse_items(r#"[{"producto": "Agua", "cantidad": 12}]"#).unwrap();
        assert_eq!(items[0].label, "Agua");
        assert_eq!(items[0].count, 12);

        let items = parse_items(r#"[{"product": "Water", "quantity": 2}]"#).unwrap();
        assert_eq!(items[0].label, "Water");
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(parse_items(r#"{"label": "x", "count": 1}"#).is_err());
        assert!(parse_items("I could not count the products.").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_items() {
        assert!(parse_items(r#"[{"label": "  ", "count": 1}]"#).is_err());
        assert!(parse_items(r#"[{"label": "x", "count": -2}]"#).is_err());
    }

    #[test]
    fn test_parse_trims_labels() {
        let items = parse_items(r#"[{"label": "  Soap bar ", "count": 4}]"#).unwrap();
        assert_eq!(items[0].label, "Soap bar");
    }

    #[tokio::test]
    async fn test_mock_gateway_counts_calls() {
        let gateway = MockGateway::with_items(vec![CountedItem {
            label: "Box".to_string(),
            count: 2,
        }]);

        assert_eq!(gateway.call_count(), 0);
        let items = gateway.recognize(&[], None).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_gateway_failure() {
        let gateway = MockGateway::failing();
        assert!(gateway.recognize(&[], None).await.is_err());
        assert_eq!(gateway.call_count(), 1);
    }
}
