//! Remote description service client.
//!
//! Sends one still frame plus the detected label set to a vision-language
//! service and returns the caption text. The wire contract is the Gemini
//! `generateContent` shape: a `contents[].parts[]` request carrying an
//! instruction text part and an `inline_data` image part, and a response whose
//! caption lives at `candidates[0].content.parts[0].text`.
//!
//! This layer never retries, speaks, or logs on its own; retry policy and user
//! surfacing belong to the controller. Any change in the service's response
//! shape stays confined to the parse step here.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed description policy sent with every request. Mirrors the behavior
/// the product wants from the service: actions and objects, nothing about
/// appearance or surroundings.
const POLICY_TEXT: &str = "Describe only what the person is doing (if any), \
and describe the objects in the image briefly. Avoid mentioning clothing, \
gender, colors, or environment.";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Seam for issuing description requests, so the controller can be exercised
/// without a network.
pub trait Describe: Send {
    /// Issue exactly one request for this image + label set.
    fn describe(&self, jpeg: &[u8], labels: &[String]) -> Result<String, DescribeError>;
}

/// Failure kinds for a description request. Deliberately distinct: a
/// non-success status, a broken connection, and a success body we cannot
/// extract a caption from are different operational problems.
#[derive(Debug)]
pub enum DescribeError {
    /// Network/connection level failure before a response arrived.
    Transport(String),
    /// Service answered with a non-success status.
    Service { status: u16, body: String },
    /// Service answered success but the response shape did not match.
    Parse(String),
}

impl std::fmt::Display for DescribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescribeError::Transport(msg) => write!(f, "transport error: {}", msg),
            DescribeError::Service { status, body } => {
                write!(f, "service error {}: {}", status, truncate(body, 200))
            }
            DescribeError::Parse(msg) => write!(f, "response parse error: {}", msg),
        }
    }
}

impl std::error::Error for DescribeError {}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Configuration for the description client.
#[derive(Clone, Debug)]
pub struct DescribeConfig {
    /// Full request URL, credentials included where the service wants them.
    pub endpoint: String,
    /// Hard bound on the whole call. The service is on the network path of a
    /// user-facing voice loop, so an unbounded call is not acceptable.
    pub timeout: Duration,
}

impl Default for DescribeConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Client for the remote description service.
pub struct DescriptionClient {
    endpoint: String,
    agent: ureq::Agent,
}

impl DescriptionClient {
    pub fn new(config: DescribeConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .build();
        Self {
            endpoint: config.endpoint,
            agent,
        }
    }

    fn request_body(jpeg: &[u8], labels: &[String]) -> ServiceRequest {
        ServiceRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: build_prompt(labels),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/jpeg".to_string(),
                            data: general_purpose::STANDARD.encode(jpeg),
                        },
                    },
                ],
            }],
        }
    }
}

impl Describe for DescriptionClient {
    fn describe(&self, jpeg: &[u8], labels: &[String]) -> Result<String, DescribeError> {
        let body = serde_json::to_string(&Self::request_body(jpeg, labels))
            .map_err(|e| DescribeError::Parse(format!("serialize request: {}", e)))?;

        let response = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .send_string(&body);

        let raw = match response {
            Ok(resp) => resp
                .into_string()
                .map_err(|e| DescribeError::Transport(format!("read response body: {}", e)))?,
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                return Err(DescribeError::Service { status, body });
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(DescribeError::Transport(err.to_string()));
            }
        };

        extract_caption(&raw)
    }
}

/// Build the instruction text: fixed policy, plus the label set when present.
pub fn build_prompt(labels: &[String]) -> String {
    let mut prompt = POLICY_TEXT.to_string();
    if !labels.is_empty() {
        prompt.push_str(&format!(
            " These objects were detected: {}.",
            labels.join(", ")
        ));
    }
    prompt
}

/// Pull the first candidate's text out of a success body.
fn extract_caption(raw: &str) -> Result<String, DescribeError> {
    let parsed: ServiceResponse = serde_json::from_str(raw)
        .map_err(|e| DescribeError::Parse(format!("decode response json: {}", e)))?;
    parsed
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content.parts.into_iter().next())
        .and_then(|part| part.text)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| DescribeError::Parse("no caption text in response".to_string()))
}

// ---- wire shapes -----------------------------------------------------------

#[derive(Debug, Serialize)]
struct ServiceRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ServiceResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize, Default)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}
