//! Summaries of recorded audio from a generative model.
//!
//! [`GeminiSummarizer`] downloads the audio from its public URL, sends it
//! inline (base64) to the `generateContent` endpoint together with a fixed
//! instruction, and returns the text of the first candidate. Nothing is
//! cached or retried: every call downloads and generates again.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::future::{BoxFuture, FutureExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::BackendError;

pub mod fixed;

/// Shown instead of an empty summary so that "nothing generated" can be
/// told apart from "not requested yet".
pub const EMPTY_SUMMARY_PLACEHOLDER: &str = "No summary generated.";

pub const INSTRUCTION: &str = "Summarize the following audio content.";

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/";

const DEFAULT_AUDIO_TYPE: &str = "audio/webm";

const API_KEY_HEADER: &str = "x-goog-api-key";

pub trait Summarizer: Send + Sync {
    /// Returns a summary of the audio at `audio_url`, or the placeholder
    /// if the model produced no text.
    fn summarize<'a>(&'a self, audio_url: &'a Url) -> BoxFuture<'a, Result<String, BackendError>>;
}

/// Settings for [`GeminiSummarizer`].
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// Base URL of the API, including trailing slash.
    pub endpoint: Url,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
}

pub struct GeminiSummarizer {
    client: Client,
    config: GeminiConfig,
}

impl GeminiSummarizer {
    pub fn new(config: GeminiConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(GeminiSummarizer { client, config })
    }

    fn generation_url(&self) -> Result<Url, BackendError> {
        let path = format!("v1beta/models/{}:generateContent", self.config.model);

        self.config
            .endpoint
            .join(&path)
            .map_err(|e| BackendError::GenerationFailed(format!("invalid model endpoint: {}", e)))
    }

    async fn fetch_audio(&self, audio_url: &Url) -> Result<(Vec<u8>, String), BackendError> {
        let fetch_failed = |reason: String| BackendError::FetchFailed {
            url: audio_url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(audio_url.clone())
            .send()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failed(format!("status {}", status)));
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<mime::Mime>().ok())
            .filter(|m| m.type_() == mime::AUDIO || m.type_() == mime::VIDEO)
            .map(|m| m.essence_str().to_owned())
            .unwrap_or_else(|| DEFAULT_AUDIO_TYPE.to_owned());

        let audio = response
            .bytes()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        Ok((audio.to_vec(), mime_type))
    }

    async fn generate(&self, audio: &[u8], mime_type: String) -> Result<String, BackendError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_owned(),
                parts: vec![
                    RequestPart::Text {
                        text: INSTRUCTION.to_owned(),
                    },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type,
                            data: STANDARD.encode(audio),
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(self.generation_url()?)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::GenerationFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            return Err(BackendError::GenerationFailed(format!(
                "model returned status {}: {}",
                status,
                body.trim()
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| BackendError::GenerationFailed(e.to_string()))?;

        Ok(summary_text(parsed))
    }
}

impl Summarizer for GeminiSummarizer {
    fn summarize<'a>(&'a self, audio_url: &'a Url) -> BoxFuture<'a, Result<String, BackendError>> {
        async move {
            let (audio, mime_type) = self.fetch_audio(audio_url).await?;

            self.generate(&audio, mime_type).await
        }
        .boxed()
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Joins the text parts of the first candidate, falling back to the
/// placeholder.
pub(crate) fn summary_text(response: GenerateContentResponse) -> String {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        EMPTY_SUMMARY_PLACEHOLDER.to_owned()
    } else {
        text.trim().to_owned()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(json: &str) -> GenerateContentResponse {
        serde_json::from_str(json).expect("parse response")
    }

    #[test]
    fn text_parts_are_joined() {
        let response = parse(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Vectors "},{"text":"and matrices."}]}}]}"#,
        );

        assert_eq!(summary_text(response), "Vectors and matrices.");
    }

    #[test]
    fn missing_text_becomes_placeholder() {
        assert_eq!(summary_text(parse("{}")), EMPTY_SUMMARY_PLACEHOLDER);
        assert_eq!(
            summary_text(parse(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#)),
            EMPTY_SUMMARY_PLACEHOLDER
        );
        assert_eq!(
            summary_text(parse(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#)),
            EMPTY_SUMMARY_PLACEHOLDER
        );
    }

    #[test]
    fn request_uses_inline_audio() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_owned(),
                parts: vec![
                    RequestPart::Text {
                        text: INSTRUCTION.to_owned(),
                    },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: "audio/webm".to_owned(),
                            data: STANDARD.encode(b"abc"),
                        },
                    },
                ],
            }],
        };

        let value = serde_json::to_value(&request).unwrap();
        let parts = &value["contents"][0]["parts"];

        assert_eq!(parts[0]["text"], INSTRUCTION);
        assert_eq!(parts[1]["inline_data"]["mime_type"], "audio/webm");
        assert_eq!(parts[1]["inline_data"]["data"], "YWJj");
    }
}
