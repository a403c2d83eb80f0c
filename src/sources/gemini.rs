use std::borrow::Cow;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::DeepGeneError;
use crate::generation::{GenerationError, GenerationRequest, StructuredGenerator};

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_BASE_ENV: &str = "DEEPGENE_GEMINI_BASE";
const GEMINI_MODEL_ENV: &str = "DEEPGENE_GEMINI_MODEL";
pub(crate) const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const GEMINI_API_KEY_ENV: &str = "GOOGLE_API_KEY";
const GEMINI_API_KEY_FALLBACK_ENV: &str = "GEMINI_API_KEY";
const GEMINI_DOCS_URL: &str = "https://aistudio.google.com/apikey";

/// Gemini `generateContent` client using native JSON-schema output.
pub struct GeminiClient {
    client: reqwest::Client,
    base: Cow<'static, str>,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn from_env() -> Result<Self, DeepGeneError> {
        let api_key = gemini_api_key().ok_or_else(|| DeepGeneError::ApiKeyRequired {
            api: "Gemini".into(),
            env_var: GEMINI_API_KEY_ENV.into(),
            docs_url: GEMINI_DOCS_URL.into(),
        })?;
        Ok(Self {
            client: crate::sources::generation_client()?,
            base: crate::sources::env_base(GEMINI_BASE, GEMINI_BASE_ENV),
            model: crate::sources::env_value(GEMINI_MODEL_ENV)
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            api_key,
        })
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(base: String, model: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: Cow::Owned(base),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub(crate) fn base(&self) -> &str {
        self.base.as_ref()
    }

    pub(crate) fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base.as_ref().trim_end_matches('/'),
            self.model
        )
    }
}

/// True when a Gemini key is present in the environment.
pub(crate) fn gemini_api_key() -> Option<String> {
    crate::sources::env_value(GEMINI_API_KEY_ENV)
        .or_else(|| crate::sources::env_value(GEMINI_API_KEY_FALLBACK_ENV))
}

#[async_trait]
impl StructuredGenerator for GeminiClient {
    async fn generate_json(
        &self,
        request: &GenerationRequest,
    ) -> Result<serde_json::Value, GenerationError> {
        let body = json!({
            "systemInstruction": {
                "parts": [{"text": request.instructions}]
            },
            "contents": [{
                "role": "user",
                "parts": [{"text": request.prompt}]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseJsonSchema": request.schema,
            }
        });

        debug!(model = %self.model, prompt_chars = request.prompt.chars().count(), "Gemini generateContent");
        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: crate::sources::body_excerpt(&bytes),
            });
        }

        let parsed: GenerateContentResponse =
            serde_json::from_slice(&bytes).map_err(GenerationError::MalformedOutput)?;
        let text = parsed.output_text()?;
        serde_json::from_str(strip_code_fence(&text)).map_err(GenerationError::MalformedOutput)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn output_text(self) -> Result<String, GenerationError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".into());
            return Err(GenerationError::EmptyOutput { reason });
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(GenerationError::EmptyOutput {
                reason: candidate.finish_reason.unwrap_or_else(|| "unknown".into()),
            });
        }
        Ok(text)
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
