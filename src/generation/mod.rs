//! Structured generation: schema-constrained model calls consumed by the research workflows.

use async_trait::async_trait;
use schemars::JsonSchema;
use schemars::generate::SchemaSettings;
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("generation API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("generation returned no content (finish reason: {reason})")]
    EmptyOutput { reason: String },

    #[error("generation output is not valid JSON: {0}")]
    MalformedOutput(#[source] serde_json::Error),

    #[error("generation output does not match the requested schema: {0}")]
    SchemaMismatch(#[source] serde_json::Error),
}

/// One schema-constrained model invocation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub instructions: String,
    pub prompt: String,
    pub schema: serde_json::Value,
}

/// A model provider able to answer with JSON conforming to a request schema.
///
/// Implementations return the raw JSON value; [`generate`] owns validation
/// against the Rust type the schema was derived from.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    async fn generate_json(
        &self,
        request: &GenerationRequest,
    ) -> Result<serde_json::Value, GenerationError>;
}

/// Derives the JSON Schema sent to the provider for `T`.
///
/// Subschemas are inlined so providers without `$ref` support see one
/// self-contained object; meta keys the providers reject are dropped.
pub fn schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = SchemaSettings::draft2020_12()
        .with(|settings| settings.inline_subschemas = true)
        .into_generator()
        .into_root_schema_for::<T>();

    let mut value = schema.to_value();
    if let Some(map) = value.as_object_mut() {
        map.remove("$schema");
        map.remove("title");
    }
    value
}

/// Runs one structured generation call and validates the answer as `T`.
pub async fn generate<T>(
    generator: &dyn StructuredGenerator,
    instructions: &str,
    prompt: &str,
) -> Result<T, GenerationError>
where
    T: JsonSchema + DeserializeOwned,
{
    let request = GenerationRequest {
        instructions: instructions.to_string(),
        prompt: prompt.to_string(),
        schema: schema_for::<T>(),
    };
    let value = generator.generate_json(&request).await?;
    serde_json::from_value(value).map_err(GenerationError::SchemaMismatch)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Replays queued answers in call order and records every request.
    pub(crate) struct ScriptedGenerator {
        answers: Mutex<VecDeque<Result<serde_json::Value, GenerationError>>>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn new(answers: Vec<Result<serde_json::Value, GenerationError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl StructuredGenerator for ScriptedGenerator {
        async fn generate_json(
            &self,
            request: &GenerationRequest,
        ) -> Result<serde_json::Value, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(request.prompt.clone());
            }
            let next = self.answers.lock().ok().and_then(|mut a| a.pop_front());
            next.unwrap_or_else(|| {
                Err(GenerationError::EmptyOutput {
                    reason: "script exhausted".into(),
                })
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedGenerator;
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct Probe {
        /// Primary label
        label: String,
        /// Optional tags
        #[serde(default)]
        tags: Vec<String>,
    }

    #[test]
    fn schema_for_strips_meta_keys_and_keeps_descriptions() {
        let schema = schema_for::<Probe>();
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("title").is_none());
        assert_eq!(schema["properties"]["label"]["description"], "Primary label");

        let required = schema["required"].as_array().expect("required list");
        assert!(required.iter().any(|v| v == "label"));
        assert!(!required.iter().any(|v| v == "tags"));
    }

    #[tokio::test]
    async fn generate_defaults_missing_arrays_to_empty() {
        let generator = ScriptedGenerator::new(vec![Ok(serde_json::json!({"label": "x"}))]);
        let probe: Probe = generate(&generator, "sys", "user").await.unwrap();
        assert_eq!(probe.label, "x");
        assert!(probe.tags.is_empty());
        assert_eq!(generator.calls(), 1);
        assert_eq!(generator.prompts(), vec!["user".to_string()]);
    }

    #[tokio::test]
    async fn generate_rejects_schema_mismatch() {
        let generator = ScriptedGenerator::new(vec![Ok(serde_json::json!({"tags": "nope"}))]);
        let err = generate::<Probe>(&generator, "sys", "user")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::SchemaMismatch(_)));
    }

    #[tokio::test]
    async fn generate_propagates_provider_errors() {
        let generator = ScriptedGenerator::new(vec![Err(GenerationError::Api {
            status: 500,
            message: "boom".into(),
        })]);
        let err = generate::<Probe>(&generator, "sys", "user")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Api { status: 500, .. }));
    }
}
