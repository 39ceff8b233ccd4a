//! Types for the [models.dev](https://models.dev) API payload.
//!
//! Only the fields the catalog consumes are modelled; everything else in
//! `https://models.dev/api.json` is ignored on parse.

use std::collections::HashMap;

use serde::Deserialize;

use crate::model::{ModelCapabilities, ModelLimits, ModelOrigin, ModelRecord};

/// The full payload: a flat map of `provider_id => ProviderSpec`.
pub type ModelsDevSpec = HashMap<String, ProviderSpec>;

/// A provider entry from models.dev.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSpec {
    pub id: String,

    pub name: String,

    /// Environment variable names for the API key.
    #[serde(default)]
    pub env: Vec<String>,

    /// Optional base API URL.
    #[serde(default)]
    pub api: Option<String>,

    #[serde(default)]
    pub doc: Option<String>,

    /// Models offered by this provider, keyed by model id.
    #[serde(default)]
    pub models: HashMap<String, ModelSpec>,
}

/// A model entry within a provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSpec {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Whether file/image attachments are supported.
    #[serde(default)]
    pub attachment: bool,

    #[serde(default)]
    pub reasoning: bool,

    #[serde(default)]
    pub tool_call: bool,

    #[serde(default)]
    pub structured_output: bool,

    #[serde(default)]
    pub modalities: Option<Modalities>,

    #[serde(default)]
    pub limit: Option<ModelLimit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Modalities {
    #[serde(default)]
    pub input: Vec<String>,
    #[serde(default)]
    pub output: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelLimit {
    /// Context window size in tokens.
    #[serde(default)]
    pub context: u64,
    /// Maximum output tokens.
    #[serde(default)]
    pub output: u64,
}

impl ModelSpec {
    /// Convert into an API-origin catalog record.
    pub fn to_record(&self) -> ModelRecord {
        let vision = self.attachment
            || self
                .modalities
                .as_ref()
                .is_some_and(|m| m.input.iter().any(|kind| kind == "image"));

        ModelRecord {
            id: self.id.clone(),
            display_name: self.name.clone().unwrap_or_else(|| self.id.clone()),
            capabilities: ModelCapabilities {
                vision,
                tools: self.tool_call,
                reasoning: self.reasoning,
                structured_output: self.structured_output,
            },
            limits: ModelLimits {
                max_tokens: self.limit.as_ref().map(|l| l.output).filter(|v| *v > 0),
                context_length: self.limit.as_ref().map(|l| l.context).filter(|v| *v > 0),
            },
            origin: ModelOrigin::Api,
            visible: true,
            discovered_at: None,
            updated_at: None,
        }
    }
}

impl ProviderSpec {
    /// All models as records, sorted by id for stable output.
    pub fn records(&self) -> Vec<ModelRecord> {
        let mut records: Vec<ModelRecord> = self.models.values().map(ModelSpec::to_record).collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "acme": {
            "id": "acme",
            "name": "Acme AI",
            "env": ["ACME_API_KEY"],
            "npm": "@ai-sdk/openai-compatible",
            "models": {
                "b-large": {
                    "id": "b-large",
                    "name": "B Large",
                    "tool_call": true,
                    "modalities": { "input": ["text", "image"], "output": ["text"] },
                    "limit": { "context": 128000, "output": 8192 },
                    "cost": { "input": 1.0, "output": 2.0 }
                },
                "a-small": { "id": "a-small" }
            }
        }
    }"#;

    #[test]
    fn parses_and_converts_provider_models() {
        let spec: ModelsDevSpec = serde_json::from_str(SAMPLE).expect("parse");
        let records = spec["acme"].records();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "a-small");
        assert_eq!(records[0].display_name, "a-small");
        assert_eq!(records[0].limits, ModelLimits::default());

        let large = &records[1];
        assert_eq!(large.origin, ModelOrigin::Api);
        assert!(large.capabilities.vision);
        assert!(large.capabilities.tools);
        assert_eq!(large.limits.context_length, Some(128_000));
        assert_eq!(large.limits.max_tokens, Some(8192));
    }
}
