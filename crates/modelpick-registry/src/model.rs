//! Model records as tracked by the catalog.

use serde::{Deserialize, Serialize};

/// Where a [`ModelRecord`] came from.
///
/// The origin decides merge precedence and whether a record is persisted:
/// builtins are always reconstructible from the provider, so only `Api` and
/// `User` records are written to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelOrigin {
    /// Shipped with the provider integration.
    #[default]
    Builtin,
    /// Discovered through the provider's live model listing.
    Api,
    /// Added by hand.
    User,
}

impl ModelOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelOrigin::Builtin => "builtin",
            ModelOrigin::Api => "api",
            ModelOrigin::User => "user",
        }
    }

    /// Whether records of this origin survive in storage.
    pub fn is_persisted(self) -> bool {
        matches!(self, ModelOrigin::Api | ModelOrigin::User)
    }
}

/// Feature flags advertised for a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelCapabilities {
    /// Image input.
    pub vision: bool,
    /// Tool/function calling.
    pub tools: bool,
    /// Reasoning / chain-of-thought output.
    pub reasoning: bool,
    /// Structured (JSON schema) output.
    pub structured_output: bool,
}

/// Token limits. `None` means the provider did not say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelLimits {
    pub max_tokens: Option<u64>,
    pub context_length: Option<u64>,
}

/// One model offered by one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Vendor model identifier, unique within a provider. Compared exactly.
    pub id: String,

    /// Human-friendly name shown in pickers.
    pub display_name: String,

    #[serde(default)]
    pub capabilities: ModelCapabilities,

    #[serde(default)]
    pub limits: ModelLimits,

    #[serde(default)]
    pub origin: ModelOrigin,

    #[serde(default = "default_visible")]
    pub visible: bool,

    /// First time this model was seen, epoch milliseconds. Never cleared once
    /// set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered_at: Option<u64>,

    /// Last successful merge touching this record, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u64>,
}

fn default_visible() -> bool {
    true
}

impl ModelRecord {
    /// A visible builtin record with no capabilities or limits set.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            capabilities: ModelCapabilities::default(),
            limits: ModelLimits::default(),
            origin: ModelOrigin::Builtin,
            visible: true,
            discovered_at: None,
            updated_at: None,
        }
    }

    pub fn with_origin(mut self, origin: ModelOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_capabilities(mut self, capabilities: ModelCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_limits(mut self, limits: ModelLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let record: ModelRecord =
            serde_json::from_str(r#"{"id":"m1","display_name":"Model One"}"#).expect("parse");

        assert_eq!(record.origin, ModelOrigin::Builtin);
        assert!(record.visible);
        assert_eq!(record.discovered_at, None);
        assert_eq!(record.limits, ModelLimits::default());
    }

    #[test]
    fn origin_serializes_as_snake_case() {
        let record = ModelRecord::new("m1", "Model One").with_origin(ModelOrigin::User);
        let json = serde_json::to_value(&record).expect("serialize");

        assert_eq!(json["origin"], "user");
        assert!(json.get("discovered_at").is_none());
    }

    #[test]
    fn only_api_and_user_records_persist() {
        assert!(!ModelOrigin::Builtin.is_persisted());
        assert!(ModelOrigin::Api.is_persisted());
        assert!(ModelOrigin::User.is_persisted());
    }
}
