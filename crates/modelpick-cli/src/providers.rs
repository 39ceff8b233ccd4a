//! Providers the `modelpick` binary knows about out of the box.

use std::sync::Arc;

use modelpick_registry::{
    ModelCapabilities, ModelLimits, ModelRecord, ModelsDevProvider, ModelsDevSource,
    ProviderMetadata, Registry,
};

/// Register every bundled provider, all sharing one models.dev source.
pub fn register_all(registry: &Registry, source: Arc<ModelsDevSource>) {
    registry.register(
        ModelsDevProvider::new(
            metadata("openai", "OpenAI", "https://platform.openai.com/docs/models"),
            openai_models(),
            Arc::clone(&source),
        )
        .with_env(["OPENAI_API_KEY"]),
    );
    registry.register(
        ModelsDevProvider::new(
            metadata("anthropic", "Anthropic", "https://docs.anthropic.com/en/docs/models-overview"),
            anthropic_models(),
            Arc::clone(&source),
        )
        .with_env(["ANTHROPIC_API_KEY"]),
    );
    registry.register(
        ModelsDevProvider::new(
            metadata("google", "Google", "https://ai.google.dev/gemini-api/docs/models"),
            google_models(),
            source,
        )
        .with_env(["GOOGLE_GENERATIVE_AI_API_KEY", "GEMINI_API_KEY"]),
    );
}

fn metadata(id: &str, name: &str, doc_url: &str) -> ProviderMetadata {
    let mut metadata = ProviderMetadata::new(id, name);
    metadata.doc_url = Some(doc_url.to_string());
    metadata
}

fn openai_models() -> Vec<ModelRecord> {
    vec![
        model("gpt-4.1", "GPT-4.1", 1_047_576, 32_768),
        model("gpt-4.1-mini", "GPT-4.1 mini", 1_047_576, 32_768),
        reasoning(model("gpt-5", "GPT-5", 400_000, 128_000)),
        reasoning(model("gpt-5-mini", "GPT-5 mini", 400_000, 128_000)),
        reasoning(model("o4-mini", "o4-mini", 200_000, 100_000)),
    ]
}

fn anthropic_models() -> Vec<ModelRecord> {
    vec![
        reasoning(model("claude-sonnet-4-5", "Claude Sonnet 4.5", 200_000, 64_000)),
        reasoning(model("claude-opus-4-1", "Claude Opus 4.1", 200_000, 32_000)),
        model("claude-3-5-haiku-latest", "Claude Haiku 3.5", 200_000, 8_192),
    ]
}

fn google_models() -> Vec<ModelRecord> {
    vec![
        reasoning(model("gemini-2.5-pro", "Gemini 2.5 Pro", 1_048_576, 65_536)),
        reasoning(model("gemini-2.5-flash", "Gemini 2.5 Flash", 1_048_576, 65_536)),
    ]
}

fn model(id: &str, name: &str, context: u64, output: u64) -> ModelRecord {
    ModelRecord::new(id, name)
        .with_capabilities(ModelCapabilities {
            vision: true,
            tools: true,
            reasoning: false,
            structured_output: true,
        })
        .with_limits(ModelLimits {
            max_tokens: Some(output),
            context_length: Some(context),
        })
}

fn reasoning(mut record: ModelRecord) -> ModelRecord {
    record.capabilities.reasoning = true;
    record
}

#[cfg(test)]
mod tests {
    use modelpick_registry::ProviderDirectory;

    use super::*;

    #[test]
    fn bundled_providers_have_builtins() {
        let registry = Registry::new();
        register_all(&registry, Arc::new(ModelsDevSource::new()));

        assert_eq!(
            registry.provider_ids(),
            vec!["anthropic", "google", "openai"]
        );
        for provider in registry.providers() {
            assert!(!provider.builtin_models().is_empty());
            assert!(provider.metadata().doc_url.is_some());
        }
    }
}
