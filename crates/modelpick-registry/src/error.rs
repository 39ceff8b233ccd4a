/// Errors produced by provider integrations and the registry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A provider with the given id was not found in the registry.
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    /// The provider's model listing could not be fetched.
    #[error("failed to fetch models for {provider}: {source}")]
    Fetch {
        provider: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to parse the models.dev spec or a provider response.
    #[error("failed to parse model listing: {0}")]
    Parse(#[from] serde_json::Error),

    /// Free-form failure raised by a provider loader.
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn fetch(
        provider: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Fetch {
            provider: provider.into(),
            source: source.into(),
        }
    }
}
