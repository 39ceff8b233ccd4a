/// Errors raised by the catalog's storage helpers.
///
/// The catalog itself never surfaces these to callers: they are reported to
/// telemetry and the catalog carries on with builtin-only data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Store(#[from] modelpick_store::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("entry '{key}' has no '{field}' field")]
    MissingField { key: String, field: &'static str },

    #[error("entry '{key}' uses unsupported envelope version {version}")]
    UnsupportedVersion { key: String, version: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;
