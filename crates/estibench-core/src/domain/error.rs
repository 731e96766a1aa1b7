//! Domain-level error taxonomy for the benchmark engine.

use uuid::Uuid;

/// Benchmark engine errors.
///
/// Unknown anchor/delta keys and invalid domain configs are configuration
/// errors: they mean the domain definition is malformed and must never be
/// recovered from at runtime. See [`BenchError::is_configuration_error`].
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("unknown anchor '{key}' in domain '{domain}'")]
    UnknownAnchor { domain: String, key: String },

    #[error("unknown delta '{key}' in domain '{domain}'")]
    UnknownDelta { domain: String, key: String },

    #[error("invalid domain config: {0}")]
    InvalidDomainConfig(String),

    #[error("invalid generation options: {0}")]
    InvalidOptions(String),

    #[error("domain not found: {0}")]
    DomainNotFound(String),

    #[error("scenario not found: {0}")]
    ScenarioNotFound(Uuid),

    #[error("result for scenario {0} is already terminal")]
    ResultAlreadyTerminal(Uuid),

    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("toml parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Whether this error indicates a malformed domain config.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownAnchor { .. } | Self::UnknownDelta { .. } | Self::InvalidDomainConfig(_)
        )
    }
}

/// Result type for benchmark engine operations.
pub type Result<T> = std::result::Result<T, BenchError>;
