//! Client error types.

use crate::config::ConfigError;

/// Errors reading the model inventory.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// The runtime could not be reached, after retries.
    #[error("runtime unavailable at {endpoint}: {reason}")]
    SourceUnavailable { endpoint: String, reason: String },

    /// The runtime answered with a non-2xx status.
    #[error("runtime {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("entity `{entity}` does not exist in the runtime")]
    UnknownEntity { entity: String },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors installing a package.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// The runtime refused the package, or transient failures outlasted the
    /// retry budget. The reason is the runtime's own message where it gave one.
    #[error("install rejected: {reason}")]
    Rejected { reason: String },

    /// The request was sent but no answer arrived in time. The package may or
    /// may not have been applied; it is never re-sent automatically.
    #[error("install outcome unknown: {reason}")]
    OutcomeUnknown { reason: String },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
