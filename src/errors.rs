//! Typed errors for the seams where callers need to distinguish failure kinds.
//! Everything above these seams (CLI glue, command handlers) uses `anyhow`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing mandatory cluster name (set CLUSTER_NAME)")]
    MissingClusterName,

    #[error("env var replacement {0} does not exist for param")]
    MissingEnvVar(String),

    #[error("unresolved template placeholder remains after substitution: {0}")]
    UnresolvedPlaceholder(String),

    #[error("failed to decode token envelope: {0}")]
    InvalidTokenEnvelope(String),

    #[error("failed to read config file {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFailed {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors surfaced by the recommendations datastore client. `AuthExpired` is
/// distinguished from other failures so callers can re-authenticate and
/// retry exactly once, matching the original client's PGRST301 handling.
#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("authentication token expired")]
    AuthExpired,

    #[error("datastore is not configured")]
    NotConfigured,

    #[error("datastore request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("datastore returned an error response: {status}: {body}")]
    Response { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum UnitError {
    #[error("invalid cpu value: {0}")]
    InvalidCpu(String),

    #[error("invalid memory value: {0}")]
    InvalidMemory(String),
}
