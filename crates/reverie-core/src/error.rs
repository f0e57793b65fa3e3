// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Reverie memory engine.

use thiserror::Error;

/// The primary error type used across all Reverie adapter traits and core operations.
#[derive(Debug, Error)]
pub enum ReverieError {
    /// Configuration errors (invalid TOML, missing credentials, bad parameters).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Embedding or enrichment provider errors (API failure, malformed response).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A vector does not match the dimensionality fixed for its collection.
    #[error("dimension mismatch for collection `{collection}`: expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    /// A collaborator broke its contract (e.g. returned fewer embeddings than inputs).
    ///
    /// These are never swallowed: they indicate the index could be corrupted
    /// if the operation continued.
    #[error("contract violation: {0}")]
    Contract(String),

    /// A requested entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ReverieError {
    /// Wraps any error as a storage error.
    pub fn storage<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        ReverieError::Storage { source: err.into() }
    }

    /// Configuration-class failure: retrieval returns empty, ingestion skips.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ReverieError::Config(_) | ReverieError::DimensionMismatch { .. }
        )
    }

    /// Transient I/O failure: the attempted operation is dropped, state is untouched.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ReverieError::Storage { .. }
                | ReverieError::Provider { .. }
                | ReverieError::Timeout { .. }
        )
    }

    /// Programmer/contract error that callers must not swallow.
    pub fn is_contract(&self) -> bool {
        matches!(self, ReverieError::Contract(_))
    }
}
