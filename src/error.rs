//! Error types for the edgequake-refine library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`RefineError`]: **Fatal**: the correction pass cannot run at all
//!   (unreadable document, invalid configuration, no model provider).
//!   Returned as `Err(RefineError)` from the top-level `correct*` functions.
//!
//! * [`BlockError`]: **Non-fatal**: one block's correction was rejected
//!   (transport failure, truncated reply, unusable table markup). Stored
//!   inside [`crate::output::BlockOutcome`]; the block itself is left exactly
//!   as it was apart from its `llm_error_count`.
//!
//! [`GatewayError`] is what a [`crate::pipeline::gateway::ModelGateway`]
//! reports; the dispatcher folds it into a `BlockError`.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-refine library.
#[derive(Debug, Error)]
pub enum RefineError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Document file could not be read.
    #[error("Failed to read document '{path}': {source}")]
    DocumentLoadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document file was read but is not a valid document.
    #[error("Document '{path}' is not valid JSON: {detail}")]
    DocumentParseFailed { path: PathBuf, detail: String },

    /// A page image referenced by the document could not be decoded.
    #[error("Failed to load page image '{path}': {detail}")]
    ImageLoadFailed { path: PathBuf, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the corrected document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a single block's correction was rejected.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum BlockError {
    /// The model could not be reached, or every retry failed.
    #[error("model call failed after {retries} retries: {detail}")]
    Transport { retries: u32, detail: String },

    /// The model call exceeded its time budget.
    #[error("model call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The reply did not contain the required key.
    #[error("response is missing required key '{key}'")]
    MissingKey { key: String },

    /// The reply was not a JSON object, or a key had the wrong type.
    #[error("response does not match schema: {detail}")]
    SchemaMismatch { detail: String },

    /// Corrected text is suspiciously short compared to the original.
    #[error("corrected text too short: {corrected} chars vs {original} original")]
    TooShort { corrected: usize, original: usize },

    /// The corrected table did not reconstruct into enough cells.
    #[error("corrected table has only {cells} cell(s)")]
    TooFewCells { cells: usize },

    /// The correction task panicked.
    #[error("correction task panicked: {0}")]
    Panicked(String),
}

/// Failure reported by a model gateway.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    #[error("transport failure after {retries} retries: {detail}")]
    Transport { retries: u32, detail: String },

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("missing required key '{key}'")]
    MissingKey { key: String },

    #[error("schema mismatch: {detail}")]
    SchemaMismatch { detail: String },
}

impl From<GatewayError> for BlockError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Transport { retries, detail } => BlockError::Transport { retries, detail },
            GatewayError::Timeout { secs } => BlockError::Timeout { secs },
            GatewayError::MissingKey { key } => BlockError::MissingKey { key },
            GatewayError::SchemaMismatch { detail } => BlockError::SchemaMismatch { detail },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_short_display() {
        let e = BlockError::TooShort {
            corrected: 3,
            original: 40,
        };
        let msg = e.to_string();
        assert!(msg.contains("3 chars"), "got: {msg}");
        assert!(msg.contains("40 original"), "got: {msg}");
    }

    #[test]
    fn gateway_error_maps_to_block_error() {
        let e: BlockError = GatewayError::MissingKey {
            key: "markdown".into(),
        }
        .into();
        assert_eq!(
            e,
            BlockError::MissingKey {
                key: "markdown".into()
            }
        );
    }

    #[test]
    fn timeout_display() {
        let e = BlockError::from(GatewayError::Timeout { secs: 60 });
        assert!(e.to_string().contains("60s"));
    }

    #[test]
    fn provider_not_configured_display() {
        let e = RefineError::ProviderNotConfigured {
            provider: "anthropic".into(),
            hint: "set ANTHROPIC_API_KEY".into(),
        };
        assert!(e.to_string().contains("anthropic"));
        assert!(e.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn block_error_serialises() {
        let e = BlockError::TooFewCells { cells: 1 };
        let json = serde_json::to_string(&e).unwrap();
        let back: BlockError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
