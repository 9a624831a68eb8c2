//! Error types for RoleFlow.
//!
//! This module defines a unified error enum covering the failure categories
//! of the query pipeline (authentication, missing data, synthesis, index
//! builds) alongside the ambient ones (configuration, I/O, serialization).

use std::time::Duration;
use thiserror::Error;

/// Unified error type for RoleFlow.
///
/// All library functions return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or expired token, or failed identity verification
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// No index exists for any department the caller may read
    #[error("Not found: {0}")]
    NotFound(String),

    /// The generation call failed
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// The generation call exceeded its time budget
    #[error("Synthesis timed out after {0:?}")]
    SynthesisTimeout(Duration),

    /// Document loading or index construction failed for a department
    #[error("Index build failed for department '{department}': {reason}")]
    Build { department: String, reason: String },

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge store, embedding, and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Caller supplied an unusable request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Short machine-readable code, used in HTTP error bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Authentication(_) => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::Synthesis(_) => "synthesis_failed",
            AppError::SynthesisTimeout(_) => "synthesis_timeout",
            AppError::Build { .. } => "build_failed",
            AppError::Llm(_) => "llm",
            AppError::Knowledge(_) => "knowledge",
            AppError::Prompt(_) => "prompt",
            AppError::Serialization(_) => "serialization",
            AppError::InvalidInput(_) => "bad_request",
            AppError::Other(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
