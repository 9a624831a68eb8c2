//! Embedding generation for department indexes.
//!
//! Providers are selected by `embedding.provider` in `roleflow.yaml`. The
//! `trigram` provider is local and deterministic; `ollama` calls a running
//! Ollama server.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{ollama::OllamaProvider, trigram::TrigramProvider};
