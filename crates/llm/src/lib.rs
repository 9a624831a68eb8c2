//! LLM integration crate for RoleFlow.
//!
//! This crate provides a provider-agnostic abstraction for the single
//! generation call made per query. Responses are never streamed.
//!
//! # Providers
//! - **OpenAI-compatible**: `/chat/completions` (OpenRouter by default)
//! - **Ollama**: Local LLM runtime
//!
//! # Example
//! ```no_run
//! use roleflow_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::{create_client, ProviderType};
pub use providers::{OllamaClient, OpenAiClient};
