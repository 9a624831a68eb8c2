//! Prompt system for RoleFlow.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions
//! - Built-in defaults that workspace files can override by id
//! - Handlebars template rendering

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{builtin_prompt, load_prompt, resolve_prompt, CONSOLIDATED_PROMPT_ID};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptOutputSpec};
