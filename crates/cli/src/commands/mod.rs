//! Command handlers for the RoleFlow CLI.

pub mod ask;
pub mod departments;
pub mod refresh;
pub mod serve;

pub use ask::AskCommand;
pub use departments::DepartmentsCommand;
pub use refresh::RefreshCommand;
pub use serve::ServeCommand;

use roleflow_core::{config::AppConfig, AppResult};
use roleflow_knowledge::KnowledgeService;
use roleflow_llm::create_client;

/// Build the full query pipeline against the configured LLM provider.
pub(crate) fn knowledge_service(config: &AppConfig) -> AppResult<KnowledgeService> {
    let endpoint = config.provider_endpoint();
    let api_key = config.resolve_api_key(&config.provider);
    let client = create_client(&config.provider, endpoint.as_deref(), api_key.as_deref())?;

    tracing::debug!("LLM client: {} ({})", config.provider, config.model);

    KnowledgeService::from_config(config, client)
}
