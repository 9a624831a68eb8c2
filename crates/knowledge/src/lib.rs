//! Department-scoped knowledge retrieval for RoleFlow.
//!
//! Documents under `<data_root>/<department>/` are chunked, embedded and
//! indexed per department. Queries fan out over the departments a caller may
//! read, an LLM writes one consolidated answer, and the passages that
//! contributed to it are cited.
//!
//! - [`loader`]: discovery, parsing and chunking into [`PassageChunk`]s
//! - [`embeddings`]: embedding providers
//! - [`index`] / [`store`]: persisted per-department indexes and the
//!   single-flight [`IndexStore`]
//! - [`rag`]: retrieval, synthesis, attribution and the query state machine

pub mod chunker;
pub mod embeddings;
pub mod index;
pub mod loader;
pub mod parser;
pub mod rag;
pub mod store;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use embeddings::{create_provider, EmbeddingProvider};
pub use index::DepartmentIndex;
pub use loader::{DocumentLoader, FsDocumentLoader};
pub use rag::{
    AnswerSynthesizer, LexicalOverlapAttributor, QueryOrchestrator, QueryResult,
    RetrievalAggregator, SourceAttributor,
};
pub use store::{IndexCatalog, IndexStore};
pub use types::{CandidatePassage, FileType, PassageChunk, GENERAL_DEPARTMENT};
pub use vector_index::VectorIndex;

use roleflow_access::ScopeResolver;
use roleflow_core::{AppConfig, AppResult};
use roleflow_llm::LlmClient;
use roleflow_prompt::{resolve_prompt, CONSOLIDATED_PROMPT_ID};
use std::sync::Arc;
use std::time::Duration;

/// Index registry over the configured data root and embedder.
///
/// The embedder is returned too so the query side embeds with the same model
/// the indexes were built with.
pub fn index_store(config: &AppConfig) -> AppResult<(IndexStore, Arc<dyn EmbeddingProvider>)> {
    let loader = Arc::new(FsDocumentLoader::new(
        config.data_root(),
        config.retrieval.chunk_size,
        config.retrieval.chunk_overlap,
    ));
    let embedder = create_provider(&config.embedding)?;

    tracing::debug!(
        "Index store: data {:?}, indexes {:?}, embedding {}",
        config.data_root(),
        config.index_dir(),
        embedder.signature()
    );

    let store = IndexStore::new(config.index_dir(), loader, Arc::clone(&embedder));
    Ok((store, embedder))
}

/// The index registry and the query pipeline built on top of it.
pub struct KnowledgeService {
    pub store: IndexStore,
    pub orchestrator: QueryOrchestrator,
}

impl KnowledgeService {
    /// Wire the filesystem loader, the configured embedder and `client`.
    pub fn from_config(config: &AppConfig, client: Arc<dyn LlmClient>) -> AppResult<Self> {
        let (store, embedder) = index_store(config)?;
        let prompt = resolve_prompt(&config.prompts_dir(), CONSOLIDATED_PROMPT_ID)?;

        let synthesizer = AnswerSynthesizer::new(
            client,
            prompt,
            config.model.clone(),
            config.llm.temperature,
            Duration::from_secs(config.llm.timeout_secs),
        );

        Ok(Self::assemble(
            store,
            embedder,
            synthesizer,
            ScopeResolver::from_config(&config.access),
            config,
        ))
    }

    /// Build the pipeline from already-constructed parts.
    pub fn assemble(
        store: IndexStore,
        embedder: Arc<dyn EmbeddingProvider>,
        synthesizer: AnswerSynthesizer,
        resolver: ScopeResolver,
        config: &AppConfig,
    ) -> Self {
        let retrieval = RetrievalAggregator::new(
            Arc::new(store.clone()),
            embedder,
            config.retrieval.top_k,
        );
        let attributor = Arc::new(LexicalOverlapAttributor::from_config(&config.attribution));
        let orchestrator = QueryOrchestrator::new(resolver, retrieval, synthesizer, attributor);

        Self {
            store,
            orchestrator,
        }
    }
}
