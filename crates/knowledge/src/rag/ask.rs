//! Query orchestration.
//!
//! A query moves through `Resolving -> Retrieving -> Synthesizing ->
//! Attributing -> Done`; any failure ends it in `Errored`. Nothing is
//! retried here, and no query state is shared between calls.

use crate::rag::attribution::SourceAttributor;
use crate::rag::retrieval::RetrievalAggregator;
use crate::rag::synthesis::AnswerSynthesizer;
use crate::rag::types::{QueryResult, QueryStage};
use roleflow_access::{Identity, ScopeResolver, ScopeSet};
use roleflow_core::{AppError, AppResult};
use std::sync::Arc;
use tracing::Instrument;

/// Message carried by the not-found error when no department in scope has data.
pub const NO_ACCESSIBLE_DATA: &str = "No accessible data found";

/// Runs a question end to end for one caller.
pub struct QueryOrchestrator {
    resolver: ScopeResolver,
    retrieval: RetrievalAggregator,
    synthesizer: AnswerSynthesizer,
    attributor: Arc<dyn SourceAttributor>,
}

impl QueryOrchestrator {
    pub fn new(
        resolver: ScopeResolver,
        retrieval: RetrievalAggregator,
        synthesizer: AnswerSynthesizer,
        attributor: Arc<dyn SourceAttributor>,
    ) -> Self {
        Self {
            resolver,
            retrieval,
            synthesizer,
            attributor,
        }
    }

    pub fn resolver(&self) -> &ScopeResolver {
        &self.resolver
    }

    /// Answer `query` for an identity, resolving its scopes first.
    pub async fn answer(&self, identity: &Identity, query: &str) -> AppResult<QueryResult> {
        tracing::debug!("{} identity '{}'", QueryStage::Resolving, identity.employee_id);
        let scopes = self.resolver.resolve(identity);
        self.answer_in_scope(&scopes, query).await
    }

    /// Answer `query` against an already-resolved scope set (e.g. from a token).
    pub async fn answer_in_scope(&self, scopes: &ScopeSet, query: &str) -> AppResult<QueryResult> {
        let span = tracing::info_span!("query", departments = scopes.len());

        async move {
            let mut stage = QueryStage::Resolving;
            let result = self.run(scopes, query, &mut stage).await;

            match &result {
                Ok(answer) => tracing::info!(
                    "Query answered with {} sources",
                    answer.sources.len()
                ),
                Err(e) => {
                    tracing::error!("Query failed while {}: {}", stage, e);
                    advance(&mut stage, QueryStage::Errored);
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        scopes: &ScopeSet,
        query: &str,
        stage: &mut QueryStage,
    ) -> AppResult<QueryResult> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidInput("Query must not be empty".to_string()));
        }

        advance(stage, QueryStage::Retrieving);
        let retrieval = self.retrieval.retrieve(scopes, query).await?;
        if !retrieval.has_indexes() {
            return Err(AppError::NotFound(NO_ACCESSIBLE_DATA.to_string()));
        }

        advance(stage, QueryStage::Synthesizing);
        let response = self
            .synthesizer
            .synthesize(&retrieval.candidates, query)
            .await?;
        if retrieval.candidates.is_empty() {
            advance(stage, QueryStage::Done);
            return Ok(QueryResult::no_information());
        }

        advance(stage, QueryStage::Attributing);
        let sources = self
            .attributor
            .attribute(&retrieval.candidates, &response, &retrieval);

        advance(stage, QueryStage::Done);
        Ok(QueryResult::new(response, sources))
    }
}

fn advance(stage: &mut QueryStage, next: QueryStage) {
    tracing::debug!("{} -> {}", stage, next);
    *stage = next;
}
