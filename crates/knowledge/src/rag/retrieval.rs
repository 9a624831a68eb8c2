//! Scoped fan-out retrieval.
//!
//! Every department in the caller's scope is searched separately. Results are
//! re-checked against the department that was queried, because an index is
//! never trusted to hold only its own department's content.

use crate::embeddings::EmbeddingProvider;
use crate::rag::attribution::{ProbeHit, SimilarityProbe};
use crate::store::IndexCatalog;
use crate::types::CandidatePassage;
use crate::vector_index::VectorIndex;
use futures::future::join_all;
use roleflow_access::ScopeSet;
use roleflow_core::{AppError, AppResult};
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of the retrieval step of one query.
pub struct Retrieval {
    /// Tag-checked, content-deduplicated passages in department-then-rank order
    pub candidates: Vec<CandidatePassage>,
    departments: Vec<String>,
    /// Nearest raw hit per searched department, in scope order
    nearest: Vec<ProbeHit>,
}

impl Retrieval {
    /// Whether any department in scope had a live index.
    pub fn has_indexes(&self) -> bool {
        !self.departments.is_empty()
    }

    /// Departments searched, in scope order.
    pub fn departments(&self) -> impl Iterator<Item = &str> {
        self.departments.iter().map(String::as_str)
    }
}

/// The top-1 hits come from the head of each department's top-k search, which
/// already ran on the blocking pool; results are sorted ascending by distance.
impl SimilarityProbe for Retrieval {
    fn top_hits(&self) -> Vec<ProbeHit> {
        self.nearest.clone()
    }
}

/// Searches the authorized departments and merges their results.
pub struct RetrievalAggregator {
    catalog: Arc<dyn IndexCatalog>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl RetrievalAggregator {
    pub fn new(
        catalog: Arc<dyn IndexCatalog>,
        embedder: Arc<dyn EmbeddingProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            catalog,
            embedder,
            top_k,
        }
    }

    /// Retrieve candidates for `query` from every department in `scopes`.
    ///
    /// A department whose lookup fails is logged and left out. An empty
    /// candidate list is a normal result.
    pub async fn retrieve(&self, scopes: &ScopeSet, query: &str) -> AppResult<Retrieval> {
        let lookups = scopes.iter().map(|department| async move {
            let index = self.catalog.index_for(department).await;
            (department.to_string(), index)
        });

        let indexes: Vec<(String, Arc<dyn VectorIndex>)> = join_all(lookups)
            .await
            .into_iter()
            .filter_map(|(department, index)| index.map(|index| (department, index)))
            .collect();

        if indexes.is_empty() {
            return Ok(Retrieval {
                candidates: Vec::new(),
                departments: Vec::new(),
                nearest: Vec::new(),
            });
        }

        let query_embedding = Arc::new(
            self.embedder
                .embed(query)
                .await
                .map_err(|e| AppError::Knowledge(format!("Failed to embed query: {}", e)))?,
        );

        let searches = indexes.iter().map(|(department, index)| {
            let index = Arc::clone(index);
            let embedding = Arc::clone(&query_embedding);
            let top_k = self.top_k;
            let department = department.clone();

            async move {
                let outcome =
                    tokio::task::spawn_blocking(move || index.search(&embedding, top_k)).await;
                match outcome {
                    Ok(Ok(results)) => Some((department, results)),
                    Ok(Err(e)) => {
                        tracing::warn!("Retrieval failed for '{}', skipping: {}", department, e);
                        None
                    }
                    Err(e) => {
                        tracing::warn!("Retrieval task failed for '{}', skipping: {}", department, e);
                        None
                    }
                }
            }
        });

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        let mut nearest = Vec::new();
        let mut rejected = 0usize;

        for (department, results) in join_all(searches).await.into_iter().flatten() {
            if let Some((chunk, distance)) = results.first() {
                nearest.push(ProbeHit::new(
                    department.clone(),
                    CandidatePassage::new(chunk.clone(), *distance),
                ));
            }

            for (chunk, distance) in results {
                if chunk.department() != department {
                    rejected += 1;
                    continue;
                }
                if seen.insert(chunk.content().to_string()) {
                    candidates.push(CandidatePassage::new(chunk, distance));
                }
            }
        }

        if rejected > 0 {
            tracing::warn!("Dropped {} passages with a foreign department tag", rejected);
        }
        tracing::debug!(
            "Retrieved {} candidates from {} departments",
            candidates.len(),
            indexes.len()
        );

        Ok(Retrieval {
            candidates,
            departments: indexes.into_iter().map(|(department, _)| department).collect(),
            nearest,
        })
    }
}
