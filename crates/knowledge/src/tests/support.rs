//! Test doubles and fixtures shared by the scenario tests.

use crate::embeddings::{EmbeddingProvider, TrigramProvider};
use crate::index::DepartmentIndex;
use crate::loader::{DocumentLoader, FsDocumentLoader};
use crate::rag::{AnswerSynthesizer, LexicalOverlapAttributor, QueryOrchestrator, RetrievalAggregator};
use crate::store::IndexCatalog;
use crate::types::{FileType, PassageChunk};
use crate::vector_index::VectorIndex;
use roleflow_access::ScopeResolver;
use roleflow_core::config::AttributionConfig;
use roleflow_core::{AppError, AppResult};
use roleflow_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use roleflow_prompt::{builtin_prompt, CONSOLIDATED_PROMPT_ID};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Data root with finance and hr documents and nothing for general.
pub fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");

    write(&data.join("finance/q3_report.md"), "# Q3 Report\n\nQuarterly revenue grew twelve percent to 4.2 million.");
    write(&data.join("finance/budget.txt"), "The travel budget for 2024 is capped at 80,000.");
    write(&data.join("hr/leave_policy.md"), "# Leave\n\nEmployees accrue annual leave at two days per month.");
    write(&data.join("engineering/architecture.md"), "Services communicate through an internal message bus.");

    dir
}

pub fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

pub fn data_root(dir: &TempDir) -> PathBuf {
    dir.path().join("data")
}

pub fn index_dir(dir: &TempDir) -> PathBuf {
    dir.path().join(".roleflow/indexes")
}

/// Filesystem loader that counts `load` calls and can stall or mis-tag.
pub struct CountingLoader {
    inner: FsDocumentLoader,
    pub loads: AtomicUsize,
    delay: Duration,
    /// Re-tag every other passage to this department
    retag: Option<String>,
}

impl CountingLoader {
    pub fn new(data_root: PathBuf) -> Self {
        Self {
            inner: FsDocumentLoader::new(data_root, 1500, 150),
            loads: AtomicUsize::new(0),
            delay: Duration::ZERO,
            retag: None,
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn mistagging(mut self, department: &str) -> Self {
        self.retag = Some(department.to_string());
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl DocumentLoader for CountingLoader {
    fn discover(&self, department: &str) -> AppResult<Vec<PathBuf>> {
        self.inner.discover(department)
    }

    fn load(&self, files: &[PathBuf]) -> AppResult<Vec<PassageChunk>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);

        let mut chunks = self.inner.load(files)?;
        if let Some(department) = &self.retag {
            chunks.push(PassageChunk::new(
                "Salary bands for 2024 are confidential.",
                department,
                "salaries.csv",
                FileType::Csv,
                "data/hr/salaries.csv",
            ));
        }
        Ok(chunks)
    }

    fn departments(&self) -> AppResult<Vec<String>> {
        self.inner.departments()
    }
}

/// Trigram embedder that can be switched into a failing state.
#[derive(Debug)]
pub struct FlakyEmbedder {
    inner: TrigramProvider,
    pub failing: AtomicBool,
}

impl FlakyEmbedder {
    pub fn new() -> Self {
        Self {
            inner: TrigramProvider::new(64),
            failing: AtomicBool::new(false),
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        64
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Knowledge("embedding service unavailable".to_string()));
        }
        self.inner.embed_batch(texts).await
    }
}

/// Embeds every text to the same vector.
#[derive(Debug)]
pub struct FixedEmbedder(pub Vec<f32>);

#[async_trait::async_trait]
impl EmbeddingProvider for FixedEmbedder {
    fn provider_name(&self) -> &str {
        "fixed"
    }

    fn model_name(&self) -> &str {
        "fixed"
    }

    fn dimensions(&self) -> usize {
        self.0.len()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| self.0.clone()).collect())
    }
}

/// Catalog over hand-built indexes, possibly holding mis-tagged passages.
#[derive(Default)]
pub struct StaticCatalog {
    indexes: HashMap<String, Arc<DepartmentIndex>>,
    failing: Vec<String>,
}

impl StaticCatalog {
    /// Add an index for `department` from `(content, tag, source, vector)`.
    pub fn with(mut self, department: &str, passages: &[(&str, &str, &str, [f32; 2])]) -> Self {
        let chunks = passages
            .iter()
            .map(|(content, tag, source, _)| {
                PassageChunk::new(*content, tag, *source, FileType::Markdown, format!("data/{}/{}", tag, source))
            })
            .collect();
        let embeddings = passages.iter().map(|(_, _, _, v)| v.to_vec()).collect();
        let index = DepartmentIndex::new(department, "fixed:fixed:2", chunks, embeddings).unwrap();
        self.indexes.insert(department.to_string(), Arc::new(index));
        self
    }

    /// Make searches against `department` fail.
    pub fn failing(mut self, department: &str) -> Self {
        self.failing.push(department.to_string());
        self
    }
}

struct FailingIndex(String);

impl VectorIndex for FailingIndex {
    fn department(&self) -> &str {
        &self.0
    }

    fn len(&self) -> usize {
        1
    }

    fn search(&self, _query: &[f32], _top_k: usize) -> AppResult<Vec<(PassageChunk, f32)>> {
        Err(AppError::Knowledge("index file corrupted".to_string()))
    }
}

#[async_trait::async_trait]
impl IndexCatalog for StaticCatalog {
    async fn index_for(&self, department: &str) -> Option<Arc<dyn VectorIndex>> {
        if self.failing.iter().any(|d| d == department) {
            return Some(Arc::new(FailingIndex(department.to_string())));
        }
        self.indexes
            .get(department)
            .map(|index| Arc::clone(index) as Arc<dyn VectorIndex>)
    }
}

/// LLM double returning a scripted answer (or failing) and recording prompts.
pub struct ScriptedLlm {
    answer: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn answering(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(answer.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        match &self.answer {
            Some(answer) => Ok(LlmResponse {
                content: answer.clone(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
            }),
            None => Err(AppError::Llm("upstream returned 503".to_string())),
        }
    }
}

/// Orchestrator over `catalog` with default policy and thresholds.
pub fn orchestrator(
    catalog: Arc<dyn IndexCatalog>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<ScriptedLlm>,
) -> QueryOrchestrator {
    let prompt = builtin_prompt(CONSOLIDATED_PROMPT_ID).unwrap().unwrap();
    let synthesizer = AnswerSynthesizer::new(llm, prompt, "test-model", 0.7, Duration::from_secs(5));
    let retrieval = RetrievalAggregator::new(catalog, embedder, 3);
    let attributor = Arc::new(LexicalOverlapAttributor::from_config(&AttributionConfig::default()));

    QueryOrchestrator::new(ScopeResolver::default(), retrieval, synthesizer, attributor)
}
