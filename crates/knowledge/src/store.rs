//! Per-department index registry.
//!
//! `IndexStore` owns the only long-lived mutable state in the service: the
//! map from department name to its built index. Each department has its own
//! async mutex, so concurrent first requests for the same department share a
//! single load-or-build sequence while other departments proceed
//! independently.
//!
//! Builds run on a spawned task. A caller that stops waiting (request
//! cancelled, client gone) does not abort the build; the result is cached for
//! the next request.

use crate::embeddings::EmbeddingProvider;
use crate::index::DepartmentIndex;
use crate::loader::DocumentLoader;
use crate::vector_index::VectorIndex;
use roleflow_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Lookup of live department indexes, as seen by retrieval.
#[async_trait::async_trait]
pub trait IndexCatalog: Send + Sync {
    /// The department's index, or `None` when it has no usable content.
    async fn index_for(&self, department: &str) -> Option<Arc<dyn VectorIndex>>;
}

enum Slot {
    Vacant,
    Ready(Arc<DepartmentIndex>),
    /// Build failed; stays failed until refresh.
    Failed(String),
}

type SlotHandle = Arc<tokio::sync::Mutex<Slot>>;

struct StoreInner {
    index_dir: PathBuf,
    loader: Arc<dyn DocumentLoader>,
    embedder: Arc<dyn EmbeddingProvider>,
    slots: Mutex<HashMap<String, SlotHandle>>,
    builds: AtomicUsize,
}

/// Lazily built, persisted and cached department indexes.
#[derive(Clone)]
pub struct IndexStore {
    inner: Arc<StoreInner>,
}

impl IndexStore {
    pub fn new(
        index_dir: impl Into<PathBuf>,
        loader: Arc<dyn DocumentLoader>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                index_dir: index_dir.into(),
                loader,
                embedder,
                slots: Mutex::new(HashMap::new()),
                builds: AtomicUsize::new(0),
            }),
        }
    }

    pub fn index_dir(&self) -> &Path {
        &self.inner.index_dir
    }

    /// Number of build-from-documents sequences run so far.
    pub fn build_count(&self) -> usize {
        self.inner.builds.load(Ordering::SeqCst)
    }

    /// Get the department's index, loading or building it on first use.
    ///
    /// Returns `None` for departments without documents, for invalid names,
    /// and for departments whose build failed.
    pub async fn get_index(&self, department: &str) -> Option<Arc<DepartmentIndex>> {
        let department = match normalize_department(department) {
            Ok(department) => department,
            Err(e) => {
                tracing::warn!("{}", e);
                return None;
            }
        };

        let slot = self.inner.slot(&department);

        // Fast path: already built
        if let Ok(guard) = slot.try_lock() {
            if let Slot::Ready(index) = &*guard {
                return Some(Arc::clone(index));
            }
        }

        match self.run_exclusive(department.clone(), slot, false).await {
            Ok(index) => index,
            Err(e) => {
                tracing::debug!("No index for '{}': {}", department, e);
                None
            }
        }
    }

    /// Discard the cached and persisted index and rebuild from current
    /// documents.
    ///
    /// Handles returned before the refresh stay valid; they simply keep
    /// serving the old content.
    pub async fn refresh(&self, department: &str) -> AppResult<Option<Arc<DepartmentIndex>>> {
        let department = normalize_department(department)?;
        tracing::info!("Refreshing index for '{}'", department);

        let slot = self.inner.slot(&department);
        self.run_exclusive(department, slot, true).await
    }

    /// Whether a persisted index database exists for the department.
    pub fn is_persisted(&self, department: &str) -> bool {
        normalize_department(department)
            .map(|d| DepartmentIndex::db_path(&self.inner.index_dir.join(d)).is_file())
            .unwrap_or(false)
    }

    /// Departments with at least one supported document.
    pub async fn available_departments(&self) -> AppResult<Vec<String>> {
        let loader = Arc::clone(&self.inner.loader);
        blocking(move || loader.departments()).await
    }

    /// Run load-or-build under the department lock on a detached task.
    async fn run_exclusive(
        &self,
        department: String,
        slot: SlotHandle,
        reset: bool,
    ) -> AppResult<Option<Arc<DepartmentIndex>>> {
        let inner = Arc::clone(&self.inner);

        let task = tokio::spawn(async move {
            let mut guard = slot.lock_owned().await;
            if reset {
                *guard = Slot::Vacant;
                inner.remove_persisted(&department).await?;
            }
            inner.resolve(&department, &mut guard).await
        });

        task.await
            .map_err(|e| AppError::Knowledge(format!("Index task failed: {}", e)))?
    }
}

#[async_trait::async_trait]
impl IndexCatalog for IndexStore {
    async fn index_for(&self, department: &str) -> Option<Arc<dyn VectorIndex>> {
        self.get_index(department)
            .await
            .map(|index| index as Arc<dyn VectorIndex>)
    }
}

impl StoreInner {
    fn slot(&self, department: &str) -> SlotHandle {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            slots
                .entry(department.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(Slot::Vacant))),
        )
    }

    /// Resolve a slot while holding its lock.
    async fn resolve(
        &self,
        department: &str,
        slot: &mut Slot,
    ) -> AppResult<Option<Arc<DepartmentIndex>>> {
        match slot {
            Slot::Ready(index) => return Ok(Some(Arc::clone(index))),
            Slot::Failed(reason) => {
                return Err(AppError::Build {
                    department: department.to_string(),
                    reason: reason.clone(),
                })
            }
            Slot::Vacant => {}
        }

        match self.load_or_build(department).await {
            Ok(Some(index)) => {
                *slot = Slot::Ready(Arc::clone(&index));
                Ok(Some(index))
            }
            // Empty departments are rescanned on the next request
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::error!("{}", e);
                *slot = Slot::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn load_or_build(&self, department: &str) -> AppResult<Option<Arc<DepartmentIndex>>> {
        let dir = self.index_dir.join(department);
        let signature = self.embedder.signature();

        let persisted = {
            let dir = dir.clone();
            let signature = signature.clone();
            blocking(move || DepartmentIndex::load(&dir, &signature)).await
        };
        match persisted {
            Ok(Some(index)) => {
                tracing::info!(
                    "Loaded persisted index for '{}' ({} passages)",
                    department,
                    index.len()
                );
                return Ok(Some(Arc::new(index)));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Unreadable index for '{}', rebuilding: {}", department, e),
        }

        let loader = Arc::clone(&self.loader);
        let files = {
            let department = department.to_string();
            let loader = Arc::clone(&loader);
            blocking(move || loader.discover(&department)).await
        }
        .map_err(|e| build_error(department, e))?;

        if files.is_empty() {
            tracing::debug!("No documents for '{}'", department);
            return Ok(None);
        }

        self.builds.fetch_add(1, Ordering::SeqCst);
        tracing::info!("Building index for '{}' from {} files", department, files.len());

        let chunks = blocking(move || loader.load(&files))
            .await
            .map_err(|e| build_error(department, e))?;

        let total = chunks.len();
        let chunks: Vec<_> = chunks
            .into_iter()
            .filter(|chunk| chunk.department() == department)
            .collect();
        if chunks.len() < total {
            tracing::warn!(
                "Discarded {} passages tagged for another department while building '{}'",
                total - chunks.len(),
                department
            );
        }

        if chunks.is_empty() {
            tracing::debug!("No passages left for '{}'", department);
            return Ok(None);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content().to_string()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(|e| build_error(department, e))?;

        let index = DepartmentIndex::new(department, signature, chunks, embeddings)
            .map_err(|e| build_error(department, e))?;
        let index = Arc::new(index);

        {
            let index = Arc::clone(&index);
            blocking(move || index.persist(&dir))
                .await
                .map_err(|e| build_error(department, e))?;
        }

        tracing::info!(
            "Built index for '{}' ({} passages, collection {})",
            department,
            index.len(),
            index.collection_id()
        );
        Ok(Some(index))
    }

    async fn remove_persisted(&self, department: &str) -> AppResult<()> {
        let dir = self.index_dir.join(department);
        blocking(move || {
            if dir.exists() {
                std::fs::remove_dir_all(&dir).map_err(|e| {
                    AppError::Knowledge(format!("Failed to remove index {:?}: {}", dir, e))
                })?;
            }
            Ok(())
        })
        .await
    }
}

/// Lower-case a department name and reject names unusable as a directory.
fn normalize_department(department: &str) -> AppResult<String> {
    let department = department.trim().to_lowercase();
    let valid = !department.is_empty()
        && !department.starts_with('.')
        && !department.contains(['/', '\\', '\0']);

    if valid {
        Ok(department)
    } else {
        Err(AppError::InvalidInput(format!(
            "Invalid department name: '{}'",
            department
        )))
    }
}

fn build_error(department: &str, error: AppError) -> AppError {
    AppError::Build {
        department: department.to_string(),
        reason: error.to_string(),
    }
}

async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Knowledge(format!("Blocking task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_department() {
        assert_eq!(normalize_department(" Finance ").unwrap(), "finance");
        assert!(normalize_department("").is_err());
        assert!(normalize_department("../etc").is_err());
        assert!(normalize_department("hr/payroll").is_err());
        assert!(normalize_department(".hidden").is_err());
    }
}
