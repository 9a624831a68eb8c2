//! Document discovery and loading.
//!
//! Documents live under `<data_root>/<department>/...`. The department tag of a
//! file is the first path component below the data root, lower-cased; files
//! sitting directly in the data root are tagged `general`.

use crate::chunker::chunk_text;
use crate::parser::{parse_file, ParsedDocument};
use crate::types::{FileType, PassageChunk, GENERAL_DEPARTMENT};
use roleflow_core::{AppError, AppResult};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Produces tagged passages from source documents.
///
/// Implementations are blocking; callers on an async runtime should run them
/// on a blocking thread.
pub trait DocumentLoader: Send + Sync {
    /// List supported files in a department's partition. Empty if none.
    fn discover(&self, department: &str) -> AppResult<Vec<PathBuf>>;

    /// Parse and chunk the given files into tagged passages.
    fn load(&self, files: &[PathBuf]) -> AppResult<Vec<PassageChunk>>;

    /// Departments that currently contain at least one supported file.
    fn departments(&self) -> AppResult<Vec<String>>;
}

/// Filesystem-backed `DocumentLoader`.
#[derive(Debug, Clone)]
pub struct FsDocumentLoader {
    data_root: PathBuf,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FsDocumentLoader {
    pub fn new(data_root: impl Into<PathBuf>, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            data_root: data_root.into(),
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Department tag derived from a file's location under the data root.
    pub fn department_for(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.data_root).unwrap_or(path);
        let mut components = relative.components().filter_map(|c| match c {
            Component::Normal(name) => Some(name),
            _ => None,
        });

        match (components.next(), components.next()) {
            // At least one directory level below the root
            (Some(dir), Some(_)) => dir.to_string_lossy().to_lowercase(),
            _ => GENERAL_DEPARTMENT.to_string(),
        }
    }

    /// Partition directories whose lower-cased name equals `department`.
    fn partitions(&self, department: &str) -> AppResult<Vec<PathBuf>> {
        if !self.data_root.is_dir() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.data_root).map_err(|e| {
            AppError::Knowledge(format!(
                "Failed to read data root {:?}: {}",
                self.data_root, e
            ))
        })?;

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().to_lowercase() == department)
                    .unwrap_or(false)
            })
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    fn load_file(&self, path: &Path) -> AppResult<Vec<PassageChunk>> {
        let file_type = FileType::from_path(path)
            .ok_or_else(|| AppError::Knowledge(format!("Unsupported file type: {:?}", path)))?;
        let department = self.department_for(path);
        let source_file = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        let pieces = match parse_file(path)? {
            ParsedDocument::Text(text) => chunk_text(&text, self.chunk_size, self.chunk_overlap),
            ParsedDocument::Rows(rows) => rows,
        };

        Ok(pieces
            .into_iter()
            .map(|content| {
                PassageChunk::new(content, &department, source_file.clone(), file_type, path)
            })
            .collect())
    }
}

impl DocumentLoader for FsDocumentLoader {
    fn discover(&self, department: &str) -> AppResult<Vec<PathBuf>> {
        let department = department.trim().to_lowercase();
        let mut files = Vec::new();

        if department == GENERAL_DEPARTMENT {
            // Loose files in the data root belong to `general` as well
            files.extend(supported_files(&self.data_root, 1));
        }

        for partition in self.partitions(&department)? {
            files.extend(supported_files(&partition, usize::MAX));
        }

        files.sort();
        files.dedup();
        Ok(files)
    }

    fn load(&self, files: &[PathBuf]) -> AppResult<Vec<PassageChunk>> {
        let mut chunks = Vec::new();

        for path in files {
            match self.load_file(path) {
                Ok(mut loaded) => {
                    tracing::debug!("Loaded {} passages from {:?}", loaded.len(), path);
                    chunks.append(&mut loaded);
                }
                Err(e) => tracing::warn!("Skipping {:?}: {}", path, e),
            }
        }

        Ok(chunks)
    }

    fn departments(&self) -> AppResult<Vec<String>> {
        let mut departments = BTreeSet::new();

        for path in supported_files(&self.data_root, usize::MAX) {
            departments.insert(self.department_for(&path));
        }

        Ok(departments.into_iter().collect())
    }
}

/// Supported files under `root`, up to `max_depth` levels deep.
fn supported_files(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    if !root.is_dir() {
        return Vec::new();
    }

    WalkDir::new(root)
        .max_depth(max_depth)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| FileType::from_path(p).is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, FsDocumentLoader) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("data");
        fs::create_dir_all(root.join("Finance/reports")).unwrap();
        fs::create_dir_all(root.join("marketing")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();

        fs::write(root.join("Finance/reports/q3.md"), "# Q3\n\nRevenue rose 12%.").unwrap();
        fs::write(root.join("Finance/ledger.csv"), "item,amount\nlaptop,1200\nchair,300\n").unwrap();
        fs::write(root.join("Finance/notes.docx"), "ignored").unwrap();
        fs::write(root.join("marketing/plan.txt"), "Launch in May.").unwrap();
        fs::write(root.join("handbook.md"), "Be kind.").unwrap();

        let loader = FsDocumentLoader::new(&root, 1500, 150);
        (dir, loader)
    }

    #[test]
    fn test_department_for_paths() {
        let (_dir, loader) = fixture();
        let root = loader.data_root().to_path_buf();

        assert_eq!(loader.department_for(&root.join("Finance/reports/q3.md")), "finance");
        assert_eq!(loader.department_for(&root.join("handbook.md")), "general");
    }

    #[test]
    fn test_discover_matches_partition_case_insensitively() {
        let (_dir, loader) = fixture();
        let files = loader.discover("finance").unwrap();

        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["ledger.csv", "q3.md"]);
    }

    #[test]
    fn test_discover_empty_and_missing_departments() {
        let (_dir, loader) = fixture();
        assert!(loader.discover("empty").unwrap().is_empty());
        assert!(loader.discover("legal").unwrap().is_empty());
    }

    #[test]
    fn test_general_includes_loose_root_files() {
        let (_dir, loader) = fixture();
        let files = loader.discover("general").unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("handbook.md"));
    }

    #[test]
    fn test_load_tags_and_keeps_csv_rows_whole() {
        let (_dir, loader) = fixture();
        let files = loader.discover("finance").unwrap();
        let chunks = loader.load(&files).unwrap();

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.department() == "finance"));

        let rows: Vec<_> = chunks
            .iter()
            .filter(|c| c.file_type() == FileType::Csv)
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].content(), "item: laptop\namount: 1200");
        assert_eq!(rows[0].source_file(), "ledger.csv");
    }

    #[test]
    fn test_unreadable_file_is_skipped() {
        let (dir, loader) = fixture();
        let bogus = dir.path().join("data/Finance/broken.txt");
        fs::write(&bogus, "bad\0bytes").unwrap();

        let files = loader.discover("finance").unwrap();
        let chunks = loader.load(&files).unwrap();
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_departments_lists_partitions_with_documents() {
        let (_dir, loader) = fixture();
        assert_eq!(
            loader.departments().unwrap(),
            vec!["finance", "general", "marketing"]
        );
    }
}
