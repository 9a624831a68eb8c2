//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Department tag for content outside any department partition.
pub const GENERAL_DEPARTMENT: &str = "general";

/// Supported source document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Markdown,
    Text,
    Csv,
}

impl FileType {
    /// Detect file type from extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "md" | "markdown" => Some(Self::Markdown),
            "txt" => Some(Self::Text),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Markdown => "markdown",
            Self::Text => "text",
            Self::Csv => "csv",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(Self::Pdf),
            "markdown" => Some(Self::Markdown),
            "text" => Some(Self::Text),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// A tagged passage of source text.
///
/// Immutable once produced by a loader. `department` is always lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageChunk {
    content: String,
    department: String,
    source_file: String,
    file_type: FileType,
    full_path: PathBuf,
}

impl PassageChunk {
    pub fn new(
        content: impl Into<String>,
        department: &str,
        source_file: impl Into<String>,
        file_type: FileType,
        full_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            content: content.into(),
            department: department.trim().to_lowercase(),
            source_file: source_file.into(),
            file_type,
            full_path: full_path.into(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn department(&self) -> &str {
        &self.department
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn full_path(&self) -> &Path {
        &self.full_path
    }
}

/// A passage returned by one retrieval call, with its distance to the query.
///
/// Lower `distance` is closer. Valid for the lifetime of a single query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePassage {
    pub chunk: PassageChunk,
    pub distance: f32,
}

impl CandidatePassage {
    pub fn new(chunk: PassageChunk, distance: f32) -> Self {
        Self { chunk, distance }
    }

    pub fn content(&self) -> &str {
        self.chunk.content()
    }

    pub fn department(&self) -> &str {
        self.chunk.department()
    }

    pub fn source_file(&self) -> &str {
        self.chunk.source_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_path(Path::new("q3.PDF")), Some(FileType::Pdf));
        assert_eq!(FileType::from_path(Path::new("a.markdown")), Some(FileType::Markdown));
        assert_eq!(FileType::from_path(Path::new("notes.txt")), Some(FileType::Text));
        assert_eq!(FileType::from_path(Path::new("hr_data.csv")), Some(FileType::Csv));
        assert_eq!(FileType::from_path(Path::new("deck.pptx")), None);
        assert_eq!(FileType::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_passage_department_is_lowercased() {
        let chunk = PassageChunk::new(
            "Budget approved",
            " Finance ",
            "budget.md",
            FileType::Markdown,
            "data/Finance/budget.md",
        );
        assert_eq!(chunk.department(), "finance");
        assert_eq!(chunk.source_file(), "budget.md");
    }
}
