//! Source file parsing and text extraction.

use crate::types::FileType;
use roleflow_core::{AppError, AppResult};
use std::fs;
use std::panic::UnwindSafe;
use std::path::Path;

/// Extracted content of one source file.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedDocument {
    /// Free text, subject to chunking
    Text(String),
    /// One rendered record per CSV row, never split further
    Rows(Vec<String>),
}

/// Parse a source file and extract clean text.
pub fn parse_file(path: &Path) -> AppResult<ParsedDocument> {
    let file_type = FileType::from_path(path)
        .ok_or_else(|| AppError::Knowledge(format!("Unsupported file type: {:?}", path)))?;

    let document = match file_type {
        FileType::Pdf => {
            let bytes = fs::read(path)
                .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;
            ParsedDocument::Text(extract_pdf(&bytes, path)?)
        }
        FileType::Markdown => ParsedDocument::Text(clean_markdown(&read_text(path)?)),
        FileType::Text => ParsedDocument::Text(read_text(path)?),
        FileType::Csv => ParsedDocument::Rows(parse_csv_rows(&read_text(path)?, path)?),
    };

    Ok(document)
}

fn read_text(path: &Path) -> AppResult<String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;

    if !is_likely_text(&raw) {
        return Err(AppError::Knowledge(format!(
            "Binary content in text file: {:?}",
            path
        )));
    }

    Ok(raw)
}

fn extract_pdf(bytes: &[u8], path: &Path) -> AppResult<String> {
    isolate_panic(path, || pdf_extract::extract_text_from_mem(bytes))?
        .map_err(|e| AppError::Knowledge(format!("Failed to extract PDF text {:?}: {}", path, e)))
}

/// Run an extractor that may panic on malformed input, reporting a panic as
/// an error for this file only.
fn isolate_panic<T>(path: &Path, extract: impl FnOnce() -> T + UnwindSafe) -> AppResult<T> {
    std::panic::catch_unwind(extract).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        AppError::Knowledge(format!("Extractor panicked on {:?}: {}", path, message))
    })
}

/// Clean markdown by removing excess formatting.
///
/// Blank lines are kept so paragraph boundaries survive for the chunker.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        // Remove markdown headers
        let trimmed = line.trim_start_matches('#').trim();

        // Skip horizontal rules and code fences
        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        result.push_str(trimmed);
        result.push('\n');
    }

    collapse_blank_lines(result.trim())
}

fn collapse_blank_lines(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut blank_run = 0;

    for line in text.lines() {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        result.push_str(line);
        result.push('\n');
    }

    result.trim_end().to_string()
}

/// Render each CSV record as `column: value` lines.
fn parse_csv_rows(text: &str, path: &Path) -> AppResult<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::Knowledge(format!("Failed to read CSV header {:?}: {}", path, e)))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record
            .map_err(|e| AppError::Knowledge(format!("Failed to read CSV row {:?}: {}", path, e)))?;

        let rendered: Vec<String> = headers
            .iter()
            .zip(record.iter())
            .map(|(column, value)| format!("{}: {}", column, value))
            .collect();

        if !rendered.is_empty() {
            rows.push(rendered.join("\n"));
        }
    }

    Ok(rows)
}

/// Check if text is likely UTF-8 text (not binary).
fn is_likely_text(data: &str) -> bool {
    // Simple heuristic: check for null bytes
    !data.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clean_markdown() {
        let input = "# Header\n\nSome text\n\n```rust\ncode\n```\n\n\n\nMore text";
        let output = clean_markdown(input);
        assert!(output.starts_with("Header\n\nSome text"));
        assert!(output.contains("More text"));
        assert!(!output.contains("```"));
        assert!(!output.contains("\n\n\n"));
    }

    #[test]
    fn test_csv_rows_render_columns() {
        let csv = "employee_id,full_name,department\nE1,Asha Rao,Finance\nE2,Ben Ode,HR\n";
        let rows = parse_csv_rows(csv, Path::new("people.csv")).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], "employee_id: E1\nfull_name: Asha Rao\ndepartment: Finance");
    }

    #[test]
    fn test_parse_file_dispatches_on_extension() {
        let dir = TempDir::new().unwrap();
        let md = dir.path().join("policy.md");
        let csv = dir.path().join("ledger.csv");
        let other = dir.path().join("deck.pptx");
        std::fs::write(&md, "## Travel\nEconomy class only").unwrap();
        std::fs::write(&csv, "item,amount\nlaptop,1200\n").unwrap();
        std::fs::write(&other, "binary").unwrap();

        assert_eq!(
            parse_file(&md).unwrap(),
            ParsedDocument::Text("Travel\nEconomy class only".to_string())
        );
        assert_eq!(
            parse_file(&csv).unwrap(),
            ParsedDocument::Rows(vec!["item: laptop\namount: 1200".to_string()])
        );
        assert!(parse_file(&other).is_err());
    }

    #[test]
    fn test_text_with_nul_bytes_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.txt");
        std::fs::write(&path, "abc\0def").unwrap();
        assert!(parse_file(&path).is_err());
    }

    #[test]
    fn test_extractor_panic_becomes_file_error() {
        let err = isolate_panic(Path::new("broken.pdf"), || -> String {
            panic!("missing xref table")
        })
        .unwrap_err();

        assert!(matches!(err, AppError::Knowledge(_)));
        assert!(err.to_string().contains("missing xref table"));
        assert_eq!(isolate_panic(Path::new("ok.pdf"), || 7).unwrap(), 7);
    }

    #[test]
    fn test_malformed_pdf_is_an_error_not_a_panic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.4\n1 0 obj << /Type /Catalog >>\ntrailer <<>>\n%%EOF").unwrap();

        assert!(parse_file(&path).is_err());
    }
}
