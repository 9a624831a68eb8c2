//! In-memory department index with SQLite persistence.
//!
//! Each department is stored in its own database at
//! `<index_dir>/<department>/index.sqlite`. A `meta` table records the
//! collection id and the embedding signature the vectors were produced with;
//! `passages` holds the tagged chunks and little-endian f32 embedding blobs.

use crate::types::{FileType, PassageChunk};
use crate::vector_index::{squared_euclidean, VectorIndex};
use roleflow_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// File name of a persisted department index inside its directory.
pub const INDEX_FILE_NAME: &str = "index.sqlite";

/// Stable collection identifier for a department.
pub fn collection_id(department: &str) -> String {
    format!("dept_{}", department.trim().to_lowercase())
}

/// Embedded passages of a single department.
#[derive(Debug, Clone)]
pub struct DepartmentIndex {
    department: String,
    collection_id: String,
    signature: String,
    entries: Vec<(PassageChunk, Vec<f32>)>,
}

impl DepartmentIndex {
    /// Assemble an index from chunks and their embeddings (same order).
    pub fn new(
        department: &str,
        signature: impl Into<String>,
        chunks: Vec<PassageChunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> AppResult<Self> {
        if chunks.len() != embeddings.len() {
            return Err(AppError::Knowledge(format!(
                "Got {} embeddings for {} passages",
                embeddings.len(),
                chunks.len()
            )));
        }

        let department = department.trim().to_lowercase();
        Ok(Self {
            collection_id: collection_id(&department),
            department,
            signature: signature.into(),
            entries: chunks.into_iter().zip(embeddings).collect(),
        })
    }

    pub fn collection_id(&self) -> &str {
        &self.collection_id
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn passages(&self) -> impl Iterator<Item = &PassageChunk> {
        self.entries.iter().map(|(chunk, _)| chunk)
    }

    /// Path of the database file inside a department directory.
    pub fn db_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE_NAME)
    }

    /// Write the index to `dir`, replacing any previous database there.
    pub fn persist(&self, dir: &Path) -> AppResult<()> {
        std::fs::create_dir_all(dir)
            .map_err(|e| AppError::Knowledge(format!("Failed to create index directory: {}", e)))?;

        let db_path = Self::db_path(dir);
        if db_path.exists() {
            std::fs::remove_file(&db_path).map_err(|e| {
                AppError::Knowledge(format!("Failed to remove stale index {:?}: {}", db_path, e))
            })?;
        }

        let mut conn = open(&db_path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE passages (
                position INTEGER PRIMARY KEY,
                content TEXT NOT NULL,
                department TEXT NOT NULL,
                source_file TEXT NOT NULL,
                file_type TEXT NOT NULL,
                full_path TEXT NOT NULL,
                embedding BLOB NOT NULL
            );
            "#,
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to create tables: {}", e)))?;

        let tx = conn
            .transaction()
            .map_err(|e| AppError::Knowledge(format!("Failed to begin transaction: {}", e)))?;
        {
            let mut meta = tx
                .prepare("INSERT INTO meta (key, value) VALUES (?1, ?2)")
                .map_err(|e| AppError::Knowledge(format!("Failed to prepare insert: {}", e)))?;
            let built_at = chrono::Utc::now().to_rfc3339();
            for (key, value) in [
                ("collection_id", self.collection_id.as_str()),
                ("department", self.department.as_str()),
                ("signature", self.signature.as_str()),
                ("built_at", built_at.as_str()),
            ] {
                meta.execute(params![key, value])
                    .map_err(|e| AppError::Knowledge(format!("Failed to write metadata: {}", e)))?;
            }

            let mut insert = tx
                .prepare(
                    "INSERT INTO passages \
                     (position, content, department, source_file, file_type, full_path, embedding) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(|e| AppError::Knowledge(format!("Failed to prepare insert: {}", e)))?;

            for (position, (chunk, embedding)) in self.entries.iter().enumerate() {
                insert
                    .execute(params![
                        position as i64,
                        chunk.content(),
                        chunk.department(),
                        chunk.source_file(),
                        chunk.file_type().as_str(),
                        chunk.full_path().to_string_lossy().into_owned(),
                        embedding_to_bytes(embedding),
                    ])
                    .map_err(|e| AppError::Knowledge(format!("Failed to insert passage: {}", e)))?;
            }
        }
        tx.commit()
            .map_err(|e| AppError::Knowledge(format!("Failed to commit index: {}", e)))?;

        tracing::debug!(
            "Persisted {} passages for '{}' to {:?}",
            self.entries.len(),
            self.department,
            db_path
        );
        Ok(())
    }

    /// Load a persisted index from `dir`.
    ///
    /// Returns `None` when nothing usable is stored: no database, no
    /// passages, or vectors from a different embedding signature.
    pub fn load(dir: &Path, signature: &str) -> AppResult<Option<Self>> {
        let db_path = Self::db_path(dir);
        if !db_path.is_file() {
            return Ok(None);
        }

        let conn = open(&db_path)?;

        let stored_signature = read_meta(&conn, "signature")?;
        if stored_signature.as_deref() != Some(signature) {
            tracing::info!(
                "Ignoring index at {:?}: built with {:?}, active embedding is {}",
                db_path,
                stored_signature,
                signature
            );
            return Ok(None);
        }

        let department = read_meta(&conn, "department")?
            .ok_or_else(|| AppError::Knowledge(format!("Index {:?} has no department", db_path)))?;

        let mut stmt = conn
            .prepare(
                "SELECT content, department, source_file, file_type, full_path, embedding \
                 FROM passages ORDER BY position",
            )
            .map_err(|e| AppError::Knowledge(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Vec<u8>>(5)?,
                ))
            })
            .map_err(|e| AppError::Knowledge(format!("Failed to query passages: {}", e)))?;

        let mut chunks = Vec::new();
        let mut embeddings = Vec::new();
        for row in rows {
            let (content, tag, source_file, file_type, full_path, blob) =
                row.map_err(|e| AppError::Knowledge(format!("Failed to read passage: {}", e)))?;
            let file_type = FileType::parse(&file_type).ok_or_else(|| {
                AppError::Knowledge(format!("Unknown file type '{}' in {:?}", file_type, db_path))
            })?;

            chunks.push(PassageChunk::new(content, &tag, source_file, file_type, full_path));
            embeddings.push(bytes_to_embedding(&blob)?);
        }

        if chunks.is_empty() {
            return Ok(None);
        }

        Self::new(&department, signature, chunks, embeddings).map(Some)
    }
}

impl VectorIndex for DepartmentIndex {
    fn department(&self) -> &str {
        &self.department
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> AppResult<Vec<(PassageChunk, f32)>> {
        let mut scored: Vec<(&PassageChunk, f32)> = self
            .entries
            .iter()
            .map(|(chunk, embedding)| (chunk, squared_euclidean(query_embedding, embedding)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(chunk, distance)| (chunk.clone(), distance))
            .collect())
    }
}

fn open(db_path: &Path) -> AppResult<Connection> {
    Connection::open(db_path)
        .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index {:?}: {}", db_path, e)))
}

fn read_meta(conn: &Connection, key: &str) -> AppResult<Option<String>> {
    conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
        row.get(0)
    })
    .optional()
    .map_err(|e| AppError::Knowledge(format!("Failed to read index metadata: {}", e)))
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
