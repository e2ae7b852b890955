use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::index::{IndexTag, VectorIndex};
use crate::domain::{Chunk, DomainError, Embedding, Result};

const FORMAT_VERSION: u32 = 1;
const MANIFEST_FILE: &str = "manifest.json";
const CHUNKS_FILE: &str = "chunks.json";
const VECTORS_FILE: &str = "vectors.json";
const SWAP_ATTEMPTS: usize = 3;

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    document_id: Uuid,
    document_name: String,
    model: String,
    dimension: usize,
    chunk_count: usize,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkRecord {
    index: usize,
    start: usize,
    end: usize,
    text: String,
}

fn storage_err(path: &Path, e: impl std::fmt::Display) -> DomainError {
    DomainError::storage(format!("{}: {e}", path.display()))
}

async fn write_json<T: Serialize>(dir: &Path, file: &str, value: &T) -> Result<()> {
    let path = dir.join(file);
    let json = serde_json::to_vec(value).map_err(|e| storage_err(&path, e))?;
    fs::write(&path, json).await.map_err(|e| storage_err(&path, e))
}

async fn read_json<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<T> {
    let path = dir.join(file);
    let bytes = fs::read(&path).await.map_err(|e| storage_err(&path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| storage_err(&path, e))
}

async fn remove_dir_if_present(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(storage_err(path, e)),
        _ => Ok(()),
    }
}

/// Every write stages into its own sibling directory, so concurrent writers
/// of the same location never touch each other's files.
fn staging_path(location: &Path) -> PathBuf {
    let name = location
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string());
    location.with_file_name(format!(".{name}.{}.staging", Uuid::new_v4()))
}

impl VectorIndex {
    /// Whether `location` holds a persisted index.
    pub async fn exists(location: &Path) -> bool {
        fs::try_exists(location.join(MANIFEST_FILE))
            .await
            .unwrap_or(false)
    }

    /// Writes the index as a directory of JSON files.
    ///
    /// Files are staged in a sibling directory and moved into place at the
    /// end, so a failure never leaves a partial index at `location`. If
    /// another writer lands a complete index there first, that one is kept.
    #[instrument(skip(self), fields(document_id = %self.document_id, chunks = self.len()))]
    pub async fn persist(&self, location: &Path) -> Result<()> {
        let staging = staging_path(location);
        fs::create_dir_all(&staging)
            .await
            .map_err(|e| storage_err(&staging, e))?;

        let written = match self.write_files(&staging).await {
            Ok(()) => Self::swap_into_place(&staging, location).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = remove_dir_if_present(&staging).await {
                debug!(error = %cleanup, "staging cleanup failed");
            }
            return Err(e);
        }

        debug!(location = %location.display(), "index persisted");
        Ok(())
    }

    async fn write_files(&self, dir: &Path) -> Result<()> {
        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            document_id: self.document_id,
            document_name: self.document_name.clone(),
            model: self.tag.model.clone(),
            dimension: self.tag.dimension,
            chunk_count: self.len(),
            created_at: self.created_at,
        };
        let records: Vec<ChunkRecord> = self
            .chunks
            .iter()
            .map(|c| ChunkRecord {
                index: c.index,
                start: c.start,
                end: c.end,
                text: c.text.clone(),
            })
            .collect();
        let vectors: Vec<&[f32]> = self.vectors.iter().map(Embedding::as_slice).collect();

        write_json(dir, CHUNKS_FILE, &records).await?;
        write_json(dir, VECTORS_FILE, &vectors).await?;
        write_json(dir, MANIFEST_FILE, &manifest).await
    }

    /// Replaces `location` with `staging`. Concurrent writers may remove or
    /// replace `location` in between, so the swap is retried and succeeds as
    /// long as some complete index ends up in place.
    async fn swap_into_place(staging: &Path, location: &Path) -> Result<()> {
        let mut last_error = None;
        for _ in 0..SWAP_ATTEMPTS {
            if let Err(e) = remove_dir_if_present(location).await {
                last_error = Some(e);
            }
            match fs::rename(staging, location).await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = Some(storage_err(location, e)),
            }
        }

        if Self::exists(location).await {
            debug!(location = %location.display(), "index already written by another writer");
            return remove_dir_if_present(staging).await;
        }
        Err(last_error.unwrap_or_else(|| storage_err(location, "swap failed")))
    }

    /// Reads an index written by [`VectorIndex::persist`]. No embeddings are
    /// recomputed.
    #[instrument]
    pub async fn load(location: &Path) -> Result<Self> {
        let manifest: Manifest = read_json(location, MANIFEST_FILE).await?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(DomainError::incompatible(format!(
                "unsupported index format version {}",
                manifest.format_version
            )));
        }

        let records: Vec<ChunkRecord> = read_json(location, CHUNKS_FILE).await?;
        let vectors: Vec<Vec<f32>> = read_json(location, VECTORS_FILE).await?;
        if records.len() != manifest.chunk_count {
            return Err(DomainError::incompatible(format!(
                "manifest lists {} chunks, found {}",
                manifest.chunk_count,
                records.len()
            )));
        }

        let chunks = records
            .into_iter()
            .map(|r| Chunk {
                index: r.index,
                start: r.start,
                end: r.end,
                text: r.text,
                document_id: manifest.document_id,
            })
            .collect();

        let index = Self {
            document_id: manifest.document_id,
            document_name: manifest.document_name,
            tag: IndexTag::new(manifest.model, manifest.dimension),
            chunks,
            vectors: vectors.into_iter().map(Embedding::new).collect(),
            created_at: manifest.created_at,
        };
        index.validate()?;

        debug!(chunks = index.len(), "index loaded");
        Ok(index)
    }
}
