// Chunk Domain Model - ordered partition of a record set

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Default number of records per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 200;

/// An ordered, non-empty slice of the input assigned to one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<T> {
    /// Position of this chunk in the partition (0-based)
    pub index: usize,
    pub records: Vec<T>,
}

impl<T> Chunk<T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Known-good chunk sizes.
///
/// `Single` puts every record in its own job (one insert per record),
/// `Standard` batches 200 records per insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkPreset {
    Single,
    Standard,
}

impl ChunkPreset {
    pub fn size(self) -> usize {
        match self {
            ChunkPreset::Single => 1,
            ChunkPreset::Standard => DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Split `records` into consecutive chunks of at most `chunk_size` records.
///
/// Order is preserved: concatenating the chunks yields the input. The last
/// chunk may be shorter. Empty input yields no chunks.
///
/// # Errors
/// - `DomainError::InvalidChunkSize` if `chunk_size` is 0
pub fn partition<T>(records: Vec<T>, chunk_size: usize) -> Result<Vec<Chunk<T>>> {
    if chunk_size == 0 {
        return Err(DomainError::InvalidChunkSize(chunk_size));
    }

    let mut chunks = Vec::with_capacity(records.len().div_ceil(chunk_size));
    let mut iter = records.into_iter().peekable();

    while iter.peek().is_some() {
        let records: Vec<T> = iter.by_ref().take(chunk_size).collect();
        chunks.push(Chunk {
            index: chunks.len(),
            records,
        });
    }

    Ok(chunks)
}
