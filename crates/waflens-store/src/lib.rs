//! Note storage: a key-value contract over (partition key, row key) plus
//! in-memory and DuckDB implementations.

use async_trait::async_trait;
use waflens_core::{NoteKey, NoteRecord};

mod error;
mod memory;
pub use error::StoreError;
pub use memory::MemoryNoteStore;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckNoteStore;

/// Key-value access to persisted notes.
///
/// A missing key is `Ok(None)`, never an error. `upsert` replaces any record
/// stored under the same key. `query_partition` returns records ordered by
/// row key.
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn get(&self, key: &NoteKey) -> Result<Option<NoteRecord>, StoreError>;

    async fn upsert(&self, record: &NoteRecord) -> Result<(), StoreError>;

    async fn query_partition(&self, partition_key: &str) -> Result<Vec<NoteRecord>, StoreError>;
}
