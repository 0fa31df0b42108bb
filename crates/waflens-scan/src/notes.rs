//! Note writes and single-note reads.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use waflens_core::{NoteRecord, NoteRequest, NoteTarget, derive_key};
use waflens_store::{NoteStore, StoreError};

use crate::SaveNoteError;

pub struct NotesService {
    store: Arc<dyn NoteStore>,
}

impl NotesService {
    pub fn new(store: Arc<dyn NoteStore>) -> Self {
        Self { store }
    }

    /// Validate `request`, derive its key and upsert the note.
    ///
    /// Invalid requests are rejected before the store is touched. Keys come
    /// from the same derivation the overlay reads with, so a saved note shows
    /// up on the next scan.
    pub async fn save_note(
        &self,
        request: NoteRequest,
        cancel: &CancellationToken,
    ) -> Result<NoteRecord, SaveNoteError> {
        let (target, context) = request.validate()?;
        if cancel.is_cancelled() {
            return Err(SaveNoteError::Cancelled);
        }

        let key = derive_key(&target);
        let record = NoteRecord {
            partition_key: key.partition_key,
            row_key: key.row_key,
            content: request.notes_content,
            entity_type: target.entity_type(),
            context,
            updated_at: Utc::now(),
        };
        self.store.upsert(&record).await?;
        info!(key = %record.key(), entity_type = %record.entity_type, "saved note");
        Ok(record)
    }

    pub async fn get_note(&self, target: &NoteTarget) -> Result<Option<NoteRecord>, StoreError> {
        self.store.get(&derive_key(target)).await
    }
}
