//! Process-local note store for tests and ephemeral runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use waflens_core::{NoteKey, NoteRecord};

use crate::{NoteStore, StoreError};

/// Notes held in a `BTreeMap`, so partition scans come back in row-key order.
#[derive(Debug, Default)]
pub struct MemoryNoteStore {
    notes: RwLock<BTreeMap<NoteKey, NoteRecord>>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.notes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.notes.read().await.is_empty()
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn get(&self, key: &NoteKey) -> Result<Option<NoteRecord>, StoreError> {
        Ok(self.notes.read().await.get(key).cloned())
    }

    async fn upsert(&self, record: &NoteRecord) -> Result<(), StoreError> {
        self.notes
            .write()
            .await
            .insert(record.key(), record.clone());
        Ok(())
    }

    async fn query_partition(&self, partition_key: &str) -> Result<Vec<NoteRecord>, StoreError> {
        let start = NoteKey {
            partition_key: partition_key.to_string(),
            row_key: String::new(),
        };
        let notes = self.notes.read().await;
        Ok(notes
            .range(start..)
            .take_while(|(key, _)| key.partition_key == partition_key)
            .map(|(_, note)| note.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use waflens_core::{EntityType, NoteContext};

    use super::*;

    fn note(pk: &str, rk: &str, content: &str) -> NoteRecord {
        NoteRecord {
            partition_key: pk.into(),
            row_key: rk.into(),
            content: content.into(),
            entity_type: EntityType::CustomRule,
            context: NoteContext::default(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let store = MemoryNoteStore::new();
        let key = NoteKey {
            partition_key: "p".into(),
            row_key: "p".into(),
        };
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_replaces() {
        let store = MemoryNoteStore::new();
        store.upsert(&note("p_r", "r", "first")).await.unwrap();
        store.upsert(&note("p_r", "r", "second")).await.unwrap();
        assert_eq!(store.len().await, 1);
        let got = store
            .get(&note("p_r", "r", "").key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.content, "second");
    }

    #[tokio::test]
    async fn partition_query_is_scoped_and_ordered() {
        let store = MemoryNoteStore::new();
        store.upsert(&note("p_r", "MC_1_b", "b")).await.unwrap();
        store.upsert(&note("p_r", "MC_0_a", "a")).await.unwrap();
        store.upsert(&note("p_other", "MC_0_a", "x")).await.unwrap();
        let rows = store.query_partition("p_r").await.unwrap();
        let rows: Vec<&str> = rows.iter().map(|n| n.row_key.as_str()).collect();
        assert_eq!(rows, ["MC_0_a", "MC_1_b"]);
    }

    #[tokio::test]
    async fn partition_query_stops_at_neighbouring_partitions() {
        let store = MemoryNoteStore::new();
        store.upsert(&note("p", "z", "before")).await.unwrap();
        store.upsert(&note("p_r", "", "empty row key")).await.unwrap();
        store.upsert(&note("p_r", "r", "rule")).await.unwrap();
        store.upsert(&note("p_r_x", "a", "longer partition")).await.unwrap();
        store.upsert(&note("p_s", "a", "after")).await.unwrap();
        let rows = store.query_partition("p_r").await.unwrap();
        let contents: Vec<&str> = rows.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, ["empty row key", "rule"]);
        assert!(store.query_partition("p_q").await.unwrap().is_empty());
    }
}
