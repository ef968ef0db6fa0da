use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::models::ResourceKind;
use super::{same_key, Page, Record, RecordStore, RecordUpdate, StoreError};
use crate::filter::matcher::compare_records;
use crate::filter::Query;

/// Process-local record store. Backs tests and `--store memory`.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<ResourceKind, BTreeMap<String, Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find(&self, kind: ResourceKind, sourced_id: &str) -> Result<Option<Record>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(&kind).and_then(|m| m.get(sourced_id)).cloned())
    }

    async fn query(&self, query: &Query) -> Result<Page, StoreError> {
        let records = self.records.read().await;
        let Some(table) = records.get(&query.kind()) else {
            return Ok(Page::default());
        };

        let mut matched: Vec<&Record> = table.values().filter(|r| query.matches(r)).collect();
        let keys = query.sort_keys();
        matched.sort_by(|a, b| compare_records(a, b, &keys));

        let total = matched.len() as u64;
        let window = matched
            .into_iter()
            .skip(query.offset())
            .take(query.limit().unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(Page { records: window, total })
    }

    async fn insert(&self, kind: ResourceKind, record: Record) -> Result<Record, StoreError> {
        let mut records = self.records.write().await;
        let table = records.entry(kind).or_default();
        if table.get(&record.sourced_id).is_some_and(Record::is_active) {
            return Err(StoreError::Duplicate {
                kind,
                id: record.sourced_id,
            });
        }
        if let Some(key) = kind.unique_key() {
            let clash = table
                .values()
                .any(|other| other.is_active() && other.sourced_id != record.sourced_id && same_key(key, other, &record));
            if clash {
                return Err(StoreError::UniqueViolation {
                    kind,
                    fields: kind.unique_key_label(),
                });
            }
        }
        table.insert(record.sourced_id.clone(), record.clone());
        Ok(record)
    }

    async fn update_with(
        &self,
        kind: ResourceKind,
        sourced_id: &str,
        apply: RecordUpdate,
    ) -> Result<Option<Record>, StoreError> {
        let mut records = self.records.write().await;
        let Some(slot) = records.get_mut(&kind).and_then(|t| t.get_mut(sourced_id)) else {
            return Ok(None);
        };
        if !slot.is_active() {
            return Ok(None);
        }
        // Work on a copy so a rejected change leaves the stored record alone
        let mut next = slot.clone();
        apply(&mut next).map_err(|e| StoreError::Rejected(Box::new(e)))?;
        *slot = next.clone();
        Ok(Some(next))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
