use std::sync::Arc;

use super::filter::Query;
use super::types::{Predicate, SortKey};
use crate::database::models::ResourceKind;
use crate::database::{Page, Record, RecordStore};
use crate::error::Result;

/// Runs composed queries against a record store. Generic over resource type:
/// the kind is data, not a type parameter.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn RecordStore>,
    debug_logging: bool,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            debug_logging: false,
        }
    }

    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Active records matching every predicate, ordered by `sort_keys` (or
    /// ascending `sourcedId`), windowed by `offset`/`limit`. `total` counts the
    /// full matching set.
    pub async fn query(
        &self,
        kind: ResourceKind,
        predicates: Vec<Predicate>,
        sort_keys: Vec<SortKey>,
        limit: usize,
        offset: usize,
    ) -> Result<Page> {
        let query = Query::new(kind).filter(predicates).order(sort_keys).page(limit, offset);
        if self.debug_logging {
            let rendered: Vec<String> = query.predicates().iter().map(|p| p.to_string()).collect();
            tracing::debug!(
                kind = %kind,
                predicates = ?rendered,
                sort = ?query.sort_keys(),
                limit,
                offset,
                "running query"
            );
        }
        let page = self.store.query(&query).await?;
        Ok(page)
    }

    /// Lookup by id that treats tombstones as absent
    pub async fn get_active(&self, kind: ResourceKind, sourced_id: &str) -> Result<Option<Record>> {
        let found = self.store.find(kind, sourced_id).await?;
        Ok(found.filter(Record::is_active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::filter::types::{FilterOp, Literal};
    use chrono::Utc;
    use serde_json::json;

    async fn seeded() -> QueryEngine {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        for (id, weight) in [("c3", 0.3), ("c1", 0.1), ("c2", 0.2), ("c4", 0.4), ("c5", 0.5)] {
            let mut r = Record::new(id, now);
            r.set("title", json!(format!("Category {}", id))).set("weight", json!(weight));
            store.insert(ResourceKind::Category, r).await.unwrap();
        }
        let mut gone = Record::new("c0", now);
        gone.set("title", json!("Deleted")).set("weight", json!(0.9));
        gone.mark_deleted(now);
        store.insert(ResourceKind::Category, gone).await.unwrap();
        QueryEngine::new(store)
    }

    fn ids(page: &Page) -> Vec<&str> {
        page.records.iter().map(|r| r.sourced_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_default_order_and_tombstones_hidden() {
        let engine = seeded().await;
        let page = engine.query(ResourceKind::Category, vec![], vec![], 100, 0).await.unwrap();
        assert_eq!(ids(&page), vec!["c1", "c2", "c3", "c4", "c5"]);
        assert_eq!(page.total, 5);
    }

    #[tokio::test]
    async fn test_total_independent_of_window() {
        let engine = seeded().await;
        let pred = || vec![Predicate::new("weight", FilterOp::Ge, Literal::Float(0.2))];
        let a = engine.query(ResourceKind::Category, pred(), vec![], 2, 0).await.unwrap();
        let b = engine.query(ResourceKind::Category, pred(), vec![], 1, 3).await.unwrap();
        let c = engine.query(ResourceKind::Category, pred(), vec![], 10, 50).await.unwrap();
        assert_eq!(ids(&a), vec!["c2", "c3"]);
        assert_eq!(ids(&b), vec!["c5"]);
        assert!(c.records.is_empty());
        assert_eq!((a.total, b.total, c.total), (4, 4, 4));
    }

    #[tokio::test]
    async fn test_sort_desc() {
        let engine = seeded().await;
        let page = engine
            .query(ResourceKind::Category, vec![], vec![SortKey::desc("weight")], 2, 0)
            .await
            .unwrap();
        assert_eq!(ids(&page), vec!["c5", "c4"]);
    }

    #[tokio::test]
    async fn test_get_active() {
        let engine = seeded().await;
        assert!(engine.get_active(ResourceKind::Category, "c1").await.unwrap().is_some());
        assert!(engine.get_active(ResourceKind::Category, "c0").await.unwrap().is_none());
        assert!(engine.get_active(ResourceKind::Category, "nope").await.unwrap().is_none());
        assert!(engine.get_active(ResourceKind::LineItem, "c1").await.unwrap().is_none());
    }
}
