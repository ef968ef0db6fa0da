use chrono::Utc;
use serde_json::{Map, Value};
use std::marker::PhantomData;

use crate::database::models::payload::{self, WriteMode};
use crate::database::models::Resource;
use crate::database::{Page, Record, RecordUpdate, StoreError};
use crate::error::{Error, Result};
use crate::filter::{FilterParser, QueryEngine, SortParser};

/// The five operations every gradebook resource type exposes.
///
/// Reads go through the query engine, so tombstones are never visible. Each
/// write is a single store call.
pub struct ResourceService<R: Resource> {
    engine: QueryEngine,
    _resource: PhantomData<R>,
}

impl<R: Resource> Clone for ResourceService<R> {
    fn clone(&self) -> Self {
        Self::new(self.engine.clone())
    }
}

impl<R: Resource> ResourceService<R> {
    pub fn new(engine: QueryEngine) -> Self {
        Self {
            engine,
            _resource: PhantomData,
        }
    }

    pub async fn get_by_id(&self, sourced_id: &str) -> Result<Record> {
        self.engine
            .get_active(R::KIND, sourced_id)
            .await?
            .ok_or_else(|| not_found::<R>(sourced_id))
    }

    pub async fn list(
        &self,
        limit: usize,
        offset: usize,
        filter_expr: Option<&str>,
        sort_expr: Option<&str>,
    ) -> Result<Page> {
        let schema = R::schema();
        let predicates = filter_expr.map(|f| FilterParser::parse(f, schema)).unwrap_or_default();
        let sort_keys = sort_expr.map(|s| SortParser::parse(s, schema)).unwrap_or_default();
        self.engine.query(R::KIND, predicates, sort_keys, limit, offset).await
    }

    pub async fn create(&self, body: &Map<String, Value>) -> Result<Record> {
        let schema = R::schema();
        let sourced_id = payload::sourced_id(schema, body)?;
        let mut record = Record::new(sourced_id, Utc::now());
        payload::apply_payload(schema, &mut record, body, WriteMode::Create)?;
        R::check_invariants(&record)?;

        match self.engine.store().insert(R::KIND, record).await {
            Ok(stored) => {
                tracing::info!(kind = %R::KIND, sourced_id = %stored.sourced_id, "created");
                Ok(stored)
            }
            Err(StoreError::Duplicate { kind, id }) => Err(Error::Conflict { kind, id }),
            Err(e) => Err(e.into()),
        }
    }

    /// Merge the fields present in `body` into the active record. Read,
    /// merge, rule check and write happen as one store step.
    pub async fn update(&self, sourced_id: &str, body: &Map<String, Value>) -> Result<Record> {
        let body = body.clone();
        let merge: RecordUpdate = Box::new(move |record: &mut Record| {
            payload::apply_payload(R::schema(), record, &body, WriteMode::Update)?;
            R::check_invariants(record)?;
            record.touch(Utc::now());
            Ok(())
        });

        let updated = self
            .engine
            .store()
            .update_with(R::KIND, sourced_id, merge)
            .await?
            .ok_or_else(|| not_found::<R>(sourced_id))?;
        tracing::info!(kind = %R::KIND, sourced_id, "updated");
        Ok(updated)
    }

    /// `active -> tobedeleted`. A second call finds nothing and fails `NotFound`.
    pub async fn soft_delete(&self, sourced_id: &str) -> Result<()> {
        let tombstone: RecordUpdate = Box::new(|record: &mut Record| {
            record.mark_deleted(Utc::now());
            Ok(())
        });
        self.engine
            .store()
            .update_with(R::KIND, sourced_id, tombstone)
            .await?
            .ok_or_else(|| not_found::<R>(sourced_id))?;
        tracing::info!(kind = %R::KIND, sourced_id, "soft deleted");
        Ok(())
    }
}

fn not_found<R: Resource>(sourced_id: &str) -> Error {
    Error::NotFound {
        kind: R::KIND,
        id: sourced_id.to_string(),
    }
}
