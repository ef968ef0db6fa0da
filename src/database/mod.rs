pub mod memory;
pub mod models;
pub mod postgres;
pub mod record;

use async_trait::async_trait;
use thiserror::Error;

use crate::filter::Query;
use models::ResourceKind;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use record::Record;

/// Whether two records agree on every field of a unique key. Missing values never match.
pub fn same_key(key: &[&str], a: &Record, b: &Record) -> bool {
    key.iter().all(|field| matches!((a.get(field), b.get(field)), (Some(x), Some(y)) if x == y))
}

/// Errors from a record store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("an active {kind} with sourcedId '{id}' already exists")]
    Duplicate { kind: ResourceKind, id: String },

    #[error("an active {kind} with the same {fields} already exists")]
    UniqueViolation { kind: ResourceKind, fields: String },

    /// The update closure refused the merged record
    #[error("{0}")]
    Rejected(Box<crate::error::Error>),

    #[error("invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt row for '{id}': {reason}")]
    Corrupt { id: String, reason: String },
}

/// In-place change applied to the current active copy of a record
pub type RecordUpdate = Box<dyn FnOnce(&mut Record) -> crate::error::Result<()> + Send>;

/// One window of query results plus the size of the full matching set
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<Record>,
    pub total: u64,
}

/// Abstract persistence for gradebook records, keyed by (kind, sourcedId).
///
/// `find` sees tombstones; visibility rules live in the query engine and the
/// services. Writes are atomic per call.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Record with this id in any lifecycle state
    async fn find(&self, kind: ResourceKind, sourced_id: &str) -> Result<Option<Record>, StoreError>;

    async fn query(&self, query: &Query) -> Result<Page, StoreError>;

    /// Store a new record. Fails with `Duplicate` if an active record holds
    /// the id; a tombstone with the same id is replaced. Fails with
    /// `UniqueViolation` if another active record of the kind shares its
    /// unique key.
    async fn insert(&self, kind: ResourceKind, record: Record) -> Result<Record, StoreError>;

    /// Read, change and write back the active record as one atomic step.
    /// Returns `None` when there is no active record; an error from `apply`
    /// comes back as `Rejected` and nothing is written.
    async fn update_with(
        &self,
        kind: ResourceKind,
        sourced_id: &str,
        apply: RecordUpdate,
    ) -> Result<Option<Record>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}
