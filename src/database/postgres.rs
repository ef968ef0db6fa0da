use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::{FromRow, PgPool, Postgres, Row};
use std::time::Duration;
use tracing::info;

use super::models::ResourceKind;
use super::{Page, Record, RecordStore, RecordUpdate, StoreError};
use crate::config::DatabaseConfig;
use crate::filter::filter::RECORD_COLUMNS;
use crate::filter::{Query, SqlParam};
use crate::types::LifecycleStatus;

pub const RECORDS_TABLE: &str = "gradebook_records";

/// Partial unique index over active results; must match `result::UNIQUE_KEY`
const RESULT_KEY_INDEX: &str = "gradebook_results_line_item_student_idx";

const MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "gradebook_records" (
        "resource_type" TEXT NOT NULL,
        "sourced_id" TEXT NOT NULL,
        "status" TEXT NOT NULL DEFAULT 'active' CHECK ("status" IN ('active', 'tobedeleted')),
        "date_last_modified" TIMESTAMPTZ NOT NULL DEFAULT now(),
        "data" JSONB NOT NULL DEFAULT '{}'::jsonb,
        PRIMARY KEY ("resource_type", "sourced_id")
    )"#,
    r#"CREATE INDEX IF NOT EXISTS "gradebook_records_active_idx"
        ON "gradebook_records" ("resource_type", "status")"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS "gradebook_results_line_item_student_idx"
        ON "gradebook_records" (("data"->>'line_item_sourced_id'), ("data"->>'student_sourced_id'))
        WHERE "resource_type" = 'result' AND "status" = 'active'"#,
];

#[derive(Debug, FromRow)]
struct RecordRow {
    sourced_id: String,
    status: String,
    date_last_modified: DateTime<Utc>,
    data: Value,
}

impl TryFrom<RecordRow> for Record {
    type Error = StoreError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let status: LifecycleStatus = row.status.parse().map_err(|reason| StoreError::Corrupt {
            id: row.sourced_id.clone(),
            reason,
        })?;
        let Value::Object(fields) = row.data else {
            return Err(StoreError::Corrupt {
                id: row.sourced_id,
                reason: "data column is not a JSON object".to_string(),
            });
        };
        Ok(Record::from_parts(row.sourced_id, status, row.date_last_modified, fields))
    }
}

/// PostgreSQL record store: one table for every resource type, keyed by
/// `(resource_type, sourced_id)`, resource fields in a JSONB column
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, config: &DatabaseConfig) -> Result<Self, StoreError> {
        let url = url::Url::parse(database_url).map_err(|_| StoreError::InvalidDatabaseUrl)?;
        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(StoreError::InvalidDatabaseUrl);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(database_url)
            .await?;

        info!(
            host = url.host_str().unwrap_or("localhost"),
            database = url.path().trim_start_matches('/'),
            "connected record store"
        );
        Ok(Self { pool })
    }

    /// Create the records table and indexes if missing
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("record store schema ready");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn find(&self, kind: ResourceKind, sourced_id: &str) -> Result<Option<Record>, StoreError> {
        let sql = format!(
            "SELECT {} FROM \"{}\" WHERE \"resource_type\" = $1 AND \"sourced_id\" = $2",
            RECORD_COLUMNS, RECORDS_TABLE
        );
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(kind.as_str())
            .bind(sourced_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Record::try_from).transpose()
    }

    async fn query(&self, query: &Query) -> Result<Page, StoreError> {
        let select = query.to_sql(RECORDS_TABLE);
        let count = query.to_count_sql(RECORDS_TABLE);

        // Count and page must see the same snapshot
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let mut count_query = sqlx::query(&count.query);
        for p in &count.params {
            count_query = bind_param(count_query, p);
        }
        let total: i64 = count_query.fetch_one(&mut *tx).await?.try_get("count")?;

        let mut select_query = sqlx::query_as::<_, RecordRow>(&select.query);
        for p in &select.params {
            select_query = bind_param_as(select_query, p);
        }
        let rows = select_query.fetch_all(&mut *tx).await?;
        tx.commit().await?;

        let records = rows.into_iter().map(Record::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            records,
            total: total.max(0) as u64,
        })
    }

    async fn insert(&self, kind: ResourceKind, record: Record) -> Result<Record, StoreError> {
        // A tombstone with the same key is overwritten; an active row is left alone
        let sql = format!(
            "INSERT INTO \"{table}\" (\"resource_type\", \"sourced_id\", \"status\", \"date_last_modified\", \"data\") \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (\"resource_type\", \"sourced_id\") DO UPDATE SET \
             \"status\" = EXCLUDED.\"status\", \
             \"date_last_modified\" = EXCLUDED.\"date_last_modified\", \
             \"data\" = EXCLUDED.\"data\" \
             WHERE \"{table}\".\"status\" = 'tobedeleted' \
             RETURNING \"sourced_id\"",
            table = RECORDS_TABLE
        );
        let written = sqlx::query(&sql)
            .bind(kind.as_str())
            .bind(&record.sourced_id)
            .bind(record.status.as_str())
            .bind(record.date_last_modified)
            .bind(record.data())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| unique_violation(kind, e))?;

        match written {
            Some(_) => Ok(record),
            None => Err(StoreError::Duplicate {
                kind,
                id: record.sourced_id,
            }),
        }
    }

    async fn update_with(
        &self,
        kind: ResourceKind,
        sourced_id: &str,
        apply: RecordUpdate,
    ) -> Result<Option<Record>, StoreError> {
        // Row lock held from read to write so concurrent merges serialize
        let mut tx = self.pool.begin().await?;

        let select = format!(
            "SELECT {} FROM \"{}\" WHERE \"resource_type\" = $1 AND \"sourced_id\" = $2 AND \"status\" = 'active' FOR UPDATE",
            RECORD_COLUMNS, RECORDS_TABLE
        );
        let row = sqlx::query_as::<_, RecordRow>(&select)
            .bind(kind.as_str())
            .bind(sourced_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut record = Record::try_from(row)?;
        apply(&mut record).map_err(|e| StoreError::Rejected(Box::new(e)))?;

        let update = format!(
            "UPDATE \"{}\" SET \"status\" = $3, \"date_last_modified\" = $4, \"data\" = $5 \
             WHERE \"resource_type\" = $1 AND \"sourced_id\" = $2",
            RECORDS_TABLE
        );
        sqlx::query(&update)
            .bind(kind.as_str())
            .bind(sourced_id)
            .bind(record.status.as_str())
            .bind(record.date_last_modified)
            .bind(record.data())
            .execute(&mut *tx)
            .await
            .map_err(|e| unique_violation(kind, e))?;
        tx.commit().await?;

        Ok(Some(record))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Map a hit on the result key index to `UniqueViolation`
fn unique_violation(kind: ResourceKind, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") && db.constraint() == Some(RESULT_KEY_INDEX) {
            return StoreError::UniqueViolation {
                kind,
                fields: kind.unique_key_label(),
            };
        }
    }
    StoreError::Sqlx(err)
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    p: &SqlParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match p {
        SqlParam::Text(s) => q.bind(s.clone()),
        SqlParam::Float(f) => q.bind(*f),
        SqlParam::Timestamp(ts) => q.bind(*ts),
    }
}

fn bind_param_as<'q, O>(
    q: sqlx::query::QueryAs<'q, Postgres, O, PgArguments>,
    p: &SqlParam,
) -> sqlx::query::QueryAs<'q, Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    match p {
        SqlParam::Text(s) => q.bind(s.clone()),
        SqlParam::Float(f) => q.bind(*f),
        SqlParam::Timestamp(ts) => q.bind(*ts),
    }
}
