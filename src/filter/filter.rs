use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::matcher;
use super::schema::{FieldKind, DATE_LAST_MODIFIED, SOURCED_ID, STATUS};
use super::types::{FilterOp, Literal, Predicate, SortKey, SqlParam, SqlResult};
use crate::database::models::ResourceKind;
use crate::database::Record;
use crate::types::LifecycleStatus;

/// Columns selected for every record row
pub const RECORD_COLUMNS: &str = "\"sourced_id\", \"status\", \"date_last_modified\", \"data\"";

/// A fully composed read: resource type, predicates, ordering and page window.
///
/// Every query starts with `status = 'active'`, so tombstones are invisible to
/// anything built from it.
#[derive(Debug, Clone)]
pub struct Query {
    kind: ResourceKind,
    predicates: Vec<Predicate>,
    sort: Vec<SortKey>,
    limit: Option<usize>,
    offset: usize,
}

impl Query {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            predicates: vec![Predicate::new(
                STATUS,
                FilterOp::Eq,
                Literal::Text(LifecycleStatus::Active.as_str().to_string()),
            )],
            sort: vec![],
            limit: None,
            offset: 0,
        }
    }

    pub fn filter(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.predicates.extend(predicates);
        self
    }

    pub fn order(mut self, keys: Vec<SortKey>) -> Self {
        self.sort = keys;
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Effective ordering: the requested keys, then ascending `sourcedId`
    /// unless it is already one of them
    pub fn sort_keys(&self) -> Vec<SortKey> {
        let mut keys = self.sort.clone();
        if !keys.iter().any(|k| k.field == SOURCED_ID) {
            keys.push(SortKey::asc(SOURCED_ID));
        }
        keys
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.predicates.iter().all(|p| matcher::matches(p, record))
    }

    pub fn to_sql(&self, table: &str) -> SqlResult {
        let (where_clause, params) = self.where_sql();
        let order_clause = FilterOrder::generate(&self.sort_keys(), |f| self.column(f));
        let limit_clause = match self.limit {
            Some(l) => format!("LIMIT {} OFFSET {}", l, self.offset),
            None if self.offset > 0 => format!("OFFSET {}", self.offset),
            None => String::new(),
        };

        let query = [
            format!("SELECT {}", RECORD_COLUMNS),
            format!("FROM \"{}\"", table),
            format!("WHERE {}", where_clause),
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult { query, params }
    }

    /// Count over the full matching set, independent of the page window
    pub fn to_count_sql(&self, table: &str) -> SqlResult {
        let (where_clause, params) = self.where_sql();
        SqlResult {
            query: format!("SELECT COUNT(*) AS count FROM \"{}\" WHERE {}", table, where_clause),
            params,
        }
    }

    fn where_sql(&self) -> (String, Vec<SqlParam>) {
        let mut builder = FilterWhere::new(vec![]);
        let mut conditions = vec![format!(
            "\"resource_type\" = {}",
            builder.param(SqlParam::Text(self.kind.as_str().to_string()))
        )];
        for predicate in &self.predicates {
            conditions.push(builder.condition(&self.column(&predicate.field), predicate));
        }
        (conditions.join(" AND "), builder.into_params())
    }

    /// SQL expression for an internal field name. Names come from the static
    /// schema, never from request text, so inlining them is safe.
    fn column(&self, field: &str) -> String {
        match field {
            SOURCED_ID | STATUS | DATE_LAST_MODIFIED => format!("\"{}\"", field),
            other => {
                let extracted = format!("(\"data\"->>'{}')", other);
                match self.kind.schema().field(other).map(|d| d.kind) {
                    Some(FieldKind::Number) => format!("{}::double precision", extracted),
                    Some(FieldKind::Timestamp) => format!("{}::timestamptz", extracted),
                    _ => extracted,
                }
            }
        }
    }
}
