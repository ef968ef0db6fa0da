use chrono::{DateTime, SubsecRound, Utc};
use serde_json::{Map, Value};
use std::borrow::Cow;

use crate::filter::schema::{DATE_LAST_MODIFIED, SOURCED_ID, STATUS};
use crate::types::{format_timestamp, LifecycleStatus};

/// A stored resource instance of any type.
///
/// Identity, lifecycle and modification time are typed; everything else is a
/// JSON map keyed by internal (snake_case) field name. Timestamp fields hold
/// canonical text (see [`format_timestamp`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub sourced_id: String,
    pub status: LifecycleStatus,
    pub date_last_modified: DateTime<Utc>,
    fields: Map<String, Value>,
}

impl Record {
    /// Fresh active record stamped at `now`
    pub fn new(sourced_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            sourced_id: sourced_id.into(),
            status: LifecycleStatus::Active,
            date_last_modified: now.trunc_subsecs(3),
            fields: Map::new(),
        }
    }

    /// Rebuild a record as loaded from storage
    pub fn from_parts(
        sourced_id: String,
        status: LifecycleStatus,
        date_last_modified: DateTime<Utc>,
        fields: Map<String, Value>,
    ) -> Self {
        Self {
            sourced_id,
            status,
            date_last_modified,
            fields,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Value of any field, system fields included. Missing and null are both `None`.
    pub fn value(&self, name: &str) -> Option<Cow<'_, Value>> {
        match name {
            SOURCED_ID => Some(Cow::Owned(Value::String(self.sourced_id.clone()))),
            STATUS => Some(Cow::Owned(Value::String(self.status.as_str().to_string()))),
            DATE_LAST_MODIFIED => Some(Cow::Owned(Value::String(format_timestamp(&self.date_last_modified)))),
            other => self.get(other).map(Cow::Borrowed),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Non-system fields as a JSON object, the stored payload form
    pub fn data(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.date_last_modified = now.trunc_subsecs(3);
    }

    pub fn mark_deleted(&mut self, now: DateTime<Utc>) {
        self.status = LifecycleStatus::Tobedeleted;
        self.touch(now);
    }

    pub fn is_active(&self) -> bool {
        self.status == LifecycleStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_value_covers_system_fields() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut record = Record::new("c1", now);
        record.set("title", json!("Homework")).set("weight", Value::Null);

        assert_eq!(record.value("sourced_id").unwrap().as_ref(), &json!("c1"));
        assert_eq!(record.value("status").unwrap().as_ref(), &json!("active"));
        assert_eq!(
            record.value("date_last_modified").unwrap().as_ref(),
            &json!("2024-05-01T12:00:00.000Z")
        );
        assert_eq!(record.value("title").unwrap().as_ref(), &json!("Homework"));
        assert!(record.value("weight").is_none());
        assert!(record.value("missing").is_none());
    }

    #[test]
    fn test_mark_deleted() {
        let now = Utc::now();
        let mut record = Record::new("c1", now);
        assert!(record.is_active());
        record.mark_deleted(now);
        assert!(!record.is_active());
        assert_eq!(record.status, LifecycleStatus::Tobedeleted);
    }
}
