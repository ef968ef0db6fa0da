use once_cell::sync::Lazy;
use serde_json::Value;

use super::payload::{render_common, render_fields};
use super::{Resource, ResourceKind};
use crate::auth::scopes::{ScopeSet, RESULTS_CREATEPUT, RESULTS_DELETE, ROSTER_CORE_READONLY};
use crate::config::LinkConfig;
use crate::database::Record;
use crate::filter::{FieldDef, FieldKind, FieldSchema};

pub static SCHEMA: Lazy<FieldSchema> = Lazy::new(|| {
    FieldSchema::with_common(vec![
        FieldDef::new("title", "title", FieldKind::Text).required().updatable().length(1, 255),
        FieldDef::new("weight", "weight", FieldKind::Number).updatable().range(0.0, 1.0),
        FieldDef::new("metadata", "metadata", FieldKind::Object).updatable(),
    ])
});

/// A grouping of line items, e.g. "Homework", optionally weighted
pub struct Category;

impl Resource for Category {
    const KIND: ResourceKind = ResourceKind::Category;
    const SCOPES: ScopeSet = ScopeSet {
        read: ROSTER_CORE_READONLY,
        write: RESULTS_CREATEPUT,
        delete: RESULTS_DELETE,
    };

    fn render(record: &Record, _links: &LinkConfig) -> Value {
        let mut out = render_common(record);
        render_fields(&SCHEMA, record, &mut out, &[]);
        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_render() {
        let links = crate::config::AppConfig::development().links;
        let mut r = Record::new("cat-1", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        r.set("title", json!("Homework")).set("weight", json!(0.0)).set("metadata", json!({}));
        assert_eq!(
            Category::render(&r, &links),
            json!({
                "sourcedId": "cat-1",
                "status": "active",
                "dateLastModified": "2024-01-01T00:00:00.000Z",
                "title": "Homework",
                "weight": 0.0,
            })
        );
    }
}
