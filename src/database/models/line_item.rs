use once_cell::sync::Lazy;
use serde_json::{json, Value};

use super::payload::{render_common, render_fields};
use super::{guid_ref, Resource, ResourceKind};
use crate::auth::scopes::{ScopeSet, RESULTS_CREATEPUT, RESULTS_DELETE, ROSTER_CORE_READONLY};
use crate::config::LinkConfig;
use crate::database::Record;
use crate::error::{Error, Result};
use crate::filter::{FieldDef, FieldKind, FieldSchema};
use crate::routes::API_BASE;

pub static SCHEMA: Lazy<FieldSchema> = Lazy::new(|| {
    FieldSchema::with_common(vec![
        FieldDef::new("title", "title", FieldKind::Text).required().updatable().length(1, 255),
        FieldDef::new("description", "description", FieldKind::Text).updatable(),
        FieldDef::new("assign_date", "assignDate", FieldKind::Timestamp).updatable(),
        FieldDef::new("due_date", "dueDate", FieldKind::Timestamp).updatable(),
        FieldDef::new("class_sourced_id", "classSourcedId", FieldKind::Text).required().length(1, 255),
        FieldDef::new("category_sourced_id", "categorySourcedId", FieldKind::Text).updatable().length(1, 255),
        FieldDef::new("result_value_min", "resultValueMin", FieldKind::Number).required().updatable().default(json!(0.0)),
        FieldDef::new("result_value_max", "resultValueMax", FieldKind::Number).required().updatable().default(json!(100.0)),
        FieldDef::new("metadata", "metadata", FieldKind::Object).updatable(),
    ])
});

/// A gradable assignment or assessment within a class
pub struct LineItem;

impl Resource for LineItem {
    const KIND: ResourceKind = ResourceKind::LineItem;
    const SCOPES: ScopeSet = ScopeSet {
        read: ROSTER_CORE_READONLY,
        write: RESULTS_CREATEPUT,
        delete: RESULTS_DELETE,
    };

    fn check_invariants(record: &Record) -> Result<()> {
        let min = record.get("result_value_min").and_then(Value::as_f64);
        let max = record.get("result_value_max").and_then(Value::as_f64);
        match (min, max) {
            (Some(min), Some(max)) if max <= min => {
                Err(Error::rule("resultValueMax must be greater than resultValueMin"))
            }
            _ => Ok(()),
        }
    }

    fn render(record: &Record, links: &LinkConfig) -> Value {
        let mut out = render_common(record);
        render_fields(&SCHEMA, record, &mut out, &["class_sourced_id", "category_sourced_id"]);

        if let Some(class_id) = record.get("class_sourced_id").and_then(Value::as_str) {
            out.insert(
                "class".to_string(),
                guid_ref(format!("{}/classes/{}", links.rostering_base_url, class_id), class_id, "class"),
            );
        }
        if let Some(category_id) = record.get("category_sourced_id").and_then(Value::as_str) {
            out.insert(
                "category".to_string(),
                guid_ref(
                    format!("{}{}/categories/{}", links.api_base_url, API_BASE, category_id),
                    category_id,
                    "category",
                ),
            );
        }
        Value::Object(out)
    }
}
