use once_cell::sync::Lazy;
use serde_json::Value;

use super::payload::{render_common, render_fields};
use super::{guid_ref, Resource, ResourceKind};
use crate::auth::scopes::{ScopeSet, RESULTS_CREATEPUT, RESULTS_DELETE, RESULTS_READONLY};
use crate::config::LinkConfig;
use crate::database::Record;
use crate::error::{Error, Result};
use crate::filter::{FieldDef, FieldKind, FieldSchema};
use crate::routes::API_BASE;

pub const SCORE_STATUSES: &[&str] = &[
    "earnedPartial",
    "earnedFull",
    "notEarned",
    "notSubmitted",
    "submitted",
    "late",
    "incomplete",
    "missing",
    "inProgress",
    "withdrawn",
];

const SCORE_REQUIRED: &[&str] = &["earnedFull", "earnedPartial"];
const SCORE_FORBIDDEN: &[&str] = &["notEarned", "notSubmitted"];

/// One active result per student per line item
pub const UNIQUE_KEY: &[&str] = &["line_item_sourced_id", "student_sourced_id"];

pub static SCHEMA: Lazy<FieldSchema> = Lazy::new(|| {
    FieldSchema::with_common(vec![
        FieldDef::new("line_item_sourced_id", "lineItemSourcedId", FieldKind::Text).required().length(1, 255),
        FieldDef::new("student_sourced_id", "studentSourcedId", FieldKind::Text).required().length(1, 255),
        FieldDef::new("score_status", "scoreStatus", FieldKind::Enum(SCORE_STATUSES)).required().updatable(),
        FieldDef::new("score", "score", FieldKind::Number).updatable(),
        FieldDef::new("score_date", "scoreDate", FieldKind::Timestamp).updatable(),
        FieldDef::new("comment", "comment", FieldKind::Text).updatable(),
        FieldDef::new("metadata", "metadata", FieldKind::Object).updatable(),
    ])
});

/// One student's score on one line item
pub struct GradeResult;

impl Resource for GradeResult {
    const KIND: ResourceKind = ResourceKind::Result;
    const SCOPES: ScopeSet = ScopeSet {
        read: RESULTS_READONLY,
        write: RESULTS_CREATEPUT,
        delete: RESULTS_DELETE,
    };

    fn check_invariants(record: &Record) -> Result<()> {
        let Some(status) = record.get("score_status").and_then(Value::as_str) else {
            return Ok(());
        };
        let has_score = record.get("score").is_some();
        if SCORE_REQUIRED.contains(&status) && !has_score {
            return Err(Error::rule(format!("score is required for scoreStatus '{}'", status)));
        }
        if SCORE_FORBIDDEN.contains(&status) && has_score {
            return Err(Error::rule(format!("score must not be provided for scoreStatus '{}'", status)));
        }
        Ok(())
    }

    fn render(record: &Record, links: &LinkConfig) -> Value {
        let mut out = render_common(record);

        if let Some(line_item_id) = record.get("line_item_sourced_id").and_then(Value::as_str) {
            out.insert(
                "lineItem".to_string(),
                guid_ref(
                    format!("{}{}/lineItems/{}", links.api_base_url, API_BASE, line_item_id),
                    line_item_id,
                    "lineItem",
                ),
            );
        }
        if let Some(student_id) = record.get("student_sourced_id").and_then(Value::as_str) {
            out.insert(
                "student".to_string(),
                guid_ref(format!("{}/users/{}", links.rostering_base_url, student_id), student_id, "user"),
            );
        }
        render_fields(&SCHEMA, record, &mut out, &["line_item_sourced_id", "student_sourced_id"]);
        Value::Object(out)
    }
}
