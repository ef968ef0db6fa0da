// Translation between wire payloads (camelCase JSON) and records
use serde_json::{Map, Value};

use crate::database::Record;
use crate::error::{Error, Result};
use crate::filter::schema::{Constraint, FieldDef, FieldKind, SOURCED_ID};
use crate::filter::FieldSchema;
use crate::types::{format_timestamp, parse_timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

/// Identity of a create payload
pub fn sourced_id(schema: &FieldSchema, payload: &Map<String, Value>) -> Result<String> {
    let def = schema
        .field(SOURCED_ID)
        .ok_or_else(|| Error::Internal("schema lacks sourcedId".to_string()))?;
    match payload.get(def.external) {
        None | Some(Value::Null) => Err(Error::invalid_field(def.external, "is required")),
        Some(value) => match coerce(def, value)? {
            Value::String(id) => Ok(id),
            _ => Err(Error::invalid_field(def.external, "must be a string")),
        },
    }
}

/// Merge a payload into `record`.
///
/// Unknown keys are ignored, as are system fields and, on update, fields
/// that cannot change after creation. A present `null` clears an optional
/// field. On create, absent fields take their defaults and required fields
/// must be present.
pub fn apply_payload(
    schema: &FieldSchema,
    record: &mut Record,
    payload: &Map<String, Value>,
    mode: WriteMode,
) -> Result<()> {
    for def in schema.fields() {
        if def.system || def.name == SOURCED_ID {
            continue;
        }
        if mode == WriteMode::Update && !def.updatable {
            continue;
        }

        match payload.get(def.external) {
            Some(Value::Null) => {
                if def.required {
                    return Err(Error::invalid_field(def.external, "cannot be null"));
                }
                record.remove(def.name);
            }
            Some(value) => {
                let value = coerce(def, value)?;
                record.set(def.name, value);
            }
            None if mode == WriteMode::Create => {
                if let Some(default) = &def.default {
                    record.set(def.name, default.clone());
                } else if def.required {
                    return Err(Error::invalid_field(def.external, "is required"));
                }
            }
            None => {}
        }
    }
    Ok(())
}

/// Check a value against its field's kind and constraint, normalizing timestamps
fn coerce(def: &FieldDef, value: &Value) -> Result<Value> {
    let field = def.external;
    let value = match def.kind {
        FieldKind::Text => {
            let s = value.as_str().ok_or_else(|| Error::invalid_field(field, "must be a string"))?;
            Value::String(s.to_string())
        }
        FieldKind::Number => {
            if !value.is_number() {
                return Err(Error::invalid_field(field, "must be a number"));
            }
            value.clone()
        }
        FieldKind::Timestamp => {
            let ts = value
                .as_str()
                .and_then(parse_timestamp)
                .ok_or_else(|| Error::invalid_field(field, "must be an RFC 3339 date-time"))?;
            Value::String(format_timestamp(&ts))
        }
        FieldKind::Enum(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => Value::String(s.to_string()),
            _ => {
                return Err(Error::invalid_field(
                    field,
                    format!("must be one of: {}", allowed.join(", ")),
                ))
            }
        },
        FieldKind::Object => {
            if !value.is_object() {
                return Err(Error::invalid_field(field, "must be an object"));
            }
            value.clone()
        }
    };

    match def.constraint {
        Some(Constraint::Length { min, max }) => {
            let len = value.as_str().map(|s| s.chars().count()).unwrap_or(0);
            if len < min || len > max {
                return Err(Error::invalid_field(
                    field,
                    format!("length must be between {} and {}", min, max),
                ));
            }
        }
        Some(Constraint::Range { min, max }) => {
            let n = value.as_f64().unwrap_or(f64::NAN);
            if !(min..=max).contains(&n) {
                return Err(Error::invalid_field(field, format!("must be between {} and {}", min, max)));
            }
        }
        None => {}
    }
    Ok(value)
}

/// `sourcedId`, `status` and `dateLastModified`
pub fn render_common(record: &Record) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("sourcedId".to_string(), Value::String(record.sourced_id.clone()));
    out.insert("status".to_string(), Value::String(record.status.as_str().to_string()));
    out.insert(
        "dateLastModified".to_string(),
        Value::String(format_timestamp(&record.date_last_modified)),
    );
    out
}

/// Copy every non-system field except `skip` under its external name,
/// leaving out empty values
pub fn render_fields(schema: &FieldSchema, record: &Record, out: &mut Map<String, Value>, skip: &[&str]) {
    for def in schema.fields() {
        if def.system || def.name == SOURCED_ID || skip.contains(&def.name) {
            continue;
        }
        let Some(value) = record.get(def.name) else { continue };
        let empty = match value {
            Value::String(s) => s.is_empty(),
            Value::Object(m) => m.is_empty(),
            _ => false,
        };
        if !empty {
            out.insert(def.external.to_string(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn schema() -> FieldSchema {
        FieldSchema::with_common(vec![
            FieldDef::new("title", "title", FieldKind::Text).required().updatable().length(1, 5),
            FieldDef::new("weight", "weight", FieldKind::Number).updatable().range(0.0, 1.0),
            FieldDef::new("owner_id", "ownerId", FieldKind::Text).required(),
            FieldDef::new("due_date", "dueDate", FieldKind::Timestamp).updatable(),
            FieldDef::new("max", "max", FieldKind::Number).updatable().default(json!(100.0)),
        ])
    }

    fn payload(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("payload must be an object"),
        }
    }

    #[test]
    fn test_create_applies_defaults_and_ignores_unknown() {
        let mut r = Record::new("x", Utc::now());
        let p = payload(json!({"title": "Quiz", "ownerId": "o1", "bogus": 1, "status": "tobedeleted"}));
        apply_payload(&schema(), &mut r, &p, WriteMode::Create).unwrap();
        assert_eq!(r.get("max"), Some(&json!(100.0)));
        assert!(r.get("bogus").is_none());
        assert!(r.is_active());
    }

    #[test]
    fn test_create_requires_required_fields() {
        let mut r = Record::new("x", Utc::now());
        let err = apply_payload(&schema(), &mut r, &payload(json!({"title": "Quiz"})), WriteMode::Create).unwrap_err();
        assert!(err.to_string().contains("ownerId"));
    }

    #[test]
    fn test_update_skips_fixed_fields_and_clears_nulls() {
        let mut r = Record::new("x", Utc::now());
        r.set("title", json!("Quiz")).set("owner_id", json!("o1")).set("weight", json!(0.5));
        let p = payload(json!({"ownerId": "o2", "weight": null}));
        apply_payload(&schema(), &mut r, &p, WriteMode::Update).unwrap();
        assert_eq!(r.get("owner_id"), Some(&json!("o1")));
        assert!(r.get("weight").is_none());

        let err = apply_payload(&schema(), &mut r, &payload(json!({"title": null})), WriteMode::Update);
        assert!(err.is_err());
    }

    #[test]
    fn test_type_and_constraint_violations() {
        let s = schema();
        let mut r = Record::new("x", Utc::now());
        for bad in [
            json!({"title": 5}),
            json!({"title": ""}),
            json!({"title": "too long"}),
            json!({"weight": "heavy"}),
            json!({"weight": 1.5}),
            json!({"dueDate": "someday"}),
        ] {
            assert!(
                apply_payload(&s, &mut r, &payload(bad.clone()), WriteMode::Update).is_err(),
                "{} should fail",
                bad
            );
        }
    }

    #[test]
    fn test_timestamps_normalized() {
        let mut r = Record::new("x", Utc::now());
        let p = payload(json!({"dueDate": "2024-06-01T10:00:00+02:00"}));
        apply_payload(&schema(), &mut r, &p, WriteMode::Update).unwrap();
        assert_eq!(r.get("due_date"), Some(&json!("2024-06-01T08:00:00.000Z")));
    }

    #[test]
    fn test_sourced_id() {
        let s = schema();
        assert_eq!(sourced_id(&s, &payload(json!({"sourcedId": "abc"}))).unwrap(), "abc");
        assert!(sourced_id(&s, &payload(json!({}))).is_err());
        assert!(sourced_id(&s, &payload(json!({"sourcedId": ""}))).is_err());
        assert!(sourced_id(&s, &payload(json!({"sourcedId": 7}))).is_err());
    }
}
