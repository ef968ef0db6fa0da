use serde_json::Value;
use std::collections::HashMap;

use super::types::FilterOp;

pub const SOURCED_ID: &str = "sourced_id";
pub const STATUS: &str = "status";
pub const DATE_LAST_MODIFIED: &str = "date_last_modified";

pub const LIFECYCLE_VALUES: &[&str] = &["active", "tobedeleted"];

/// Value kind of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Timestamp,
    Enum(&'static [&'static str]),
    /// Free-form JSON object; stored and rendered, never filtered or sorted
    Object,
}

impl FieldKind {
    pub fn permits(&self, op: FilterOp) -> bool {
        match self {
            FieldKind::Text | FieldKind::Enum(_) => true,
            FieldKind::Number | FieldKind::Timestamp => op != FilterOp::Contains,
            FieldKind::Object => false,
        }
    }

    pub fn sortable(&self) -> bool {
        !matches!(self, FieldKind::Object)
    }
}

/// Per-field value constraint checked on writes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constraint {
    Length { min: usize, max: usize },
    Range { min: f64, max: f64 },
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Internal snake_case name
    pub name: &'static str,
    /// Wire camelCase name
    pub external: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub updatable: bool,
    /// Managed by the service; never read from payloads
    pub system: bool,
    pub default: Option<Value>,
    pub constraint: Option<Constraint>,
}

impl FieldDef {
    pub fn new(name: &'static str, external: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            external,
            kind,
            required: false,
            updatable: false,
            system: false,
            default: None,
            constraint: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn updatable(mut self) -> Self {
        self.updatable = true;
        self
    }

    pub fn system(mut self) -> Self {
        self.system = true;
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.constraint = Some(Constraint::Length { min, max });
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.constraint = Some(Constraint::Range { min, max });
        self
    }
}

/// Static registry of the fields one resource type exposes
#[derive(Debug)]
pub struct FieldSchema {
    fields: Vec<FieldDef>,
    by_name: HashMap<&'static str, usize>,
    by_external: HashMap<&'static str, usize>,
}

impl FieldSchema {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        let by_name = fields.iter().enumerate().map(|(i, f)| (f.name, i)).collect();
        let by_external = fields.iter().enumerate().map(|(i, f)| (f.external, i)).collect();
        Self {
            fields,
            by_name,
            by_external,
        }
    }

    /// Prepend the identity, lifecycle and modification-time fields every record carries
    pub fn with_common(fields: Vec<FieldDef>) -> Self {
        let mut all = vec![
            FieldDef::new(SOURCED_ID, "sourcedId", FieldKind::Text).required().length(1, 255),
            FieldDef::new(STATUS, "status", FieldKind::Enum(LIFECYCLE_VALUES)).system(),
            FieldDef::new(DATE_LAST_MODIFIED, "dateLastModified", FieldKind::Timestamp).system(),
        ];
        all.extend(fields);
        Self::new(all)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn by_external(&self, external: &str) -> Option<&FieldDef> {
        self.by_external.get(external).map(|&i| &self.fields[i])
    }

    /// Resolve a wire name the way query expressions do: convert to
    /// snake_case, then look up the internal name
    pub fn resolve(&self, external: &str) -> Option<&FieldDef> {
        self.field(&camel_to_snake(external))
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter()
    }
}

/// `lineItemSourcedId` -> `line_item_sourced_id`; every uppercase letter
/// after the first character starts a new word
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
