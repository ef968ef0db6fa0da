use super::schema::FieldSchema;
use super::types::{SortDirection, SortKey};

/// Parses sort expressions such as `weight desc, title`.
///
/// Each comma-separated clause is `field` or `field DIRECTION`. Unknown or
/// unsortable fields are dropped, as are clauses with extra tokens.
pub struct SortParser;

impl SortParser {
    pub fn parse(sort_expr: &str, schema: &FieldSchema) -> Vec<SortKey> {
        let mut out = Vec::new();
        for part in sort_expr.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() { continue; }
            let tokens: Vec<&str> = trimmed.split_whitespace().collect();
            if tokens.len() > 2 {
                tracing::debug!(clause = trimmed, "sort clause dropped");
                continue;
            }
            let Some(def) = schema.resolve(tokens[0]).filter(|d| d.kind.sortable()) else {
                tracing::debug!(clause = trimmed, "sort clause dropped");
                continue;
            };
            // Anything other than DESC, including typos, sorts ascending
            let direction = match tokens.get(1) {
                Some(dir) if dir.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                _ => SortDirection::Asc,
            };
            out.push(SortKey { field: def.name.to_string(), direction });
        }
        out
    }
}

pub struct FilterOrder;

impl FilterOrder {
    /// Render `ORDER BY`, mapping each internal field name to its SQL column expression
    pub fn generate<F>(keys: &[SortKey], column: F) -> String
    where
        F: Fn(&str) -> String,
    {
        if keys.is_empty() { return String::new(); }
        let parts: Vec<String> = keys
            .iter()
            .map(|k| format!("{} {}", column(&k.field), k.direction.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}
