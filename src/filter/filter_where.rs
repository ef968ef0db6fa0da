use super::schema::{FieldKind, FieldSchema};
use super::types::{FilterOp, Literal, Predicate, SqlParam};
use crate::types::parse_timestamp;

/// Clause separator. There is no OR and no grouping.
pub const CLAUSE_DELIMITER: &str = " AND ";

/// Parses filter expressions such as `title~'math' AND weight>=0.5`.
///
/// Never fails: a clause that cannot be tokenized, names a field outside the
/// schema, or pairs a value with a field that cannot hold it is dropped.
pub struct FilterParser;

/// Raw value as written in the clause
#[derive(Debug, PartialEq)]
enum RawValue<'a> {
    Quoted(&'a str),
    Number(&'a str),
}

impl FilterParser {
    pub fn parse(filter_expr: &str, schema: &FieldSchema) -> Vec<Predicate> {
        let mut out = Vec::new();
        for clause in filter_expr.split(CLAUSE_DELIMITER) {
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }
            match Self::parse_clause(clause, schema) {
                Some(predicate) => out.push(predicate),
                None => tracing::debug!(clause, "filter clause dropped"),
            }
        }
        out
    }

    fn parse_clause(clause: &str, schema: &FieldSchema) -> Option<Predicate> {
        let (field, op, raw) = Self::tokenize(clause)?;
        let def = schema.resolve(field)?;
        if !def.kind.permits(op) {
            return None;
        }
        let value = Self::literal_for(def.kind, raw)?;
        Some(Predicate::new(def.name, op, value))
    }

    /// `field op value`, ignoring anything after a recognized value
    fn tokenize(clause: &str) -> Option<(&str, FilterOp, RawValue<'_>)> {
        let field_end = clause
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(clause.len());
        if field_end == 0 {
            return None;
        }
        let field = &clause[..field_end];

        let (op, rest) = FilterOp::split_prefix(clause[field_end..].trim_start())?;
        let rest = rest.trim_start();

        if let Some(body) = rest.strip_prefix('\'') {
            let end = body.find('\'')?;
            return Some((field, op, RawValue::Quoted(&body[..end])));
        }

        // Unquoted values must be unsigned decimals and cannot be used with `~`
        if op == FilterOp::Contains {
            return None;
        }
        let int_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if int_end == 0 {
            return None;
        }
        let mut end = int_end;
        if rest[int_end..].starts_with('.') {
            let frac = &rest[int_end + 1..];
            let frac_len = frac.find(|c: char| !c.is_ascii_digit()).unwrap_or(frac.len());
            if frac_len > 0 {
                end = int_end + 1 + frac_len;
            }
        }
        Some((field, op, RawValue::Number(&rest[..end])))
    }

    fn number_literal(n: &str) -> Option<Literal> {
        if n.contains('.') {
            n.parse().ok().map(Literal::Float)
        } else {
            // Out-of-range integers still compare sensibly as floats
            n.parse()
                .map(Literal::Integer)
                .or_else(|_| n.parse().map(Literal::Float))
                .ok()
        }
    }

    fn literal_for(kind: FieldKind, raw: RawValue<'_>) -> Option<Literal> {
        match (kind, raw) {
            (FieldKind::Text | FieldKind::Enum(_), RawValue::Quoted(s)) => Some(Literal::Text(s.to_string())),
            (FieldKind::Number, RawValue::Number(n)) => Self::number_literal(n),
            // A quoted unsigned decimal still counts as a number here
            (FieldKind::Number, RawValue::Quoted(s)) if is_unsigned_decimal(s) => Self::number_literal(s),
            (FieldKind::Timestamp, RawValue::Quoted(s)) => parse_timestamp(s).map(Literal::Timestamp),
            _ => None,
        }
    }
}

/// `\d+(\.\d+)?`
fn is_unsigned_decimal(s: &str) -> bool {
    let (int, frac) = match s.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (s, None),
    };
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    digits(int) && frac.map_or(true, digits)
}

/// Renders predicates as a parameterized SQL condition list
pub struct FilterWhere {
    params: Vec<SqlParam>,
}

impl FilterWhere {
    pub fn new(params: Vec<SqlParam>) -> Self {
        Self { params }
    }

    /// Bind a value, returning its `$n` placeholder
    pub fn param(&mut self, value: SqlParam) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    pub fn condition(&mut self, column: &str, predicate: &Predicate) -> String {
        match (&predicate.op, &predicate.value) {
            (FilterOp::Contains, Literal::Text(s)) => {
                let placeholder = self.param(SqlParam::Text(format!("%{}%", escape_like(s))));
                format!("{} ILIKE {}", column, placeholder)
            }
            (op, value) => {
                let param = match value {
                    Literal::Text(s) => SqlParam::Text(s.clone()),
                    Literal::Integer(i) => SqlParam::Float(*i as f64),
                    Literal::Float(f) => SqlParam::Float(*f),
                    Literal::Timestamp(ts) => SqlParam::Timestamp(*ts),
                };
                let placeholder = self.param(param);
                let sql_op = match op {
                    FilterOp::Ne => "<>",
                    other => other.symbol(),
                };
                format!("{} {} {}", column, sql_op, placeholder)
            }
        }
    }

    pub fn into_params(self) -> Vec<SqlParam> {
        self.params
    }
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::schema::FieldDef;
    use chrono::{TimeZone, Utc};

    fn schema() -> FieldSchema {
        FieldSchema::with_common(vec![
            FieldDef::new("title", "title", FieldKind::Text),
            FieldDef::new("weight", "weight", FieldKind::Number),
            FieldDef::new("a", "a", FieldKind::Text),
            FieldDef::new("b", "b", FieldKind::Number),
            FieldDef::new("due_date", "dueDate", FieldKind::Timestamp),
            FieldDef::new("metadata", "metadata", FieldKind::Object),
        ])
    }

    #[test]
    fn test_single_equality() {
        let preds = FilterParser::parse("title='Math'", &schema());
        assert_eq!(preds, vec![Predicate::new("title", FilterOp::Eq, Literal::Text("Math".into()))]);
    }

    #[test]
    fn test_unknown_field_dropped() {
        assert!(FilterParser::parse("bogus='x'", &schema()).is_empty());
    }

    #[test]
    fn test_conjunction_keeps_order() {
        let preds = FilterParser::parse("a='1' AND b>2", &schema());
        assert_eq!(
            preds,
            vec![
                Predicate::new("a", FilterOp::Eq, Literal::Text("1".into())),
                Predicate::new("b", FilterOp::Gt, Literal::Integer(2)),
            ]
        );
    }

    #[test]
    fn test_every_operator() {
        let s = schema();
        for (expr, op) in [
            ("weight=1", FilterOp::Eq),
            ("weight!=1", FilterOp::Ne),
            ("weight<1", FilterOp::Lt),
            ("weight<=1", FilterOp::Le),
            ("weight>1", FilterOp::Gt),
            ("weight>=1", FilterOp::Ge),
            ("title~'1'", FilterOp::Contains),
        ] {
            let preds = FilterParser::parse(expr, &s);
            assert_eq!(preds.len(), 1, "{}", expr);
            assert_eq!(preds[0].op, op, "{}", expr);
        }
    }

    #[test]
    fn test_numeric_literals() {
        let s = schema();
        assert_eq!(FilterParser::parse("weight >= 0.5", &s)[0].value, Literal::Float(0.5));
        assert_eq!(FilterParser::parse("weight=10", &s)[0].value, Literal::Integer(10));
        // "5." reads as the integer 5 with trailing text ignored
        assert_eq!(FilterParser::parse("weight=5.", &s)[0].value, Literal::Integer(5));
    }

    #[test]
    fn test_quoted_numbers_on_number_fields() {
        let s = schema();
        assert_eq!(FilterParser::parse("weight>='0.3'", &s)[0].value, Literal::Float(0.3));
        assert_eq!(FilterParser::parse("weight='50'", &s)[0].value, Literal::Integer(50));
        // text fields keep the quoted digits as text
        assert_eq!(FilterParser::parse("title='50'", &s)[0].value, Literal::Text("50".into()));
        for expr in ["weight='5.'", "weight='.5'", "weight='-1'", "weight='1e3'", "weight=''"] {
            assert!(FilterParser::parse(expr, &s).is_empty(), "{} should be dropped", expr);
        }
    }

    #[test]
    fn test_unsigned_decimal_shape() {
        assert!(is_unsigned_decimal("0"));
        assert!(is_unsigned_decimal("12.50"));
        assert!(!is_unsigned_decimal("1.2.3"));
        assert!(!is_unsigned_decimal(" 1"));
    }

    #[test]
    fn test_external_names_are_converted() {
        let preds = FilterParser::parse("dateLastModified>'2024-01-01'", &schema());
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].field, "date_last_modified");
        assert_eq!(
            preds[0].value,
            Literal::Timestamp(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_malformed_clauses_dropped() {
        let s = schema();
        for expr in [
            "title",
            "title=",
            "title='unterminated",
            "='x'",
            "title=Math",
            "weight~5",
            "weight=-1",
            "weight='abc'",
            "title=5",
            "metadata='x'",
            "dueDate>'yesterday'",
            "weight~'5'",
        ] {
            assert!(FilterParser::parse(expr, &s).is_empty(), "{} should be dropped", expr);
        }
    }

    #[test]
    fn test_bad_clause_does_not_poison_others() {
        let preds = FilterParser::parse("bogus='x' AND title~'alg' AND weight>", &schema());
        assert_eq!(preds, vec![Predicate::new("title", FilterOp::Contains, Literal::Text("alg".into()))]);
    }

    #[test]
    fn test_lowercase_and_is_not_a_delimiter() {
        // the whole string is one clause whose quoted value ends at the first quote pair
        let preds = FilterParser::parse("title='a' and weight>1", &schema());
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].field, "title");
    }

    #[test]
    fn test_empty_expression() {
        assert!(FilterParser::parse("", &schema()).is_empty());
        assert!(FilterParser::parse("   ", &schema()).is_empty());
    }

    #[test]
    fn test_condition_rendering() {
        let mut w = FilterWhere::new(vec![SqlParam::Text("category".into())]);
        let contains = Predicate::new("title", FilterOp::Contains, Literal::Text("50%_off".into()));
        assert_eq!(w.condition("(data->>'title')", &contains), "(data->>'title') ILIKE $2");
        let ne = Predicate::new("b", FilterOp::Ne, Literal::Integer(3));
        assert_eq!(w.condition("b", &ne), "b <> $3");
        assert_eq!(
            w.into_params(),
            vec![
                SqlParam::Text("category".into()),
                SqlParam::Text("%50\\%\\_off%".into()),
                SqlParam::Float(3.0),
            ]
        );
    }
}
