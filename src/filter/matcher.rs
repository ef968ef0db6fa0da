// In-memory evaluation of predicates and sort keys, mirroring the SQL the
// Postgres store renders: a missing value never matches, nulls sort last
// ascending and first descending.
use serde_json::Value;
use std::cmp::Ordering;

use super::types::{FilterOp, Literal, Predicate, SortDirection, SortKey};
use crate::database::Record;
use crate::types::parse_timestamp;

pub fn matches(predicate: &Predicate, record: &Record) -> bool {
    let Some(value) = record.value(&predicate.field) else {
        return false;
    };
    let value = value.as_ref();

    if predicate.op == FilterOp::Contains {
        return match (&predicate.value, value.as_str()) {
            (Literal::Text(needle), Some(hay)) => hay.to_lowercase().contains(&needle.to_lowercase()),
            _ => false,
        };
    }

    let ordering = match &predicate.value {
        Literal::Text(expected) => value.as_str().map(|s| s.cmp(expected.as_str())),
        Literal::Integer(_) | Literal::Float(_) => {
            let expected = predicate.value.as_f64();
            value.as_f64().zip(expected).and_then(|(a, b)| a.partial_cmp(&b))
        }
        Literal::Timestamp(expected) => value
            .as_str()
            .and_then(parse_timestamp)
            .map(|ts| ts.cmp(expected)),
    };

    ordering.map_or(false, |ord| satisfies(predicate.op, ord))
}

fn satisfies(op: FilterOp, ord: Ordering) -> bool {
    match op {
        FilterOp::Eq => ord == Ordering::Equal,
        FilterOp::Ne => ord != Ordering::Equal,
        FilterOp::Lt => ord == Ordering::Less,
        FilterOp::Le => ord != Ordering::Greater,
        FilterOp::Gt => ord == Ordering::Greater,
        FilterOp::Ge => ord != Ordering::Less,
        FilterOp::Contains => false,
    }
}

/// Order two records by `keys` in priority order
pub fn compare_records(a: &Record, b: &Record, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let av = a.value(&key.field);
        let bv = b.value(&key.field);
        let ord = match (av.as_deref(), bv.as_deref()) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => compare_values(x, y),
        };
        let ord = match key.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
