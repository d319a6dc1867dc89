//! Filter matching and ordering for the in-memory store.
//!
//! Filters are conjunctive and applied in order. Blank filter values are
//! ignored. Names are interpreted as:
//!
//! - `search`: any string column contains the value,
//! - `search_<field>`: `<field>` contains the value,
//! - `<field>_gt` / `<field>_lt`: `<field>` compares greater / less,
//! - anything else: string columns contain the value (case-insensitive), list
//!   columns hold it, other columns equal it in string form.

use crate::envelope::Record;
use crate::request::{is_blank, value_key, Direction, Filter, Sort};
use serde_json::Value;
use std::cmp::Ordering;

pub fn matches_all(record: &Record, filters: &[Filter]) -> bool {
    filters
        .iter()
        .filter(|f| !is_blank(&f.value))
        .all(|f| matches(record, f))
}

fn matches(record: &Record, filter: &Filter) -> bool {
    let wanted = value_key(&filter.value);
    if filter.name == "search" {
        return record.values().any(|v| v.as_str().is_some_and(|s| contains(s, &wanted)));
    }
    if let Some(field) = filter.name.strip_prefix("search_") {
        return record.get(field).is_some_and(|v| contains(&value_key(v), &wanted));
    }
    if let Some(field) = filter.name.strip_suffix("_gt") {
        return record
            .get(field)
            .is_some_and(|v| compare_operand(v, &filter.value) == Ordering::Greater);
    }
    if let Some(field) = filter.name.strip_suffix("_lt") {
        return record
            .get(field)
            .is_some_and(|v| compare_operand(v, &filter.value) == Ordering::Less);
    }
    match record.get(&filter.name) {
        Some(Value::String(s)) => contains(s, &wanted),
        Some(Value::Array(items)) => items.iter().any(|item| value_key(item) == wanted),
        Some(other) => value_key(other) == wanted,
        None => false,
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Compares a column value with a `_gt`/`_lt` operand. Form values arrive as
/// strings, so a numeric-looking operand against a numeric column compares as
/// a number.
fn compare_operand(column: &Value, operand: &Value) -> Ordering {
    match (column, operand) {
        (Value::Number(x), Value::String(y)) => match y.trim().parse::<f64>() {
            Ok(y) => numeric(x.as_f64(), Some(y)),
            Err(_) => compare(column, operand),
        },
        _ => compare(column, operand),
    }
}

/// Orders two column values. Numbers compare numerically, everything else by
/// its string form; null sorts first.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => numeric(x.as_f64(), y.as_f64()),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => value_key(a).cmp(&value_key(b)),
    }
}

fn numeric(x: Option<f64>, y: Option<f64>) -> Ordering {
    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
}

/// Stable multi-column sort; the first entry of `sorting` is the primary key.
pub fn sort(records: &mut [Record], sorting: &[Sort]) {
    if sorting.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        sorting
            .iter()
            .map(|s| {
                let ord = compare(
                    a.get(&s.field).unwrap_or(&Value::Null),
                    b.get(&s.field).unwrap_or(&Value::Null),
                );
                match s.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::record;
    use serde_json::json;

    fn filter(name: &str, value: Value) -> Filter {
        Filter {
            name: name.into(),
            value,
        }
    }

    fn entry() -> Record {
        record(json!({
            "title": "Rust Ownership",
            "section": 1,
            "status": "1",
            "date": "2024-03-01",
            "sticky": true,
            "tags": [1, 3],
            "summary": "Borrowing explained",
        }))
    }

    #[test]
    fn plain_filters() {
        let e = entry();
        assert!(matches_all(&e, &[filter("title", json!("rust"))]));
        assert!(matches_all(&e, &[filter("section", json!("1"))]));
        assert!(matches_all(&e, &[filter("sticky", json!("true"))]));
        assert!(matches_all(&e, &[filter("tags", json!(3))]));
        assert!(!matches_all(&e, &[filter("tags", json!(2))]));
        assert!(!matches_all(&e, &[filter("missing", json!("x"))]));
    }

    #[test]
    fn blank_values_are_ignored() {
        assert!(matches_all(&entry(), &[filter("section", json!("")), filter("title", Value::Null)]));
    }

    #[test]
    fn comparison_and_search_filters() {
        let e = entry();
        assert!(matches_all(&e, &[filter("date_gt", json!("2024-01-01"))]));
        assert!(!matches_all(&e, &[filter("date_lt", json!("2024-01-01"))]));
        assert!(matches_all(&e, &[filter("search_summary", json!("BORROW"))]));
        assert!(matches_all(&e, &[filter("search", json!("ownership"))]));
        assert!(!matches_all(&e, &[filter("search", json!("lifetimes"))]));
    }

    #[test]
    fn numeric_columns_compare_form_strings_as_numbers() {
        let row = record(json!({"rank": 10}));
        assert!(matches_all(&row, &[filter("rank_gt", json!("9"))]));
        assert!(!matches_all(&row, &[filter("rank_lt", json!("9"))]));
        assert!(matches_all(&row, &[filter("rank_lt", json!(" 11 "))]));
    }

    #[test]
    fn sorts_by_priority_then_direction() {
        let mut rows = vec![
            record(json!({"id": 1, "sticky": false, "date": "2024-01-02"})),
            record(json!({"id": 2, "sticky": true, "date": "2024-01-01"})),
            record(json!({"id": 3, "sticky": false, "date": "2024-01-03"})),
        ];
        sort(
            &mut rows,
            &[
                Sort::new("sticky", Direction::Descending),
                Sort::new("date", Direction::Descending),
            ],
        );
        let ids: Vec<_> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, [2, 3, 1]);
    }
}
