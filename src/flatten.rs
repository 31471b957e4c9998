//! Convert between nested tables and flat tables with compound keys.
//!
//! `{db = {url = "pg://"}}` ↔ `{"db:url" = "pg://"}`

use toml::{Table, Value};

/// Separator between path segments of a compound key.
pub const SEPARATOR: &str = ":";

/// Flatten nested tables into compound keys. Empty nested tables are kept as
/// leaves so the shape survives a round trip.
pub fn flatten(table: &Table) -> Table {
    let mut out = Table::new();
    flatten_into(table, "", &mut out);
    out
}

fn flatten_into(table: &Table, prefix: &str, out: &mut Table) {
    for (key, value) in table {
        let compound = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}{SEPARATOR}{key}")
        };
        match value {
            Value::Table(inner) if !inner.is_empty() => flatten_into(inner, &compound, out),
            other => {
                out.insert(compound, other.clone());
            }
        }
    }
}

/// Expand compound keys into nested tables.
///
/// Plain keys are applied first, then compound keys in their original order.
/// When a plain value and a compound key share a prefix the nested value
/// wins: `{"a" = 1, "a:b" = 2}` becomes `{a = {b = 2}}` regardless of key
/// order.
pub fn unflatten(flat: &Table) -> Table {
    let mut out = Table::new();
    for (key, value) in flat.iter().filter(|(k, _)| !k.contains(SEPARATOR)) {
        out.insert(key.clone(), value.clone());
    }
    for (key, value) in flat.iter().filter(|(k, _)| k.contains(SEPARATOR)) {
        let segments: Vec<&str> = key.split(SEPARATOR).collect();
        set_nested(&mut out, &segments, value.clone());
    }
    out
}

fn set_nested(table: &mut Table, segments: &[&str], value: Value) {
    let Some((leaf, path)) = segments.split_last() else {
        return;
    };
    let mut current = table;
    for segment in path {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        if !slot.is_table() {
            *slot = Value::Table(Table::new());
        }
        let Value::Table(inner) = slot else {
            unreachable!("slot was just made a table");
        };
        current = inner;
    }
    current.insert(leaf.to_string(), value);
}
