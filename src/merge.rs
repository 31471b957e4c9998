use toml::{Table, Value};

/// Deep-merge `overlay` into `base`.
/// Tables present on both sides are merged recursively; any other overlay
/// value replaces what `base` holds. Keys new to `base` are appended.
pub fn deep_merge(base: &mut Table, overlay: Table) {
    for (key, overlay_val) in overlay {
        match overlay_val {
            Value::Table(overlay_tbl) => {
                if let Some(Value::Table(base_tbl)) = base.get_mut(&key) {
                    deep_merge(base_tbl, overlay_tbl);
                } else {
                    base.insert(key, Value::Table(overlay_tbl));
                }
            }
            other => {
                base.insert(key, other);
            }
        }
    }
}

/// Merge an incoming value over a current one: tables merge, anything else
/// replaces.
pub fn merge_value(current: Value, incoming: Value) -> Value {
    match (current, incoming) {
        (Value::Table(mut base), Value::Table(overlay)) => {
            deep_merge(&mut base, overlay);
            Value::Table(base)
        }
        (_, incoming) => incoming,
    }
}
