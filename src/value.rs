//! Small helpers over the loosely typed `toml::Value` model.

use toml::Value;

/// Render a value for messages and help text.
///
/// Strings are quoted, containers use TOML inline syntax.
pub fn describe(value: &Value) -> String {
    value.to_string()
}

/// Render a value the way a user would type it on the command line.
pub fn display_plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_plain)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

/// True when `s` is a non-empty run of word characters (`\w+`).
pub fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Characters allowed inside a switch segment.
pub fn is_switch_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}
