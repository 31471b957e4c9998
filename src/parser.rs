//! Command-line option parser.
//!
//! An [`OptionParser`] holds an ordered list of [`OptSpec`]s (plus separator
//! lines for help output) and a switch table built once at registration.
//! Conflicts are detected when an option is added, never during `parse`.
//!
//! Grammar, per argument:
//!
//! - the option break (`--` by default) ends option parsing; everything after
//!   it is positional;
//! - `--name`, `--name=value`, `--parent:child=value` are long switches;
//! - `-x`, `-x=value`, `-p:c` are short switches;
//! - `-xvalue` attaches a value to the short switch `-x`;
//! - anything else is a positional argument.
//!
//! Switch options also register a negated form with `no-` inserted before the
//! final path segment: `--a:name` ↔ `--a:no-name`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use toml::{Table, Value};

use crate::caster::Shape;
use crate::entry::Entry;
use crate::error::{CastError, DeclarationError, ParseError};
use crate::flatten::{SEPARATOR, unflatten};
use crate::value::{display_plain, is_switch_char};

/// How an option consumes arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptKind {
    /// Takes one value, attached or from the next argument.
    Plain,
    /// Takes no value; sets the opposite of its boolean default.
    Flag,
    /// Takes no value; `--name` is true and `--no-name` is false.
    Switch,
    /// Takes a value on every use and accumulates them.
    List,
}

/// Post-processing applied to every option's final value.
pub type Callback = Arc<dyn Fn(Value) -> Result<Value, CastError> + Send + Sync>;

/// One option the parser recognizes.
#[derive(Clone)]
pub struct OptSpec {
    key: String,
    kind: OptKind,
    long: Option<String>,
    short: Option<String>,
    default: Option<Value>,
    desc: String,
    arg_name: Option<String>,
    hidden: bool,
    split: Option<String>,
    limit: Option<usize>,
    callback: Option<Callback>,
}

impl fmt::Debug for OptSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptSpec")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("long", &self.long)
            .field("short", &self.short)
            .field("default", &self.default)
            .field("split", &self.split)
            .field("limit", &self.limit)
            .field("callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

impl OptSpec {
    /// A new option stored under `key`. Without explicit switches the long
    /// switch is derived from the key (`max_size` → `--max-size`).
    pub fn new(key: &str, kind: OptKind) -> Self {
        Self {
            key: key.to_string(),
            kind,
            long: None,
            short: None,
            default: None,
            desc: String::new(),
            arg_name: None,
            hidden: false,
            split: None,
            limit: None,
            callback: None,
        }
    }

    /// Accepts `name`, `--name` or `--[no-]name`.
    pub fn long(mut self, long: &str) -> Self {
        self.long = Some(long.to_string());
        self
    }

    /// Accepts `x` or `-x`.
    pub fn short(mut self, short: &str) -> Self {
        self.short = Some(short.to_string());
        self
    }

    pub fn default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn desc(mut self, desc: &str) -> Self {
        self.desc = desc.to_string();
        self
    }

    pub fn arg_name(mut self, arg_name: &str) -> Self {
        self.arg_name = Some(arg_name.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Split every list value on `delimiter`.
    pub fn split(mut self, delimiter: &str) -> Self {
        self.split = Some(delimiter.to_string());
        self
    }

    /// Maximum number of list values.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(Value) -> Result<Value, CastError> + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Derive an option from a declared entry. `keys` and `names` are the
    /// compound prefix of enclosing nested entries.
    pub fn for_entry(entry: &Entry, keys: &[&str], names: &[&str]) -> Self {
        let meta = entry.metadata();
        let default = entry.default_value();
        let kind = meta.kind.unwrap_or(match entry.shape() {
            Shape::Boolean if default == Value::Boolean(true) => OptKind::Switch,
            Shape::Boolean => OptKind::Flag,
            Shape::List => OptKind::List,
            _ => OptKind::Plain,
        });

        let mut key_path = keys.to_vec();
        key_path.push(entry.key());
        let long = meta
            .long
            .as_deref()
            .map(|long| strip_long(long).to_string())
            .unwrap_or_else(|| entry.name().replace('_', "-"));
        let mut long_path = names.to_vec();
        long_path.push(&long);

        let caster = Arc::clone(entry.caster());
        let mut spec = OptSpec::new(&key_path.join(SEPARATOR), kind)
            .long(&long_path.join(SEPARATOR))
            .default(default)
            .desc(&meta.desc)
            .callback(move |value| caster.cast(&value));

        if let Some(short) = &meta.short {
            let short = short.trim_start_matches('-');
            let mut short_path = names.to_vec();
            short_path.push(short);
            spec = spec.short(&short_path.join(SEPARATOR));
        }
        spec.arg_name = meta.arg_name.clone();
        spec.hidden = meta.hidden;
        spec.split = meta.split.clone();
        spec.limit = meta.limit;
        spec
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> OptKind {
        self.kind
    }

    /// Every switch this option answers to, with whether it negates.
    fn switches(&self) -> Vec<(String, bool)> {
        let long = match &self.long {
            Some(long) => format!("--{}", strip_long(long)),
            None => format!("--{}", self.key.replace('_', "-")),
        };
        let mut switches = Vec::new();
        if self.kind == OptKind::Switch {
            switches.push((negate(&long), true));
        }
        switches.push((long, false));
        if let Some(short) = &self.short {
            switches.push((format!("-{}", short.trim_start_matches('-')), false));
        }
        switches
    }

    fn default_bool(&self) -> bool {
        self.default
            .as_ref()
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

fn strip_long(long: &str) -> &str {
    let long = long.trim_start_matches("--");
    long.strip_prefix("[no-]").unwrap_or(long)
}

/// `--a:b:name` → `--a:b:no-name`.
fn negate(long: &str) -> String {
    let body = &long[2..];
    match body.rfind(SEPARATOR) {
        Some(at) => format!("--{}{SEPARATOR}no-{}", &body[..at], &body[at + SEPARATOR.len()..]),
        None => format!("--no-{body}"),
    }
}

/// A switch is valid when every `:`-separated segment is a non-empty run of
/// `[A-Za-z0-9_-]`; short switches end in a single character.
fn valid_switch(switch: &str) -> bool {
    let (body, short) = match switch.strip_prefix("--") {
        Some(body) => (body, false),
        None => match switch.strip_prefix('-') {
            Some(body) => (body, true),
            None => return false,
        },
    };
    let segments: Vec<&str> = body.split(SEPARATOR).collect();
    let well_formed = segments
        .iter()
        .all(|s| !s.is_empty() && !s.starts_with('-') && s.chars().all(is_switch_char));
    let short_ok = !short || segments.last().is_some_and(|s| s.chars().count() == 1);
    well_formed && short_ok
}

/// Parser-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    pub option_break: String,
    pub preserve_option_break: bool,
    pub assign_defaults: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            option_break: "--".to_string(),
            preserve_option_break: false,
            assign_defaults: true,
        }
    }
}

/// Result of a parse: the configuration map and the positional arguments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parsed {
    pub config: Table,
    pub args: Vec<String>,
}

impl Parsed {
    /// The config with compound keys expanded into nested tables.
    pub fn nested(&self) -> Table {
        unflatten(&self.config)
    }
}

#[derive(Debug, Clone)]
enum Item {
    Spec(usize),
    Separator(String),
}

#[derive(Debug, Clone, Default)]
pub struct OptionParser {
    items: Vec<Item>,
    specs: Vec<OptSpec>,
    switches: HashMap<String, (usize, bool)>,
    options: ParserOptions,
}

impl OptionParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParserOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ParserOptions {
        &mut self.options
    }

    /// Register an option. Fails on a duplicate key, a malformed switch, or a
    /// switch (including a derived negation) already taken.
    pub fn on(&mut self, spec: OptSpec) -> Result<&mut Self, DeclarationError> {
        if self.specs.iter().any(|s| s.key == spec.key) {
            return Err(DeclarationError::DuplicateKey(spec.key));
        }
        let switches = spec.switches();
        for (switch, _) in &switches {
            if !valid_switch(switch) {
                return Err(DeclarationError::InvalidSwitch {
                    key: spec.key.clone(),
                    switch: switch.clone(),
                });
            }
            if let Some((index, _)) = self.switches.get(switch) {
                return Err(DeclarationError::DuplicateSwitch {
                    key: spec.key.clone(),
                    switch: switch.clone(),
                    existing: self.specs[*index].key.clone(),
                });
            }
        }

        let index = self.specs.len();
        for (switch, negated) in switches {
            self.switches.insert(switch, (index, negated));
        }
        tracing::debug!(key = %spec.key, kind = ?spec.kind, "registered option");
        self.specs.push(spec);
        self.items.push(Item::Spec(index));
        Ok(self)
    }

    /// Add a line of text to the help output.
    pub fn separator(&mut self, text: &str) -> &mut Self {
        self.items.push(Item::Separator(text.to_string()));
        self
    }

    pub fn specs(&self) -> &[OptSpec] {
        &self.specs
    }

    /// Parse an argument vector. Any error aborts the whole parse.
    pub fn parse<I, S>(&self, argv: I) -> Result<Parsed, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let mut config = Table::new();
        let mut args = Vec::new();

        while let Some(arg) = argv.next() {
            if arg == self.options.option_break {
                if self.options.preserve_option_break {
                    args.push(arg);
                }
                args.extend(argv.by_ref());
                break;
            }

            let Some((switch, value)) = split_switch(&arg, &self.switches) else {
                tracing::trace!(arg = %arg, "positional argument");
                args.push(arg);
                continue;
            };
            let Some(&(index, negated)) = self.switches.get(&switch) else {
                return Err(ParseError::UnknownOption(switch));
            };
            let spec = &self.specs[index];
            tracing::trace!(switch = %switch, key = %spec.key, "matched option");

            match spec.kind {
                OptKind::Flag | OptKind::Switch => {
                    if let Some(value) = value {
                        return Err(ParseError::UnexpectedValue { switch, value });
                    }
                    let on = match spec.kind {
                        OptKind::Flag => !spec.default_bool(),
                        _ => !negated,
                    };
                    config.insert(spec.key.clone(), Value::Boolean(on));
                }
                OptKind::Plain => {
                    let value = take_value(&switch, value, &mut argv)?;
                    config.insert(spec.key.clone(), Value::String(value));
                }
                OptKind::List => {
                    let value = take_value(&switch, value, &mut argv)?;
                    let slot = config
                        .entry(spec.key.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    let Value::Array(items) = slot else {
                        unreachable!("list options only store arrays");
                    };
                    match &spec.split {
                        Some(delimiter) => items.extend(
                            value
                                .split(delimiter.as_str())
                                .map(|part| Value::String(part.to_string())),
                        ),
                        None => items.push(Value::String(value)),
                    }
                    if let Some(limit) = spec.limit
                        && items.len() > limit
                    {
                        return Err(ParseError::TooManyValues {
                            switch,
                            count: items.len(),
                            limit,
                        });
                    }
                }
            }
        }

        if self.options.assign_defaults {
            for spec in &self.specs {
                if !config.contains_key(&spec.key)
                    && let Some(default) = &spec.default
                {
                    config.insert(spec.key.clone(), default.clone());
                }
            }
        }

        for spec in &self.specs {
            if let Some(callback) = &spec.callback
                && let Some(slot) = config.get_mut(&spec.key)
            {
                *slot = callback(slot.clone()).map_err(|source| ParseError::Cast {
                    key: spec.key.clone(),
                    source,
                })?;
            }
        }

        tracing::debug!(options = config.len(), args = args.len(), "parsed arguments");
        Ok(Parsed { config, args })
    }

    /// Help text: one line per visible option, plus separators, in
    /// registration order.
    pub fn help(&self) -> String {
        let rows: Vec<Option<(String, String)>> = self
            .items
            .iter()
            .map(|item| match item {
                Item::Separator(_) => None,
                Item::Spec(index) => {
                    let spec = &self.specs[*index];
                    (!spec.hidden).then(|| (usage(spec), description(spec)))
                }
            })
            .collect();
        let width = rows
            .iter()
            .flatten()
            .map(|(usage, _)| usage.len())
            .max()
            .unwrap_or(0);

        let mut out = String::new();
        for (item, row) in self.items.iter().zip(rows) {
            match (item, row) {
                (Item::Separator(text), _) => {
                    out.push_str(text);
                    out.push('\n');
                }
                (_, Some((usage, desc))) if desc.is_empty() => {
                    out.push_str(&format!("    {usage}\n"));
                }
                (_, Some((usage, desc))) => {
                    out.push_str(&format!("    {usage:<width$}  {desc}\n"));
                }
                (_, None) => {}
            }
        }
        out
    }
}

impl fmt::Display for OptionParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.help())
    }
}

fn usage(spec: &OptSpec) -> String {
    let mut switches: Vec<String> = Vec::new();
    if let Some(short) = &spec.short {
        switches.push(format!("-{}", short.trim_start_matches('-')));
    }
    let long = spec.switches().into_iter().find(|(s, negated)| s.starts_with("--") && !negated);
    if let Some((long, _)) = long {
        if spec.kind == OptKind::Switch {
            let body = &long[2..];
            let shown = match body.rfind(SEPARATOR) {
                Some(at) => format!("--{}{SEPARATOR}[no-]{}", &body[..at], &body[at + SEPARATOR.len()..]),
                None => format!("--[no-]{body}"),
            };
            switches.push(shown);
        } else {
            switches.push(long);
        }
    }
    let mut usage = switches.join(", ");
    if matches!(spec.kind, OptKind::Plain | OptKind::List) {
        let arg = spec
            .arg_name
            .clone()
            .unwrap_or_else(|| spec.key.rsplit(SEPARATOR).next().unwrap_or(&spec.key).to_uppercase());
        usage.push(' ');
        usage.push_str(&arg);
    }
    usage
}

fn description(spec: &OptSpec) -> String {
    let default = match (&spec.default, spec.kind) {
        (Some(default), OptKind::Plain | OptKind::List) if !is_blank(default) => {
            Some(display_plain(default))
        }
        _ => None,
    };
    match default {
        Some(default) if spec.desc.is_empty() => format!("(default: {default})"),
        Some(default) => format!("{} (default: {default})", spec.desc),
        None => spec.desc.clone(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Table(table) => table.is_empty(),
        _ => false,
    }
}

/// Split a switch-looking argument into `(switch, attached value)`. Returns
/// `None` for positional arguments. A short argument containing `:` is a
/// compound switch only when `known` has it; otherwise it is `-x` with an
/// attached value (`-uhttp://host`).
fn split_switch(
    arg: &str,
    known: &HashMap<String, (usize, bool)>,
) -> Option<(String, Option<String>)> {
    if let Some(body) = arg.strip_prefix("--") {
        if body.is_empty() {
            return None;
        }
        return Some(match body.split_once('=') {
            Some((name, value)) => (format!("--{name}"), Some(value.to_string())),
            None => (arg.to_string(), None),
        });
    }

    let body = arg.strip_prefix('-')?;
    let first = body.chars().next()?;
    if !(first.is_ascii_alphanumeric() || first == '_') {
        return None;
    }
    let (head, value) = match body.split_once('=') {
        Some((head, value)) => (head, Some(value.to_string())),
        None => (body, None),
    };
    if head.chars().count() == 1 {
        return Some((format!("-{head}"), value));
    }
    if head.contains(SEPARATOR) {
        let compound = format!("-{head}");
        if known.contains_key(&compound) {
            return Some((compound, value));
        }
    }
    // Attached value: `-xvalue` (the value may itself contain '=').
    let rest = &body[first.len_utf8()..];
    Some((format!("-{first}"), Some(rest.to_string())))
}

fn take_value(
    switch: &str,
    attached: Option<String>,
    argv: &mut impl Iterator<Item = String>,
) -> Result<String, ParseError> {
    match attached {
        Some(value) => Ok(value),
        None => argv
            .next()
            .ok_or_else(|| ParseError::MissingValue(switch.to_string())),
    }
}
