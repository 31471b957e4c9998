//! A single configuration declaration.

use std::sync::Arc;

use toml::Value;

use crate::caster::{Caster, ListCaster, SelectCaster, Shape};
use crate::error::DeclarationError;
use crate::parser::OptKind;
use crate::registry::Registry;
use crate::value::is_word;

/// How an entry's reader or writer identifier is chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Accessor {
    /// Derived from the entry name: `name` for readers, `set_name` for writers.
    #[default]
    Auto,
    Named(String),
    /// No accessor; values live in the binding's fallback store.
    Suppressed,
}

/// Presentation and parsing attributes attached to an entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub desc: String,
    pub name: Option<String>,
    pub reader: Accessor,
    pub writer: Accessor,
    pub short: Option<String>,
    pub long: Option<String>,
    pub arg_name: Option<String>,
    pub hidden: bool,
    /// Whitelist of acceptable values (applied per element for lists).
    pub options: Option<Vec<Value>>,
    pub kind: Option<OptKind>,
    pub split: Option<String>,
    pub limit: Option<usize>,
}

impl Metadata {
    pub fn new(desc: impl Into<String>) -> Self {
        Self {
            desc: desc.into(),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn reader(mut self, reader: Accessor) -> Self {
        self.reader = reader;
        self
    }

    pub fn writer(mut self, writer: Accessor) -> Self {
        self.writer = writer;
        self
    }

    /// Suppress both accessors.
    pub fn no_accessors(self) -> Self {
        self.reader(Accessor::Suppressed).writer(Accessor::Suppressed)
    }

    pub fn short(mut self, short: &str) -> Self {
        self.short = Some(short.to_string());
        self
    }

    pub fn long(mut self, long: &str) -> Self {
        self.long = Some(long.to_string());
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

    pub fn options<I, V>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn kind(mut self, kind: OptKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn split(mut self, delimiter: &str) -> Self {
        self.split = Some(delimiter.to_string());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One declared configuration item: key, default, caster, accessors and
/// metadata.
#[derive(Debug, Clone)]
pub struct Entry {
    key: String,
    name: String,
    reader: Option<String>,
    writer: Option<String>,
    default: Value,
    caster: Arc<dyn Caster>,
    metadata: Metadata,
    order: usize,
}

impl Entry {
    /// Build an entry. A whitelist in `metadata.options` wraps the caster (or,
    /// for lists, the element caster) in a [`SelectCaster`].
    pub fn new(
        key: &str,
        default: Value,
        caster: Arc<dyn Caster>,
        metadata: Metadata,
    ) -> Result<Self, DeclarationError> {
        let name = metadata.name.clone().unwrap_or_else(|| key.to_string());
        if !is_word(&name) {
            return Err(DeclarationError::InvalidName {
                key: key.to_string(),
                name,
            });
        }

        let caster = match &metadata.options {
            Some(options) => select(key, caster, options)?,
            None => caster,
        };

        let reader = match &metadata.reader {
            Accessor::Auto => Some(name.clone()),
            Accessor::Named(id) => Some(id.clone()),
            Accessor::Suppressed => None,
        };
        let writer = match &metadata.writer {
            Accessor::Auto => Some(format!("set_{name}")),
            Accessor::Named(id) => Some(id.clone()),
            Accessor::Suppressed => None,
        };

        Ok(Self {
            key: key.to_string(),
            name,
            reader,
            writer,
            default,
            caster,
            metadata,
            order: 0,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reader(&self) -> Option<&str> {
        self.reader.as_deref()
    }

    pub fn writer(&self) -> Option<&str> {
        self.writer.as_deref()
    }

    /// True when both accessors exist, so the receiver owns the value while
    /// bound.
    pub fn has_accessors(&self) -> bool {
        self.reader.is_some() && self.writer.is_some()
    }

    /// A fresh copy of the default; callers may mutate it freely.
    pub fn default_value(&self) -> Value {
        self.default.clone()
    }

    pub fn caster(&self) -> &Arc<dyn Caster> {
        &self.caster
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Position of this entry in its registry's declaration order.
    pub fn order(&self) -> usize {
        self.order
    }

    pub(crate) fn set_order(&mut self, order: usize) {
        self.order = order;
    }

    /// The child registry when this entry nests another configuration.
    pub fn nested(&self) -> Option<&Arc<Registry>> {
        self.caster.registry()
    }

    pub fn shape(&self) -> Shape {
        self.caster.shape()
    }
}

fn select(
    key: &str,
    caster: Arc<dyn Caster>,
    options: &[Value],
) -> Result<Arc<dyn Caster>, DeclarationError> {
    let invalid = |source| DeclarationError::InvalidOptions {
        key: key.to_string(),
        source,
    };
    if let Some(element) = caster.element() {
        let element = SelectCaster::new(Arc::clone(element), options).map_err(invalid)?;
        return Ok(Arc::new(ListCaster::new(Arc::new(element))));
    }
    Ok(Arc::new(SelectCaster::new(caster, options).map_err(invalid)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caster::{IntegerCaster, StringCaster};
    use crate::error::CastError;

    #[test]
    fn name_defaults_to_key_and_derives_accessors() {
        let entry = Entry::new("port", Value::Integer(80), Arc::new(IntegerCaster), Metadata::default())
            .unwrap();
        assert_eq!(entry.name(), "port");
        assert_eq!(entry.reader(), Some("port"));
        assert_eq!(entry.writer(), Some("set_port"));
        assert!(entry.has_accessors());
    }

    #[test]
    fn invalid_name_is_rejected() {
        let err = Entry::new("my-key", Value::Integer(1), Arc::new(IntegerCaster), Metadata::default())
            .unwrap_err();
        assert!(matches!(err, DeclarationError::InvalidName { .. }));

        let ok = Entry::new(
            "my-key",
            Value::Integer(1),
            Arc::new(IntegerCaster),
            Metadata::default().name("my_key"),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn suppressed_accessors() {
        let entry = Entry::new(
            "a",
            Value::Integer(1),
            Arc::new(IntegerCaster),
            Metadata::default().no_accessors(),
        )
        .unwrap();
        assert_eq!(entry.reader(), None);
        assert!(!entry.has_accessors());
    }

    #[test]
    fn whitelist_wraps_scalar_caster() {
        let entry = Entry::new(
            "mode",
            Value::String("fast".into()),
            Arc::new(StringCaster),
            Metadata::default().options(["fast", "slow"]),
        )
        .unwrap();
        assert!(entry.caster().cast(&Value::String("slow".into())).is_ok());
        assert!(matches!(
            entry.caster().cast(&Value::String("medium".into())),
            Err(CastError::NotInWhitelist { .. })
        ));
    }

    #[test]
    fn whitelist_applies_per_list_element() {
        let list = Arc::new(ListCaster::new(Arc::new(IntegerCaster)));
        let entry = Entry::new(
            "lst",
            Value::Array(vec![]),
            list,
            Metadata::default().options([1, 2, 3]),
        )
        .unwrap();
        let ok = Value::Array(vec![Value::String("1".into()), Value::String("3".into())]);
        assert_eq!(
            entry.caster().cast(&ok).unwrap(),
            Value::Array(vec![Value::Integer(1), Value::Integer(3)])
        );
        let bad = Value::Array(vec![Value::String("4".into())]);
        assert!(entry.caster().cast(&bad).is_err());
    }

    #[test]
    fn default_is_an_independent_copy() {
        let entry = Entry::new(
            "lst",
            Value::Array(vec![Value::Integer(1)]),
            Arc::new(ListCaster::new(Arc::new(IntegerCaster))),
            Metadata::default(),
        )
        .unwrap();
        let mut copy = entry.default_value();
        if let Value::Array(items) = &mut copy {
            items.push(Value::Integer(2));
        }
        assert_eq!(entry.default_value(), Value::Array(vec![Value::Integer(1)]));
    }
}
