//! Casters convert between the external representation of a value (what a
//! user types or a file contains) and the internal value stored for an entry.
//!
//! Every entry carries exactly one [`Caster`]. When none is given at
//! declaration time it is inferred from the default value by a
//! [`CasterTable`]:
//!
//! 1. registered casters, most specific first, whose [`Caster::matches`]
//!    accepts the default;
//! 2. the default's shape: boolean, integer, float, list of the first
//!    element's caster, string;
//! 3. otherwise the identity [`ObjectCaster`].

use std::fmt;
use std::sync::Arc;

use toml::Value;

use crate::error::CastError;
use crate::registry::Registry;
use crate::value::display_plain;

/// Coarse classification used to derive command-line option kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Boolean,
    List,
    Nested,
}

/// Type adapter between an external representation and an internal value.
pub trait Caster: fmt::Debug + Send + Sync {
    /// Short type name used in help text and errors.
    fn name(&self) -> &'static str;

    /// Convert external input into the internal value.
    fn cast(&self, input: &Value) -> Result<Value, CastError>;

    /// Convert an internal value back into its external form.
    fn uncast(&self, value: &Value) -> Value {
        value.clone()
    }

    /// Whether `value` looks like something this caster produces.
    fn matches(&self, value: &Value) -> bool;

    /// Rank among registered casters; higher wins during inference.
    fn specificity(&self) -> u32 {
        0
    }

    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    /// The child registry of a nesting caster.
    fn registry(&self) -> Option<&Arc<Registry>> {
        None
    }

    /// The element caster of a list caster.
    fn element(&self) -> Option<&Arc<dyn Caster>> {
        None
    }
}

/// Identity caster; accepts anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectCaster;

impl Caster for ObjectCaster {
    fn name(&self) -> &'static str {
        "object"
    }

    fn cast(&self, input: &Value) -> Result<Value, CastError> {
        Ok(input.clone())
    }

    fn matches(&self, _value: &Value) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StringCaster;

impl Caster for StringCaster {
    fn name(&self) -> &'static str {
        "string"
    }

    fn cast(&self, input: &Value) -> Result<Value, CastError> {
        match input {
            Value::String(_) => Ok(input.clone()),
            Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => {
                Ok(Value::String(display_plain(input)))
            }
            other => Err(CastError::malformed("string", other)),
        }
    }

    fn uncast(&self, value: &Value) -> Value {
        Value::String(display_plain(value))
    }

    fn matches(&self, value: &Value) -> bool {
        value.is_str()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerCaster;

impl Caster for IntegerCaster {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn cast(&self, input: &Value) -> Result<Value, CastError> {
        match input {
            Value::Integer(_) => Ok(input.clone()),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| CastError::malformed("integer", input)),
            other => Err(CastError::malformed("integer", other)),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        value.is_integer()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FloatCaster;

impl Caster for FloatCaster {
    fn name(&self) -> &'static str {
        "float"
    }

    fn cast(&self, input: &Value) -> Result<Value, CastError> {
        match input {
            Value::Float(_) => Ok(input.clone()),
            Value::Integer(i) => Ok(Value::Float(*i as f64)),
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Value::Float(f)),
                _ => Err(CastError::malformed("float", input)),
            },
            other => Err(CastError::malformed("float", other)),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        value.is_float()
    }
}

/// Accepts native booleans and the exact tokens `true` / `false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanCaster;

impl Caster for BooleanCaster {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn cast(&self, input: &Value) -> Result<Value, CastError> {
        match input {
            Value::Boolean(_) => Ok(input.clone()),
            Value::String(s) if s == "true" => Ok(Value::Boolean(true)),
            Value::String(s) if s == "false" => Ok(Value::Boolean(false)),
            other => Err(CastError::malformed("boolean", other)),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        value.is_bool()
    }

    fn shape(&self) -> Shape {
        Shape::Boolean
    }
}

/// Casts every member of a sequence with an element caster.
#[derive(Debug, Clone)]
pub struct ListCaster {
    element: Arc<dyn Caster>,
}

impl ListCaster {
    pub fn new(element: Arc<dyn Caster>) -> Self {
        Self { element }
    }
}

impl Caster for ListCaster {
    fn name(&self) -> &'static str {
        "list"
    }

    fn cast(&self, input: &Value) -> Result<Value, CastError> {
        let Value::Array(items) = input else {
            return Err(CastError::malformed("list", input));
        };
        items
            .iter()
            .map(|item| self.element.cast(item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    fn uncast(&self, value: &Value) -> Value {
        match value {
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.element.uncast(item)).collect())
            }
            other => other.clone(),
        }
    }

    fn matches(&self, value: &Value) -> bool {
        value.is_array()
    }

    fn shape(&self) -> Shape {
        Shape::List
    }

    fn element(&self) -> Option<&Arc<dyn Caster>> {
        Some(&self.element)
    }
}

/// Restricts another caster's output to a whitelist of values.
#[derive(Debug, Clone)]
pub struct SelectCaster {
    inner: Arc<dyn Caster>,
    options: Vec<Value>,
}

impl SelectCaster {
    /// Options are stored in their cast form so comparisons are exact.
    pub fn new(inner: Arc<dyn Caster>, options: &[Value]) -> Result<Self, CastError> {
        let options = options
            .iter()
            .map(|option| inner.cast(option))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { inner, options })
    }

    pub fn options(&self) -> &[Value] {
        &self.options
    }
}

impl Caster for SelectCaster {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn cast(&self, input: &Value) -> Result<Value, CastError> {
        let value = self.inner.cast(input)?;
        if self.options.contains(&value) {
            Ok(value)
        } else {
            Err(CastError::NotInWhitelist {
                value: display_plain(input),
                options: self
                    .options
                    .iter()
                    .map(display_plain)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
        }
    }

    fn uncast(&self, value: &Value) -> Value {
        self.inner.uncast(value)
    }

    fn matches(&self, value: &Value) -> bool {
        self.inner.matches(value)
    }

    fn shape(&self) -> Shape {
        self.inner.shape()
    }
}

/// Casts a loose map into a configuration object of another registry.
#[derive(Debug, Clone)]
pub struct NestedCaster {
    registry: Arc<Registry>,
}

impl NestedCaster {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }
}

impl Caster for NestedCaster {
    fn name(&self) -> &'static str {
        "nest"
    }

    /// Missing child keys are filled from the child registry's defaults.
    fn cast(&self, input: &Value) -> Result<Value, CastError> {
        let Value::Table(table) = input else {
            return Err(CastError::malformed("table", input));
        };
        let mut out = self.registry.defaults();
        for (key, value) in self.registry.import(table)? {
            out.insert(key, value);
        }
        Ok(Value::Table(out))
    }

    fn uncast(&self, value: &Value) -> Value {
        match value {
            Value::Table(table) => Value::Table(self.registry.export(table)),
            other => other.clone(),
        }
    }

    fn matches(&self, _value: &Value) -> bool {
        false
    }

    fn shape(&self) -> Shape {
        Shape::Nested
    }

    fn registry(&self) -> Option<&Arc<Registry>> {
        Some(&self.registry)
    }
}

/// Ordered set of user-registered casters consulted during inference.
#[derive(Debug, Clone, Default)]
pub struct CasterTable {
    registered: Vec<Arc<dyn Caster>>,
}

impl CasterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a caster. Higher specificity is consulted first; ties keep
    /// registration order.
    pub fn register(&mut self, caster: Arc<dyn Caster>) {
        let at = self
            .registered
            .iter()
            .position(|c| c.specificity() < caster.specificity())
            .unwrap_or(self.registered.len());
        self.registered.insert(at, caster);
    }

    /// Append another table's casters, keeping specificity order.
    pub fn extend(&mut self, other: &CasterTable) {
        for caster in &other.registered {
            self.register(Arc::clone(caster));
        }
    }

    /// Pick a caster for an entry with the given default.
    pub fn infer(&self, default: &Value) -> Arc<dyn Caster> {
        if let Some(caster) = self.registered.iter().find(|c| c.matches(default)) {
            return Arc::clone(caster);
        }
        match default {
            Value::Boolean(_) => Arc::new(BooleanCaster),
            Value::Integer(_) => Arc::new(IntegerCaster),
            Value::Float(_) => Arc::new(FloatCaster),
            Value::String(_) => Arc::new(StringCaster),
            Value::Array(items) => {
                let element = items
                    .first()
                    .map(|item| self.infer(item))
                    .unwrap_or_else(|| Arc::new(ObjectCaster));
                Arc::new(ListCaster::new(element))
            }
            _ => Arc::new(ObjectCaster),
        }
    }
}
