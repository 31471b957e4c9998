//! Declarative configuration entries bound to host objects, with a
//! command-line parser derived from the same declarations.
//!
//! A type declares its configurable values once in a [`Registry`]: a key, a
//! default, a [`Caster`] that turns loose external input into a typed value,
//! and descriptive [`Metadata`]. Everything else derives from that
//! declaration:
//!
//! ```ignore
//! let mut registry = Registry::new("Server");
//! registry.declare("host", "localhost", Metadata::new("Address to bind"))?;
//! registry.declare("port", 8080, Metadata::new("Listening port").short("p"))?;
//!
//! let parsed = registry.parse(std::env::args().skip(1))?;
//! let mut config = Binding::new(Arc::new(registry));
//! config.merge(&parsed.config)?;
//! config.bind(server.clone())?;
//! ```
//!
//! # Registries
//!
//! Declaration order is preserved and drives help output, entry indices, and
//! the order in which values are applied. A registry can be composed from
//! parent registries with [`Registry::compose`]; the parents are copied once
//! and later changes to them do not propagate.
//!
//! An entry whose caster carries a registry of its own is *nested*: its value
//! is a table keyed by the child registry's keys. Cycles through nested
//! registries are rejected at declaration time.
//!
//! # Bindings
//!
//! A [`Binding`] is a map view over one registry. Unbound, it stores every
//! value itself. Bound to a [`Receiver`], values of entries with accessors
//! live in the receiver and are reached through named readers and writers;
//! everything else stays in the binding's fallback table. [`Accessors`]
//! builds the identifier-to-function table a receiver delegates to.
//!
//! # Option parsing
//!
//! [`OptionParser`] is a small getopt-style parser. Options come in four
//! kinds ([`OptKind`]): plain options take a value, flags toggle their
//! default, switches have a derived `--no-` form, and list options
//! accumulate. [`Registry::to_parser`] derives one option per entry; options
//! of nested entries use compound names joined by [`SEPARATOR`]
//! (`--db:pool 9`).
//!
//! Parsing stops at the option break (`--` by default); everything after it,
//! and every argument that is not an option, is returned as positional.
//!
//! # Error handling
//!
//! Each phase has its own error type: [`DeclarationError`] at setup,
//! [`CastError`] for malformed input, [`ParseError`] for a failed parse, and
//! [`BindingError`] for binding misuse. [`Error`] wraps them all. See the
//! [`error`] module for the full set.
//!
//! # Logging
//!
//! The crate emits [`tracing`] events: `debug` for registry composition,
//! binding lifecycle, and parse summaries; `trace` for individual matched
//! arguments. Install any subscriber to see them.

pub mod accessor;
pub mod binding;
pub mod caster;
pub mod entry;
pub mod error;
pub mod flatten;
pub mod parser;
pub mod registry;
pub mod value;

pub(crate) mod merge;

#[cfg(test)]
mod fixtures;

pub use accessor::{Accessors, Receiver, ReceiverRef};
pub use binding::{Binding, ConfigMap};
pub use caster::{
    BooleanCaster, Caster, CasterTable, FloatCaster, IntegerCaster, ListCaster, NestedCaster,
    ObjectCaster, SelectCaster, Shape, StringCaster,
};
pub use entry::{Accessor, Entry, Metadata};
pub use error::{BindingError, CastError, DeclarationError, Error, ParseError};
pub use flatten::{SEPARATOR, flatten, unflatten};
pub use parser::{OptKind, OptSpec, OptionParser, Parsed, ParserOptions};
pub use registry::Registry;
