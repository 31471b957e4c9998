//! Receivers and their accessor tables.
//!
//! A binding never touches a receiver's fields directly; it calls readers and
//! writers by identifier. An [`Accessors`] table maps those identifiers to
//! typed functions, so a receiver type only has to delegate:
//!
//! ```ignore
//! static ACCESSORS: LazyLock<Accessors<Server>> = LazyLock::new(|| {
//!     Accessors::new()
//!         .reader("port", |s| s.port.into())
//!         .writer("set_port", |s, v| {
//!             s.port = v.try_into()?;
//!             Ok(())
//!         })
//! });
//!
//! impl Receiver for Server {
//!     fn read(&self, reader: &str) -> Option<Value> {
//!         ACCESSORS.read(self, reader)
//!     }
//!     fn write(&mut self, writer: &str, value: Value) -> Result<(), BindingError> {
//!         ACCESSORS.write(self, writer, value)
//!     }
//! }
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use toml::Value;

use crate::error::BindingError;

/// An object whose configuration values are reached through accessors.
pub trait Receiver {
    /// Call the reader named `reader`. `None` when no such reader exists.
    fn read(&self, reader: &str) -> Option<Value>;

    /// Call the writer named `writer`.
    fn write(&mut self, writer: &str, value: Value) -> Result<(), BindingError>;
}

/// Shared handle to a receiver. Bindings hold one without owning the
/// receiver's lifetime.
pub type ReceiverRef = Rc<RefCell<dyn Receiver>>;

pub type Reader<T> = fn(&T) -> Value;
pub type Writer<T> = fn(&mut T, Value) -> Result<(), toml::de::Error>;

/// Identifier → typed getter/setter table for a receiver type.
pub struct Accessors<T> {
    readers: HashMap<String, Reader<T>>,
    writers: HashMap<String, Writer<T>>,
}

impl<T> Default for Accessors<T> {
    fn default() -> Self {
        Self {
            readers: HashMap::new(),
            writers: HashMap::new(),
        }
    }
}

impl<T> Accessors<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reader(mut self, id: &str, reader: Reader<T>) -> Self {
        self.readers.insert(id.to_string(), reader);
        self
    }

    pub fn writer(mut self, id: &str, writer: Writer<T>) -> Self {
        self.writers.insert(id.to_string(), writer);
        self
    }

    pub fn read(&self, target: &T, id: &str) -> Option<Value> {
        self.readers.get(id).map(|reader| reader(target))
    }

    pub fn write(&self, target: &mut T, id: &str, value: Value) -> Result<(), BindingError> {
        let writer = self
            .writers
            .get(id)
            .ok_or_else(|| BindingError::MissingAccessor(id.to_string()))?;
        writer(target, value).map_err(|e| BindingError::Rejected {
            accessor: id.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::Server;

    #[test]
    fn reads_and_writes_through_table() {
        let mut server = Server::default();
        server.write("set_port", Value::Integer(9000)).unwrap();
        assert_eq!(server.port, 9000);
        assert_eq!(server.read("port"), Some(Value::Integer(9000)));
    }

    #[test]
    fn unknown_accessors() {
        let mut server = Server::default();
        assert_eq!(server.read("nope"), None);
        assert_eq!(
            server.write("set_nope", Value::Integer(1)).unwrap_err(),
            BindingError::MissingAccessor("set_nope".into())
        );
    }

    #[test]
    fn mistyped_value_is_rejected() {
        let mut server = Server::default();
        let err = server
            .write("set_port", Value::String("eighty".into()))
            .unwrap_err();
        assert!(matches!(err, BindingError::Rejected { ref accessor, .. } if accessor == "set_port"));
    }
}
