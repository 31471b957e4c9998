//! Map view over one registry and (optionally) one receiver.
//!
//! Values live in one of two stores:
//!
//! - the **receiver**, reached through the entry's reader and writer, is
//!   authoritative for entries with accessors while bound;
//! - the **fallback** table holds everything else: undeclared keys, entries
//!   without accessors, and every value while unbound.
//!
//! While bound, the fallback table never holds a key the receiver owns.
//! [`Binding::is_consistent`] checks this and [`Binding::repair`] restores it.

use std::rc::Rc;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use toml::{Table, Value};

use crate::accessor::ReceiverRef;
use crate::entry::Entry;
use crate::error::{BindingError, Error};
use crate::merge::merge_value;
use crate::registry::Registry;

/// Capability shared by bindings and plain tables so either side of a merge
/// can be a binding or a table.
pub trait ConfigMap {
    fn get(&self, key: &str) -> Result<Option<Value>, BindingError>;

    fn set(&mut self, key: &str, value: Value) -> Result<(), BindingError>;

    fn keys(&self) -> Vec<String>;

    fn has_key(&self, key: &str) -> bool;

    /// Visit every key with its current value, in key order.
    fn each_pair(&self, f: &mut dyn FnMut(&str, Value)) -> Result<(), BindingError> {
        for key in self.keys() {
            if let Some(value) = self.get(&key)? {
                f(&key, value);
            }
        }
        Ok(())
    }
}

impl ConfigMap for Table {
    fn get(&self, key: &str) -> Result<Option<Value>, BindingError> {
        Ok(Table::get(self, key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), BindingError> {
        self.insert(key.to_string(), value);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        Table::keys(self).cloned().collect()
    }

    fn has_key(&self, key: &str) -> bool {
        self.contains_key(key)
    }
}

pub struct Binding {
    registry: Arc<Registry>,
    receiver: Option<ReceiverRef>,
    store: Table,
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("registry", &self.registry.type_name())
            .field("bound", &self.is_bound())
            .field("store", &self.store)
            .finish()
    }
}

impl Binding {
    /// An unbound, empty binding.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_store(registry, Table::new())
    }

    /// An unbound binding pre-populated with `store`.
    pub fn with_store(registry: Arc<Registry>, store: Table) -> Self {
        Self {
            registry,
            receiver: None,
            store,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn is_bound(&self) -> bool {
        self.receiver.is_some()
    }

    pub fn receiver(&self) -> Option<&ReceiverRef> {
        self.receiver.as_ref()
    }

    /// The fallback table.
    pub fn store(&self) -> &Table {
        &self.store
    }

    /// Raw access to the fallback table. Writing a receiver-owned key here
    /// while bound makes the binding inconsistent until [`repair`](Self::repair).
    pub fn store_mut(&mut self) -> &mut Table {
        &mut self.store
    }

    /// Current value of `key`. Declared keys fall back to their default;
    /// undeclared keys missing from the fallback table are `None`.
    pub fn get(&self, key: &str) -> Result<Option<Value>, BindingError> {
        let Some(entry) = self.registry.get(key) else {
            return Ok(self.store.get(key).cloned());
        };
        if let Some(receiver) = self.owner(entry)
            && let Some(reader) = entry.reader()
        {
            return receiver
                .borrow()
                .read(reader)
                .map(Some)
                .ok_or_else(|| BindingError::MissingAccessor(reader.to_string()));
        }
        Ok(Some(
            self.store
                .get(key)
                .cloned()
                .unwrap_or_else(|| entry.default_value()),
        ))
    }

    pub fn set(&mut self, key: &str, value: Value) -> Result<(), BindingError> {
        if let Some(entry) = self.registry.get(key)
            && let Some(receiver) = self.owner(entry)
            && let Some(writer) = entry.writer()
        {
            return receiver.borrow_mut().write(writer, value);
        }
        self.store.insert(key.to_string(), value);
        Ok(())
    }

    /// Remove `key` from the fallback table.
    pub fn delete(&mut self, key: &str) -> Option<Value> {
        self.store.remove(key)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.registry.contains(key) || self.store.contains_key(key)
    }

    /// Declared keys in declaration order, then undeclared fallback keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.registry.keys().map(str::to_string).collect();
        keys.extend(
            self.store
                .keys()
                .filter(|key| !self.registry.contains(key))
                .cloned(),
        );
        keys
    }

    /// Attach to `receiver`: fallback values (or defaults) of every entry
    /// with accessors are written into it and leave the fallback table.
    ///
    /// Binding again to the same receiver is a no-op; binding to a different
    /// one fails with [`BindingError::AlreadyBound`].
    pub fn bind(&mut self, receiver: ReceiverRef) -> Result<(), BindingError> {
        if let Some(current) = &self.receiver {
            if Rc::ptr_eq(current, &receiver) {
                return Ok(());
            }
            return Err(BindingError::AlreadyBound);
        }

        let owned: Vec<&Entry> = self
            .registry
            .entries()
            .iter()
            .filter(|e| e.has_accessors())
            .collect();
        {
            let mut target = receiver.borrow_mut();
            for entry in &owned {
                let value = self
                    .store
                    .get(entry.key())
                    .cloned()
                    .unwrap_or_else(|| entry.default_value());
                if let Some(writer) = entry.writer() {
                    target.write(writer, value)?;
                }
            }
        }
        let keys: Vec<String> = owned.iter().map(|e| e.key().to_string()).collect();
        for key in keys {
            self.store.remove(&key);
        }
        self.receiver = Some(receiver);
        tracing::debug!(type_name = %self.registry.type_name(), "bound config to receiver");
        Ok(())
    }

    /// Unbind (if bound) and bind to `receiver`.
    pub fn rebind(&mut self, receiver: ReceiverRef) -> Result<(), BindingError> {
        self.unbind()?;
        self.bind(receiver)
    }

    /// Detach from the receiver. Afterwards the fallback table holds every
    /// declared key: receiver-owned values are read back, the rest keep their
    /// fallback value or default. Returns the receiver that was bound.
    pub fn unbind(&mut self) -> Result<Option<ReceiverRef>, BindingError> {
        let Some(receiver) = self.receiver.clone() else {
            return Ok(None);
        };
        let mut values = Vec::new();
        {
            let source = receiver.borrow();
            for entry in self.registry.entries() {
                let value = match entry.reader().filter(|_| entry.has_accessors()) {
                    Some(reader) => source
                        .read(reader)
                        .ok_or_else(|| BindingError::MissingAccessor(reader.to_string()))?,
                    None => self
                        .store
                        .get(entry.key())
                        .cloned()
                        .unwrap_or_else(|| entry.default_value()),
                };
                values.push((entry.key().to_string(), value));
            }
        }
        for (key, value) in values {
            self.store.insert(key, value);
        }
        self.receiver = None;
        tracing::debug!(type_name = %self.registry.type_name(), "unbound config from receiver");
        Ok(Some(receiver))
    }

    /// True unless bound with a receiver-owned key left in the fallback table.
    pub fn is_consistent(&self) -> bool {
        self.receiver.is_none() || self.stray_keys().is_empty()
    }

    /// Move receiver-owned keys out of the fallback table and into the
    /// receiver.
    pub fn repair(&mut self) -> Result<(), BindingError> {
        if self.receiver.is_none() {
            return Ok(());
        }
        let stray = self.stray_keys();
        if !stray.is_empty() {
            tracing::debug!(keys = ?stray, "repairing inconsistent config binding");
        }
        for key in stray {
            if let Some(value) = self.store.remove(&key) {
                self.set(&key, value)?;
            }
        }
        Ok(())
    }

    /// Carry over every key `other` has: declared keys first in declaration
    /// order, then the rest in `other`'s order. Nested entries merge
    /// table-wise.
    pub fn merge(&mut self, other: &dyn ConfigMap) -> Result<(), BindingError> {
        let declared: Vec<(String, bool)> = self
            .registry
            .entries()
            .iter()
            .filter(|e| other.has_key(e.key()))
            .map(|e| (e.key().to_string(), e.nested().is_some()))
            .collect();
        for (key, nested) in declared {
            let Some(incoming) = other.get(&key)? else {
                continue;
            };
            let value = match self.get(&key)? {
                Some(current) if nested => merge_value(current, incoming),
                _ => incoming,
            };
            self.set(&key, value)?;
        }
        for key in other.keys() {
            if self.registry.contains(&key) {
                continue;
            }
            if let Some(value) = other.get(&key)? {
                self.set(&key, value)?;
            }
        }
        Ok(())
    }

    /// Cast an external (name-keyed) map through the registry and merge it.
    pub fn import(&mut self, external: &Table) -> Result<(), Error> {
        let internal = self.registry.import(external)?;
        self.merge(&internal)?;
        Ok(())
    }

    /// Name-keyed, uncast view of the current contents.
    pub fn export(&self) -> Result<Table, BindingError> {
        Ok(self.registry.export(&self.to_map(false)?))
    }

    /// Plain map of the current contents. With `scrub`, values equal to their
    /// entry's default are left out, recursively.
    pub fn to_map(&self, scrub: bool) -> Result<Table, BindingError> {
        let mut out = Table::new();
        for key in self.keys() {
            if let Some(value) = self.get(&key)? {
                out.insert(key, value);
            }
        }
        Ok(if scrub { self.registry.scrub(&out) } else { out })
    }

    /// Deserialize the current contents into any serde type.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Value::Table(self.to_map(false)?)
            .try_into()
            .map_err(|e: toml::de::Error| Error::Deserialize(e.to_string()))
    }

    /// A new, unbound binding over the same registry holding a snapshot of
    /// the current contents.
    pub fn duplicate(&self) -> Result<Binding, BindingError> {
        Ok(Self::with_store(Arc::clone(&self.registry), self.to_map(false)?))
    }

    /// The receiver, when it owns `entry`'s value.
    fn owner(&self, entry: &Entry) -> Option<&ReceiverRef> {
        self.receiver.as_ref().filter(|_| entry.has_accessors())
    }

    fn stray_keys(&self) -> Vec<String> {
        self.registry
            .entries()
            .iter()
            .filter(|e| e.has_accessors() && self.store.contains_key(e.key()))
            .map(|e| e.key().to_string())
            .collect()
    }
}

impl ConfigMap for Binding {
    fn get(&self, key: &str) -> Result<Option<Value>, BindingError> {
        Binding::get(self, key)
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), BindingError> {
        Binding::set(self, key, value)
    }

    fn keys(&self) -> Vec<String> {
        Binding::keys(self)
    }

    fn has_key(&self, key: &str) -> bool {
        Binding::has_key(self, key)
    }
}
