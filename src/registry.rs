//! Ordered, inheritable set of configuration entries declared on a type.
//!
//! Declaration order is significant: it drives help ordering, the per-entry
//! order index, and the order in which a binding applies values.
//!
//! Inheritance is an explicit composition step: [`Registry::compose`] copies a
//! fixed list of parent registries once. Declarations made on a parent after
//! a child was composed never reach the child.

use std::sync::Arc;

use toml::{Table, Value};

use crate::caster::{Caster, CasterTable, NestedCaster};
use crate::entry::{Entry, Metadata};
use crate::error::{CastError, DeclarationError, Error};
use crate::flatten::unflatten;
use crate::parser::{OptSpec, OptionParser, Parsed};

#[derive(Debug, Clone)]
pub struct Registry {
    type_name: String,
    entries: Vec<Entry>,
    casters: CasterTable,
}

impl Registry {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            entries: Vec::new(),
            casters: CasterTable::new(),
        }
    }

    /// Start a registry as an independent copy of `parent`.
    pub fn inherit(type_name: &str, parent: &Registry) -> Self {
        Self::compose(type_name, &[parent])
    }

    /// Build a registry from a fixed list of parents, in order. A key
    /// declared by several parents keeps its first position and takes the
    /// last parent's entry.
    pub fn compose(type_name: &str, parents: &[&Registry]) -> Self {
        let mut registry = Self::new(type_name);
        for parent in parents {
            for entry in &parent.entries {
                registry.insert(entry.clone());
            }
            registry.casters.extend(&parent.casters);
        }
        tracing::debug!(
            type_name,
            parents = parents.len(),
            entries = registry.entries.len(),
            "composed config registry"
        );
        registry
    }

    /// An independently mutable copy under the same type name.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Casters consulted when a declaration gives none explicitly.
    pub fn casters_mut(&mut self) -> &mut CasterTable {
        &mut self.casters
    }

    /// Declare (or replace) an entry whose caster is inferred from `default`.
    pub fn declare(
        &mut self,
        key: &str,
        default: impl Into<Value>,
        metadata: Metadata,
    ) -> Result<&Entry, DeclarationError> {
        let default = default.into();
        let caster = self.casters.infer(&default);
        self.declare_with(key, default, caster, metadata)
    }

    /// Declare (or replace) an entry with an explicit caster.
    pub fn declare_with(
        &mut self,
        key: &str,
        default: impl Into<Value>,
        caster: Arc<dyn Caster>,
        metadata: Metadata,
    ) -> Result<&Entry, DeclarationError> {
        let entry = Entry::new(key, default.into(), caster, metadata)?;
        tracing::debug!(type_name = %self.type_name, key, caster = entry.caster().name(), "declared config entry");
        let index = self.insert(entry);
        Ok(&self.entries[index])
    }

    /// Declare an entry holding a configuration object of `child`. The
    /// default is the child's defaults.
    ///
    /// Nesting is cyclic when `child` (or any registry nested below it) has
    /// this registry's type name. Registries are compared by type name, not
    /// identity, so an unrelated registry sharing the name is rejected too.
    pub fn nest(
        &mut self,
        key: &str,
        child: Arc<Registry>,
        metadata: Metadata,
    ) -> Result<&Entry, DeclarationError> {
        self.declare_nested(key, Arc::new(NestedCaster::new(child)), None, metadata)
    }

    /// Like [`nest`](Self::nest) with an explicit default. The default is
    /// cast through the child registry, so missing child keys take the
    /// child's defaults.
    pub fn nest_with_default(
        &mut self,
        key: &str,
        child: Arc<Registry>,
        default: Table,
        metadata: Metadata,
    ) -> Result<&Entry, DeclarationError> {
        self.declare_nested(
            key,
            Arc::new(NestedCaster::new(child)),
            Some(default),
            metadata,
        )
    }

    /// Declare a nested entry from a caster that must carry a registry.
    /// Without `default` the child's defaults are used.
    pub fn declare_nested(
        &mut self,
        key: &str,
        caster: Arc<dyn Caster>,
        default: Option<Table>,
        metadata: Metadata,
    ) -> Result<&Entry, DeclarationError> {
        let Some(child) = caster.registry() else {
            return Err(DeclarationError::NotNestable(key.to_string()));
        };
        if child.contains_type(&self.type_name) {
            return Err(DeclarationError::CyclicNesting {
                key: key.to_string(),
                type_name: self.type_name.clone(),
            });
        }
        let default = match default {
            Some(table) => caster
                .cast(&Value::Table(table))
                .map_err(|source| DeclarationError::InvalidDefault {
                    key: key.to_string(),
                    source,
                })?,
            None => Value::Table(child.defaults()),
        };
        self.declare_with(key, default, caster, metadata)
    }

    /// Remove an entry, returning it. Later entries shift up in order.
    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        let index = self.entries.iter().position(|e| e.key() == key)?;
        let entry = self.entries.remove(index);
        self.reorder();
        tracing::debug!(type_name = %self.type_name, key, "removed config entry");
        Some(entry)
    }

    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key() == key)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(Entry::key)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key → default for every entry, in declaration order.
    pub fn defaults(&self) -> Table {
        self.entries
            .iter()
            .map(|e| (e.key().to_string(), e.default_value()))
            .collect()
    }

    /// Translate an external map (keyed by names) into an internal one (keyed
    /// by keys), casting each declared value. Unknown names pass through.
    pub fn import(&self, external: &Table) -> Result<Table, CastError> {
        let mut internal = Table::new();
        for (name, value) in external {
            match self.get_by_name(name).or_else(|| self.get(name)) {
                Some(entry) => {
                    let cast = entry.caster().cast(value).map_err(|e| e.at(name))?;
                    internal.insert(entry.key().to_string(), cast);
                }
                None => {
                    internal.insert(name.clone(), value.clone());
                }
            }
        }
        Ok(internal)
    }

    /// Inverse of [`import`](Self::import): keys become names and values are
    /// uncast.
    pub fn export(&self, internal: &Table) -> Table {
        internal
            .iter()
            .map(|(key, value)| match self.get(key) {
                Some(entry) => (entry.name().to_string(), entry.caster().uncast(value)),
                None => (key.clone(), value.clone()),
            })
            .collect()
    }

    /// Drop every value equal to its entry's default, recursing into nested
    /// entries. Undeclared keys are kept.
    pub fn scrub(&self, table: &Table) -> Table {
        let mut out = Table::new();
        for (key, value) in table {
            let Some(entry) = self.get(key) else {
                out.insert(key.clone(), value.clone());
                continue;
            };
            if *value == entry.default_value() {
                continue;
            }
            match (entry.nested(), value) {
                (Some(child), Value::Table(inner)) => {
                    out.insert(key.clone(), Value::Table(child.scrub(inner)));
                }
                _ => {
                    out.insert(key.clone(), value.clone());
                }
            }
        }
        out
    }

    /// Build an option parser with one option per entry. Nested entries
    /// contribute their child's options under a compound prefix.
    pub fn to_parser(&self) -> Result<OptionParser, DeclarationError> {
        let mut parser = OptionParser::new();
        self.add_options(&mut parser, &[], &[])?;
        Ok(parser)
    }

    /// Parse `argv` against this registry. The returned config is nested and
    /// every value has been cast.
    pub fn parse<I, S>(&self, argv: I) -> Result<Parsed, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parser = self.to_parser()?;
        let parsed = parser.parse(argv)?;
        Ok(Parsed {
            config: unflatten(&parsed.config),
            args: parsed.args,
        })
    }

    fn add_options(
        &self,
        parser: &mut OptionParser,
        keys: &[&str],
        names: &[&str],
    ) -> Result<(), DeclarationError> {
        for entry in &self.entries {
            if let Some(child) = entry.nested() {
                let mut child_keys = keys.to_vec();
                child_keys.push(entry.key());
                let mut child_names = names.to_vec();
                child_names.push(entry.name());
                child.add_options(parser, &child_keys, &child_names)?;
                continue;
            }
            parser.on(OptSpec::for_entry(entry, keys, names))?;
        }
        Ok(())
    }

    fn contains_type(&self, type_name: &str) -> bool {
        self.type_name == type_name
            || self
                .entries
                .iter()
                .filter_map(Entry::nested)
                .any(|child| child.contains_type(type_name))
    }

    fn insert(&mut self, mut entry: Entry) -> usize {
        match self.entries.iter().position(|e| e.key() == entry.key()) {
            Some(index) => {
                entry.set_order(index);
                self.entries[index] = entry;
                index
            }
            None => {
                let index = self.entries.len();
                entry.set_order(index);
                self.entries.push(entry);
                index
            }
        }
    }

    fn reorder(&mut self) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            entry.set_order(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caster::{FloatCaster, Shape};
    use crate::fixtures::test::{cli_registry, db_registry, init_tracing, server_registry};

    #[test]
    fn declare_preserves_order_and_index() {
        let registry = server_registry();
        let keys: Vec<&str> = registry.keys().collect();
        assert_eq!(keys, vec!["host", "port", "debug", "tags", "db"]);
        assert_eq!(registry.get("debug").unwrap().order(), 2);
    }

    #[test]
    fn redeclare_replaces_in_place() {
        let mut registry = server_registry();
        registry
            .declare("port", 9000, Metadata::new("Listening port"))
            .unwrap();
        let keys: Vec<&str> = registry.keys().collect();
        assert_eq!(keys[1], "port");
        assert_eq!(registry.get("port").unwrap().default_value(), Value::Integer(9000));
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn remove_reindexes() {
        let mut registry = server_registry();
        let removed = registry.remove("port").unwrap();
        assert_eq!(removed.key(), "port");
        assert!(!registry.contains("port"));
        assert_eq!(registry.get("debug").unwrap().order(), 1);
        assert!(registry.remove("port").is_none());
    }

    #[test]
    fn invalid_name_fails_declaration() {
        let mut registry = Registry::new("T");
        let err = registry
            .declare("bad key", 1, Metadata::default())
            .unwrap_err();
        assert!(matches!(err, DeclarationError::InvalidName { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn explicit_caster_overrides_inference() {
        let mut registry = Registry::new("T");
        let entry = registry
            .declare_with("ratio", 1, Arc::new(FloatCaster), Metadata::default())
            .unwrap();
        assert_eq!(entry.caster().name(), "float");
    }

    #[test]
    fn inherited_registry_is_independent() {
        let parent = server_registry();
        let mut child = Registry::inherit("Child", &parent);
        child.remove("host");
        child.declare("extra", "x", Metadata::default()).unwrap();
        assert!(parent.contains("host"));
        assert!(!parent.contains("extra"));
        assert_eq!(child.type_name(), "Child");
    }

    #[test]
    fn late_parent_declarations_do_not_reach_children() {
        let mut parent = Registry::new("Parent");
        parent.declare("a", 1, Metadata::default()).unwrap();
        let child = Registry::inherit("Child", &parent);
        parent.declare("b", 2, Metadata::default()).unwrap();
        assert!(!child.contains("b"));
    }

    #[test]
    fn compose_later_parent_wins_first_position_kept() {
        let mut a = Registry::new("A");
        a.declare("x", 1, Metadata::default()).unwrap();
        a.declare("y", 2, Metadata::default()).unwrap();
        let mut b = Registry::new("B");
        b.declare("z", 3, Metadata::default()).unwrap();
        b.declare("x", 10, Metadata::default()).unwrap();

        let c = Registry::compose("C", &[&a, &b]);
        let keys: Vec<&str> = c.keys().collect();
        assert_eq!(keys, vec!["x", "y", "z"]);
        assert_eq!(c.get("x").unwrap().default_value(), Value::Integer(10));
    }

    #[test]
    fn nest_uses_child_defaults() {
        let registry = server_registry();
        let db = registry.get("db").unwrap();
        assert_eq!(db.shape(), Shape::Nested);
        let Value::Table(default) = db.default_value() else {
            panic!("expected table default");
        };
        assert_eq!(default["pool"].as_integer(), Some(5));
    }

    #[test]
    fn nest_with_custom_default() {
        let mut registry = Registry::new("Server");
        let mut default = Table::new();
        default.insert("pool".into(), Value::String("20".into()));
        let entry = registry
            .nest_with_default("db", Arc::new(db_registry()), default, Metadata::default())
            .unwrap();
        let Value::Table(db) = entry.default_value() else {
            panic!("expected table default");
        };
        assert_eq!(db["pool"].as_integer(), Some(20));
        assert_eq!(db["url"].as_str(), Some(""));

        let scrubbed = registry.scrub(&registry.defaults());
        assert!(scrubbed.is_empty());
    }

    #[test]
    fn nest_with_malformed_default_fails() {
        let mut registry = Registry::new("Server");
        let mut default = Table::new();
        default.insert("pool".into(), Value::String("many".into()));
        let err = registry
            .nest_with_default("db", Arc::new(db_registry()), default, Metadata::default())
            .unwrap_err();
        assert!(matches!(err, DeclarationError::InvalidDefault { ref key, .. } if key == "db"));
        assert!(registry.is_empty());
    }

    #[test]
    fn shared_type_name_counts_as_cycle() {
        let mut registry = Registry::new("Node");
        let unrelated = Registry::new("Node");
        let err = registry
            .nest("other", Arc::new(unrelated), Metadata::default())
            .unwrap_err();
        assert!(matches!(err, DeclarationError::CyclicNesting { .. }));
    }

    #[test]
    fn nesting_self_is_rejected() {
        let mut registry = Registry::new("Node");
        registry.declare("value", 1, Metadata::default()).unwrap();
        let snapshot = Arc::new(registry.duplicate());
        let err = registry
            .nest("child", snapshot, Metadata::default())
            .unwrap_err();
        assert!(matches!(err, DeclarationError::CyclicNesting { .. }));
    }

    #[test]
    fn transitive_cycle_is_rejected() {
        let mut outer = Registry::new("Outer");
        let mut middle = Registry::new("Middle");
        middle
            .nest("outer", Arc::new(Registry::new("Outer")), Metadata::default())
            .unwrap();
        let err = outer
            .nest("middle", Arc::new(middle), Metadata::default())
            .unwrap_err();
        assert!(matches!(err, DeclarationError::CyclicNesting { .. }));
    }

    #[test]
    fn nesting_requires_a_registry() {
        let mut registry = Registry::new("T");
        let err = registry
            .declare_nested("x", Arc::new(FloatCaster), None, Metadata::default())
            .unwrap_err();
        assert_eq!(err, DeclarationError::NotNestable("x".into()));
    }

    #[test]
    fn import_casts_and_translates_names() {
        let mut registry = Registry::new("T");
        registry
            .declare("max_size", 10, Metadata::default().name("size"))
            .unwrap();
        let mut external = Table::new();
        external.insert("size".into(), Value::String("20".into()));
        external.insert("unknown".into(), Value::String("kept".into()));

        let internal = registry.import(&external).unwrap();
        assert_eq!(internal["max_size"], Value::Integer(20));
        assert_eq!(internal["unknown"], Value::String("kept".into()));

        let back = registry.export(&internal);
        assert_eq!(back["size"], Value::Integer(20));
        assert!(back.contains_key("unknown"));
    }

    #[test]
    fn import_reports_cast_failures_with_name() {
        let registry = server_registry();
        let mut external = Table::new();
        external.insert("port".into(), Value::String("eighty".into()));
        let err = registry.import(&external).unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn import_nested_fills_child_defaults() {
        let registry = server_registry();
        let mut db = Table::new();
        db.insert("url".into(), Value::String("pg://x".into()));
        let mut external = Table::new();
        external.insert("db".into(), Value::Table(db));

        let internal = registry.import(&external).unwrap();
        let db = internal["db"].as_table().unwrap();
        assert_eq!(db["url"].as_str(), Some("pg://x"));
        assert_eq!(db["pool"].as_integer(), Some(5));
    }

    #[test]
    fn scrub_drops_defaults_recursively() {
        let registry = server_registry();
        let mut values = registry.defaults();
        values.insert("port".into(), Value::Integer(1));
        let mut db = db_registry().defaults();
        db.insert("pool".into(), Value::Integer(9));
        values.insert("db".into(), Value::Table(db));

        let scrubbed = registry.scrub(&values);
        let keys: Vec<&String> = scrubbed.keys().collect();
        assert_eq!(keys, vec!["port", "db"]);
        let db = scrubbed["db"].as_table().unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(db["pool"].as_integer(), Some(9));
    }

    #[test]
    fn parse_end_to_end() {
        init_tracing();
        let registry = cli_registry();
        let parsed = registry
            .parse(["a", "--flag", "--no-switch", "--num", "6.02", "b", "c"])
            .unwrap();
        assert_eq!(parsed.config["flag"], Value::Boolean(true));
        assert_eq!(parsed.config["switch"], Value::Boolean(false));
        assert_eq!(parsed.config["num"], Value::Float(6.02));
        assert_eq!(
            parsed.config["lst"],
            Value::Array(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)])
        );
        assert_eq!(parsed.args, vec!["a", "b", "c"]);
    }

    #[test]
    fn parse_casts_and_nests_compound_options() {
        let registry = server_registry();
        let parsed = registry
            .parse(["--db:pool", "9", "-P", "81", "--tags", "x,y"])
            .unwrap();
        assert_eq!(parsed.config["port"], Value::Integer(81));
        assert_eq!(parsed.config["db"]["pool"], Value::Integer(9));
        assert_eq!(parsed.config["db"]["url"], Value::String(String::new()));
        assert_eq!(
            parsed.config["tags"],
            Value::Array(vec![Value::String("x".into()), Value::String("y".into())])
        );
    }

    #[test]
    fn parse_reports_cast_failures() {
        let err = server_registry().parse(["--port", "eighty"]).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
