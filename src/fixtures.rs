#[cfg(test)]
pub mod test {
    use std::sync::{Arc, LazyLock};

    use serde::Deserialize;
    use toml::{Table, Value};

    use crate::accessor::{Accessors, Receiver};
    use crate::entry::Metadata;
    use crate::error::BindingError;
    use crate::registry::Registry;

    /// Route crate events to the test writer. Filter with `RUST_LOG`.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// `url` and `pool`, both stored in the fallback table of whoever holds them.
    pub fn db_registry() -> Registry {
        let mut registry = Registry::new("Db");
        registry
            .declare("url", "", Metadata::new("Connection string URL"))
            .unwrap();
        registry
            .declare("pool", 5, Metadata::new("Connection pool size").short("p"))
            .unwrap();
        registry
    }

    /// Keys in order: host, port, debug, tags, db. Every entry except `tags`
    /// is reached through [`Server`]'s accessors when bound.
    pub fn server_registry() -> Registry {
        let mut registry = Registry::new("Server");
        registry
            .declare("host", "localhost", Metadata::new("The application host"))
            .unwrap();
        registry
            .declare("port", 8080, Metadata::new("The port number").short("P"))
            .unwrap();
        registry
            .declare("debug", false, Metadata::new("Enable debug mode"))
            .unwrap();
        registry
            .declare(
                "tags",
                vec!["a"],
                Metadata::new("Free-form tags").no_accessors().split(","),
            )
            .unwrap();
        registry
            .nest("db", Arc::new(db_registry()), Metadata::new("Database settings"))
            .unwrap();
        registry
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct Server {
        pub host: String,
        pub port: i64,
        pub debug: bool,
        pub db: Table,
    }

    impl Default for Server {
        fn default() -> Self {
            Self {
                host: String::new(),
                port: 0,
                debug: false,
                db: Table::new(),
            }
        }
    }

    static SERVER_ACCESSORS: LazyLock<Accessors<Server>> = LazyLock::new(|| {
        Accessors::<Server>::new()
            .reader("host", |s| Value::String(s.host.clone()))
            .writer("set_host", |s, v| {
                s.host = v.try_into()?;
                Ok(())
            })
            .reader("port", |s| Value::Integer(s.port))
            .writer("set_port", |s, v| {
                s.port = v.try_into()?;
                Ok(())
            })
            .reader("debug", |s| Value::Boolean(s.debug))
            .writer("set_debug", |s, v| {
                s.debug = v.try_into()?;
                Ok(())
            })
            .reader("db", |s| Value::Table(s.db.clone()))
            .writer("set_db", |s, v| {
                s.db = v.try_into()?;
                Ok(())
            })
    });

    impl Receiver for Server {
        fn read(&self, reader: &str) -> Option<Value> {
            SERVER_ACCESSORS.read(self, reader)
        }

        fn write(&mut self, writer: &str, value: Value) -> Result<(), BindingError> {
            SERVER_ACCESSORS.write(self, writer, value)
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct ServerSnapshot {
        pub host: String,
        pub port: i64,
        pub debug: bool,
        pub tags: Vec<String>,
        pub db: DbSnapshot,
    }

    #[derive(Debug, Deserialize)]
    pub struct DbSnapshot {
        pub url: String,
        pub pool: i64,
    }

    /// The four option kinds: flag, negatable switch, plain float, integer list.
    pub fn cli_registry() -> Registry {
        let mut registry = Registry::new("Cli");
        registry
            .declare("flag", false, Metadata::new("A flag"))
            .unwrap();
        registry
            .declare("switch", true, Metadata::new("A switch").long("--[no-]switch"))
            .unwrap();
        registry
            .declare("num", 2.5, Metadata::new("A number").arg_name("NUM"))
            .unwrap();
        registry
            .declare("lst", vec![1, 2, 3], Metadata::new("A list").split(","))
            .unwrap();
        registry
    }

    #[test]
    fn fixtures_declare_expected_keys() {
        let server = server_registry();
        let keys: Vec<&str> = server.keys().collect();
        assert_eq!(keys, vec!["host", "port", "debug", "tags", "db"]);
        assert!(!server.get("tags").unwrap().has_accessors());
        assert_eq!(cli_registry().len(), 4);
    }
}
