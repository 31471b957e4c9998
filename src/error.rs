use thiserror::Error;

/// Setup-time failures raised while declaring entries or registering options.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeclarationError {
    #[error("Invalid name '{name}' for key '{key}' (names must be word characters only)")]
    InvalidName { key: String, name: String },

    #[error("Invalid switch '{switch}' for '{key}' (switches use [A-Za-z0-9_-] only)")]
    InvalidSwitch { key: String, switch: String },

    #[error("Duplicate option key '{0}'")]
    DuplicateKey(String),

    #[error("Switch '{switch}' for '{key}' is already registered by '{existing}'")]
    DuplicateSwitch {
        key: String,
        switch: String,
        existing: String,
    },

    #[error("Infinite nesting: '{key}' nests a registry containing '{type_name}'")]
    CyclicNesting { key: String, type_name: String },

    #[error("Cannot nest '{0}': the target carries no registry")]
    NotNestable(String),

    #[error("Invalid default for '{key}': {source}")]
    InvalidDefault {
        key: String,
        #[source]
        source: CastError,
    },

    #[error("Invalid whitelist for '{key}': {source}")]
    InvalidOptions {
        key: String,
        #[source]
        source: CastError,
    },
}

/// Malformed input met while casting an external value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CastError {
    #[error("Cannot cast {value} to {expected}")]
    Malformed {
        expected: &'static str,
        value: String,
    },

    #[error("Invalid value {value} (expected one of: {options})")]
    NotInWhitelist { value: String, options: String },

    #[error("Invalid value for '{key}': {source}")]
    Nested {
        key: String,
        #[source]
        source: Box<CastError>,
    },
}

impl CastError {
    pub(crate) fn malformed(expected: &'static str, value: &toml::Value) -> Self {
        CastError::Malformed {
            expected,
            value: crate::value::describe(value),
        }
    }

    /// Attach the key path where this error happened.
    pub fn at(self, key: &str) -> Self {
        CastError::Nested {
            key: key.to_string(),
            source: Box::new(self),
        }
    }
}

/// Failures that abort a single `parse` call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("No value provided for option: {0}")]
    MissingValue(String),

    #[error("Value provided for option that takes none: {switch}={value}")]
    UnexpectedValue { switch: String, value: String },

    #[error("Too many values for {switch} ({count} > {limit})")]
    TooManyValues {
        switch: String,
        count: usize,
        limit: usize,
    },

    #[error("Invalid value for {key}: {source}")]
    Cast {
        key: String,
        #[source]
        source: CastError,
    },
}

/// Misuse of the binding lifecycle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    #[error("Already bound to a different receiver (use rebind to switch receivers)")]
    AlreadyBound,

    #[error("Receiver has no accessor '{0}'")]
    MissingAccessor(String),

    #[error("Accessor '{accessor}' rejected the value: {reason}")]
    Rejected { accessor: String, reason: String },
}

/// Any failure surfaced by this crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    #[error(transparent)]
    Cast(#[from] CastError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("Cannot deserialize configuration: {0}")]
    Deserialize(String),
}
