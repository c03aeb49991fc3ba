//! Error types for keepsake operations

use thiserror::Error;

/// Errors raised when a call does not fit its declared signature.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BindError {
    #[error("Missing required argument: {param}")]
    MissingArgument { param: String },

    #[error("Too many positional arguments: expected at most {expected}, got {got}")]
    TooManyPositional { expected: usize, got: usize },

    #[error("Unexpected keyword argument: {name}")]
    UnexpectedKeyword { name: String },

    #[error("Multiple values for argument: {param}")]
    MultipleValues { param: String },

    #[error("Positional-only argument passed as keyword: {param}")]
    PositionalOnlyAsKeyword { param: String },

    #[error("Invalid value for argument {param}: expected {expected}, got {got}")]
    WrongType {
        param: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("No bound argument named {param}")]
    UnknownParameter { param: String },
}

/// Errors raised while declaring a signature.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Duplicate parameter name: {param}")]
    DuplicateParameter { param: String },

    #[error("Parameter {param} is declared out of order: {reason}")]
    WrongOrder { param: String, reason: String },

    #[error("Variadic parameter {param} cannot have a default")]
    VariadicDefault { param: String },

    #[error("Required parameter {param} follows a parameter with a default")]
    RequiredAfterDefault { param: String },

    #[error("Property {name} cannot declare parameters (got {params})")]
    PropertyArity { name: String, params: usize },
}

/// Errors raised while loading or validating accessor configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration file path (set KEEPSAKE_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all keepsake errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The host is fixed-layout and reserves no cache storage.
    #[error("Host has no cache storage and cannot create one")]
    MissingCache,

    /// The host's cache store is already mutably borrowed.
    #[error("Cache store is already borrowed")]
    Busy,

    #[error("Unhashable argument of type {type_name}")]
    Unhashable { type_name: &'static str },

    #[error("Can't set attribute {name}")]
    ReadOnly { name: String },

    #[error("Bind error: {0}")]
    Bind(#[from] BindError),

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for keepsake operations.
pub type CacheResult<T> = Result<T, CacheError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_display_missing_argument() {
        let err = BindError::MissingArgument {
            param: "x".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Missing required argument"));
        assert!(msg.contains('x'));
    }

    #[test]
    fn test_bind_error_display_too_many_positional() {
        let err = BindError::TooManyPositional {
            expected: 2,
            got: 3,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("at most 2"));
        assert!(msg.contains("got 3"));
    }

    #[test]
    fn test_signature_error_display_property_arity() {
        let err = SignatureError::PropertyArity {
            name: "size".to_string(),
            params: 2,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("size"));
        assert!(msg.contains('2'));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "accessors.size.key".to_string(),
            value: "".to_string(),
            reason: "must not be blank".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("accessors.size.key"));
        assert!(msg.contains("must not be blank"));
    }

    #[test]
    fn test_cache_error_display_read_only() {
        let err = CacheError::ReadOnly {
            name: "thing".to_string(),
        };
        assert_eq!(format!("{}", err), "Can't set attribute thing");
    }

    #[test]
    fn test_cache_error_from_variants() {
        let bind = CacheError::from(BindError::UnexpectedKeyword {
            name: "z".to_string(),
        });
        assert!(matches!(bind, CacheError::Bind(_)));

        let signature = CacheError::from(SignatureError::DuplicateParameter {
            param: "x".to_string(),
        });
        assert!(matches!(signature, CacheError::Signature(_)));

        let config = CacheError::from(ConfigError::MissingConfigPath);
        assert!(matches!(config, CacheError::Config(_)));
    }

    #[test]
    fn test_cache_error_display_unhashable() {
        let err = CacheError::Unhashable { type_name: "list" };
        let msg = format!("{}", err);
        assert!(msg.contains("Unhashable"));
        assert!(msg.contains("list"));
    }
}
