//! # Runtime Error Types

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the service container.
///
/// Resolution failures are fatal to the caller: there is no fallback
/// instance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Nothing is registered for the requested type.
    #[error("service not registered: {type_name}")]
    NotRegistered {
        /// Requested type.
        type_name: &'static str,
    },

    /// The scope (or container) was disposed.
    #[error("service scope already disposed")]
    AlreadyDisposed,

    /// A factory (indirectly) requested the service it is building.
    #[error("circular dependency while resolving {type_name}")]
    CircularDependency {
        /// Type that closed the cycle.
        type_name: &'static str,
    },

    /// A scoped service was requested outside of a scope.
    #[error("scoped service {type_name} resolved outside of a scope")]
    ScopeRequired {
        /// Requested type.
        type_name: &'static str,
    },
}

/// Result type for service resolution.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that was read.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
