//! Error types for topology construction and emission.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Errors that can occur while resolving, building or emitting a stack.
#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Missing environment configuration: {} must be set", .0.join(" and "))]
    MissingEnvironment(Vec<String>),

    #[error("Invalid stack name: {0}")]
    InvalidStackName(String),

    #[error("Invalid CIDR block: {0}")]
    InvalidCidr(String),

    #[error("Subnet allocation failed: {0}")]
    SubnetAllocation(String),

    #[error("Invalid topology configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    #[error("Unsupported config format: {0}")]
    UnsupportedConfigFormat(PathBuf),

    #[error("Failed to parse config {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Duplicate construct id: {0}")]
    DuplicateId(String),

    #[error("Dangling reference from {from} to missing resource {to}")]
    DanglingReference { from: String, to: String },

    #[error("Resource {from} expects {to} to be a {expected}, found {found}")]
    WrongReferenceKind {
        from: String,
        to: String,
        expected: String,
        found: String,
    },

    #[error("Emit failed: {0}")]
    Emit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl TopologyError {
    /// True for errors raised before any graph construction starts.
    pub fn is_environment(&self) -> bool {
        matches!(self, TopologyError::MissingEnvironment(_))
    }

    /// True for configuration and graph-construction failures.
    pub fn is_topology(&self) -> bool {
        matches!(
            self,
            TopologyError::InvalidStackName(_)
                | TopologyError::InvalidCidr(_)
                | TopologyError::SubnetAllocation(_)
                | TopologyError::InvalidConfig(_)
                | TopologyError::UnsupportedConfigFormat(_)
                | TopologyError::ConfigParse { .. }
                | TopologyError::DuplicateId(_)
                | TopologyError::DanglingReference { .. }
                | TopologyError::WrongReferenceKind { .. }
                | TopologyError::Yaml(_)
        )
    }

    /// True for failures raised by an emitter.
    pub fn is_emit(&self) -> bool {
        matches!(self, TopologyError::Emit(_))
    }
}
