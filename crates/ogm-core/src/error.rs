use thiserror::Error;

use crate::types::{EntityId, LabelSet};

/// Boxed error produced by a session implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure reported by a [`GraphSession`](crate::session::GraphSession).
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Statement execution failed: {0}")]
    Execution(#[source] BoxError),

    #[error("Result conversion failed: {0}")]
    Conversion(String),
}

/// Top-level error type for mapping, staging and flushing.
#[derive(Error, Debug)]
pub enum OgmError {
    #[error("No registered type matches {0}")]
    UnresolvableType(String),

    #[error("Label set {labels:?} is already registered by node type {existing}")]
    DuplicateLabelSet { labels: LabelSet, existing: String },

    #[error("Type name {0} is already registered")]
    DuplicateTypeName(String),

    #[error("Invalid label or type name: {0:?}")]
    InvalidName(String),

    #[error("Entity is not staged in this graph: {0}")]
    NotStaged(String),

    #[error("Entity already has identity {0}")]
    AlreadyIdentified(EntityId),

    #[error("Relation {relation_type} has an endpoint without identity ({endpoint})")]
    UnresolvedEndpoint {
        relation_type: String,
        endpoint: &'static str,
    },

    #[error("Property {key} is not a scalar value")]
    UnsupportedProperty { key: String },

    #[error("Expected entity of type {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transaction aborted at statement {index}: {source}")]
    TransactionFailure {
        index: usize,
        #[source]
        source: SessionError,
    },

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

pub type Result<T> = std::result::Result<T, OgmError>;
