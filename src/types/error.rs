//! Error types for the relation index library.

use thiserror::Error;

use super::Token;

/// All errors that can occur while maintaining or querying search indexes.
#[derive(Error, Debug)]
pub enum IndexError {
    /// A catalog was attached to an index that already has one.
    #[error("Catalog already set")]
    AlreadyAttached,

    /// The index is not attached to a catalog.
    #[error("Index is not attached to a catalog")]
    NotAttached,

    /// A closure walk finished with its root frame marked as part of a cycle.
    #[error("Top-level closure frame for {0} was marked cycled")]
    CycledRoot(Token),

    /// Relation not present in the catalog.
    #[error("Relation {0} not found")]
    UnknownRelation(Token),

    /// Failure raised by a catalog implementation.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Invalid index configuration.
    #[error("Invalid index configuration: {0}")]
    Config(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
