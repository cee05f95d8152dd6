use thiserror::Error;

use crate::literal::ValidationError;

/// Error type for edge store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("schema error: {0}")]
    SchemaError(String),
    #[error("query error: {0}")]
    QueryError(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("transaction error: {0}")]
    TransactionError(String),
    #[error(transparent)]
    Literal(#[from] ValidationError),
    #[error("unknown wikidata datatype: {0}")]
    UnknownDatatype(String),
    #[error("ambiguous location: {0}")]
    AmbiguousLocation(String),
    #[error("import conflict: edge {0} already exists")]
    ImportConflict(String),
}

impl StoreError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        StoreError::ConnectionError(msg.into())
    }

    pub fn schema<T: Into<String>>(msg: T) -> Self {
        StoreError::SchemaError(msg.into())
    }

    pub fn query<T: Into<String>>(msg: T) -> Self {
        StoreError::QueryError(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        StoreError::NotFound(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        StoreError::InvalidInput(msg.into())
    }

    pub fn transaction<T: Into<String>>(msg: T) -> Self {
        StoreError::TransactionError(msg.into())
    }

    pub fn unknown_datatype<T: Into<String>>(msg: T) -> Self {
        StoreError::UnknownDatatype(msg.into())
    }

    pub fn ambiguous_location<T: Into<String>>(msg: T) -> Self {
        StoreError::AmbiguousLocation(msg.into())
    }

    pub fn import_conflict<T: Into<String>>(id: T) -> Self {
        StoreError::ImportConflict(id.into())
    }
}
