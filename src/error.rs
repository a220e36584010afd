//! Errors raised by the query layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    /// The requested statement is not part of the catalog
    #[error("Unknown query: {0}")]
    UnknownQuery(String),

    #[error("Parameters must contain at least one field")]
    EmptyParameters,

    /// Every placeholder the statement needs that the bag did not supply
    #[error("Missing required fields for this query: [{}]", .missing.join(","))]
    MissingParameters { missing: Vec<String> },

    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

impl QueryError {
    /// True for failures detected before the database was touched
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            QueryError::EmptyParameters | QueryError::MissingParameters { .. }
        )
    }
}
