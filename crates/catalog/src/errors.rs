use thiserror::Error;

use crate::store::IndexModel;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid index: {0}")]
    InvalidIndex(String),

    #[error("Write rejected: {0}")]
    Write(WriteErrorKind),

    #[error("Document must be a JSON object")]
    NotAnObject,

    #[error("Index {name} already exists with a different definition")]
    IndexConflict {
        name: String,
        existing: Box<IndexModel>,
        requested: Box<IndexModel>,
    },
}

/// Per-document failure inside a bulk write.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WriteErrorKind {
    #[error("duplicate key for index {index}: {key}")]
    DuplicateKey { index: String, key: String },
}

/// A write error tagged with the position of the offending document in the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteError {
    pub position: usize,
    pub kind: WriteErrorKind,
}

impl WriteError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self.kind, WriteErrorKind::DuplicateKey { .. })
    }
}
