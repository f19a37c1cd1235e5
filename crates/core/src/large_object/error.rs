//! Large-object store error types.

use thiserror::Error;

use loimage_shared::AppError;

/// Errors raised by the large-object protocol and its backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Beginning, committing or rolling back a transaction failed.
    #[error("transaction error: {0}")]
    Connection(String),

    /// A metadata query failed.
    #[error("query failed: {0}")]
    Query(String),

    /// A large-object call failed.
    #[error("large object {op} failed: {message}")]
    LargeObject {
        /// The large-object call (`create`, `open`, `write`, ...).
        op: &'static str,
        /// Backing store message.
        message: String,
    },

    /// The referenced large object or row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The image has never been assigned a large object.
    #[error("image has no large object")]
    MissingOid,

    /// Inserting an image with no content.
    #[error("image content is empty")]
    EmptyContent,

    /// The store accepted fewer bytes than were written.
    #[error("short write: wrote {written} of {expected} bytes")]
    ShortWrite {
        /// Bytes handed to the store.
        expected: usize,
        /// Bytes the store reported as written.
        written: usize,
    },

    /// The large object held fewer bytes than its recorded size.
    #[error("short read: read {read} of {expected} bytes")]
    ShortRead {
        /// Recorded size.
        expected: usize,
        /// Bytes actually read.
        read: usize,
    },

    /// A query returned a row that does not match its contract.
    #[error("unexpected row shape: {0}")]
    RowShape(String),

    /// Content is larger than the store's size column can record.
    #[error("content of {0} bytes exceeds the storable size")]
    SizeOverflow(usize),
}

impl StoreError {
    /// Create a large-object error.
    #[must_use]
    pub fn large_object(op: &'static str, message: impl Into<String>) -> Self {
        Self::LargeObject {
            op,
            message: message.into(),
        }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a query error.
    #[must_use]
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::MissingOid | StoreError::EmptyContent => Self::Validation(err.to_string()),
            StoreError::SizeOverflow(_) => Self::PayloadTooLarge(err.to_string()),
            _ => Self::Database(err.to_string()),
        }
    }
}
