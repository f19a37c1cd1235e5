//! Store traits implemented by backing databases.
//!
//! The protocol only ever talks to a store through these two traits, so the
//! PostgreSQL implementation in the db crate and the in-memory store used by
//! the tests are interchangeable.

use std::future::Future;

use crate::image::Oid;

use super::error::StoreError;

/// PostgreSQL `INV_WRITE`.
const INV_WRITE: i32 = 0x0002_0000;
/// PostgreSQL `INV_READ`.
const INV_READ: i32 = 0x0004_0000;

/// Access mode for opening a large object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open for reading.
    Read,
    /// Open for writing.
    Write,
}

impl OpenMode {
    /// Mode flags as understood by `lo_open`.
    #[must_use]
    pub const fn flags(self) -> i32 {
        match self {
            Self::Read => INV_READ,
            Self::Write => INV_WRITE,
        }
    }
}

/// Descriptor of an open large object, valid until closed or the
/// transaction ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Descriptor(pub i32);

/// Statement inserting the metadata row of a freshly written large object.
///
/// The statement binds `$1` (large-object oid) and `$2` (byte size) and must
/// return exactly one row `(id, name)`. With [`with_metadata`] it also binds
/// `$3` (MIME type) and `$4` (sort index).
///
/// [`with_metadata`]: InsertStatement::with_metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    sql: String,
    bind_metadata: bool,
}

impl InsertStatement {
    /// Statement binding `(oid, size)`.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bind_metadata: false,
        }
    }

    /// Also bind `$3` file type and `$4` sort index.
    #[must_use]
    pub fn with_metadata(mut self) -> Self {
        self.bind_metadata = true;
        self
    }

    /// SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Whether `$3` and `$4` are bound.
    #[must_use]
    pub const fn binds_metadata(&self) -> bool {
        self.bind_metadata
    }
}

impl From<&str> for InsertStatement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

/// Values bound into an [`InsertStatement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewRow<'a> {
    /// Large object holding the content.
    pub oid: Oid,
    /// Content length in bytes.
    pub size: i32,
    /// Classified MIME type.
    pub file_type: &'a str,
    /// Ordering hint.
    pub sort_index: i32,
}

/// Row returned by an [`InsertStatement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    /// Server-assigned identity.
    pub id: u32,
    /// Server-assigned name.
    pub name: String,
}

/// Row returned by a read query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Large object holding the content.
    pub oid: Oid,
    /// Recorded content length.
    pub size: i32,
}

/// Produces transactions; shared across concurrent callers.
pub trait TransactionSource: Send + Sync {
    /// Transaction type handed out by this source.
    type Tx: LargeObjectTx;

    /// Begins a new transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;
}

/// Operations available inside one open transaction.
///
/// A transaction is owned by exactly one caller. Implementations must roll
/// back when dropped without [`commit`](LargeObjectTx::commit) or
/// [`rollback`](LargeObjectTx::rollback).
pub trait LargeObjectTx: Send + Sync {
    /// Creates an empty large object, returning its handle.
    fn create(&self) -> impl Future<Output = Result<Oid, StoreError>> + Send;

    /// Opens a large object.
    fn open(
        &self,
        oid: Oid,
        mode: OpenMode,
    ) -> impl Future<Output = Result<Descriptor, StoreError>> + Send;

    /// Writes `data` at the current position, returning the bytes written.
    fn write(
        &self,
        fd: Descriptor,
        data: &[u8],
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Reads up to `len` bytes from the current position.
    fn read(
        &self,
        fd: Descriptor,
        len: usize,
    ) -> impl Future<Output = Result<Vec<u8>, StoreError>> + Send;

    /// Closes a descriptor.
    fn close(&self, fd: Descriptor) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Permanently removes a large object.
    fn unlink(&self, oid: Oid) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Runs an insert statement, expecting exactly one `(id, name)` row.
    fn insert_row(
        &self,
        statement: &InsertStatement,
        row: NewRow<'_>,
    ) -> impl Future<Output = Result<StoredRow, StoreError>> + Send;

    /// Runs a parameterless query, expecting exactly one `(oid, size)` row.
    fn locate(&self, sql: &str) -> impl Future<Output = Result<Location, StoreError>> + Send;

    /// Commits the transaction.
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send
    where
        Self: Sized;

    /// Rolls the transaction back.
    fn rollback(self) -> impl Future<Output = Result<(), StoreError>> + Send
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_mode_flags() {
        assert_eq!(OpenMode::Write.flags(), 131_072);
        assert_eq!(OpenMode::Read.flags(), 262_144);
    }

    #[test]
    fn test_insert_statement_binding() {
        let plain = InsertStatement::from("INSERT INTO images (raster, size) VALUES ($1, $2)");
        assert!(!plain.binds_metadata());

        let rich = InsertStatement::new("INSERT ...").with_metadata();
        assert!(rich.binds_metadata());
        assert_eq!(rich.sql(), "INSERT ...");
    }
}
