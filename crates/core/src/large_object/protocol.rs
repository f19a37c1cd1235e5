//! Single-image large-object protocol.
//!
//! Every step runs inside a caller-supplied transaction and never commits or
//! rolls back on its own; the enclosing [`TxScope`](super::TxScope) decides
//! the outcome. The `*_in_tx` functions update the entity immediately, while
//! [`write_in_tx`] and [`fetch_in_tx`] return the outcome so a batch can
//! apply it only after commit.
//!
//! A large object created by a failed insert is released by the rollback of
//! the enclosing transaction: PostgreSQL ties `lo_create` and `lo_unlink` to
//! transaction scope.

use tracing::debug;

use crate::image::{Imager, Oid};

use super::error::StoreError;
use super::store::{InsertStatement, LargeObjectTx, NewRow, OpenMode};

/// Outcome of writing an image, not yet applied to the entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inserted {
    /// Server-assigned identity.
    pub id: u32,
    /// Server-assigned name.
    pub name: String,
    /// Large object holding the content.
    pub oid: Oid,
    /// Bytes written.
    pub size: i32,
}

impl Inserted {
    /// Sets `id`, `name`, `oid` and `size` on the entity.
    pub fn apply_to<I: Imager + ?Sized>(self, image: &mut I) {
        image.set_id(self.id);
        image.set_name(self.name);
        image.set_oid(self.oid);
        image.set_size(self.size);
    }
}

/// Content read back from a large object, not yet applied to the entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Large object the content came from.
    pub oid: Oid,
    /// The content.
    pub raw: Vec<u8>,
    /// Recorded size.
    pub size: i32,
}

impl Fetched {
    /// Replaces the entity's content and size.
    pub fn apply_to<I: Imager + ?Sized>(self, image: &mut I) {
        image.set_raw(self.raw);
        image.set_size(self.size);
    }
}

/// Writes the image's content to a new large object and inserts its
/// metadata row.
///
/// The statement is run with `(oid, size)`, plus `(file_type, sort_index)`
/// when it binds metadata, and must return one `(id, name)` row.
///
/// # Errors
///
/// Returns an error if the content is empty or too large for the size
/// column, or if any large-object call or the statement fails.
pub async fn write_in_tx<T, I>(
    tx: &T,
    image: &I,
    statement: &InsertStatement,
) -> Result<Inserted, StoreError>
where
    T: LargeObjectTx,
    I: Imager + ?Sized,
{
    let raw = image.raw();
    if raw.is_empty() {
        return Err(StoreError::EmptyContent);
    }
    let expected = i32::try_from(raw.len()).map_err(|_| StoreError::SizeOverflow(raw.len()))?;

    let oid = tx.create().await?;
    let fd = tx.open(oid, OpenMode::Write).await?;

    let written = tx.write(fd, raw).await?;
    if written != raw.len() {
        return Err(StoreError::ShortWrite {
            expected: raw.len(),
            written,
        });
    }

    tx.close(fd).await?;

    let row = tx
        .insert_row(
            statement,
            NewRow {
                oid,
                size: expected,
                file_type: image.file_type(),
                sort_index: image.sort_index(),
            },
        )
        .await?;

    debug!(oid = %oid, size = expected, id = row.id, "large object written");

    Ok(Inserted {
        id: row.id,
        name: row.name,
        oid,
        size: expected,
    })
}

/// Inserts one image and enriches the entity with its identity.
///
/// # Errors
///
/// See [`write_in_tx`]. The entity is left untouched on error.
pub async fn insert_in_tx<T, I>(
    tx: &T,
    image: &mut I,
    statement: &InsertStatement,
) -> Result<(), StoreError>
where
    T: LargeObjectTx,
    I: Imager + ?Sized,
{
    let inserted = write_in_tx(tx, &*image, statement).await?;
    inserted.apply_to(image);
    Ok(())
}

/// Locates a large object through a parameterless query and reads all of
/// its recorded bytes.
///
/// # Errors
///
/// Returns an error if the query returns no usable row, the large object
/// cannot be opened, or holds fewer bytes than recorded.
pub async fn fetch_in_tx<T: LargeObjectTx>(tx: &T, sql: &str) -> Result<Fetched, StoreError> {
    let location = tx.locate(sql).await?;
    let expected = usize::try_from(location.size)
        .map_err(|_| StoreError::RowShape(format!("negative size {}", location.size)))?;

    let fd = tx.open(location.oid, OpenMode::Read).await?;

    let mut raw = Vec::with_capacity(expected);
    while raw.len() < expected {
        let chunk = tx.read(fd, expected - raw.len()).await?;
        if chunk.is_empty() {
            break;
        }
        raw.extend_from_slice(&chunk);
    }
    if raw.len() != expected {
        return Err(StoreError::ShortRead {
            expected,
            read: raw.len(),
        });
    }

    tx.close(fd).await?;

    debug!(oid = %location.oid, size = location.size, "large object read");

    Ok(Fetched {
        oid: location.oid,
        raw,
        size: location.size,
    })
}

/// Reads an image's content back into the entity.
///
/// The transaction is left open on error; the caller's scope must be
/// aborted with [`TxScope::abort`](super::TxScope::abort) before returning.
///
/// # Errors
///
/// See [`fetch_in_tx`]. The entity is left untouched on error.
pub async fn read_in_tx<T, I>(tx: &T, image: &mut I, sql: &str) -> Result<(), StoreError>
where
    T: LargeObjectTx,
    I: Imager + ?Sized,
{
    let fetched = fetch_in_tx(tx, sql).await?;
    fetched.apply_to(image);
    Ok(())
}

/// Unlinks the image's large object. The metadata row is not touched.
///
/// The entity keeps its now stale `oid`.
///
/// # Errors
///
/// Returns [`StoreError::MissingOid`] for an image that was never inserted
/// and [`StoreError::NotFound`] when no live large object has that handle.
pub async fn delete_in_tx<T, I>(tx: &T, image: &I) -> Result<(), StoreError>
where
    T: LargeObjectTx,
    I: Imager + ?Sized,
{
    let oid = image.oid().ok_or(StoreError::MissingOid)?;
    tx.unlink(oid).await?;
    debug!(oid = %oid, id = image.id(), "large object unlinked");
    Ok(())
}
