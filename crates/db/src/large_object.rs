//! PostgreSQL large-object store.
//!
//! Implements the core store traits on top of a `SeaORM` connection. Every
//! large-object call goes through the server-side `lo_*` functions inside
//! one [`DatabaseTransaction`], so a transaction dropped without commit is
//! rolled back together with any object it created.

use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbBackend, DbErr, QueryResult,
    RuntimeErr, Statement, TransactionTrait, Value,
};
use tracing::debug;

use loimage_core::Oid;
use loimage_core::large_object::{
    Descriptor, InsertStatement, LargeObjectTx, Location, NewRow, OpenMode, StoreError,
    StoredRow, TransactionSource,
};

/// SQLSTATE `undefined_object`, raised for an unknown large object.
const UNDEFINED_OBJECT: &str = "42704";

const LO_CREATE_SQL: &str = "SELECT lo_create(0)::int8";
const LO_OPEN_SQL: &str = "SELECT lo_open($1::int8::oid, $2)";
const LO_WRITE_SQL: &str = "SELECT lowrite($1, $2)";
const LO_READ_SQL: &str = "SELECT loread($1, $2)";
const LO_CLOSE_SQL: &str = "SELECT lo_close($1)";
const LO_UNLINK_SQL: &str = "SELECT lo_unlink($1::int8::oid)";
const DELETE_ROW_SQL: &str = "DELETE FROM images WHERE id = $1";

/// Transaction source backed by a `SeaORM` connection pool.
#[derive(Debug, Clone)]
pub struct PgPool {
    db: DatabaseConnection,
}

impl PgPool {
    /// Wrap an established connection.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl TransactionSource for PgPool {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction, StoreError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| StoreError::connection(e.to_string()))?;
        Ok(PgTransaction { txn })
    }
}

/// One open PostgreSQL transaction.
///
/// Dropping it without [`LargeObjectTx::commit`] rolls it back.
pub struct PgTransaction {
    txn: DatabaseTransaction,
}

impl PgTransaction {
    /// Delete the metadata row `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no row was deleted, or
    /// [`StoreError::Query`] if the statement fails.
    pub async fn delete_row(&self, id: u32) -> Result<(), StoreError> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            DELETE_ROW_SQL,
            [Value::from(i64::from(id))],
        );
        let result = self
            .txn
            .execute(stmt)
            .await
            .map_err(|e| StoreError::query(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("image {id}")));
        }
        Ok(())
    }

    async fn call(
        &self,
        op: &'static str,
        sql: &str,
        values: Vec<Value>,
    ) -> Result<QueryResult, StoreError> {
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, values);
        self.txn
            .query_one(stmt)
            .await
            .map_err(|e| large_object_error(op, &e))?
            .ok_or_else(|| StoreError::large_object(op, "no result row"))
    }
}

impl std::fmt::Debug for PgTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgTransaction").finish_non_exhaustive()
    }
}

impl LargeObjectTx for PgTransaction {
    async fn create(&self) -> Result<Oid, StoreError> {
        let row = self.call("create", LO_CREATE_SQL, Vec::new()).await?;
        oid_at(&row, 0)
    }

    async fn open(&self, oid: Oid, mode: OpenMode) -> Result<Descriptor, StoreError> {
        let row = self
            .call(
                "open",
                LO_OPEN_SQL,
                vec![i64::from(oid.get()).into(), mode.flags().into()],
            )
            .await?;
        let fd = int_at(&row, 0).map_err(|e| StoreError::large_object("open", e))?;
        debug!(%oid, ?mode, fd, "Opened large object");
        Ok(Descriptor(fd))
    }

    async fn write(&self, fd: Descriptor, data: &[u8]) -> Result<usize, StoreError> {
        let row = self
            .call("write", LO_WRITE_SQL, vec![fd.0.into(), data.to_vec().into()])
            .await?;
        let written = int_at(&row, 0).map_err(|e| StoreError::large_object("write", e))?;
        usize::try_from(written)
            .map_err(|_| StoreError::large_object("write", format!("negative count {written}")))
    }

    async fn read(&self, fd: Descriptor, len: usize) -> Result<Vec<u8>, StoreError> {
        let len = i32::try_from(len).map_err(|_| StoreError::SizeOverflow(len))?;
        let row = self
            .call("read", LO_READ_SQL, vec![fd.0.into(), len.into()])
            .await?;
        row.try_get_by_index::<Vec<u8>>(0)
            .map_err(|e| StoreError::large_object("read", e.to_string()))
    }

    async fn close(&self, fd: Descriptor) -> Result<(), StoreError> {
        self.call("close", LO_CLOSE_SQL, vec![fd.0.into()]).await?;
        Ok(())
    }

    async fn unlink(&self, oid: Oid) -> Result<(), StoreError> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            LO_UNLINK_SQL,
            [Value::from(i64::from(oid.get()))],
        );
        match self.txn.query_one(stmt).await {
            Ok(_) => Ok(()),
            Err(e) if sqlstate(&e).as_deref() == Some(UNDEFINED_OBJECT) => {
                Err(StoreError::not_found(format!("large object {oid}")))
            }
            Err(e) => Err(large_object_error("unlink", &e)),
        }
    }

    async fn insert_row(
        &self,
        statement: &InsertStatement,
        row: NewRow<'_>,
    ) -> Result<StoredRow, StoreError> {
        let mut values: Vec<Value> = vec![i64::from(row.oid.get()).into(), row.size.into()];
        if statement.binds_metadata() {
            values.push(row.file_type.to_string().into());
            values.push(row.sort_index.into());
        }
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, statement.sql(), values);
        let result = self
            .txn
            .query_one(stmt)
            .await
            .map_err(|e| StoreError::query(e.to_string()))?
            .ok_or_else(|| StoreError::RowShape("insert returned no row".into()))?;

        let id = int_at(&result, 0).map_err(StoreError::RowShape)?;
        let id = u32::try_from(id)
            .map_err(|_| StoreError::RowShape(format!("negative image id {id}")))?;
        let name = result
            .try_get_by_index::<String>(1)
            .map_err(|e| StoreError::RowShape(e.to_string()))?;
        Ok(StoredRow { id, name })
    }

    async fn locate(&self, sql: &str) -> Result<Location, StoreError> {
        let stmt = Statement::from_string(DbBackend::Postgres, sql.to_owned());
        let row = self
            .txn
            .query_one(stmt)
            .await
            .map_err(|e| StoreError::query(e.to_string()))?
            .ok_or_else(|| StoreError::not_found("image row"))?;

        let oid = oid_at(&row, 0)?;
        let size = int_at(&row, 1).map_err(StoreError::RowShape)?;
        Ok(Location { oid, size })
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.txn
            .commit()
            .await
            .map_err(|e| StoreError::connection(e.to_string()))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.txn
            .rollback()
            .await
            .map_err(|e| StoreError::connection(e.to_string()))
    }
}

/// Read a 4-byte integer column, accepting 8-byte values that fit.
fn int_at(row: &QueryResult, index: usize) -> Result<i32, String> {
    if let Ok(value) = row.try_get_by_index::<i32>(index) {
        return Ok(value);
    }
    let wide = row
        .try_get_by_index::<i64>(index)
        .map_err(|e| e.to_string())?;
    i32::try_from(wide).map_err(|_| format!("column {index} value {wide} out of range"))
}

/// Read an OID column, either native or cast to `int8`.
fn oid_at(row: &QueryResult, index: usize) -> Result<Oid, StoreError> {
    if let Ok(raw) = row.try_get_by_index::<u32>(index) {
        return Ok(Oid(raw));
    }
    let wide = row
        .try_get_by_index::<Option<i64>>(index)
        .map_err(|e| StoreError::RowShape(e.to_string()))?
        .ok_or(StoreError::MissingOid)?;
    u32::try_from(wide)
        .map(Oid)
        .map_err(|_| StoreError::RowShape(format!("oid {wide} out of range")))
}

/// SQLSTATE code of a database-side error.
fn sqlstate(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Query(RuntimeErr::SqlxError(sqlx::Error::Database(db)))
        | DbErr::Exec(RuntimeErr::SqlxError(sqlx::Error::Database(db))) => {
            db.code().map(std::borrow::Cow::into_owned)
        }
        _ => None,
    }
}

fn large_object_error(op: &'static str, err: &DbErr) -> StoreError {
    match sqlstate(err) {
        Some(code) if code == UNDEFINED_OBJECT => StoreError::not_found(format!("large object: {err}")),
        _ => StoreError::large_object(op, err.to_string()),
    }
}
