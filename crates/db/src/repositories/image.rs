//! Image metadata repository.
//!
//! Reads the `images` table for listing and lookups and builds the SQL the
//! large-object protocol runs against it.

use chrono::{DateTime, FixedOffset};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, FromQueryResult, Statement, Value,
};
use serde::Serialize;

use loimage_core::large_object::{InsertStatement, StoreError};
use loimage_core::{Image, Oid};

/// Inserts one image row, binding raster, size, file type and sort index.
pub const INSERT_IMAGE_SQL: &str = "INSERT INTO images (raster, size, file_type, sort_index) \
     VALUES ($1::int8::oid, $2, $3, $4) RETURNING id, name";

const SELECT_COLUMNS: &str =
    "SELECT id, name, raster::int8 AS raster, size, file_type, sort_index, created_at FROM images";

/// Insert statement used for uploaded images.
#[must_use]
pub fn insert_image_statement() -> InsertStatement {
    InsertStatement::new(INSERT_IMAGE_SQL).with_metadata()
}

/// Location query for the row `id`, yielding `(raster, size)`.
#[must_use]
pub fn select_location_sql(id: u32) -> String {
    format!("SELECT raster::int8, size FROM images WHERE id = {id}")
}

/// One row of the `images` table.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize)]
pub struct ImageRow {
    /// Row id.
    pub id: i32,
    /// Generated name.
    pub name: String,
    /// Large-object OID, widened to `int8`.
    pub raster: Option<i64>,
    /// Content length in bytes.
    pub size: i32,
    /// Classified MIME type.
    pub file_type: Option<String>,
    /// Upload ordering key.
    pub sort_index: Option<i32>,
    /// Insert time.
    pub created_at: DateTime<FixedOffset>,
}

impl ImageRow {
    /// Entity carrying this row's identity and storage location, without content.
    #[must_use]
    pub fn to_image(&self) -> Image {
        Image {
            id: u32::try_from(self.id).unwrap_or_default(),
            name: self.name.clone(),
            oid: self
                .raster
                .and_then(|raw| u32::try_from(raw).ok())
                .map(Oid),
            size: self.size,
            file_type: self.file_type.clone().unwrap_or_default(),
            sort_index: self.sort_index.unwrap_or_default(),
            raw: Vec::new(),
        }
    }
}

/// Image metadata repository.
#[derive(Debug, Clone)]
pub struct ImageRepository {
    db: DatabaseConnection,
}

impl ImageRepository {
    /// Create a new image repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Page of rows ordered by sort index then id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if the query fails.
    pub async fn list(&self, offset: u64, limit: u64) -> Result<Vec<ImageRow>, StoreError> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            format!("{SELECT_COLUMNS} ORDER BY sort_index NULLS LAST, id LIMIT $1 OFFSET $2"),
            [to_i64(limit).into(), to_i64(offset).into()],
        );
        ImageRow::find_by_statement(stmt)
            .all(&self.db)
            .await
            .map_err(|e| StoreError::query(e.to_string()))
    }

    /// Row `id`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if the query fails.
    pub async fn find_by_id(&self, id: u32) -> Result<Option<ImageRow>, StoreError> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            format!("{SELECT_COLUMNS} WHERE id = $1"),
            [Value::from(i64::from(id))],
        );
        ImageRow::find_by_statement(stmt)
            .one(&self.db)
            .await
            .map_err(|e| StoreError::query(e.to_string()))
    }

    /// Total number of rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if the query fails.
    pub async fn count(&self) -> Result<u64, StoreError> {
        let stmt = Statement::from_string(DbBackend::Postgres, "SELECT COUNT(*) FROM images");
        let row = self
            .db
            .query_one(stmt)
            .await
            .map_err(|e| StoreError::query(e.to_string()))?
            .ok_or_else(|| StoreError::RowShape("count returned no row".into()))?;
        let total: i64 = row
            .try_get_by_index(0)
            .map_err(|e| StoreError::RowShape(e.to_string()))?;
        Ok(u64::try_from(total).unwrap_or_default())
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
