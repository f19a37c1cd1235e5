//! Images table.
//!
//! Each row points at one large object holding the image content.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(IMAGES_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_IMAGES_SQL).await?;
        Ok(())
    }
}

const IMAGES_SQL: &str = r"
CREATE TABLE images (
    id SERIAL PRIMARY KEY,
    name TEXT NOT NULL DEFAULT gen_random_uuid()::text,
    raster OID,
    size INT4 NOT NULL CONSTRAINT chk_images_size CHECK (size >= 0),
    file_type TEXT,
    sort_index INT4,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- Listing order
CREATE INDEX idx_images_sort ON images(sort_index, id);
";

// Unlink the large objects before the rows that reference them disappear.
const DROP_IMAGES_SQL: &str = r"
SELECT lo_unlink(raster) FROM images WHERE raster IS NOT NULL;
DROP TABLE IF EXISTS images CASCADE;
";
