//! Database layer for loimage.
//!
//! This crate provides:
//! - The PostgreSQL large-object store ([`PgPool`], [`PgTransaction`])
//! - The image metadata repository and the SQL the protocol runs
//! - Database migrations

pub mod large_object;
pub mod migration;
pub mod repositories;

pub use large_object::{PgPool, PgTransaction};
pub use repositories::{ImageRepository, ImageRow, insert_image_statement, select_location_sql};

use std::time::Duration;

use loimage_shared::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a pooled connection using the configured limits.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}
