//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod image;

pub use image::{
    INSERT_IMAGE_SQL, ImageRepository, ImageRow, insert_image_statement, select_location_sql,
};
