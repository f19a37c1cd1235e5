//! HTTP API layer with Axum routes.
//!
//! This crate provides:
//! - REST routes for uploading, listing, fetching and deleting images
//! - JSON error responses mapped from the domain errors

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit};
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use loimage_core::{ImageService, UploadPolicy};
use loimage_db::{ImageRepository, PgPool};
use loimage_shared::UploadConfig;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// Batch coordinator over the large-object store.
    pub images: ImageService<PgPool>,
    /// Per-part size limit and MIME allow-list.
    pub upload: Arc<UploadPolicy>,
    /// Largest accepted request body, in bytes.
    pub max_form_size: usize,
}

impl AppState {
    /// Build state around an established connection.
    #[must_use]
    pub fn new(db: DatabaseConnection, upload: &UploadConfig) -> Self {
        let images = ImageService::new(Arc::new(PgPool::new(db.clone())));
        Self {
            db: Arc::new(db),
            images,
            upload: Arc::new(UploadPolicy::from(upload)),
            max_form_size: upload.max_form_size,
        }
    }

    /// Metadata repository over the shared connection.
    #[must_use]
    pub fn repository(&self) -> ImageRepository {
        ImageRepository::new((*self.db).clone())
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(DefaultBodyLimit::max(state.max_form_size))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
