//! Image upload and retrieval routes.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use bytes::BytesMut;
use serde::Serialize;
use tracing::info;

use loimage_core::ingest::{MemoryPart, SignatureClassifier, ingest_parts};
use loimage_core::large_object::protocol;
use loimage_core::{Image, IngestError, StoreError};
use loimage_db::{ImageRow, PgTransaction, insert_image_statement, select_location_sql};
use loimage_shared::AppError;
use loimage_shared::types::{PageRequest, PageResponse};

use crate::{AppState, error::ApiError};

/// Multipart field carrying uploaded files.
const FILE_FIELD: &str = "file";

/// Creates the image routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/images", get(list_images).post(upload_images))
        .route("/images/{id}", get(get_image).delete(delete_image))
        .route("/images/{id}/raw", get(get_image_raw))
}

// ============================================================================
// Response Types
// ============================================================================

/// Stored image metadata.
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    /// Row id.
    pub id: u32,
    /// Generated name.
    pub name: String,
    /// Large-object OID.
    pub oid: Option<u32>,
    /// Content length in bytes.
    pub size: i32,
    /// Classified MIME type.
    pub file_type: String,
    /// Upload ordering key.
    pub sort_index: i32,
    /// Insert time (RFC 3339), when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl From<&Image> for ImageResponse {
    fn from(image: &Image) -> Self {
        Self {
            id: image.id,
            name: image.name.clone(),
            oid: image.oid.map(|oid| oid.get()),
            size: image.size,
            file_type: image.file_type.clone(),
            sort_index: image.sort_index,
            created_at: None,
        }
    }
}

impl From<&ImageRow> for ImageResponse {
    fn from(row: &ImageRow) -> Self {
        Self {
            created_at: Some(row.created_at.to_rfc3339()),
            ..Self::from(&row.to_image())
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn multipart_error(err: &MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError(AppError::PayloadTooLarge(err.body_text()))
    } else {
        ApiError::validation(err.body_text())
    }
}

/// Buffer every `file` field, refusing any that grows past `max_size`.
async fn collect_parts(
    multipart: &mut Multipart,
    max_size: u64,
) -> Result<Vec<MemoryPart>, ApiError> {
    let mut parts = Vec::new();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&e))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_owned);
        let mut content = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(&e))? {
            content.extend_from_slice(&chunk);
            let read = content.len() as u64;
            if read > max_size {
                let label = file_name.as_deref().unwrap_or_default();
                return Err(IngestError::file_too_large(label, read, max_size).into());
            }
        }
        parts.push(MemoryPart {
            file_name,
            content: content.freeze(),
        });
    }
    Ok(parts)
}

async fn remove_image(tx: &PgTransaction, image: &Image) -> Result<(), StoreError> {
    if image.oid.is_some() {
        protocol::delete_in_tx(tx, image).await?;
    }
    tx.delete_row(image.id).await
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/images`
/// Store every uploaded `file` part in one transaction.
async fn upload_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let parts = collect_parts(&mut multipart, state.upload.max_size).await?;
    if parts.is_empty() {
        return Err(ApiError::validation("request contains no file parts"));
    }

    let mut images = ingest_parts(&parts, &state.upload, &SignatureClassifier)?;
    state
        .images
        .insert_all(&mut images, &insert_image_statement())
        .await?;

    info!(count = images.len(), "Images uploaded");
    let body: Vec<ImageResponse> = images.iter().map(ImageResponse::from).collect();
    Ok((StatusCode::CREATED, Json(body)))
}

/// GET `/images`
async fn list_images(
    State(state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let page = page.clamped();
    let repo = state.repository();
    let total = repo.count().await?;
    let rows = repo.list(page.offset(), page.limit()).await?;

    let data: Vec<ImageResponse> = rows.iter().map(ImageResponse::from).collect();
    Ok(Json(PageResponse::new(data, page.page, page.per_page, total)))
}

/// GET `/images/{id}`
async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .repository()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("image {id}")))?;
    Ok(Json(ImageResponse::from(&row)))
}

/// GET `/images/{id}/raw`
/// Stream the stored content back with its classified type.
async fn get_image_raw(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .repository()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("image {id}")))?;

    let mut image = row.to_image();
    state.images.read(&mut image, &select_location_sql(id)).await?;

    let content_type = if image.file_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        image.file_type
    };
    Ok(([(header::CONTENT_TYPE, content_type)], image.raw))
}

/// DELETE `/images/{id}`
/// Unlink the large object and delete its row in one transaction.
async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<StatusCode, ApiError> {
    let row = state
        .repository()
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("image {id}")))?;
    let image = row.to_image();

    let scope = state.images.begin("delete_image").await?;
    if let Err(e) = remove_image(scope.tx(), &image).await {
        return Err(scope.abort(e).await.into());
    }
    scope.commit().await?;

    info!(id, "Image deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use rstest::rstest;
    use sea_orm::DatabaseConnection;
    use serde_json::Value;
    use tower::ServiceExt;

    use loimage_core::{ImageService, UploadPolicy};
    use loimage_db::PgPool;

    use crate::create_router;

    use super::*;

    const BOUNDARY: &str = "loimage-test-boundary";
    const PNG: &[u8] = b"\x89PNG\r\n\x1A\n\x00\x00\x00\rIHDR";
    const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00";
    const NOTE: &[u8] = b"hello";

    fn state(policy: UploadPolicy) -> AppState {
        AppState {
            db: Arc::new(DatabaseConnection::Disconnected),
            images: ImageService::new(Arc::new(PgPool::new(DatabaseConnection::Disconnected))),
            upload: Arc::new(policy),
            max_form_size: 1 << 20,
        }
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let disposition = match file_name {
                Some(f) => format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n"),
                None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n"),
            };
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn upload(policy: UploadPolicy, parts: &[(&str, Option<&str>, &[u8])]) -> (u16, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/images")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        let response = create_router(state(policy)).oneshot(request).await.unwrap();
        let status = response.status().as_u16();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[rstest]
    #[case::disallowed_type(&[("file", Some("1"), GIF)], 415)]
    #[case::bad_sort_index(&[("file", Some("first"), PNG)], 400)]
    #[case::missing_file_name(&[("file", None, PNG)], 400)]
    #[case::no_file_parts(&[("note", None, NOTE)], 400)]
    #[tokio::test]
    async fn test_upload_rejected_before_storage(
        #[case] parts: &[(&str, Option<&str>, &[u8])],
        #[case] expected: u16,
    ) {
        let (status, body) = upload(UploadPolicy::default(), parts).await;
        assert_eq!(status, expected);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_oversized_part_is_payload_too_large() {
        let policy = UploadPolicy {
            max_size: 8,
            ..UploadPolicy::default()
        };
        let (status, body) = upload(policy, &[("file", Some("1"), PNG)]).await;
        assert_eq!(status, 413);
        assert_eq!(body["error"], "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_store_failure_is_masked() {
        let (status, body) = upload(UploadPolicy::default(), &[("file", Some("1"), PNG)]).await;
        assert_eq!(status, 500);
        assert_eq!(body["message"], "An error occurred");
    }

    #[tokio::test]
    async fn test_health_reports_database_down() {
        let request = Request::builder()
            .uri("/api/v1/health")
            .body(Body::empty())
            .unwrap();
        let response = create_router(state(UploadPolicy::default()))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["database"], "down");
    }

    #[test]
    fn test_response_from_image() {
        let mut image = Image::stored(4, loimage_core::Oid(16_400), 12);
        image.file_type = "image/png".into();
        image.sort_index = 2;
        let response = ImageResponse::from(&image);
        assert_eq!(response.oid, Some(16_400));
        assert_eq!(response.sort_index, 2);
        assert!(response.created_at.is_none());
    }
}
