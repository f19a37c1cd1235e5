//! Core image persistence logic for loimage.
//!
//! This crate contains the storage protocol with ZERO web or database
//! dependencies. Backing stores plug in through the traits in
//! [`large_object`].
//!
//! # Modules
//!
//! - `image` - The storable-entity capability trait and its collections
//! - `large_object` - Transactional large-object protocol and batch coordinator
//! - `ingest` - Turning uploaded file parts into image entities

pub mod image;
pub mod ingest;
pub mod large_object;

pub use image::{Image, Imager, Images, Oid};
pub use ingest::{IngestError, UploadPolicy};
pub use large_object::{ImageService, StoreError};
