//! Shared types, errors, and configuration for loimage.
//!
//! This crate provides common types used across all other crates:
//! - Application-wide error types with HTTP status mapping
//! - Configuration management (server, database, upload limits)
//! - Pagination types for list endpoints

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, DatabaseConfig, ServerConfig, UploadConfig};
pub use error::AppError;
