//! Upload acceptance policy.

use loimage_shared::UploadConfig;

/// Default limit for a single uploaded image.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Size limit and MIME allow-list applied to each uploaded part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Largest accepted declared size, in bytes.
    pub max_size: u64,
    /// Accepted MIME types; empty accepts every type.
    pub allowed_types: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_FILE_SIZE,
            allowed_types: vec!["image/jpeg".to_string(), "image/png".to_string()],
        }
    }
}

impl UploadPolicy {
    /// Policy with the given limit and no type restriction.
    #[must_use]
    pub fn any_type(max_size: u64) -> Self {
        Self {
            max_size,
            allowed_types: Vec::new(),
        }
    }

    /// Whether `file_type` passes the allow-list.
    #[must_use]
    pub fn allows(&self, file_type: &str) -> bool {
        self.allowed_types.is_empty() || self.allowed_types.iter().any(|t| t == file_type)
    }
}

impl From<&UploadConfig> for UploadPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_size: config.max_file_size,
            allowed_types: config.allowed_types.clone(),
        }
    }
}
