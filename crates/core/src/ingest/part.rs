//! Uploaded file parts.

use std::io::{self, Read};

use bytes::Bytes;

/// One file entry of a multipart upload.
pub trait FilePart {
    /// Client-supplied filename, if any.
    fn file_name(&self) -> Option<&str>;

    /// Declared size in bytes.
    fn size(&self) -> u64;

    /// Open the part's content for reading.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the content cannot be opened.
    fn open(&self) -> io::Result<impl Read + '_>;
}

/// A file part already buffered in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryPart {
    /// Client-supplied filename.
    pub file_name: Option<String>,
    /// Buffered content.
    pub content: Bytes,
}

impl MemoryPart {
    /// Create a part from a filename and content.
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            content: content.into(),
        }
    }
}

impl FilePart for MemoryPart {
    fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    fn size(&self) -> u64 {
        self.content.len() as u64
    }

    fn open(&self) -> io::Result<impl Read + '_> {
        Ok(self.content.as_ref())
    }
}
