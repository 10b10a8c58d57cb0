//! Attachment byte handles.

use serde::de::DeserializeOwned;

use crate::error::{Result, StoreError};
use crate::util::mime::{content_type_for_extension, extension_of};

/// Opaque handle over attachment bytes produced by a reader.
///
/// The store only calls these accessors; it never inspects where the bytes
/// came from.
pub trait ResultFile: Send + Sync {
    /// File name as the reader found it (the attachment identity).
    fn original_file_name(&self) -> &str;

    /// Extension including the leading dot, if the file has one.
    fn extension(&self) -> Option<String> {
        extension_of(self.original_file_name())
    }

    /// Detected content type.
    fn content_type(&self) -> Option<String> {
        self.extension()
            .and_then(|ext| content_type_for_extension(&ext))
            .map(ToString::to_string)
    }

    /// Length of the body in bytes.
    fn content_length(&self) -> u64 {
        self.as_bytes().len() as u64
    }

    /// Raw body.
    fn as_bytes(&self) -> &[u8];

    /// Body decoded as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid UTF-8.
    fn as_utf8_string(&self) -> Result<String> {
        String::from_utf8(self.as_bytes().to_vec()).map_err(|e| {
            StoreError::with_context(
                format!("attachment '{}' is not UTF-8", self.original_file_name()),
                e,
            )
        })
    }

    /// Body parsed as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    fn read_json<T: DeserializeOwned>(&self) -> Result<T>
    where
        Self: Sized,
    {
        Ok(serde_json::from_slice(self.as_bytes())?)
    }
}

/// In-memory [`ResultFile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferResultFile {
    original_file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

impl BufferResultFile {
    #[must_use]
    pub fn new(original_file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            original_file_name: original_file_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    /// Override the detected content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl ResultFile for BufferResultFile {
    fn original_file_name(&self) -> &str {
        &self.original_file_name
    }

    fn content_type(&self) -> Option<String> {
        self.content_type.clone().or_else(|| {
            self.extension()
                .and_then(|ext| content_type_for_extension(&ext))
                .map(ToString::to_string)
        })
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}
