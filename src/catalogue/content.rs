//! Base64 file payloads returned by the export endpoint.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const PDF_MIME: &str = "application/pdf";

/// Metadata for file content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// Filename with extension
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: usize,
    /// Creation timestamp in RFC 3339 format
    pub created_at: String,
}

impl FileMetadata {
    pub fn new(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: usize,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            size_bytes,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// File content with metadata and base64-encoded data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    pub metadata: FileMetadata,
    /// Base64-encoded file data
    pub data: String,
}

impl FileContent {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, data: &[u8]) -> Self {
        let filename = filename.into();
        let mime_type = mime_type.into();
        Self {
            metadata: FileMetadata::new(&filename, &mime_type, data.len()),
            data: BASE64.encode(data),
        }
    }

    /// MIME type guessed from the filename's extension.
    pub fn from_filename(filename: impl Into<String>, data: &[u8]) -> Self {
        let filename = filename.into();
        let mime_type = detect_mime_type(&filename);
        Self::new(filename, mime_type, data)
    }

    pub fn pdf(filename: impl Into<String>, data: &[u8]) -> Self {
        Self::new(filename, PDF_MIME, data)
    }
}

pub fn detect_mime_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Sanitize a string for use in filenames.
pub fn sanitize_filename(name: &str, fallback: &str) -> String {
    let mut result = String::new();
    let mut last_sep = false;

    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            result.push(ch);
            last_sep = false;
        } else if (ch.is_whitespace() || ch == '-' || ch == '_') && !last_sep && !result.is_empty() {
            result.push('_');
            last_sep = true;
        }
    }

    let result = result.trim_matches('_');
    if result.is_empty() {
        return fallback.to_string();
    }
    result.to_string()
}
