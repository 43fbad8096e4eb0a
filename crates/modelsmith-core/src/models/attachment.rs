//! File attachments
//!
//! Converts user-selected files into base64 payloads tagged with a name and
//! MIME type so they can travel inside a message and be replayed to the
//! completion gateway with the rest of the history.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const MAX_ATTACHMENT_SIZE: u64 = 5_242_880; // 5MB

#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File too large: {size} bytes (max {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Invalid attachment payload: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// A file carried by a message. Immutable once attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    /// Base64 (standard alphabet) encoded file contents
    pub data: String,
}

impl Attachment {
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    /// Decode the payload back to the original bytes
    pub fn decode_data(&self) -> Result<Vec<u8>, AttachmentError> {
        Ok(STANDARD.decode(&self.data)?)
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == "application/pdf"
    }

    /// Text-like payloads (DDL, SQL, Markdown, ...) that can be inlined as plain text
    pub fn is_text(&self) -> bool {
        self.mime_type.starts_with("text/")
            || matches!(
                self.mime_type.as_str(),
                "application/json" | "application/sql"
            )
    }
}

/// Guess a MIME type from a file extension
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "sql" | "ddl" => "application/sql",
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Read and encode a single file
pub async fn encode_file(path: &Path) -> Result<Attachment, AttachmentError> {
    let metadata = tokio::fs::metadata(path).await?;
    let size = metadata.len();
    if size > MAX_ATTACHMENT_SIZE {
        return Err(AttachmentError::FileTooLarge {
            size,
            max: MAX_ATTACHMENT_SIZE,
        });
    }

    let data = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "attachment".to_string());

    Ok(Attachment::from_bytes(name, mime_type_for_path(path), &data))
}

/// Encode a batch of files concurrently.
///
/// The batch is only returned once every file has finished. Files that fail
/// to encode are left out; the rest keep the order of `paths`.
pub async fn encode_files<P: AsRef<Path>>(paths: &[P]) -> Vec<Attachment> {
    let results = join_all(paths.iter().map(|p| encode_file(p.as_ref()))).await;

    let attachments: Vec<Attachment> = results
        .into_iter()
        .zip(paths)
        .filter_map(|(result, path)| match result {
            Ok(attachment) => Some(attachment),
            Err(e) => {
                warn!(path = %path.as_ref().display(), error = %e, "Skipping attachment");
                None
            }
        })
        .collect();

    debug!(
        requested = paths.len(),
        encoded = attachments.len(),
        "Attachments encoded"
    );
    attachments
}
