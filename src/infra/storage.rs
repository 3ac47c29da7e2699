//! Local file storage for answer documents.

use std::path::{Path, PathBuf};

use crate::config::{ALLOWED_UPLOAD_EXTENSIONS, UPLOADS_URL_PREFIX};
use crate::domain::generate_token;
use crate::errors::{AppError, AppResult};

/// A stored upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub stored_name: String,
    /// Public path, e.g. `/uploads/3f9c...e1.pdf`
    pub url_path: String,
    pub size: usize,
}

/// Writes uploads into a single flat directory under random names.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    max_bytes: usize,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Create the upload directory if it does not exist yet.
    pub async fn ensure_root(&self) -> AppResult<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| AppError::internal(format!("Cannot create upload directory: {}", e)))
    }

    /// Store `bytes` and return the public path. The client file name only
    /// contributes its (allow-listed) extension.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> AppResult<StoredFile> {
        if bytes.is_empty() {
            return Err(AppError::validation("Uploaded file is empty"));
        }
        if bytes.len() > self.max_bytes {
            return Err(AppError::PayloadTooLarge(self.max_bytes));
        }

        let extension = allowed_extension(original_name)?;
        let stored_name = format!("{}.{}", generate_token(), extension);

        self.ensure_root().await?;
        tokio::fs::write(self.root.join(&stored_name), bytes)
            .await
            .map_err(|e| AppError::internal(format!("Cannot write upload: {}", e)))?;

        tracing::info!(file = %stored_name, size = bytes.len(), "Stored upload");

        Ok(StoredFile {
            url_path: format!("{}/{}", UPLOADS_URL_PREFIX, stored_name),
            stored_name,
            size: bytes.len(),
        })
    }
}

/// Lower-cased extension of `name` if it is on the allow-list.
pub fn allowed_extension(name: &str) -> AppResult<String> {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| AppError::validation("File name must have an extension"))?;

    if ALLOWED_UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(AppError::validation(format!(
            "File type '.{}' is not allowed",
            extension
        )))
    }
}
