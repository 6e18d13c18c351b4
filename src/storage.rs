//! Upload directory bookkeeping: naming, validation and derived file paths.

use std::path::{Path, PathBuf};

use tracing::info;
use uuid::Uuid;

use crate::error::AppError;

/// Video container extensions accepted for upload.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "avi"];

/// Flat directory holding uploads and everything derived from them.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    /// Opens the store, creating the directory when missing.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|err| {
            AppError::internal(format!("failed to create upload directory {root:?}: {err}"))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores uploaded bytes under a fresh `<uuid>.<ext>` name and returns it.
    /// The extension is lowercased, so `clip.MP4` is stored as `<uuid>.mp4`.
    pub async fn save_upload(&self, original_name: &str, bytes: &[u8]) -> Result<String, AppError> {
        let extension = validate_video_extension(original_name)?;
        let name = format!("{}.{extension}", Uuid::new_v4().simple());
        let path = self.root.join(&name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|err| AppError::internal(format!("failed to save upload {path:?}: {err}")))?;
        info!(original = original_name, stored = %name, bytes = bytes.len(), "video uploaded");
        Ok(name)
    }

    /// Resolves a client-supplied name to a path inside the store.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, AppError> {
        let trimmed = name.trim();
        let invalid = trimmed.is_empty()
            || trimmed == "."
            || trimmed.contains("..")
            || trimmed.contains(['/', '\\']);
        if invalid {
            return Err(AppError::invalid_request(
                format!("invalid file name {name:?}"),
                Some("filename"),
                Some("invalid_filename"),
            ));
        }
        Ok(self.root.join(trimmed))
    }

    /// Like [`Self::path_for`] but requires the file to exist.
    pub fn existing(&self, name: &str, kind: &str) -> Result<PathBuf, AppError> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(AppError::not_found(format!("{kind} file not found: {name}")));
        }
        Ok(path)
    }
}

/// Returns the lowercased extension when it is an accepted video container.
pub fn validate_video_extension(filename: &str) -> Result<String, AppError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if !VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::unsupported_media_type(format!(
            "Unsupported file format {filename:?}; accepted extensions: .mp4,.mov,.mkv,.avi"
        )));
    }
    Ok(extension)
}

/// Path next to `source` named `<stem><suffix>`.
pub fn derived_path(source: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!("{stem}{suffix}"))
}

/// Final path component as an owned string.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
