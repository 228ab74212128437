use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartError};
use thiserror::Error;
use uuid::Uuid;

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("a maximum of {0} images is allowed per product")]
    TooManyFiles(usize),
    #[error("{name} exceeds the {limit} byte image limit")]
    TooLarge { name: String, limit: usize },
    #[error("unsupported image type: {0}")]
    UnsupportedType(String),
    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One file part read out of a multipart body
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Text fields and file parts split out of a product form
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<FilePart>,
}

impl UploadForm {
    /// A text field, treating blank values as absent
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// Drain a multipart body. Any part carrying a filename counts as an image
/// upload; everything else is a text field.
pub async fn read_form(multipart: &mut Multipart) -> Result<UploadForm, UploadError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(|s| s.to_string());
        let file_name = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|s| s.to_string());

        match file_name {
            Some(file_name) => {
                let data = field.bytes().await?;
                form.files.push(FilePart { file_name, content_type, data });
            }
            None => {
                if let Some(name) = field_name {
                    form.fields.insert(name, field.text().await?);
                }
            }
        }
    }

    Ok(form)
}

/// Check one upload against the size and type rules. Returns the normalized
/// extension used for the stored filename.
pub fn validate(file: &FilePart, max_bytes: usize) -> Result<&'static str, UploadError> {
    if file.data.len() > max_bytes {
        return Err(UploadError::TooLarge { name: file.file_name.clone(), limit: max_bytes });
    }

    let ext = file
        .file_name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .ok_or_else(|| UploadError::UnsupportedType(file.file_name.clone()))?;
    let ext = ALLOWED_EXTENSIONS
        .iter()
        .find(|allowed| **allowed == ext)
        .copied()
        .ok_or_else(|| UploadError::UnsupportedType(file.file_name.clone()))?;

    if let Some(content_type) = &file.content_type {
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(UploadError::UnsupportedType(content_type.clone()));
        }
    }

    Ok(ext)
}

/// A stored image: the public URL plus the path used for cleanup
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub url: String,
    pub path: PathBuf,
}

/// Persist a validated batch under `<dir>/products/` with fresh UUID names.
/// If any write fails, files already written are removed before the error
/// returns.
pub async fn store_all(
    dir: &str,
    files: &[FilePart],
    max_files: usize,
    max_bytes: usize,
) -> Result<Vec<StoredImage>, UploadError> {
    if files.len() > max_files {
        return Err(UploadError::TooManyFiles(max_files));
    }
    let extensions = files.iter().map(|f| validate(f, max_bytes)).collect::<Result<Vec<_>, _>>()?;

    let mut stored = Vec::with_capacity(files.len());
    for (file, ext) in files.iter().zip(extensions) {
        match store(dir, ext, &file.data).await {
            Ok(image) => stored.push(image),
            Err(e) => {
                discard(&stored).await;
                return Err(e);
            }
        }
    }
    Ok(stored)
}

async fn store(dir: &str, ext: &str, data: &[u8]) -> Result<StoredImage, UploadError> {
    let folder = Path::new(dir).join("products");
    tokio::fs::create_dir_all(&folder).await?;

    let file_name = format!("{}.{}", Uuid::new_v4(), ext);
    let path = folder.join(&file_name);
    tokio::fs::write(&path, data).await?;

    Ok(StoredImage { url: format!("/uploads/products/{}", file_name), path })
}

/// Remove files whose database rows never landed. Failures only log.
pub async fn discard(images: &[StoredImage]) {
    for image in images {
        if let Err(e) = tokio::fs::remove_file(&image.path).await {
            tracing::warn!(path = %image.path.display(), "failed to remove orphaned upload: {}", e);
        }
    }
}
