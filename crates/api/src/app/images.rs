//! Product image uploads, written to a local directory.
//!
//! Stored references have the form `/images/<uuid>.<ext>`; serving that path
//! is left to whatever fronts the API.

use std::path::{Path, PathBuf};

use axum::http::StatusCode;
use axum::response::Response;
use thiserror::Error;
use uuid::Uuid;

use crate::app::errors;

const URL_PREFIX: &str = "/images/";
const MAX_EXTENSION_LEN: usize = 10;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("the uploaded file must be an image (got '{0}')")]
    NotAnImage(String),

    #[error("failed to store image: {0}")]
    Io(#[from] std::io::Error),
}

impl ImageError {
    pub fn into_response(self) -> Response {
        match self {
            ImageError::NotAnImage(_) => {
                errors::json_error(StatusCode::BAD_REQUEST, "validation_error", self.to_string())
            }
            ImageError::Io(err) => {
                tracing::error!(error = %err, "image write failed");
                errors::json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error",
                )
            }
        }
    }
}

/// One file part of a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `upload` under a fresh name and return its reference.
    pub async fn save(&self, upload: &UploadedImage) -> Result<String, ImageError> {
        let content_type = upload.content_type.as_deref().unwrap_or_default();
        if !content_type.to_ascii_lowercase().starts_with("image/") {
            return Err(ImageError::NotAnImage(content_type.to_string()));
        }

        let file_name = format!(
            "{}.{}",
            Uuid::now_v7(),
            extension(upload.file_name.as_deref(), content_type)
        );
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&file_name), &upload.bytes).await?;

        tracing::info!(file = %file_name, bytes = upload.bytes.len(), "product image stored");
        Ok(format!("{URL_PREFIX}{file_name}"))
    }

    /// Remove a file written by [`ImageStore::save`] whose product was never
    /// saved. Failures are only logged.
    pub async fn discard(&self, reference: &str) {
        let Some(file_name) = reference.strip_prefix(URL_PREFIX) else {
            return;
        };
        if let Err(err) = tokio::fs::remove_file(self.dir.join(file_name)).await {
            tracing::warn!(file = %file_name, error = %err, "could not remove orphaned image");
        }
    }
}

/// Extension from the client's file name, else from the content subtype.
/// Only short ASCII alphanumeric extensions are kept.
fn extension(file_name: Option<&str>, content_type: &str) -> String {
    let clean = |raw: &str| {
        let raw = raw.trim().to_ascii_lowercase();
        (!raw.is_empty()
            && raw.len() <= MAX_EXTENSION_LEN
            && raw.bytes().all(|b| b.is_ascii_alphanumeric()))
        .then_some(raw)
    };

    file_name
        .and_then(|name| name.rsplit_once('.'))
        .and_then(|(_, ext)| clean(ext))
        .or_else(|| content_type.split_once('/').and_then(|(_, sub)| clean(sub)))
        .unwrap_or_else(|| "img".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("almacen-images-{}", Uuid::now_v7()))
    }

    fn upload(file_name: &str, content_type: &str) -> UploadedImage {
        UploadedImage {
            file_name: Some(file_name.to_string()),
            content_type: Some(content_type.to_string()),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[test]
    fn extension_is_sanitized() {
        assert_eq!(extension(Some("foto.JPG"), "image/jpeg"), "jpg");
        assert_eq!(extension(Some("../../etc/passwd"), "image/png"), "png");
        assert_eq!(extension(Some("sin_extension"), "image/webp"), "webp");
        assert_eq!(extension(None, "image/svg+xml"), "img");
    }

    #[tokio::test]
    async fn saves_images_under_a_generated_name() {
        let store = ImageStore::new(scratch_dir());
        let reference = store.save(&upload("galletas.png", "image/png")).await.unwrap();

        assert!(reference.starts_with("/images/"));
        assert!(reference.ends_with(".png"));
        let written = store.dir().join(reference.trim_start_matches("/images/"));
        assert_eq!(std::fs::read(&written).unwrap(), vec![0x89, b'P', b'N', b'G']);

        store.discard(&reference).await;
        assert!(!written.exists());
        let _ = std::fs::remove_dir_all(store.dir());
    }

    #[tokio::test]
    async fn non_images_are_refused() {
        let store = ImageStore::new(scratch_dir());
        let err = store.save(&upload("notas.txt", "text/plain")).await.unwrap_err();
        assert!(matches!(err, ImageError::NotAnImage(ct) if ct == "text/plain"));
        assert!(!store.dir().exists());
    }
}
