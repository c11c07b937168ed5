//! Request payloads and image uploads.
//!
//! Create and update endpoints accept either a JSON object body or a
//! `multipart/form-data` body. [`Payload`] extracts both into the same
//! shape: text parts become string fields and file parts are collected
//! as [`IncomingFile`]s. [`UploadSink`] then checks the files and writes
//! them under `[uploads].dir/<kind>/` as `<kind>-<uuid><ext>`.
//!
//! All files of a request are checked before the first one is written.

use std::path::{Path, PathBuf};

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use serde_json::Value;

use gemstore_core::document::Fields;
use gemstore_core::upload::{UploadKind, UploadedFile};

use crate::config::UploadsConfig;
use crate::response::ApiError;

/// A file part of a multipart body, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// A request body: JSON object fields or multipart fields plus files.
#[derive(Debug, Clone, Default)]
pub struct Payload {
    pub fields: Fields,
    pub files: Vec<IncomingFile>,
}

impl<S> FromRequest<S> for Payload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            return read_multipart(multipart).await;
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        if body.is_empty() {
            return Ok(Payload::default());
        }
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(fields)) => Ok(Payload {
                fields,
                files: Vec::new(),
            }),
            Ok(_) => Err(ApiError::bad_request("Request body must be a JSON object")),
            Err(e) => Err(ApiError::bad_request(format!("Invalid JSON body: {}", e))),
        }
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<Payload, ApiError> {
    let mut payload = Payload::default();
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let field = part.name().unwrap_or_default().to_string();
        if part.file_name().is_some() {
            let file_name = part.file_name().map(str::to_string);
            let content_type = part.content_type().map(str::to_string);
            let bytes = part
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            payload.files.push(IncomingFile {
                field,
                file_name,
                content_type,
                bytes,
            });
        } else {
            let text = part
                .text()
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            payload.fields.insert(field, Value::String(text));
        }
    }
    Ok(payload)
}

/// Writes uploaded images to disk.
#[derive(Debug, Clone)]
pub struct UploadSink {
    dir: PathBuf,
    max_file_bytes: usize,
    max_images: usize,
}

impl UploadSink {
    pub fn new(config: &UploadsConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            max_file_bytes: config.max_file_bytes,
            max_images: config.max_images,
        }
    }

    /// Root directory served under `/uploads`.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stores up to `max_images` files.
    pub async fn save_all(
        &self,
        kind: UploadKind,
        files: Vec<IncomingFile>,
    ) -> Result<Vec<UploadedFile>, ApiError> {
        self.check(&files, self.max_images)?;
        let mut saved = Vec::with_capacity(files.len());
        for file in &files {
            saved.push(self.write(kind, file).await?);
        }
        Ok(saved)
    }

    /// Stores at most one file.
    pub async fn save_one(
        &self,
        kind: UploadKind,
        files: Vec<IncomingFile>,
    ) -> Result<Option<UploadedFile>, ApiError> {
        self.check(&files, 1)?;
        match files.first() {
            Some(file) => Ok(Some(self.write(kind, file).await?)),
            None => Ok(None),
        }
    }

    fn check(&self, files: &[IncomingFile], max_files: usize) -> Result<(), ApiError> {
        if files.len() > max_files {
            return Err(ApiError::bad_request(format!(
                "Too many files: at most {} allowed",
                max_files
            )));
        }
        for file in files {
            let is_image = file
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.starts_with("image/"));
            if !is_image {
                return Err(ApiError::bad_request("Only image files are allowed")
                    .with("field", file.field.as_str()));
            }
            if file.bytes.len() > self.max_file_bytes {
                return Err(ApiError::bad_request(format!(
                    "File too large: at most {} bytes allowed",
                    self.max_file_bytes
                ))
                .with("field", file.field.as_str()));
            }
        }
        Ok(())
    }

    async fn write(&self, kind: UploadKind, file: &IncomingFile) -> Result<UploadedFile, ApiError> {
        let dir = self.dir.join(kind.dir_name());
        let filename = format!(
            "{}-{}{}",
            kind.dir_name(),
            uuid::Uuid::new_v4().simple(),
            extension(file)
        );

        let written = async {
            tokio::fs::create_dir_all(&dir).await?;
            tokio::fs::write(dir.join(&filename), &file.bytes).await
        }
        .await;
        if let Err(e) = written {
            tracing::error!(error = %e, dir = %dir.display(), "failed to store upload");
            return Err(ApiError::internal(format!("failed to store upload: {}", e)));
        }

        tracing::debug!(%filename, bytes = file.bytes.len(), "upload stored");
        Ok(UploadedFile::new(kind, filename))
    }
}

/// `.ext` from the client filename when it is short and alphanumeric,
/// otherwise from the image subtype.
fn extension(file: &IncomingFile) -> String {
    let from_name = file
        .file_name
        .as_deref()
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()));
    let from_type = || {
        file.content_type
            .as_deref()
            .and_then(|ct| ct.strip_prefix("image/"))
            .map(|sub| sub.split(['+', ';']).next().unwrap_or(sub))
            .filter(|sub| !sub.is_empty() && sub.chars().all(|c| c.is_ascii_alphanumeric()))
    };
    match from_name.or_else(from_type) {
        Some(ext) => format!(".{}", ext.to_ascii_lowercase()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str, content_type: &str, len: usize) -> IncomingFile {
        IncomingFile {
            field: "images".into(),
            file_name: Some(name.into()),
            content_type: Some(content_type.into()),
            bytes: Bytes::from(vec![0u8; len]),
        }
    }

    fn sink(dir: &Path) -> UploadSink {
        UploadSink::new(&UploadsConfig {
            dir: dir.to_path_buf(),
            max_file_bytes: 100,
            max_images: 2,
        })
    }

    #[test]
    fn test_extension_prefers_filename() {
        assert_eq!(extension(&image("ring.JPG", "image/jpeg", 1)), ".jpg");
        assert_eq!(extension(&image("noext", "image/png", 1)), ".png");
        assert_eq!(extension(&image("logo", "image/svg+xml", 1)), ".svg");
        assert_eq!(extension(&image("x.../../etc", "image/webp", 1)), ".webp");
    }

    #[tokio::test]
    async fn test_save_all_writes_under_kind_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let saved = sink(tmp.path())
            .save_all(UploadKind::Gem, vec![image("a.png", "image/png", 10)])
            .await
            .unwrap();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].filename.starts_with("gem-"));
        assert!(saved[0].filename.ends_with(".png"));
        assert!(tmp.path().join("gem").join(&saved[0].filename).is_file());
        assert!(saved[0].public_path().starts_with("/uploads/gem/gem-"));
    }

    #[tokio::test]
    async fn test_rejects_before_writing_anything() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sink = sink(tmp.path());

        let too_many = vec![
            image("a.png", "image/png", 1),
            image("b.png", "image/png", 1),
            image("c.png", "image/png", 1),
        ];
        assert!(sink.save_all(UploadKind::Gem, too_many).await.is_err());

        let mixed = vec![image("a.png", "image/png", 1), image("b.txt", "text/plain", 1)];
        assert!(sink.save_all(UploadKind::Gem, mixed).await.is_err());

        let big = vec![image("a.png", "image/png", 101)];
        assert!(sink.save_all(UploadKind::Gem, big).await.is_err());

        let two = vec![image("a.png", "image/png", 1), image("b.png", "image/png", 1)];
        assert!(sink.save_one(UploadKind::JewelryType, two).await.is_err());

        assert!(!tmp.path().join("gem").exists());
        assert!(!tmp.path().join("type").exists());
    }
}
