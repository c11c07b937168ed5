//! Uploaded-file references.
//!
//! Storing the bytes is the upload layer's job. Repositories only receive
//! the stored filename and record the public path derived from it.

/// Which entity an upload belongs to; decides the public path prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Gem,
    Jewelry,
    JewelryType,
    CustomRequest,
}

impl UploadKind {
    /// Directory name under the uploads root, also used as filename prefix.
    pub fn dir_name(&self) -> &'static str {
        match self {
            UploadKind::Gem => "gem",
            UploadKind::Jewelry => "jewelry",
            UploadKind::JewelryType => "type",
            UploadKind::CustomRequest => "custom",
        }
    }

    pub fn public_path(&self, filename: &str) -> String {
        format!("/uploads/{}/{}", self.dir_name(), filename)
    }
}

/// A file the upload layer has already stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub kind: UploadKind,
    pub filename: String,
}

impl UploadedFile {
    pub fn new(kind: UploadKind, filename: impl Into<String>) -> Self {
        Self {
            kind,
            filename: filename.into(),
        }
    }

    pub fn public_path(&self) -> String {
        self.kind.public_path(&self.filename)
    }
}
