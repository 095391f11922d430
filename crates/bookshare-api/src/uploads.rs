use std::path::{Path, PathBuf};

use anyhow::Result;
use rand::Rng;
use tokio::fs;
use tracing::info;

use crate::error::ApiError;

/// 10 MB per uploaded file.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Multipart form fields that may carry a file, each with its own
/// destination directory and MIME allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadField {
    BookImage,
    NoteFile,
    GenericFile,
}

impl UploadField {
    pub fn parse(field_name: &str) -> Option<Self> {
        match field_name {
            "bookImage" => Some(UploadField::BookImage),
            "noteFile" | "notesFile" => Some(UploadField::NoteFile),
            "file" => Some(UploadField::GenericFile),
            _ => None,
        }
    }

    fn subdir(self) -> &'static str {
        match self {
            UploadField::BookImage => "books",
            UploadField::NoteFile => "notes",
            UploadField::GenericFile => "",
        }
    }

    fn allows(self, content_type: &str) -> bool {
        match self {
            UploadField::BookImage => content_type.starts_with("image/"),
            UploadField::NoteFile => matches!(
                content_type,
                "application/pdf"
                    | "application/msword"
                    | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            ),
            UploadField::GenericFile => true,
        }
    }

    fn rejection(self) -> &'static str {
        match self {
            UploadField::BookImage => "Only image files are allowed for book images",
            UploadField::NoteFile => "Only PDF and Word documents are allowed for notes",
            UploadField::GenericFile => "Unsupported file type",
        }
    }
}

/// A file accepted and written to disk, addressed by its public URL.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub field: String,
    pub url: String,
    pub size: u64,
    pub format: Option<String>,
}

/// Manages the on-disk upload tree. Files land under
/// `{root}/books/`, `{root}/notes/` or `{root}/` depending on the form
/// field they arrived in, and are served back under `/uploads`.
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub async fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(root.join("books")).await?;
        fs::create_dir_all(root.join("notes")).await?;
        info!("Upload directory: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate and persist one multipart file part.
    pub async fn store(
        &self,
        field_name: &str,
        original_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<StoredFile, ApiError> {
        let field = UploadField::parse(field_name).ok_or_else(|| {
            ApiError::validation(format!("Unexpected field: {field_name}"))
        })?;

        if !field.allows(content_type) {
            return Err(ApiError::validation(field.rejection()));
        }
        if data.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::validation(format!(
                "File too large for field {field_name} (limit 10MB)"
            )));
        }

        let filename = unique_name(field_name, original_name);
        let dir = self.root.join(field.subdir());
        let path = dir.join(&filename);

        fs::write(&path, data).await.map_err(|e| {
            ApiError::Internal(anyhow::anyhow!("failed to write upload {}: {}", path.display(), e))
        })?;

        let url = if field.subdir().is_empty() {
            format!("/uploads/{filename}")
        } else {
            format!("/uploads/{}/{filename}", field.subdir())
        };

        Ok(StoredFile {
            field: field_name.to_string(),
            url,
            size: data.len() as u64,
            format: extension(original_name),
        })
    }
}

/// `{field}-{timestamp}-{random}{ext}` keeps concurrent uploads of the
/// same filename from colliding.
fn unique_name(field_name: &str, original_name: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::rng().random_range(0..1_000_000_000);
    let ext = extension(original_name)
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    format!("{field_name}-{timestamp}-{suffix}{ext}")
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_routing() {
        assert_eq!(UploadField::parse("bookImage"), Some(UploadField::BookImage));
        assert_eq!(UploadField::parse("noteFile"), Some(UploadField::NoteFile));
        assert_eq!(UploadField::parse("notesFile"), Some(UploadField::NoteFile));
        assert_eq!(UploadField::parse("file"), Some(UploadField::GenericFile));
        assert_eq!(UploadField::parse("avatar"), None);

        assert_eq!(UploadField::BookImage.subdir(), "books");
        assert_eq!(UploadField::NoteFile.subdir(), "notes");
    }

    #[test]
    fn mime_allow_lists() {
        assert!(UploadField::BookImage.allows("image/png"));
        assert!(UploadField::BookImage.allows("image/jpeg"));
        assert!(!UploadField::BookImage.allows("application/pdf"));

        assert!(UploadField::NoteFile.allows("application/pdf"));
        assert!(UploadField::NoteFile.allows("application/msword"));
        assert!(!UploadField::NoteFile.allows("image/png"));
        assert!(!UploadField::NoteFile.allows("text/html"));
    }

    #[test]
    fn unique_names_keep_extension_and_differ() {
        let a = unique_name("bookImage", "cover.JPG");
        let b = unique_name("bookImage", "cover.JPG");
        assert!(a.starts_with("bookImage-"));
        assert!(a.ends_with(".jpg"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn store_rejects_wrong_mime_and_oversize() {
        let root = std::env::temp_dir().join(format!("bookshare-test-{}", uuid::Uuid::new_v4()));
        let storage = Storage::new(root.clone()).await.unwrap();

        let err = storage
            .store("bookImage", "notes.pdf", "application/pdf", b"%PDF-")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let big = vec![0u8; MAX_UPLOAD_BYTES + 1];
        let err = storage
            .store("file", "big.bin", "application/octet-stream", &big)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let ok = storage
            .store("bookImage", "cover.png", "image/png", b"\x89PNG")
            .await
            .unwrap();
        assert!(ok.url.starts_with("/uploads/books/"));
        assert_eq!(ok.size, 4);

        tokio::fs::remove_dir_all(root).await.ok();
    }
}
