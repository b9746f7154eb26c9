use actix_web::web;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_ARTICLE_IMAGE: &str = "images/default-article.jpg";
pub const DEFAULT_PROFILE_IMAGE: &str = "images/default-profile.png";
const ARTICLE_IMAGE_DIR: &str = "articles";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Blocking task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
    #[error("Refusing to touch path outside storage root: {0}")]
    OutsideRoot(String),
}

/// A file part buffered from a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn size_kb(&self) -> u64 {
        (self.bytes.len() as u64 + 1023) / 1024
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Svg,
    Webp,
}

impl ImageKind {
    fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            "image/gif" => Some(ImageKind::Gif),
            "image/bmp" | "image/x-ms-bmp" => Some(ImageKind::Bmp),
            "image/svg+xml" => Some(ImageKind::Svg),
            "image/webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }

    fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "gif" => Some(ImageKind::Gif),
            "bmp" => Some(ImageKind::Bmp),
            "svg" => Some(ImageKind::Svg),
            "webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }

    fn matches_signature(self, bytes: &[u8]) -> bool {
        match self {
            ImageKind::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
            ImageKind::Png => bytes.starts_with(b"\x89PNG\r\n\x1a\n"),
            ImageKind::Gif => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
            ImageKind::Bmp => bytes.starts_with(b"BM"),
            ImageKind::Webp => bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP",
            ImageKind::Svg => {
                let head = &bytes[..bytes.len().min(1024)];
                String::from_utf8_lossy(head).contains("<svg")
            }
        }
    }

    /// Declared type (or file extension when the part carries a generic type)
    /// must agree with the file's leading bytes.
    pub fn detect(image: &UploadedImage) -> Option<Self> {
        let declared = image
            .content_type
            .as_deref()
            .and_then(Self::from_mime)
            .or_else(|| image.file_name.as_deref().and_then(Self::from_file_name))?;
        declared.matches_signature(&image.bytes).then_some(declared)
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::Bmp => "bmp",
            ImageKind::Svg => "svg",
            ImageKind::Webp => "webp",
        }
    }
}

/// Resolves a stored relative path against the storage root, rejecting
/// anything that could escape it.
fn resolve(storage_root: &Path, relative: &str) -> Result<PathBuf, StorageError> {
    let rel = Path::new(relative);
    if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
        return Err(StorageError::OutsideRoot(relative.to_string()));
    }
    Ok(storage_root.join(rel))
}

/// Writes the image under `articles/` and returns its storage-relative path.
pub async fn store_article_image(
    storage_root: &Path,
    image: UploadedImage,
    kind: ImageKind,
) -> Result<String, StorageError> {
    let relative = format!("{}/{}.{}", ARTICLE_IMAGE_DIR, Uuid::new_v4(), kind.extension());
    let dir = storage_root.join(ARTICLE_IMAGE_DIR);
    let target = resolve(storage_root, &relative)?;

    web::block(move || {
        fs::create_dir_all(&dir)?;
        fs::write(&target, &image.bytes)
    })
    .await??;

    Ok(relative)
}

/// Removes a stored file. A file that is already gone only warrants a warning.
pub async fn delete_stored_file(storage_root: &Path, relative: &str) -> Result<(), StorageError> {
    let target = resolve(storage_root, relative)?;
    let outcome = web::block(move || fs::remove_file(&target)).await?;
    match outcome {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("Stored file '{}' was already missing during deletion.", relative);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// `{app_url}/storage/{path}` for stored files, `{app_url}/{fallback}` otherwise.
pub fn public_url(app_url: &str, stored: Option<&str>, fallback: &str) -> String {
    let base = app_url.trim_end_matches('/');
    match stored.filter(|p| !p.is_empty()) {
        Some(path) => format!("{}/storage/{}", base, path.trim_start_matches('/')),
        None => format!("{}/{}", base, fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn upload(content_type: Option<&str>, name: Option<&str>, bytes: &[u8]) -> UploadedImage {
        UploadedImage {
            file_name: name.map(str::to_string),
            content_type: content_type.map(str::to_string),
            bytes: bytes.to_vec(),
        }
    }

    #[rstest]
    #[case(Some("image/png"), None, PNG_BYTES, Some(ImageKind::Png))]
    #[case(Some("application/octet-stream"), Some("photo.PNG"), PNG_BYTES, Some(ImageKind::Png))]
    #[case(Some("image/jpeg"), None, PNG_BYTES, None)]
    #[case(Some("text/plain"), Some("notes.txt"), b"hello", None)]
    #[case(Some("image/svg+xml"), None, b"<?xml version=\"1.0\"?><svg></svg>", Some(ImageKind::Svg))]
    fn detect_checks_type_and_signature(
        #[case] content_type: Option<&str>,
        #[case] name: Option<&str>,
        #[case] bytes: &[u8],
        #[case] expected: Option<ImageKind>,
    ) {
        assert_eq!(ImageKind::detect(&upload(content_type, name, bytes)), expected);
    }

    #[rstest]
    fn public_url_falls_back_to_placeholder() {
        assert_eq!(
            public_url("http://localhost:8000/", Some("articles/a.png"), DEFAULT_ARTICLE_IMAGE),
            "http://localhost:8000/storage/articles/a.png"
        );
        assert_eq!(
            public_url("http://localhost:8000", None, DEFAULT_PROFILE_IMAGE),
            "http://localhost:8000/images/default-profile.png"
        );
    }

    #[rstest]
    fn resolve_rejects_traversal() {
        let root = Path::new("/srv/storage");
        assert!(resolve(root, "../etc/passwd").is_err());
        assert!(resolve(root, "/etc/passwd").is_err());
        assert_eq!(resolve(root, "articles/a.png").unwrap(), root.join("articles/a.png"));
    }

    #[actix_web::test]
    async fn store_then_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let image = upload(Some("image/png"), Some("a.png"), PNG_BYTES);
        let relative = store_article_image(dir.path(), image, ImageKind::Png).await.unwrap();
        assert!(relative.starts_with("articles/") && relative.ends_with(".png"));
        assert!(dir.path().join(&relative).exists());

        delete_stored_file(dir.path(), &relative).await.unwrap();
        assert!(!dir.path().join(&relative).exists());
        // Second delete only warns.
        delete_stored_file(dir.path(), &relative).await.unwrap();
    }
}
