use super::{ImageFile, ImageHost, UploadError, UploadedImage};
use anyhow::Context;
use async_trait::async_trait;
use axum::http::StatusCode;
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

/// Raster formats accepted for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" => Some(ImageFormat::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageFormat::Jpeg),
            "image/gif" => Some(ImageFormat::Gif),
            "image/webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    /// Identify the format from the file's leading bytes
    fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else {
            None
        }
    }

    fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
        }
    }
}

/// Image host that writes into a local directory served under a public URL
pub struct LocalImageHost {
    root: PathBuf,
    public_base_url: String,
    max_file_bytes: usize,
}

impl LocalImageHost {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str, max_file_bytes: usize) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            max_file_bytes,
        }
    }

    /// Checks size and type; the stored format comes from the file content,
    /// which must agree with the declared content type.
    fn validate(&self, file: &ImageFile) -> Result<ImageFormat, UploadError> {
        let label = file.file_name.as_deref().unwrap_or("upload");

        let declared = file
            .content_type
            .as_deref()
            .and_then(ImageFormat::from_content_type)
            .ok_or_else(|| {
                UploadError::client(
                    StatusCode::BAD_REQUEST,
                    format!("File {} must be a PNG, JPEG, GIF or WebP image", label),
                )
            })?;

        if file.data.is_empty() {
            return Err(UploadError::client(
                StatusCode::BAD_REQUEST,
                format!("File {} is empty", label),
            ));
        }

        if file.data.len() > self.max_file_bytes {
            return Err(UploadError::client(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!(
                    "File {} exceeds the maximum size of {} bytes",
                    label, self.max_file_bytes
                ),
            ));
        }

        match ImageFormat::sniff(&file.data) {
            Some(actual) if actual == declared => Ok(actual),
            actual => {
                warn!(file = %label, declared = ?declared, actual = ?actual, "Image content mismatch");
                Err(UploadError::client(
                    StatusCode::BAD_REQUEST,
                    format!("File {} content does not match its declared type", label),
                ))
            }
        }
    }
}

#[async_trait]
impl ImageHost for LocalImageHost {
    async fn upload_image(&self, file: ImageFile, folder: &str) -> Result<UploadedImage, UploadError> {
        let format = self.validate(&file)?.extension().to_string();

        let public_id = format!("{}/{}", folder, Uuid::new_v4());
        let dir = self.root.join(folder);
        let path = self.root.join(format!("{}.{}", public_id, format));

        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create media folder {:?}", dir))?;
        tokio::fs::write(&path, &file.data)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;

        info!(public_id = %public_id, bytes = file.data.len(), "Image stored");

        Ok(UploadedImage {
            url: format!("{}/{}.{}", self.public_base_url, public_id, format),
            public_id,
            format,
            bytes: file.data.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n";

    fn png(name: &str, payload: &[u8]) -> ImageFile {
        let mut data = PNG_HEADER.to_vec();
        data.extend_from_slice(payload);
        ImageFile {
            file_name: Some(name.to_string()),
            content_type: Some("image/png".to_string()),
            data,
        }
    }

    fn expect_client_error(result: Result<UploadedImage, UploadError>) -> (StatusCode, String) {
        match result {
            Err(UploadError::Client { status, message }) => (status, message),
            other => panic!("expected client error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn stores_files_and_returns_public_urls_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let host = LocalImageHost::new(dir.path(), "https://media.example.com/", 1024);

        let uploaded = host
            .upload_multiple_images(vec![png("a.png", b"aaa"), png("b.png", b"bbbb")], "reviews")
            .await
            .unwrap();

        assert_eq!(uploaded.len(), 2);
        assert_eq!(uploaded[0].bytes, PNG_HEADER.len() + 3);
        assert_eq!(uploaded[1].bytes, PNG_HEADER.len() + 4);
        for image in &uploaded {
            assert!(image.url.starts_with("https://media.example.com/reviews/"));
            assert!(image.url.ends_with(".png"));
            let on_disk = dir.path().join(format!("{}.png", image.public_id));
            assert!(on_disk.exists());
        }
        let first = std::fs::read(dir.path().join(format!("{}.png", uploaded[0].public_id))).unwrap();
        assert!(first.ends_with(b"aaa"));
    }

    #[tokio::test]
    async fn rejects_non_images_as_client_errors() {
        let dir = tempfile::tempdir().unwrap();
        let host = LocalImageHost::new(dir.path(), "http://localhost/media", 1024);
        let file = ImageFile {
            file_name: Some("notes.txt".to_string()),
            content_type: Some("text/plain".to_string()),
            data: b"hello".to_vec(),
        };

        let (status, message) = expect_client_error(host.upload_image(file, "reviews").await);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.contains("notes.txt"));
    }

    #[tokio::test]
    async fn svg_is_refused_and_nothing_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let host = LocalImageHost::new(dir.path(), "http://localhost/media", 1024);
        let file = ImageFile {
            file_name: Some("logo.svg".to_string()),
            content_type: Some("image/svg+xml".to_string()),
            data: br#"<svg xmlns="http://www.w3.org/2000/svg"><script>alert(1)</script></svg>"#
                .to_vec(),
        };

        let (status, _) = expect_client_error(host.upload_image(file, "reviews").await);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!dir.path().join("reviews").exists());
    }

    #[tokio::test]
    async fn content_must_match_declared_type() {
        let dir = tempfile::tempdir().unwrap();
        let host = LocalImageHost::new(dir.path(), "http://localhost/media", 1024);
        let disguised = ImageFile {
            file_name: Some("cat.png".to_string()),
            content_type: Some("image/png".to_string()),
            data: b"<html><script>alert(1)</script></html>".to_vec(),
        };

        let (status, message) = expect_client_error(host.upload_image(disguised, "reviews").await);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.contains("cat.png"));

        let gif_as_png = ImageFile {
            file_name: Some("anim.png".to_string()),
            content_type: Some("image/png".to_string()),
            data: b"GIF89a....".to_vec(),
        };
        expect_client_error(host.upload_image(gif_as_png, "reviews").await);
    }

    #[tokio::test]
    async fn jpeg_and_webp_get_canonical_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let host = LocalImageHost::new(dir.path(), "http://localhost/media", 1024);

        let jpeg = ImageFile {
            file_name: Some("photo.jpeg".to_string()),
            content_type: Some("image/jpeg".to_string()),
            data: vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00],
        };
        let uploaded = host.upload_image(jpeg, "reviews").await.unwrap();
        assert_eq!(uploaded.format, "jpg");

        let mut webp_data = b"RIFF\x10\x00\x00\x00WEBP".to_vec();
        webp_data.extend_from_slice(b"VP8 ");
        let webp = ImageFile {
            file_name: None,
            content_type: Some("image/webp".to_string()),
            data: webp_data,
        };
        let uploaded = host.upload_image(webp, "reviews").await.unwrap();
        assert!(uploaded.url.ends_with(".webp"));
    }

    #[tokio::test]
    async fn oversized_file_is_payload_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let host = LocalImageHost::new(dir.path(), "http://localhost/media", 10);

        let (status, _) =
            expect_client_error(host.upload_image(png("big.png", b"12345"), "reviews").await);
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn batch_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let host = LocalImageHost::new(dir.path(), "http://localhost/media", 1024);
        let empty = ImageFile {
            file_name: Some("empty.png".to_string()),
            content_type: Some("image/png".to_string()),
            data: Vec::new(),
        };

        let result = host
            .upload_multiple_images(vec![png("ok.png", b"x"), empty], "reviews")
            .await;
        assert!(matches!(result, Err(UploadError::Client { .. })));
    }

    #[test]
    fn content_type_parameters_are_ignored() {
        assert_eq!(
            ImageFormat::from_content_type("image/PNG; charset=binary"),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::from_content_type("image/svg+xml"), None);
        assert_eq!(ImageFormat::from_content_type("image/tiff"), None);
    }
}
