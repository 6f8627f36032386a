//! Image resolution for catalogue pages.
//!
//! The engine only sees [`ImageResolver`]: "give me an embeddable payload for
//! this reference, or nothing". Payloads are plain base64 (no `data:` prefix).

use std::io::Cursor;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use moka::sync::Cache;
use thiserror::Error;

use crate::config::ImageConfig;

const USER_AGENT: &str = concat!("catalogue-export-server/", env!("CARGO_PKG_VERSION"));
const CACHE_TTL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_MIME: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("no HTTP client available")]
    NoClient,
    #[error("image request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("image server answered with status {0}")]
    Status(u16),
    #[error("failed to read image file: {0}")]
    Io(#[source] std::io::Error),
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
}

/// Supplies an embeddable payload for an image reference.
///
/// Implementations may block and may fail; failure is `None`, never a panic.
pub trait ImageResolver {
    fn resolve(&self, reference: &str) -> Option<String>;
}

impl<F> ImageResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn resolve(&self, reference: &str) -> Option<String> {
        self(reference)
    }
}

/// Resolver that never finds anything.
pub fn no_images(_: &str) -> Option<String> {
    None
}

/// Fetches `http(s)` references, reads everything else from disk, and keeps
/// successful payloads in a bounded cache shared across exports.
pub struct HttpImageResolver {
    // Built on first use so construction never happens on an async worker.
    client: OnceLock<Option<reqwest::blocking::Client>>,
    timeout: Duration,
    max_dimension: u32,
    cache: Cache<String, String>,
}

impl HttpImageResolver {
    pub fn new(config: &ImageConfig) -> Self {
        Self {
            client: OnceLock::new(),
            timeout: config.fetch_timeout,
            max_dimension: config.max_dimension,
            cache: Cache::builder()
                .time_to_live(CACHE_TTL)
                .max_capacity(config.cache_capacity)
                .build(),
        }
    }

    fn client(&self) -> Option<&reqwest::blocking::Client> {
        self.client
            .get_or_init(|| {
                reqwest::blocking::Client::builder()
                    .timeout(self.timeout)
                    .user_agent(USER_AGENT)
                    .build()
                    .map_err(ImageError::Client)
                    .map_err(|e| log::error!("{}", e))
                    .ok()
            })
            .as_ref()
    }

    fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        let Some(client) = self.client() else {
            return Err(ImageError::NoClient);
        };
        let response = client.get(url).send().map_err(ImageError::Request)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Status(status.as_u16()));
        }
        let bytes = response.bytes().map_err(ImageError::Request)?;
        Ok(bytes.to_vec())
    }

    fn load(&self, reference: &str) -> Result<String, ImageError> {
        let bytes = if is_remote(reference) {
            self.fetch(reference)?
        } else {
            std::fs::read(reference).map_err(ImageError::Io)?
        };
        encode_payload(&bytes, self.max_dimension)
    }
}

impl ImageResolver for HttpImageResolver {
    fn resolve(&self, reference: &str) -> Option<String> {
        if let Some(hit) = self.cache.get(reference) {
            log::debug!("image cache hit: {}", reference);
            return Some(hit);
        }

        match self.load(reference) {
            Ok(payload) => {
                self.cache.insert(reference.to_string(), payload.clone());
                Some(payload)
            }
            Err(e) => {
                log::warn!("failed to resolve image {}: {}", reference, e);
                None
            }
        }
    }
}

pub fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// Read a bundled asset from disk, `None` if it is absent or unreadable.
pub fn load_local_image(path: &Path, max_dimension: Option<u32>) -> Option<String> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::debug!("local image {} unavailable: {}", path.display(), e);
            return None;
        }
    };
    match max_dimension {
        Some(max) => encode_payload(&bytes, max)
            .map_err(|e| log::warn!("local image {} unusable: {}", path.display(), e))
            .ok(),
        None => Some(BASE64.encode(&bytes)),
    }
}

/// Base64 payload for `bytes`, downscaled when either edge exceeds
/// `max_dimension`. Images already within bounds are passed through as-is.
pub fn encode_payload(bytes: &[u8], max_dimension: u32) -> Result<String, ImageError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(ImageError::Io)?;

    let within_bounds = match reader.into_dimensions() {
        Ok((width, height)) => width <= max_dimension && height <= max_dimension,
        // Formats we cannot decode are embedded untouched.
        Err(_) => true,
    };
    if within_bounds {
        return Ok(BASE64.encode(bytes));
    }

    let decoded = image::load_from_memory(bytes).map_err(ImageError::Decode)?;
    let resized = decoded.resize(max_dimension, max_dimension, FilterType::Triangle);

    let mut out = Vec::new();
    if resized.color().has_alpha() {
        resized
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .map_err(ImageError::Decode)?;
    } else {
        DynamicImage::ImageRgb8(resized.to_rgb8())
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
            .map_err(ImageError::Decode)?;
    }
    Ok(BASE64.encode(out))
}

/// Sniff the MIME type of a base64 payload from its leading magic bytes.
pub fn payload_mime(payload: &str) -> &'static str {
    // 16 base64 characters decode to 12 bytes, enough for every signature below.
    let head: String = payload.chars().take(16).collect();
    if head.len() < 16 {
        return DEFAULT_MIME;
    }
    match BASE64.decode(head.as_bytes()) {
        Ok(bytes) => detect_mime_from_bytes(&bytes).unwrap_or(DEFAULT_MIME),
        Err(_) => DEFAULT_MIME,
    }
}

pub fn detect_mime_from_bytes(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return Some("image/png");
    }
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if data.starts_with(b"GIF8") {
        return Some("image/gif");
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    None
}

/// `data:` URI for an embedded payload.
pub fn data_uri(payload: &str) -> String {
    format!("data:{};base64,{}", payload_mime(payload), payload)
}

/// Decode a payload back to raw bytes for in-process rendering.
pub fn decode_payload(payload: &str) -> Option<Vec<u8>> {
    BASE64.decode(payload.trim().as_bytes()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_payload_mime_sniffing() {
        let png = BASE64.encode(png_bytes(2, 2));
        assert_eq!(payload_mime(&png), "image/png");

        let jpeg = BASE64.encode([0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F', 0, 1]);
        assert_eq!(payload_mime(&jpeg), "image/jpeg");

        assert_eq!(payload_mime("short"), DEFAULT_MIME);
        assert_eq!(payload_mime("!!!!!!!!!!!!!!!!!!!!"), DEFAULT_MIME);
    }

    #[test]
    fn test_data_uri_prefix() {
        let png = BASE64.encode(png_bytes(1, 1));
        assert!(data_uri(&png).starts_with("data:image/png;base64,iVBOR"));
    }

    #[test]
    fn test_small_images_pass_through() {
        let bytes = png_bytes(10, 10);
        let payload = encode_payload(&bytes, 800).unwrap();
        assert_eq!(decode_payload(&payload).unwrap(), bytes);
    }

    #[test]
    fn test_large_images_are_downscaled() {
        let payload = encode_payload(&png_bytes(400, 100), 100).unwrap();
        let decoded = image::load_from_memory(&decode_payload(&payload).unwrap()).unwrap();
        assert_eq!(decoded.width(), 100);
        assert_eq!(decoded.height(), 25);
    }

    #[test]
    fn test_local_image_missing_is_none() {
        assert!(load_local_image(Path::new("/nonexistent/cover page.png"), None).is_none());
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |reference: &str| Some(format!("payload-for-{reference}"));
        assert_eq!(resolver.resolve("a").as_deref(), Some("payload-for-a"));
        assert_eq!(no_images.resolve("a"), None);
    }

    #[test]
    fn test_http_resolver_reads_local_paths_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("item.png");
        std::fs::write(&path, png_bytes(4, 4)).unwrap();

        let resolver = HttpImageResolver::new(&ImageConfig::default());
        let reference = path.to_string_lossy().to_string();
        let first = resolver.resolve(&reference).unwrap();

        std::fs::remove_file(&path).unwrap();
        assert_eq!(resolver.resolve(&reference), Some(first));
        assert_eq!(resolver.resolve("/nonexistent/other.png"), None);
    }
}
