//! Environment configuration for the export server.
//!
//! Values are read once at startup (after `.env` is loaded) and passed down
//! explicitly; nothing below this module reads the environment on its own.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_ASSETS_DIR: &str = "./assets";
const DEFAULT_IMAGE_TIMEOUT_SECS: u64 = 15;
const DEFAULT_IMAGE_CACHE_CAPACITY: u64 = 500;
const DEFAULT_IMAGE_MAX_DIMENSION: u32 = 800;

pub const COVER_IMAGE_FILE: &str = "cover page.png";
pub const JOURNEY_IMAGE_FILE: &str = "image-journey.png";
pub const WATERMARK_IMAGE_FILE: &str = "watermark.png";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub assets_dir: PathBuf,
    pub cover_image_url: Option<String>,
    pub journey_image_url: Option<String>,
    pub wkhtmltopdf_path: Option<PathBuf>,
    pub disable_binary_renderer: bool,
    pub image: ImageConfig,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub fetch_timeout: Duration,
    pub cache_capacity: u64,
    /// Longest edge, in pixels, kept when embedding fetched images.
    pub max_dimension: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(DEFAULT_IMAGE_TIMEOUT_SECS),
            cache_capacity: DEFAULT_IMAGE_CACHE_CAPACITY,
            max_dimension: DEFAULT_IMAGE_MAX_DIMENSION,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            assets_dir: PathBuf::from(DEFAULT_ASSETS_DIR),
            cover_image_url: None,
            journey_image_url: None,
            wkhtmltopdf_path: None,
            disable_binary_renderer: false,
            image: ImageConfig::default(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8501".to_string(),
                "http://127.0.0.1:8080".to_string(),
            ],
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let allowed_origins = match non_empty_var("CATALOGUE_ALLOWED_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.allowed_origins,
        };

        Self {
            bind_addr: non_empty_var("CATALOGUE_BIND_ADDR").unwrap_or(defaults.bind_addr),
            assets_dir: non_empty_var("CATALOGUE_ASSETS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.assets_dir),
            cover_image_url: non_empty_var("CATALOGUE_COVER_IMAGE_URL"),
            journey_image_url: non_empty_var("CATALOGUE_JOURNEY_IMAGE_URL"),
            wkhtmltopdf_path: non_empty_var("WKHTMLTOPDF_PATH").map(PathBuf::from),
            disable_binary_renderer: parse_var("CATALOGUE_DISABLE_BINARY_RENDERER", false),
            image: ImageConfig {
                fetch_timeout: Duration::from_secs(parse_var(
                    "IMAGE_FETCH_TIMEOUT_SECS",
                    DEFAULT_IMAGE_TIMEOUT_SECS,
                )),
                cache_capacity: parse_var("IMAGE_CACHE_CAPACITY", DEFAULT_IMAGE_CACHE_CAPACITY),
                max_dimension: parse_var("IMAGE_MAX_DIMENSION", DEFAULT_IMAGE_MAX_DIMENSION),
            },
            allowed_origins,
        }
    }

    pub fn cover_fallback_path(&self) -> PathBuf {
        self.assets_dir.join(COVER_IMAGE_FILE)
    }

    pub fn journey_fallback_path(&self) -> PathBuf {
        self.assets_dir.join(JOURNEY_IMAGE_FILE)
    }

    pub fn watermark_path(&self) -> PathBuf {
        self.assets_dir.join(WATERMARK_IMAGE_FILE)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    match non_empty_var(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("{} has an invalid value '{}', using default", key, raw);
            default
        }),
        None => default,
    }
}
