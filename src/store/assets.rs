//! Local image asset storage.
//!
//! Downloads a candidate's image, normalises it (RGB, downscaled to a
//! maximum width, JPEG re-encode) and stores it under a name derived from
//! the record id. Undecodable images are stored verbatim instead.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

use crate::config::ImageConfig;
use crate::error::{Result, ShellcraftError};

/// Extension used when neither the URL nor the Content-Type tells us.
pub const DEFAULT_EXTENSION: &str = "jpg";

const TMP_SUFFIX: &str = ".tmp";

/// Filesystem store for downloaded images.
#[derive(Debug, Clone)]
pub struct AssetStore {
    dir: PathBuf,
    client: reqwest::Client,
    max_width: u32,
    quality: u8,
}

impl AssetStore {
    /// Open (creating if needed) the asset directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the HTTP
    /// client cannot be built.
    pub fn open(dir: impl Into<PathBuf>, config: &ImageConfig) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .user_agent(shellcraft_search::http::random_user_agent())
            .build()
            .map_err(|e| ShellcraftError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            dir,
            client,
            max_width: config.max_width,
            quality: config.quality.clamp(1, 100),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path for `filename`.
    ///
    /// # Errors
    ///
    /// Rejects names that could escape the asset directory.
    pub fn path(&self, filename: &str) -> Result<PathBuf> {
        check_filename(filename)?;
        Ok(self.dir.join(filename))
    }

    /// Whether `filename` exists as a regular file in the store.
    pub fn exists(&self, filename: &str) -> bool {
        self.path(filename).is_ok_and(|p| p.is_file())
    }

    /// Download `image_url` and store it for record `id`.
    ///
    /// Returns the stored file name: `{id}.jpg` when normalisation
    /// succeeded, `{id}.{ext}` with the raw bytes otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ShellcraftError::Download`] on transport errors, timeouts,
    /// non-success statuses and empty bodies; I/O errors if the file
    /// cannot be written.
    pub async fn put(&self, image_url: &str, id: &str) -> Result<String> {
        check_filename(id)?;

        let response = self
            .client
            .get(image_url)
            .send()
            .await
            .map_err(|e| ShellcraftError::Download(describe_request_error(image_url, &e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ShellcraftError::Download(format!(
                "HTTP {status} for {image_url}"
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ShellcraftError::Download(describe_request_error(image_url, &e)))?;
        if bytes.is_empty() {
            return Err(ShellcraftError::Download(format!(
                "empty body for {image_url}"
            )));
        }

        let ext = extension_for(image_url, &content_type);
        let (max_width, quality) = (self.max_width, self.quality);
        let raw = bytes.clone();
        let normalized = tokio::task::spawn_blocking(move || normalize(&raw, max_width, quality))
            .await
            .map_err(|e| ShellcraftError::Image(format!("normalisation task failed: {e}")))
            .and_then(|r| r);

        let (filename, data) = match normalized {
            Ok(jpeg) => (format!("{id}.jpg"), jpeg),
            Err(e) => {
                tracing::warn!(id, error = %e, "image normalisation failed, storing original bytes");
                (format!("{id}.{ext}"), bytes.to_vec())
            }
        };

        self.write_atomic(&filename, &data).await?;
        tracing::debug!(id, file = %filename, size = data.len(), "stored asset");
        Ok(filename)
    }

    /// Remove `filename`. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or a failed removal.
    pub fn delete(&self, filename: &str) -> Result<bool> {
        let path = self.path(filename)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Stored file names, sorted. In-flight temp files are not listed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if is_temp_file(&name) {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    /// Remove every stored file not in `referenced`. Returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed or a removal fails.
    pub fn sweep_orphans(&self, referenced: &HashSet<String>) -> Result<usize> {
        let mut removed = 0;
        for name in self.list()? {
            if referenced.contains(&name) {
                continue;
            }
            if self.delete(&name)? {
                tracing::info!(file = %name, "removed orphaned asset");
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn write_atomic(&self, filename: &str, data: &[u8]) -> Result<()> {
        let path = self.path(filename)?;
        let tmp_path = self.dir.join(format!(".{filename}{TMP_SUFFIX}"));
        tokio::fs::write(&tmp_path, data).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

/// Decode, convert to RGB, downscale to `max_width` and re-encode as JPEG.
///
/// # Errors
///
/// Returns [`ShellcraftError::Image`] if the bytes cannot be decoded or
/// the result cannot be encoded.
pub fn normalize(bytes: &[u8], max_width: u32, quality: u8) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ShellcraftError::Image(format!("failed to decode image: {e}")))?;

    let img = if img.width() > max_width {
        let (w, h) = scaled_dimensions(img.width(), img.height(), max_width);
        img.resize_exact(w, h, FilterType::Lanczos3)
    } else {
        img
    };

    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)
        .map_err(|e| ShellcraftError::Image(format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

/// Dimensions after scaling `width` down to `max_width`, aspect preserved
/// and height rounded to the nearest pixel (at least 1).
pub fn scaled_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width || width == 0 {
        return (width, height);
    }
    let scaled = (u64::from(height) * u64::from(max_width) + u64::from(width) / 2) / u64::from(width);
    let scaled = u32::try_from(scaled).unwrap_or(u32::MAX).max(1);
    (max_width, scaled)
}

/// File extension for a download: URL path suffix first, then the
/// Content-Type, then [`DEFAULT_EXTENSION`].
pub fn extension_for(image_url: &str, content_type: &str) -> &'static str {
    let path = url::Url::parse(image_url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_default();

    if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        return "jpg";
    }
    for ext in ["png", "gif", "webp"] {
        if path.ends_with(&format!(".{ext}")) {
            return ext;
        }
    }

    let content_type = content_type.to_ascii_lowercase();
    if content_type.contains("jpeg") {
        "jpg"
    } else if content_type.contains("png") {
        "png"
    } else if content_type.contains("gif") {
        "gif"
    } else if content_type.contains("webp") {
        "webp"
    } else {
        DEFAULT_EXTENSION
    }
}

fn check_filename(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(ShellcraftError::Store(format!(
            "invalid asset file name: {name:?}"
        )));
    }
    Ok(())
}

fn is_temp_file(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TMP_SUFFIX)
}

fn describe_request_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("timed out fetching {url}")
    } else {
        format!("failed to fetch {url}: {err}")
    }
}
