//! Image assets referenced by a document.
//!
//! Each image is downloaded, sniffed, and, when it is a PNG, downscaled to the
//! page's maximum width and recompressed. Other formats are kept as downloaded.
//! The optimized bytes are never larger than the downloaded bytes.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Download | `reqwest::blocking` |
//! | Sniff | `image::guess_format` |
//! | Resize | `DynamicImage::resize_exact` with `CatmullRom` |
//! | Encode | `PngEncoder` with best compression and adaptive filtering |

use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use reqwest::blocking::Client;
use serde::Serialize;

use super::pipeline::Cause;

#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    #[error("failed to download image {url}: {source}")]
    Download { url: String, source: reqwest::Error },

    #[error("downloading image {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode image {url}: {source}")]
    Decode {
        url: String,
        source: image::ImageError,
    },

    #[error("failed to encode image {url}: {source}")]
    Encode {
        url: String,
        source: image::ImageError,
    },
}

impl AssetError {
    pub fn cause(&self) -> Cause {
        match self {
            AssetError::Download { .. } | AssetError::Status { .. } => Cause::Network,
            AssetError::Decode { .. } => Cause::Malformed,
            AssetError::Encode { .. } => Cause::Io,
        }
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Something that can fetch the raw bytes behind an image URL.
pub trait AssetSource: Send + Sync {
    fn download(&self, url: &str) -> Result<Vec<u8>, AssetError>;
}

pub struct HttpAssets {
    client: Client,
}

impl HttpAssets {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl AssetSource for HttpAssets {
    fn download(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        let download = |source| AssetError::Download {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().map_err(download)?;
        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().map_err(download)?.to_vec())
    }
}

// =============================================================================
// Assets
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetState {
    Downloaded,
    Optimized,
    PassedThrough,
}

/// One image of a page, named by its position in the document.
#[derive(Debug, Clone)]
pub struct Asset {
    pub index: usize,
    pub source_url: String,
    pub format: Option<ImageFormat>,
    pub bytes: Vec<u8>,
    pub state: AssetState,
}

impl Asset {
    pub fn downloaded(index: usize, source_url: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            index,
            source_url: source_url.into(),
            format: image::guess_format(&bytes).ok(),
            bytes,
            state: AssetState::Downloaded,
        }
    }

    /// File name inside the page's asset directory, e.g. `0.png`.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.index, self.extension())
    }

    /// Identifier the page imports this asset as, e.g. `image0`.
    pub fn var_name(&self) -> String {
        format!("image{}", self.index)
    }

    fn extension(&self) -> String {
        if let Some(ext) = self.format.and_then(|f| f.extensions_str().first()) {
            return (*ext).to_string();
        }
        url_extension(&self.source_url).unwrap_or_else(|| "bin".to_string())
    }

    /// Downscale and recompress PNGs; pass everything else through.
    ///
    /// A PNG whose re-encoding is not smaller is kept as downloaded. Returns a
    /// warning for non-PNGs and for resizes that were discarded that way.
    pub fn optimize(&mut self, max_width: Option<u32>) -> Result<Option<String>, AssetError> {
        if self.format != Some(ImageFormat::Png) {
            self.state = AssetState::PassedThrough;
            let kind = self
                .format
                .map(|f| format!("{f:?}"))
                .unwrap_or_else(|| "unrecognized".to_string());
            return Ok(Some(format!(
                "image {} ({}) is {kind}; kept without optimization",
                self.index, self.source_url
            )));
        }

        let img = image::load_from_memory_with_format(&self.bytes, ImageFormat::Png).map_err(
            |source| AssetError::Decode {
                url: self.source_url.clone(),
                source,
            },
        )?;
        let original_width = img.width();
        let img = downscale(img, max_width);
        let resized = img.width() != original_width;

        let mut encoded = Vec::new();
        img.write_with_encoder(PngEncoder::new_with_quality(
            &mut encoded,
            CompressionType::Best,
            PngFilter::Adaptive,
        ))
        .map_err(|source| AssetError::Encode {
            url: self.source_url.clone(),
            source,
        })?;

        if encoded.len() >= self.bytes.len() {
            self.state = AssetState::PassedThrough;
            return Ok(resized.then(|| {
                format!(
                    "image {} ({}) grew from {} to {} bytes when resized to {} px; kept the original",
                    self.index,
                    self.source_url,
                    self.bytes.len(),
                    encoded.len(),
                    img.width()
                )
            }));
        }

        tracing::debug!(
            index = self.index,
            before = self.bytes.len(),
            after = encoded.len(),
            "optimized image"
        );
        self.bytes = encoded;
        self.state = AssetState::Optimized;
        Ok(None)
    }
}

/// Shrink `img` to `max_width`, keeping the aspect ratio. Never enlarges.
fn downscale(img: DynamicImage, max_width: Option<u32>) -> DynamicImage {
    match max_width {
        Some(max) if max > 0 && img.width() > max => {
            let height = (u64::from(img.height()) * u64::from(max) / u64::from(img.width())).max(1);
            img.resize_exact(max, height as u32, FilterType::CatmullRom)
        }
        _ => img,
    }
}

fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

/// Download and optimize every image, in order.
///
/// Any failure aborts; partial asset sets are never returned.
pub fn process_all(
    source: &dyn AssetSource,
    urls: &[String],
    max_width: Option<u32>,
) -> Result<(Vec<Asset>, Vec<String>), AssetError> {
    let mut assets = Vec::with_capacity(urls.len());
    let mut warnings = Vec::new();
    for (index, url) in urls.iter().enumerate() {
        let bytes = source.download(url)?;
        let mut asset = Asset::downloaded(index, url.as_str(), bytes);
        if let Some(warning) = asset.optimize(max_width)? {
            tracing::warn!("{warning}");
            warnings.push(warning);
        }
        assets.push(asset);
    }
    Ok((assets, warnings))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    use image::{Rgb, RgbImage};

    /// A noisy gradient PNG, stored with fast compression and no filtering.
    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 251) as u8])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_with_encoder(PngEncoder::new_with_quality(
                &mut bytes,
                CompressionType::Fast,
                PngFilter::NoFilter,
            ))
            .unwrap();
        bytes
    }

    struct MapSource(HashMap<String, Vec<u8>>);

    impl AssetSource for MapSource {
        fn download(&self, url: &str) -> Result<Vec<u8>, AssetError> {
            self.0.get(url).cloned().ok_or(AssetError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    #[test]
    fn test_optimize_downscales_png() {
        let original = png_bytes(1200, 600);
        let mut asset = Asset::downloaded(0, "https://img.example/grid.png", original.clone());
        assert_eq!(asset.format, Some(ImageFormat::Png));

        let warning = asset.optimize(Some(600)).unwrap();
        assert!(warning.is_none());
        assert_eq!(asset.state, AssetState::Optimized);
        assert!(asset.bytes.len() <= original.len());

        let decoded = image::load_from_memory(&asset.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (600, 300));
    }

    #[test]
    fn test_optimize_never_enlarges() {
        let original = png_bytes(300, 100);
        let mut asset = Asset::downloaded(1, "https://img.example/small.png", original.clone());
        asset.optimize(Some(900)).unwrap();

        let decoded = image::load_from_memory(&asset.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (300, 100));
        assert!(asset.bytes.len() <= original.len());
    }

    #[test]
    fn test_optimize_without_limit_keeps_size() {
        let original = png_bytes(400, 200);
        let mut asset = Asset::downloaded(0, "https://img.example/a.png", original.clone());
        asset.optimize(None).unwrap();
        let decoded = image::load_from_memory(&asset.bytes).unwrap();
        assert_eq!(decoded.width(), 400);
        assert!(asset.bytes.len() <= original.len());
    }

    /// A 1px checkerboard: tiny as a PNG, noisy once resampled.
    fn checkerboard_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_with_encoder(PngEncoder::new_with_quality(
                &mut bytes,
                CompressionType::Best,
                PngFilter::Adaptive,
            ))
            .unwrap();
        bytes
    }

    #[test]
    fn test_discarded_resize_is_reported() {
        let original = checkerboard_png(1000, 400);
        let mut asset = Asset::downloaded(0, "https://img.example/board.png", original.clone());
        let warning = asset.optimize(Some(900)).unwrap();

        assert_eq!(asset.state, AssetState::PassedThrough);
        assert_eq!(asset.bytes, original);
        assert!(warning.unwrap().contains("kept the original"));
        let decoded = image::load_from_memory(&asset.bytes).unwrap();
        assert_eq!(decoded.width(), 1000);
    }

    #[test]
    fn test_non_png_passes_through() {
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;".to_vec();
        let mut asset = Asset::downloaded(2, "https://img.example/anim.gif?x=1", gif.clone());
        let warning = asset.optimize(Some(100)).unwrap();

        assert!(warning.is_some());
        assert_eq!(asset.state, AssetState::PassedThrough);
        assert_eq!(asset.bytes, gif);
        assert_eq!(asset.file_name(), "2.gif");
    }

    #[test]
    fn test_unknown_format_uses_url_extension() {
        let asset = Asset::downloaded(3, "https://img.example/diagram.svg?v=2", b"<svg/>".to_vec());
        assert_eq!(asset.format, None);
        assert_eq!(asset.file_name(), "3.svg");

        let asset = Asset::downloaded(4, "https://img.example/blob", b"????".to_vec());
        assert_eq!(asset.file_name(), "4.bin");
    }

    #[test]
    fn test_corrupt_png_fails() {
        let mut bytes = png_bytes(10, 10);
        bytes.truncate(40);
        let mut asset = Asset::downloaded(0, "https://img.example/broken.png", bytes);
        let err = asset.optimize(None).unwrap_err();
        assert_eq!(err.cause(), Cause::Malformed);
    }

    #[test]
    fn test_process_all_names_assets_in_order() {
        let source = MapSource(HashMap::from([
            ("https://img.example/a.png".to_string(), png_bytes(20, 10)),
            ("https://img.example/b.png".to_string(), png_bytes(10, 20)),
        ]));
        let urls = vec![
            "https://img.example/a.png".to_string(),
            "https://img.example/b.png".to_string(),
        ];
        let (assets, warnings) = process_all(&source, &urls, None).unwrap();

        assert!(warnings.is_empty());
        let names: Vec<_> = assets.iter().map(|a| (a.file_name(), a.var_name())).collect();
        assert_eq!(
            names,
            vec![
                ("0.png".to_string(), "image0".to_string()),
                ("1.png".to_string(), "image1".to_string()),
            ]
        );
    }

    #[test]
    fn test_process_all_aborts_on_failure() {
        let source = MapSource(HashMap::from([(
            "https://img.example/a.png".to_string(),
            png_bytes(20, 10),
        )]));
        let urls = vec![
            "https://img.example/a.png".to_string(),
            "https://img.example/missing.png".to_string(),
        ];
        let err = process_all(&source, &urls, None).unwrap_err();
        assert_eq!(err.cause(), Cause::Network);
    }
}
