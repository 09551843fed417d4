// src/services/image_processor.rs
use crate::errors::FloodError;
use crate::models::TerrainStats;
use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageFormat as ImgFormat};
use log::debug;

/// Longest edge sent to the model; larger photos are downscaled first.
pub const MAX_MODEL_DIMENSION: u32 = 2048;
const STATS_SAMPLE_DIMENSION: u32 = 64;

/// Decoded upload, ready for both the model and the simulator.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub data: Bytes,
    pub media_type: String,
    pub dimensions: (u32, u32),
    pub stats: TerrainStats,
}

pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Decodes the upload once, re-encodes it for the model if needed and
    /// summarises its colours. CPU-bound: call from a blocking context.
    ///
    /// The outgoing media type is taken from the bytes, never from the
    /// client's declaration.
    pub fn prepare(&self, data: &Bytes, declared: &str) -> Result<PreparedImage, FloodError> {
        let format = image::guess_format(data)
            .map_err(|e| FloodError::ImageProcessing(e.to_string()))?;
        let img = image::load_from_memory_with_format(data, format)
            .map_err(|e| FloodError::ImageProcessing(e.to_string()))?;
        let dimensions = img.dimensions();
        let stats = self.terrain_stats(&img, data);
        let (data, media_type) =
            self.resize_if_needed(&img, data, format, MAX_MODEL_DIMENSION)?;

        if !declared.eq_ignore_ascii_case(&media_type) {
            debug!("Upload declared as {}, sending {} to the model", declared, media_type);
        }

        Ok(PreparedImage {
            data,
            media_type,
            dimensions,
            stats,
        })
    }

    /// Passes the upload through unchanged when it fits and the model accepts
    /// the format. Everything else is re-encoded as JPEG.
    pub fn resize_if_needed(
        &self,
        img: &DynamicImage,
        data: &Bytes,
        format: ImgFormat,
        max_size: u32,
    ) -> Result<(Bytes, String), FloodError> {
        let (width, height) = img.dimensions();
        let fits = width <= max_size && height <= max_size;

        if fits {
            if let Some(media_type) = model_media_type(format) {
                return Ok((data.clone(), media_type.to_string()));
            }
        }

        let output = if fits {
            img.clone()
        } else {
            let ratio = (max_size as f32 / width.max(height) as f32).min(1.0);
            let new_width = ((width as f32 * ratio) as u32).max(1);
            let new_height = ((height as f32 * ratio) as u32).max(1);
            img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3)
        };

        Ok((encode_jpeg(&output)?, "image/jpeg".to_string()))
    }

    pub fn terrain_stats(&self, img: &DynamicImage, data: &[u8]) -> TerrainStats {
        let oversized =
            img.width() > STATS_SAMPLE_DIMENSION || img.height() > STATS_SAMPLE_DIMENSION;
        let sample = if oversized {
            img.thumbnail(STATS_SAMPLE_DIMENSION, STATS_SAMPLE_DIMENSION)
                .to_rgb8()
        } else {
            img.to_rgb8()
        };

        let mut water = 0usize;
        let mut vegetation = 0usize;
        let mut luma_sum = 0.0f64;
        let total = ((sample.width() * sample.height()) as usize).max(1);

        for pixel in sample.pixels() {
            let [r, g, b] = pixel.0;
            let (r, g, b) = (r as i32, g as i32, b as i32);
            if b - r > 20 && b >= g - 5 {
                water += 1;
            } else if g - r > 10 && g - b > 10 {
                vegetation += 1;
            }
            luma_sum += (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64) / 255.0;
        }

        TerrainStats {
            water_fraction: water as f64 / total as f64,
            vegetation_fraction: vegetation as f64 / total as f64,
            brightness: luma_sum / total as f64,
            digest: fnv1a(data),
        }
    }
}

/// Formats the model takes as-is.
fn model_media_type(format: ImgFormat) -> Option<&'static str> {
    match format {
        ImgFormat::Png => Some("image/png"),
        ImgFormat::Jpeg => Some("image/jpeg"),
        ImgFormat::WebP => Some("image/webp"),
        _ => None,
    }
}

fn encode_jpeg(img: &DynamicImage) -> Result<Bytes, FloodError> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut output = Vec::new();
    rgb.write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Jpeg)
        .map_err(|e| FloodError::Internal(format!("Failed to encode image: {}", e)))?;
    Ok(Bytes::from(output))
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

pub fn fnv1a(data: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    data.iter()
        .fold(OFFSET, |hash, byte| (hash ^ *byte as u64).wrapping_mul(PRIME))
}
