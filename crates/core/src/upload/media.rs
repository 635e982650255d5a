//! Image inspection and thumbnail generation.
//!
//! Everything here is CPU bound; callers run it on the blocking pool.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageError, Rgb, RgbImage};

/// Thumbnail bounding box and JPEG quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSpec {
    /// Maximum width in pixels.
    pub width: u32,
    /// Maximum height in pixels.
    pub height: u32,
    /// JPEG quality (1-100).
    pub quality: u8,
}

impl Default for ThumbnailSpec {
    fn default() -> Self {
        Self {
            width: 400,
            height: 300,
            quality: 75,
        }
    }
}

/// What we learned from a decodable image.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Source width in pixels.
    pub width: u32,
    /// Source height in pixels.
    pub height: u32,
    /// JPEG thumbnail, absent if encoding failed.
    pub thumbnail: Option<Vec<u8>>,
}

/// Decode `data`, read its dimensions and render a thumbnail.
///
/// # Errors
///
/// Returns the decoder error when `data` is not a supported image.
pub fn inspect_image(data: &[u8], spec: ThumbnailSpec) -> Result<ImageInfo, ImageError> {
    let img = image::load_from_memory(data)?;
    let (width, height) = (img.width(), img.height());

    let thumbnail = match render_thumbnail(&img, spec) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(error = %e, "Thumbnail encoding failed");
            None
        }
    };

    Ok(ImageInfo {
        width,
        height,
        thumbnail,
    })
}

/// Shrink to fit `spec` keeping the aspect ratio and encode as JPEG.
/// Images already inside the box keep their size.
fn render_thumbnail(img: &DynamicImage, spec: ThumbnailSpec) -> Result<Vec<u8>, ImageError> {
    let fitted = if img.width() <= spec.width && img.height() <= spec.height {
        img.clone()
    } else {
        img.thumbnail(spec.width, spec.height)
    };

    let rgb = flatten_onto_white(&fitted);
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, spec.quality).encode_image(&rgb)?;
    Ok(out.into_inner())
}

/// JPEG has no alpha channel: composite transparent pixels over white.
fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let blend = |c: u8| -> u8 {
            let alpha = u32::from(a);
            let mixed = (u32::from(c) * alpha + 255 * (255 - alpha)) / 255;
            u8::try_from(mixed).unwrap_or(u8::MAX)
        };
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}
