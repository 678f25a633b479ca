//! Page raster encoding.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageError};
use tiny_skia::Pixmap;

use crate::config::OutputFormat;
use crate::geometry::clamp_quality;
use crate::surface::rgb_from_pixmap;

/// An encoded page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub format: OutputFormat,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// JPEG quality in percent for a `[0.1, 1]` quality fraction.
pub fn jpeg_quality(quality: f64) -> u8 {
    (clamp_quality(quality) * 100.0).round() as u8
}

/// Encodes a finished page as opaque RGB.
pub fn encode_page(pixmap: &Pixmap, format: OutputFormat, quality: f64) -> Result<EncodedImage, ImageError> {
    let rgb = rgb_from_pixmap(pixmap);
    let (width, height) = rgb.dimensions();
    let mut data = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            JpegEncoder::new_with_quality(&mut data, jpeg_quality(quality)).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
        OutputFormat::Png => {
            PngEncoder::new(&mut data).write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)?;
        }
    }
    Ok(EncodedImage {
        format,
        data,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use tiny_skia::Color;

    use crate::surface::white_surface;

    #[test]
    fn test_jpeg_quality_is_clamped() {
        assert_eq!(jpeg_quality(0.9), 90);
        assert_eq!(jpeg_quality(0.01), 10);
        assert_eq!(jpeg_quality(3.0), 100);
    }

    #[test]
    fn test_encodes_both_formats() {
        let mut pixmap = white_surface(16, 8).unwrap();
        pixmap.fill(Color::from_rgba8(10, 120, 200, 255));

        let png = encode_page(&pixmap, OutputFormat::Png, 0.9).unwrap();
        assert_eq!((png.width, png.height), (16, 8));
        assert!(png.data.starts_with(&[0x89, b'P', b'N', b'G']));
        let decoded = image::load_from_memory(&png.data).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(3, 3).0, [10, 120, 200]);

        let jpeg = encode_page(&pixmap, OutputFormat::Jpeg, 0.9).unwrap();
        assert!(jpeg.data.starts_with(&[0xff, 0xd8]));
        assert_eq!(jpeg.format, OutputFormat::Jpeg);
    }
}
