//! Raster surfaces shared by tile stitching and page rendering.
//!
//! Surfaces are `tiny_skia::Pixmap`s (premultiplied RGBA). Decoded tiles
//! arrive as straight-alpha `image::RgbaImage` and are converted at the
//! boundary.

use image::{Rgb, RgbImage, RgbaImage};
use thiserror::Error;
use tiny_skia::{Color, ColorU8, Pixmap, Transform};

use crate::coord::Affine;

/// Largest surface, in pixels, the renderer will allocate.
pub const MAX_SURFACE_PIXELS: u64 = 16_384 * 16_384;

/// An output raster could not be created.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("Cannot create a {width}x{height} px surface: too large, reduce the page size or dpi")]
    TooLarge { width: u32, height: u32 },

    #[error("Cannot create a {width}x{height} px surface: empty dimensions")]
    Empty { width: u32, height: u32 },
}

fn check_size(width: u32, height: u32) -> Result<(), SurfaceError> {
    if width == 0 || height == 0 {
        return Err(SurfaceError::Empty { width, height });
    }
    if width as u64 * height as u64 > MAX_SURFACE_PIXELS {
        return Err(SurfaceError::TooLarge { width, height });
    }
    Ok(())
}

/// Transparent surface.
pub fn new_surface(width: u32, height: u32) -> Result<Pixmap, SurfaceError> {
    check_size(width, height)?;
    Pixmap::new(width, height).ok_or(SurfaceError::TooLarge { width, height })
}

/// Surface pre-filled with opaque white.
pub fn white_surface(width: u32, height: u32) -> Result<Pixmap, SurfaceError> {
    let mut pixmap = new_surface(width, height)?;
    pixmap.fill(Color::WHITE);
    Ok(pixmap)
}

/// Straight-alpha image buffer of the given size, checked like a surface.
pub fn new_image(width: u32, height: u32) -> Result<RgbaImage, SurfaceError> {
    check_size(width, height)?;
    Ok(RgbaImage::new(width, height))
}

pub fn pixmap_from_rgba(image: &RgbaImage) -> Result<Pixmap, SurfaceError> {
    let mut pixmap = new_surface(image.width(), image.height())?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pixmap)
}

pub fn rgba_from_pixmap(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        dst.0 = [c.red(), c.green(), c.blue(), c.alpha()];
    }
    image
}

/// Opaque RGB copy, blending any remaining transparency onto white.
pub fn rgb_from_pixmap(pixmap: &Pixmap) -> RgbImage {
    let mut image = RgbImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        // Premultiplied: colour + (255 - alpha) × white.
        let white = 255 - src.alpha();
        *dst = Rgb([
            src.red().saturating_add(white),
            src.green().saturating_add(white),
            src.blue().saturating_add(white),
        ]);
    }
    image
}

/// Canvas transform for an affine `x' = a·x + c·y + e, y' = b·x + d·y + f`.
pub fn transform_of(affine: &Affine) -> Transform {
    Transform::from_row(
        affine.a as f32,
        affine.b as f32,
        affine.c as f32,
        affine.d as f32,
        affine.e as f32,
        affine.f as f32,
    )
}
