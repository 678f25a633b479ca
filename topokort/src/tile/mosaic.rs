//! Tile mosaics and their projection onto the page raster.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use tiny_skia::{FilterQuality, Pixmap, PixmapPaint};

use crate::coord::Affine;
use crate::surface::{new_image, pixmap_from_rgba, transform_of, white_surface, SurfaceError};

/// A grid of equally sized tiles stitched into one image.
pub struct Mosaic {
    image: RgbaImage,
    tile_width: u32,
    tile_height: u32,
}

impl Mosaic {
    pub fn new(cols: u32, rows: u32, tile_width: u32, tile_height: u32) -> Result<Self, SurfaceError> {
        let width = cols.saturating_mul(tile_width);
        let height = rows.saturating_mul(tile_height);
        Ok(Self {
            image: new_image(width, height)?,
            tile_width,
            tile_height,
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Draws a tile into grid cell `(x, y)`, scaling it when the server
    /// returned an unexpected size.
    pub fn place(&mut self, x: u32, y: u32, tile: &RgbaImage) {
        let (px, py) = self.origin(x, y);
        if tile.dimensions() == (self.tile_width, self.tile_height) {
            imageops::replace(&mut self.image, tile, px, py);
        } else {
            let scaled = imageops::resize(tile, self.tile_width, self.tile_height, FilterType::Triangle);
            imageops::replace(&mut self.image, &scaled, px, py);
        }
    }

    /// Paints grid cell `(x, y)` with a flat colour.
    pub fn fill(&mut self, x: u32, y: u32, color: [u8; 3]) {
        let (px, py) = self.origin(x, y);
        let [r, g, b] = color;
        let patch = RgbaImage::from_pixel(self.tile_width, self.tile_height, Rgba([r, g, b, 255]));
        imageops::replace(&mut self.image, &patch, px, py);
    }

    fn origin(&self, x: u32, y: u32) -> (i64, i64) {
        (
            x as i64 * self.tile_width as i64,
            y as i64 * self.tile_height as i64,
        )
    }

    /// Renders the mosaic into a white `width × height` raster through
    /// `transform`, which maps mosaic pixels to output pixels.
    pub fn project(&self, width: u32, height: u32, transform: &Affine) -> Result<Pixmap, SurfaceError> {
        let mut out = white_surface(width, height)?;
        let source = pixmap_from_rgba(&self.image)?;
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        out.draw_pixmap(0, 0, source.as_ref(), &paint, transform_of(transform), None);
        Ok(out)
    }

    /// Crops the mosaic-pixel rectangle `(x, y, w, h)` and stretches it
    /// over the whole output.
    pub fn crop(&self, x: f64, y: f64, w: f64, h: f64, width: u32, height: u32) -> Result<Pixmap, SurfaceError> {
        let sx = width as f64 / w;
        let sy = height as f64 / h;
        self.project(width, height, &Affine::scale_translate(sx, sy, -x * sx, -y * sy))
    }
}
