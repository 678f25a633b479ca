//! Output document assembly.
//!
//! Pages are handed to a [`DocumentBuilder`] one at a time, in page order,
//! as soon as their raster is encoded. [`PdfDocumentBuilder`] writes each
//! image into the PDF immediately so only the compressed stream is kept.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref};
use thiserror::Error;

use super::encode::EncodedImage;
use crate::config::OutputFormat;

/// Failure assembling the output document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Page image could not be embedded: {0}")]
    Image(#[from] image::ImageError),

    #[error("Page image could not be compressed: {0}")]
    Compress(#[from] std::io::Error),

    #[error("Invalid page size {width}x{height} pt")]
    InvalidPageSize { width: f32, height: f32 },
}

/// Collects page images into a document.
pub trait DocumentBuilder {
    /// Appends a page of `size_pt` (width, height in points) showing `image`
    /// edge to edge.
    fn add_page(&mut self, image: EncodedImage, size_pt: (f32, f32)) -> Result<(), DocumentError>;

    fn page_count(&self) -> usize;

    /// Serialises the document.
    fn finish(self) -> Result<Vec<u8>, DocumentError>
    where
        Self: Sized;
}

const IMAGE_NAME: Name<'static> = Name(b"Im0");

/// Writes a PDF with one full-page image per page.
pub struct PdfDocumentBuilder {
    pdf: Pdf,
    next_ref: i32,
    catalog: Ref,
    page_tree: Ref,
    pages: Vec<Ref>,
}

impl Default for PdfDocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfDocumentBuilder {
    pub fn new() -> Self {
        Self {
            pdf: Pdf::new(),
            next_ref: 3,
            catalog: Ref::new(1),
            page_tree: Ref::new(2),
            pages: Vec::new(),
        }
    }

    fn alloc(&mut self) -> Ref {
        let id = Ref::new(self.next_ref);
        self.next_ref += 1;
        id
    }

    /// JPEG data is embedded as is; PNG data is decoded and stored as a
    /// Flate-compressed RGB stream.
    fn image_stream(image: &EncodedImage) -> Result<(Vec<u8>, Filter), DocumentError> {
        match image.format {
            OutputFormat::Jpeg => Ok((image.data.clone(), Filter::DctDecode)),
            OutputFormat::Png => {
                let rgb = image::load_from_memory_with_format(&image.data, image::ImageFormat::Png)?.to_rgb8();
                let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(rgb.as_raw())?;
                Ok((encoder.finish()?, Filter::FlateDecode))
            }
        }
    }
}

impl DocumentBuilder for PdfDocumentBuilder {
    fn add_page(&mut self, image: EncodedImage, size_pt: (f32, f32)) -> Result<(), DocumentError> {
        let (width, height) = size_pt;
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(DocumentError::InvalidPageSize { width, height });
        }
        let (data, filter) = Self::image_stream(&image)?;
        let image_id = self.alloc();
        let content_id = self.alloc();
        let page_id = self.alloc();

        let mut xobject = self.pdf.image_xobject(image_id, &data);
        xobject.filter(filter);
        xobject.width(image.width as i32);
        xobject.height(image.height as i32);
        xobject.color_space().device_rgb();
        xobject.bits_per_component(8);
        xobject.finish();

        let mut content = Content::new();
        content.save_state();
        content.transform([width, 0.0, 0.0, height, 0.0, 0.0]);
        content.x_object(IMAGE_NAME);
        content.restore_state();
        self.pdf.stream(content_id, &content.finish());

        let mut page = self.pdf.page(page_id);
        page.media_box(Rect::new(0.0, 0.0, width, height));
        page.parent(self.page_tree);
        page.contents(content_id);
        page.resources().x_objects().pair(IMAGE_NAME, image_id);
        page.finish();

        self.pages.push(page_id);
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn finish(mut self) -> Result<Vec<u8>, DocumentError> {
        self.pdf.catalog(self.catalog).pages(self.page_tree);
        self.pdf
            .pages(self.page_tree)
            .kids(self.pages.iter().copied())
            .count(self.pages.len() as i32);
        Ok(self.pdf.finish())
    }
}
