//! Page rasterization using PDFium

use crate::error::{Error, Result};
use crate::pdf::ensure_pdf_header;
use image::DynamicImage;
use pdfium_render::prelude::*;

/// Converts a PDF into one raster image per page, in page order
pub trait PageRasterizer: Send + Sync {
    fn rasterize(&self, data: &[u8]) -> Result<Vec<DynamicImage>>;
}

/// PDFium-backed rasterizer
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    dpi: u16,
    library_path: Option<String>,
}

impl PdfiumRasterizer {
    pub fn new(dpi: u16, library_path: Option<String>) -> Self {
        Self {
            dpi: dpi.max(72),
            library_path,
        }
    }

    /// Bind a fresh PDFium instance (PDFium is not thread-safe, so nothing is shared)
    fn create_pdfium(&self) -> Result<Pdfium> {
        let bindings = match self.library_path.as_deref() {
            Some(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            }
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

        Ok(Pdfium::new(bindings))
    }

    fn map_pdfium_error(err: PdfiumError) -> Error {
        match err {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                Error::InvalidPdf {
                    reason: "PDF is password protected".to_string(),
                }
            }
            _ => Error::Pdfium {
                reason: format!("{}", err),
            },
        }
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize(&self, data: &[u8]) -> Result<Vec<DynamicImage>> {
        ensure_pdf_header(data)?;

        let pdfium = self.create_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(Self::map_pdfium_error)?;

        let mut images = Vec::new();
        for (index, page) in document.pages().iter().enumerate() {
            let width_pt = page.width().value.max(1.0);
            let target_width = ((width_pt / 72.0) * f32::from(self.dpi)).round() as i32;

            let config = PdfRenderConfig::new()
                .set_target_width(target_width)
                .render_form_data(true)
                .render_annotations(true);

            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| Error::Pdfium {
                    reason: format!("Failed to render page {}: {}", index + 1, e),
                })?;

            images.push(bitmap.as_image());
        }

        tracing::debug!(pages = images.len(), dpi = self.dpi, "rasterized PDF");
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dpi_has_floor() {
        let rasterizer = PdfiumRasterizer::new(10, None);
        assert_eq!(rasterizer.dpi, 72);
    }

    #[test]
    fn test_rejects_non_pdf_before_binding() {
        let rasterizer = PdfiumRasterizer::new(200, Some("/nonexistent".to_string()));
        let result = rasterizer.rasterize(b"hello");
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));
    }
}
