//! PDF processing layer
//!
//! PDFium rasterizes uploaded scans for OCR; lopdf writes the filled form back out.

mod rasterizer;
mod writer;

pub use rasterizer::{PageRasterizer, PdfiumRasterizer};
pub use writer::{
    extract_drawn_lines, layout_pages, render_filled_pdf, wrap_line, FontFace, PageLayout,
    PlacedLine, BODY_FONT_SIZE, FILLED_PDF_FILE_NAME, FILLED_PDF_MIME_TYPE, LINE_HEIGHT,
    MARGIN, PAGE_HEIGHT, PAGE_WIDTH, TITLE, TITLE_FONT_SIZE, WRAP_WIDTH,
};

use crate::error::{Error, Result};

/// Reject buffers that do not start with a PDF header
pub fn ensure_pdf_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::InvalidPdf {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}
