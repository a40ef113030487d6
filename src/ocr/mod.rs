//! OCR pipeline: rasterized pages in, recognized text out

mod extractor;
mod tesseract;

pub use extractor::TextExtractor;
pub use tesseract::{OcrEngine, TesseractEngine};
