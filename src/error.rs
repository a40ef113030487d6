//! Error types for the PDF auto-fill server

use thiserror::Error;

/// Result type alias for the PDF auto-fill server
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the PDF auto-fill server
#[derive(Error, Debug)]
pub enum Error {
    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// Invalid PDF file
    #[error("Invalid PDF file: {reason}")]
    InvalidPdf { reason: String },

    /// Uploaded document exceeds the configured size limit
    #[error("Upload too large: {size} bytes (max: {max_size} bytes)")]
    UploadTooLarge { size: u64, max_size: u64 },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PDFium error while rasterizing pages
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// OCR engine failure
    #[error("OCR failed: {reason}")]
    Ocr { reason: String },

    /// OCR engine did not finish in time
    #[error("OCR timed out after {seconds}s")]
    OcrTimeout { seconds: u64 },

    /// Filled PDF could not be generated
    #[error("PDF rendering failed: {reason}")]
    Render { reason: String },

    /// Unknown or evicted session
    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    /// Fill requested before any document text was extracted
    #[error("No document text available; upload a readable PDF first")]
    MissingDocumentText,

    /// Ask or download requested before the form was filled
    #[error("No filled text available; run fill_missing_fields first")]
    MissingFilledText,

    /// Empty question submitted
    #[error("Question must not be empty")]
    EmptyQuestion,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// Background task panicked or was cancelled
    #[error("Task join error: {reason}")]
    TaskJoin { reason: String },
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors, process output) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::PdfNotFound { .. } => "PDF not found".to_string(),
            Error::InvalidPdf { .. } => "Invalid PDF file".to_string(),
            Error::UploadTooLarge { max_size, .. } => {
                format!("Upload exceeds maximum size of {} bytes", max_size)
            }
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::HttpClient(_) => "HTTP client error".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::Ocr { .. } => "OCR processing error".to_string(),
            Error::OcrTimeout { seconds } => format!("OCR timed out after {}s", seconds),
            Error::Render { .. } => "Failed to generate filled PDF".to_string(),
            Error::SessionNotFound { id } => format!("Session not found: {}", id),
            Error::MissingDocumentText
            | Error::MissingFilledText
            | Error::EmptyQuestion => self.to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::TaskJoin { .. } => "Internal error".to_string(),
        }
    }
}
