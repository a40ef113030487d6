//! Source resolution for uploaded PDF data

use crate::error::{Error, Result};
use crate::pdf::ensure_pdf_header;
use base64::Engine;
use std::path::Path;

/// Uploaded PDF bytes and a printable name for logs and responses
#[derive(Debug, Clone)]
pub struct UploadedPdf {
    pub data: Vec<u8>,
    pub source_name: String,
}

fn check_size(size: u64, max_bytes: u64) -> Result<()> {
    if size > max_bytes {
        return Err(Error::UploadTooLarge {
            size,
            max_size: max_bytes,
        });
    }
    Ok(())
}

/// Read a PDF from disk
pub fn resolve_path<P: AsRef<Path>>(path: P, max_bytes: u64) -> Result<UploadedPdf> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(Error::PdfNotFound {
            path: path.display().to_string(),
        });
    }

    check_size(std::fs::metadata(path)?.len(), max_bytes)?;
    let data = std::fs::read(path)?;
    ensure_pdf_header(&data)?;

    Ok(UploadedPdf {
        data,
        source_name: path.display().to_string(),
    })
}

/// Decode a base64 PDF payload
pub fn resolve_base64(base64_data: &str, max_bytes: u64) -> Result<UploadedPdf> {
    // Base64 inflates by 4/3, so reject oversized payloads before decoding
    check_size((base64_data.len() as u64 / 4) * 3, max_bytes)?;

    let data = base64::engine::general_purpose::STANDARD.decode(base64_data.trim())?;
    check_size(data.len() as u64, max_bytes)?;
    ensure_pdf_header(&data)?;

    Ok(UploadedPdf {
        data,
        source_name: "<base64>".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LIMIT: u64 = 1024;

    #[test]
    fn test_resolve_base64_not_pdf() {
        let result = resolve_base64("SGVsbG8gV29ybGQ=", LIMIT); // "Hello World"
        assert!(matches!(result, Err(Error::InvalidPdf { .. })));
    }

    #[test]
    fn test_resolve_base64_invalid_base64() {
        let result = resolve_base64("not valid base64!!!", LIMIT);
        assert!(matches!(result, Err(Error::Base64Decode(_))));
    }

    #[test]
    fn test_resolve_base64_pdf() {
        let resolved = resolve_base64("JVBERi0xLjQ=", LIMIT).unwrap(); // "%PDF-1.4"
        assert_eq!(resolved.data, b"%PDF-1.4");
        assert_eq!(resolved.source_name, "<base64>");
    }

    #[test]
    fn test_resolve_base64_too_large() {
        let payload = base64::engine::general_purpose::STANDARD.encode(vec![b'%'; 64]);
        let result = resolve_base64(&payload, 16);
        assert!(matches!(result, Err(Error::UploadTooLarge { .. })));
    }

    #[test]
    fn test_resolve_path_not_found() {
        let result = resolve_path("/nonexistent/path/file.pdf", LIMIT);
        assert!(matches!(result, Err(Error::PdfNotFound { .. })));
    }

    #[test]
    fn test_resolve_path_reads_pdf() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.7\n%%EOF").unwrap();

        let resolved = resolve_path(file.path(), LIMIT).unwrap();
        assert!(resolved.data.starts_with(b"%PDF"));
    }

    #[test]
    fn test_resolve_path_too_large() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[b'%'; 64]).unwrap();

        let result = resolve_path(file.path(), 16);
        assert!(matches!(result, Err(Error::UploadTooLarge { .. })));
    }
}
