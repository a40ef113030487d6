//! Scanned PDF → text

use crate::error::{Error, Result};
use crate::ocr::OcrEngine;
use crate::pdf::PageRasterizer;
use std::sync::Arc;

/// Runs OCR over every page of a PDF in page order
#[derive(Clone)]
pub struct TextExtractor {
    rasterizer: Arc<dyn PageRasterizer>,
    engine: Arc<dyn OcrEngine>,
}

impl TextExtractor {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>, engine: Arc<dyn OcrEngine>) -> Self {
        Self { rasterizer, engine }
    }

    /// Extract the text of every page, each followed by a newline.
    ///
    /// Rasterization runs on the blocking pool; pages are recognized in order.
    pub async fn extract(&self, data: Vec<u8>) -> Result<String> {
        let rasterizer = Arc::clone(&self.rasterizer);
        let images = tokio::task::spawn_blocking(move || rasterizer.rasterize(&data))
            .await
            .map_err(|e| Error::TaskJoin {
                reason: e.to_string(),
            })??;

        let mut text = String::new();
        for (index, image) in images.iter().enumerate() {
            let page_text = self.engine.recognize(image).await?;
            tracing::debug!(page = index + 1, chars = page_text.len(), "page recognized");
            text.push_str(&page_text);
            text.push('\n');
        }

        Ok(text)
    }
}

impl std::fmt::Debug for TextExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextExtractor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::DynamicImage;
    use parking_lot::Mutex;

    struct FixedPages(usize);

    impl PageRasterizer for FixedPages {
        fn rasterize(&self, _data: &[u8]) -> Result<Vec<DynamicImage>> {
            // Encode the page index in the width so the engine can tell pages apart
            Ok((1..=self.0)
                .map(|i| DynamicImage::new_luma8(i as u32, 1))
                .collect())
        }
    }

    struct BrokenRasterizer;

    impl PageRasterizer for BrokenRasterizer {
        fn rasterize(&self, _data: &[u8]) -> Result<Vec<DynamicImage>> {
            Err(Error::Pdfium {
                reason: "corrupt xref".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct PageNumberEngine {
        seen: Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl OcrEngine for PageNumberEngine {
        async fn recognize(&self, image: &DynamicImage) -> Result<String> {
            self.seen.lock().push(image.width());
            Ok(format!("page {}", image.width()))
        }
    }

    struct FailOnSecondPage;

    #[async_trait]
    impl OcrEngine for FailOnSecondPage {
        async fn recognize(&self, image: &DynamicImage) -> Result<String> {
            if image.width() == 2 {
                return Err(Error::Ocr {
                    reason: "engine crashed".to_string(),
                });
            }
            Ok("ok".to_string())
        }
    }

    #[tokio::test]
    async fn test_pages_concatenated_in_order() {
        let engine = Arc::new(PageNumberEngine::default());
        let extractor = TextExtractor::new(Arc::new(FixedPages(3)), engine.clone());

        let text = extractor.extract(b"%PDF-1.5".to_vec()).await.unwrap();
        assert_eq!(text, "page 1\npage 2\npage 3\n");
        assert_eq!(*engine.seen.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_zero_pages_yield_empty_text() {
        let extractor =
            TextExtractor::new(Arc::new(FixedPages(0)), Arc::new(PageNumberEngine::default()));
        assert_eq!(extractor.extract(b"%PDF-1.5".to_vec()).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_rasterizer_failure_propagates() {
        let extractor = TextExtractor::new(
            Arc::new(BrokenRasterizer),
            Arc::new(PageNumberEngine::default()),
        );
        assert!(matches!(
            extractor.extract(b"%PDF-1.5".to_vec()).await,
            Err(Error::Pdfium { .. })
        ));
    }

    #[tokio::test]
    async fn test_ocr_failure_aborts_extraction() {
        let extractor = TextExtractor::new(Arc::new(FixedPages(3)), Arc::new(FailOnSecondPage));
        assert!(matches!(
            extractor.extract(b"%PDF-1.5".to_vec()).await,
            Err(Error::Ocr { .. })
        ));
    }
}
