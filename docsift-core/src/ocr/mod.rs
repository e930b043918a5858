//! OCR stage: turn an image or PDF into raw text.
//!
//! [`OcrEngine`] is the seam between the pipeline and the recognizer.
//! The default engine, [`tesseract::TesseractEngine`], shells out to the
//! `tesseract` and `pdftoppm` binaries.

pub mod preprocess;
pub mod tesseract;

use std::path::Path;

use crate::error::OcrError;
use crate::types::DocumentKind;

/// A text recognizer for the two supported document families.
#[async_trait::async_trait]
pub trait OcrEngine: Send + Sync + std::fmt::Debug {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Recognize a single image file.
    async fn recognize_image(&self, path: &Path) -> Result<String, OcrError>;

    /// Recognize every page of a PDF, in page order.
    async fn recognize_pdf(&self, path: &Path) -> Result<String, OcrError>;
}

/// Dispatch to the right recognizer for `kind`.
pub async fn extract_text(
    engine: &dyn OcrEngine,
    path: &Path,
    kind: DocumentKind,
) -> Result<String, OcrError> {
    match kind {
        DocumentKind::Image => engine.recognize_image(path).await,
        DocumentKind::Pdf => engine.recognize_pdf(path).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed;

    #[async_trait::async_trait]
    impl OcrEngine for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn recognize_image(&self, _path: &Path) -> Result<String, OcrError> {
            Ok("image text".into())
        }

        async fn recognize_pdf(&self, _path: &Path) -> Result<String, OcrError> {
            Ok("pdf text".into())
        }
    }

    #[tokio::test]
    async fn dispatch_by_kind() {
        let path = Path::new("x");
        assert_eq!(
            extract_text(&Fixed, path, DocumentKind::Image).await.unwrap(),
            "image text"
        );
        assert_eq!(
            extract_text(&Fixed, path, DocumentKind::Pdf).await.unwrap(),
            "pdf text"
        );
    }
}
