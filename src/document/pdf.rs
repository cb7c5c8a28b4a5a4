use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

use super::{DocumentError, DocumentFormat};

/// Extracts the text layer of a PDF. Read-only: PDFs are never rebuilt.
///
/// The parser panics on some damaged files; a panic is reported as
/// malformed input like any other parse failure.
pub fn extract(bytes: &[u8]) -> Result<String, DocumentError> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)));

    match outcome {
        Ok(Ok(text)) => {
            debug!("Extracted {} characters from PDF", text.len());
            Ok(text)
        }
        Ok(Err(e)) => {
            warn!("PDF extraction failed: {}", e);
            Err(DocumentError::malformed(DocumentFormat::Pdf, e.to_string()))
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "parser panicked".to_string());
            warn!("PDF parser panicked: {}", message);
            Err(DocumentError::malformed(DocumentFormat::Pdf, message))
        }
    }
}
