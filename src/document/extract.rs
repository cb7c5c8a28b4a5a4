use tracing::{debug, instrument};

use super::text::{FallbackEncoding, FlatText};
use super::{DocumentError, DocumentFormat};

/// Produces the plain-text view of an uploaded file for review.
///
/// # Arguments
/// * `format` - Format chosen from the upload's filename
/// * `bytes` - Raw upload content
/// * `fallback` - Encoding tried when a text upload is not UTF-8
///
/// # Returns
/// * `Ok(text)` - Extracted text; empty when a text upload cannot be decoded
/// * `Err(DocumentError)` - The format is compiled out or its parser failed
#[instrument(skip(bytes), fields(len = bytes.len()))]
pub fn extract_text(format: DocumentFormat, bytes: &[u8], fallback: FallbackEncoding) -> Result<String, DocumentError> {
    let text = match format {
        DocumentFormat::Pdf => extract_pdf(bytes)?,
        DocumentFormat::Docx => extract_docx(bytes)?,
        DocumentFormat::Xlsx => extract_xlsx(bytes)?,
        DocumentFormat::PlainText => FlatText::decode(bytes, fallback).into_string(),
    };
    debug!("Extracted {} characters of {} text", text.len(), format);
    Ok(text)
}

#[cfg(feature = "pdf")]
fn extract_pdf(bytes: &[u8]) -> Result<String, DocumentError> {
    super::pdf::extract(bytes)
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(_bytes: &[u8]) -> Result<String, DocumentError> {
    Err(DocumentError::CapabilityUnavailable {
        format: DocumentFormat::Pdf,
    })
}

#[cfg(feature = "docx")]
fn extract_docx(bytes: &[u8]) -> Result<String, DocumentError> {
    use super::StructuredDocument;
    Ok(super::docx::DocxDocument::parse(bytes)?.plain_text())
}

#[cfg(not(feature = "docx"))]
fn extract_docx(_bytes: &[u8]) -> Result<String, DocumentError> {
    Err(DocumentError::CapabilityUnavailable {
        format: DocumentFormat::Docx,
    })
}

#[cfg(feature = "xlsx")]
fn extract_xlsx(bytes: &[u8]) -> Result<String, DocumentError> {
    use super::StructuredDocument;
    Ok(super::xlsx::Workbook::parse(bytes)?.plain_text())
}

#[cfg(not(feature = "xlsx"))]
fn extract_xlsx(_bytes: &[u8]) -> Result<String, DocumentError> {
    Err(DocumentError::CapabilityUnavailable {
        format: DocumentFormat::Xlsx,
    })
}
