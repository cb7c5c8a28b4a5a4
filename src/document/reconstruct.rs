use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::text::FlatText;
use super::{DocumentError, DocumentFormat, DocumentShape, StructuredDocument, TextNodes};
use crate::data_classifier::ActiveCategories;
use crate::redaction::{redact, ExemptionSet, RedactionCounters};

const OUTPUT_PREFIX: &str = "masked_";

/// Redacted file ready for one-time download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconstructedArtifact {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub filename: String,
}

impl ReconstructedArtifact {
    pub fn content_type(&self) -> &'static str {
        match DocumentFormat::from_filename(&self.filename) {
            DocumentFormat::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            DocumentFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::PlainText => "text/plain; charset=utf-8",
        }
    }
}

/// The uploaded file a masking pass rebuilds.
#[derive(Debug, Clone, Copy)]
pub struct SourceDocument<'a> {
    pub bytes: &'a [u8],
    pub filename: &'a str,
}

/// Result of a commit: the redacted review text, its counters and, when a
/// source file was given, the rebuilt artifact.
#[derive(Debug, Clone)]
pub struct MaskedContent {
    pub text: String,
    /// Counted on `text` only; redactions written into the file are not
    /// included.
    pub stats: RedactionCounters,
    pub artifact: Option<ReconstructedArtifact>,
    /// Recoverable problems met while rebuilding the file.
    pub warnings: Vec<DocumentError>,
}

/// Redacts the review text and rebuilds the source file, if any.
///
/// # Arguments
/// * `text` - Plain text the reviewer confirmed
/// * `source` - Original upload; its extension picks the rebuild strategy
/// * `active` - Categories to redact
/// * `exemptions` - Literal values left as they are
///
/// # Returns
/// * `MaskedContent` - The text result is always present. A rebuild failure
///   leaves `artifact` empty and is reported in `warnings`.
#[instrument(skip_all, fields(filename = source.map(|s| s.filename)))]
pub fn mask_content(
    text: &str,
    source: Option<SourceDocument<'_>>,
    active: &ActiveCategories,
    exemptions: &ExemptionSet,
) -> MaskedContent {
    let mut stats = RedactionCounters::new();
    let masked = redact(text, active, exemptions, &mut stats);
    let mut warnings = Vec::new();

    let artifact = match source.filter(|s| !s.bytes.is_empty() && !s.filename.is_empty()) {
        Some(source) => match reconstruct(source, &masked, active, exemptions) {
            Ok(artifact) => Some(artifact),
            Err(e) if e.is_capability_unavailable() => {
                warn!("{}; falling back to plain text", e);
                warnings.push(e);
                Some(flat_artifact(source.filename, &masked))
            }
            Err(e) => {
                warn!("Reconstruction of {} abandoned: {}", source.filename, e);
                warnings.push(e);
                None
            }
        },
        None => None,
    };

    info!(
        "Masked text: {} redaction(s), artifact: {}",
        stats.total,
        artifact.as_ref().map_or("none", |a| a.filename.as_str())
    );

    MaskedContent {
        text: masked,
        stats,
        artifact,
        warnings,
    }
}

fn reconstruct(
    source: SourceDocument<'_>,
    masked: &str,
    active: &ActiveCategories,
    exemptions: &ExemptionSet,
) -> Result<ReconstructedArtifact, DocumentError> {
    let format = DocumentFormat::from_filename(source.filename);
    let bytes = match format.shape() {
        DocumentShape::Flat => return Ok(flat_artifact(source.filename, masked)),
        DocumentShape::Hierarchical => rebuild_docx(source.bytes, active, exemptions)?,
        DocumentShape::Grid => rebuild_xlsx(source.bytes, active, exemptions)?,
    };

    Ok(ReconstructedArtifact {
        bytes,
        filename: structured_output_name(source.filename),
    })
}

fn flat_artifact(filename: &str, masked: &str) -> ReconstructedArtifact {
    ReconstructedArtifact {
        bytes: FlatText::new(masked).into_bytes(),
        filename: flat_output_name(filename),
    }
}

/// Redacts every node of `document` in place. Only nodes whose text
/// changes are written back.
///
/// Returns the number of nodes rewritten.
pub fn redact_nodes<D: TextNodes + ?Sized>(
    document: &mut D,
    active: &ActiveCategories,
    exemptions: &ExemptionSet,
    counters: &mut RedactionCounters,
) -> usize {
    let mut rewritten = 0;
    for index in 0..document.node_count() {
        let original = document.node_text(index);
        let masked = redact(&original, active, exemptions, counters);
        if masked != original {
            document.set_node_text(index, &masked);
            rewritten += 1;
        }
    }
    rewritten
}

#[cfg(feature = "ooxml")]
fn rebuild<D: StructuredDocument>(
    bytes: &[u8],
    active: &ActiveCategories,
    exemptions: &ExemptionSet,
) -> Result<Vec<u8>, DocumentError> {
    let mut document = D::parse(bytes)?;
    let mut discarded = RedactionCounters::new();
    let rewritten = redact_nodes(&mut document, active, exemptions, &mut discarded);
    debug!(
        "Rewrote {} of {} {} node(s), {} redaction(s) in file",
        rewritten,
        document.node_count(),
        D::FORMAT,
        discarded.total
    );
    document.to_bytes()
}

#[cfg(feature = "docx")]
fn rebuild_docx(bytes: &[u8], active: &ActiveCategories, exemptions: &ExemptionSet) -> Result<Vec<u8>, DocumentError> {
    rebuild::<super::docx::DocxDocument>(bytes, active, exemptions)
}

#[cfg(not(feature = "docx"))]
fn rebuild_docx(_bytes: &[u8], _active: &ActiveCategories, _exemptions: &ExemptionSet) -> Result<Vec<u8>, DocumentError> {
    Err(DocumentError::CapabilityUnavailable {
        format: DocumentFormat::Docx,
    })
}

#[cfg(feature = "xlsx")]
fn rebuild_xlsx(bytes: &[u8], active: &ActiveCategories, exemptions: &ExemptionSet) -> Result<Vec<u8>, DocumentError> {
    rebuild::<super::xlsx::Workbook>(bytes, active, exemptions)
}

#[cfg(not(feature = "xlsx"))]
fn rebuild_xlsx(_bytes: &[u8], _active: &ActiveCategories, _exemptions: &ExemptionSet) -> Result<Vec<u8>, DocumentError> {
    Err(DocumentError::CapabilityUnavailable {
        format: DocumentFormat::Xlsx,
    })
}

fn safe_name(filename: &str) -> String {
    let name = sanitize_filename::sanitize(filename);
    if name.is_empty() {
        "document".to_string()
    } else {
        name
    }
}

/// `masked_<name>` for rebuilt docx and xlsx files.
pub fn structured_output_name(filename: &str) -> String {
    format!("{}{}", OUTPUT_PREFIX, safe_name(filename))
}

/// `masked_<name>.txt`, without doubling an existing `.txt` extension.
pub fn flat_output_name(filename: &str) -> String {
    let name = safe_name(filename);
    if name.to_ascii_lowercase().ends_with(".txt") {
        format!("{}{}", OUTPUT_PREFIX, name)
    } else {
        format!("{}{}.txt", OUTPUT_PREFIX, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_classifier::SensitiveDataType;

    fn no_exemptions() -> ExemptionSet {
        ExemptionSet::new()
    }

    #[test]
    fn test_text_only() {
        let out = mask_content(
            "Contact bob@ex.com or 212-555-0199",
            None,
            &ActiveCategories::all(),
            &no_exemptions(),
        );
        assert_eq!(out.text, "Contact ******@***.** or [PHONE-REDACTED]");
        assert_eq!(out.stats.total, 2);
        assert!(out.artifact.is_none());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_plain_text_source_gets_txt_artifact() {
        let source = SourceDocument {
            bytes: b"SSN 123-45-6789",
            filename: "notes.txt",
        };
        let out = mask_content("SSN 123-45-6789", Some(source), &ActiveCategories::all(), &no_exemptions());
        let artifact = out.artifact.unwrap();
        assert_eq!(artifact.filename, "masked_notes.txt");
        assert_eq!(artifact.bytes, b"SSN ***-**-****".to_vec());
        assert_eq!(artifact.content_type(), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_pdf_source_becomes_text() {
        let source = SourceDocument {
            bytes: b"%PDF-1.4",
            filename: "scan.pdf",
        };
        let out = mask_content("call 212-555-0199", Some(source), &ActiveCategories::all(), &no_exemptions());
        let artifact = out.artifact.unwrap();
        assert_eq!(artifact.filename, "masked_scan.pdf.txt");
        assert_eq!(String::from_utf8(artifact.bytes).unwrap(), "call [PHONE-REDACTED]");
    }

    #[test]
    fn test_broken_docx_keeps_text_result() {
        let source = SourceDocument {
            bytes: b"definitely not a zip",
            filename: "letter.docx",
        };
        let out = mask_content("bob@ex.com", Some(source), &ActiveCategories::all(), &no_exemptions());
        assert_eq!(out.text, "******@***.**");
        assert_eq!(out.stats.email, 1);
        if cfg!(feature = "docx") {
            assert!(out.artifact.is_none());
            assert!(matches!(out.warnings[0], DocumentError::Malformed { .. }));
        } else {
            assert_eq!(out.artifact.unwrap().filename, "masked_letter.docx.txt");
            assert!(out.warnings[0].is_capability_unavailable());
        }
    }

    #[test]
    fn test_empty_source_is_ignored() {
        let source = SourceDocument {
            bytes: b"",
            filename: "empty.docx",
        };
        let out = mask_content("nothing here", Some(source), &ActiveCategories::all(), &no_exemptions());
        assert!(out.artifact.is_none());
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_redact_nodes_writes_changed_nodes_only() {
        let mut doc = FlatText::new("card 4111 1111 1111 1111");
        let mut counters = RedactionCounters::new();
        let active: ActiveCategories = [SensitiveDataType::CreditCard].into_iter().collect();
        assert_eq!(redact_nodes(&mut doc, &active, &no_exemptions(), &mut counters), 1);
        assert_eq!(doc.node_text(0), "card [CC-REDACTED]");
        assert_eq!(counters.credit_card, 1);

        let mut untouched = FlatText::new("nothing");
        assert_eq!(redact_nodes(&mut untouched, &active, &no_exemptions(), &mut counters), 0);
    }

    #[test]
    fn test_output_names() {
        assert_eq!(structured_output_name("report.docx"), "masked_report.docx");
        assert_eq!(flat_output_name("data.csv"), "masked_data.csv.txt");
        assert_eq!(flat_output_name("NOTES.TXT"), "masked_NOTES.TXT");
        assert_eq!(structured_output_name("dir/report.xlsx"), "masked_dirreport.xlsx");
    }
}
