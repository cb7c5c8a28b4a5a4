//! Document formats, their plain-text views and structure-preserving
//! reconstruction.
//!
//! Every format is exposed through [`TextNodes`]: a document is a collection
//! of text-bearing nodes that can be read, redacted and written back before
//! the document is serialized again.

pub mod error;
pub mod extract;
pub mod reconstruct;
pub mod text;

#[cfg(feature = "ooxml")]
pub mod package;
#[cfg(feature = "ooxml")]
pub mod xml;

#[cfg(feature = "docx")]
pub mod docx;
#[cfg(feature = "pdf")]
pub mod pdf;
#[cfg(feature = "xlsx")]
pub mod xlsx;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use error::DocumentError;
pub use extract::extract_text;
pub use reconstruct::{mask_content, MaskedContent, ReconstructedArtifact, SourceDocument};
pub use text::{decode_text, FallbackEncoding, FlatText};

/// Upload format, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Xlsx,
    PlainText,
}

/// Structural topology the reconstructor works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    /// The whole document is one node.
    Flat,
    /// Paragraphs and table cells.
    Hierarchical,
    /// Sheets of cells.
    Grid,
}

impl DocumentFormat {
    pub fn from_filename(filename: &str) -> Self {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => DocumentFormat::Pdf,
            "docx" => DocumentFormat::Docx,
            "xlsx" => DocumentFormat::Xlsx,
            _ => DocumentFormat::PlainText,
        }
    }

    /// Shape used when rebuilding a file of this format. PDFs are never
    /// rebuilt, so they are flat.
    pub fn shape(&self) -> DocumentShape {
        match self {
            DocumentFormat::Docx => DocumentShape::Hierarchical,
            DocumentFormat::Xlsx => DocumentShape::Grid,
            DocumentFormat::Pdf | DocumentFormat::PlainText => DocumentShape::Flat,
        }
    }

    /// Cargo feature that provides support for this format.
    pub fn feature(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::PlainText => "default",
        }
    }

    pub fn is_supported(&self) -> bool {
        match self {
            DocumentFormat::Pdf => cfg!(feature = "pdf"),
            DocumentFormat::Docx => cfg!(feature = "docx"),
            DocumentFormat::Xlsx => cfg!(feature = "xlsx"),
            DocumentFormat::PlainText => true,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Docx => "DOCX",
            DocumentFormat::Xlsx => "Excel",
            DocumentFormat::PlainText => "text",
        };
        f.write_str(label)
    }
}

/// A collection of redactable text nodes owned by a parsed document.
///
/// Node indices are stable for the lifetime of the document; writing a node
/// never adds or removes nodes.
pub trait TextNodes {
    fn node_count(&self) -> usize;

    fn node_text(&self, index: usize) -> String;

    fn set_node_text(&mut self, index: usize, text: &str);
}

/// A parsed document that can be serialized back to its original format.
pub trait StructuredDocument: TextNodes + Sized {
    const FORMAT: DocumentFormat;

    fn parse(bytes: &[u8]) -> Result<Self, DocumentError>;

    /// Plain-text view used for review.
    fn plain_text(&self) -> String;

    fn to_bytes(&self) -> Result<Vec<u8>, DocumentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_filename() {
        assert_eq!(DocumentFormat::from_filename("report.PDF"), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_filename("letter.docx"), DocumentFormat::Docx);
        assert_eq!(DocumentFormat::from_filename("book.Xlsx"), DocumentFormat::Xlsx);
        assert_eq!(DocumentFormat::from_filename("notes.txt"), DocumentFormat::PlainText);
        assert_eq!(DocumentFormat::from_filename("archive.tar.gz"), DocumentFormat::PlainText);
        assert_eq!(DocumentFormat::from_filename("README"), DocumentFormat::PlainText);
    }

    #[test]
    fn test_shapes() {
        assert_eq!(DocumentFormat::Docx.shape(), DocumentShape::Hierarchical);
        assert_eq!(DocumentFormat::Xlsx.shape(), DocumentShape::Grid);
        assert_eq!(DocumentFormat::Pdf.shape(), DocumentShape::Flat);
        assert_eq!(DocumentFormat::PlainText.shape(), DocumentShape::Flat);
    }

    #[test]
    fn test_error_messages() {
        let err = DocumentError::malformed(DocumentFormat::Docx, "bad zip");
        assert_eq!(err.to_string(), "Error parsing DOCX: bad zip");

        let err = DocumentError::CapabilityUnavailable { format: DocumentFormat::Pdf };
        assert!(err.is_capability_unavailable());
        assert!(err.to_string().contains("`pdf` feature"));
    }
}
