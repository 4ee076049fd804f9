//! Plain-text extraction for uploaded documents.
//!
//! Only PDF and plain text are accepted; the format is chosen from the
//! file extension (case-insensitive). The caller supplies raw bytes, this
//! module returns UTF-8 text ready for [`chunk_document`](crate::chunk::chunk_document).

use std::path::Path;

use crate::error::{RagError, Result};

/// Document formats accepted for ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    /// Classify by extension; `None` for anything other than `.pdf` / `.txt`.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "txt" => Some(DocumentKind::Text),
            _ => None,
        }
    }
}

/// Extract text from `bytes` according to `filename`'s extension.
///
/// Text files are decoded lossily: invalid UTF-8 sequences become U+FFFD
/// rather than failing the whole document.
pub fn extract_text(filename: &str, bytes: &[u8]) -> Result<String> {
    match DocumentKind::from_filename(filename) {
        Some(DocumentKind::Pdf) => extract_pdf(bytes),
        Some(DocumentKind::Text) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        None => Err(RagError::Extract(
            "only PDF or TXT files supported".to_string(),
        )),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| RagError::Extract(format!("PDF extraction failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_extension_returns_error() {
        let err = extract_text("slides.pptx", b"foo").unwrap_err();
        assert!(matches!(err, RagError::Extract(_)));
        assert!(err.to_string().contains("only PDF or TXT"));
    }

    #[test]
    fn missing_extension_returns_error() {
        assert!(extract_text("README", b"foo").is_err());
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text("broken.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, RagError::Extract(_)));
    }

    #[test]
    fn text_is_decoded_lossily() {
        let text = extract_text("notes.TXT", b"caf\xc3\xa9 \xff ok").unwrap();
        assert_eq!(text, "café \u{FFFD} ok");
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert_eq!(DocumentKind::from_filename("A.PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_filename("dir/b.Txt"), Some(DocumentKind::Text));
        assert_eq!(DocumentKind::from_filename("c.md"), None);
    }
}
