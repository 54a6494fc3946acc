//! StudyOwl Ingestion
//!
//! Turns uploaded files into something the notes generator can use:
//! - classify uploads by extension
//! - extract text from PDF, DOCX and PPTX documents
//! - chunk generated notes before embedding

pub mod chunker;
pub mod errors;
pub mod file_type;
pub mod office;
pub mod pdf;

pub use chunker::{chunk_by_sentences, chunk_markdown, chunk_notes, ChunkingStrategy};
pub use errors::IngestionError;
pub use file_type::{extension, media_mime_type, FileKind};

use tracing::info;

/// Extract plain text from a document upload
///
/// Only the XML-based Office formats are readable; legacy binary `.doc` and
/// `.ppt` files are rejected.
pub fn extract_text(kind: FileKind, extension: &str, bytes: &[u8]) -> Result<String, IngestionError> {
    let text = match (kind, extension) {
        (FileKind::Pdf, _) => pdf::extract_text_from_pdf(bytes)?,
        (FileKind::Word, "docx") => office::extract_text_from_docx(bytes)?,
        (FileKind::Slides, "pptx") => office::extract_text_from_pptx(bytes)?,
        _ => {
            return Err(IngestionError::UnsupportedFormat {
                extension: extension.to_string(),
            })
        }
    };

    if text.trim().is_empty() {
        return Err(IngestionError::EmptyDocument { kind: kind.as_str() });
    }

    info!(file_kind = %kind, chars = text.len(), "Extracted document text");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_office_formats_rejected() {
        assert!(matches!(
            extract_text(FileKind::Word, "doc", b"\xD0\xCF\x11\xE0"),
            Err(IngestionError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            extract_text(FileKind::Slides, "ppt", b"\xD0\xCF\x11\xE0"),
            Err(IngestionError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_media_is_not_text() {
        assert!(extract_text(FileKind::Image, "png", b"\x89PNG").is_err());
    }

    #[test]
    fn test_empty_docx_is_an_error() {
        let bytes = office::tests::archive(&[("word/document.xml", "<w:document><w:p></w:p></w:document>")]);
        assert!(matches!(
            extract_text(FileKind::Word, "docx", &bytes),
            Err(IngestionError::EmptyDocument { kind: "word" })
        ));
    }
}
