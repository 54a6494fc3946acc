//! PDF text extraction
//!
//! Uses lopdf's text extraction per page, falling back to a scan of the
//! page content stream when the font encoding cannot be resolved.

use crate::errors::IngestionError;
use tracing::{debug, warn};

/// Extract text content from PDF bytes
pub fn extract_text_from_pdf(bytes: &[u8]) -> Result<String, IngestionError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| IngestionError::PdfParseError {
        message: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    debug!(page_count = pages.len(), "Extracting text from PDF");

    let mut text = String::new();
    for (page_num, page_id) in pages {
        let page_text = match doc.extract_text(&[page_num]) {
            Ok(t) if !t.trim().is_empty() => t,
            _ => match doc.get_page_content(page_id) {
                Ok(content) => extract_text_from_content(&content),
                Err(e) => {
                    warn!(page = page_num, error = %e, "Failed to read page content, skipping");
                    continue;
                }
            },
        };
        text.push_str(&page_text);
        text.push('\n');
    }

    let cleaned = clean_text(&text);
    if cleaned.is_empty() {
        return Err(IngestionError::EmptyDocument { kind: "PDF" });
    }

    debug!(
        original_len = text.len(),
        cleaned_len = cleaned.len(),
        "PDF text extraction complete"
    );
    Ok(cleaned)
}

/// Collect text shown between BT and ET operators
fn extract_text_from_content(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;

    for line in content_str.lines().map(str::trim) {
        match line {
            "BT" => in_text_block = true,
            "ET" => {
                in_text_block = false;
                text.push('\n');
            }
            _ if in_text_block => {
                if let Some(shown) = extract_text_from_operator(line) {
                    text.push_str(&shown);
                }
            }
            _ => {}
        }
    }

    text
}

/// Text from a `Tj`, `'`, `"` or `TJ` operator line
fn extract_text_from_operator(line: &str) -> Option<String> {
    if line.ends_with("TJ") {
        let mut result = String::new();
        let mut current = String::new();
        let mut in_paren = false;
        let mut escaped = false;

        for ch in line.chars() {
            match ch {
                _ if escaped => {
                    current.push('\\');
                    current.push(ch);
                    escaped = false;
                }
                '\\' if in_paren => escaped = true,
                '(' => in_paren = true,
                ')' => {
                    in_paren = false;
                    result.push_str(&decode_pdf_string(&current));
                    current.clear();
                }
                _ if in_paren => current.push(ch),
                _ => {}
            }
        }
        return (!result.is_empty()).then_some(result);
    }

    if line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"') {
        let start = line.find('(')?;
        let end = line.rfind(')')?;
        if start < end {
            return Some(decode_pdf_string(&line[start + 1..end]));
        }
    }

    None
}

/// Decode PDF string escapes
fn decode_pdf_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some(c) => result.push(c),
            None => {}
        }
    }

    result
}

/// Collapse runs of whitespace within lines and drop empty lines
fn clean_text(text: &str) -> String {
    text.replace('\u{FEFF}', "")
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    fn single_page_pdf(line: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_extracts_page_text() {
        let bytes = single_page_pdf("Photosynthesis converts light");
        let text = extract_text_from_pdf(&bytes).unwrap();
        assert!(text.contains("Photosynthesis converts light"), "got {:?}", text);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            extract_text_from_pdf(b"definitely not a pdf"),
            Err(IngestionError::PdfParseError { .. })
        ));
    }

    #[test]
    fn test_content_stream_fallback() {
        let content = b"BT\n/F1 12 Tf\n(Hello \\(world\\)) Tj\nET\nBT\n[(Sec) -20 (ond)] TJ\nET\n";
        let text = extract_text_from_content(content);
        assert_eq!(clean_text(&text), "Hello (world)\nSecond");
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("Hello   World\n\n  Test \u{FEFF}"), "Hello World\nTest");
    }

    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string("Hello\\nWorld"), "Hello\nWorld");
        assert_eq!(decode_pdf_string("Test\\(paren\\)"), "Test(paren)");
    }
}
