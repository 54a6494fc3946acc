//! Text extraction from Office Open XML documents (DOCX, PPTX)

use crate::errors::IngestionError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fmt::Display;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;

/// Element names for one Office XML vocabulary
struct TextTags {
    paragraph: &'static [u8],
    text: &'static [u8],
}

const WORDPROCESSING: TextTags = TextTags {
    paragraph: b"w:p",
    text: b"w:t",
};

const DRAWING: TextTags = TextTags {
    paragraph: b"a:p",
    text: b"a:t",
};

fn parse_error(e: impl Display) -> IngestionError {
    IngestionError::OfficeParseError {
        message: e.to_string(),
    }
}

fn open(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>, IngestionError> {
    Ok(ZipArchive::new(Cursor::new(bytes))?)
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<String, IngestionError> {
    let mut entry = archive.by_name(name)?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    Ok(xml)
}

/// One line per paragraph; runs inside a paragraph are concatenated
fn paragraphs(xml: &str, tags: &TextTags) -> Result<Vec<String>, IngestionError> {
    let mut reader = Reader::from_str(xml);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    let mut flush = |current: &mut String| {
        if !current.trim().is_empty() {
            lines.push(std::mem::take(current));
        }
        current.clear();
    };

    loop {
        match reader.read_event().map_err(parse_error)? {
            Event::Start(e) if e.name().as_ref() == tags.text => in_text = true,
            Event::End(e) => {
                let name = e.name();
                if name.as_ref() == tags.text {
                    in_text = false;
                } else if name.as_ref() == tags.paragraph {
                    flush(&mut current);
                }
            }
            Event::Empty(e) if e.name().as_ref() == tags.paragraph => flush(&mut current),
            Event::Text(t) if in_text => current.push_str(&t.unescape().map_err(parse_error)?),
            Event::CData(c) if in_text => current.push_str(&String::from_utf8_lossy(&c)),
            Event::Eof => break,
            _ => {}
        }
    }
    flush(&mut current);

    Ok(lines)
}

/// Paragraph text of `word/document.xml`
pub fn extract_text_from_docx(bytes: &[u8]) -> Result<String, IngestionError> {
    let mut archive = open(bytes)?;
    let xml = read_entry(&mut archive, "word/document.xml")?;

    let lines = paragraphs(&xml, &WORDPROCESSING)?;
    debug!(paragraphs = lines.len(), "Extracted Word document text");
    Ok(lines.join("\n"))
}

/// Slide number from `ppt/slides/slideN.xml`
fn slide_number(name: &str) -> Option<u32> {
    name.strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

/// Text of every slide, in slide order
pub fn extract_text_from_pptx(bytes: &[u8]) -> Result<String, IngestionError> {
    let mut archive = open(bytes)?;
    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| slide_number(name).map(|n| (n, name.to_string())))
        .collect();
    slides.sort_by_key(|(n, _)| *n);

    let mut lines = Vec::new();
    for (_, name) in &slides {
        let xml = read_entry(&mut archive, name)?;
        lines.extend(paragraphs(&xml, &DRAWING)?);
    }

    debug!(slides = slides.len(), lines = lines.len(), "Extracted slide text");
    Ok(lines.join("\n"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    pub(crate) fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_docx_paragraphs() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>Cells &amp; tissues</w:t></w:r></w:p>
            <w:p><w:r><w:t xml:space="preserve">Mitosis </w:t></w:r><w:r><w:t>splits cells.</w:t></w:r></w:p>
            <w:p></w:p>
        </w:body></w:document>"#;
        let bytes = archive(&[("word/document.xml", xml)]);

        let text = extract_text_from_docx(&bytes).unwrap();
        assert_eq!(text, "Cells & tissues\nMitosis splits cells.");
    }

    #[test]
    fn test_docx_character_references_decoded() {
        let xml = r#"<w:document><w:body>
            <w:p><w:r><w:t>don&#8217;t &#x3C;tag&#x3E;</w:t></w:r></w:p>
            <w:p><w:r><w:t>Na<!-- split -->Cl</w:t></w:r><w:r><w:t>&quot;salt&quot;</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let bytes = archive(&[("word/document.xml", xml)]);

        let text = extract_text_from_docx(&bytes).unwrap();
        assert_eq!(text, "don\u{2019}t <tag>\nNaCl\"salt\"");
    }

    #[test]
    fn test_pptx_cdata_and_markup_outside_text_runs() {
        let xml = r#"<p:sld><p:cSld><p:spTree>
            <a:p><a:r><a:rPr lang="en-GB"/><a:t><![CDATA[x < y & y > z]]></a:t></a:r></a:p>
            <a:p/>
            <a:p><a:r><a:t>Transitive</a:t></a:r><a:fld><a:t> law</a:t></a:fld></a:p>
        </p:spTree></p:cSld></p:sld>"#;
        let bytes = archive(&[("ppt/slides/slide1.xml", xml)]);

        let text = extract_text_from_pptx(&bytes).unwrap();
        assert_eq!(text, "x < y & y > z\nTransitive law");
    }

    #[test]
    fn test_malformed_xml_rejected() {
        let bytes = archive(&[("word/document.xml", "<w:document><w:p><w:t>open</w:p></w:document>")]);
        assert!(matches!(
            extract_text_from_docx(&bytes),
            Err(IngestionError::OfficeParseError { .. })
        ));
    }

    #[test]
    fn test_pptx_slides_in_numeric_order() {
        let slide = |t: &str| format!("<p:sld><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:sld>", t);
        let (s1, s2, s10) = (slide("First"), slide("Second"), slide("Tenth"));
        let bytes = archive(&[
            ("ppt/slides/slide10.xml", s10.as_str()),
            ("ppt/slides/slide2.xml", s2.as_str()),
            ("ppt/slides/slide1.xml", s1.as_str()),
            ("ppt/slides/_rels/slide1.xml.rels", "<Relationships/>"),
        ]);

        let text = extract_text_from_pptx(&bytes).unwrap();
        assert_eq!(text, "First\nSecond\nTenth");
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(
            extract_text_from_docx(b"plain text"),
            Err(IngestionError::OfficeParseError { .. })
        ));
    }

    #[test]
    fn test_docx_without_document_part() {
        let bytes = archive(&[("other.xml", "<x/>")]);
        assert!(extract_text_from_docx(&bytes).is_err());
    }
}
