//! Upload classification by file extension

use crate::errors::IngestionError;
use std::fmt;
use std::path::Path;

/// What an uploaded file is, decided from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Word,
    Slides,
    Video,
    Image,
}

impl FileKind {
    /// Classify a file name; the extension is matched case-insensitively
    pub fn from_file_name(file_name: &str) -> Result<Self, IngestionError> {
        let kind = match extension(file_name).as_deref() {
            Some("pdf") => FileKind::Pdf,
            Some("docx" | "doc") => FileKind::Word,
            Some("pptx" | "ppt") => FileKind::Slides,
            Some("mp4" | "mov" | "avi") => FileKind::Video,
            Some("jpg" | "jpeg" | "png") => FileKind::Image,
            _ => {
                return Err(IngestionError::UnknownFileType {
                    file_name: file_name.to_string(),
                })
            }
        };
        Ok(kind)
    }

    /// Images and videos go to the generative file store instead of text extraction
    pub fn is_media(&self) -> bool {
        matches!(self, FileKind::Video | FileKind::Image)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Word => "word",
            FileKind::Slides => "slides",
            FileKind::Video => "video",
            FileKind::Image => "image",
        }
    }

    /// Name used in the notes prompt ("summarizing the content of a {..} file")
    pub fn content_label(&self) -> &'static str {
        match self {
            FileKind::Pdf => "PDF document",
            FileKind::Word => "Word document",
            FileKind::Slides => "presentation slides",
            FileKind::Video => "video",
            FileKind::Image => "image",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased extension without the dot
pub fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// MIME type for media uploads
pub fn media_mime_type(extension: &str) -> Option<&'static str> {
    match extension {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "mp4" => Some("video/mp4"),
        "mov" => Some("video/quicktime"),
        "avi" => Some("video/x-msvideo"),
        _ => None,
    }
}
