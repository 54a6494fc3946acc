//! Ingestion error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Unknown file type: {file_name}")]
    UnknownFileType { file_name: String },

    #[error("Unsupported document format: .{extension}")]
    UnsupportedFormat { extension: String },

    #[error("PDF parse error: {message}")]
    PdfParseError { message: String },

    #[error("Office document parse error: {message}")]
    OfficeParseError { message: String },

    #[error("No text content could be extracted from the {kind} file")]
    EmptyDocument { kind: &'static str },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for IngestionError {
    fn from(e: zip::result::ZipError) -> Self {
        IngestionError::OfficeParseError {
            message: e.to_string(),
        }
    }
}
