//! Error types for inkpress operations.

use thiserror::Error;

/// Errors that can occur while reading a book or producing a container.
///
/// Recoverable degradations (missing fonts, undecodable images, absent
/// hyphenation dictionaries) are not errors; they surface as [`Warning`]s
/// on the pipeline and the run continues.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),

    #[error("Invalid typography config: {0}")]
    InvalidConfig(String),

    #[error("Layout overflow in chapter '{chapter}': {detail}")]
    LayoutOverflow { chapter: String, detail: String },

    #[error("Container encoding failed: {0}")]
    Encode(String),

    #[error("Invalid XTC container: {0}")]
    InvalidContainer(String),

    #[error("Page {0} out of range")]
    PageOutOfRange(usize),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Category of a recoverable degradation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Image data could not be decoded; a blank placeholder was used.
    BadImage,
    /// Requested font could not be loaded; the built-in font was used.
    BadFont,
    /// No hyphenation dictionary for the book's language; text left as-is.
    NoHyphenDict,
}

/// A recoverable problem attached to a pipeline result.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub detail: String,
}

impl Warning {
    pub fn new(kind: WarningKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            WarningKind::BadImage => write!(f, "image degraded: {}", self.detail),
            WarningKind::BadFont => write!(f, "font fallback: {}", self.detail),
            WarningKind::NoHyphenDict => write!(f, "hyphenation skipped: {}", self.detail),
        }
    }
}
