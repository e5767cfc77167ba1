pub mod format;
pub mod preview;
pub mod selection;

pub use preview::{ObjectUrl, PreviewItem, Previewer};
pub use selection::{validate_selection, PickedFile};

use thiserror::Error;

use crate::messages::Message;
use crate::models::FileKind;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("No file selected")]
    NoFiles,

    #[error("Unsupported file type: {0}")]
    UnsupportedExtension(String),

    #[error("Only one PDF may be uploaded at a time")]
    MultiplePdfs,

    #[error("PDF and images cannot be mixed in one upload")]
    MixedPdfAndImages,

    #[error("Selected files are {detected}, but the file kind is set to {declared}")]
    KindMismatch { declared: FileKind, detected: FileKind },

    #[error("File too large: {name} ({size} bytes)")]
    TooLarge { name: String, size: u64 },

    #[error("Cannot read {path}: {reason}")]
    Read { path: String, reason: String },
}

impl UploadError {
    /// Banner text key for this error.
    pub fn message(&self) -> Message {
        match self {
            Self::NoFiles => Message::NoFiles,
            Self::UnsupportedExtension(_) => Message::UnsupportedFile,
            Self::MultiplePdfs => Message::MultiplePdfs,
            Self::MixedPdfAndImages => Message::MixedPdfAndImages,
            Self::KindMismatch { .. } => Message::KindMismatch,
            Self::TooLarge { .. } => Message::FileTooLarge,
            Self::Read { .. } => Message::ReadFailed,
        }
    }
}
