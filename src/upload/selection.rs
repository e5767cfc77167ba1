use std::fmt;
use std::path::Path;
use std::sync::Arc;

use super::format::{
    guess_mime, is_allowed_extension, is_pdf_name, preview_kind_for_mime, sanitize_filename,
    sniff_mime, MAX_FILE_SIZE, OCTET_STREAM,
};
use super::UploadError;
use crate::models::{FileKind, PreviewKind};

/// A file chosen by the user, held in memory until upload.
#[derive(Clone, PartialEq, Eq)]
pub struct PickedFile {
    name: String,
    declared_mime: Option<String>,
    bytes: Arc<Vec<u8>>,
}

impl fmt::Debug for PickedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PickedFile")
            .field("name", &self.name)
            .field("declared_mime", &self.declared_mime)
            .field("size", &self.bytes.len())
            .finish()
    }
}

impl PickedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: sanitize_filename(&name.into()),
            declared_mime: None,
            bytes: Arc::new(bytes),
        }
    }

    /// MIME type reported by the picker, if any.
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        let mime = mime.into();
        self.declared_mime = (!mime.trim().is_empty()).then(|| mime.trim().to_string());
        self
    }

    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        let read_error = |e: std::io::Error| UploadError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        };
        let size = std::fs::metadata(path).map_err(read_error)?.len();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        if size > MAX_FILE_SIZE {
            return Err(UploadError::TooLarge { name, size });
        }
        let bytes = std::fs::read(path).map_err(read_error)?;
        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_pdf(&self) -> bool {
        is_pdf_name(&self.name)
    }

    /// Declared MIME, else sniffed from magic bytes, else guessed from the name.
    pub fn mime(&self) -> String {
        if let Some(declared) = self.declared_mime.as_deref().filter(|m| *m != OCTET_STREAM) {
            return declared.to_string();
        }
        match sniff_mime(&self.bytes) {
            Some(sniffed) => sniffed.to_string(),
            None => guess_mime(&self.name),
        }
    }

    pub fn preview_kind(&self) -> Option<PreviewKind> {
        preview_kind_for_mime(&self.mime())
    }
}

/// Validate a selection and derive its file kind.
///
/// Checks run in order: empty, unsupported extension, size, more than one
/// PDF, PDF mixed with images.
pub fn validate_selection(files: &[PickedFile]) -> Result<FileKind, UploadError> {
    if files.is_empty() {
        return Err(UploadError::NoFiles);
    }
    if let Some(bad) = files.iter().find(|f| !is_allowed_extension(f.name())) {
        return Err(UploadError::UnsupportedExtension(bad.name().to_string()));
    }
    if let Some(big) = files.iter().find(|f| f.size() > MAX_FILE_SIZE) {
        return Err(UploadError::TooLarge {
            name: big.name().to_string(),
            size: big.size(),
        });
    }
    let pdfs = files.iter().filter(|f| f.is_pdf()).count();
    if pdfs > 1 {
        return Err(UploadError::MultiplePdfs);
    }
    if pdfs == 1 && files.len() > 1 {
        return Err(UploadError::MixedPdfAndImages);
    }
    Ok(if pdfs == 1 { FileKind::Pdf } else { FileKind::Images })
}
