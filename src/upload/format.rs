use std::path::Path;

use crate::models::PreviewKind;

/// Extensions accepted by the upload form (lowercase, without the dot).
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024; // 100MB

pub const PDF_MIME: &str = "application/pdf";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Lowercased extension of a file name.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

pub fn is_allowed_extension(name: &str) -> bool {
    extension_of(name).is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_pdf_name(name: &str) -> bool {
    extension_of(name).as_deref() == Some("pdf")
}

/// Detect MIME type from magic bytes (not the file extension).
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => Some(PDF_MIME),
        // JPEG: starts with FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: starts with 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // TIFF: little-endian (49 49 2A 00) or big-endian (4D 4D 00 2A)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Some("image/tiff"),
        // HEIC/HEIF: "ftyp" at offset 4
        _ if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" => Some("image/heic"),
        _ => None,
    }
}

/// MIME guessed from the file name alone.
pub fn guess_mime(name: &str) -> String {
    mime_guess::from_path(name).first_or_octet_stream().to_string()
}

/// Preview routing for a MIME type: images and PDFs only.
pub fn preview_kind_for_mime(mime: &str) -> Option<PreviewKind> {
    let essence = mime.split(';').next().unwrap_or(mime).trim().to_lowercase();
    if essence == PDF_MIME {
        Some(PreviewKind::Pdf)
    } else if essence.starts_with("image/") {
        Some(PreviewKind::Image)
    } else {
        None
    }
}

/// Sanitize a filename: strip path components, limit length.
pub fn sanitize_filename(original: &str) -> String {
    let name = original.rsplit(['/', '\\']).next().unwrap_or("");

    let clean: String = name
        .chars()
        .filter(|c| *c != '\0' && !c.is_control())
        .take(255)
        .collect();

    if clean.trim().is_empty() {
        "document".to_string()
    } else {
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_known_formats() {
        assert_eq!(sniff_mime(b"%PDF-1.7\n"), Some("application/pdf"));
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), Some("image/jpeg"));
        assert_eq!(sniff_mime(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A]), Some("image/png"));
        assert_eq!(sniff_mime(&[0x49, 0x49, 0x2A, 0x00]), Some("image/tiff"));
        assert_eq!(sniff_mime(b"\0\0\0\x18ftypheic\0\0"), Some("image/heic"));
        assert_eq!(sniff_mime(b"hello"), None);
        assert_eq!(sniff_mime(&[]), None);
    }

    #[test]
    fn extensions_are_case_insensitive() {
        assert!(is_allowed_extension("scan.JPG"));
        assert!(is_allowed_extension("report.Pdf"));
        assert!(!is_allowed_extension("notes.docx"));
        assert!(!is_allowed_extension("no_extension"));
        assert!(is_pdf_name("a.PDF"));
    }

    #[test]
    fn guesses_from_extension() {
        assert_eq!(guess_mime("scan.png"), "image/png");
        assert_eq!(guess_mime("report.pdf"), "application/pdf");
        assert_eq!(guess_mime("blob"), OCTET_STREAM);
    }

    #[test]
    fn preview_routing() {
        assert_eq!(preview_kind_for_mime("application/pdf"), Some(PreviewKind::Pdf));
        assert_eq!(preview_kind_for_mime("image/jpeg"), Some(PreviewKind::Image));
        assert_eq!(preview_kind_for_mime("Image/PNG; q=1"), Some(PreviewKind::Image));
        assert_eq!(preview_kind_for_mime("text/plain"), None);
    }

    #[test]
    fn sanitize_strips_paths() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\scans\\lab.pdf"), "lab.pdf");
        assert_eq!(sanitize_filename("lab\0.pdf"), "lab.pdf");
        assert_eq!(sanitize_filename(""), "document");
    }
}
