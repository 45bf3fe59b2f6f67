//! Content sniffing
//!
//! Detects the real format of an upload from its bytes. The declared file name
//! is only consulted to pick a member of the text family (a CSV and a plain
//! text file look the same on the wire) and for reconciliation afterwards.

use infer::MatcherType;
use intake_core::ValidationError;
use serde::Serialize;

/// A detected type with its canonical extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetectedType {
    pub mime_type: &'static str,
    pub extension: &'static str,
}

/// Extension -> (MIME type, canonical extension). Extensions sharing a MIME
/// type are synonyms of each other (jpg/jpeg/jfif, tif/tiff, htm/html...).
const EXTENSION_TABLE: &[(&str, &str, &str)] = &[
    // Images
    ("jpg", "image/jpeg", "jpg"),
    ("jpeg", "image/jpeg", "jpg"),
    ("jpe", "image/jpeg", "jpg"),
    ("jfif", "image/jpeg", "jpg"),
    ("png", "image/png", "png"),
    ("gif", "image/gif", "gif"),
    ("webp", "image/webp", "webp"),
    ("bmp", "image/bmp", "bmp"),
    ("tif", "image/tiff", "tiff"),
    ("tiff", "image/tiff", "tiff"),
    ("avif", "image/avif", "avif"),
    ("svg", "image/svg+xml", "svg"),
    // Documents
    ("pdf", "application/pdf", "pdf"),
    ("rtf", "application/rtf", "rtf"),
    ("doc", "application/msword", "doc"),
    ("xls", "application/vnd.ms-excel", "xls"),
    ("ppt", "application/vnd.ms-powerpoint", "ppt"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsx",
    ),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "pptx",
    ),
    ("odt", "application/vnd.oasis.opendocument.text", "odt"),
    ("ods", "application/vnd.oasis.opendocument.spreadsheet", "ods"),
    ("odp", "application/vnd.oasis.opendocument.presentation", "odp"),
    ("zip", "application/zip", "zip"),
    // Text
    ("txt", "text/plain", "txt"),
    ("text", "text/plain", "txt"),
    ("log", "text/plain", "txt"),
    ("csv", "text/csv", "csv"),
    ("md", "text/markdown", "md"),
    ("markdown", "text/markdown", "md"),
    ("html", "text/html", "html"),
    ("htm", "text/html", "html"),
    ("css", "text/css", "css"),
    ("js", "text/javascript", "js"),
    ("mjs", "text/javascript", "js"),
    ("json", "application/json", "json"),
    ("xml", "application/xml", "xml"),
    ("yaml", "application/yaml", "yaml"),
    ("yml", "application/yaml", "yaml"),
];

/// MIME spellings folded onto the ones used in the extension table
const MIME_ALIASES: &[(&str, &str)] = &[
    ("image/jpg", "image/jpeg"),
    ("image/pjpeg", "image/jpeg"),
    ("image/x-ms-bmp", "image/bmp"),
    ("image/x-png", "image/png"),
    ("text/xml", "application/xml"),
    ("application/javascript", "text/javascript"),
    ("application/x-javascript", "text/javascript"),
    ("application/x-yaml", "application/yaml"),
    ("text/yaml", "application/yaml"),
    ("text/x-markdown", "text/markdown"),
    ("application/x-zip-compressed", "application/zip"),
];

/// Declared/detected pairs that are different MIME types but not a mismatch:
/// OOXML and ODF documents are ZIP containers.
const COMPATIBLE_TYPES: &[(&str, &str)] = &[
    (
        "application/zip",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        "application/zip",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    (
        "application/zip",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("application/zip", "application/vnd.oasis.opendocument.text"),
    (
        "application/zip",
        "application/vnd.oasis.opendocument.spreadsheet",
    ),
    (
        "application/zip",
        "application/vnd.oasis.opendocument.presentation",
    ),
];

const TEXT_LIKE_APPLICATION_TYPES: &[&str] = &[
    "application/json",
    "application/xml",
    "application/yaml",
    "application/xhtml+xml",
    "image/svg+xml",
];

/// Raster formats the normalizer can decode
const RASTER_IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/tiff",
];

/// infer types matched on a few printable bytes only. Genuine files of these
/// types carry NUL bytes or invalid UTF-8 right after the signature, so a
/// buffer that is clean text is text.
const WEAK_SIGNATURE_TYPES: &[&str] = &[
    "image/bmp",
    "audio/mpeg",
    "audio/amr",
    "application/vnd.microsoft.portable-executable",
    "application/x-bzip2",
    "application/x-shockwave-flash",
    "application/x-lzip",
    "application/x-cpio",
];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const MARKUP_SNIFF_LEN: usize = 1024;

/// Lower-cased extension of the last path segment of `file_name`, if any.
pub fn file_extension(file_name: &str) -> Option<String> {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Strip parameters, lower-case and fold aliases ("Image/JPG; q=1" -> "image/jpeg").
pub fn normalize_mime_type(mime_type: &str) -> String {
    let base = mime_type
        .split(';')
        .next()
        .unwrap_or(mime_type)
        .trim()
        .to_lowercase();
    MIME_ALIASES
        .iter()
        .find(|(alias, _)| *alias == base)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(base)
}

pub fn is_text_like(mime_type: &str) -> bool {
    mime_type.starts_with("text/") || TEXT_LIKE_APPLICATION_TYPES.contains(&mime_type)
}

pub fn is_raster_image(mime_type: &str) -> bool {
    RASTER_IMAGE_TYPES.contains(&mime_type)
}

fn lookup_extension(extension: &str) -> Option<DetectedType> {
    EXTENSION_TABLE
        .iter()
        .find(|(ext, _, _)| *ext == extension)
        .map(|(_, mime_type, canonical)| DetectedType {
            mime_type,
            extension: canonical,
        })
}

fn lookup_mime(mime_type: &str) -> Option<DetectedType> {
    EXTENSION_TABLE
        .iter()
        .find(|(_, mime, _)| *mime == mime_type)
        .map(|(_, mime_type, canonical)| DetectedType {
            mime_type,
            extension: canonical,
        })
}

/// Type implied by the declared name, via the extension table
pub fn declared_type(file_name: &str) -> Option<DetectedType> {
    file_extension(file_name).and_then(|ext| lookup_extension(&ext))
}

pub struct ContentSniffer;

impl ContentSniffer {
    /// Detect the true type of `data`.
    ///
    /// Binary formats are recognised by signature. Anything without a
    /// signature must be well-formed UTF-8 text to be recognised at all.
    pub fn detect(data: &[u8], file_name: &str) -> Result<DetectedType, ValidationError> {
        if data.is_empty() {
            return Err(ValidationError::UndetectableType);
        }

        if let Some(kind) = infer::get(data) {
            // infer's text matchers only look at a prefix; text goes through
            // the stricter path below.
            if kind.matcher_type() != MatcherType::Text {
                if WEAK_SIGNATURE_TYPES.contains(&kind.mime_type()) {
                    if let Some(text) = Self::detect_text(data, file_name) {
                        tracing::debug!(
                            signature = kind.mime_type(),
                            detected = text.mime_type,
                            "Weak signature on text content"
                        );
                        return Ok(text);
                    }
                }
                let mime_type = normalize_mime_type(kind.mime_type());
                return Ok(lookup_mime(&mime_type).unwrap_or(DetectedType {
                    mime_type: kind.mime_type(),
                    extension: kind.extension(),
                }));
            }
        }

        Self::detect_text(data, file_name).ok_or(ValidationError::UndetectableType)
    }

    fn detect_text(data: &[u8], file_name: &str) -> Option<DetectedType> {
        let body = data.strip_prefix(UTF8_BOM).unwrap_or(data);
        if body.contains(&0) {
            return None;
        }
        let text = std::str::from_utf8(body).ok()?;

        let head: String = text
            .trim_start()
            .chars()
            .take(MARKUP_SNIFF_LEN)
            .collect::<String>()
            .to_lowercase();

        let markup = if head.starts_with("<?xml") {
            if head.contains("<svg") {
                Some("image/svg+xml")
            } else {
                Some("application/xml")
            }
        } else if head.starts_with("<svg") {
            Some("image/svg+xml")
        } else if head.starts_with("<!doctype html") || head.starts_with("<html") {
            Some("text/html")
        } else {
            None
        };

        if let Some(mime_type) = markup {
            return lookup_mime(mime_type);
        }

        let from_name = declared_type(file_name)
            .filter(|t| is_text_like(t.mime_type) && t.mime_type != "image/svg+xml");
        from_name.or_else(|| lookup_mime("text/plain"))
    }

    /// Compare the detected type with the one the file name declares.
    ///
    /// Names without a known extension have nothing to reconcile against.
    pub fn reconcile(file_name: &str, detected: &DetectedType) -> Result<(), ValidationError> {
        let Some(declared) = declared_type(file_name) else {
            tracing::debug!(
                file_name = %file_name,
                detected = %detected.mime_type,
                "No declared type, skipping reconciliation"
            );
            return Ok(());
        };

        if declared.mime_type == detected.mime_type
            || COMPATIBLE_TYPES
                .iter()
                .any(|(d, s)| *d == declared.mime_type && *s == detected.mime_type)
        {
            return Ok(());
        }

        Err(ValidationError::TypeMismatch {
            declared: declared.mime_type.to_string(),
            detected: detected.mime_type.to_string(),
        })
    }
}
