//! Shared constants

use std::time::Duration;

pub const MB: usize = 1024 * 1024;

/// Quality rungs tried by the image normalizer, highest first.
pub const DEFAULT_QUALITY_LADDER: [u8; 5] = [85, 75, 65, 55, 45];

/// Recompressed images must land at or below this share of the original size.
pub const DEFAULT_TARGET_RATIO: f32 = 0.8;

pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// Startup reachability check against the malware engine.
pub const DEFAULT_SCANNER_PING_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_UPLOAD_URL_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_UPLOAD_URL_TTL: Duration = Duration::from_secs(15 * 60);

/// Upper bound for sanitized file names, extension included.
pub const MAX_SANITIZED_NAME_LEN: usize = 128;

/// Name used when nothing usable survives sanitization.
pub const FALLBACK_FILE_NAME: &str = "file";

pub const UPLOAD_KEY_PREFIX: &str = "uploads";
pub const ANONYMOUS_OWNER: &str = "anonymous";

/// Number of hex characters of the content hash shown in security reports.
pub const REPORT_HASH_PREFIX_LEN: usize = 16;

/// Injection signatures checked against text-like uploads.
pub const DEFAULT_BLOCKED_CONTENT_PATTERNS: &[&str] = &[
    // embedded script blocks
    r"(?i)<\s*script\b",
    // inline event handlers inside a tag
    r"(?i)<[^>]*\bon[a-z]+\s*=",
    // script-protocol URIs
    r"(?i)\b(?:javascript|vbscript)\s*:",
    r"(?i)data\s*:\s*text/html",
    // server-side template tags
    r"(?s)<%.*?%>",
    r"(?i)<\?php",
    // string interpolation
    r"\$\{[^}]*\}",
    r"(?s)\{\{.*?\}\}",
];
