//! Injection pattern scanning for text-like uploads

use intake_core::{ConfigError, ValidationError};
use regex::{Regex, RegexSet};

use crate::sniffer::is_text_like;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Compiled set of blocked content signatures
#[derive(Debug, Clone)]
pub struct PatternScanner {
    signatures: RegexSet,
}

impl PatternScanner {
    /// Compile `patterns` into one matcher. Patterns are checked one by one
    /// first so a bad pattern is named in the error.
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        for pattern in patterns {
            Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
        }

        let signatures = RegexSet::new(patterns).map_err(|source| {
            ConfigError::InvalidPattern {
                pattern: patterns.join(" | "),
                source,
            }
        })?;

        Ok(Self { signatures })
    }

    /// Only text-like content is scanned
    pub fn applies_to(mime_type: &str) -> bool {
        is_text_like(mime_type)
    }

    /// Scan `data` of type `mime_type`.
    ///
    /// Binary types pass untouched. Text that is not valid UTF-8 is
    /// suspicious in itself: it could hide a payload from the matcher.
    pub fn scan(&self, data: &[u8], mime_type: &str) -> Result<(), ValidationError> {
        if !Self::applies_to(mime_type) {
            return Ok(());
        }

        let body = data.strip_prefix(UTF8_BOM).unwrap_or(data);
        let text = match std::str::from_utf8(body) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    mime_type = %mime_type,
                    valid_up_to = e.valid_up_to(),
                    "Text upload is not valid UTF-8"
                );
                return Err(ValidationError::SuspiciousContent);
            }
        };

        let matched: Vec<usize> = self.signatures.matches(text).into_iter().collect();
        if !matched.is_empty() {
            tracing::warn!(
                mime_type = %mime_type,
                signatures = ?matched,
                "Blocked content pattern matched"
            );
            return Err(ValidationError::SuspiciousContent);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::constants::DEFAULT_BLOCKED_CONTENT_PATTERNS;

    fn scanner() -> PatternScanner {
        let patterns: Vec<String> = DEFAULT_BLOCKED_CONTENT_PATTERNS
            .iter()
            .map(|s| s.to_string())
            .collect();
        PatternScanner::new(&patterns).unwrap()
    }

    #[test]
    fn test_clean_text_passes() {
        let scanner = scanner();
        assert!(scanner
            .scan(b"name,price\nwidget,4.50\n", "text/csv")
            .is_ok());
        assert!(scanner
            .scan(br#"{"items": [{"id": 1}], "total": 2}"#, "application/json")
            .is_ok());
        assert!(scanner.scan(b"Meeting at 10:30, bring notes", "text/plain").is_ok());
    }

    #[test]
    fn test_detects_injection_signatures() {
        let scanner = scanner();
        let samples: &[&[u8]] = &[
            b"hello <script>alert(1)</script>",
            b"<SCRIPT src=x>",
            b"<img src=x onerror=alert(1)>",
            b"<a href=\"javascript:alert(1)\">x</a>",
            b"click vbscript:msgbox",
            b"data:text/html;base64,PHNjcmlwdD4=",
            b"<% Response.Write(1) %>",
            b"<?php system($_GET['c']); ?>",
            b"user=${jndi:ldap://x/a}",
            b"Hello {{ 7*7 }}",
        ];

        for sample in samples {
            assert_eq!(
                scanner.scan(sample, "text/plain"),
                Err(ValidationError::SuspiciousContent),
                "expected a match for {:?}",
                String::from_utf8_lossy(sample)
            );
        }
    }

    #[test]
    fn test_skips_binary_types() {
        let scanner = scanner();
        let mut payload = vec![0xFF, 0xD8, 0xFF, 0xE0];
        payload.extend_from_slice(b"<script>alert(1)</script>");
        assert!(scanner.scan(&payload, "image/jpeg").is_ok());
    }

    #[test]
    fn test_svg_is_scanned() {
        let scanner = scanner();
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" onload="alert(1)"></svg>"#;
        assert_eq!(
            scanner.scan(svg, "image/svg+xml"),
            Err(ValidationError::SuspiciousContent)
        );
    }

    #[test]
    fn test_malformed_utf8_is_suspicious() {
        let scanner = scanner();
        assert_eq!(
            scanner.scan(&[b'o', b'k', 0xC3, 0x28], "text/plain"),
            Err(ValidationError::SuspiciousContent)
        );
    }

    #[test]
    fn test_invalid_pattern_is_named() {
        let err = PatternScanner::new(&["(unclosed".to_string()]).unwrap_err();
        match err {
            ConfigError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "(unclosed"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
