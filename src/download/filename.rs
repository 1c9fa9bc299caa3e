//! Deterministic local file names for label documents.
//!
//! Two naming schemes share the store:
//! - portal scrape: last path segment of the resolved document URL
//! - results export: `<product id>ELBL.pdf`

use std::path::{Component, Path};

use url::Url;

/// Suffix appended to product identifiers by the e-label host.
pub const PRODUCT_LABEL_SUFFIX: &str = "ELBL.pdf";

/// File name for a product identifier: `<id>ELBL.pdf`.
///
/// Returns `None` when the identifier is blank after trimming.
#[must_use]
pub fn product_label_file_name(product_id: &str) -> Option<String> {
    let id = product_id.trim();
    if id.is_empty() {
        return None;
    }
    Some(sanitize_filename(&format!("{id}{PRODUCT_LABEL_SUFFIX}")))
}

/// File name derived from the last path segment of a document URL.
///
/// The segment is percent-decoded and sanitized. Returns `None` when the URL
/// path ends with `/` or has no segments.
#[must_use]
pub fn file_name_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    let name = sanitize_filename(&decoded);
    (!name.trim_matches('_').is_empty()).then_some(name)
}

/// Sanitizes a file name for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems
/// (`/ \ : * ? " < > |` and control characters) with `_`, and rewrites names
/// that would be hidden or act as relative path components.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if !is_safe_filename_segment(&sanitized) {
        return sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect();
    }

    match sanitized.strip_prefix('.') {
        Some(rest) => format!("_{rest}"),
        None => sanitized,
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_url_takes_last_segment() {
        let url = Url::parse("https://host/files/ABC123.pdf").unwrap();
        assert_eq!(file_name_from_url(&url).as_deref(), Some("ABC123.pdf"));
    }

    #[test]
    fn test_file_name_from_url_ignores_query_and_fragment() {
        let url = Url::parse("https://host/files/ABC123.pdf?download=1#page=2").unwrap();
        assert_eq!(file_name_from_url(&url).as_deref(), Some("ABC123.pdf"));
    }

    #[test]
    fn test_file_name_from_url_decodes_percent_escapes() {
        let url = Url::parse("https://host/files/Label%20v2.pdf").unwrap();
        assert_eq!(file_name_from_url(&url).as_deref(), Some("Label v2.pdf"));
    }

    #[test]
    fn test_file_name_from_url_encoded_separator_is_sanitized() {
        let url = Url::parse("https://host/files/a%2Fb.pdf").unwrap();
        assert_eq!(file_name_from_url(&url).as_deref(), Some("a_b.pdf"));
    }

    #[test]
    fn test_file_name_from_url_trailing_slash_is_none() {
        let url = Url::parse("https://host/files/").unwrap();
        assert_eq!(file_name_from_url(&url), None);
        let root = Url::parse("https://host/").unwrap();
        assert_eq!(file_name_from_url(&root), None);
    }

    #[test]
    fn test_product_label_file_name() {
        assert_eq!(
            product_label_file_name(" 51234 ").as_deref(),
            Some("51234ELBL.pdf")
        );
        assert_eq!(product_label_file_name("   "), None);
    }

    #[test]
    fn test_sanitize_filename_removes_invalid_chars() {
        assert_eq!(sanitize_filename("file/name.pdf"), "file_name.pdf");
        assert_eq!(sanitize_filename("file\\name.pdf"), "file_name.pdf");
        assert_eq!(sanitize_filename("file:name.pdf"), "file_name.pdf");
        assert_eq!(sanitize_filename("file<name>.pdf"), "file_name_.pdf");
        assert_eq!(sanitize_filename("file|name.pdf"), "file_name.pdf");
    }

    #[test]
    fn test_sanitize_filename_rewrites_dot_segments_and_hidden_names() {
        assert_eq!(sanitize_filename("."), "_");
        assert_eq!(sanitize_filename(".."), "__");
        assert_eq!(sanitize_filename(".hidden.pdf"), "_hidden.pdf");
    }

    #[test]
    fn test_sanitize_filename_preserves_valid_chars() {
        assert_eq!(sanitize_filename("valid-file_name.pdf"), "valid-file_name.pdf");
        assert_eq!(sanitize_filename("file (1).pdf"), "file (1).pdf");
    }
}
