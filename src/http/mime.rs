//! MIME type detection based on file extensions.

use std::path::Path;

/// Returned for any extension missing from the table.
pub const OCTET_STREAM: &str = "application/octet-stream";

const MIME_TYPES: &[(&str, &str)] = &[
    ("html", "text/html; charset=utf-8"),
    ("htm", "text/html; charset=utf-8"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("txt", "text/plain; charset=utf-8"),
    ("svg", "image/svg+xml"),
    // image/jpeg for both spellings; image/jpg is not registered
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("ico", "image/x-icon"),
];

/// Looks up the content type for `path` by its extension, ignoring case.
pub fn content_type_for(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return OCTET_STREAM;
    };

    MIME_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map(|(_, mime)| *mime)
        .unwrap_or(OCTET_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_extensions() {
        assert_eq!(content_type_for(Path::new("a/index.HTML")), "text/html; charset=utf-8");
        assert_eq!(content_type_for(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("archive.tar.gz")), OCTET_STREAM);
        assert_eq!(content_type_for(Path::new("Makefile")), OCTET_STREAM);
    }
}
