//! Content type and extension lookup for attachments.

use std::collections::HashMap;
use std::sync::LazyLock;

/// (content type, extension) pairs. The first extension listed for a
/// content type is the canonical one.
const KNOWN_TYPES: &[(&str, &str)] = &[
    ("text/plain", ".txt"),
    ("text/plain", ".log"),
    ("text/html", ".html"),
    ("text/html", ".htm"),
    ("text/css", ".css"),
    ("text/csv", ".csv"),
    ("text/tab-separated-values", ".tsv"),
    ("text/uri-list", ".uri"),
    ("text/xml", ".xml"),
    ("text/markdown", ".md"),
    ("text/javascript", ".js"),
    ("application/xml", ".xml"),
    ("application/json", ".json"),
    ("application/yaml", ".yaml"),
    ("application/yaml", ".yml"),
    ("application/pdf", ".pdf"),
    ("application/zip", ".zip"),
    ("application/gzip", ".gz"),
    ("application/octet-stream", ".bin"),
    ("application/vnd.allure.image.diff", ".imagediff"),
    ("application/vnd.allure.http+json", ".httpexchange"),
    ("image/png", ".png"),
    ("image/jpeg", ".jpg"),
    ("image/jpeg", ".jpeg"),
    ("image/gif", ".gif"),
    ("image/bmp", ".bmp"),
    ("image/svg+xml", ".svg"),
    ("image/webp", ".webp"),
    ("image/tiff", ".tiff"),
    ("video/mp4", ".mp4"),
    ("video/webm", ".webm"),
    ("video/ogg", ".ogg"),
];

static EXT_BY_TYPE: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for (content_type, ext) in KNOWN_TYPES {
        map.entry(*content_type).or_insert(*ext);
    }
    map
});

static TYPE_BY_EXT: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for (content_type, ext) in KNOWN_TYPES {
        map.entry(*ext).or_insert(*content_type);
    }
    map
});

/// Canonical extension (with dot) for a declared content type.
///
/// Parameters such as `; charset=utf-8` are ignored.
#[must_use]
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    EXT_BY_TYPE.get(essence.as_str()).copied()
}

/// Content type for an extension, with or without the leading dot.
#[must_use]
pub fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    let normalized = if ext.starts_with('.') {
        ext.to_lowercase()
    } else {
        format!(".{}", ext.to_lowercase())
    };
    TYPE_BY_EXT.get(normalized.as_str()).copied()
}

/// Extension of a file name, including the leading dot.
///
/// Dotfiles (`.env`) and names ending in a dot have no extension.
#[must_use]
pub fn extension_of(file_name: &str) -> Option<String> {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let dot = base.rfind('.')?;
    if dot == 0 || dot + 1 == base.len() {
        return None;
    }
    Some(base[dot..].to_string())
}
