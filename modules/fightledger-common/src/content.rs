use sha2::{Digest, Sha256};

/// Hex SHA-256 of a document body.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// File-system safe form of an entity name.
///
/// Whitespace, path separators and anything outside `[A-Za-z0-9._'-]` become
/// `_`. Leading dots are replaced too so a name never maps to a hidden or
/// relative path.
pub fn sanitize_name(name: &str) -> String {
    let mut out: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '\'' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.starts_with('.') {
        out.replace_range(0..1, "_");
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

/// Collision-free file stem for an entity name.
///
/// A name that sanitizes to itself is its own stem. Any other name gets a
/// `~` plus a short hash of the trimmed name; `~` never survives
/// `sanitize_name`, so suffixed stems cannot meet unsuffixed ones.
pub fn artifact_key(name: &str) -> String {
    let trimmed = name.trim();
    let safe = sanitize_name(trimmed);
    if safe == trimmed {
        safe
    } else {
        format!("{safe}~{}", &content_hash(trimmed)[..12])
    }
}
