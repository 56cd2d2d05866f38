//! Filename sanitization for user-chosen names.
//!
//! Sanitization is lossy and NOT invertible: distinct project names may
//! collapse to the same sanitized string. The store therefore never treats a
//! filename as a key — documents are resolved by the `name` field stored in
//! their content.

/// Maximum length of a sanitized name, in characters.
pub const MAX_SANITIZED_LEN: usize = 100;

/// Sanitize a project name into a filesystem-safe stem.
///
/// Characters outside `[A-Za-z0-9_- ]` become `_`, whitespace runs collapse
/// to a single `_`, and the result is truncated to [`MAX_SANITIZED_LEN`]
/// characters. Returns `None` when nothing sanitizable remains.
pub fn sanitize_name(name: &str) -> Option<String> {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;

    for ch in name.chars() {
        if ch.is_whitespace() {
            if !in_whitespace && !out.is_empty() {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }

    // Trailing separator from trailing whitespace
    if out.ends_with('_') && name.trim_end() != name {
        out.pop();
    }

    if out.is_empty() {
        return None;
    }
    Some(out.chars().take(MAX_SANITIZED_LEN).collect())
}

/// Sanitize an uploaded asset filename.
///
/// Same character policy as [`sanitize_name`] but dots are kept so the
/// extension survives. Leading dots are stripped, which also rules out `.`
/// and `..` path components.
pub fn sanitize_asset_name(name: &str) -> Option<String> {
    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;

    for ch in name.chars() {
        if ch.is_whitespace() {
            if !in_whitespace && !out.is_empty() {
                out.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }

    let trimmed = out.trim_start_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_SANITIZED_LEN).collect())
}
