use std::path::Path;

use url::Url;

/// Derive a schema name from a file path.
///
/// Extracts the file stem (name without extension).
/// Example: `"schemas/api_endpoint.json"` → `"api_endpoint"`
pub fn derive_schema_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("default")
        .to_string()
}

/// Map a page URL to a flat, filesystem-safe markdown file name.
///
/// Host and path are joined; a path ending in `/` (or an empty one) gets
/// `index` appended; the query string, if any, is kept after a `_`. Every
/// character other than word characters, `-` and `.` becomes `_`, runs of
/// `_` collapse to one, and `.md` is appended if missing.
///
/// Example: `"https://docs.rs/tokio/latest/"` → `"docs.rs_tokio_latest_index.md"`
pub fn sanitize_filename(url: &str) -> String {
    let raw = match Url::parse(url) {
        Ok(parsed) => {
            let mut raw = parsed.host_str().unwrap_or_default().to_string();
            if let Some(port) = parsed.port() {
                raw.push_str(&format!(":{port}"));
            }
            let path = parsed.path();
            if path.is_empty() || path == "/" {
                raw.push_str("/index");
            } else {
                raw.push_str(path);
                if path.ends_with('/') {
                    raw.push_str("index");
                }
            }
            if let Some(query) = parsed.query().filter(|q| !q.is_empty()) {
                raw.push('_');
                raw.push_str(query);
            }
            raw
        }
        Err(_) => url.to_string(),
    };

    let mut name = safe_chars(&raw);
    if name.is_empty() {
        name.push_str("index");
    }
    if !name.ends_with(".md") {
        name.push_str(".md");
    }
    name
}

/// Replace everything but word characters, `-` and `.` with `_`, collapsing runs of `_`.
fn safe_chars(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 3);
    for c in raw.chars() {
        let c = if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
            c
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Output directory name for a run: `<doc_type>[_focus-<focus>][_tool-<tool>]`.
///
/// Uses the same character filter as [`sanitize_filename`] (spaces and path
/// separators become `_`) and drops leading dots, so the result is always a
/// single, non-hidden path component.
pub fn output_dir_name(doc_type: &str, focus: Option<&str>, tool_name: Option<&str>) -> String {
    let mut name = doc_type.trim().to_string();
    if let Some(focus) = focus.filter(|f| !f.trim().is_empty()) {
        name.push_str("_focus-");
        name.push_str(focus.trim());
    }
    if let Some(tool) = tool_name.filter(|t| !t.trim().is_empty()) {
        name.push_str("_tool-");
        name.push_str(tool.trim());
    }
    let name = safe_chars(&name);
    match name.trim_start_matches('.') {
        "" => "general".to_string(),
        rest => rest.to_string(),
    }
}

/// First `max_chars` characters of `s`, never splitting a UTF-8 sequence.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Remove a single fence wrapping the whole reply (```` ```markdown ... ``` ````).
///
/// Fences inside the document are left alone.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // The info string runs to the end of the opening line.
    match body.find('\n') {
        Some(newline) if !body[..newline].contains('`') => body[newline + 1..].trim(),
        _ => trimmed,
    }
}
