//! Shared helpers for document generation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Print rules every document gets. Injected ahead of the template's own
/// styles so a template `@page` rule still takes precedence.
const PRINT_DEFAULTS: &str = "<style>@page { size: A4; } html { -webkit-print-color-adjust: exact; print-color-adjust: exact; }</style>";

/// Detect MIME type from file content magic bytes.
pub fn detect_mime_from_bytes(data: &[u8]) -> Option<&'static str> {
    if data.len() < 4 {
        return None;
    }

    if data.starts_with(b"%PDF") {
        return Some("application/pdf");
    }

    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return Some("image/png");
    }

    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }

    if data.starts_with(b"GIF8") {
        return Some("image/gif");
    }

    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    if data.starts_with(b"<svg") || data.starts_with(b"<?xml") {
        return Some("image/svg+xml");
    }

    None
}

/// Turn a logo payload into something usable as `<img src>`.
///
/// Payloads that are already `data:` URIs pass through; bare base64 gets a
/// MIME type sniffed from its decoded bytes, falling back to PNG.
pub fn logo_data_uri(payload: &str) -> String {
    let payload = payload.trim();
    if payload.starts_with("data:") {
        return payload.to_string();
    }

    let mime = STANDARD
        .decode(payload)
        .ok()
        .and_then(|bytes| detect_mime_from_bytes(&bytes))
        .filter(|mime| mime.starts_with("image/"))
        .unwrap_or("image/png");
    format!("data:{mime};base64,{payload}")
}

/// Add A4 and background printing defaults to a rendered page.
pub fn with_print_defaults(html: &str) -> String {
    match find_head_open(html) {
        Some(end) => {
            let mut out = String::with_capacity(html.len() + PRINT_DEFAULTS.len());
            out.push_str(&html[..end]);
            out.push_str(PRINT_DEFAULTS);
            out.push_str(&html[end..]);
            out
        }
        None => format!("{PRINT_DEFAULTS}{html}"),
    }
}

/// Byte offset just past the opening `<head ...>` tag, if any.
fn find_head_open(html: &str) -> Option<usize> {
    let lower = html.to_ascii_lowercase();
    let mut from = 0;
    while let Some(pos) = lower[from..].find("<head") {
        let start = from + pos;
        let after = start + "<head".len();
        match lower.as_bytes().get(after) {
            Some(b'>') => return Some(after + 1),
            Some(c) if c.is_ascii_whitespace() => {
                return lower[after..].find('>').map(|close| after + close + 1);
            }
            _ => from = after,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_common_image_types() {
        assert_eq!(detect_mime_from_bytes(b"\x89PNG\r\n\x1a\n"), Some("image/png"));
        assert_eq!(detect_mime_from_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(detect_mime_from_bytes(b"GIF89a"), Some("image/gif"));
        assert_eq!(detect_mime_from_bytes(b"%PDF-1.7"), Some("application/pdf"));
        assert_eq!(detect_mime_from_bytes(b"abc"), None);
    }

    #[test]
    fn logo_data_uri_uses_sniffed_type() {
        let jpeg = STANDARD.encode([0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]);
        assert_eq!(logo_data_uri(&jpeg), format!("data:image/jpeg;base64,{jpeg}"));
    }

    #[test]
    fn logo_data_uri_defaults_to_png_and_keeps_existing_uris() {
        assert_eq!(logo_data_uri("not base64!"), "data:image/png;base64,not base64!");
        let uri = "data:image/svg+xml;base64,PHN2Zz4=";
        assert_eq!(logo_data_uri(uri), uri);
    }

    #[test]
    fn print_defaults_go_right_after_head() {
        let html = "<html><head><style>@page { size: A5; }</style></head></html>";
        let out = with_print_defaults(html);
        assert!(out.starts_with(&format!("<html><head>{PRINT_DEFAULTS}<style>@page")));
    }

    #[test]
    fn print_defaults_skip_header_elements() {
        let html = "<header>x</header><HEAD lang=\"en\">y";
        let out = with_print_defaults(html);
        assert_eq!(out, format!("<header>x</header><HEAD lang=\"en\">{PRINT_DEFAULTS}y"));

        let bare = "<p>plain</p>";
        assert_eq!(with_print_defaults(bare), format!("{PRINT_DEFAULTS}<p>plain</p>"));
    }
}
