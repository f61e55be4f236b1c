//! File naming for downloaded attachments

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// RFC 2047 encoded word: `=?charset?B|Q?text?=`
static ENCODED_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"=\?([^?\s]+)\?([BbQq])\?([^?\s]*)\?=").expect("encoded-word pattern is valid")
});

/// Whitespace separating two adjacent encoded words is not part of the text
static BETWEEN_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\?=\s+=\?").expect("separator pattern is valid"));

/// Get file extension from content type
pub fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let ext = match essence.as_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        "text/plain" => "txt",
        "text/csv" => "csv",
        "text/html" => "html",
        "text/markdown" => "md",
        "application/json" => "json",
        "application/xml" | "text/xml" => "xml",
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.ms-powerpoint" => "ppt",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        _ => return None,
    };
    Some(ext)
}

/// Detect content type from file extension
pub fn content_type_from_extension(ext: &str) -> &'static str {
    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "md" => "text/markdown",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => "application/octet-stream",
    }
}

/// Whether a content type is safe to hand back as text
pub fn is_textual(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence.starts_with("text/")
        || matches!(essence, "application/json" | "application/xml")
        || essence.ends_with("+json")
        || essence.ends_with("+xml")
}

/// Decode RFC 2047 encoded words; words in charsets other than UTF-8 or
/// US-ASCII are left as they are
pub fn decode_mime_words(input: &str) -> String {
    let joined = BETWEEN_WORDS.replace_all(input, "?==?");
    ENCODED_WORD
        .replace_all(&joined, |caps: &regex::Captures<'_>| {
            let charset = caps[1].to_ascii_lowercase();
            if charset != "utf-8" && charset != "us-ascii" {
                return caps[0].to_string();
            }
            let bytes = match &caps[2] {
                "B" | "b" => BASE64.decode(&caps[3]).ok(),
                _ => decode_q(&caps[3]),
            };
            bytes
                .and_then(|b| String::from_utf8(b).ok())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Q encoding: `_` is a space, `=XX` a hex byte
fn decode_q(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    let mut bytes = text.bytes();
    while let Some(b) = bytes.next() {
        match b {
            b'_' => out.push(b' '),
            b'=' => {
                let hi = hex_value(bytes.next()?)?;
                let lo = hex_value(bytes.next()?)?;
                out.push(hi << 4 | lo);
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// `%XX` decoding used by RFC 5987 extended parameters
fn percent_decode(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len());
    let mut bytes = text.bytes();
    while let Some(b) = bytes.next() {
        if b == b'%' {
            let hi = hex_value(bytes.next()?)?;
            let lo = hex_value(bytes.next()?)?;
            out.push(hi << 4 | lo);
        } else {
            out.push(b);
        }
    }
    Some(out)
}

/// Split a header into `;`-separated parameters, respecting quotes
fn header_params(header: &str) -> Vec<(String, String)> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;
    for c in header.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);

    parts
        .into_iter()
        .filter_map(|p| {
            let (k, v) = p.split_once('=')?;
            Some((k.trim().to_ascii_lowercase(), v.trim().to_string()))
        })
        .collect()
}

/// Pick the file name out of a Content-Disposition header.
///
/// `filename*` (RFC 5987) wins over `filename`, whose value may carry
/// MIME encoded words.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let params = header_params(header);

    let extended = params.iter().find(|(k, _)| k == "filename*").and_then(|(_, v)| {
        let mut pieces = v.splitn(3, '\'');
        let charset = pieces.next()?.to_ascii_lowercase();
        let _language = pieces.next()?;
        let encoded = pieces.next()?;
        if charset != "utf-8" && charset != "us-ascii" {
            return None;
        }
        String::from_utf8(percent_decode(encoded)?).ok()
    });

    extended
        .or_else(|| {
            params
                .iter()
                .find(|(k, _)| k == "filename")
                .map(|(_, v)| decode_mime_words(v))
        })
        .map(|name| sanitize_filename(&name))
        .filter(|name| !name.is_empty())
}

/// Keep only a plain file name: no directories, no control characters
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>();
    let trimmed = base.trim();
    if trimmed == "." || trimmed == ".." {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// Name derived from the file key when the backend gives none
pub fn fallback_filename(file_key: &str, content_type: Option<&str>) -> String {
    let stem = sanitize_filename(file_key);
    let stem = if stem.is_empty() { "download".to_string() } else { stem };
    match content_type.and_then(extension_from_content_type) {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

/// Split `name.ext` into `("name", ".ext")`; dotfiles have no extension
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(i) => name.split_at(i),
    }
}

/// First path in `dir` named `name` that does not exist yet, trying
/// `stem (1).ext`, `stem (2).ext`, ... after the plain name
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = split_extension(name);
    (1u64..)
        .map(|n| dir.join(format!("{} ({}){}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_plain_and_quoted_filename() {
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="report.pdf""#),
            Some("report.pdf".to_string())
        );
        assert_eq!(
            filename_from_content_disposition("attachment; filename=data.csv"),
            Some("data.csv".to_string())
        );
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="a;b.txt""#),
            Some("a;b.txt".to_string())
        );
    }

    #[test]
    fn test_mime_encoded_filename() {
        // "見積書.xlsx" as a UTF-8 B-encoded word
        assert_eq!(
            filename_from_content_disposition(
                r#"attachment; filename="=?UTF-8?B?6KaL56mN5pu4Lnhsc3g=?=""#
            ),
            Some("見積書.xlsx".to_string())
        );
        assert_eq!(decode_mime_words("=?utf-8?Q?hello_world=21?="), "hello world!");
        assert_eq!(
            decode_mime_words("=?UTF-8?Q?a?= =?UTF-8?Q?b?=.txt"),
            "ab.txt"
        );
        assert_eq!(
            decode_mime_words("=?ISO-2022-JP?B?GyRCJUYlOSVIGyhC?="),
            "=?ISO-2022-JP?B?GyRCJUYlOSVIGyhC?="
        );
    }

    #[test]
    fn test_extended_filename_wins() {
        assert_eq!(
            filename_from_content_disposition(
                "attachment; filename=\"fallback.txt\"; filename*=UTF-8''%E6%97%A5%E5%A0%B1.txt"
            ),
            Some("日報.txt".to_string())
        );
    }

    #[test]
    fn test_path_components_are_stripped() {
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="../../etc/passwd""#),
            Some("passwd".to_string())
        );
        assert_eq!(
            filename_from_content_disposition(r#"attachment; filename="..""#),
            None
        );
        assert_eq!(filename_from_content_disposition("inline"), None);
    }

    #[test]
    fn test_fallback_filename() {
        assert_eq!(
            fallback_filename("20240101abc", Some("image/png; charset=binary")),
            "20240101abc.png"
        );
        assert_eq!(fallback_filename("k", Some("application/x-unknown")), "k");
        assert_eq!(fallback_filename("", None), "download");
    }

    #[test]
    fn test_unique_path_counts_up() {
        let dir = tempdir().unwrap();
        let first = unique_path(dir.path(), "name.ext");
        assert_eq!(first, dir.path().join("name.ext"));
        std::fs::write(&first, b"1").unwrap();

        let second = unique_path(dir.path(), "name.ext");
        assert_eq!(second, dir.path().join("name (1).ext"));
        std::fs::write(&second, b"2").unwrap();

        let third = unique_path(dir.path(), "name.ext");
        assert_eq!(third, dir.path().join("name (2).ext"));
    }

    #[test]
    fn test_unique_path_without_extension() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), b"").unwrap();
        assert_eq!(unique_path(dir.path(), ".env"), dir.path().join(".env (1)"));
    }

    #[test]
    fn test_textual_types() {
        assert!(is_textual("text/plain; charset=utf-8"));
        assert!(is_textual("application/ld+json"));
        assert!(!is_textual("image/png"));
        assert_eq!(content_type_from_extension("PDF"), "application/pdf");
    }
}
