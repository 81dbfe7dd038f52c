//! Point-label decoding and stable identity keys.
//!
//! Vendor exports escape punctuation in point labels (`Vav1$2d01$20Space$20Temp`).
//! [`decode`] turns those back into readable text and [`canonical_key`] derives the
//! case- and punctuation-insensitive key used for zone roots and series metadata.

pub const KEY_SEPARATOR: char = '-';
pub const FALLBACK_KEY: &str = "unknown";

const ESCAPES: &[(&str, char)] = &[("$20", ' '), ("$2d", '-')];

/// Replaces known escape sequences and collapses repeated separators.
/// `decode(decode(x)) == decode(x)`.
pub fn decode(raw: &str) -> String {
    let mut unescaped = String::with_capacity(raw.len());
    let mut rest = raw;
    'outer: while !rest.is_empty() {
        if rest.starts_with('$') {
            for (escape, literal) in ESCAPES {
                if rest.len() >= escape.len()
                    && rest.is_char_boundary(escape.len())
                    && rest[..escape.len()].eq_ignore_ascii_case(escape)
                {
                    unescaped.push(*literal);
                    rest = &rest[escape.len()..];
                    continue 'outer;
                }
            }
        }
        let mut chars = rest.chars();
        if let Some(ch) = chars.next() {
            unescaped.push(ch);
        }
        rest = chars.as_str();
    }

    let mut out = String::with_capacity(unescaped.len());
    let mut prev: Option<char> = None;
    for ch in unescaped.chars() {
        let ch = if ch.is_whitespace() { ' ' } else { ch };
        if (ch == ' ' || ch == '-') && prev == Some(ch) {
            continue;
        }
        out.push(ch);
        prev = Some(ch);
    }
    out.trim().to_string()
}

/// Lowercase ASCII alphanumerics joined by single `-`. Never fails; empty input
/// (or input with no alphanumerics) maps to [`FALLBACK_KEY`].
pub fn canonical_key(raw: &str) -> String {
    let decoded = decode(raw);
    let mut key = String::with_capacity(decoded.len());
    let mut pending_separator = false;
    for ch in decoded.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !key.is_empty() {
                key.push(KEY_SEPARATOR);
            }
            pending_separator = false;
            key.push(ch.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    if key.is_empty() {
        return FALLBACK_KEY.to_string();
    }
    key
}

pub fn canonical_key_opt(raw: Option<&str>) -> String {
    canonical_key(raw.unwrap_or_default())
}
