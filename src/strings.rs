//! JSON wire-form string codec.
//!
//! Encoding walks decoded UTF-8 text and produces the escaped wire form:
//! short escapes for the characters that have them, literal printable
//! ASCII, and `\uXXXX` for everything else, with supplementary-plane code
//! points split into UTF-16 surrogate pairs.  Decoding reverses the walk,
//! pairing surrogates back into scalar values and rejecting unpaired ones.
//!
//! Values store decoded text; the wire form only exists at the
//! encode/decode boundary.

use crate::errors::DecodeError;

// ── Escape tables ────────────────────────────────────────────
// The encode and decode directions are separate lookups because the
// escape letters do not sort in the same order as the bytes they encode.

fn short_escape(c: char) -> Option<char> {
    match c {
        '\u{8}' => Some('b'),
        '\u{c}' => Some('f'),
        '\n' => Some('n'),
        '\r' => Some('r'),
        '\t' => Some('t'),
        '\\' => Some('\\'),
        '/' => Some('/'),
        '"' => Some('"'),
        _ => None,
    }
}

fn short_unescape(b: u8) -> Option<char> {
    match b {
        b'b' => Some('\u{8}'),
        b'f' => Some('\u{c}'),
        b'n' => Some('\n'),
        b'r' => Some('\r'),
        b't' => Some('\t'),
        b'\\' => Some('\\'),
        b'/' => Some('/'),
        b'"' => Some('"'),
        _ => None,
    }
}

// ── Encoding ─────────────────────────────────────────────────

fn push_unicode_escape(out: &mut String, code_point: u32) {
    if code_point < 0x10000 {
        out.push_str(&format!("\\u{code_point:04x}"));
    } else {
        // Code points past the basic multilingual plane become a UTF-16
        // surrogate pair:
        //   value - 0x10000 = aaaa aaaa aabb bbbb bbbb
        //   high = 0xd800 | a-bits, low = 0xdc00 | b-bits
        let offset = code_point - 0x10000;
        let high = 0xd800 | (offset >> 10);
        let low = 0xdc00 | (offset & 0x03ff);
        out.push_str(&format!("\\u{high:04x}\\u{low:04x}"));
    }
}

/// Append the JSON wire form of `source` to `out`, without surrounding
/// quotes.
///
/// With `ascii_only` set (the default used by the encoders), every
/// character outside printable ASCII is emitted as a `\uXXXX` escape.
/// When unset, characters above ASCII pass through as raw UTF-8 and only
/// control characters are escaped.
pub fn encode_string_into(out: &mut String, source: &str, ascii_only: bool) {
    for c in source.chars() {
        if let Some(escape) = short_escape(c) {
            out.push('\\');
            out.push(escape);
        } else if matches!(c, '\u{20}'..='\u{7e}') {
            out.push(c);
        } else if !ascii_only && c as u32 >= 0x80 {
            out.push(c);
        } else {
            push_unicode_escape(out, c as u32);
        }
    }
}

/// The JSON wire form of `source`, without surrounding quotes, escaping
/// everything outside printable ASCII.
pub fn encode_string(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    encode_string_into(&mut out, source, true);
    out
}

// ── Decoding ─────────────────────────────────────────────────

fn hex_digit(offset: usize, b: u8) -> Result<u16, DecodeError> {
    match b {
        b'0'..=b'9' => Ok(u16::from(b - b'0')),
        // Nothing in the grammar demands lowercase, so accept both.
        b'a'..=b'f' => Ok(u16::from(b - b'a') + 0xa),
        b'A'..=b'F' => Ok(u16::from(b - b'A') + 0xa),
        _ => Err(DecodeError::new(
            offset,
            format!("'{}' is not a valid hexadecimal digit", b as char),
        )),
    }
}

fn hex4(source: &[u8], offset: usize) -> Result<u16, DecodeError> {
    let mut unit = 0u16;
    for (i, &b) in source[offset..offset + 4].iter().enumerate() {
        unit = (unit << 4) | hex_digit(offset + i, b)?;
    }
    Ok(unit)
}

fn is_high_surrogate(unit: u16) -> bool {
    (0xd800..0xdc00).contains(&unit)
}

fn is_low_surrogate(unit: u16) -> bool {
    (0xdc00..0xe000).contains(&unit)
}

fn combine_surrogates(high: u16, low: u16) -> u32 {
    // | high               | low                |
    //  1101 10aa aaaa aaaa  1101 11bb bbbb bbbb
    // recombines to 0x10000 + (a-bits << 10 | b-bits)
    0x10000 + ((u32::from(high) & 0x03ff) << 10 | (u32::from(low) & 0x03ff))
}

/// Translate the contents of a JSON wire-form string (no surrounding
/// quotes) back into UTF-8 text.
///
/// Fails on malformed escapes, unpaired surrogates, and `\u` sequences
/// that do not form a Unicode scalar value.
pub fn decode_string(source: &str) -> Result<String, DecodeError> {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut run_start = 0usize;
    let mut at = 0usize;

    while at < bytes.len() {
        if bytes[at] != b'\\' {
            at += 1;
            continue;
        }

        // Escapes are pure ASCII, so slicing at `at` is always a
        // character boundary.
        out.push_str(&source[run_start..at]);

        let next = match bytes.get(at + 1) {
            Some(b) => *b,
            None => return Err(DecodeError::new(at, "unterminated escape sequence")),
        };

        if let Some(replacement) = short_unescape(next) {
            out.push(replacement);
            at += 2;
        } else if next == b'u' {
            if at + 6 > bytes.len() {
                return Err(DecodeError::new(
                    at,
                    "unterminated Unicode escape sequence (must have 4 hex characters)",
                ));
            }
            let unit = hex4(bytes, at + 2)?;

            if is_low_surrogate(unit) {
                return Err(DecodeError::new(
                    at,
                    format!("unpaired low surrogate ({})", &source[at..at + 6]),
                ));
            } else if is_high_surrogate(unit) {
                // The next six characters must be the low half.
                if at + 12 > bytes.len() || bytes[at + 6] != b'\\' || bytes[at + 7] != b'u' {
                    return Err(DecodeError::new(
                        at,
                        format!("unpaired high surrogate ({})", &source[at..at + 6]),
                    ));
                }
                let low = hex4(bytes, at + 8)?;
                if !is_low_surrogate(low) {
                    return Err(DecodeError::new(
                        at,
                        format!("unpaired high surrogate ({})", &source[at..at + 6]),
                    ));
                }
                let code_point = combine_surrogates(unit, low);
                match char::from_u32(code_point) {
                    Some(c) => out.push(c),
                    None => {
                        return Err(DecodeError::new(
                            at,
                            format!("\\u escapes do not form a scalar value (U+{code_point:04X})"),
                        ))
                    }
                }
                at += 12;
            } else {
                // Always a scalar value: the surrogate range was handled
                // above and every other u16 is valid.
                match char::from_u32(u32::from(unit)) {
                    Some(c) => out.push(c),
                    None => {
                        return Err(DecodeError::new(
                            at,
                            format!("\\u{unit:04x} is not a scalar value"),
                        ))
                    }
                }
                at += 6;
            }
        } else {
            return Err(DecodeError::new(
                at,
                format!("unknown escape character: {}", next as char),
            ));
        }

        run_start = at;
    }

    out.push_str(&source[run_start..]);
    Ok(out)
}

// ── CESU-8 decoding ──────────────────────────────────────────

fn push_raw_code_unit(out: &mut Vec<u8>, unit: u16) {
    let value = u32::from(unit);
    if value < 0x80 {
        out.push(value as u8);
    } else if value < 0x800 {
        out.push(0xc0 | (value >> 6) as u8);
        out.push(0x80 | (value & 0x3f) as u8);
    } else {
        out.push(0xe0 | (value >> 12) as u8);
        out.push(0x80 | ((value >> 6) & 0x3f) as u8);
        out.push(0x80 | (value & 0x3f) as u8);
    }
}

/// Like [`decode_string`], but every `\uXXXX` escape is emitted as its own
/// three-byte sequence without surrogate pairing.
///
/// Surrogate code units are not Unicode scalar values, so the result is a
/// byte vector rather than a `String`: output containing unpaired
/// surrogates is CESU-8, not UTF-8.
pub fn decode_string_cesu8(source: &str) -> Result<Vec<u8>, DecodeError> {
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(source.len());
    let mut run_start = 0usize;
    let mut at = 0usize;

    while at < bytes.len() {
        if bytes[at] != b'\\' {
            at += 1;
            continue;
        }

        out.extend_from_slice(&bytes[run_start..at]);

        let next = match bytes.get(at + 1) {
            Some(b) => *b,
            None => return Err(DecodeError::new(at, "unterminated escape sequence")),
        };

        if let Some(replacement) = short_unescape(next) {
            out.push(replacement as u8);
            at += 2;
        } else if next == b'u' {
            if at + 6 > bytes.len() {
                return Err(DecodeError::new(
                    at,
                    "unterminated Unicode escape sequence (must have 4 hex characters)",
                ));
            }
            let unit = hex4(bytes, at + 2)?;
            push_raw_code_unit(&mut out, unit);
            at += 6;
        } else {
            return Err(DecodeError::new(
                at,
                format!("unknown escape character: {}", next as char),
            ));
        }

        run_start = at;
    }

    out.extend_from_slice(&bytes[run_start..]);
    Ok(out)
}
