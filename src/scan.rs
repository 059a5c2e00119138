//! Token recognizers for JSON numbers and strings.
//!
//! These primitives delimit tokens in a byte buffer without converting
//! them.  A successful number match tells the caller how many bytes the
//! token spans and whether it looked decimal; a successful string match
//! reports the span including both quotes and whether a decode pass is
//! needed to materialize the text.  Numeric conversion and escape
//! translation happen elsewhere, on demand.

/// Result of attempting to match a number token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberMatch {
    /// Whether a complete number token was recognized.
    pub matched: bool,
    /// Whether a `.` or exponent marker was seen.  A matched token with
    /// this unset is an integer.
    pub decimal: bool,
    /// Bytes consumed (on failure, the length examined before giving up).
    pub length: usize,
}

impl NumberMatch {
    fn complete(decimal: bool, length: usize) -> NumberMatch {
        NumberMatch {
            matched: true,
            decimal,
            length,
        }
    }

    fn unmatched(length: usize) -> NumberMatch {
        NumberMatch {
            matched: false,
            decimal: false,
            length,
        }
    }
}

/// Result of attempting to match a string token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringMatch {
    /// Whether a complete string token (through the closing quote) was
    /// recognized.
    pub matched: bool,
    /// Whether any `\` was seen.  When unset, the token contents are
    /// already the decoded UTF-8 text.
    pub needs_unescape: bool,
    /// Bytes consumed, including both quotes.
    pub length: usize,
}

impl StringMatch {
    fn complete(needs_unescape: bool, length: usize) -> StringMatch {
        StringMatch {
            matched: true,
            needs_unescape,
            length,
        }
    }

    fn unmatched(length: usize) -> StringMatch {
        StringMatch {
            matched: false,
            needs_unescape: false,
            length,
        }
    }
}

// ── Number matching ──────────────────────────────────────────
// Grammar: -? (0 | [1-9][0-9]*) (. [0-9]+)? ([eE][+-]?[0-9]+)?
// A leading zero cannot be followed by another digit.  Consumption stops
// at the first byte that cannot continue the token.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberState {
    LeadingMinus,
    LeadingZero,
    Integer,
    Decimal,
    Exponent,
    ExponentSign,
    Complete,
}

/// Attempt to recognize a JSON number at the start of `input`.
pub fn match_number(input: &[u8]) -> NumberMatch {
    let mut length = 0usize;
    let mut decimal = false;

    let current = |length: usize| -> u8 {
        if length < input.len() {
            input[length]
        } else {
            0
        }
    };

    let mut state = match current(length) {
        b'-' => {
            length += 1;
            NumberState::LeadingMinus
        }
        b'0' => {
            length += 1;
            NumberState::LeadingZero
        }
        b'1'..=b'9' => {
            length += 1;
            NumberState::Integer
        }
        _ => return NumberMatch::unmatched(length),
    };

    if state == NumberState::LeadingMinus {
        state = match current(length) {
            b'0' => {
                length += 1;
                NumberState::LeadingZero
            }
            b'1'..=b'9' => {
                length += 1;
                NumberState::Integer
            }
            _ => return NumberMatch::unmatched(length),
        };
    }

    if state == NumberState::LeadingZero {
        state = match current(length) {
            // "01" is not a number
            b'0'..=b'9' => return NumberMatch::unmatched(length),
            b'.' => {
                length += 1;
                decimal = true;
                NumberState::Decimal
            }
            b'e' | b'E' => {
                length += 1;
                decimal = true;
                NumberState::Exponent
            }
            _ => NumberState::Complete,
        };
    }

    while state == NumberState::Integer {
        state = match current(length) {
            b'0'..=b'9' => {
                length += 1;
                NumberState::Integer
            }
            b'.' => {
                length += 1;
                decimal = true;
                NumberState::Decimal
            }
            b'e' | b'E' => {
                length += 1;
                decimal = true;
                NumberState::Exponent
            }
            _ => NumberState::Complete,
        };
    }

    if state == NumberState::Decimal {
        // The '.' must be followed by at least one digit.
        match current(length) {
            b'0'..=b'9' => length += 1,
            _ => return NumberMatch::unmatched(length),
        }

        while state == NumberState::Decimal {
            state = match current(length) {
                b'0'..=b'9' => {
                    length += 1;
                    NumberState::Decimal
                }
                b'e' | b'E' => {
                    length += 1;
                    NumberState::Exponent
                }
                _ => NumberState::Complete,
            };
        }
    }

    if state == NumberState::Exponent {
        // 'e' must be followed by an optional sign, then at least one digit.
        state = match current(length) {
            b'0'..=b'9' => {
                length += 1;
                NumberState::Exponent
            }
            b'+' | b'-' => {
                length += 1;
                NumberState::ExponentSign
            }
            _ => return NumberMatch::unmatched(length),
        };
    }

    if state == NumberState::ExponentSign {
        state = match current(length) {
            b'0'..=b'9' => {
                length += 1;
                NumberState::Exponent
            }
            _ => return NumberMatch::unmatched(length),
        };
    }

    while state == NumberState::Exponent {
        state = match current(length) {
            b'0'..=b'9' => {
                length += 1;
                NumberState::Exponent
            }
            _ => NumberState::Complete,
        };
    }

    NumberMatch::complete(decimal, length)
}

// ── String matching ──────────────────────────────────────────

fn is_short_escape(b: u8) -> bool {
    matches!(b, b'b' | b'f' | b'n' | b'r' | b't' | b'\\' | b'/' | b'"')
}

/// Length of a UTF-8 sequence from its leading byte, or `None` when the
/// byte cannot lead a sequence.  Lengths 5 and 6 are accepted here even
/// though no scalar value needs them; the decoder is the layer that cares
/// about scalar range.
fn utf8_sequence_length(b: u8) -> Option<usize> {
    if b & 0xe0 == 0xc0 {
        Some(2)
    } else if b & 0xf0 == 0xe0 {
        Some(3)
    } else if b & 0xf8 == 0xf0 {
        Some(4)
    } else if b & 0xfc == 0xf8 {
        Some(5)
    } else if b & 0xfe == 0xfc {
        Some(6)
    } else {
        None
    }
}

fn is_utf8_continuation(b: u8) -> bool {
    b & 0xc0 == 0x80
}

/// Attempt to recognize a JSON string at the start of `input`, which must
/// begin with `"`.
///
/// Enforces that every `\` is followed by a legal escape (with `u`
/// requiring four hex digits), and that multi-byte UTF-8 sequences are
/// complete with proper continuation bytes.  With `strict` set,
/// non-printable ASCII bytes inside the string are rejected.
pub fn match_string(input: &[u8], strict: bool) -> StringMatch {
    debug_assert!(input.first() == Some(&b'"'));

    let mut at = 1usize;
    let mut length = 1usize;
    let mut escaped = false;

    while at < input.len() {
        let b = input[at];
        if b == b'"' {
            length += 1;
            return StringMatch::complete(escaped, length);
        } else if b == b'\\' {
            escaped = true;
            if at + 1 == input.len() {
                return StringMatch::unmatched(length);
            } else if input[at + 1] == b'u' {
                at += 2;
                length += 2;

                if at + 4 > input.len() {
                    return StringMatch::unmatched(length);
                }
                if input[at..at + 4].iter().all(u8::is_ascii_hexdigit) {
                    at += 4;
                    length += 4;
                } else {
                    return StringMatch::unmatched(length);
                }
            } else if is_short_escape(input[at + 1]) {
                at += 2;
                length += 2;
            } else {
                return StringMatch::unmatched(length);
            }
        } else if b & 0x80 == 0 {
            if strict && !matches!(b, 0x20..=0x7e) {
                return StringMatch::unmatched(length);
            }
            at += 1;
            length += 1;
        } else if let Some(seq_length) = utf8_sequence_length(b) {
            if at + seq_length > input.len() {
                return StringMatch::unmatched(length);
            }
            for offset in 1..seq_length {
                if !is_utf8_continuation(input[at + offset]) {
                    return StringMatch::unmatched(length + offset);
                }
            }
            at += seq_length;
            length += seq_length;
        } else {
            return StringMatch::unmatched(length);
        }
    }

    // Ran out of input before the closing quote.
    StringMatch::unmatched(length)
}
