//! Canonical JSON text emission over the value model.
//!
//! An `Encoder` is a set of `write_*` primitives plus a provided `encode`
//! walk that visits a value in order.  The compact encoder emits no
//! whitespace at all; the pretty encoder puts a newline after every
//! structural delimiter and indents two spaces per depth.  Both emit
//! object keys in stored (sorted) order and share the string escaping in
//! [`crate::strings`].
//!
//! Non-finite decimals have no JSON spelling, so NaN and the infinities
//! are emitted as `null` to keep output parseable.  Finite decimals
//! always carry a fractional or exponent marker so they reparse as
//! decimals rather than integers.

use std::fmt;

use crate::strings::encode_string_into;
use crate::value::Value;

/// A sink for JSON text.  Implementations provide the `write_*`
/// primitives; `encode` drives them over a value tree.
pub trait Encoder {
    fn write_null(&mut self) -> fmt::Result;
    fn write_boolean(&mut self, value: bool) -> fmt::Result;
    fn write_integer(&mut self, value: i64) -> fmt::Result;
    fn write_decimal(&mut self, value: f64) -> fmt::Result;
    fn write_string(&mut self, value: &str) -> fmt::Result;

    fn write_object_begin(&mut self) -> fmt::Result;
    fn write_object_key(&mut self, key: &str) -> fmt::Result;
    fn write_object_delimiter(&mut self) -> fmt::Result;
    fn write_object_end(&mut self) -> fmt::Result;

    fn write_array_begin(&mut self) -> fmt::Result;
    /// Called before each array element, delimiter included.
    fn write_array_element(&mut self) -> fmt::Result {
        Ok(())
    }
    fn write_array_delimiter(&mut self) -> fmt::Result;
    fn write_array_end(&mut self) -> fmt::Result;

    /// Walk `source`, dispatching to the primitives.
    fn encode(&mut self, source: &Value) -> fmt::Result {
        match source {
            Value::Null => self.write_null(),
            Value::Boolean(value) => self.write_boolean(*value),
            Value::Integer(value) => self.write_integer(*value),
            Value::Decimal(value) => self.write_decimal(*value),
            Value::String(value) => self.write_string(value),
            Value::Array(elements) => {
                self.write_array_begin()?;
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        self.write_array_delimiter()?;
                    }
                    self.write_array_element()?;
                    self.encode(element)?;
                }
                self.write_array_end()
            }
            Value::Object(members) => {
                self.write_object_begin()?;
                for (index, (key, value)) in members.iter().enumerate() {
                    if index > 0 {
                        self.write_object_delimiter()?;
                    }
                    self.write_object_key(key)?;
                    self.encode(value)?;
                }
                self.write_object_end()
            }
        }
    }
}

fn write_quoted(out: &mut impl fmt::Write, value: &str, ascii_only: bool) -> fmt::Result {
    let mut encoded = String::with_capacity(value.len() + 2);
    encode_string_into(&mut encoded, value, ascii_only);
    write!(out, "\"{encoded}\"")
}

fn write_decimal_text(out: &mut impl fmt::Write, value: f64) -> fmt::Result {
    if !value.is_finite() {
        return write!(out, "null");
    }
    let text = format!("{value}");
    if text.contains('.') || text.contains('e') || text.contains('E') {
        write!(out, "{text}")
    } else {
        // Keep the token a decimal on the wire.
        write!(out, "{text}.0")
    }
}

// ── Compact ──────────────────────────────────────────────────

/// Emits the densest valid text: commas and colons only.
pub struct CompactEncoder<W: fmt::Write> {
    out: W,
    ascii_only: bool,
}

impl<W: fmt::Write> CompactEncoder<W> {
    pub fn new(out: W) -> CompactEncoder<W> {
        CompactEncoder {
            out,
            ascii_only: true,
        }
    }

    /// When unset, characters above ASCII pass through as raw UTF-8
    /// instead of `\uXXXX` escapes.
    pub fn with_ascii_only(mut self, ascii_only: bool) -> CompactEncoder<W> {
        self.ascii_only = ascii_only;
        self
    }
}

impl<W: fmt::Write> Encoder for CompactEncoder<W> {
    fn write_null(&mut self) -> fmt::Result {
        write!(self.out, "null")
    }

    fn write_boolean(&mut self, value: bool) -> fmt::Result {
        write!(self.out, "{}", if value { "true" } else { "false" })
    }

    fn write_integer(&mut self, value: i64) -> fmt::Result {
        write!(self.out, "{value}")
    }

    fn write_decimal(&mut self, value: f64) -> fmt::Result {
        write_decimal_text(&mut self.out, value)
    }

    fn write_string(&mut self, value: &str) -> fmt::Result {
        write_quoted(&mut self.out, value, self.ascii_only)
    }

    fn write_object_begin(&mut self) -> fmt::Result {
        write!(self.out, "{{")
    }

    fn write_object_key(&mut self, key: &str) -> fmt::Result {
        write_quoted(&mut self.out, key, self.ascii_only)?;
        write!(self.out, ":")
    }

    fn write_object_delimiter(&mut self) -> fmt::Result {
        write!(self.out, ",")
    }

    fn write_object_end(&mut self) -> fmt::Result {
        write!(self.out, "}}")
    }

    fn write_array_begin(&mut self) -> fmt::Result {
        write!(self.out, "[")
    }

    fn write_array_delimiter(&mut self) -> fmt::Result {
        write!(self.out, ",")
    }

    fn write_array_end(&mut self) -> fmt::Result {
        write!(self.out, "]")
    }
}

// ── Pretty ───────────────────────────────────────────────────

/// Emits one element per line, indented two spaces per depth.
pub struct PrettyEncoder<W: fmt::Write> {
    out: W,
    ascii_only: bool,
    depth: usize,
    /// One entry per open container: whether it has emitted a child yet,
    /// so empty containers close on the same line.
    children: Vec<bool>,
}

impl<W: fmt::Write> PrettyEncoder<W> {
    pub fn new(out: W) -> PrettyEncoder<W> {
        PrettyEncoder {
            out,
            ascii_only: true,
            depth: 0,
            children: Vec::new(),
        }
    }

    pub fn with_ascii_only(mut self, ascii_only: bool) -> PrettyEncoder<W> {
        self.ascii_only = ascii_only;
        self
    }

    fn newline(&mut self) -> fmt::Result {
        write!(self.out, "\n")?;
        for _ in 0..self.depth {
            write!(self.out, "  ")?;
        }
        Ok(())
    }

    fn begin_child(&mut self) -> fmt::Result {
        if let Some(seen) = self.children.last_mut() {
            *seen = true;
        }
        self.newline()
    }
}

impl<W: fmt::Write> Encoder for PrettyEncoder<W> {
    fn write_null(&mut self) -> fmt::Result {
        write!(self.out, "null")
    }

    fn write_boolean(&mut self, value: bool) -> fmt::Result {
        write!(self.out, "{}", if value { "true" } else { "false" })
    }

    fn write_integer(&mut self, value: i64) -> fmt::Result {
        write!(self.out, "{value}")
    }

    fn write_decimal(&mut self, value: f64) -> fmt::Result {
        write_decimal_text(&mut self.out, value)
    }

    fn write_string(&mut self, value: &str) -> fmt::Result {
        write_quoted(&mut self.out, value, self.ascii_only)
    }

    fn write_object_begin(&mut self) -> fmt::Result {
        self.depth += 1;
        self.children.push(false);
        write!(self.out, "{{")
    }

    fn write_object_key(&mut self, key: &str) -> fmt::Result {
        self.begin_child()?;
        write_quoted(&mut self.out, key, self.ascii_only)?;
        write!(self.out, ": ")
    }

    fn write_object_delimiter(&mut self) -> fmt::Result {
        write!(self.out, ",")
    }

    fn write_object_end(&mut self) -> fmt::Result {
        self.depth -= 1;
        let had_children = self.children.pop().unwrap_or(false);
        if had_children {
            self.newline()?;
        }
        write!(self.out, "}}")
    }

    fn write_array_begin(&mut self) -> fmt::Result {
        self.depth += 1;
        self.children.push(false);
        write!(self.out, "[")
    }

    fn write_array_element(&mut self) -> fmt::Result {
        self.begin_child()
    }

    fn write_array_delimiter(&mut self) -> fmt::Result {
        write!(self.out, ",")
    }

    fn write_array_end(&mut self) -> fmt::Result {
        self.depth -= 1;
        let had_children = self.children.pop().unwrap_or(false);
        if had_children {
            self.newline()?;
        }
        write!(self.out, "]")
    }
}

// ── Convenience ──────────────────────────────────────────────

/// The compact text form of `value`.
pub fn to_text(value: &Value) -> String {
    let mut out = String::new();
    CompactEncoder::new(&mut out)
        .encode(value)
        .expect("writing to a String cannot fail");
    out
}

/// The pretty text form of `value`.
pub fn to_text_pretty(value: &Value) -> String {
    let mut out = String::new();
    PrettyEncoder::new(&mut out)
        .encode(value)
        .expect("writing to a String cannot fail");
    out
}
