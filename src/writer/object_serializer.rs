//! PDF object serialization.
//!
//! Serializes PDF objects to their byte representation according to
//! PDF specification ISO 32000-1:2008, Section 7.3.
//!
//! Dictionaries keep their insertion order. Strings keep their literal or
//! hex form. Stream data is written exactly as held, with `/Length` set to
//! the byte count.

use crate::names::{self, Name};
use crate::object::{Dictionary, Object, ObjectRef, PdfString, StringFormat};
use std::io::Write;

/// A placeholder written inside a dictionary, located relative to the start of the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPosition {
    /// Dictionary key that owns the slot
    pub key: Name,
    /// Offset of the first placeholder byte
    pub offset: usize,
    /// Placeholder length in bytes
    pub len: usize,
}

/// Serializer for PDF objects.
///
/// Converts PDF Object types to their byte representation following
/// the PDF specification syntax rules.
#[derive(Debug, Clone, Default)]
pub struct ObjectSerializer {
    /// Whether to use compact formatting (minimal whitespace)
    compact: bool,
}

impl ObjectSerializer {
    /// Create a new object serializer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compact serializer (minimal whitespace).
    pub fn compact() -> Self {
        Self { compact: true }
    }

    /// Create a serializer with the given formatting.
    pub fn with_compact(compact: bool) -> Self {
        Self { compact }
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        // Writes into a Vec<u8> cannot fail
        let _ = self.write_object(&mut buf, obj);
        buf
    }

    /// Serialize an object to a string (for debugging and tests).
    pub fn serialize_to_string(&self, obj: &Object) -> String {
        String::from_utf8_lossy(&self.serialize(obj)).into_owned()
    }

    /// Serialize an indirect object definition.
    ///
    /// Format: `{id} {gen} obj\n{object}\nendobj\n`
    pub fn serialize_indirect(&self, reference: ObjectRef, obj: &Object) -> Vec<u8> {
        let mut buf = format!("{} {} obj\n", reference.id, reference.gen).into_bytes();
        let _ = self.write_object(&mut buf, obj);
        buf.extend_from_slice(b"\nendobj\n");
        buf
    }

    /// Serialize an indirect dictionary with fixed-width placeholders.
    ///
    /// Each `(key, len)` in `reserved` is written as the key followed by
    /// `len` spaces, replacing the dictionary's own value for that key if it
    /// has one; keys the dictionary lacks are appended at the end. Returns
    /// the bytes and where each placeholder landed.
    pub fn serialize_reserved(
        &self,
        reference: ObjectRef,
        dict: &Dictionary,
        reserved: &[(Name, usize)],
    ) -> (Vec<u8>, Vec<SlotPosition>) {
        let mut buf = format!("{} {} obj\n<<", reference.id, reference.gen).into_bytes();
        let mut slots = Vec::with_capacity(reserved.len());

        let mut place = |buf: &mut Vec<u8>, key: &Name, len: usize| {
            self.write_entry_separator(buf);
            buf.extend_from_slice(&key.to_pdf_bytes());
            buf.push(b' ');
            slots.push(SlotPosition {
                key: key.clone(),
                offset: buf.len(),
                len,
            });
            buf.resize(buf.len() + len, b' ');
        };

        for (key, value) in dict.iter() {
            match reserved.iter().find(|(k, _)| k == key) {
                Some((_, len)) => place(&mut buf, key, *len),
                None => {
                    self.write_entry_separator(&mut buf);
                    buf.extend_from_slice(&key.to_pdf_bytes());
                    buf.push(b' ');
                    let _ = self.write_object(&mut buf, value);
                },
            }
        }
        for (key, len) in reserved {
            if !dict.contains_key(key.as_str()) {
                place(&mut buf, key, *len);
            }
        }

        if !self.compact {
            buf.push(b'\n');
        }
        buf.extend_from_slice(b">>\nendobj\n");
        (buf, slots)
    }

    fn write_entry_separator(&self, buf: &mut Vec<u8>) {
        if self.compact {
            buf.push(b' ');
        } else {
            buf.extend_from_slice(b"\n  ");
        }
    }

    /// Write an object to a buffer.
    pub fn write_object<W: Write>(&self, w: &mut W, obj: &Object) -> std::io::Result<()> {
        match obj {
            Object::Null => write!(w, "null"),
            Object::Boolean(b) => write!(w, "{}", if *b { "true" } else { "false" }),
            Object::Integer(i) => write!(w, "{}", i),
            Object::Real(r) => self.write_real(w, *r),
            Object::String(s) => self.write_string(w, s),
            Object::Name(n) => self.write_name(w, n),
            Object::Array(arr) => self.write_array(w, arr),
            Object::Dictionary(dict) => self.write_dictionary(w, dict),
            Object::Stream { dict, data } => self.write_stream(w, dict, data),
            Object::Reference(r) => write!(w, "{} {} R", r.id, r.gen),
        }
    }

    /// Write a real number with appropriate precision.
    fn write_real<W: Write>(&self, w: &mut W, value: f64) -> std::io::Result<()> {
        if !value.is_finite() {
            log::warn!("Non-finite real {} written as 0", value);
            return write!(w, "0");
        }
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            write!(w, "{}", value as i64)
        } else {
            // Five decimals, trailing zeros trimmed
            let formatted = format!("{:.5}", value);
            let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
            match trimmed {
                "-0" | "" => write!(w, "0"),
                other => write!(w, "{}", other),
            }
        }
    }

    /// Write a PDF string in the form it was read or built with.
    ///
    /// Literal strings escape delimiters and backslashes; other
    /// non-printable bytes become three-digit octal escapes.
    fn write_string<W: Write>(&self, w: &mut W, s: &PdfString) -> std::io::Result<()> {
        match s.format {
            StringFormat::Hex => {
                write!(w, "<")?;
                for byte in &s.bytes {
                    write!(w, "{:02X}", byte)?;
                }
                write!(w, ">")
            },
            StringFormat::Literal => {
                write!(w, "(")?;
                for &byte in &s.bytes {
                    match byte {
                        b'(' => write!(w, "\\(")?,
                        b')' => write!(w, "\\)")?,
                        b'\\' => write!(w, "\\\\")?,
                        b'\n' => write!(w, "\\n")?,
                        b'\r' => write!(w, "\\r")?,
                        b'\t' => write!(w, "\\t")?,
                        0x08 => write!(w, "\\b")?,
                        0x0C => write!(w, "\\f")?,
                        0x20..=0x7E => w.write_all(&[byte])?,
                        _ => write!(w, "\\{:03o}", byte)?,
                    }
                }
                write!(w, ")")
            },
        }
    }

    /// Write a PDF name.
    fn write_name<W: Write>(&self, w: &mut W, name: &Name) -> std::io::Result<()> {
        w.write_all(&name.to_pdf_bytes())
    }

    /// Write a PDF array.
    fn write_array<W: Write>(&self, w: &mut W, arr: &[Object]) -> std::io::Result<()> {
        write!(w, "[")?;
        for (i, obj) in arr.iter().enumerate() {
            if i > 0 {
                write!(w, " ")?;
            }
            self.write_object(w, obj)?;
        }
        write!(w, "]")
    }

    /// Write a PDF dictionary in insertion order.
    fn write_dictionary<W: Write>(&self, w: &mut W, dict: &Dictionary) -> std::io::Result<()> {
        write!(w, "<<")?;

        for (key, value) in dict.iter() {
            if self.compact {
                write!(w, " ")?;
            } else {
                write!(w, "\n  ")?;
            }
            self.write_name(w, key)?;
            write!(w, " ")?;
            self.write_object(w, value)?;
        }

        if self.compact {
            if !dict.is_empty() {
                write!(w, " ")?;
            }
        } else if !dict.is_empty() {
            writeln!(w)?;
        }
        write!(w, ">>")
    }

    /// Write a PDF stream; `/Length` always matches the data written.
    fn write_stream<W: Write>(&self, w: &mut W, dict: &Dictionary, data: &[u8]) -> std::io::Result<()> {
        let mut dict_with_length = dict.clone();
        dict_with_length.insert(names::LENGTH, data.len());

        self.write_dictionary(w, &dict_with_length)?;
        write!(w, "\nstream\n")?;
        w.write_all(data)?;
        write!(w, "\nendstream")
    }
}

/// Helper functions for building PDF objects.
impl ObjectSerializer {
    /// Create a Dictionary object from key-value pairs.
    pub fn dict(entries: Vec<(Name, Object)>) -> Object {
        Object::Dictionary(entries.into_iter().collect())
    }

    /// Create a rectangle array [x, y, width, height] -> [llx, lly, urx, ury].
    pub fn rect(x: f64, y: f64, width: f64, height: f64) -> Object {
        Object::Array(vec![
            Object::Real(x),
            Object::Real(y),
            Object::Real(x + width),
            Object::Real(y + height),
        ])
    }
}
