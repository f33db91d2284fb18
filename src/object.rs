//! PDF object types.
//!
//! PDF Spec: ISO 32000-1:2008, Section 7.3 - Objects
//!
//! An [`Object`] owns its direct children. Indirect children are held as
//! [`ObjectRef`] values, which are weak: resolving one needs the document
//! that owns the number space (see [`crate::reader::SourceDocument`]).

use crate::error::{Error, Result};
use crate::names::{self, Name};
use indexmap::IndexMap;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String with its serialization hint
    String(PdfString),
    /// Name (starting with /)
    Name(Name),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (key-value pairs, insertion ordered)
    Dictionary(Dictionary),
    /// Stream (dictionary + data)
    Stream {
        /// Stream dictionary
        dict: Dictionary,
        /// Raw stream data, still encoded with the stream's filters
        data: bytes::Bytes,
    },
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
///
/// Also serves as the lookup key of copy memo tables: equality and hashing
/// cover both the object and the generation number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

/// How a string is written back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringFormat {
    /// `(literal)` syntax with backslash escapes
    #[default]
    Literal,
    /// `<48656C6C6F>` syntax
    Hex,
}

/// A PDF string: raw bytes plus the syntax it was read with or should be written with.
#[derive(Debug, Clone, Default)]
pub struct PdfString {
    /// Raw string bytes
    pub bytes: Vec<u8>,
    /// Serialization hint
    pub format: StringFormat,
}

impl PdfString {
    /// Create a literal string.
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            format: StringFormat::Literal,
        }
    }

    /// Create a hex string.
    pub fn hex(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            format: StringFormat::Hex,
        }
    }

    /// Encode a text string (PDF Spec: Section 7.9.2.2).
    ///
    /// ASCII text is stored as is; anything else is stored as UTF-16BE with a
    /// byte order mark.
    pub fn from_text(text: &str) -> Self {
        if text.is_ascii() {
            return Self::literal(text.as_bytes());
        }
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Self::literal(bytes)
    }

    /// Decode a text string (UTF-16BE with BOM, UTF-8 with BOM, otherwise byte per char).
    pub fn to_text(&self) -> String {
        decode_text_string(&self.bytes)
    }
}

// Strings compare by content; the syntax hint is presentation only.
impl PartialEq for PdfString {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

/// Decode text string bytes.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .map(|c| u16::from_be_bytes([c[0], *c.get(1).unwrap_or(&0)]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if bytes.len() >= 3 && bytes[..3] == [0xEF, 0xBB, 0xBF] {
        return String::from_utf8_lossy(&bytes[3..]).into_owned();
    }
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// An insertion-ordered PDF dictionary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary(IndexMap<Name, Object>);

impl Dictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dictionary whose first entry is `/Type /<type_name>`.
    pub fn with_type(type_name: Name) -> Self {
        let mut dict = Self::new();
        dict.insert(names::TYPE, Object::Name(type_name));
        dict
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&Object> {
        self.0.get(key)
    }

    /// Look up a mutable value by key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Object> {
        self.0.get_mut(key)
    }

    /// Insert a value, keeping the position of an existing key.
    pub fn insert(&mut self, key: impl Into<Name>, value: impl Into<Object>) -> Option<Object> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove a key, preserving the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Object> {
        self.0.shift_remove(key)
    }

    /// Whether the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &Name> {
        self.0.keys()
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, Name, Object> {
        self.0.iter()
    }

    /// Iterate mutably over entries in insertion order.
    pub fn iter_mut(&mut self) -> indexmap::map::IterMut<'_, Name, Object> {
        self.0.iter_mut()
    }

    /// The `/Type` value, the dictionary's subtype tag.
    pub fn type_name(&self) -> Option<&str> {
        self.get_name("Type")
    }

    /// Whether `/Type` equals `expected`.
    pub fn has_type(&self, expected: &str) -> bool {
        self.type_name() == Some(expected)
    }

    /// Value of a name entry.
    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Object::as_name)
    }

    /// Value of an integer entry.
    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Object::as_integer)
    }

    /// Value of a reference entry.
    pub fn get_reference(&self, key: &str) -> Option<ObjectRef> {
        self.get(key).and_then(Object::as_reference)
    }

    /// Value of a direct dictionary entry.
    pub fn get_dict(&self, key: &str) -> Option<&Dictionary> {
        self.get(key).and_then(Object::as_dict)
    }

    /// Value of a direct array entry.
    pub fn get_array(&self, key: &str) -> Option<&Vec<Object>> {
        self.get(key).and_then(Object::as_array)
    }
}

impl IntoIterator for Dictionary {
    type Item = (Name, Object);
    type IntoIter = indexmap::map::IntoIter<Name, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Name, &'a Object);
    type IntoIter = indexmap::map::Iter<'a, Name, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<(Name, Object)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (Name, Object)>>(iter: I) -> Self {
        Dictionary(iter.into_iter().collect())
    }
}

impl Object {
    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Create a name object.
    pub fn name(name: &str) -> Self {
        Object::Name(Name::new(name))
    }

    /// Create a literal string object from text.
    pub fn text(text: &str) -> Self {
        Object::String(PdfString::from_text(text))
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to cast to a number, accepting integers and reals.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(n) => Some(n.as_str()),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Mutable dictionary access. Works for both Dictionary and Stream objects.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to string (bytes).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(&s.bytes),
            _ => None,
        }
    }

    /// Decode a string object as text.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Object::String(s) => Some(s.to_text()),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Require a dictionary, reporting the actual type otherwise.
    pub fn expect_dict(&self) -> Result<&Dictionary> {
        self.as_dict().ok_or_else(|| Error::InvalidObjectType {
            expected: "Dictionary".to_string(),
            found: self.type_name().to_string(),
        })
    }

    /// Decode stream data using the filters named in the stream dictionary.
    pub fn decode_stream_data(&self) -> Result<Vec<u8>> {
        match self {
            Object::Stream { dict, data } => crate::filters::decode_stream(dict, data),
            _ => Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: self.type_name().to_string(),
            }),
        }
    }
}

impl From<bool> for Object {
    fn from(b: bool) -> Self {
        Object::Boolean(b)
    }
}

impl From<i64> for Object {
    fn from(i: i64) -> Self {
        Object::Integer(i)
    }
}

impl From<i32> for Object {
    fn from(i: i32) -> Self {
        Object::Integer(i as i64)
    }
}

impl From<u32> for Object {
    fn from(i: u32) -> Self {
        Object::Integer(i as i64)
    }
}

impl From<usize> for Object {
    fn from(i: usize) -> Self {
        Object::Integer(i as i64)
    }
}

impl From<f64> for Object {
    fn from(r: f64) -> Self {
        Object::Real(r)
    }
}

impl From<f32> for Object {
    fn from(r: f32) -> Self {
        Object::Real(r as f64)
    }
}

impl From<Name> for Object {
    fn from(n: Name) -> Self {
        Object::Name(n)
    }
}

impl From<PdfString> for Object {
    fn from(s: PdfString) -> Self {
        Object::String(s)
    }
}

impl From<Dictionary> for Object {
    fn from(d: Dictionary) -> Self {
        Object::Dictionary(d)
    }
}

impl From<Vec<Object>> for Object {
    fn from(a: Vec<Object>) -> Self {
        Object::Array(a)
    }
}

impl From<ObjectRef> for Object {
    fn from(r: ObjectRef) -> Self {
        Object::Reference(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ref_display() {
        assert_eq!(ObjectRef::new(12, 3).to_string(), "12 3 R");
    }

    #[test]
    fn test_object_ref_hash_covers_generation() {
        let mut set = std::collections::HashSet::new();
        set.insert(ObjectRef::new(5, 0));
        set.insert(ObjectRef::new(5, 1));
        set.insert(ObjectRef::new(5, 0));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_dictionary_keeps_insertion_order() {
        let mut dict = Dictionary::with_type(names::PAGE);
        dict.insert("Zeta", 1);
        dict.insert("Alpha", 2);
        dict.insert("Mid", 3);
        let keys: Vec<&str> = dict.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["Type", "Zeta", "Alpha", "Mid"]);

        dict.remove("Zeta");
        let keys: Vec<&str> = dict.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["Type", "Alpha", "Mid"]);
    }

    #[test]
    fn test_dictionary_typed_getters() {
        let mut dict = Dictionary::with_type(names::PAGES);
        dict.insert(names::COUNT, 4);
        dict.insert(names::PARENT, ObjectRef::new(2, 0));
        dict.insert(names::KIDS, vec![Object::Reference(ObjectRef::new(3, 0))]);

        assert!(dict.has_type("Pages"));
        assert_eq!(dict.get_integer("Count"), Some(4));
        assert_eq!(dict.get_reference("Parent"), Some(ObjectRef::new(2, 0)));
        assert_eq!(dict.get_array("Kids").map(Vec::len), Some(1));
        assert!(dict.get_dict("Kids").is_none());
    }

    #[test]
    fn test_text_string_round_trip() {
        let ascii = PdfString::from_text("Chapter 1");
        assert_eq!(ascii.bytes, b"Chapter 1");
        assert_eq!(ascii.to_text(), "Chapter 1");

        let unicode = PdfString::from_text("Глава");
        assert_eq!(&unicode.bytes[..2], &[0xFE, 0xFF]);
        assert_eq!(unicode.to_text(), "Глава");
    }

    #[test]
    fn test_string_equality_ignores_format() {
        assert_eq!(PdfString::literal(b"ab".to_vec()), PdfString::hex(b"ab".to_vec()));
    }

    #[test]
    fn test_as_number_accepts_both_kinds() {
        assert_eq!(Object::Integer(3).as_number(), Some(3.0));
        assert_eq!(Object::Real(2.5).as_number(), Some(2.5));
        assert_eq!(Object::Null.as_number(), None);
    }

    #[test]
    fn test_expect_dict_reports_type() {
        let err = Object::Integer(1).expect_dict().unwrap_err();
        assert!(err.to_string().contains("Integer"));
    }

    #[test]
    fn test_decode_stream_data_rejects_non_stream() {
        assert!(Object::Null.decode_stream_data().is_err());
    }
}
