//! PDF name objects and the table of well-known names.
//!
//! PDF Spec: ISO 32000-1:2008, Section 7.3.5 - Name Objects
//!
//! Names are the keys of every dictionary and most of its values, so they are
//! compared constantly while copying and signing. The names the library itself
//! reads and writes are kept in a compile-time perfect hash set; parsing a
//! well-known name hands back the static string instead of allocating, and
//! two static names compare by pointer first.
//!
//! Names carry their decoded form. [`Name::to_pdf_bytes`] produces the
//! `/Name#20With#20Escapes` syntax and [`decode_name_escapes`] reverses it.

use phf::phf_set;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A PDF name (without the leading `/`).
#[derive(Clone)]
pub struct Name(Repr);

#[derive(Clone)]
enum Repr {
    Static(&'static str),
    Owned(Arc<str>),
}

impl Name {
    /// Create a name from a static string without consulting the table.
    pub const fn from_static(s: &'static str) -> Self {
        Name(Repr::Static(s))
    }

    /// Create a name, reusing the canonical instance when it is well known.
    pub fn new(s: &str) -> Self {
        match WELL_KNOWN.get_key(s) {
            Some(known) => Name(Repr::Static(known)),
            None => Name(Repr::Owned(Arc::from(s))),
        }
    }

    /// Decode a raw name token (without `/`) containing `#xx` escapes.
    pub fn from_escaped(raw: &[u8]) -> Self {
        Name::new(&decode_name_escapes(raw))
    }

    /// The decoded name text.
    pub fn as_str(&self) -> &str {
        match &self.0 {
            Repr::Static(s) => s,
            Repr::Owned(s) => s,
        }
    }

    /// Whether this name belongs to the well-known table.
    pub fn is_well_known(&self) -> bool {
        WELL_KNOWN.contains(self.as_str())
    }

    /// PDF syntax for this name, including the leading `/`.
    pub fn to_pdf_bytes(&self) -> Vec<u8> {
        encode_name(self.as_str())
    }
}

/// Whether a byte may appear unescaped in a serialized name.
///
/// Delimiters, whitespace, `#` and anything outside `!`..`~` must be
/// written as `#XX`.
pub fn is_regular_name_byte(byte: u8) -> bool {
    matches!(byte, b'!'..=b'~')
        && !matches!(
            byte,
            b'#' | b'%' | b'(' | b')' | b'/' | b'<' | b'>' | b'[' | b']' | b'{' | b'}'
        )
}

/// Encode a name in PDF syntax (`/` followed by the escaped text).
pub fn encode_name(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 1);
    out.push(b'/');
    for byte in name.bytes() {
        if is_regular_name_byte(byte) {
            out.push(byte);
        } else {
            out.extend_from_slice(format!("#{:02X}", byte).as_bytes());
        }
    }
    out
}

/// Decode `#XX` escape sequences in a raw name token.
///
/// Invalid sequences are kept literally. Decoded bytes that do not form
/// UTF-8 are mapped one byte per character.
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            let hex = &raw[i + 1..i + 3];
            if let Some(byte) = std::str::from_utf8(hex)
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok())
            {
                bytes.push(byte);
                i += 3;
                continue;
            }
        }
        bytes.push(raw[i]);
        i += 1;
    }

    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        if let (Repr::Static(a), Repr::Static(b)) = (&self.0, &other.0) {
            if std::ptr::eq(*a, *b) {
                return true;
            }
        }
        self.as_str() == other.as_str()
    }
}

impl Eq for Name {}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Must match `str` hashing so `Borrow<str>` lookups work.
        self.as_str().hash(state)
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl Borrow<str> for Name {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::new(s)
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name::new(&s)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.as_str())
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_pdf_bytes()))
    }
}

macro_rules! well_known_names {
    ($($konst:ident => $text:tt),* $(,)?) => {
        $(
            #[allow(missing_docs)]
            pub const $konst: Name = Name::from_static($text);
        )*

        static WELL_KNOWN: phf::Set<&'static str> = phf_set! { $($text),* };

        #[cfg(test)]
        const ALL_CONSTANTS: &[Name] = &[$($konst),*];
    };
}

well_known_names! {
    A => "A",
    ACRO_FORM => "AcroForm",
    ACTION_JAVASCRIPT => "JavaScript",
    ADOBE_PPKLITE => "Adobe.PPKLite",
    ADBE_PKCS7_DETACHED => "adbe.pkcs7.detached",
    ADBE_PKCS7_SHA1 => "adbe.pkcs7.sha1",
    ANNOT => "Annot",
    ANNOTS => "Annots",
    B => "B",
    BBOX => "BBox",
    BYTE_RANGE => "ByteRange",
    C => "C",
    CATALOG => "Catalog",
    CLASS_MAP => "ClassMap",
    CONTACT_INFO => "ContactInfo",
    CONTENTS => "Contents",
    COUNT => "Count",
    CROP_BOX => "CropBox",
    D => "D",
    DA => "DA",
    DECODE_PARMS => "DecodeParms",
    DEST => "Dest",
    DESTS => "Dests",
    DR => "DR",
    ETSI_CADES_DETACHED => "ETSI.CAdES.detached",
    F => "F",
    FILTER => "Filter",
    FIELDS => "Fields",
    FIRST => "First",
    FLATE_DECODE => "FlateDecode",
    FT => "FT",
    GOTO => "GoTo",
    GOTOR => "GoToR",
    HIDE => "Hide",
    ID => "ID",
    INDEX => "Index",
    INFO => "Info",
    JS => "JS",
    K => "K",
    KIDS => "Kids",
    LAST => "Last",
    LAUNCH => "Launch",
    LENGTH => "Length",
    LOCATION => "Location",
    M => "M",
    MARK_INFO => "MarkInfo",
    MARKED => "Marked",
    MCR => "MCR",
    MEDIA_BOX => "MediaBox",
    N => "N",
    NAME => "Name",
    NAMES => "Names",
    NEED_APPEARANCES => "NeedAppearances",
    NEW_WINDOW => "NewWindow",
    NEXT => "Next",
    NUMS => "Nums",
    OBJR => "OBJR",
    OBJ_STM => "ObjStm",
    OUTLINES => "Outlines",
    P => "P",
    PAGE => "Page",
    PAGES => "Pages",
    PARENT => "Parent",
    PARENT_TREE => "ParentTree",
    PARENT_TREE_NEXT_KEY => "ParentTreeNextKey",
    PG => "Pg",
    PREDICTOR => "Predictor",
    COLUMNS => "Columns",
    PREV => "Prev",
    REASON => "Reason",
    RECT => "Rect",
    RESOURCES => "Resources",
    ROLE_MAP => "RoleMap",
    ROOT => "Root",
    ROTATE => "Rotate",
    S => "S",
    SET_OCG_STATE => "SetOCGState",
    SIG => "Sig",
    SIG_FLAGS => "SigFlags",
    SIZE => "Size",
    STRUCT_ELEM => "StructElem",
    STRUCT_PARENT => "StructParent",
    STRUCT_PARENTS => "StructParents",
    STRUCT_TREE_ROOT => "StructTreeRoot",
    SUBFILTER => "SubFilter",
    SUBTYPE => "Subtype",
    T => "T",
    TITLE => "Title",
    TYPE => "Type",
    URI => "URI",
    V => "V",
    W => "W",
    WIDGET => "Widget",
    XREF => "XRef",
    XREF_STM => "XRefStm",
    XYZ => "XYZ",
    FIT => "Fit",
    FIT_H => "FitH",
    FIT_V => "FitV",
    FIT_R => "FitR",
    FIT_B => "FitB",
    FIT_BH => "FitBH",
    FIT_BV => "FitBV",
}
