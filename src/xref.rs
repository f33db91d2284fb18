//! Cross-reference table parser.
//!
//! PDF Spec: ISO 32000-1:2008, Section 7.5.4 - Cross-Reference Table,
//! Section 7.5.8 - Cross-Reference Streams
//!
//! The xref table maps object numbers to byte offsets (or object stream
//! slots). Sections are read from `startxref` backwards through `/Prev`;
//! entries from newer sections shadow older ones. Hybrid files
//! (`/XRefStm` in a classic trailer) are merged too. When the chain is
//! unusable the table can be rebuilt by scanning for `N G obj` headers.

use crate::error::{Error, Result};
use crate::lexer::{keyword, unsigned};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser::{parse_indirect_object, parse_object, skip_whitespace};
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

lazy_static! {
    /// "N G obj" headers, for reconstruction
    static ref RE_OBJ_HEADER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"(?m)(?:^|[\r\n\s])(\d{1,10})\s+(\d{1,5})\s+obj\b").unwrap();
    /// "trailer <<"
    static ref RE_TRAILER: regex::bytes::Regex = regex::bytes::Regex::new(r"trailer\s*<<").unwrap();
}

/// Cross-reference table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free object (next free object number, generation)
    Free {
        /// Generation to use on reuse
        gen: u16,
    },
    /// Uncompressed object at a byte offset
    InUse {
        /// Byte offset of `N G obj`
        offset: u64,
        /// Generation number
        gen: u16,
    },
    /// Object stored in an object stream (PDF 1.5+)
    Compressed {
        /// Object number of the object stream
        stream_id: u32,
        /// Index within the object stream
        index: u32,
    },
}

/// Cross-reference table that maps object numbers to their locations.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Dictionary,
    /// Offset of the newest xref section (`startxref` value)
    startxref: Option<u64>,
    /// Whether the table was rebuilt by scanning
    reconstructed: bool,
    /// Whether the newest section is a cross-reference stream
    stream_based: bool,
}

impl CrossRefTable {
    /// Create a new empty cross-reference table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an entry.
    pub fn get(&self, id: u32) -> Option<&XRefEntry> {
        self.entries.get(&id)
    }

    /// Add an entry, replacing any existing one.
    pub fn add_entry(&mut self, id: u32, entry: XRefEntry) {
        self.entries.insert(id, entry);
    }

    /// References of all objects in use, sorted by number.
    pub fn in_use(&self) -> Vec<ObjectRef> {
        let mut refs: Vec<ObjectRef> = self
            .entries
            .iter()
            .filter_map(|(id, entry)| match entry {
                XRefEntry::Free { .. } => None,
                XRefEntry::InUse { gen, .. } => Some(ObjectRef::new(*id, *gen)),
                XRefEntry::Compressed { .. } => Some(ObjectRef::new(*id, 0)),
            })
            .filter(|r| r.id != 0)
            .collect();
        refs.sort();
        refs
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The merged trailer dictionary of the newest section.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Offset of the newest xref section, if read from `startxref`.
    pub fn startxref(&self) -> Option<u64> {
        self.startxref
    }

    /// Whether the table was rebuilt by scanning.
    pub fn is_reconstructed(&self) -> bool {
        self.reconstructed
    }

    /// Whether the newest section (the one `startxref` points to) is an xref stream.
    pub fn is_stream_based(&self) -> bool {
        self.stream_based
    }

    /// One past the highest object number in use (`/Size` semantics).
    pub fn size(&self) -> u32 {
        let from_entries = self.entries.keys().max().map(|m| m + 1).unwrap_or(1);
        let declared = self.trailer.get_integer("Size").unwrap_or(0).max(0) as u32;
        from_entries.max(declared)
    }

    /// Add entries from an older section without shadowing newer ones.
    fn merge_older(&mut self, older: HashMap<u32, XRefEntry>) {
        for (id, entry) in older {
            self.entries.entry(id).or_insert(entry);
        }
    }
}

/// Locate the `startxref` offset near the end of the file.
pub fn find_startxref(data: &[u8]) -> Result<u64> {
    let window_start = data.len().saturating_sub(2048);
    let window = &data[window_start..];
    let pos = window
        .windows(b"startxref".len())
        .rposition(|w| w == b"startxref")
        .ok_or(Error::InvalidXref)?;
    let after = &window[pos + b"startxref".len()..];
    unsigned(after).map(|(_, offset)| offset).map_err(|_| Error::InvalidXref)
}

/// Parse the full cross-reference chain starting at `startxref`.
pub fn parse_xref_chain(data: &[u8]) -> Result<CrossRefTable> {
    let start = find_startxref(data)?;
    let mut table = CrossRefTable::new();
    table.startxref = Some(start);

    let mut visited = HashSet::new();
    let mut next = Some(start);
    let mut newest = true;

    while let Some(offset) = next.take() {
        if !visited.insert(offset) {
            log::warn!("xref /Prev loop at offset {}", offset);
            break;
        }
        let (entries, trailer) = parse_section(data, offset)?;
        table.merge_older(entries);

        if let Some(stm) = trailer.get_integer("XRefStm") {
            if visited.insert(stm as u64) {
                match parse_xref_stream(data, stm as u64) {
                    Ok((stream_entries, _)) => table.merge_older(stream_entries),
                    Err(e) => log::warn!("Ignoring broken /XRefStm at {}: {}", stm, e),
                }
            }
        }

        next = trailer.get_integer("Prev").map(|p| p as u64);
        if newest {
            table.stream_based = !is_xref_table(data, offset);
            table.trailer = trailer;
            newest = false;
        }
    }

    log::debug!("Parsed xref chain: {} entries", table.len());
    Ok(table)
}

fn parse_section(data: &[u8], offset: u64) -> Result<(HashMap<u32, XRefEntry>, Dictionary)> {
    if offset as usize > data.len() {
        return Err(Error::InvalidXref);
    }
    if is_xref_table(data, offset) {
        parse_xref_table(data, offset)
    } else {
        parse_xref_stream(data, offset)
    }
}

fn is_xref_table(data: &[u8], offset: u64) -> bool {
    data.get(offset as usize..)
        .is_some_and(|at| skip_whitespace(at).starts_with(b"xref"))
}

/// Parse a classic `xref` table and its trailer.
pub fn parse_xref_table(data: &[u8], offset: u64) -> Result<(HashMap<u32, XRefEntry>, Dictionary)> {
    let err = |reason: &str| Error::ParseError {
        offset: offset as usize,
        reason: reason.to_string(),
    };
    let input = data.get(offset as usize..).ok_or(Error::InvalidXref)?;
    let (mut input, _) = keyword(b"xref")(input).map_err(|_| err("expected xref"))?;
    let mut entries = HashMap::new();

    loop {
        if skip_whitespace(input).starts_with(b"trailer") {
            break;
        }
        let (rest, first) = unsigned(input).map_err(|_| err("bad subsection header"))?;
        let (rest, count) = unsigned(rest).map_err(|_| err("bad subsection header"))?;
        input = rest;

        for i in 0..count {
            let (rest, field1) = unsigned(input).map_err(|_| err("bad xref entry"))?;
            let (rest, gen) = unsigned(rest).map_err(|_| err("bad xref entry"))?;
            let rest = skip_whitespace(rest);
            let kind = rest.first().copied().ok_or(Error::UnexpectedEof)?;
            input = &rest[1..];

            let id = (first + i) as u32;
            let entry = match kind {
                b'n' => XRefEntry::InUse {
                    offset: field1,
                    gen: gen as u16,
                },
                b'f' => XRefEntry::Free { gen: gen as u16 },
                _ => return Err(err("xref entry must end with n or f")),
            };
            // First occurrence wins within one section
            entries.entry(id).or_insert(entry);
        }
    }

    let (input, _) = keyword(b"trailer")(input).map_err(|_| err("expected trailer"))?;
    let (_, trailer) = parse_object(input).map_err(|_| err("bad trailer dictionary"))?;
    match trailer {
        Object::Dictionary(dict) => Ok((entries, dict)),
        _ => Err(err("trailer is not a dictionary")),
    }
}

/// Parse a cross-reference stream object at `offset`.
pub fn parse_xref_stream(data: &[u8], offset: u64) -> Result<(HashMap<u32, XRefEntry>, Dictionary)> {
    let input = data.get(offset as usize..).ok_or(Error::InvalidXref)?;
    let (_, (_, object)) = parse_indirect_object(input).map_err(|_| Error::ParseError {
        offset: offset as usize,
        reason: "expected xref stream object".to_string(),
    })?;

    let dict = object.as_dict().ok_or(Error::InvalidXref)?.clone();
    if !dict.has_type("XRef") {
        return Err(Error::InvalidXref);
    }
    let decoded = object.decode_stream_data()?;

    let widths: Vec<usize> = dict
        .get_array("W")
        .ok_or(Error::InvalidXref)?
        .iter()
        .map(|w| w.as_integer().unwrap_or(0).max(0) as usize)
        .collect();
    if widths.len() != 3 {
        return Err(Error::InvalidXref);
    }
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(Error::InvalidXref);
    }

    let size = dict.get_integer("Size").unwrap_or(0);
    let index: Vec<i64> = match dict.get_array("Index") {
        Some(arr) => arr.iter().filter_map(Object::as_integer).collect(),
        None => vec![0, size],
    };

    let mut entries = HashMap::new();
    let mut rows = decoded.chunks_exact(row_len);
    for pair in index.chunks(2) {
        let (first, count) = match pair {
            [first, count] => (*first, *count),
            _ => break,
        };
        for i in 0..count.max(0) {
            let row = match rows.next() {
                Some(row) => row,
                None => break,
            };
            let (f1, rest) = row.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            let kind = if widths[0] == 0 { 1 } else { be_int(f1) };
            let id = (first + i) as u32;
            let entry = match kind {
                0 => XRefEntry::Free {
                    gen: be_int(f3) as u16,
                },
                1 => XRefEntry::InUse {
                    offset: be_int(f2),
                    gen: be_int(f3) as u16,
                },
                2 => XRefEntry::Compressed {
                    stream_id: be_int(f2) as u32,
                    index: be_int(f3) as u32,
                },
                _ => continue,
            };
            entries.entry(id).or_insert(entry);
        }
    }

    let mut trailer = dict;
    for key in ["Length", "Filter", "DecodeParms", "W", "Index", "Type"] {
        trailer.remove(key);
    }
    Ok((entries, trailer))
}

fn be_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Rebuild the table by scanning the whole file for object headers.
///
/// Later definitions of the same object number win, matching incremental
/// update semantics. The trailer comes from the last `trailer` dictionary,
/// or is synthesized from the first `/Type /Catalog` object found.
pub fn reconstruct_xref(data: &[u8]) -> Result<CrossRefTable> {
    log::info!("Reconstructing xref table by scanning {} bytes", data.len());
    let mut table = CrossRefTable::new();
    table.reconstructed = true;

    for capture in RE_OBJ_HEADER.captures_iter(data) {
        let (id_match, gen_match) = match (capture.get(1), capture.get(2)) {
            (Some(id), Some(gen)) => (id, gen),
            _ => continue,
        };
        let parse_num = |m: regex::bytes::Match<'_>| {
            std::str::from_utf8(m.as_bytes())
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
        };
        if let (Some(id), Some(gen)) = (parse_num(id_match), parse_num(gen_match)) {
            table.add_entry(
                id as u32,
                XRefEntry::InUse {
                    offset: id_match.start() as u64,
                    gen: gen as u16,
                },
            );
        }
    }

    if table.is_empty() {
        return Err(Error::InvalidPdf("no objects found while reconstructing xref".to_string()));
    }

    if let Some(m) = RE_TRAILER.find_iter(data).last() {
        let after = &data[m.start() + b"trailer".len()..];
        if let Ok((_, Object::Dictionary(dict))) = parse_object(after) {
            table.trailer = dict;
        }
    }

    if table.trailer.get_reference("Root").is_none() {
        let mut ids: Vec<(u32, u64)> = table
            .entries
            .iter()
            .filter_map(|(id, e)| match e {
                XRefEntry::InUse { offset, .. } => Some((*id, *offset)),
                _ => None,
            })
            .collect();
        ids.sort();
        for (_, offset) in ids {
            if let Ok((_, (r, obj))) = parse_indirect_object(&data[offset as usize..]) {
                if obj.as_dict().map(|d| d.has_type("Catalog")).unwrap_or(false) {
                    table.trailer.insert("Root", r);
                    break;
                }
            }
        }
    }

    let size = table.size();
    table.trailer.insert("Size", size);
    log::warn!("Reconstructed xref with {} objects", table.len());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectRef;

    fn classic_pdf() -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let o1 = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let o2 = pdf.len();
        pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        let xref = pdf.len();
        pdf.extend_from_slice(
            format!(
                "xref\n0 3\n0000000000 65535 f \n{:010} 00000 n \n{:010} 00000 n \n\
                 trailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                o1, o2, xref
            )
            .as_bytes(),
        );
        pdf
    }

    #[test]
    fn test_find_startxref() {
        let pdf = classic_pdf();
        let offset = find_startxref(&pdf).unwrap() as usize;
        assert!(pdf[offset..].starts_with(b"xref"));
    }

    #[test]
    fn test_parse_classic_table() {
        let pdf = classic_pdf();
        let table = parse_xref_chain(&pdf).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0), Some(&XRefEntry::Free { gen: 65535 }));
        assert!(matches!(table.get(1), Some(XRefEntry::InUse { gen: 0, .. })));
        assert_eq!(table.trailer().get_reference("Root"), Some(ObjectRef::new(1, 0)));
        assert_eq!(table.size(), 3);
        assert_eq!(table.in_use(), vec![ObjectRef::new(1, 0), ObjectRef::new(2, 0)]);
    }

    #[test]
    fn test_prev_chain_newer_wins() {
        let mut pdf = classic_pdf();
        let first_xref = find_startxref(&pdf).unwrap();
        let o2 = pdf.len();
        pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 /Updated true >>\nendobj\n");
        let xref = pdf.len();
        pdf.extend_from_slice(
            format!(
                "xref\n2 1\n{:010} 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R /Prev {} >>\n\
                 startxref\n{}\n%%EOF\n",
                o2, first_xref, xref
            )
            .as_bytes(),
        );

        let table = parse_xref_chain(&pdf).unwrap();
        assert_eq!(
            table.get(2),
            Some(&XRefEntry::InUse {
                offset: o2 as u64,
                gen: 0
            })
        );
        assert!(table.get(1).is_some());
        assert_eq!(table.trailer().get_integer("Prev"), Some(first_xref as i64));
        assert!(!table.is_stream_based());
    }

    #[test]
    fn test_xref_stream() {
        // Rows: type(1) offset(2) gen(1)
        let rows: Vec<u8> = vec![0, 0, 0, 255, 1, 0, 15, 0, 2, 0, 9, 3];
        let compressed = crate::filters::flate_encode(&rows).unwrap();
        let mut pdf = b"%PDF-1.5\n".to_vec();
        let offset = pdf.len();
        pdf.extend_from_slice(
            format!(
                "7 0 obj\n<< /Type /XRef /Size 3 /W [1 2 1] /Root 1 0 R /Filter /FlateDecode /Length {} >>\nstream\n",
                compressed.len()
            )
            .as_bytes(),
        );
        pdf.extend_from_slice(&compressed);
        pdf.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", offset).as_bytes());

        let table = parse_xref_chain(&pdf).unwrap();
        assert_eq!(table.get(1), Some(&XRefEntry::InUse { offset: 15, gen: 0 }));
        assert_eq!(
            table.get(2),
            Some(&XRefEntry::Compressed {
                stream_id: 9,
                index: 3
            })
        );
        assert!(table.is_stream_based());
        assert!(table.trailer().get("W").is_none());
        assert_eq!(table.trailer().get_reference("Root"), Some(ObjectRef::new(1, 0)));
    }

    #[test]
    fn test_reconstruct_without_xref() {
        let pdf = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
                    2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n%%EOF\n";
        let table = reconstruct_xref(pdf).unwrap();
        assert!(table.is_reconstructed());
        assert_eq!(table.len(), 2);
        assert_eq!(table.trailer().get_reference("Root"), Some(ObjectRef::new(1, 0)));
        assert!(find_startxref(pdf).is_err());
    }
}
