//! Source documents.
//!
//! PDF Spec: ISO 32000-1:2008, Section 7.3.10 - Indirect Objects,
//! Section 7.5.7 - Object Streams, Section 7.7.3 - Page Tree
//!
//! [`SourceDocument`] is everything the copy engine needs from a document it
//! imports from: resolving references, the catalog, and pages by number.
//! [`PdfReader`] implements it over a parsed file; [`MemoryDocument`]
//! implements it over an object graph assembled in memory.

use crate::config::ReaderOptions;
use crate::error::{Error, Result};
use crate::lexer::unsigned;
use crate::names::{self, Name};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser::{parse_indirect_object, parse_object};
use crate::xref::{self, CrossRefTable, XRefEntry};
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use uuid::Uuid;

/// Attributes a page inherits from its ancestors (Table 30).
const INHERITABLE: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

/// Longest chain of references to references followed by [`SourceDocument::resolve_value`].
const MAX_REFERENCE_HOPS: u32 = 32;

/// Identity of one opened source document.
///
/// Object numbers are only unique within a document, so everything keyed by
/// source references (copy memo tables in particular) is scoped by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Generate a fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A leaf of the page tree together with the attributes inherited from its ancestors.
#[derive(Debug, Clone)]
pub struct PageInfo {
    /// Reference of the page dictionary in its own document
    pub reference: ObjectRef,
    /// Inheritable attributes collected from `/Pages` ancestors (nearest wins)
    pub inherited: Dictionary,
}

/// A document objects can be imported from.
pub trait SourceDocument {
    /// Identity used to scope per-document state.
    fn id(&self) -> DocumentId;

    /// The trailer dictionary (`/Root`, `/Info`, `/ID`, `/Size`).
    fn trailer(&self) -> &Dictionary;

    /// Resolve an indirect reference. A reference to a missing or free object resolves to null.
    fn resolve(&mut self, reference: ObjectRef) -> Result<Object>;

    /// Leaves of the page tree in document order.
    fn page_list(&mut self) -> Result<&[PageInfo]>;

    /// Follow references until a direct object is reached.
    fn resolve_value(&mut self, object: &Object) -> Result<Object> {
        let mut current = object.clone();
        let mut hops = 0;
        while let Object::Reference(reference) = current {
            hops += 1;
            if hops > MAX_REFERENCE_HOPS {
                return Err(Error::CircularReference(reference));
            }
            current = self.resolve(reference)?;
        }
        Ok(current)
    }

    /// The document catalog.
    fn catalog(&mut self) -> Result<Dictionary> {
        let root = self.trailer().get("Root").cloned().ok_or_else(|| {
            Error::InvalidPdf("Trailer has no /Root entry".to_string())
        })?;
        match self.resolve_value(&root)? {
            Object::Dictionary(dict) => Ok(dict),
            other => Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Number of pages.
    fn page_count(&mut self) -> Result<usize> {
        Ok(self.page_list()?.len())
    }

    /// Reference of page `n` (1-based) in this document's numbering.
    fn page_ref(&mut self, n: usize) -> Result<ObjectRef> {
        Ok(page_info(self.page_list()?, n)?.reference)
    }

    /// Page dictionary `n` (1-based) with inherited attributes filled in.
    fn page(&mut self, n: usize) -> Result<Dictionary> {
        let info = page_info(self.page_list()?, n)?.clone();
        let mut dict = match self.resolve(info.reference)? {
            Object::Dictionary(dict) => dict,
            other => {
                return Err(Error::InvalidObjectType {
                    expected: "Dictionary".to_string(),
                    found: other.type_name().to_string(),
                })
            },
        };
        for (key, value) in info.inherited {
            if !dict.contains_key(key.as_str()) {
                log::debug!("Page {} inheriting /{} from ancestor Pages node", n, key.as_str());
                dict.insert(key, value);
            }
        }
        Ok(dict)
    }

    /// 1-based number of the page with this reference, if it is a page of this document.
    fn page_number(&mut self, reference: ObjectRef) -> Result<Option<usize>> {
        Ok(self
            .page_list()?
            .iter()
            .position(|p| p.reference == reference)
            .map(|i| i + 1))
    }
}

fn page_info(pages: &[PageInfo], n: usize) -> Result<&PageInfo> {
    if n == 0 || n > pages.len() {
        return Err(Error::InvalidPageNumber {
            page: n,
            count: pages.len(),
        });
    }
    Ok(&pages[n - 1])
}

/// Walk the page tree from the catalog's `/Pages` root.
///
/// Cycles are skipped with a warning; a tree deeper than `max_depth` is an error.
pub fn collect_pages<D: SourceDocument + ?Sized>(doc: &mut D, max_depth: u32) -> Result<Vec<PageInfo>> {
    let catalog = doc.catalog()?;
    let root = catalog
        .get_reference("Pages")
        .ok_or_else(|| Error::InvalidPdf("Catalog has no /Pages reference".to_string()))?;

    let mut pages = Vec::new();
    let mut visited = HashSet::new();
    walk_page_tree(doc, root, &Dictionary::new(), 0, max_depth, &mut visited, &mut pages)?;
    log::debug!("Page tree has {} pages", pages.len());
    Ok(pages)
}

fn walk_page_tree<D: SourceDocument + ?Sized>(
    doc: &mut D,
    node_ref: ObjectRef,
    inherited: &Dictionary,
    depth: u32,
    max_depth: u32,
    visited: &mut HashSet<ObjectRef>,
    pages: &mut Vec<PageInfo>,
) -> Result<()> {
    if depth > max_depth {
        return Err(Error::RecursionLimitExceeded(max_depth));
    }
    if !visited.insert(node_ref) {
        log::warn!("Circular reference in page tree at object {}, skipping", node_ref);
        return Ok(());
    }

    let node = match doc.resolve(node_ref)? {
        Object::Dictionary(dict) => dict,
        other => {
            log::warn!("Page tree node {} is a {}, skipping", node_ref, other.type_name());
            return Ok(());
        },
    };

    let is_pages_node =
        node.has_type("Pages") || (node.type_name().is_none() && node.contains_key("Kids"));
    if !is_pages_node {
        pages.push(PageInfo {
            reference: node_ref,
            inherited: inherited.clone(),
        });
        return Ok(());
    }

    let mut inherited_here = inherited.clone();
    for key in INHERITABLE {
        if let Some(value) = node.get(key) {
            inherited_here.insert(key, value.clone());
        }
    }

    let kids = match node.get("Kids") {
        Some(kids) => doc.resolve_value(kids)?,
        None => {
            log::warn!("Pages node {} has no /Kids", node_ref);
            return Ok(());
        },
    };
    let kids = match kids {
        Object::Array(kids) => kids,
        other => {
            log::warn!("/Kids of {} is a {}, skipping", node_ref, other.type_name());
            return Ok(());
        },
    };

    for kid in kids {
        match kid {
            Object::Reference(kid_ref) => {
                walk_page_tree(doc, kid_ref, &inherited_here, depth + 1, max_depth, visited, pages)?
            },
            other => log::warn!("Kid in /Kids of {} is a direct {}, skipping", node_ref, other.type_name()),
        }
    }
    Ok(())
}

/// Decoded object stream: object numbers with their offsets into `data`.
#[derive(Debug)]
struct ObjectStream {
    offsets: Vec<(u32, usize)>,
    data: Vec<u8>,
}

impl ObjectStream {
    fn parse(dict: &Dictionary, decoded: Vec<u8>) -> Result<Self> {
        let count = dict.get_integer("N").unwrap_or(0).max(0) as usize;
        let first = dict.get_integer("First").unwrap_or(0).max(0) as usize;
        if first > decoded.len() {
            return Err(Error::InvalidPdf(format!(
                "Object stream /First {} beyond data length {}",
                first,
                decoded.len()
            )));
        }

        let mut offsets = Vec::with_capacity(count);
        let mut header = &decoded[..first];
        for _ in 0..count {
            let (rest, id) = unsigned(header).map_err(|_| Error::ParseError {
                offset: first - header.len(),
                reason: "bad object stream header".to_string(),
            })?;
            let (rest, offset) = unsigned(rest).map_err(|_| Error::ParseError {
                offset: first - rest.len(),
                reason: "bad object stream header".to_string(),
            })?;
            offsets.push((id as u32, first + offset as usize));
            header = rest;
        }

        Ok(Self {
            offsets,
            data: decoded,
        })
    }

    fn object_at(&self, index: usize, expected: u32) -> Result<Object> {
        let (id, offset) = *self
            .offsets
            .get(index)
            .or_else(|| self.offsets.iter().find(|(id, _)| *id == expected))
            .ok_or(Error::ObjectNotFound(expected, 0))?;
        if id != expected {
            log::warn!("Object stream slot {} holds object {}, expected {}", index, id, expected);
        }
        let input = self.data.get(offset..).ok_or(Error::UnexpectedEof)?;
        parse_object(input).map(|(_, object)| object).map_err(|e| Error::ParseError {
            offset,
            reason: format!("object {} in object stream: {:?}", expected, e),
        })
    }
}

/// A parsed PDF file.
///
/// Objects are parsed on first use and cached. The raw bytes stay available
/// so an incremental update can be appended to them unchanged.
pub struct PdfReader {
    data: Bytes,
    version: String,
    xref: CrossRefTable,
    options: ReaderOptions,
    id: DocumentId,
    cache: HashMap<u32, Object>,
    object_streams: HashMap<u32, ObjectStream>,
    pages: Option<Vec<PageInfo>>,
}

impl std::fmt::Debug for PdfReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfReader")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("len", &self.data.len())
            .field("objects", &self.xref.len())
            .finish()
    }
}

impl PdfReader {
    /// Open a file with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, ReaderOptions::default())
    }

    /// Open a file.
    pub fn open_with_options(path: impl AsRef<Path>, options: ReaderOptions) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        log::info!("Opened {} ({} bytes)", path.as_ref().display(), data.len());
        Self::from_bytes_with_options(data, options)
    }

    /// Parse a document held in memory.
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        Self::from_bytes_with_options(data, ReaderOptions::default())
    }

    /// Parse a document held in memory.
    pub fn from_bytes_with_options(data: impl Into<Bytes>, options: ReaderOptions) -> Result<Self> {
        let data = data.into();
        let version = parse_header(&data)?;

        let xref = match xref::parse_xref_chain(&data) {
            Ok(table) if table.trailer().contains_key("Root") => table,
            Ok(_) if !options.strict => {
                log::warn!("Trailer has no /Root, reconstructing cross-reference table");
                xref::reconstruct_xref(&data)?
            },
            Err(e) if !options.strict => {
                log::warn!("Cross-reference chain unusable ({}), reconstructing", e);
                xref::reconstruct_xref(&data)?
            },
            Ok(_) => return Err(Error::InvalidPdf("Trailer has no /Root entry".to_string())),
            Err(e) => return Err(e),
        };

        log::debug!("PDF {} with {} xref entries", version, xref.len());
        Ok(Self {
            data,
            version,
            xref,
            options,
            id: DocumentId::new(),
            cache: HashMap::new(),
            object_streams: HashMap::new(),
            pages: None,
        })
    }

    /// Header version, e.g. "1.7".
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The raw file bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// The merged cross-reference table.
    pub fn xref(&self) -> &CrossRefTable {
        &self.xref
    }

    /// `/Size` of the newest revision: one past the highest object number.
    pub fn size(&self) -> u32 {
        self.xref.size()
    }

    /// Offset of the newest cross-reference section, for `/Prev` of an appended revision.
    pub fn startxref(&self) -> Option<u64> {
        self.xref.startxref()
    }

    /// Whether the xref table was rebuilt by scanning the file.
    pub fn is_reconstructed(&self) -> bool {
        self.xref.is_reconstructed()
    }

    /// Whether the newest revision ends with a cross-reference stream rather than a table.
    pub fn has_xref_stream(&self) -> bool {
        self.xref.is_stream_based()
    }

    /// Number of cached objects.
    pub fn cached_objects(&self) -> usize {
        self.cache.len()
    }

    fn load(&mut self, reference: ObjectRef) -> Result<Object> {
        let entry = match self.xref.get(reference.id) {
            Some(entry) => *entry,
            None => {
                log::debug!("Object {} not in xref, resolving to null", reference);
                return Ok(Object::Null);
            },
        };

        match entry {
            XRefEntry::Free { .. } => {
                log::debug!("Object {} is free, resolving to null", reference);
                Ok(Object::Null)
            },
            XRefEntry::InUse { offset, gen } => {
                if gen != reference.gen {
                    log::warn!("Reference {} has generation {} in xref", reference, gen);
                }
                let input = self
                    .data
                    .get(offset as usize..)
                    .ok_or(Error::ObjectNotFound(reference.id, reference.gen))?;
                let (_, (found, object)) = parse_indirect_object(input).map_err(|e| Error::ParseError {
                    offset: offset as usize,
                    reason: format!("object {}: {:?}", reference, e),
                })?;
                if found.id != reference.id {
                    log::warn!("Expected object {} at offset {}, found {}", reference, offset, found);
                }
                Ok(object)
            },
            XRefEntry::Compressed { stream_id, index } => {
                self.load_object_stream(stream_id)?;
                match self.object_streams.get(&stream_id) {
                    Some(stream) => stream.object_at(index as usize, reference.id),
                    None => Err(Error::ObjectNotFound(reference.id, reference.gen)),
                }
            },
        }
    }

    fn load_object_stream(&mut self, stream_id: u32) -> Result<()> {
        if self.object_streams.contains_key(&stream_id) {
            return Ok(());
        }
        if let Some(XRefEntry::Compressed { .. }) = self.xref.get(stream_id) {
            return Err(Error::InvalidPdf(format!(
                "Object stream {} is itself inside an object stream",
                stream_id
            )));
        }
        let stream = self.load(ObjectRef::new(stream_id, 0))?;
        let parsed = match &stream {
            Object::Stream { dict, .. } => ObjectStream::parse(dict, stream.decode_stream_data()?)?,
            other => {
                return Err(Error::InvalidObjectType {
                    expected: "Stream".to_string(),
                    found: other.type_name().to_string(),
                })
            },
        };
        log::debug!("Loaded object stream {} with {} objects", stream_id, parsed.offsets.len());
        self.object_streams.insert(stream_id, parsed);
        Ok(())
    }
}

impl SourceDocument for PdfReader {
    fn id(&self) -> DocumentId {
        self.id
    }

    fn trailer(&self) -> &Dictionary {
        self.xref.trailer()
    }

    fn resolve(&mut self, reference: ObjectRef) -> Result<Object> {
        if let Some(object) = self.cache.get(&reference.id) {
            return Ok(object.clone());
        }
        let object = self.load(reference)?;
        self.cache.insert(reference.id, object.clone());
        Ok(object)
    }

    fn page_list(&mut self) -> Result<&[PageInfo]> {
        if self.pages.is_none() {
            let max_depth = self.options.max_recursion_depth;
            let pages = collect_pages(self, max_depth)?;
            self.pages = Some(pages);
        }
        Ok(self.pages.as_deref().unwrap_or_default())
    }
}

fn parse_header(data: &[u8]) -> Result<String> {
    let window = &data[..data.len().min(1024)];
    let pos = window
        .windows(5)
        .position(|w| w == b"%PDF-")
        .ok_or_else(|| Error::InvalidHeader(String::from_utf8_lossy(&data[..data.len().min(8)]).into_owned()))?;
    if pos > 0 {
        log::warn!("{} bytes of garbage before %PDF- header", pos);
    }
    let version: String = window[pos + 5..]
        .iter()
        .take_while(|c| c.is_ascii_digit() || **c == b'.')
        .map(|&c| c as char)
        .collect();
    if version.is_empty() {
        return Err(Error::InvalidHeader("%PDF-".to_string()));
    }
    Ok(version)
}

/// A source document assembled from objects in memory.
///
/// Useful for building documents to import from without serializing them
/// first, and for exercising the copy engine on hand-made graphs.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    id: DocumentId,
    objects: HashMap<ObjectRef, Object>,
    trailer: Dictionary,
    next_id: u32,
    pages: Option<Vec<PageInfo>>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self {
            id: DocumentId::new(),
            objects: HashMap::new(),
            trailer: Dictionary::new(),
            next_id: 1,
            pages: None,
        }
    }

    /// Add an object under the next free number.
    pub fn add(&mut self, object: impl Into<Object>) -> ObjectRef {
        let reference = ObjectRef::new(self.next_id, 0);
        self.next_id += 1;
        self.objects.insert(reference, object.into());
        reference
    }

    /// Reserve an object number to be filled later with [`MemoryDocument::set`].
    pub fn reserve(&mut self) -> ObjectRef {
        let reference = ObjectRef::new(self.next_id, 0);
        self.next_id += 1;
        reference
    }

    /// Set or replace an object.
    pub fn set(&mut self, reference: ObjectRef, object: impl Into<Object>) {
        self.next_id = self.next_id.max(reference.id + 1);
        self.objects.insert(reference, object.into());
        self.pages = None;
    }

    /// Mutable access to the trailer (set `/Root` here).
    pub fn trailer_mut(&mut self) -> &mut Dictionary {
        self.pages = None;
        &mut self.trailer
    }

    /// Build a minimal catalog and flat page tree over the given page dictionaries.
    ///
    /// Each page gets `/Type /Page` and `/Parent`; returns the page references.
    pub fn with_pages(&mut self, pages: Vec<Dictionary>) -> Vec<ObjectRef> {
        let tree = self.reserve();
        let mut kids = Vec::with_capacity(pages.len());
        for mut page in pages {
            page.insert(names::TYPE, names::PAGE);
            page.insert(names::PARENT, tree);
            kids.push(self.add(page));
        }

        let mut tree_dict = Dictionary::with_type(names::PAGES);
        tree_dict.insert(names::KIDS, kids.iter().map(|r| Object::Reference(*r)).collect::<Vec<_>>());
        tree_dict.insert(names::COUNT, kids.len());
        self.set(tree, tree_dict);

        let mut catalog = Dictionary::with_type(names::CATALOG);
        catalog.insert(names::PAGES, tree);
        let root = self.add(catalog);
        self.trailer_mut().insert(names::ROOT, root);
        kids
    }

    /// Replace a key of the catalog.
    pub fn set_catalog_entry(&mut self, key: Name, value: impl Into<Object>) -> Result<()> {
        let root = self
            .trailer
            .get_reference("Root")
            .ok_or_else(|| Error::InvalidPdf("Trailer has no /Root entry".to_string()))?;
        match self.objects.get_mut(&root) {
            Some(Object::Dictionary(catalog)) => {
                catalog.insert(key, value);
                Ok(())
            },
            _ => Err(Error::ObjectNotFound(root.id, root.gen)),
        }
    }
}

impl SourceDocument for MemoryDocument {
    fn id(&self) -> DocumentId {
        self.id
    }

    fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    fn resolve(&mut self, reference: ObjectRef) -> Result<Object> {
        Ok(self.objects.get(&reference).cloned().unwrap_or(Object::Null))
    }

    fn page_list(&mut self) -> Result<&[PageInfo]> {
        if self.pages.is_none() {
            let pages = collect_pages(self, ReaderOptions::default().max_recursion_depth)?;
            self.pages = Some(pages);
        }
        Ok(self.pages.as_deref().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::flate_encode;

    /// Assemble a file with a classic xref from `(id, body)` pairs.
    fn build_pdf(objects: &[(u32, &str)], root: u32) -> Vec<u8> {
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (id, body) in objects {
            offsets.push((*id, out.len()));
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", id, body).as_bytes());
        }
        let size = objects.iter().map(|(id, _)| id + 1).max().unwrap_or(1);
        let xref_pos = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", size).as_bytes());
        for id in 1..size {
            match offsets.iter().find(|(i, _)| *i == id) {
                Some((_, off)) => out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes()),
                None => out.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }
        out.extend_from_slice(
            format!("trailer\n<< /Size {} /Root {} 0 R >>\nstartxref\n{}\n%%EOF\n", size, root, xref_pos)
                .as_bytes(),
        );
        out
    }

    fn two_level_tree() -> Vec<u8> {
        build_pdf(
            &[
                (1, "<< /Type /Catalog /Pages 2 0 R >>"),
                (2, "<< /Type /Pages /Kids [3 0 R 4 0 R] /Count 3 /MediaBox [0 0 612 792] /Rotate 90 >>"),
                (3, "<< /Type /Page /Parent 2 0 R /Rotate 0 >>"),
                (4, "<< /Type /Pages /Parent 2 0 R /Kids [5 0 R] /Count 1 /MediaBox [0 0 100 100] >>"),
                (5, "<< /Type /Page /Parent 4 0 R >>"),
            ],
            1,
        )
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(parse_header(b"%PDF-1.7\n").unwrap(), "1.7");
        assert_eq!(parse_header(b"junk%PDF-2.0\n").unwrap(), "2.0");
        assert!(matches!(parse_header(b"hello"), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_page_tree_with_inheritance() {
        let mut reader = PdfReader::from_bytes(two_level_tree()).unwrap();
        assert_eq!(reader.version(), "1.4");
        assert_eq!(reader.page_count().unwrap(), 2);
        assert_eq!(reader.page_ref(1).unwrap(), ObjectRef::new(3, 0));
        assert_eq!(reader.page_ref(2).unwrap(), ObjectRef::new(5, 0));

        let first = reader.page(1).unwrap();
        assert_eq!(first.get_integer("Rotate"), Some(0));
        assert_eq!(first.get_array("MediaBox").unwrap()[2].as_number(), Some(612.0));

        // Nearest ancestor wins
        let second = reader.page(2).unwrap();
        assert_eq!(second.get_array("MediaBox").unwrap()[2].as_number(), Some(100.0));
        assert_eq!(second.get_integer("Rotate"), Some(90));
    }

    #[test]
    fn test_page_number_out_of_range() {
        let mut reader = PdfReader::from_bytes(two_level_tree()).unwrap();
        assert!(matches!(reader.page(0), Err(Error::InvalidPageNumber { page: 0, count: 2 })));
        assert!(matches!(reader.page_ref(3), Err(Error::InvalidPageNumber { page: 3, count: 2 })));
    }

    #[test]
    fn test_page_number_lookup() {
        let mut reader = PdfReader::from_bytes(two_level_tree()).unwrap();
        assert_eq!(reader.page_number(ObjectRef::new(5, 0)).unwrap(), Some(2));
        assert_eq!(reader.page_number(ObjectRef::new(1, 0)).unwrap(), None);
    }

    #[test]
    fn test_missing_object_resolves_to_null() {
        let mut reader = PdfReader::from_bytes(two_level_tree()).unwrap();
        assert!(reader.resolve(ObjectRef::new(99, 0)).unwrap().is_null());
    }

    #[test]
    fn test_page_tree_cycle_is_skipped() {
        let pdf = build_pdf(
            &[
                (1, "<< /Type /Catalog /Pages 2 0 R >>"),
                (2, "<< /Type /Pages /Kids [3 0 R 2 0 R] /Count 1 >>"),
                (3, "<< /Type /Page /Parent 2 0 R >>"),
            ],
            1,
        );
        let mut reader = PdfReader::from_bytes(pdf).unwrap();
        assert_eq!(reader.page_count().unwrap(), 1);
    }

    #[test]
    fn test_catalog_and_cache() {
        let mut reader = PdfReader::from_bytes(two_level_tree()).unwrap();
        let catalog = reader.catalog().unwrap();
        assert!(catalog.has_type("Catalog"));
        assert!(reader.cached_objects() >= 1);
    }

    #[test]
    fn test_broken_startxref_is_reconstructed() {
        let mut pdf = two_level_tree();
        let pos = pdf.windows(9).rposition(|w| w == b"startxref").unwrap();
        pdf.truncate(pos);
        pdf.extend_from_slice(b"startxref\n999999\n%%EOF\n");

        let mut reader = PdfReader::from_bytes(pdf.clone()).unwrap();
        assert!(reader.is_reconstructed());
        assert_eq!(reader.page_count().unwrap(), 2);

        assert!(PdfReader::from_bytes_with_options(pdf, ReaderOptions::strict()).is_err());
    }

    #[test]
    fn test_object_stream_members() {
        let members = b"10 0 11 17 << /Kind /Ten >> (eleven)";
        let first = 11;
        let compressed = flate_encode(members).unwrap();

        let mut out = b"%PDF-1.5\n".to_vec();
        let catalog_off = out.len();
        out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let pages_off = out.len();
        out.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        let objstm_off = out.len();
        out.extend_from_slice(
            format!(
                "3 0 obj\n<< /Type /ObjStm /N 2 /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
                first,
                compressed.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(&compressed);
        out.extend_from_slice(b"\nendstream\nendobj\n");
        let xref_pos = out.len();
        out.extend_from_slice(b"xref\n0 4\n0000000000 65535 f \n");
        for off in [catalog_off, pages_off, objstm_off] {
            out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        out.extend_from_slice(format!("trailer\n<< /Size 4 /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n", xref_pos).as_bytes());

        let mut reader = PdfReader::from_bytes(out).unwrap();
        reader.xref.add_entry(10, XRefEntry::Compressed { stream_id: 3, index: 0 });
        reader.xref.add_entry(11, XRefEntry::Compressed { stream_id: 3, index: 1 });

        let ten = reader.resolve(ObjectRef::new(10, 0)).unwrap();
        assert_eq!(ten.as_dict().unwrap().get_name("Kind"), Some("Ten"));
        let eleven = reader.resolve(ObjectRef::new(11, 0)).unwrap();
        assert_eq!(eleven.as_string(), Some(&b"eleven"[..]));
    }

    #[test]
    fn test_memory_document_pages() {
        let mut doc = MemoryDocument::new();
        let mut inherited = Dictionary::new();
        inherited.insert(names::ROTATE, 180);
        let refs = doc.with_pages(vec![Dictionary::new(), inherited]);

        assert_eq!(doc.page_count().unwrap(), 2);
        assert_eq!(doc.page_ref(2).unwrap(), refs[1]);
        assert_eq!(doc.page(2).unwrap().get_integer("Rotate"), Some(180));
        assert!(doc.catalog().unwrap().has_type("Catalog"));
    }

    #[test]
    fn test_resolve_value_follows_chains() {
        let mut doc = MemoryDocument::new();
        let target = doc.add(42);
        let alias = doc.add(target);
        assert_eq!(doc.resolve_value(&Object::Reference(alias)).unwrap(), Object::Integer(42));
    }

    #[test]
    fn test_document_ids_are_unique() {
        assert_ne!(MemoryDocument::new().id(), MemoryDocument::new().id());
    }
}
