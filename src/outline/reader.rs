//! Reading the outline tree of a document into [`Bookmark`]s.
//!
//! PDF Spec: ISO 32000-1:2008, Section 12.3.3 - Document Outline,
//! Section 12.3.2.3 - Named Destinations, Section 12.6.4 - Action Types

use super::bookmark::{Bookmark, BookmarkAction, BookmarkStyle, Target};
use crate::error::Result;
use crate::names;
use crate::object::{Dictionary, Object, ObjectRef};
use crate::reader::SourceDocument;
use crate::writer::ObjectSerializer;
use std::collections::{HashMap, HashSet};

/// Nesting limit for outline items and name trees.
const MAX_OUTLINE_DEPTH: usize = 64;

impl Bookmark {
    /// Read the bookmarks of a document.
    ///
    /// Explicit destinations become page strings (`"3 XYZ 0 800 0"`), named
    /// destinations are resolved to page strings when the document defines
    /// them. Items that cannot be read are logged and skipped.
    pub fn from_reader<D: SourceDocument + ?Sized>(doc: &mut D) -> Result<Vec<Bookmark>> {
        let catalog = doc.catalog()?;
        let Some(outlines) = catalog.get(names::OUTLINES.as_str()) else {
            return Ok(Vec::new());
        };
        let outlines = doc.resolve_value(outlines)?;
        let Some(first) = outlines.as_dict().and_then(|d| d.get_reference("First")) else {
            return Ok(Vec::new());
        };

        let pages = doc
            .page_list()?
            .iter()
            .enumerate()
            .map(|(i, info)| (info.reference, i + 1))
            .collect();
        let mut reader = OutlineReader {
            doc,
            pages,
            named: HashMap::new(),
            visited: HashSet::new(),
        };
        reader.load_named_destinations(&catalog)?;
        let bookmarks = reader.read_siblings(first, 0);
        log::info!("Read {} top-level bookmarks", bookmarks.len());
        Ok(bookmarks)
    }
}

struct OutlineReader<'a, D: SourceDocument + ?Sized> {
    doc: &'a mut D,
    /// Page reference -> 1-based page number
    pages: HashMap<ObjectRef, usize>,
    /// Named destinations -> explicit destination arrays
    named: HashMap<Vec<u8>, Object>,
    visited: HashSet<ObjectRef>,
}

impl<D: SourceDocument + ?Sized> OutlineReader<'_, D> {
    fn load_named_destinations(&mut self, catalog: &Dictionary) -> Result<()> {
        // PDF 1.1 /Dests dictionary
        if let Some(dests) = catalog.get(names::DESTS.as_str()) {
            if let Object::Dictionary(dests) = self.doc.resolve_value(dests)? {
                for (name, dest) in dests {
                    self.named.insert(name.as_str().as_bytes().to_vec(), dest);
                }
            }
        }
        // PDF 1.2 /Names /Dests name tree
        if let Some(names_dict) = catalog.get(names::NAMES.as_str()) {
            if let Object::Dictionary(names_dict) = self.doc.resolve_value(names_dict)? {
                if let Some(tree) = names_dict.get(names::DESTS.as_str()) {
                    let tree = tree.clone();
                    self.walk_name_tree(&tree, 0)?;
                }
            }
        }
        log::debug!("Loaded {} named destinations", self.named.len());
        Ok(())
    }

    fn walk_name_tree(&mut self, node: &Object, depth: usize) -> Result<()> {
        if depth > MAX_OUTLINE_DEPTH {
            log::warn!("Name tree deeper than {} levels, ignoring the rest", MAX_OUTLINE_DEPTH);
            return Ok(());
        }
        let Object::Dictionary(node) = self.doc.resolve_value(node)? else {
            return Ok(());
        };
        if let Some(entries) = node.get_array("Names") {
            for pair in entries.chunks(2) {
                if let [key, value] = pair {
                    if let Some(key) = key.as_string() {
                        self.named.insert(key.to_vec(), value.clone());
                    }
                }
            }
        }
        if let Some(kids) = node.get(names::KIDS.as_str()) {
            if let Object::Array(kids) = self.doc.resolve_value(kids)? {
                for kid in &kids {
                    self.walk_name_tree(kid, depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn read_siblings(&mut self, first: ObjectRef, depth: usize) -> Vec<Bookmark> {
        let mut items = Vec::new();
        if depth > MAX_OUTLINE_DEPTH {
            log::warn!("Outline deeper than {} levels, ignoring the rest", MAX_OUTLINE_DEPTH);
            return items;
        }
        let mut current = Some(first);
        while let Some(reference) = current.take() {
            if !self.visited.insert(reference) {
                log::warn!("Outline item {} visited twice, stopping this level", reference);
                break;
            }
            let dict = match self.doc.resolve(reference) {
                Ok(Object::Dictionary(dict)) => dict,
                Ok(other) => {
                    log::warn!("Outline item {} is a {}, skipping", reference, other.type_name());
                    continue;
                },
                Err(e) => {
                    log::warn!("Outline item {} unreadable: {}", reference, e);
                    continue;
                },
            };
            match self.read_item(&dict, depth) {
                Ok(item) => items.push(item),
                Err(e) => log::warn!("Skipping outline item {}: {}", reference, e),
            }
            current = dict.get_reference("Next");
        }
        items
    }

    fn read_item(&mut self, dict: &Dictionary, depth: usize) -> Result<Bookmark> {
        let title = dict.get(names::TITLE.as_str()).map(|t| self.doc.resolve_value(t)).transpose()?;
        let mut bookmark = Bookmark::new(title.and_then(|t| t.as_text()).unwrap_or_default().trim());

        if dict.get_integer("Count").map_or(false, |count| count < 0) {
            bookmark.open = false;
        }
        if let Some(flags) = dict.get_integer("F") {
            bookmark.style = BookmarkStyle::from_bits_truncate(flags as u32);
        }
        if let Some(color) = dict.get_array("C") {
            let rgb: Vec<f64> = color.iter().filter_map(Object::as_number).collect();
            if let [r, g, b] = rgb[..] {
                if r != 0.0 || g != 0.0 || b != 0.0 {
                    bookmark.color = Some([r, g, b]);
                }
            }
        }

        if let Some(dest) = dict.get(names::DEST.as_str()) {
            bookmark.action = self.local_target(dest)?.map(BookmarkAction::GoTo);
        } else if let Some(action) = dict.get(names::A.as_str()) {
            if let Object::Dictionary(action) = self.doc.resolve_value(action)? {
                bookmark.action = self.read_action(&action)?;
            }
        }

        if let Some(first) = dict.get_reference("First") {
            bookmark.kids = self.read_siblings(first, depth + 1);
        }
        Ok(bookmark)
    }

    fn read_action(&mut self, action: &Dictionary) -> Result<Option<BookmarkAction>> {
        let kind = action.get_name("S").unwrap_or_default();
        let mapped = match kind {
            "GoTo" => match action.get(names::D.as_str()) {
                Some(dest) => self.local_target(dest)?.map(BookmarkAction::GoTo),
                None => None,
            },
            "GoToR" => {
                let file = match action.get(names::F.as_str()) {
                    Some(spec) => self.file_spec(spec)?,
                    None => None,
                };
                let target = match action.get(names::D.as_str()) {
                    Some(dest) => self.remote_target(dest)?,
                    None => None,
                };
                file.map(|file| BookmarkAction::GoToR {
                    file,
                    target,
                    new_window: action.get("NewWindow").and_then(Object::as_bool),
                })
            },
            "URI" => self.text_entry(action, names::URI.as_str())?.map(BookmarkAction::Uri),
            "Launch" => match action.get(names::F.as_str()) {
                Some(spec) => self.file_spec(spec)?.map(BookmarkAction::Launch),
                None => None,
            },
            "JavaScript" => match action.get(names::JS.as_str()) {
                Some(js) => match self.doc.resolve_value(js)? {
                    Object::String(s) => Some(BookmarkAction::JavaScript(s.to_text())),
                    stream @ Object::Stream { .. } => Some(BookmarkAction::JavaScript(
                        String::from_utf8_lossy(&stream.decode_stream_data()?).into_owned(),
                    )),
                    _ => None,
                },
                None => None,
            },
            "Hide" => {
                let field = match action.get(names::T.as_str()) {
                    Some(t) => match self.doc.resolve_value(t)? {
                        Object::String(s) => Some(s.to_text()),
                        Object::Dictionary(field) => field.get(names::T.as_str()).and_then(Object::as_text),
                        _ => None,
                    },
                    None => None,
                };
                field.map(|field| BookmarkAction::Hide {
                    field,
                    hide: action.get("H").and_then(Object::as_bool).unwrap_or(true),
                })
            },
            "SetOCGState" => {
                let mut state = Vec::new();
                if let Some(entries) = action.get_array("State") {
                    for entry in entries {
                        match self.doc.resolve_value(entry)? {
                            Object::Name(name) => state.push(name.as_str().to_string()),
                            Object::Dictionary(group) => {
                                if let Some(name) = group.get(names::NAME.as_str()).and_then(Object::as_text) {
                                    state.push(name);
                                }
                            },
                            _ => {},
                        }
                    }
                }
                Some(BookmarkAction::SetOcgState(state))
            },
            other => {
                log::debug!("Ignoring outline action /{}", other);
                None
            },
        };
        Ok(mapped)
    }

    /// Map a destination in this document to a target.
    fn local_target(&mut self, dest: &Object) -> Result<Option<Target>> {
        let dest = self.doc.resolve_value(dest)?;
        let (key, named_n) = match &dest {
            Object::Array(array) => return Ok(self.page_string(array).map(Target::Page)),
            Object::Dictionary(dict) => {
                return match dict.get(names::D.as_str()) {
                    Some(inner) => {
                        let inner = inner.clone();
                        self.local_target(&inner)
                    },
                    None => Ok(None),
                }
            },
            Object::String(s) => (s.bytes.clone(), false),
            Object::Name(n) => (n.as_str().as_bytes().to_vec(), true),
            _ => return Ok(None),
        };

        if let Some(explicit) = self.named.get(&key).cloned() {
            let explicit = match self.doc.resolve_value(&explicit)? {
                Object::Dictionary(d) => d.get(names::D.as_str()).cloned().unwrap_or(Object::Null),
                other => other,
            };
            if let Object::Array(array) = self.doc.resolve_value(&explicit)? {
                if let Some(page) = self.page_string(&array) {
                    return Ok(Some(Target::Page(page)));
                }
            }
        }
        let name = latin1(&key);
        Ok(Some(if named_n { Target::NamedN(name) } else { Target::Named(name) }))
    }

    /// Map a destination in another file; its pages are 0-based integers.
    fn remote_target(&mut self, dest: &Object) -> Result<Option<Target>> {
        Ok(match self.doc.resolve_value(dest)? {
            Object::Array(array) => match array.first().and_then(Object::as_integer) {
                Some(index) => Some(Target::Page(format_page_string(index.max(0) as usize + 1, &array[1..]))),
                None => None,
            },
            Object::String(s) => Some(Target::Named(latin1(&s.bytes))),
            Object::Name(n) => Some(Target::NamedN(n.as_str().to_string())),
            _ => None,
        })
    }

    fn page_string(&mut self, array: &[Object]) -> Option<String> {
        let page = match array.first()? {
            Object::Reference(r) => match self.pages.get(r) {
                Some(page) => *page,
                None => {
                    log::warn!("Destination points at {} which is not a page", r);
                    return None;
                },
            },
            Object::Integer(index) => (*index).max(0) as usize + 1,
            _ => return None,
        };
        Some(format_page_string(page, &array[1..]))
    }

    fn file_spec(&mut self, spec: &Object) -> Result<Option<String>> {
        Ok(match self.doc.resolve_value(spec)? {
            Object::String(s) => Some(s.to_text()),
            Object::Dictionary(dict) => ["UF", "F", "Unix", "DOS"]
                .iter()
                .find_map(|key| dict.get(key).and_then(Object::as_text)),
            _ => None,
        })
    }

    fn text_entry(&mut self, dict: &Dictionary, key: &str) -> Result<Option<String>> {
        Ok(match dict.get(key) {
            Some(value) => self.doc.resolve_value(value)?.as_string().map(latin1),
            None => None,
        })
    }
}

/// `"<page> <fit> <args>"` with names written without their slash.
fn format_page_string(page: usize, rest: &[Object]) -> String {
    let serializer = ObjectSerializer::new();
    let mut out = page.to_string();
    for item in rest {
        out.push(' ');
        match item {
            Object::Name(name) => out.push_str(name.as_str()),
            other => out.push_str(&serializer.serialize_to_string(other)),
        }
    }
    out
}

/// Bytes to chars one-to-one, the way binary names travel through the XML export.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|b| *b as char).collect()
}
