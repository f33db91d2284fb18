//! Object Copy Engine: import pages and objects from source documents.
//!
//! PDF Spec: ISO 32000-1:2008, Section 7.3.10 - Indirect Objects,
//! Section 7.7.3 - Page Tree, Section 14.7 - Logical Structure
//!
//! Every source document gets its own session (memo table, structure side
//! table, parent tree) keyed by [`DocumentId`]; object numbers are only
//! unique inside one document, so sessions are never shared.
//!
//! Copy rules:
//!
//! - Scalars are cloned. Stream payloads are carried over verbatim.
//! - Array elements and dictionary values that copy to null are dropped.
//! - A source reference is copied at most once per session. Shared and
//!   cyclic subgraphs keep their shape in the destination.
//! - Pages are only transcribed by [`PdfCopy::add_page`] / [`PdfCopy::add_pages`].
//!   Any other reference to a page yields a placeholder reference that is
//!   filled in when (if) the page itself is added.
//!
//! ## Example
//!
//! ```no_run
//! use pdf_graft::config::CopyOptions;
//! use pdf_graft::copy::PdfCopy;
//! use pdf_graft::reader::PdfReader;
//!
//! let mut first = PdfReader::open("a.pdf")?;
//! let mut second = PdfReader::open("b.pdf")?;
//!
//! let mut copy = PdfCopy::new(CopyOptions::default());
//! copy.add_pages(&mut first, &[1, 2])?;
//! copy.add_page(&mut second, 1)?;
//! copy.save("merged.pdf")?;
//! # Ok::<(), pdf_graft::Error>(())
//! ```

mod acroform;
mod memo;
mod structure;

pub use acroform::{AcroFormBuilder, FORM_DEFAULT_KEYS};
pub use memo::{MemoEntry, MemoState, MemoTable};
pub use structure::{is_struct_elem, number_tree_get, StructTreeBuilder, StructureTracker};

use crate::config::{CopyOptions, WriterOptions};
use crate::error::{Error, Result};
use crate::names;
use crate::object::{Dictionary, Object, ObjectRef};
use crate::outline::{Bookmark, OutlineWriter};
use crate::reader::{DocumentId, SourceDocument};
use crate::writer::PdfWriter;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Deepest nesting of arrays, dictionaries and references followed while copying.
///
/// Every level costs several stack frames, and the copy has to survive on a
/// default 2 MiB thread stack in debug builds. A chain of indirect references
/// uses two levels per link (the reference and the dictionary behind it).
const MAX_COPY_DEPTH: usize = 160;

/// Deepest `/Parent` chain followed from a widget to its top-level field.
const MAX_FIELD_DEPTH: usize = 32;

/// Per-source-document copy state.
#[derive(Debug, Default)]
struct DocumentSession {
    memo: MemoTable,
    tracker: StructureTracker,
    parent_tree: Option<Dictionary>,
}

/// Copies pages and objects from any number of source documents into one new document.
pub struct PdfCopy {
    writer: PdfWriter,
    options: CopyOptions,
    sessions: HashMap<DocumentId, DocumentSession>,
    structure: Option<StructTreeBuilder>,
    acroform: AcroFormBuilder,
    outlines: Vec<Bookmark>,
}

impl std::fmt::Debug for PdfCopy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfCopy")
            .field("options", &self.options)
            .field("sources", &self.sessions.len())
            .field("pages", &self.writer.page_count())
            .finish()
    }
}

impl PdfCopy {
    /// Create a copier writing a new in-memory document.
    pub fn new(options: CopyOptions) -> Self {
        Self::with_writer(PdfWriter::with_options(WriterOptions::default()), options)
    }

    /// Create a copier writing through an existing writer.
    pub fn with_writer(writer: PdfWriter, options: CopyOptions) -> Self {
        Self {
            writer,
            options,
            sessions: HashMap::new(),
            structure: None,
            acroform: AcroFormBuilder::new(),
            outlines: Vec::new(),
        }
    }

    /// The destination writer.
    pub fn writer(&self) -> &PdfWriter {
        &self.writer
    }

    /// Mutable access to the destination writer (catalog entries, extra objects).
    pub fn writer_mut(&mut self) -> &mut PdfWriter {
        &mut self.writer
    }

    /// Pages in the destination so far.
    pub fn page_count(&self) -> usize {
        self.writer.page_count()
    }

    /// Copy state of a source reference, if the document has a session.
    pub fn memo_state(&self, document: DocumentId, reference: ObjectRef) -> Option<MemoEntry> {
        self.sessions.get(&document).and_then(|s| s.memo.get(reference))
    }

    /// Drop the session of a source document.
    ///
    /// Later imports from the same document start from an empty memo table
    /// and duplicate anything copied before.
    pub fn free_reader(&mut self, document: DocumentId) {
        if let Some(session) = self.sessions.remove(&document) {
            log::debug!(
                "Released copy session of {} ({} memo entries)",
                document,
                session.memo.len()
            );
        }
    }

    /// Copy page `n` (1-based) of `source` to the end of the destination.
    pub fn add_page<S: SourceDocument + ?Sized>(&mut self, source: &mut S, n: usize) -> Result<ObjectRef> {
        let copied = self.add_pages(source, &[n])?;
        copied
            .first()
            .copied()
            .ok_or_else(|| Error::InvalidPdf("page copy produced nothing".to_string()))
    }

    /// Copy several pages of `source` as one batch.
    ///
    /// Structure elements are kept only when they belong to pages of the
    /// batch, so tagged documents should be imported in as few batches as
    /// possible.
    pub fn add_pages<S: SourceDocument + ?Sized>(&mut self, source: &mut S, pages: &[usize]) -> Result<Vec<ObjectRef>> {
        let mut batch = HashSet::with_capacity(pages.len());
        let mut page_refs = Vec::with_capacity(pages.len());
        for &n in pages {
            let reference = source.page_ref(n)?;
            batch.insert(reference);
            page_refs.push((n, reference));
        }

        let struct_root = if self.options.tagged {
            let catalog = source.catalog()?;
            let root = catalog.get_reference("StructTreeRoot");
            if root.is_none() {
                log::debug!("Source has no structure tree, copying untagged");
            }
            root
        } else {
            None
        };
        if struct_root.is_some() && self.structure.is_none() {
            self.structure = Some(StructTreeBuilder::new(self.writer.alloc_ref()));
        }
        let keep = struct_root.is_some();
        let merge_acroform = self.options.merge_acroform;

        let copied = self.run(source, batch, |copier| {
            copier.session.tracker.clear();
            if let Some(root) = struct_root {
                copier.prepare_structure(root)?;
            }
            for (_, reference) in &page_refs {
                copier.reserve(*reference);
            }

            let mut copied = Vec::with_capacity(page_refs.len());
            for (n, reference) in &page_refs {
                copied.push(copier.copy_page(*n, *reference, keep)?);
            }

            if let Some(root) = struct_root {
                copier.copy_root_kids(root)?;
            }
            if merge_acroform {
                copier.merge_form_defaults()?;
            }
            Ok(copied)
        })?;

        log::info!(
            "Copied {} page(s), destination now has {} pages",
            copied.len(),
            self.writer.page_count()
        );
        Ok(copied)
    }

    /// Copy an object of `source` into the destination, renumbering its references.
    pub fn copy_object<S: SourceDocument + ?Sized>(
        &mut self,
        source: &mut S,
        object: &Object,
        keep_structure: bool,
        direct_root_kids: bool,
    ) -> Result<Object> {
        self.run(source, HashSet::new(), |copier| {
            copier.copy_object(object, keep_structure, direct_root_kids)
        })
    }

    /// Copy the indirect object `reference` of `source`.
    ///
    /// Returns the destination reference, or null when the object was dropped.
    pub fn copy_indirect<S: SourceDocument + ?Sized>(
        &mut self,
        source: &mut S,
        reference: ObjectRef,
        keep_structure: bool,
        direct_root_kids: bool,
    ) -> Result<Object> {
        self.run(source, HashSet::new(), |copier| {
            copier.copy_indirect(reference, keep_structure, direct_root_kids)
        })
    }

    fn run<S, T, F>(&mut self, source: &mut S, batch: HashSet<ObjectRef>, f: F) -> Result<T>
    where
        S: SourceDocument + ?Sized,
        F: FnOnce(&mut Copier<'_, S>) -> Result<T>,
    {
        let id = source.id();
        let mut session = self.sessions.remove(&id).unwrap_or_default();
        let result = {
            let mut copier = Copier {
                source,
                session: &mut session,
                writer: &mut self.writer,
                structure: self.structure.as_mut(),
                acroform: &mut self.acroform,
                merge_acroform: self.options.merge_acroform,
                batch,
                stack: Vec::new(),
                depth: 0,
            };
            f(&mut copier)
        };
        self.sessions.insert(id, session);
        result
    }

    /// Bookmarks written as the document outline when the copy is finished.
    ///
    /// Page strings refer to destination page numbers; see
    /// [`shift_page_numbers`](crate::outline::shift_page_numbers) for
    /// moving bookmarks read from a source document.
    pub fn set_outlines(&mut self, bookmarks: Vec<Bookmark>) {
        self.outlines = bookmarks;
    }

    /// Write the structure tree, form and outline, and hand back the writer still open.
    pub fn into_writer(mut self) -> Result<PdfWriter> {
        if let Some(tree) = self.structure.take() {
            let root = tree.root();
            self.writer.write_object(root, &Object::Dictionary(tree.build()))?;
            let mut mark_info = Dictionary::new();
            mark_info.insert(names::MARKED, true);
            let catalog = self.writer.catalog_mut();
            catalog.insert(names::STRUCT_TREE_ROOT, root);
            catalog.insert(names::MARK_INFO, mark_info);
            log::debug!("Wrote structure tree root {} ({} parent tree entries)", root, tree.parent_tree_len());
        }

        if let Some(form) = self.acroform.build() {
            let form_ref = self.writer.add_object(form)?;
            self.writer.catalog_mut().insert(names::ACRO_FORM, form_ref);
            log::debug!("Merged {} form fields", self.acroform.fields().len());
        }

        if !self.outlines.is_empty() {
            let pages = self.writer.pages().to_vec();
            if let Some(root) = OutlineWriter::new(&mut self.writer, &pages).write(&self.outlines)? {
                let catalog = self.writer.catalog_mut();
                catalog.insert(names::OUTLINES, root);
                catalog.insert("PageMode", Object::name("UseOutlines"));
            }
        }

        for (id, session) in &self.sessions {
            let pending = session.memo.pending().count();
            if pending > 0 {
                log::debug!("{} objects of {} were referenced but never copied", pending, id);
            }
        }
        Ok(self.writer)
    }

    /// Finish the document and return its bytes.
    pub fn close(self) -> Result<Vec<u8>> {
        self.into_writer()?.finish()
    }

    /// Finish the document and save it.
    pub fn save(self, path: impl AsRef<Path>) -> Result<()> {
        self.into_writer()?.save(path)
    }
}

/// One copy operation over one source document.
struct Copier<'a, S: SourceDocument + ?Sized> {
    source: &'a mut S,
    session: &'a mut DocumentSession,
    writer: &'a mut PdfWriter,
    structure: Option<&'a mut StructTreeBuilder>,
    acroform: &'a mut AcroFormBuilder,
    merge_acroform: bool,
    /// Source page references of the current batch
    batch: HashSet<ObjectRef>,
    /// Source references whose copy is in progress
    stack: Vec<ObjectRef>,
    /// Current nesting of containers and references
    depth: usize,
}

impl<'a, S: SourceDocument + ?Sized> Copier<'a, S> {
    fn reserve(&mut self, source_ref: ObjectRef) -> ObjectRef {
        let writer = &mut *self.writer;
        self.session.memo.reserve(source_ref, || writer.alloc_ref())
    }

    fn copy_object(&mut self, object: &Object, keep: bool, direct_root_kids: bool) -> Result<Object> {
        if !matches!(object, Object::Array(_) | Object::Dictionary(_) | Object::Stream { .. } | Object::Reference(_)) {
            return Ok(object.clone());
        }
        if self.depth >= MAX_COPY_DEPTH {
            return Err(Error::RecursionLimitExceeded(MAX_COPY_DEPTH as u32));
        }
        self.depth += 1;
        let copied = self.copy_nested(object, keep, direct_root_kids);
        self.depth -= 1;
        copied
    }

    fn copy_nested(&mut self, object: &Object, keep: bool, direct_root_kids: bool) -> Result<Object> {
        match object {
            Object::Array(items) => Ok(Object::Array(self.copy_array(items, keep, direct_root_kids)?)),
            Object::Dictionary(dict) => Ok(self
                .copy_dictionary(dict, keep, direct_root_kids)?
                .map(Object::Dictionary)
                .unwrap_or(Object::Null)),
            Object::Stream { dict, data } => match self.copy_dictionary(dict, keep, false)? {
                Some(dict) => Ok(Object::Stream {
                    dict,
                    data: data.clone(),
                }),
                None => Ok(Object::Null),
            },
            Object::Reference(reference) => self.copy_indirect(*reference, keep, direct_root_kids),
            scalar => Ok(scalar.clone()),
        }
    }

    fn copy_array(&mut self, items: &[Object], keep: bool, direct_root_kids: bool) -> Result<Vec<Object>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let copied = self.copy_object(item, keep, direct_root_kids)?;
            if !copied.is_null() {
                out.push(copied);
            }
        }
        Ok(out)
    }

    /// Copy a dictionary; `None` means the dictionary is dropped.
    fn copy_dictionary(&mut self, dict: &Dictionary, keep: bool, direct_root_kids: bool) -> Result<Option<Dictionary>> {
        let struct_elem = keep && is_struct_elem(dict);

        if keep {
            if let Some(page) = dict.get_reference("Pg") {
                if !self.batch.contains(&page) {
                    log::debug!("Dropping structure node on page {} outside the batch", page);
                    return Ok(None);
                }
            }
        }

        let had_kids = struct_elem && dict.get("K").map_or(false, |k| !is_empty_kids(k));
        let mut out = Dictionary::new();
        for (key, value) in dict {
            if value.is_null() {
                continue;
            }

            if keep && (*key == names::STRUCT_PARENT || *key == names::STRUCT_PARENTS) {
                if let Some(renumbered) = self.remap_struct_parent(value)? {
                    out.insert(key.clone(), renumbered);
                }
                continue;
            }

            if struct_elem && direct_root_kids && *key == names::P {
                if let Some(root) = self.structure.as_deref().map(StructTreeBuilder::root) {
                    out.insert(key.clone(), root);
                    continue;
                }
            }

            if keep && *key == names::K {
                if let Some(&current) = self.stack.last() {
                    for child in referenced_kids(value) {
                        self.session.tracker.record_parent(child, current);
                    }
                }
            }

            let copied = self.copy_object(value, keep, false)?;
            if !copied.is_null() {
                out.insert(key.clone(), copied);
            }
        }

        if had_kids && out.get("K").map_or(true, is_empty_kids) {
            log::debug!("Structure element lost all its kids, dropping it");
            return Ok(None);
        }
        Ok(Some(out))
    }

    fn copy_indirect(&mut self, source_ref: ObjectRef, keep: bool, direct_root_kids: bool) -> Result<Object> {
        let entry = self.session.memo.get(source_ref);
        if let Some(entry) = entry.filter(|e| e.state == MemoState::Copied) {
            // Copied elements were written (or are being written) and stay referenced
            return Ok(Object::Reference(entry.destination));
        }
        if keep && self.session.tracker.is_disabled(source_ref) {
            self.session.memo.discard(source_ref);
            return Ok(Object::Null);
        }

        let destination = self.reserve(source_ref);
        let resolved = match self.source.resolve(source_ref) {
            Ok(object) => object,
            Err(e) => {
                log::warn!("Cannot resolve {}: {}, dropping the reference", source_ref, e);
                self.session.memo.discard(source_ref);
                return Ok(Object::Null);
            },
        };
        if resolved.is_null() {
            log::debug!("{} resolves to null, dropping the reference", source_ref);
            self.session.memo.discard(source_ref);
            return Ok(Object::Null);
        }
        if let Object::Dictionary(dict) = &resolved {
            if dict.has_type("Page") {
                return Ok(Object::Reference(destination));
            }
        }

        self.session.memo.mark_copied(source_ref);
        self.stack.push(source_ref);
        let copied = self.copy_object(&resolved, keep, direct_root_kids);
        self.stack.pop();

        let copied = match copied {
            Ok(copied) => copied,
            Err(e) => {
                self.session.memo.discard(source_ref);
                return Err(e);
            },
        };
        if copied.is_null() {
            self.session.memo.discard(source_ref);
            if keep {
                self.session.tracker.disable_settled(source_ref, &self.stack);
            }
            return Ok(Object::Null);
        }

        self.writer.write_object(destination, &copied)?;
        log::debug!("Copied {} to {}", source_ref, destination);
        Ok(Object::Reference(destination))
    }

    fn copy_page(&mut self, n: usize, source_ref: ObjectRef, keep: bool) -> Result<ObjectRef> {
        let destination = match self.session.memo.get(source_ref) {
            Some(entry) if entry.state == MemoState::Copied => {
                log::warn!("Page {} was already copied from this document, adding a second copy", n);
                self.writer.alloc_ref()
            },
            _ => {
                let destination = self.reserve(source_ref);
                self.session.memo.mark_copied(source_ref);
                destination
            },
        };

        let mut page = self.source.page(n)?;
        page.remove("Parent");
        page.remove("B");

        self.stack.push(source_ref);
        let copied = self.copy_dictionary(&page, keep, false);
        self.stack.pop();

        let mut copied = copied?.unwrap_or_default();
        copied.insert(names::PARENT, self.writer.page_tree_ref());
        self.writer.write_object(destination, &Object::Dictionary(copied))?;
        self.writer.add_page(destination)?;
        log::debug!("Copied page {} ({}) to {}", n, source_ref, destination);

        if self.merge_acroform {
            self.collect_fields(&page, keep)?;
        }
        Ok(destination)
    }

    /// Map the source structure root onto the destination root and merge its maps.
    fn prepare_structure(&mut self, root: ObjectRef) -> Result<()> {
        let dest_root = match self.structure.as_deref() {
            Some(tree) => tree.root(),
            None => return Ok(()),
        };
        self.session.memo.insert_copied(root, dest_root);

        let root_dict = match self.source.resolve(root)? {
            Object::Dictionary(dict) => dict,
            other => {
                log::warn!("StructTreeRoot is a {}, ignoring the structure tree", other.type_name());
                return Ok(());
            },
        };

        if self.session.parent_tree.is_none() {
            if let Some(tree) = root_dict.get("ParentTree") {
                match self.source.resolve_value(tree)? {
                    Object::Dictionary(tree) => self.session.parent_tree = Some(tree),
                    other => log::warn!("ParentTree is a {}, struct parents will be dropped", other.type_name()),
                }
            }
        }

        for (map_key, is_role) in [("RoleMap", true), ("ClassMap", false)] {
            let map = match root_dict.get(map_key) {
                Some(map) => self.source.resolve_value(map)?,
                None => continue,
            };
            let Object::Dictionary(map) = map else {
                continue;
            };
            for (key, value) in map {
                let present = self.structure.as_deref().map_or(true, |tree| {
                    if is_role {
                        tree.has_role(key.as_str())
                    } else {
                        tree.has_class(key.as_str())
                    }
                });
                if present {
                    continue;
                }
                let copied = self.copy_object(&value, false, false)?;
                if copied.is_null() {
                    continue;
                }
                if let Some(tree) = self.structure.as_deref_mut() {
                    if is_role {
                        tree.add_role(key.as_str(), copied);
                    } else {
                        tree.add_class(key.as_str(), copied);
                    }
                }
            }
        }
        Ok(())
    }

    /// Copy the kids of the source structure root that survive the batch filter.
    fn copy_root_kids(&mut self, root: ObjectRef) -> Result<()> {
        let kids = match self.source.resolve(root)? {
            Object::Dictionary(dict) => match dict.get("K") {
                Some(kids) => self.source.resolve_value(kids)?,
                None => return Ok(()),
            },
            _ => return Ok(()),
        };
        let kids = match kids {
            Object::Array(kids) => kids,
            single => vec![single],
        };

        let mut kept = 0;
        for kid in &kids {
            let copied = self.copy_object(kid, true, true)?;
            if copied.is_null() {
                continue;
            }
            if let Some(tree) = self.structure.as_deref_mut() {
                tree.add_kid(copied);
                kept += 1;
            }
        }
        log::debug!("Kept {} of {} structure root kids", kept, kids.len());
        Ok(())
    }

    /// Renumber a `/StructParent(s)` value through the destination parent tree.
    fn remap_struct_parent(&mut self, value: &Object) -> Result<Option<Object>> {
        if self.structure.is_none() || self.session.parent_tree.is_none() {
            return Ok(Some(value.clone()));
        }
        let key = match self.source.resolve_value(value)?.as_integer() {
            Some(key) => key,
            None => {
                log::warn!("Non-integer struct parent key {:?}, dropping it", value);
                return Ok(None);
            },
        };

        let tree = self.session.parent_tree.take().unwrap_or_default();
        let entry = number_tree_get(self.source, &tree, key);
        self.session.parent_tree = Some(tree);
        let entry = match entry? {
            Some(entry) => entry,
            None => {
                log::warn!("Struct parent key {} missing from the parent tree", key);
                return Ok(None);
            },
        };

        let copied = self.copy_object(&entry, true, false)?;
        if copied.is_null() {
            return Ok(None);
        }
        Ok(self
            .structure
            .as_deref_mut()
            .map(|tree| Object::Integer(tree.add_parent_tree_entry(copied))))
    }

    /// Add the top-level fields of the widgets on a copied page to the form.
    fn collect_fields(&mut self, page: &Dictionary, keep: bool) -> Result<()> {
        let annots = match page.get("Annots") {
            Some(annots) => self.source.resolve_value(annots)?,
            None => return Ok(()),
        };
        let Object::Array(annots) = annots else {
            return Ok(());
        };

        for annot in annots {
            let Some(mut top) = annot.as_reference() else {
                continue;
            };
            let mut dict = match self.source.resolve(top)? {
                Object::Dictionary(dict) => dict,
                _ => continue,
            };
            if dict.get_name("Subtype") != Some("Widget") {
                continue;
            }
            for _ in 0..MAX_FIELD_DEPTH {
                let Some(parent) = dict.get_reference("Parent") else {
                    break;
                };
                match self.source.resolve(parent)? {
                    Object::Dictionary(parent_dict) => {
                        top = parent;
                        dict = parent_dict;
                    },
                    _ => break,
                }
            }
            if let Object::Reference(field) = self.copy_indirect(top, keep, false)? {
                self.acroform.add_field(field);
            }
        }
        Ok(())
    }

    /// Take form-wide defaults from this source where the destination has none yet.
    fn merge_form_defaults(&mut self) -> Result<()> {
        let catalog = self.source.catalog()?;
        let form = match catalog.get("AcroForm") {
            Some(form) => self.source.resolve_value(form)?,
            None => return Ok(()),
        };
        let Object::Dictionary(form) = form else {
            return Ok(());
        };
        for key in FORM_DEFAULT_KEYS {
            if self.acroform.has_default(key.as_str()) {
                continue;
            }
            if let Some(value) = form.get(key.as_str()) {
                let copied = self.copy_object(value, false, false)?;
                if !copied.is_null() {
                    self.acroform.set_default(key, copied);
                }
            }
        }
        Ok(())
    }
}

fn is_empty_kids(kids: &Object) -> bool {
    match kids {
        Object::Null => true,
        Object::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Indirect children listed directly in a `/K` value.
fn referenced_kids(kids: &Object) -> Vec<ObjectRef> {
    match kids {
        Object::Reference(r) => vec![*r],
        Object::Array(items) => items.iter().filter_map(Object::as_reference).collect(),
        _ => Vec::new(),
    }
}
