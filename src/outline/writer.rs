//! Writing bookmarks as outline dictionaries.
//!
//! PDF Spec: ISO 32000-1:2008, Section 12.3.3 - Document Outline
//!
//! Every item gets `/Title`, `/Parent`, sibling links `/Prev` and `/Next`,
//! and when it has children `/First`, `/Last` and `/Count` (negative when
//! closed). The outline root carries the number of visible items.

use super::bookmark::{Bookmark, BookmarkAction, PageDestination, Target};
use crate::error::Result;
use crate::names::{self, Name};
use crate::object::{Dictionary, Object, ObjectRef, PdfString};
use crate::writer::PdfWriter;

/// Writes a bookmark tree into a [`PdfWriter`].
pub struct OutlineWriter<'a> {
    writer: &'a mut PdfWriter,
    page_refs: Vec<ObjectRef>,
    written: usize,
}

impl<'a> OutlineWriter<'a> {
    /// Outline writer resolving page strings against `page_refs` (page 1 first).
    pub fn new(writer: &'a mut PdfWriter, page_refs: &[ObjectRef]) -> Self {
        Self {
            writer,
            page_refs: page_refs.to_vec(),
            written: 0,
        }
    }

    /// Write the tree and return the outline root, `None` when there are no bookmarks.
    ///
    /// The caller links the root from the catalog's `/Outlines`.
    pub fn write(mut self, bookmarks: &[Bookmark]) -> Result<Option<ObjectRef>> {
        if bookmarks.is_empty() {
            return Ok(None);
        }
        let root = self.writer.alloc_ref();
        let items = self.write_level(bookmarks, root)?;

        let total: i64 = bookmarks.iter().map(|b| 1 + b.visible_descendant_count()).sum();
        let mut dict = Dictionary::with_type(names::OUTLINES);
        if let (Some(first), Some(last)) = (items.first(), items.last()) {
            dict.insert(names::FIRST, *first);
            dict.insert(names::LAST, *last);
        }
        dict.insert(names::COUNT, total);
        self.writer.write_object(root, &Object::Dictionary(dict))?;
        log::info!("Wrote outline with {} items", self.written);
        Ok(Some(root))
    }

    /// Write one sibling list; references are allocated up front so siblings can link.
    fn write_level(&mut self, items: &[Bookmark], parent: ObjectRef) -> Result<Vec<ObjectRef>> {
        let refs: Vec<ObjectRef> = items.iter().map(|_| self.writer.alloc_ref()).collect();
        for (i, item) in items.iter().enumerate() {
            let mut dict = Dictionary::new();
            dict.insert(names::TITLE, Object::text(&item.title));
            dict.insert(names::PARENT, parent);
            if i > 0 {
                dict.insert(names::PREV, refs[i - 1]);
            }
            if let Some(next) = refs.get(i + 1) {
                dict.insert(names::NEXT, *next);
            }

            if !item.kids.is_empty() {
                let kids = self.write_level(&item.kids, refs[i])?;
                if let (Some(first), Some(last)) = (kids.first(), kids.last()) {
                    dict.insert(names::FIRST, *first);
                    dict.insert(names::LAST, *last);
                }
                let count = item.descendant_count();
                if count != 0 {
                    dict.insert(names::COUNT, count);
                }
            }

            if !item.style.is_empty() {
                dict.insert(names::F, item.style.bits() as i64);
            }
            if let Some([r, g, b]) = item.color {
                dict.insert(names::C, vec![Object::Real(r), Object::Real(g), Object::Real(b)]);
            }
            if let Some(action) = &item.action {
                self.apply_action(&mut dict, action, &item.title);
            }

            self.writer.write_object(refs[i], &Object::Dictionary(dict))?;
            self.written += 1;
        }
        Ok(refs)
    }

    fn apply_action(&self, dict: &mut Dictionary, action: &BookmarkAction, title: &str) {
        match action {
            BookmarkAction::GoTo(target) => match target {
                Target::Page(page) => match self.local_destination(page) {
                    Some(dest) => {
                        dict.insert(names::DEST, dest);
                    },
                    None => log::warn!("Bookmark '{}': page '{}' is not in the document", title, page),
                },
                Target::Named(name) => {
                    dict.insert(names::DEST, PdfString::literal(from_latin1(name)));
                },
                Target::NamedN(name) => {
                    dict.insert(names::DEST, Name::new(name));
                },
            },
            BookmarkAction::GoToR {
                file,
                target,
                new_window,
            } => {
                let mut a = action_dict(names::GOTOR);
                a.insert(names::F, Object::text(file));
                match target {
                    Some(Target::Page(page)) => match PageDestination::parse(page) {
                        Some(dest) => {
                            a.insert(names::D, destination_array(Object::Integer(dest.page as i64 - 1), &dest));
                        },
                        None => log::warn!("Bookmark '{}': malformed page '{}'", title, page),
                    },
                    Some(Target::Named(name)) => {
                        a.insert(names::D, PdfString::literal(from_latin1(name)));
                    },
                    Some(Target::NamedN(name)) => {
                        a.insert(names::D, Name::new(name));
                    },
                    None => {},
                }
                if let Some(new_window) = new_window {
                    a.insert(names::NEW_WINDOW, *new_window);
                }
                dict.insert(names::A, a);
            },
            BookmarkAction::Uri(uri) => {
                let mut a = action_dict(names::URI);
                a.insert(names::URI, PdfString::literal(from_latin1(uri)));
                dict.insert(names::A, a);
            },
            BookmarkAction::Launch(file) => {
                let mut a = action_dict(names::LAUNCH);
                a.insert(names::F, Object::text(file));
                dict.insert(names::A, a);
            },
            BookmarkAction::JavaScript(code) => {
                let mut a = action_dict(names::ACTION_JAVASCRIPT);
                a.insert(names::JS, Object::text(code));
                dict.insert(names::A, a);
            },
            BookmarkAction::Hide { field, hide } => {
                let mut a = action_dict(names::HIDE);
                a.insert(names::T, Object::text(field));
                if !*hide {
                    a.insert("H", false);
                }
                dict.insert(names::A, a);
            },
            BookmarkAction::SetOcgState(_) => {
                log::warn!(
                    "Bookmark '{}': SetOCGState refers to groups of its source document, action dropped",
                    title
                );
            },
        }
    }

    fn local_destination(&self, page: &str) -> Option<Object> {
        let dest = PageDestination::parse(page)?;
        let page_ref = *self.page_refs.get(dest.page.checked_sub(1)?)?;
        Some(destination_array(Object::Reference(page_ref), &dest))
    }
}

fn action_dict(kind: Name) -> Dictionary {
    let mut a = Dictionary::new();
    a.insert(names::S, kind);
    a
}

fn destination_array(page: Object, dest: &PageDestination) -> Object {
    let mut array = vec![page, Object::Name(Name::new(&dest.fit))];
    array.extend(dest.args.iter().map(|arg| match arg {
        Some(v) if v.fract() == 0.0 => Object::Integer(*v as i64),
        Some(v) => Object::Real(*v),
        None => Object::Null,
    }));
    Object::Array(array)
}

fn from_latin1(value: &str) -> Vec<u8> {
    value.chars().map(|c| if (c as u32) < 256 { c as u8 } else { b'?' }).collect()
}
