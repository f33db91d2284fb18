//! Document outline (bookmarks).
//!
//! Bookmarks are read from a document's outline tree into [`Bookmark`]
//! values, exchanged as XML or JSON, adjusted when pages move, and written
//! back as outline dictionaries with [`OutlineWriter`].
//!
//! PDF Spec: ISO 32000-1:2008, Section 12.3.3 - Document Outline
//!
//! ## Example
//!
//! ```ignore
//! use pdf_graft::outline::{export_to_xml, Bookmark};
//! use pdf_graft::reader::PdfReader;
//!
//! let mut reader = PdfReader::open("book.pdf")?;
//! let bookmarks = Bookmark::from_reader(&mut reader)?;
//! export_to_xml(&bookmarks, std::io::stdout(), "UTF-8")?;
//! ```

mod bookmark;
mod reader;
mod writer;
mod xml;

pub use bookmark::{
    eliminate_pages, escape_binary_string, shift_page_numbers, unescape_binary_string, Bookmark, BookmarkAction,
    BookmarkStyle, PageDestination, Target,
};
pub use writer::OutlineWriter;
pub use xml::{export_to_xml, export_to_xml_string, import_from_xml, import_from_xml_str};
