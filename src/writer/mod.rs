//! PDF writing.
//!
//! ## Architecture
//!
//! ```text
//! Object graph (built or copied)
//!     ↓
//! [PdfWriter] (numbering, body, page tree, xref, trailer, append mode)
//!     ↓
//! [ObjectSerializer] (objects → bytes, reserved slots)
//!     ↓
//! [OutputSink] (memory or temporary file, patchable)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use pdf_graft::object::Dictionary;
//! use pdf_graft::writer::PdfWriter;
//!
//! let mut writer = PdfWriter::new();
//! writer.new_page([0.0, 0.0, 612.0, 792.0], Dictionary::new(), b"72 720 m 300 720 l S")?;
//! let bytes = writer.finish()?;
//! # Ok::<(), pdf_graft::Error>(())
//! ```

mod object_serializer;
mod output;
mod pdf_writer;

pub use object_serializer::{ObjectSerializer, SlotPosition};
pub use output::OutputSink;
pub use pdf_writer::{PdfWriter, ReservedSlot};
