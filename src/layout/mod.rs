//! Table layout: column widths, row and column spans, page breaks.
//!
//! A [`PdfPTable`] is filled cell by cell. [`PdfPTable::layout`] computes
//! row heights for a given width and distributes the rows over pages,
//! repeating header rows and splitting rows that straddle a page break.
//! Each resulting [`TableSlice`] renders to content stream operators.
//!
//! ## Example
//!
//! ```no_run
//! use pdf_graft::layout::{PdfPCell, PdfPTable, SimpleFontMetrics};
//! use pdf_graft::writer::PdfWriter;
//!
//! let mut table = PdfPTable::new(&[1.0, 3.0])?.with_header_rows(1);
//! table.add_cell(PdfPCell::new("Key"));
//! table.add_cell(PdfPCell::new("Value"));
//! table.add_text("name");
//! table.add_text("pdf_graft");
//!
//! let mut writer = PdfWriter::new();
//! table.write_pages(&mut writer, [612.0, 792.0], 36.0, &SimpleFontMetrics::default())?;
//! writer.save("table.pdf")?;
//! # Ok::<(), pdf_graft::Error>(())
//! ```

mod cell;
mod content;
mod row;
mod table;

pub use cell::{Borders, CellAlign, CellPadding, CellVAlign, FontMetrics, PdfPCell, SimpleFontMetrics};
pub use content::{ContentBuilder, ContentOp};
pub use row::PdfPRow;
pub use table::{PdfPTable, TableSlice, TABLE_FONT_RESOURCE};
