//! Table construction, page layout and rendering.

use super::cell::{Borders, CellAlign, CellVAlign, FontMetrics, PdfPCell};
use super::content::ContentBuilder;
use super::row::PdfPRow;
use crate::error::{Error, Result};
use crate::names;
use crate::object::{Dictionary, Object, ObjectRef};
use crate::writer::PdfWriter;

/// Font resource name used in rendered table content.
pub const TABLE_FONT_RESOURCE: &str = "F1";

/// Rows placed on one page, headers first.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSlice {
    /// Repeated header rows
    pub header: Vec<PdfPRow>,
    /// Body rows, possibly the tail or head of a split row
    pub rows: Vec<PdfPRow>,
    /// Absolute column widths
    pub widths: Vec<f64>,
    /// Total height of header and body rows
    pub height: f64,
}

impl TableSlice {
    /// Total width of the columns.
    pub fn width(&self) -> f64 {
        self.widths.iter().sum()
    }

    fn new(header: &[PdfPRow], widths: &[f64]) -> Self {
        Self {
            header: header.to_vec(),
            rows: Vec::new(),
            widths: widths.to_vec(),
            height: header.iter().map(PdfPRow::max_height).sum(),
        }
    }

    fn push(&mut self, row: PdfPRow) {
        self.height += row.max_height();
        self.rows.push(row);
    }
}

/// A table whose cells are added left to right, top to bottom.
#[derive(Debug, Clone)]
pub struct PdfPTable {
    relative_widths: Vec<f64>,
    total_width: f64,
    width_percentage: f64,
    locked_width: bool,
    header_rows: usize,
    split_rows: bool,
    rows: Vec<PdfPRow>,
    current: Vec<Option<PdfPCell>>,
    current_col: usize,
    /// Per column, the row index up to which a rowspan from above covers it.
    span_until: Vec<usize>,
}

impl PdfPTable {
    /// Table with columns proportional to `relative_widths`.
    pub fn new(relative_widths: &[f64]) -> Result<Self> {
        check_widths(relative_widths)?;
        let columns = relative_widths.len();
        Ok(Self {
            relative_widths: relative_widths.to_vec(),
            total_width: 0.0,
            width_percentage: 80.0,
            locked_width: false,
            header_rows: 0,
            split_rows: true,
            rows: Vec::new(),
            current: vec![None; columns],
            current_col: 0,
            span_until: vec![0; columns],
        })
    }

    /// Table with `columns` equal columns.
    pub fn with_columns(columns: usize) -> Result<Self> {
        Self::new(&vec![1.0; columns])
    }

    /// Number of columns.
    pub fn columns(&self) -> usize {
        self.relative_widths.len()
    }

    /// Completed rows.
    pub fn rows(&self) -> &[PdfPRow] {
        &self.rows
    }

    /// Number of leading rows repeated at the top of every page.
    pub fn with_header_rows(mut self, rows: usize) -> Self {
        self.header_rows = rows;
        self
    }

    /// Percentage of the available width used when the width is not locked.
    pub fn with_width_percentage(mut self, percentage: f64) -> Self {
        self.width_percentage = percentage;
        self
    }

    /// Use an absolute total width, ignoring the available width.
    pub fn with_total_width(mut self, width: f64) -> Self {
        self.total_width = width;
        self.locked_width = true;
        self
    }

    /// Set absolute column widths; this locks the total width to their sum.
    pub fn with_absolute_widths(mut self, widths: &[f64]) -> Result<Self> {
        if widths.len() != self.columns() {
            return Err(Error::Layout(format!(
                "expected {} column widths, got {}",
                self.columns(),
                widths.len()
            )));
        }
        check_widths(widths)?;
        self.relative_widths = widths.to_vec();
        self.total_width = widths.iter().sum();
        self.locked_width = true;
        Ok(self)
    }

    /// Whether rows may be split across pages (default `true`).
    pub fn with_split_rows(mut self, split: bool) -> Self {
        self.split_rows = split;
        self
    }

    /// Add a cell at the next free position.
    ///
    /// Columns covered by a rowspan from a previous row are skipped. A
    /// colspan reaching past the last column is truncated.
    pub fn add_cell(&mut self, mut cell: PdfPCell) {
        self.skip_covered();
        let columns = self.columns();
        let col = self.current_col;
        cell.colspan = cell.colspan.min(columns - col);
        let row_index = self.rows.len();
        if cell.rowspan > 1 {
            for until in &mut self.span_until[col..col + cell.colspan] {
                *until = row_index + cell.rowspan;
            }
        }
        self.current_col += cell.colspan;
        self.current[col] = Some(cell);
        if self.current_col >= columns {
            self.finish_row();
        }
    }

    /// Add a plain text cell.
    pub fn add_text(&mut self, text: &str) {
        self.add_cell(PdfPCell::new(text));
    }

    /// Fill the rest of a partially filled row with empty cells.
    pub fn complete_row(&mut self) {
        if self.current_col == 0 {
            return;
        }
        while self.current_col < self.columns() {
            self.skip_covered();
            if self.current_col == 0 {
                // skip_covered finished the row
                return;
            }
            self.add_cell(PdfPCell::empty());
        }
    }

    fn skip_covered(&mut self) {
        loop {
            let row_index = self.rows.len();
            while self.current_col < self.columns() && self.span_until[self.current_col] > row_index {
                self.current_col += 1;
            }
            if self.current_col < self.columns() {
                return;
            }
            self.finish_row();
        }
    }

    fn finish_row(&mut self) {
        let columns = self.columns();
        let cells = std::mem::replace(&mut self.current, vec![None; columns]);
        self.rows.push(PdfPRow::new(cells));
        self.current_col = 0;
    }

    /// Absolute column widths for the given available width.
    pub fn absolute_widths(&self, available_width: f64) -> Vec<f64> {
        let total = if self.locked_width {
            self.total_width
        } else {
            available_width * self.width_percentage / 100.0
        };
        let sum: f64 = self.relative_widths.iter().sum();
        self.relative_widths.iter().map(|w| total * w / sum).collect()
    }

    /// Compute every row height for the given width.
    ///
    /// A cell spanning several rows that is taller than those rows grows
    /// the last row it covers.
    pub fn calculate_heights(&mut self, available_width: f64, metrics: &dyn FontMetrics) {
        let widths = self.absolute_widths(available_width);
        for row in &mut self.rows {
            row.set_widths(&widths);
            row.calculate_heights(metrics);
        }
        for r in 0..self.rows.len() {
            for col in 0..self.columns() {
                let (needed, span) = match &self.rows[r].cells()[col] {
                    Some(cell) if cell.rowspan > 1 => (cell.height(self.rows[r].cell_width(col), metrics), cell.rowspan),
                    _ => continue,
                };
                let last = (r + span).min(self.rows.len()) - 1;
                let have: f64 = self.rows[r..=last].iter().map(PdfPRow::max_height).sum();
                if needed > have {
                    self.rows[last].extend_height(needed - have);
                }
            }
        }
    }

    /// Total height of all rows after [`calculate_heights`](Self::calculate_heights).
    pub fn total_height(&self) -> f64 {
        self.rows.iter().map(PdfPRow::max_height).sum()
    }

    /// Distribute the rows over pages with `page_height` points of room each.
    ///
    /// Header rows are repeated on every slice. Rows tied together by a
    /// rowspan stay on one page. A row that does not fit on an empty page
    /// is split when splitting is enabled, otherwise placed anyway.
    pub fn layout(
        &mut self,
        page_height: f64,
        available_width: f64,
        metrics: &dyn FontMetrics,
    ) -> Result<Vec<TableSlice>> {
        self.complete_row();
        self.calculate_heights(available_width, metrics);
        let widths = self.absolute_widths(available_width);
        let header_count = self.header_rows.min(self.rows.len());
        let (header, body) = self.rows.split_at(header_count);
        let header_height: f64 = header.iter().map(PdfPRow::max_height).sum();
        if header_height >= page_height {
            return Err(Error::Layout(format!(
                "header rows need {:.2}pt, page has {:.2}pt",
                header_height, page_height
            )));
        }

        let mut slices = Vec::new();
        let mut slice = TableSlice::new(header, &widths);
        for group in rowspan_groups(body) {
            let group_height: f64 = group.iter().map(PdfPRow::max_height).sum();
            if slice.height + group_height <= page_height {
                group.iter().cloned().for_each(|row| slice.push(row));
                continue;
            }

            if group.len() == 1 && self.split_rows {
                let mut row = group[0].clone();
                loop {
                    if slice.height + row.max_height() <= page_height {
                        slice.push(row);
                        break;
                    }
                    match row.split_row(page_height - slice.height, metrics) {
                        Some(rest) => {
                            slice.push(row);
                            slices.push(std::mem::replace(&mut slice, TableSlice::new(header, &widths)));
                            row = rest;
                        },
                        None if !slice.rows.is_empty() => {
                            slices.push(std::mem::replace(&mut slice, TableSlice::new(header, &widths)));
                        },
                        None => {
                            log::warn!(
                                "Row of {:.2}pt cannot be split to fit {:.2}pt, placing it whole",
                                row.max_height(),
                                page_height - slice.height
                            );
                            slice.push(row);
                            break;
                        },
                    }
                }
                continue;
            }

            if !slice.rows.is_empty() {
                slices.push(std::mem::replace(&mut slice, TableSlice::new(header, &widths)));
            }
            if slice.height + group_height > page_height {
                log::warn!("{} rows tied by a rowspan overflow the page", group.len());
            }
            group.iter().cloned().for_each(|row| slice.push(row));
        }
        if !slice.rows.is_empty() || slices.is_empty() {
            slices.push(slice);
        }
        log::debug!("Table of {} rows laid out on {} pages", self.rows.len(), slices.len());
        Ok(slices)
    }

    /// Content stream operators drawing `slice` with its top-left corner at (`x`, `top`).
    pub fn render(&self, slice: &TableSlice, x: f64, top: f64, metrics: &dyn FontMetrics) -> Result<Vec<u8>> {
        let rows: Vec<&PdfPRow> = slice.header.iter().chain(slice.rows.iter()).collect();
        let mut builder = ContentBuilder::new();

        let mut tops = Vec::with_capacity(rows.len());
        let mut y = top;
        for row in &rows {
            tops.push(y);
            y -= row.max_height();
        }

        for (r, row) in rows.iter().enumerate() {
            let mut cell_x = x;
            for (col, slot) in row.cells().iter().enumerate() {
                let width = row.widths().get(col).copied().unwrap_or(0.0);
                let Some(cell) = slot else {
                    cell_x += width;
                    continue;
                };
                let cell_width = row.cell_width(col);
                let last = (r + cell.rowspan).min(rows.len());
                let height: f64 = rows[r..last].iter().map(|row| row.max_height()).sum();
                draw_cell(&mut builder, cell, cell_x, tops[r], cell_width, height, metrics);
                cell_x += width;
            }
        }
        builder.build()
    }

    /// Lay out the table and add one page per slice to `writer`.
    ///
    /// Pages are `page_size` points with `margin` on every side, and use
    /// Helvetica as [`TABLE_FONT_RESOURCE`].
    pub fn write_pages(
        &mut self,
        writer: &mut PdfWriter,
        page_size: [f64; 2],
        margin: f64,
        metrics: &dyn FontMetrics,
    ) -> Result<Vec<ObjectRef>> {
        let [page_width, page_height] = page_size;
        let slices = self.layout(page_height - 2.0 * margin, page_width - 2.0 * margin, metrics)?;

        let mut font = Dictionary::with_type(names::Name::new("Font"));
        font.insert(names::SUBTYPE, Object::name("Type1"));
        font.insert("BaseFont", Object::name("Helvetica"));
        font.insert("Encoding", Object::name("WinAnsiEncoding"));
        let font = writer.add_object(font)?;

        let mut pages = Vec::with_capacity(slices.len());
        for slice in &slices {
            let content = self.render(slice, margin, page_height - margin, metrics)?;
            let mut fonts = Dictionary::new();
            fonts.insert(TABLE_FONT_RESOURCE, font);
            let mut resources = Dictionary::new();
            resources.insert("Font", fonts);
            pages.push(writer.new_page([0.0, 0.0, page_width, page_height], resources, &content)?);
        }
        log::info!("Wrote table on {} pages", pages.len());
        Ok(pages)
    }
}

/// Consecutive rows joined by rowspans.
fn rowspan_groups(rows: &[PdfPRow]) -> Vec<&[PdfPRow]> {
    let mut groups = Vec::new();
    let mut start = 0;
    while start < rows.len() {
        let mut end = start + 1;
        let mut i = start;
        while i < end {
            let reach = rows[i]
                .cells()
                .iter()
                .flatten()
                .map(|cell| i + cell.rowspan)
                .max()
                .unwrap_or(i + 1);
            end = end.max(reach.min(rows.len()));
            i += 1;
        }
        groups.push(&rows[start..end]);
        start = end;
    }
    groups
}

fn draw_cell(
    builder: &mut ContentBuilder,
    cell: &PdfPCell,
    x: f64,
    top: f64,
    width: f64,
    height: f64,
    metrics: &dyn FontMetrics,
) {
    let bottom = top - height;
    if let Some(color) = cell.background {
        builder.fill_rect(color, x, bottom, width, height);
    }
    if cell.border_width > 0.0 {
        let (c, w) = (cell.border_color, cell.border_width);
        if cell.borders.contains(Borders::TOP) {
            builder.line(c, w, (x, top), (x + width, top));
        }
        if cell.borders.contains(Borders::BOTTOM) {
            builder.line(c, w, (x, bottom), (x + width, bottom));
        }
        if cell.borders.contains(Borders::LEFT) {
            builder.line(c, w, (x, bottom), (x, top));
        }
        if cell.borders.contains(Borders::RIGHT) {
            builder.line(c, w, (x + width, bottom), (x + width, top));
        }
    }

    let lines = cell.lines(width, metrics);
    let leading = cell.line_height();
    let mut visible = lines.len();
    if cell.fixed_height.is_some() {
        let room = (height - cell.padding.vertical()).max(0.0);
        visible = visible.min((room / leading).floor() as usize);
    }
    let text_height = visible as f64 * leading;
    let free = (height - cell.padding.vertical() - text_height).max(0.0);
    let offset = match cell.valign {
        CellVAlign::Top => 0.0,
        CellVAlign::Middle => free / 2.0,
        CellVAlign::Bottom => free,
    };
    let content_width = width - cell.padding.horizontal();
    // baseline sits one font size below the top of its line box
    let mut baseline = top - cell.padding.top - offset - cell.font_size;
    for line in lines.iter().take(visible) {
        if !line.is_empty() {
            let line_width = metrics.text_width(line, cell.font_size);
            let dx = match cell.align {
                CellAlign::Left => 0.0,
                CellAlign::Center => (content_width - line_width) / 2.0,
                CellAlign::Right => content_width - line_width,
            };
            builder.text(TABLE_FONT_RESOURCE, cell.font_size, line, x + cell.padding.left + dx, baseline);
        }
        baseline -= leading;
    }
    builder.end_text();
}

fn check_widths(widths: &[f64]) -> Result<()> {
    if widths.is_empty() || widths.iter().any(|w| !w.is_finite() || *w <= 0.0) {
        return Err(Error::Layout(
            "column widths must be positive and at least one column is required".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::cell::{CellPadding, SimpleFontMetrics};

    fn cell(text: &str) -> PdfPCell {
        PdfPCell::new(text).with_padding(CellPadding::uniform(0.0)).with_leading(10.0)
    }

    fn lines(n: usize) -> String {
        (0..n).map(|i| format!("l{}", i)).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn test_invalid_widths_rejected() {
        assert!(PdfPTable::new(&[]).is_err());
        assert!(PdfPTable::new(&[1.0, 0.0]).is_err());
        assert!(PdfPTable::with_columns(2).unwrap().with_absolute_widths(&[1.0]).is_err());
    }

    #[test]
    fn test_absolute_widths_must_be_positive() {
        for widths in [[0.0, 0.0], [50.0, -10.0], [f64::NAN, 20.0]] {
            let err = PdfPTable::with_columns(2).unwrap().with_absolute_widths(&widths).unwrap_err();
            assert!(matches!(err, Error::Layout(_)), "{}", err);
        }
        let table = PdfPTable::with_columns(2).unwrap().with_absolute_widths(&[30.0, 90.0]).unwrap();
        assert_eq!(table.absolute_widths(500.0), vec![30.0, 90.0]);
    }

    #[test]
    fn test_relative_widths() {
        let table = PdfPTable::new(&[1.0, 3.0]).unwrap().with_width_percentage(100.0);
        assert_eq!(table.absolute_widths(400.0), vec![100.0, 300.0]);
        let locked = PdfPTable::new(&[1.0, 1.0]).unwrap().with_total_width(50.0);
        assert_eq!(locked.absolute_widths(400.0), vec![25.0, 25.0]);
        let absolute = PdfPTable::with_columns(2).unwrap().with_absolute_widths(&[30.0, 70.0]).unwrap();
        assert_eq!(absolute.absolute_widths(1000.0), vec![30.0, 70.0]);
    }

    #[test]
    fn test_cells_fill_rows() {
        let mut table = PdfPTable::with_columns(3).unwrap();
        table.add_cell(cell("a").with_colspan(2));
        table.add_text("b");
        table.add_text("c");
        assert_eq!(table.rows().len(), 1);
        let row = &table.rows()[0];
        assert!(row.cells()[0].is_some());
        assert!(row.cells()[1].is_none());
        assert!(row.cells()[2].is_some());

        table.complete_row();
        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.rows()[1].cells().iter().flatten().count(), 3);
    }

    #[test]
    fn test_rowspan_skips_covered_columns() {
        let mut table = PdfPTable::with_columns(2).unwrap();
        table.add_cell(cell("tall").with_rowspan(3));
        table.add_text("r0");
        table.add_text("r1");
        table.add_text("r2");
        table.add_text("next");
        table.complete_row();
        let rows = table.rows();
        assert_eq!(rows.len(), 4);
        for row in &rows[1..3] {
            assert!(row.cells()[0].is_none());
            assert!(row.cells()[1].is_some());
        }
        assert_eq!(rows[3].cells()[0].as_ref().unwrap().paragraphs, vec!["next"]);
    }

    #[test]
    fn test_rowspan_grows_last_row() {
        let metrics = SimpleFontMetrics::default();
        let mut table = PdfPTable::with_columns(2).unwrap().with_total_width(200.0);
        table.add_cell(cell(&lines(5)).with_rowspan(2));
        table.add_cell(cell("a"));
        table.add_cell(cell("b"));
        table.calculate_heights(200.0, &metrics);
        let heights: Vec<f64> = table.rows().iter().map(PdfPRow::max_height).collect();
        assert_eq!(heights, vec![10.0, 40.0]);
    }

    #[test]
    fn test_layout_repeats_header_and_splits() {
        let metrics = SimpleFontMetrics::default();
        let mut table = PdfPTable::with_columns(1).unwrap().with_total_width(100.0).with_header_rows(1);
        table.add_cell(cell("Header"));
        for _ in 0..3 {
            table.add_cell(cell(&lines(3)));
        }
        table.add_cell(cell(&lines(8)));
        // header 10, body rows 30, 30, 30, 80; 60pt per page
        let slices = table.layout(60.0, 500.0, &metrics).unwrap();
        let heights: Vec<f64> = slices.iter().map(|s| s.height).collect();
        assert_eq!(heights, vec![60.0, 60.0, 60.0, 30.0]);
        assert!(slices.iter().all(|s| s.header.len() == 1));
        let split_head = slices[0].rows[1].cells()[0].as_ref().unwrap();
        assert_eq!(split_head.paragraphs.len(), 2);
        // carried line, third row, first line of the tall row
        assert_eq!(slices[1].rows.len(), 3);
        assert_eq!(slices[2].rows[0].max_height(), 50.0);
    }

    #[test]
    fn test_layout_without_split_moves_row() {
        let metrics = SimpleFontMetrics::default();
        let mut table = PdfPTable::with_columns(1).unwrap().with_total_width(100.0).with_split_rows(false);
        table.add_cell(cell(&lines(4)));
        table.add_cell(cell(&lines(4)));
        let slices = table.layout(60.0, 500.0, &metrics).unwrap();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[1].rows[0].max_height(), 40.0);
    }

    #[test]
    fn test_header_taller_than_page() {
        let metrics = SimpleFontMetrics::default();
        let mut table = PdfPTable::with_columns(1).unwrap().with_header_rows(1);
        table.add_cell(cell(&lines(10)));
        assert!(matches!(table.layout(50.0, 500.0, &metrics), Err(Error::Layout(_))));
    }

    #[test]
    fn test_render_draws_borders_and_text() {
        let metrics = SimpleFontMetrics::default();
        let mut table = PdfPTable::with_columns(2).unwrap().with_total_width(200.0);
        table.add_cell(cell("left").with_background(0.9, 0.9, 0.9));
        table.add_cell(cell("right").with_align(CellAlign::Right).with_borders(Borders::empty(), 0.0));
        let slices = table.layout(700.0, 500.0, &metrics).unwrap();
        let content = String::from_utf8(table.render(&slices[0], 50.0, 750.0, &metrics).unwrap()).unwrap();
        assert!(content.contains("0.9 0.9 0.9 rg\n50 740 100 10 re\nf"));
        assert!(content.contains("(left) Tj"));
        // 5 chars at 5pt each, right aligned in a 100pt cell starting at 150
        assert!(content.contains("1 0 0 1 225 740 Tm\n(right) Tj"));
        assert_eq!(content.matches(" l\nS").count(), 4);
    }
}
