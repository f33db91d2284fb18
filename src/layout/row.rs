//! Table rows: height calculation and splitting at a page break.

use super::cell::{FontMetrics, PdfPCell};

/// One row of a [`PdfPTable`](super::PdfPTable).
///
/// `cells` has one slot per column. A slot is `None` when the column is
/// covered by a cell to its left (colspan) or above it (rowspan).
#[derive(Debug, Clone, PartialEq)]
pub struct PdfPRow {
    cells: Vec<Option<PdfPCell>>,
    widths: Vec<f64>,
    max_height: f64,
    calculated: bool,
}

impl PdfPRow {
    /// Row from per-column slots.
    pub fn new(cells: Vec<Option<PdfPCell>>) -> Self {
        Self {
            cells,
            widths: Vec::new(),
            max_height: 0.0,
            calculated: false,
        }
    }

    /// Per-column slots.
    pub fn cells(&self) -> &[Option<PdfPCell>] {
        &self.cells
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Set absolute column widths; invalidates the height.
    pub fn set_widths(&mut self, widths: &[f64]) {
        self.widths = widths.to_vec();
        self.calculated = false;
    }

    /// Absolute column widths.
    pub fn widths(&self) -> &[f64] {
        &self.widths
    }

    /// Width of the cell starting at `col`, including the columns it spans.
    pub fn cell_width(&self, col: usize) -> f64 {
        let span = self.cells.get(col).and_then(Option::as_ref).map_or(1, |c| c.colspan);
        let end = (col + span).min(self.widths.len());
        self.widths.get(col..end).map_or(0.0, |w| w.iter().sum())
    }

    /// Height of the row, computed by [`calculate_heights`](Self::calculate_heights).
    pub fn max_height(&self) -> f64 {
        self.max_height
    }

    /// Whether the height is up to date.
    pub fn is_calculated(&self) -> bool {
        self.calculated
    }

    /// Compute the row height from cells that span a single row.
    ///
    /// Cells spanning several rows are settled by the table, which knows
    /// the following rows.
    pub fn calculate_heights(&mut self, metrics: &dyn FontMetrics) -> f64 {
        let mut height: f64 = 0.0;
        for (col, cell) in self.cells.iter().enumerate() {
            if let Some(cell) = cell {
                if cell.rowspan == 1 {
                    height = height.max(cell.height(self.cell_width(col), metrics));
                }
            }
        }
        self.max_height = height;
        self.calculated = true;
        height
    }

    /// Grow the row so a cell spanning into it fits.
    pub(crate) fn extend_height(&mut self, extra: f64) {
        self.max_height += extra;
    }

    /// Split the row so the first part fits in `available_height`.
    ///
    /// On success `self` keeps the lines that fit and the returned row
    /// carries the rest. Cells that already fit stay whole and leave an
    /// empty cell behind. Returns `None` without touching `self` when the
    /// row cannot be split there: an unsplittable cell (fixed height or
    /// rowspan) does not fit, or a cell could not keep even one line.
    pub fn split_row(&mut self, available_height: f64, metrics: &dyn FontMetrics) -> Option<PdfPRow> {
        let mut first = Vec::with_capacity(self.cells.len());
        let mut rest = Vec::with_capacity(self.cells.len());
        let mut split_any = false;

        for (col, slot) in self.cells.iter().enumerate() {
            let Some(cell) = slot else {
                first.push(None);
                rest.push(None);
                continue;
            };
            let width = self.cell_width(col);
            if cell.height(width, metrics) <= available_height {
                first.push(Some(cell.clone()));
                rest.push(Some(cell.emptied()));
                continue;
            }
            if !cell.is_splittable() {
                log::debug!("Row cannot split: cell in column {} is not splittable", col);
                return None;
            }

            let lines = cell.lines(width, metrics);
            let room = available_height - cell.padding.vertical();
            let fit = if room > 0.0 {
                ((room + 1e-6) / cell.line_height()).floor() as usize
            } else {
                0
            };
            if fit == 0 {
                return None;
            }
            let fit = fit.min(lines.len());
            let mut head = cell.emptied();
            head.paragraphs = lines[..fit].to_vec();
            let mut tail = cell.emptied();
            tail.paragraphs = lines[fit..].to_vec();
            first.push(Some(head));
            rest.push(Some(tail));
            split_any = true;
        }

        if !split_any {
            return None;
        }
        self.cells = first;
        self.calculate_heights(metrics);
        let mut remainder = PdfPRow::new(rest);
        remainder.set_widths(&self.widths);
        remainder.calculate_heights(metrics);
        log::debug!(
            "Split row at {:.2}pt: {:.2}pt kept, {:.2}pt carried over",
            available_height,
            self.max_height,
            remainder.max_height
        );
        Some(remainder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::cell::{CellPadding, SimpleFontMetrics};

    fn row(cells: Vec<Option<PdfPCell>>, widths: &[f64]) -> PdfPRow {
        let mut row = PdfPRow::new(cells);
        row.set_widths(widths);
        row.calculate_heights(&SimpleFontMetrics::default());
        row
    }

    fn text(lines: usize) -> PdfPCell {
        let body: Vec<String> = (0..lines).map(|i| format!("line{}", i)).collect();
        PdfPCell::new(&body.join("\n")).with_padding(CellPadding::uniform(0.0)).with_leading(10.0)
    }

    #[test]
    fn test_height_is_tallest_cell() {
        let r = row(vec![Some(text(2)), Some(text(5))], &[100.0, 100.0]);
        assert_eq!(r.max_height(), 50.0);
        assert!(r.is_calculated());
    }

    #[test]
    fn test_colspan_width() {
        let r = row(vec![Some(text(1).with_colspan(2)), None, Some(text(1))], &[10.0, 20.0, 30.0]);
        assert_eq!(r.cell_width(0), 30.0);
        assert_eq!(r.cell_width(2), 30.0);
    }

    #[test]
    fn test_rowspan_cell_ignored_in_row_height() {
        let r = row(vec![Some(text(9).with_rowspan(2)), Some(text(1))], &[100.0, 100.0]);
        assert_eq!(r.max_height(), 10.0);
    }

    #[test]
    fn test_split_row_moves_overflow_lines() {
        let metrics = SimpleFontMetrics::default();
        let mut r = row(vec![Some(text(5)), Some(text(1))], &[100.0, 100.0]);
        let rest = r.split_row(35.0, &metrics).unwrap();
        assert_eq!(r.max_height(), 30.0);
        assert_eq!(rest.max_height(), 20.0);
        let head = r.cells()[0].as_ref().unwrap();
        assert_eq!(head.paragraphs, vec!["line0", "line1", "line2"]);
        let tail = rest.cells()[0].as_ref().unwrap();
        assert_eq!(tail.paragraphs, vec!["line3", "line4"]);
        // the short cell stays whole and leaves an empty cell behind
        assert_eq!(r.cells()[1].as_ref().unwrap().paragraphs, vec!["line0"]);
        assert!(rest.cells()[1].as_ref().unwrap().paragraphs.is_empty());
    }

    #[test]
    fn test_unsplittable_cell_blocks_split() {
        let metrics = SimpleFontMetrics::default();
        let mut r = row(vec![Some(text(5)), Some(text(1).with_fixed_height(40.0))], &[100.0, 100.0]);
        let before = r.clone();
        assert!(r.split_row(35.0, &metrics).is_none());
        assert_eq!(r, before);
    }

    #[test]
    fn test_no_line_fits() {
        let metrics = SimpleFontMetrics::default();
        let mut r = row(vec![Some(text(3))], &[100.0]);
        assert!(r.split_row(5.0, &metrics).is_none());
    }
}
