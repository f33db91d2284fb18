//! Integration tests for table layout.
//!
//! Tables are laid out over pages, written with [`PdfWriter`] and the
//! resulting content streams inspected.

use pdf_graft::config::WriterOptions;
use pdf_graft::layout::{PdfPCell, PdfPTable, SimpleFontMetrics, TableSlice};
use pdf_graft::object::Object;
use pdf_graft::reader::{PdfReader, SourceDocument};
use pdf_graft::writer::PdfWriter;

fn metrics() -> SimpleFontMetrics {
    SimpleFontMetrics::default()
}

/// Header plus `rows` single-line rows; every row is 16pt tall.
fn key_value_table(rows: usize) -> PdfPTable {
    let mut table = PdfPTable::new(&[1.0, 3.0]).unwrap().with_header_rows(1);
    table.add_text("Key");
    table.add_text("Value");
    for i in 0..rows {
        table.add_text(&format!("k{}", i));
        table.add_text(&format!("v{}", i));
    }
    table
}

fn page_content(reader: &mut PdfReader, n: usize) -> Vec<u8> {
    let contents = reader.page(n).unwrap().get("Contents").cloned().unwrap();
    match reader.resolve_value(&contents).unwrap() {
        Object::Stream { data, .. } => data.to_vec(),
        other => panic!("page {} contents is {:?}", n, other),
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[test]
fn test_header_repeated_on_every_page() {
    let mut table = key_value_table(40);
    let mut writer = PdfWriter::with_options(WriterOptions::default().with_compression(false));
    // 260pt of room: header plus 15 rows per page
    let pages = table.write_pages(&mut writer, [400.0, 300.0], 20.0, &metrics()).unwrap();
    assert_eq!(pages.len(), 3);

    let mut reader = PdfReader::from_bytes(writer.finish().unwrap()).unwrap();
    assert_eq!(reader.page_count().unwrap(), 3);
    for n in 1..=3 {
        let content = page_content(&mut reader, n);
        assert!(contains(&content, b"(Key) Tj"), "page {} has no header", n);
        assert!(contains(&content, b"/F1 10 Tf"));
    }
    let last = page_content(&mut reader, 3);
    assert!(contains(&last, b"(v39) Tj"));
    assert!(!contains(&last, b"(v29) Tj"));

    let resources = reader.page(1).unwrap().get_dict("Resources").unwrap().clone();
    assert!(resources.get_dict("Font").unwrap().get_reference("F1").is_some());
}

#[test]
fn test_slices_respect_page_height() {
    let mut table = key_value_table(40);
    let slices = table.layout(260.0, 360.0, &metrics()).unwrap();
    let body: Vec<usize> = slices.iter().map(|s| s.rows.len()).collect();
    assert_eq!(body, vec![15, 15, 10]);
    for slice in &slices {
        assert_eq!(slice.header.len(), 1);
        assert!(slice.height <= 260.0);
    }
    // 80% of the available width by default
    assert!((slices[0].width() - 288.0).abs() < 1e-9);
}

fn slice_lines(slices: &[TableSlice]) -> Vec<String> {
    slices
        .iter()
        .flat_map(|s| s.rows.iter())
        .filter_map(|row| row.cells()[0].as_ref())
        .flat_map(|cell| cell.paragraphs.clone())
        .collect()
}

#[test]
fn test_tall_cell_split_keeps_every_line() {
    let lines: Vec<String> = (0..50).map(|i| format!("line {}", i)).collect();
    let mut table = PdfPTable::with_columns(1).unwrap();
    table.add_cell(PdfPCell::new(&lines.join("\n")));

    let slices = table.layout(200.0, 500.0, &metrics()).unwrap();
    assert!(slices.len() > 1);
    assert_eq!(slice_lines(&slices), lines);
    for slice in &slices {
        assert!(slice.height <= 200.0 + 1e-9);
    }
}

#[test]
fn test_unsplittable_row_moves_to_next_page() {
    let mut table = PdfPTable::with_columns(1).unwrap().with_split_rows(false);
    table.add_cell(PdfPCell::new("short").with_fixed_height(150.0));
    table.add_cell(PdfPCell::new("tall").with_fixed_height(100.0));

    let slices = table.layout(200.0, 500.0, &metrics()).unwrap();
    assert_eq!(slices.len(), 2);
    assert_eq!(slices[1].rows[0].cells()[0].as_ref().unwrap().paragraphs, vec!["tall"]);
}

#[test]
fn test_spans_and_absolute_widths() {
    let mut table = PdfPTable::new(&[1.0, 1.0, 1.0])
        .unwrap()
        .with_absolute_widths(&[50.0, 100.0, 150.0])
        .unwrap();
    table.add_cell(PdfPCell::new("wide").with_colspan(2));
    table.add_cell(PdfPCell::new("tall").with_rowspan(2));
    table.add_text("a");
    table.add_text("b");
    table.add_text("c");
    table.complete_row();

    let rows = table.rows();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].cells()[1].is_none());
    assert!(rows[1].cells()[2].is_none());
    assert_eq!(rows[2].cells()[1].as_ref().unwrap().paragraphs.len(), 0);

    let slices = table.layout(500.0, 1000.0, &metrics()).unwrap();
    assert_eq!(slices.len(), 1);
    assert_eq!(slices[0].widths, vec![50.0, 100.0, 150.0]);
    assert_eq!(slices[0].rows[0].cell_width(0), 150.0);
}

#[test]
fn test_header_taller_than_page() {
    let mut table = PdfPTable::with_columns(1).unwrap().with_header_rows(1);
    table.add_cell(PdfPCell::new("header").with_fixed_height(300.0));
    table.add_text("body");
    assert!(table.layout(200.0, 500.0, &metrics()).is_err());
}
