//! Minimal content stream builder for table output.
//!
//! PDF Spec: ISO 32000-1:2008, Section 8.5 - Path Construction and Painting,
//! Section 9.4 - Text Objects

use std::io::Write;

use crate::error::Result;

/// Content stream operators emitted by the table renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentOp {
    /// Save graphics state (q)
    SaveState,
    /// Restore graphics state (Q)
    RestoreState,
    /// Begin text object (BT)
    BeginText,
    /// End text object (ET)
    EndText,
    /// Set font resource and size (Tf)
    SetFont(String, f64),
    /// Set text matrix to a translation (Tm)
    SetTextPosition(f64, f64),
    /// Show a literal string (Tj)
    ShowText(String),
    /// Set fill color RGB (rg)
    SetFillColor([f64; 3]),
    /// Set stroke color RGB (RG)
    SetStrokeColor([f64; 3]),
    /// Set line width (w)
    SetLineWidth(f64),
    /// Move to (m)
    MoveTo(f64, f64),
    /// Line to (l)
    LineTo(f64, f64),
    /// Rectangle (re)
    Rectangle(f64, f64, f64, f64),
    /// Stroke (S)
    Stroke,
    /// Fill (f)
    Fill,
}

/// Collects operators and serializes them one per line.
#[derive(Debug, Default)]
pub struct ContentBuilder {
    operations: Vec<ContentOp>,
    font: Option<(String, f64)>,
    in_text: bool,
}

impl ContentBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Operators added so far.
    pub fn operations(&self) -> &[ContentOp] {
        &self.operations
    }

    /// Add an operator.
    pub fn op(&mut self, op: ContentOp) -> &mut Self {
        self.operations.push(op);
        self
    }

    /// Show `text` with its baseline starting at (`x`, `y`).
    pub fn text(&mut self, font: &str, size: f64, text: &str, x: f64, y: f64) -> &mut Self {
        if !self.in_text {
            self.op(ContentOp::BeginText);
            self.in_text = true;
            self.font = None;
        }
        if self.font.as_ref().map_or(true, |(f, s)| f != font || *s != size) {
            self.op(ContentOp::SetFont(font.to_string(), size));
            self.font = Some((font.to_string(), size));
        }
        self.op(ContentOp::SetTextPosition(x, y));
        self.op(ContentOp::ShowText(text.to_string()))
    }

    /// Close an open text object.
    pub fn end_text(&mut self) -> &mut Self {
        if self.in_text {
            self.op(ContentOp::EndText);
            self.in_text = false;
        }
        self
    }

    /// Fill a rectangle.
    pub fn fill_rect(&mut self, color: [f64; 3], x: f64, y: f64, width: f64, height: f64) -> &mut Self {
        self.end_text();
        self.op(ContentOp::SetFillColor(color));
        self.op(ContentOp::Rectangle(x, y, width, height));
        self.op(ContentOp::Fill);
        self.op(ContentOp::SetFillColor([0.0, 0.0, 0.0]))
    }

    /// Stroke a straight line.
    pub fn line(&mut self, color: [f64; 3], width: f64, from: (f64, f64), to: (f64, f64)) -> &mut Self {
        self.end_text();
        self.op(ContentOp::SetStrokeColor(color));
        self.op(ContentOp::SetLineWidth(width));
        self.op(ContentOp::MoveTo(from.0, from.1));
        self.op(ContentOp::LineTo(to.0, to.1));
        self.op(ContentOp::Stroke)
    }

    /// Serialize the operators.
    pub fn build(&mut self) -> Result<Vec<u8>> {
        self.end_text();
        let mut buf = Vec::new();
        for op in &self.operations {
            write_op(&mut buf, op)?;
            buf.push(b'\n');
        }
        Ok(buf)
    }
}

fn write_op<W: Write>(w: &mut W, op: &ContentOp) -> std::io::Result<()> {
    match op {
        ContentOp::SaveState => write!(w, "q"),
        ContentOp::RestoreState => write!(w, "Q"),
        ContentOp::BeginText => write!(w, "BT"),
        ContentOp::EndText => write!(w, "ET"),
        ContentOp::SetFont(name, size) => write!(w, "/{} {} Tf", name, num(*size)),
        ContentOp::SetTextPosition(x, y) => write!(w, "1 0 0 1 {} {} Tm", num(*x), num(*y)),
        ContentOp::ShowText(text) => {
            w.write_all(b"(")?;
            write_escaped(w, text)?;
            w.write_all(b") Tj")
        },
        ContentOp::SetFillColor([r, g, b]) => write!(w, "{} {} {} rg", num(*r), num(*g), num(*b)),
        ContentOp::SetStrokeColor([r, g, b]) => write!(w, "{} {} {} RG", num(*r), num(*g), num(*b)),
        ContentOp::SetLineWidth(width) => write!(w, "{} w", num(*width)),
        ContentOp::MoveTo(x, y) => write!(w, "{} {} m", num(*x), num(*y)),
        ContentOp::LineTo(x, y) => write!(w, "{} {} l", num(*x), num(*y)),
        ContentOp::Rectangle(x, y, width, height) => {
            write!(w, "{} {} {} {} re", num(*x), num(*y), num(*width), num(*height))
        },
        ContentOp::Stroke => write!(w, "S"),
        ContentOp::Fill => write!(w, "f"),
    }
}

/// Literal string body for a standard 14 font; characters outside Latin-1 become `?`.
fn write_escaped<W: Write>(w: &mut W, text: &str) -> std::io::Result<()> {
    for c in text.chars() {
        let byte = if (c as u32) < 256 { c as u8 } else { b'?' };
        match byte {
            b'(' => w.write_all(b"\\(")?,
            b')' => w.write_all(b"\\)")?,
            b'\\' => w.write_all(b"\\\\")?,
            b'\n' => w.write_all(b"\\n")?,
            b'\r' => w.write_all(b"\\r")?,
            _ => w.write_all(&[byte])?,
        }
    }
    Ok(())
}

fn num(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e9 {
        return format!("{}", value as i64);
    }
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_groups_in_one_object() {
        let mut builder = ContentBuilder::new();
        builder.text("F1", 10.0, "a", 10.0, 20.5);
        builder.text("F1", 10.0, "b(c)", 10.0, 8.25);
        let out = String::from_utf8(builder.build().unwrap()).unwrap();
        assert_eq!(
            out,
            "BT\n/F1 10 Tf\n1 0 0 1 10 20.5 Tm\n(a) Tj\n1 0 0 1 10 8.25 Tm\n(b\\(c\\)) Tj\nET\n"
        );
    }

    #[test]
    fn test_graphics_close_text_object() {
        let mut builder = ContentBuilder::new();
        builder.text("F1", 9.0, "x", 0.0, 0.0);
        builder.line([0.0, 0.0, 0.0], 0.5, (0.0, 0.0), (100.0, 0.0));
        let ops = builder.operations();
        assert_eq!(ops[4], ContentOp::EndText);
        assert_eq!(ops.last(), Some(&ContentOp::Stroke));
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(num(12.0), "12");
        assert_eq!(num(0.3333333), "0.333");
        assert_eq!(num(-0.0001), "0");
    }
}
