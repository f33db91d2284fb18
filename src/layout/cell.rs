//! Table cells.

use bitflags::bitflags;

/// Horizontal alignment for cell content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CellAlign {
    /// Align to the left
    #[default]
    Left,
    /// Center horizontally
    Center,
    /// Align to the right
    Right,
}

/// Vertical alignment for cell content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CellVAlign {
    /// Align to the top
    #[default]
    Top,
    /// Center vertically
    Middle,
    /// Align to the bottom
    Bottom,
}

bitflags! {
    /// Which sides of a cell get a border line.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Borders: u8 {
        /// Top edge
        const TOP = 1 << 0;
        /// Bottom edge
        const BOTTOM = 1 << 1;
        /// Left edge
        const LEFT = 1 << 2;
        /// Right edge
        const RIGHT = 1 << 3;
        /// All four edges
        const BOX = Self::TOP.bits() | Self::BOTTOM.bits() | Self::LEFT.bits() | Self::RIGHT.bits();
    }
}

impl Default for Borders {
    fn default() -> Self {
        Self::BOX
    }
}

/// Cell padding in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellPadding {
    /// Top padding
    pub top: f64,
    /// Right padding
    pub right: f64,
    /// Bottom padding
    pub bottom: f64,
    /// Left padding
    pub left: f64,
}

impl Default for CellPadding {
    fn default() -> Self {
        Self::uniform(2.0)
    }
}

impl CellPadding {
    /// Same padding on every side.
    pub fn uniform(padding: f64) -> Self {
        Self {
            top: padding,
            right: padding,
            bottom: padding,
            left: padding,
        }
    }

    /// Horizontal and vertical padding.
    pub fn symmetric(horizontal: f64, vertical: f64) -> Self {
        Self {
            top: vertical,
            right: horizontal,
            bottom: vertical,
            left: horizontal,
        }
    }

    /// Total horizontal padding.
    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    /// Total vertical padding.
    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

/// Text measurement used for wrapping and alignment.
pub trait FontMetrics {
    /// Width of `text` in points at `font_size`.
    fn text_width(&self, text: &str, font_size: f64) -> f64;
}

/// Fixed average character width, as a proportion of the font size.
#[derive(Debug, Clone, Copy)]
pub struct SimpleFontMetrics {
    /// Average character width relative to the font size
    pub char_width_ratio: f64,
}

impl Default for SimpleFontMetrics {
    fn default() -> Self {
        Self { char_width_ratio: 0.5 }
    }
}

impl SimpleFontMetrics {
    /// Metrics for a monospace font such as Courier.
    pub fn monospace() -> Self {
        Self { char_width_ratio: 0.6 }
    }
}

impl FontMetrics for SimpleFontMetrics {
    fn text_width(&self, text: &str, font_size: f64) -> f64 {
        text.chars().count() as f64 * font_size * self.char_width_ratio
    }
}

/// A table cell holding wrapped text.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfPCell {
    /// Paragraphs of text; each starts on a new line
    pub paragraphs: Vec<String>,
    /// Columns covered
    pub colspan: usize,
    /// Rows covered
    pub rowspan: usize,
    /// Padding around the text
    pub padding: CellPadding,
    /// Exact height; the cell is never split and text beyond it is clipped
    pub fixed_height: Option<f64>,
    /// Lower bound for the height
    pub min_height: Option<f64>,
    /// Horizontal alignment
    pub align: CellAlign,
    /// Vertical alignment
    pub valign: CellVAlign,
    /// Border sides
    pub borders: Borders,
    /// Border line width; no border when zero
    pub border_width: f64,
    /// Border color (RGB, 0.0-1.0)
    pub border_color: [f64; 3],
    /// Background color (RGB, 0.0-1.0)
    pub background: Option<[f64; 3]>,
    /// Font size in points
    pub font_size: f64,
    /// Distance between baselines; `1.2 * font_size` when `None`
    pub leading: Option<f64>,
    /// Keep each paragraph on one line
    pub no_wrap: bool,
}

impl Default for PdfPCell {
    fn default() -> Self {
        Self {
            paragraphs: Vec::new(),
            colspan: 1,
            rowspan: 1,
            padding: CellPadding::default(),
            fixed_height: None,
            min_height: None,
            align: CellAlign::default(),
            valign: CellVAlign::default(),
            borders: Borders::default(),
            border_width: 0.5,
            border_color: [0.0, 0.0, 0.0],
            background: None,
            font_size: 10.0,
            leading: None,
            no_wrap: false,
        }
    }
}

impl PdfPCell {
    /// A text cell; newlines start new paragraphs.
    pub fn new(text: &str) -> Self {
        Self {
            paragraphs: if text.is_empty() {
                Vec::new()
            } else {
                text.lines().map(str::to_string).collect()
            },
            ..Self::default()
        }
    }

    /// An empty cell.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set the column span (at least 1).
    pub fn with_colspan(mut self, span: usize) -> Self {
        self.colspan = span.max(1);
        self
    }

    /// Set the row span (at least 1).
    pub fn with_rowspan(mut self, span: usize) -> Self {
        self.rowspan = span.max(1);
        self
    }

    /// Set the padding.
    pub fn with_padding(mut self, padding: CellPadding) -> Self {
        self.padding = padding;
        self
    }

    /// Set a fixed height.
    pub fn with_fixed_height(mut self, height: f64) -> Self {
        self.fixed_height = Some(height);
        self
    }

    /// Set a minimum height.
    pub fn with_min_height(mut self, height: f64) -> Self {
        self.min_height = Some(height);
        self
    }

    /// Set the horizontal alignment.
    pub fn with_align(mut self, align: CellAlign) -> Self {
        self.align = align;
        self
    }

    /// Set the vertical alignment.
    pub fn with_valign(mut self, valign: CellVAlign) -> Self {
        self.valign = valign;
        self
    }

    /// Set border sides and width.
    pub fn with_borders(mut self, borders: Borders, width: f64) -> Self {
        self.borders = borders;
        self.border_width = width;
        self
    }

    /// Set the background color.
    pub fn with_background(mut self, r: f64, g: f64, b: f64) -> Self {
        self.background = Some([r, g, b]);
        self
    }

    /// Set the font size.
    pub fn with_font_size(mut self, size: f64) -> Self {
        self.font_size = size;
        self
    }

    /// Set the leading.
    pub fn with_leading(mut self, leading: f64) -> Self {
        self.leading = Some(leading);
        self
    }

    /// Disable wrapping.
    pub fn with_no_wrap(mut self) -> Self {
        self.no_wrap = true;
        self
    }

    /// Distance between baselines.
    pub fn line_height(&self) -> f64 {
        self.leading.unwrap_or(self.font_size * 1.2)
    }

    /// Whether the row holding this cell may break inside it.
    pub fn is_splittable(&self) -> bool {
        self.fixed_height.is_none() && self.rowspan == 1
    }

    /// Text lines after wrapping to a cell of `width` points.
    pub fn lines(&self, width: f64, metrics: &dyn FontMetrics) -> Vec<String> {
        let content_width = (width - self.padding.horizontal()).max(0.0);
        let mut lines = Vec::new();
        for paragraph in &self.paragraphs {
            if self.no_wrap {
                lines.push(paragraph.clone());
            } else {
                lines.extend(wrap_text(paragraph, content_width, self.font_size, metrics));
            }
        }
        lines
    }

    /// Height needed by the text plus padding.
    pub fn content_height(&self, width: f64, metrics: &dyn FontMetrics) -> f64 {
        self.lines(width, metrics).len() as f64 * self.line_height() + self.padding.vertical()
    }

    /// Height this cell asks for, honoring fixed and minimum heights.
    pub fn height(&self, width: f64, metrics: &dyn FontMetrics) -> f64 {
        if let Some(fixed) = self.fixed_height {
            return fixed;
        }
        let content = self.content_height(width, metrics);
        self.min_height.map_or(content, |min| content.max(min))
    }

    /// Same style, no text, no height constraints.
    pub(crate) fn emptied(&self) -> Self {
        Self {
            paragraphs: Vec::new(),
            fixed_height: None,
            min_height: None,
            ..self.clone()
        }
    }
}

/// Greedy word wrap. A word wider than the line gets a line of its own.
pub(crate) fn wrap_text(text: &str, max_width: f64, font_size: f64, metrics: &dyn FontMetrics) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if current.is_empty() || metrics.text_width(&candidate, font_size) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}
