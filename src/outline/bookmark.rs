//! Bookmark tree model.
//!
//! PDF Spec: ISO 32000-1:2008, Section 12.3.3 - Document Outline,
//! Section 12.3.2 - Destinations
//!
//! Destinations inside a document are kept as page strings such as
//! `"3 XYZ 0 800 0"`: the 1-based page number followed by the fit type and
//! its arguments, with `null` for unspecified values. The same form is used
//! in the XML export.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Outline item text style (`/F`).
    ///
    /// Per PDF spec Table 153 (Outline item flags).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct BookmarkStyle: u32 {
        /// Bit 1: display the title in italic
        const ITALIC = 1 << 0;
        /// Bit 2: display the title in bold
        const BOLD = 1 << 1;
    }
}

impl BookmarkStyle {
    /// Parse the XML `Style` attribute (`"bold"`, `"italic"`, `"bold italic"`).
    pub fn from_style_attribute(value: &str) -> Self {
        let lower = value.to_ascii_lowercase();
        let mut style = Self::empty();
        if lower.contains("italic") {
            style |= Self::ITALIC;
        }
        if lower.contains("bold") {
            style |= Self::BOLD;
        }
        style
    }

    /// The XML `Style` attribute, `None` for plain text.
    pub fn to_style_attribute(self) -> Option<&'static str> {
        match (self.contains(Self::BOLD), self.contains(Self::ITALIC)) {
            (true, true) => Some("bold italic"),
            (true, false) => Some("bold"),
            (false, true) => Some("italic"),
            (false, false) => None,
        }
    }
}

/// Where a go-to action points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// Explicit destination as a page string, e.g. `"3 XYZ 0 800 0"`
    Page(String),
    /// Named destination given as a string
    Named(String),
    /// Named destination given as a name object
    NamedN(String),
}

/// Action performed when a bookmark is activated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "params")]
pub enum BookmarkAction {
    /// Go to a destination in this document
    GoTo(Target),
    /// Go to a destination in another file
    GoToR {
        /// File specification
        file: String,
        /// Destination in that file
        target: Option<Target>,
        /// Open in a new window
        new_window: Option<bool>,
    },
    /// Open a URI
    Uri(String),
    /// Launch an application or open a file
    Launch(String),
    /// Run JavaScript
    JavaScript(String),
    /// Hide or show a form field
    Hide {
        /// Fully qualified field name
        field: String,
        /// Hide (true) or show (false)
        hide: bool,
    },
    /// Change optional content group states; entries are `ON`/`OFF`/`Toggle` and group names
    SetOcgState(Vec<String>),
}

/// One bookmark and its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Display title
    pub title: String,
    /// Action or destination, `None` for a bare heading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<BookmarkAction>,
    /// Text style
    #[serde(default, skip_serializing_if = "BookmarkStyle::is_empty")]
    pub style: BookmarkStyle,
    /// Text color (RGB, 0.0-1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[f64; 3]>,
    /// Whether the children are initially shown
    #[serde(default = "default_open")]
    pub open: bool,
    /// Child bookmarks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kids: Vec<Bookmark>,
}

fn default_open() -> bool {
    true
}

impl Bookmark {
    /// A bookmark without an action.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            action: None,
            style: BookmarkStyle::empty(),
            color: None,
            open: true,
            kids: Vec::new(),
        }
    }

    /// A bookmark going to a page string such as `"3 XYZ 0 800 0"`.
    pub fn goto_page(title: impl Into<String>, page: impl Into<String>) -> Self {
        Self::new(title).with_action(BookmarkAction::GoTo(Target::Page(page.into())))
    }

    /// Set the action.
    pub fn with_action(mut self, action: BookmarkAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Set the style.
    pub fn with_style(mut self, style: BookmarkStyle) -> Self {
        self.style = style;
        self
    }

    /// Set the color.
    pub fn with_color(mut self, r: f64, g: f64, b: f64) -> Self {
        self.color = Some([r, g, b]);
        self
    }

    /// Set whether the item is initially open.
    pub fn with_open(mut self, open: bool) -> Self {
        self.open = open;
        self
    }

    /// Add a child.
    pub fn add_kid(&mut self, kid: Bookmark) {
        self.kids.push(kid);
    }

    /// The page string of a local go-to action.
    pub fn page(&self) -> Option<&str> {
        match &self.action {
            Some(BookmarkAction::GoTo(Target::Page(page))) => Some(page),
            _ => None,
        }
    }

    /// Value of the outline `/Count` entry.
    ///
    /// Positive if open, negative if closed, zero without children.
    pub fn descendant_count(&self) -> i64 {
        let count = self.kids.len() as i64 + self.kids.iter().map(Bookmark::visible_descendant_count).sum::<i64>();
        if self.open {
            count
        } else {
            -count
        }
    }

    /// Descendants shown when this item's ancestors are open.
    pub fn visible_descendant_count(&self) -> i64 {
        if !self.open {
            return 0;
        }
        self.kids.len() as i64 + self.kids.iter().map(Bookmark::visible_descendant_count).sum::<i64>()
    }
}

/// A parsed page string.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDestination {
    /// 1-based page number
    pub page: usize,
    /// Fit type (`XYZ`, `Fit`, `FitH`, ...); `Fit` when the string has only a page
    pub fit: String,
    /// Fit arguments, `None` for `null`
    pub args: Vec<Option<f64>>,
}

impl PageDestination {
    /// Parse `"<page> [<fit> <args>...]"`.
    pub fn parse(value: &str) -> Option<Self> {
        let mut tokens = value.split_whitespace();
        let page = tokens.next()?.parse::<usize>().ok()?;
        let fit = tokens.next().unwrap_or("Fit").trim_start_matches('/').to_string();
        let mut args = Vec::new();
        for token in tokens {
            if token == "null" {
                args.push(None);
            } else {
                args.push(Some(token.parse::<f64>().ok()?));
            }
        }
        Some(Self { page, fit, args })
    }
}

impl std::fmt::Display for PageDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.page, self.fit)?;
        for arg in &self.args {
            match arg {
                Some(v) => write!(f, " {}", format_number(*v))?,
                None => write!(f, " null")?,
            }
        }
        Ok(())
    }
}

/// Integers without a fraction, reals trimmed.
pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{:.5}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Escape control characters as backslash-octal (`\nnn`) and `\` as `\\`.
pub fn escape_binary_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if (c as u32) < 32 {
            out.push_str(&format!("\\{:03o}", c as u32));
        } else if c == '\\' {
            out.push_str("\\\\");
        } else {
            out.push(c);
        }
    }
    out
}

/// Reverse of [`escape_binary_string`].
///
/// A backslash followed by up to three octal digits is a character code;
/// followed by anything else it escapes that character.
pub fn unescape_binary_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some(d) if d.is_digit(8) => {
                let mut code = 0u32;
                for _ in 0..3 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(digit) => {
                            code = code * 8 + digit;
                            chars.next();
                        },
                        None => break,
                    }
                }
                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
            },
            Some(other) => {
                out.push(other);
                chars.next();
            },
            None => out.push('\\'),
        }
    }
    out
}

/// Shift the page numbers of local go-to bookmarks by `delta`.
///
/// With `page_range`, only pages inside one of the inclusive `(low, high)`
/// ranges move. Results are clamped to page 1.
pub fn shift_page_numbers(bookmarks: &mut [Bookmark], delta: i64, page_range: Option<&[(usize, usize)]>) {
    for bookmark in bookmarks.iter_mut() {
        if let Some(BookmarkAction::GoTo(Target::Page(page))) = &mut bookmark.action {
            if let Some(mut dest) = PageDestination::parse(page) {
                if in_ranges(dest.page, page_range) {
                    dest.page = (dest.page as i64 + delta).max(1) as usize;
                    *page = rewrite_page_number(page, dest.page);
                }
            }
        }
        shift_page_numbers(&mut bookmark.kids, delta, page_range);
    }
}

/// Drop the go-to actions of bookmarks pointing into the given page ranges.
pub fn eliminate_pages(bookmarks: &mut [Bookmark], page_range: &[(usize, usize)]) {
    for bookmark in bookmarks.iter_mut() {
        let hit = bookmark
            .page()
            .and_then(PageDestination::parse)
            .map_or(false, |dest| in_ranges(dest.page, Some(page_range)));
        if hit {
            bookmark.action = None;
        }
        eliminate_pages(&mut bookmark.kids, page_range);
    }
}

fn in_ranges(page: usize, ranges: Option<&[(usize, usize)]>) -> bool {
    match ranges {
        None => true,
        Some(ranges) => ranges.iter().any(|(low, high)| page >= *low && page <= *high),
    }
}

/// Replace the leading page number, keeping the rest of the string as written.
fn rewrite_page_number(page: &str, number: usize) -> String {
    let trimmed = page.trim();
    match trimmed.find(char::is_whitespace) {
        Some(idx) => format!("{}{}", number, &trimmed[idx..]),
        None => number.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_style_attribute() {
        assert_eq!(BookmarkStyle::from_style_attribute("bold italic"), BookmarkStyle::all());
        assert_eq!(BookmarkStyle::from_style_attribute("Italic"), BookmarkStyle::ITALIC);
        assert_eq!(BookmarkStyle::BOLD.to_style_attribute(), Some("bold"));
        assert_eq!(BookmarkStyle::empty().to_style_attribute(), None);
        assert_eq!(BookmarkStyle::all().bits(), 3);
    }

    #[test]
    fn test_page_destination_parse() {
        let dest = PageDestination::parse("3 XYZ 0 800 0").unwrap();
        assert_eq!(dest.page, 3);
        assert_eq!(dest.fit, "XYZ");
        assert_eq!(dest.args, vec![Some(0.0), Some(800.0), Some(0.0)]);
        assert_eq!(dest.to_string(), "3 XYZ 0 800 0");

        let dest = PageDestination::parse("7").unwrap();
        assert_eq!(dest.fit, "Fit");
        assert_eq!(PageDestination::parse("2 FitH null").unwrap().args, vec![None]);
        assert!(PageDestination::parse("x Fit").is_none());
        assert!(PageDestination::parse("1 XYZ left").is_none());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(800.0), "800");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(-12.25), "-12.25");
    }

    #[test]
    fn test_escape_binary_string() {
        assert_eq!(escape_binary_string("a\u{1}b"), "a\\001b");
        assert_eq!(escape_binary_string("back\\slash"), "back\\\\slash");
        assert_eq!(unescape_binary_string("a\\001b"), "a\u{1}b");
        assert_eq!(unescape_binary_string("\\0121"), "\n1");
        assert_eq!(unescape_binary_string("\\q"), "q");
        assert_eq!(unescape_binary_string("end\\"), "end\\");
    }

    #[test]
    fn test_counts() {
        let mut root = Bookmark::new("Root");
        let mut child = Bookmark::new("Child 1");
        child.add_kid(Bookmark::new("Grandchild 1"));
        child.add_kid(Bookmark::new("Grandchild 2"));
        root.add_kid(child);
        root.add_kid(Bookmark::new("Child 2"));
        assert_eq!(root.descendant_count(), 4);

        root.open = false;
        assert_eq!(root.descendant_count(), -4);
        assert_eq!(root.visible_descendant_count(), 0);

        root.kids[0].open = false;
        root.open = true;
        assert_eq!(root.descendant_count(), 2);
    }

    #[test]
    fn test_shift_page_numbers() {
        let mut marks = vec![
            Bookmark::goto_page("One", "1 XYZ 0 800 0"),
            Bookmark::goto_page("Five", "5 Fit"),
            Bookmark::new("Heading"),
        ];
        marks[2].add_kid(Bookmark::goto_page("Two", "2"));

        shift_page_numbers(&mut marks, 10, Some(&[(1, 2)]));
        assert_eq!(marks[0].page(), Some("11 XYZ 0 800 0"));
        assert_eq!(marks[1].page(), Some("5 Fit"));
        assert_eq!(marks[2].kids[0].page(), Some("12"));

        shift_page_numbers(&mut marks, -20, None);
        assert_eq!(marks[0].page(), Some("1 XYZ 0 800 0"));
    }

    #[test]
    fn test_eliminate_pages() {
        let mut marks = vec![Bookmark::goto_page("One", "1 Fit"), Bookmark::goto_page("Three", "3 Fit")];
        eliminate_pages(&mut marks, &[(3, 4)]);
        assert!(marks[0].action.is_some());
        assert!(marks[1].action.is_none());
    }

    #[test]
    fn test_serde_json_shape() {
        let mark = Bookmark::goto_page("Intro", "1 Fit").with_style(BookmarkStyle::BOLD);
        let json = serde_json::to_string(&mark).unwrap();
        assert!(json.contains("\"action\":\"GoTo\""), "{}", json);
        let back: Bookmark = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mark);
    }

    proptest! {
        #[test]
        fn test_octal_escape_symmetry(s in "[\\x00-\\x7f\\u{a0}-\\u{ff}]{0,40}") {
            prop_assert_eq!(unescape_binary_string(&escape_binary_string(&s)), s);
        }
    }
}
