//! Bookmark XML import and export.
//!
//! The document root is `<Bookmark>`; each item is a `<Title>` element whose
//! text is the bookmark title and whose children are the item's kids:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <Bookmark>
//!   <Title Action="GoTo" Page="3 XYZ 0 800 0" Style="bold" Open="false">Chapter 3
//!     <Title Action="URI" URI="https://example.com">Link</Title>
//!   </Title>
//! </Bookmark>
//! ```
//!
//! `Named` and `NamedN` values escape control characters as `\nnn`.
//! Documents declared in an encoding other than UTF-8 carry non-ASCII
//! characters as numeric character references.

use std::borrow::Cow;
use std::io::{BufRead, Write};

use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::bookmark::{
    escape_binary_string, format_number, unescape_binary_string, Bookmark, BookmarkAction, BookmarkStyle, Target,
};
use crate::error::{Error, Result};

const ROOT: &str = "Bookmark";
const TITLE: &str = "Title";

/// Write `bookmarks` as a bookmark XML document declared in `encoding`.
pub fn export_to_xml<W: Write>(bookmarks: &[Bookmark], out: W, encoding: &str) -> Result<()> {
    let ascii_only = !encoding.eq_ignore_ascii_case("UTF-8") && !encoding.eq_ignore_ascii_case("UTF8");
    let mut writer = Writer::new_with_indent(out, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some(encoding), None)))?;
    writer.write_event(Event::Start(BytesStart::new(ROOT)))?;
    for bookmark in bookmarks {
        write_item(&mut writer, bookmark, ascii_only)?;
    }
    writer.write_event(Event::End(BytesEnd::new(ROOT)))?;
    writer.into_inner().flush()?;
    log::debug!("Exported {} top-level bookmarks as XML ({})", bookmarks.len(), encoding);
    Ok(())
}

/// [`export_to_xml`] into a UTF-8 string.
pub fn export_to_xml_string(bookmarks: &[Bookmark]) -> Result<String> {
    let mut out = Vec::new();
    export_to_xml(bookmarks, &mut out, "UTF-8")?;
    String::from_utf8(out).map_err(|e| Error::Xml(e.to_string()))
}

fn write_item<W: Write>(writer: &mut Writer<W>, item: &Bookmark, ascii_only: bool) -> Result<()> {
    let mut attributes: Vec<(&str, String)> = Vec::new();
    if let Some(action) = &item.action {
        action_attributes(action, &mut attributes);
    }
    if let Some(style) = item.style.to_style_attribute() {
        attributes.push(("Style", style.to_string()));
    }
    if let Some([r, g, b]) = item.color {
        attributes.push(("Color", format!("{} {} {}", format_number(r), format_number(g), format_number(b))));
    }
    if !item.open && !item.kids.is_empty() {
        attributes.push(("Open", "false".to_string()));
    }

    let mut start = BytesStart::new(TITLE);
    for (key, value) in &attributes {
        let encoded = encode(value, ascii_only);
        start.push_attribute(Attribute::from((key.as_bytes(), encoded.as_bytes())));
    }
    writer.write_event(Event::Start(start))?;
    let title = encode(&item.title, ascii_only);
    if !title.is_empty() {
        writer.write_event(Event::Text(BytesText::from_escaped(title.as_str())))?;
    }
    for kid in &item.kids {
        write_item(writer, kid, ascii_only)?;
    }
    writer.write_event(Event::End(BytesEnd::new(TITLE)))?;
    Ok(())
}

fn action_attributes(action: &BookmarkAction, attributes: &mut Vec<(&'static str, String)>) {
    match action {
        BookmarkAction::GoTo(target) => {
            attributes.push(("Action", "GoTo".to_string()));
            target_attributes(target, attributes);
        },
        BookmarkAction::GoToR {
            file,
            target,
            new_window,
        } => {
            attributes.push(("Action", "GoToR".to_string()));
            if let Some(target) = target {
                target_attributes(target, attributes);
            }
            attributes.push(("File", file.clone()));
            if let Some(new_window) = new_window {
                attributes.push(("NewWindow", new_window.to_string()));
            }
        },
        BookmarkAction::Uri(uri) => {
            attributes.push(("Action", "URI".to_string()));
            attributes.push(("URI", uri.clone()));
        },
        BookmarkAction::Launch(file) => {
            attributes.push(("Action", "Launch".to_string()));
            attributes.push(("File", file.clone()));
        },
        BookmarkAction::JavaScript(code) => {
            attributes.push(("Action", "JS".to_string()));
            attributes.push(("Code", code.clone()));
        },
        BookmarkAction::Hide { field, hide } => {
            attributes.push(("Action", "Hide".to_string()));
            attributes.push(("Field", field.clone()));
            attributes.push(("Hide", hide.to_string()));
        },
        BookmarkAction::SetOcgState(state) => {
            attributes.push(("Action", "SetOCGState".to_string()));
            attributes.push(("State", state.join(" ")));
        },
    }
}

fn target_attributes(target: &Target, attributes: &mut Vec<(&'static str, String)>) {
    match target {
        Target::Page(page) => attributes.push(("Page", page.clone())),
        Target::Named(name) => attributes.push(("Named", escape_binary_string(name))),
        Target::NamedN(name) => attributes.push(("NamedN", escape_binary_string(name))),
    }
}

/// Escape markup, drop characters XML cannot carry, and in ASCII mode use character references.
fn encode(value: &str, ascii_only: bool) -> String {
    let cleaned: Cow<str> = if value.chars().any(is_forbidden) {
        Cow::Owned(value.chars().filter(|c| !is_forbidden(*c)).collect())
    } else {
        Cow::Borrowed(value)
    };
    let escaped = escape(cleaned.as_ref());
    if !ascii_only || escaped.is_ascii() {
        return escaped.into_owned();
    }
    let mut out = String::with_capacity(escaped.len() + 8);
    for c in escaped.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            out.push_str(&format!("&#{};", c as u32));
        }
    }
    out
}

fn is_forbidden(c: char) -> bool {
    (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r')
}

/// Read a bookmark XML document.
///
/// Titles are trimmed. Unknown elements are ignored; a `<Title>` outside
/// the root element is still accepted.
pub fn import_from_xml<R: BufRead>(input: R) -> Result<Vec<Bookmark>> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut roots: Vec<Bookmark> = Vec::new();
    let mut stack: Vec<Bookmark> = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == TITLE.as_bytes() => {
                stack.push(bookmark_from_attributes(&e)?);
            },
            Event::Empty(e) if e.name().as_ref() == TITLE.as_bytes() => {
                let item = bookmark_from_attributes(&e)?;
                attach(&mut stack, &mut roots, item);
            },
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.title.push_str(&t.unescape()?);
                }
            },
            Event::CData(t) => {
                if let Some(top) = stack.last_mut() {
                    top.title.push_str(&String::from_utf8_lossy(&t));
                }
            },
            Event::End(e) if e.name().as_ref() == TITLE.as_bytes() => {
                if let Some(mut item) = stack.pop() {
                    item.title = item.title.trim().to_string();
                    attach(&mut stack, &mut roots, item);
                }
            },
            Event::Eof => break,
            _ => {},
        }
        buf.clear();
    }
    if !stack.is_empty() {
        return Err(Error::Xml(format!("{} unclosed <Title> elements", stack.len())));
    }
    log::debug!("Imported {} top-level bookmarks from XML", roots.len());
    Ok(roots)
}

/// [`import_from_xml`] from a string.
pub fn import_from_xml_str(xml: &str) -> Result<Vec<Bookmark>> {
    import_from_xml(xml.as_bytes())
}

fn attach(stack: &mut [Bookmark], roots: &mut Vec<Bookmark>, item: Bookmark) {
    match stack.last_mut() {
        Some(parent) => parent.add_kid(item),
        None => roots.push(item),
    }
}

fn bookmark_from_attributes(element: &BytesStart<'_>) -> Result<Bookmark> {
    let mut values: Vec<(String, String)> = Vec::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| Error::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        values.push((key, value));
    }
    let get = |key: &str| values.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());

    let mut bookmark = Bookmark::new(String::new());
    let target = || {
        if let Some(page) = get("Page") {
            Some(Target::Page(page.to_string()))
        } else if let Some(named) = get("Named") {
            Some(Target::Named(unescape_binary_string(named)))
        } else {
            get("NamedN").map(|n| Target::NamedN(unescape_binary_string(n)))
        }
    };
    bookmark.action = match get("Action") {
        Some("GoTo") => target().map(BookmarkAction::GoTo),
        Some("GoToR") => get("File").map(|file| BookmarkAction::GoToR {
            file: file.to_string(),
            target: target(),
            new_window: get("NewWindow").map(|v| v.eq_ignore_ascii_case("true")),
        }),
        Some("URI") => get("URI").map(|uri| BookmarkAction::Uri(uri.to_string())),
        Some("Launch") => get("File").map(|file| BookmarkAction::Launch(file.to_string())),
        Some("JS") => get("Code").map(|code| BookmarkAction::JavaScript(code.to_string())),
        Some("Hide") => get("Field").map(|field| BookmarkAction::Hide {
            field: field.to_string(),
            hide: get("Hide").map_or(true, |v| !v.eq_ignore_ascii_case("false")),
        }),
        Some("SetOCGState") => get("State")
            .map(|state| BookmarkAction::SetOcgState(state.split_whitespace().map(str::to_string).collect())),
        Some(other) => {
            log::warn!("Ignoring unknown bookmark action '{}'", other);
            None
        },
        None => target().map(BookmarkAction::GoTo),
    };
    if let Some(style) = get("Style") {
        bookmark.style = BookmarkStyle::from_style_attribute(style);
    }
    if let Some(color) = get("Color") {
        let parts: Vec<f64> = color.split_whitespace().filter_map(|p| p.parse().ok()).collect();
        if let [r, g, b] = parts[..] {
            bookmark.color = Some([r, g, b]);
        } else {
            log::warn!("Ignoring malformed bookmark color '{}'", color);
        }
    }
    if let Some(open) = get("Open") {
        bookmark.open = !open.eq_ignore_ascii_case("false");
    }
    Ok(bookmark)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Bookmark> {
        let mut chapter = Bookmark::goto_page("Chapter 3", "3 XYZ 0 800 0")
            .with_style(BookmarkStyle::BOLD)
            .with_color(1.0, 0.0, 0.5)
            .with_open(false);
        chapter.add_kid(Bookmark::new("Link").with_action(BookmarkAction::Uri("https://example.com/?a=1&b=2".into())));
        chapter.add_kid(Bookmark::new("Script").with_action(BookmarkAction::JavaScript("app.alert(\"hi\");".into())));
        vec![
            chapter,
            Bookmark::new("Named").with_action(BookmarkAction::GoTo(Target::Named("sec\u{1}2".into()))),
            Bookmark::new("Remote").with_action(BookmarkAction::GoToR {
                file: "other.pdf".into(),
                target: Some(Target::NamedN("intro".into())),
                new_window: Some(true),
            }),
        ]
    }

    #[test]
    fn test_export_layout() {
        let xml = export_to_xml_string(&sample()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<Bookmark>"));
        assert!(xml.contains(
            "<Title Action=\"GoTo\" Page=\"3 XYZ 0 800 0\" Style=\"bold\" Color=\"1 0 0.5\" Open=\"false\">Chapter 3"
        ));
        assert!(xml.contains("URI=\"https://example.com/?a=1&amp;b=2\""));
        assert!(xml.contains("Named=\"sec\\0012\""));
        assert!(xml.contains("NamedN=\"intro\" File=\"other.pdf\" NewWindow=\"true\""));
    }

    #[test]
    fn test_round_trip() {
        let original = sample();
        let xml = export_to_xml_string(&original).unwrap();
        let imported = import_from_xml_str(&xml).unwrap();
        assert_eq!(imported, original);
    }

    #[test]
    fn test_import_trims_titles() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Bookmark>
  <Title Action="GoTo" Page="1 Fit">
      Introduction
    <Title Page="2 FitH 700" Style="italic"/>
  </Title>
</Bookmark>"#;
        let marks = import_from_xml_str(xml).unwrap();
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[0].title, "Introduction");
        assert_eq!(marks[0].kids[0].page(), Some("2 FitH 700"));
        assert_eq!(marks[0].kids[0].style, BookmarkStyle::ITALIC);
        assert!(marks[0].open);
    }

    #[test]
    fn test_latin1_export_uses_char_refs() {
        let marks = vec![Bookmark::goto_page("Résumé", "1")];
        let mut out = Vec::new();
        export_to_xml(&marks, &mut out, "ISO-8859-1").unwrap();
        let xml = String::from_utf8(out).unwrap();
        assert!(xml.contains("encoding=\"ISO-8859-1\""));
        assert!(xml.contains("R&#233;sum&#233;"));
        assert_eq!(import_from_xml_str(&xml).unwrap()[0].title, "Résumé");
    }

    #[test]
    fn test_unclosed_title_rejected() {
        assert!(import_from_xml_str("<Bookmark><Title>Open").is_err());
    }
}
