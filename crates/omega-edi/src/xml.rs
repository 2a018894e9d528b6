// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Minimal XML element tree for station payloads and SOAP responses.
//
// The EDI service returns most of its interesting data as XML documents
// embedded in string results (station configuration, job listings, product
// version).  Those documents are small, so they are read into a simple owned
// tree with `quick-xml` and queried by local element name.  Namespace
// prefixes are dropped.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};

/// An owned XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Local name (prefix stripped).
    pub name: String,
    /// Attributes in document order, keyed by local name.
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order.
    pub children: Vec<Element>,
    /// Concatenated character data directly inside this element.
    pub text: String,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First direct child with the given local name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first direct child with the given name.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(Element::trimmed_text)
    }

    /// Depth-first search for the first descendant (or self) with the name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }
}

/// Parse a document into its root element.
pub fn parse(document: &str) -> std::result::Result<Element, String> {
    let mut reader = Reader::from_str(document);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(open_element(&start)?),
            Ok(Event::Empty(start)) => {
                let element = open_element(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::End(_)) => {
                let element = stack.pop().ok_or("unbalanced end tag")?;
                attach(&mut stack, &mut root, element);
            }
            Ok(Event::Text(text)) => {
                if let Some(top) = stack.last_mut() {
                    let decoded = text.decode().map_err(|e| e.to_string())?;
                    let unescaped = unescape(&decoded).map_err(|e| e.to_string())?;
                    top.text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok(Event::GeneralRef(reference)) => {
                if let Some(top) = stack.last_mut() {
                    match reference.resolve_char_ref().map_err(|e| e.to_string())? {
                        Some(c) => top.text.push(c),
                        None => {
                            let name = reference.decode().map_err(|e| e.to_string())?;
                            let resolved = resolve_predefined_entity(&name)
                                .ok_or_else(|| format!("unknown entity &{name};"))?;
                            top.text.push_str(resolved);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(format!("at byte {}: {e}", reader.error_position()));
            }
        }
    }

    if !stack.is_empty() {
        return Err(format!("unclosed element <{}>", stack[stack.len() - 1].name));
    }
    root.ok_or_else(|| "document has no root element".to_owned())
}

fn open_element(start: &BytesStart<'_>) -> std::result::Result<Element, String> {
    let mut element = Element {
        name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        ..Default::default()
    };
    for attr in start.attributes() {
        let attr = attr.map_err(|e| format!("bad attribute on <{}>: {e}", element.name))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| format!("bad attribute value on <{}>: {e}", element.name))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

/// Escape text for inclusion in element content or attribute values.
pub fn escape(text: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(text)
}

/// Best-effort decode of a station payload.
///
/// Invalid UTF-8 sequences and characters XML 1.0 cannot carry are dropped
/// instead of failing the whole document.
pub fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER && is_xml_char(c))
        .collect()
}

/// Read a boolean the way the station spells them (`1`, `true`, `True`).
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && !matches!(c, '\u{FFFE}' | '\u{FFFF}'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements_and_attributes() {
        let root = parse(
            r#"<?xml version="1.0"?>
            <pharos_stations>
              <pharos_station name="wired-omega" print_server="PS01">
                <printers><printer name="w20-bw"/><printer name="w20-color"/></printers>
              </pharos_station>
            </pharos_stations>"#,
        )
        .expect("parse");
        assert_eq!(root.name, "pharos_stations");
        let station = root.child("pharos_station").expect("station");
        assert_eq!(station.attr("print_server"), Some("PS01"));
        let printers = station.child("printers").expect("printers");
        assert_eq!(printers.children_named("printer").count(), 2);
        assert_eq!(root.find("printer").and_then(|p| p.attr("name")), Some("w20-bw"));
    }

    #[test]
    fn prefixes_are_dropped() {
        let root = parse(
            r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
                 <soap:Body><PingResponse xmlns="urn:x"/></soap:Body>
               </soap:Envelope>"#,
        )
        .expect("parse");
        assert_eq!(root.name, "Envelope");
        assert!(root.child("Body").and_then(|b| b.child("PingResponse")).is_some());
    }

    #[test]
    fn entities_are_resolved_in_text_and_attributes() {
        let root = parse(r#"<job title="a &quot;b&quot;">R&amp;D &lt;draft&gt; &#233;</job>"#)
            .expect("parse");
        assert_eq!(root.attr("title"), Some("a \"b\""));
        assert_eq!(root.trimmed_text(), "R&D <draft> é");
    }

    #[test]
    fn character_references_and_unknown_entities() {
        let root = parse(r#"<p name="&#x41;&amp;B">&#x263A; &#65;&apos;</p>"#).expect("parse");
        assert_eq!(root.attr("name"), Some("A&B"));
        assert_eq!(root.text, "\u{263A} A'");
        assert!(parse("<p>&nbsp;</p>").is_err());
    }

    #[test]
    fn cdata_is_kept_verbatim() {
        let root = parse("<r><![CDATA[<inner> & stuff]]></r>").expect("parse");
        assert_eq!(root.text, "<inner> & stuff");
    }

    #[test]
    fn mismatched_tags_are_rejected() {
        assert!(parse("<a><b></a>").is_err());
        assert!(parse("<a><b>").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn escape_round_trips_special_characters() {
        let escaped = escape("<pw&\"'>");
        let root = parse(&format!("<p>{escaped}</p>")).expect("parse");
        assert_eq!(root.text, "<pw&\"'>");
    }

    #[test]
    fn decode_lossy_drops_invalid_bytes_and_controls() {
        let bytes = b"<j>caf\xc3\xa9 \xff\xfereport\x01</j>";
        let text = decode_lossy(bytes);
        assert_eq!(text, "<j>café report</j>");
        assert_eq!(parse(&text).expect("parse").text, "café report");
    }
}
