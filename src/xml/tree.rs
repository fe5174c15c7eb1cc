use std::fmt;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Owned element tree built from a feed document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlError {
    pub message: String,
    pub position: u64,
}

impl fmt::Display for XmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at byte {})", self.message, self.position)
    }
}

impl std::error::Error for XmlError {}

impl XmlNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    /// First direct child with the given tag.
    pub fn find(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.tag == tag)
    }

    pub fn find_all<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// Trimmed text of the first direct child with `tag`, empty when absent.
    pub fn child_text(&self, tag: &str) -> String {
        self.find(tag).map(|c| c.text.trim().to_string()).unwrap_or_default()
    }

    /// Every element below this one (not including it) whose tag matches, in document order.
    pub fn descendants(&self, tag: &str) -> Vec<&XmlNode> {
        let mut out = Vec::new();
        collect_descendants(self, tag, &mut out);
        out
    }

    pub fn count_descendants(&self, tag: &str) -> usize {
        self.children.iter().map(|c| usize::from(c.tag == tag) + c.count_descendants(tag)).sum()
    }

    pub fn child_tags(&self) -> Vec<String> {
        self.children.iter().map(|c| c.tag.clone()).collect()
    }
}

fn collect_descendants<'a>(node: &'a XmlNode, tag: &str, out: &mut Vec<&'a XmlNode>) {
    for c in &node.children {
        if c.tag == tag { out.push(c); }
        collect_descendants(c, tag, out);
    }
}

/// Removes a leading byte-order mark.
pub fn strip_bom(s: &str) -> &str {
    s.strip_prefix('\u{feff}').unwrap_or(s)
}

/// Parses a complete document and returns its root element.
///
/// The document must have exactly one root element; text outside it (other than
/// whitespace) and unclosed elements are reported as errors.
pub fn parse_document(xml: &str) -> Result<XmlNode, XmlError> {
    let xml = strip_bom(xml);
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let pos = reader.buffer_position() as u64;
        let event = reader.read_event().map_err(|e| XmlError { message: e.to_string(), position: pos })?;
        match event {
            Event::Start(e) => {
                if root.is_some() && stack.is_empty() {
                    return Err(XmlError { message: "junk after document element".into(), position: pos });
                }
                stack.push(open_node(&e, pos)?);
            }
            Event::Empty(e) => {
                let node = open_node(&e, pos)?;
                close_node(node, &mut stack, &mut root, pos)?;
            }
            Event::End(_) => {
                let node = stack.pop().ok_or_else(|| XmlError { message: "unexpected closing tag".into(), position: pos })?;
                close_node(node, &mut stack, &mut root, pos)?;
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| XmlError { message: e.to_string(), position: pos })?;
                push_text(&mut stack, &text, pos)?;
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                push_text(&mut stack, &String::from_utf8_lossy(&raw), pos)?;
            }
            Event::Eof => break,
            // declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    let end = reader.buffer_position() as u64;
    if let Some(open) = stack.last() {
        return Err(XmlError { message: format!("unclosed element <{}>", open.tag), position: end });
    }
    root.ok_or(XmlError { message: "no element found".into(), position: end })
}

fn open_node(e: &BytesStart<'_>, pos: u64) -> Result<XmlNode, XmlError> {
    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for a in e.attributes() {
        let a = a.map_err(|err| XmlError { message: err.to_string(), position: pos })?;
        let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
        let value = a.unescape_value().map_err(|err| XmlError { message: err.to_string(), position: pos })?.into_owned();
        attrs.push((key, value));
    }
    Ok(XmlNode { tag, attrs, text: String::new(), children: Vec::new() })
}

fn close_node(node: XmlNode, stack: &mut [XmlNode], root: &mut Option<XmlNode>, pos: u64) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => { parent.children.push(node); Ok(()) }
        None if root.is_none() => { *root = Some(node); Ok(()) }
        None => Err(XmlError { message: "junk after document element".into(), position: pos }),
    }
}

fn push_text(stack: &mut [XmlNode], text: &str, pos: u64) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(node) => { node.text.push_str(text); Ok(()) }
        None if text.trim().is_empty() => Ok(()),
        None => Err(XmlError { message: "text outside of the document element".into(), position: pos }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<SHOP>
  <SHOPITEM id="17" import-code="A">
    <NAME>Herbal tea &amp; honey</NAME>
    <CODE> T-1 </CODE>
    <DESCRIPTION><![CDATA[<p>Hot</p>]]></DESCRIPTION>
  </SHOPITEM>
  <SHOPITEM id="18"><CODE>T-2</CODE><EMPTY/></SHOPITEM>
</SHOP>"#;

    #[test]
    fn parses_root_children_and_attributes() {
        let root = parse_document(FEED).unwrap();
        assert_eq!(root.tag, "SHOP");
        assert_eq!(root.children.len(), 2);
        let first = &root.children[0];
        assert_eq!(first.attr("id"), Some("17"));
        assert_eq!(first.attr("import-code"), Some("A"));
        assert_eq!(first.child_text("NAME"), "Herbal tea & honey");
        assert_eq!(first.child_text("CODE"), "T-1");
        assert_eq!(first.child_text("DESCRIPTION"), "<p>Hot</p>");
        assert_eq!(first.child_text("MISSING"), "");
    }

    #[test]
    fn descendants_skip_the_root_itself() {
        let root = parse_document("<ORDER><ORDERS><ORDER/><ORDER><ORDER/></ORDER></ORDERS></ORDER>").unwrap();
        assert_eq!(root.descendants("ORDER").len(), 3);
        assert_eq!(root.count_descendants("ORDER"), 3);
    }

    #[test]
    fn strips_byte_order_mark() {
        let root = parse_document("\u{feff}<ORDERS/>").unwrap();
        assert_eq!(root.tag, "ORDERS");
    }

    #[test]
    fn mismatched_tags_are_errors() {
        let err = parse_document("<a><b></a>").unwrap_err();
        assert!(!err.message.is_empty());
    }

    #[test]
    fn unclosed_root_is_an_error() {
        assert!(parse_document("<ORDERS><ORDER>").is_err());
    }

    #[test]
    fn empty_and_whitespace_documents_are_errors() {
        assert!(parse_document("").is_err());
        assert!(parse_document("   \n\t ").is_err());
    }

    #[test]
    fn second_root_is_an_error() {
        assert!(parse_document("<a/><b/>").is_err());
        assert!(parse_document("<a></a>trailing").is_err());
    }

    #[test]
    fn child_tags_lists_direct_children() {
        let root = parse_document(FEED).unwrap();
        assert_eq!(root.child_tags(), vec!["SHOPITEM".to_string(), "SHOPITEM".to_string()]);
        assert_eq!(root.children[1].child_tags(), vec!["CODE".to_string(), "EMPTY".to_string()]);
    }
}
