use std::io::Cursor;

use quick_xml::events::Event;
use quick_xml::{Reader, Writer};

use super::tree::{strip_bom, XmlError};

/// Re-indents a document with two spaces per level.
pub fn pretty_print(xml: &str) -> Result<String, XmlError> {
    let mut reader = Reader::from_str(strip_bom(xml));
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    loop {
        let pos = reader.buffer_position() as u64;
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(ev) => writer
                .write_event(ev)
                .map_err(|e| XmlError { message: e.to_string(), position: pos })?,
            Err(e) => return Err(XmlError { message: e.to_string(), position: pos }),
        }
    }

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indents_nested_elements() {
        let out = pretty_print("<ORDERS><ORDER><CODE>1</CODE></ORDER></ORDERS>").unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "<ORDERS>");
        assert_eq!(lines[1], "  <ORDER>");
        assert_eq!(lines[2], "    <CODE>1</CODE>");
        assert_eq!(lines.last().copied(), Some("</ORDERS>"));
    }

    #[test]
    fn reports_broken_markup() {
        assert!(pretty_print("<a><b></a>").is_err());
    }
}
