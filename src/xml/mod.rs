pub mod pretty;
pub mod tree;

pub use pretty::pretty_print;
pub use tree::{parse_document, XmlNode};
