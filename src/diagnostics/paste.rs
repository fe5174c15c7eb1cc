use crate::configuration::types::ImportType;
use crate::importer::store::RecordStore;
use crate::importer::{self, ImportOptions, ImportSummary};
use crate::xml::{parse_document, XmlNode};

use super::types::{PastedImport, StructureDump};

pub fn structure(root: &XmlNode, element: &str) -> StructureDump {
    StructureDump {
        root_tag: root.tag.clone(),
        root_children: root.child_tags(),
        first_element_children: root.descendants(element).first().map(|n| n.child_tags()).unwrap_or_default(),
    }
}

/// Parses an operator-supplied document and reports its shape without importing it.
pub fn validate_pasted(import_type: ImportType, xml: &str, debug_structure: bool) -> (PastedImport, Option<XmlNode>) {
    let element = import_type.element();
    let mut out = PastedImport { element: element.to_string(), ..Default::default() };
    if xml.trim().is_empty() {
        out.message = "No XML content provided".to_string();
        return (out, None);
    }
    let root = match parse_document(xml) {
        Ok(r) => r,
        Err(e) => {
            out.parse_error = Some(e.to_string());
            out.message = format!("XML parsing failed: {e}");
            return (out, None);
        }
    };
    out.xml_valid = true;
    out.root_tag = Some(root.tag.clone());
    out.element_count = root.count_descendants(element);
    if debug_structure {
        out.structure = Some(structure(&root, element));
    }
    out.success = true;
    out.message = format!("Valid XML with {} {} element(s)", out.element_count, element);
    (out, Some(root))
}

/// Validates the document and, when it is well formed, runs it through the import
/// pipeline. The caller decides whether to log the run.
pub async fn import_from_pasted_content<S: RecordStore>(
    store: &S,
    import_type: ImportType,
    xml: &str,
    opts: &ImportOptions,
    debug_structure: bool,
) -> PastedImport {
    let (mut out, root) = validate_pasted(import_type, xml, debug_structure);
    let Some(root) = root else { return out };

    let summary = if import_type.is_supported() {
        importer::import_tree(store, import_type, &root, opts).await
    } else {
        ImportSummary::failed(format!("Import type '{import_type}' is not yet implemented"))
    };
    out.success = summary.success;
    out.message = summary.headline();
    out.import_result = Some(summary);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::store::memory::MemoryStore;

    const ITEMS: &str = "\u{feff}<SHOP><SHOPITEM id=\"7\"><CODE>T-1</CODE><NAME>Tea</NAME><PRICE_VAT>3,50</PRICE_VAT></SHOPITEM></SHOP>";

    #[tokio::test]
    async fn valid_paste_is_imported_with_structure() {
        let store = MemoryStore::default();
        let r = import_from_pasted_content(&store, ImportType::Items, ITEMS, &ImportOptions::default(), true).await;
        assert!(r.success);
        assert!(r.xml_valid);
        assert_eq!(r.root_tag.as_deref(), Some("SHOP"));
        assert_eq!(r.element_count, 1);
        assert_eq!(r.message, "Imported: 1, Updated: 0, Errors: 0");
        let s = r.structure.unwrap();
        assert_eq!(s.root_children, vec!["SHOPITEM".to_string()]);
        assert_eq!(s.first_element_children, vec!["CODE".to_string(), "NAME".to_string(), "PRICE_VAT".to_string()]);
        store.with(|st| assert!(st.items.contains_key("T-1")));
    }

    #[tokio::test]
    async fn malformed_and_empty_pastes_are_not_imported() {
        let store = MemoryStore::default();
        let bad = import_from_pasted_content(&store, ImportType::Items, "<SHOP><SHOPITEM>", &ImportOptions::default(), false).await;
        assert!(!bad.success);
        assert!(!bad.xml_valid);
        assert!(bad.parse_error.is_some());
        assert!(bad.import_result.is_none());

        let empty = import_from_pasted_content(&store, ImportType::Items, "  \n", &ImportOptions::default(), false).await;
        assert!(!empty.xml_valid);
        assert_eq!(empty.message, "No XML content provided");
        store.with(|st| assert!(st.items.is_empty()));
    }

    #[test]
    fn validation_alone_touches_nothing() {
        let (r, root) = validate_pasted(ImportType::Items, ITEMS, false);
        assert!(r.success && r.xml_valid);
        assert_eq!(r.message, "Valid XML with 1 SHOPITEM element(s)");
        assert!(r.structure.is_none());
        assert!(root.is_some());
    }

    #[tokio::test]
    async fn unsupported_types_still_report_structure() {
        let store = MemoryStore::default();
        let r = import_from_pasted_content(&store, ImportType::Customers, "<CUSTOMERS><CUSTOMER/></CUSTOMERS>", &ImportOptions::default(), false).await;
        assert!(r.xml_valid);
        assert_eq!(r.element_count, 1);
        assert!(!r.success);
        assert_eq!(r.message, "Import type 'Customers' is not yet implemented");
    }
}
