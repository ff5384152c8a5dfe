//! Unqualified Dublin Core crosswalk, the format every OAI-PMH repository
//! must support under the `oai_dc` prefix.

use quick_xml::Writer;

use super::{Crosswalk, DC_ELEMENTS};
use crate::error::CrosswalkError;
use crate::types::Item;
use crate::xml::{close_element, into_string, open_element, text_element};

/// Namespace of the `oai_dc` container element.
pub const OAI_DC_NAMESPACE: &str = "http://www.openarchives.org/OAI/2.0/oai_dc/";

/// Schema location for `oai_dc` documents.
pub const OAI_DC_SCHEMA: &str = "http://www.openarchives.org/OAI/2.0/oai_dc.xsd";

/// Namespace of the unqualified Dublin Core elements.
pub const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";

/// XML Schema instance namespace.
pub(crate) const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Renders `dc.*` metadata rows as an `<oai_dc:dc>` container.
///
/// Qualifiers are collapsed: `dc.date.issued` contributes a plain
/// `<dc:date>`, matching how unqualified DC flattens the qualified schema.
/// Entries outside the 15 DC elements are dropped.
#[derive(Debug, Default)]
pub struct OaiDcCrosswalk;

impl Crosswalk for OaiDcCrosswalk {
    fn is_available_for(&self, item: &Item) -> bool {
        item.metadata
            .entries
            .iter()
            .any(|e| e.schema == "dc" && DC_ELEMENTS.contains(&e.element.as_str()))
    }

    fn render(&self, item: &Item) -> Result<String, CrosswalkError> {
        if item.metadata.is_empty() {
            return Err(CrosswalkError::EmptyDocument {
                identifier: item.identifier.clone(),
            });
        }

        let mut writer = Writer::new(Vec::new());
        open_element(
            &mut writer,
            "oai_dc:dc",
            &[
                ("xmlns:oai_dc", OAI_DC_NAMESPACE),
                ("xmlns:dc", DC_NAMESPACE),
                ("xmlns:xsi", XSI_NAMESPACE),
                (
                    "xsi:schemaLocation",
                    &format!("{OAI_DC_NAMESPACE} {OAI_DC_SCHEMA}"),
                ),
            ],
        )?;

        // Keep repository order within each element, elements in DC order.
        for element in DC_ELEMENTS {
            for entry in item.metadata.element("dc", element) {
                text_element(&mut writer, &format!("dc:{element}"), &entry.value)?;
            }
        }

        close_element(&mut writer, "oai_dc:dc")?;
        Ok(into_string(writer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MetadataDocument, MetadataEntry};
    use chrono::DateTime;

    fn sample_item() -> Item {
        let mut doc = MetadataDocument::new();
        doc.push(MetadataEntry::new("dc", "title", "On Harvesting"));
        doc.push(MetadataEntry::new("dc", "creator", "Voorbeeld, Anna"));
        doc.push(MetadataEntry::new("dc", "date", "2020-05-01").with_qualifier("issued"));
        doc.push(MetadataEntry::new("dc", "description", "R&D <notes>"));
        doc.push(MetadataEntry::new("local", "shelf", "A-3")); // not DC, dropped
        Item::new("123456789/5", DateTime::UNIX_EPOCH, doc)
    }

    #[test]
    fn test_render_wraps_in_oai_dc_container() {
        let xml = OaiDcCrosswalk.render(&sample_item()).unwrap();
        assert!(xml.starts_with("<oai_dc:dc "));
        assert!(xml.ends_with("</oai_dc:dc>"));
        assert!(xml.contains("xmlns:oai_dc=\"http://www.openarchives.org/OAI/2.0/oai_dc/\""));
        assert!(xml.contains("<dc:title>On Harvesting</dc:title>"));
        assert!(xml.contains("<dc:creator>Voorbeeld, Anna</dc:creator>"));
    }

    #[test]
    fn test_render_collapses_qualifiers() {
        let xml = OaiDcCrosswalk.render(&sample_item()).unwrap();
        assert!(xml.contains("<dc:date>2020-05-01</dc:date>"));
        assert!(!xml.contains("issued"));
    }

    #[test]
    fn test_render_escapes_values() {
        let xml = OaiDcCrosswalk.render(&sample_item()).unwrap();
        assert!(xml.contains("<dc:description>R&amp;D &lt;notes&gt;</dc:description>"));
    }

    #[test]
    fn test_render_drops_non_dc_rows() {
        let xml = OaiDcCrosswalk.render(&sample_item()).unwrap();
        assert!(!xml.contains("shelf"));
        assert!(!xml.contains("A-3"));
    }

    #[test]
    fn test_render_empty_document_is_an_error() {
        let item = Item::new("123456789/9", DateTime::UNIX_EPOCH, MetadataDocument::new());
        assert!(matches!(
            OaiDcCrosswalk.render(&item),
            Err(CrosswalkError::EmptyDocument { .. })
        ));
    }

    #[test]
    fn test_availability_requires_a_dc_row() {
        let mut doc = MetadataDocument::new();
        doc.push(MetadataEntry::new("local", "shelf", "A-3"));
        let item = Item::new("123456789/9", DateTime::UNIX_EPOCH, doc);
        assert!(!OaiDcCrosswalk.is_available_for(&item));
        assert!(OaiDcCrosswalk.is_available_for(&sample_item()));
    }

    #[test]
    fn test_render_output_is_well_formed() {
        let xml = OaiDcCrosswalk.render(&sample_item()).unwrap();
        assert!(roxmltree::Document::parse(&xml).is_ok());
    }
}
