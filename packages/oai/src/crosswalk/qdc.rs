//! Qualified Dublin Core crosswalk (`qdc` prefix).
//!
//! Known qualifiers map onto DCMI terms elements; everything else falls
//! back to the unqualified element so no value is silently lost.

use quick_xml::Writer;

use super::oai_dc::{DC_NAMESPACE, XSI_NAMESPACE};
use super::{Crosswalk, DC_ELEMENTS};
use crate::error::CrosswalkError;
use crate::types::{Item, MetadataEntry};
use crate::xml::{close_element, into_string, open_element, text_element};

/// Namespace of the qualified DC container.
pub const QDC_NAMESPACE: &str = "http://depot-platform.org/qualifieddc/";

/// Schema location for qualified DC documents.
pub const QDC_SCHEMA: &str = "http://dublincore.org/schemas/xmls/qdc/2006/01/06/dcterms.xsd";

/// Namespace of the DCMI terms vocabulary.
pub const DCTERMS_NAMESPACE: &str = "http://purl.org/dc/terms/";

/// (element, qualifier) pairs with a dedicated DCMI terms element.
const DCTERMS_MAP: [(&str, &str, &str); 10] = [
    ("title", "alternative", "alternative"),
    ("date", "created", "created"),
    ("date", "available", "available"),
    ("date", "issued", "issued"),
    ("date", "accessioned", "dateAccepted"),
    ("description", "abstract", "abstract"),
    ("description", "tableofcontents", "tableOfContents"),
    ("format", "extent", "extent"),
    ("format", "medium", "medium"),
    ("relation", "ispartof", "isPartOf"),
];

/// Renders `dc.*` rows as a `<qdc:qualifieddc>` container mixing `dc:` and
/// `dcterms:` elements.
#[derive(Debug, Default)]
pub struct QualifiedDcCrosswalk;

impl QualifiedDcCrosswalk {
    /// The output tag for one metadata row, or `None` when the row has no
    /// qualified-DC representation.
    fn tag_for(entry: &MetadataEntry) -> Option<String> {
        if entry.schema != "dc" {
            return None;
        }
        if let Some(qualifier) = entry.qualifier.as_deref() {
            if let Some((_, _, term)) = DCTERMS_MAP
                .iter()
                .find(|(element, q, _)| *element == entry.element && *q == qualifier)
            {
                return Some(format!("dcterms:{term}"));
            }
        }
        if DC_ELEMENTS.contains(&entry.element.as_str()) {
            return Some(format!("dc:{}", entry.element));
        }
        None
    }
}

impl Crosswalk for QualifiedDcCrosswalk {
    fn is_available_for(&self, item: &Item) -> bool {
        item.metadata.entries.iter().any(|e| Self::tag_for(e).is_some())
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
            "qdc:qualifieddc",
            &[
                ("xmlns:qdc", QDC_NAMESPACE),
                ("xmlns:dc", DC_NAMESPACE),
                ("xmlns:dcterms", DCTERMS_NAMESPACE),
                ("xmlns:xsi", XSI_NAMESPACE),
                ("xsi:schemaLocation", &format!("{QDC_NAMESPACE} {QDC_SCHEMA}")),
            ],
        )?;

        for entry in &item.metadata.entries {
            if let Some(tag) = Self::tag_for(entry) {
                text_element(&mut writer, &tag, &entry.value)?;
            }
        }

        close_element(&mut writer, "qdc:qualifieddc")?;
        Ok(into_string(writer))
    }
}
