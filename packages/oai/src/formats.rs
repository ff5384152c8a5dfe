//! Metadata format registry.
//!
//! Formats are immutable value records keyed by prefix, with their
//! crosswalks registered once at startup. The registry is built before the
//! provider starts serving and never mutated afterwards, so it is shared
//! read-only across concurrent requests.

use std::collections::BTreeMap;

use crate::crosswalk::{
    Crosswalk, OaiDcCrosswalk, QualifiedDcCrosswalk, DCTERMS_NAMESPACE, OAI_DC_NAMESPACE,
    OAI_DC_SCHEMA, QDC_SCHEMA,
};
use crate::types::Item;

/// A supported output schema, as advertised by `ListMetadataFormats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFormat {
    /// Unique key, e.g. "oai_dc".
    pub prefix: String,

    /// URL of the XML schema for validation.
    pub schema: String,

    /// Namespace URI of the root metadata element.
    pub namespace: String,
}

impl MetadataFormat {
    /// Create a format record.
    #[must_use]
    pub fn new(
        prefix: impl Into<String>,
        schema: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            schema: schema.into(),
            namespace: namespace.into(),
        }
    }
}

struct RegisteredFormat {
    format: MetadataFormat,
    crosswalk: Box<dyn Crosswalk>,
}

/// Registry mapping metadata prefixes to formats and their crosswalks.
///
/// A `BTreeMap` keeps `ListMetadataFormats` output in a deterministic
/// order.
pub struct FormatRegistry {
    formats: BTreeMap<String, RegisteredFormat>,
}

impl FormatRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            formats: BTreeMap::new(),
        }
    }

    /// The standard registry: `oai_dc` (mandatory) and `qdc`.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            MetadataFormat::new("oai_dc", OAI_DC_SCHEMA, OAI_DC_NAMESPACE),
            OaiDcCrosswalk,
        );
        registry.register(
            MetadataFormat::new("qdc", QDC_SCHEMA, DCTERMS_NAMESPACE),
            QualifiedDcCrosswalk,
        );
        registry
    }

    /// Register a format with its crosswalk. A repeated prefix replaces the
    /// earlier registration.
    pub fn register(&mut self, format: MetadataFormat, crosswalk: impl Crosswalk + 'static) {
        self.formats.insert(
            format.prefix.clone(),
            RegisteredFormat {
                format,
                crosswalk: Box::new(crosswalk),
            },
        );
    }

    /// Look up a format by prefix.
    #[must_use]
    pub fn get(&self, prefix: &str) -> Option<&MetadataFormat> {
        self.formats.get(prefix).map(|r| &r.format)
    }

    /// Look up the crosswalk for a prefix.
    #[must_use]
    pub fn crosswalk(&self, prefix: &str) -> Option<&dyn Crosswalk> {
        self.formats.get(prefix).map(|r| r.crosswalk.as_ref())
    }

    /// Whether a prefix is registered.
    #[must_use]
    pub fn contains(&self, prefix: &str) -> bool {
        self.formats.contains_key(prefix)
    }

    /// All registered formats, in prefix order.
    pub fn formats(&self) -> impl Iterator<Item = &MetadataFormat> {
        self.formats.values().map(|r| &r.format)
    }

    /// The formats able to disseminate a given item, in prefix order.
    #[must_use]
    pub fn formats_for(&self, item: &Item) -> Vec<&MetadataFormat> {
        self.formats
            .values()
            .filter(|r| r.crosswalk.is_available_for(item))
            .map(|r| &r.format)
            .collect()
    }

    /// Number of registered formats.
    #[must_use]
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// Whether no formats are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Item, MetadataDocument, MetadataEntry};
    use chrono::DateTime;

    #[test]
    fn test_defaults_register_oai_dc_and_qdc() {
        let registry = FormatRegistry::with_defaults();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("oai_dc"));
        assert!(registry.contains("qdc"));
        assert!(!registry.contains("marc"));

        let oai_dc = registry.get("oai_dc").unwrap();
        assert_eq!(oai_dc.namespace, OAI_DC_NAMESPACE);
        assert_eq!(oai_dc.schema, OAI_DC_SCHEMA);
    }

    #[test]
    fn test_formats_iterate_in_prefix_order() {
        let registry = FormatRegistry::with_defaults();
        let prefixes: Vec<_> = registry.formats().map(|f| f.prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["oai_dc", "qdc"]);
    }

    #[test]
    fn test_crosswalk_lookup_and_render() {
        let registry = FormatRegistry::with_defaults();
        let mut doc = MetadataDocument::new();
        doc.push(MetadataEntry::new("dc", "title", "A title"));
        let item = Item::new("123456789/1", DateTime::UNIX_EPOCH, doc);

        let crosswalk = registry.crosswalk("oai_dc").unwrap();
        let xml = crosswalk.render(&item).unwrap();
        assert!(xml.contains("<dc:title>A title</dc:title>"));

        assert!(registry.crosswalk("marc").is_none());
    }

    #[test]
    fn test_formats_for_filters_by_availability() {
        let registry = FormatRegistry::with_defaults();

        let mut doc = MetadataDocument::new();
        doc.push(MetadataEntry::new("dc", "title", "A title"));
        let item = Item::new("123456789/1", DateTime::UNIX_EPOCH, doc);
        assert_eq!(registry.formats_for(&item).len(), 2);

        let bare = Item::new("123456789/2", DateTime::UNIX_EPOCH, MetadataDocument::new());
        assert!(registry.formats_for(&bare).is_empty());
    }

    #[test]
    fn test_register_replaces_existing_prefix() {
        let mut registry = FormatRegistry::with_defaults();
        registry.register(
            MetadataFormat::new("oai_dc", "https://example.org/alt.xsd", "urn:alt"),
            OaiDcCrosswalk,
        );
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("oai_dc").unwrap().namespace, "urn:alt");
    }
}
