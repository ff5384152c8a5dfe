//! Crosswalks: pure transformations from an item's internal metadata
//! document into a target output schema.
//!
//! A crosswalk is registered per metadata format at startup and shared
//! read-only across requests; implementations hold no per-call state.
//! Rendering is best-effort: an item missing fields still produces output;
//! only an item the crosswalk cannot process at all yields an error, which
//! the caller degrades per item rather than failing the page.

mod oai_dc;
mod qdc;

pub use oai_dc::{OaiDcCrosswalk, DC_NAMESPACE, OAI_DC_NAMESPACE, OAI_DC_SCHEMA};
pub use qdc::{QualifiedDcCrosswalk, DCTERMS_NAMESPACE, QDC_NAMESPACE, QDC_SCHEMA};

pub(crate) use oai_dc::XSI_NAMESPACE;

use crate::error::CrosswalkError;
use crate::types::Item;

/// The 15 unqualified Dublin Core elements.
pub(crate) const DC_ELEMENTS: [&str; 15] = [
    "title",
    "creator",
    "subject",
    "description",
    "publisher",
    "contributor",
    "date",
    "type",
    "format",
    "identifier",
    "source",
    "language",
    "relation",
    "coverage",
    "rights",
];

/// A pure item-to-XML transformation for one output schema.
pub trait Crosswalk: Send + Sync {
    /// Whether this crosswalk can produce output for the item.
    ///
    /// Items that fail this check are not listed for the format and are
    /// skipped during harvests.
    fn is_available_for(&self, item: &Item) -> bool {
        !item.metadata.is_empty()
    }

    /// Render the item's metadata as a self-contained XML fragment in the
    /// target schema, ready to embed inside a `<metadata>` element.
    fn render(&self, item: &Item) -> Result<String, CrosswalkError>;
}
