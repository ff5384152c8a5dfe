//! Core data types for the OAI-PMH provider.
//!
//! These are read-only projections of repository content: the provider never
//! owns items or sets, it only renders what the search index reports.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{OaiError, Result};

/// Datestamp pattern for day granularity: YYYY-MM-DD.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static DAY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"));

/// Datestamp pattern for second granularity: YYYY-MM-DDThh:mm:ssZ.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static SECOND_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}Z$").expect("valid regex"));

/// The two datestamp granularities OAI-PMH 2.0 defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Day precision, `YYYY-MM-DD`.
    Day,
    /// Second precision, `YYYY-MM-DDThh:mm:ssZ`.
    Second,
}

impl Granularity {
    /// The protocol string reported by `Identify`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "YYYY-MM-DD",
            Self::Second => "YYYY-MM-DDThh:mm:ssZ",
        }
    }
}

/// A parsed protocol datestamp: the UTC instant plus the granularity the
/// harvester used to express it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Datestamp {
    /// The instant, anchored to the start of the expressed period.
    pub instant: DateTime<Utc>,
    /// Precision the argument was written in.
    pub granularity: Granularity,
}

impl Datestamp {
    /// Parse a `from`/`until` argument value.
    ///
    /// Accepts both protocol granularities; anything else is a
    /// `badArgument`.
    ///
    /// # Examples
    /// ```
    /// use depot_oai::types::{Datestamp, Granularity};
    ///
    /// let d = Datestamp::parse("2024-03-01").unwrap();
    /// assert_eq!(d.granularity, Granularity::Day);
    ///
    /// let t = Datestamp::parse("2024-03-01T12:00:00Z").unwrap();
    /// assert_eq!(t.granularity, Granularity::Second);
    ///
    /// assert!(Datestamp::parse("01-03-2024").is_err());
    /// ```
    pub fn parse(value: &str) -> Result<Self> {
        if DAY_PATTERN.is_match(value) {
            let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map_err(|_| bad_datestamp(value))?;
            let instant = date
                .and_hms_opt(0, 0, 0)
                .ok_or_else(|| bad_datestamp(value))?
                .and_utc();
            return Ok(Self {
                instant,
                granularity: Granularity::Day,
            });
        }

        if SECOND_PATTERN.is_match(value) {
            let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%SZ")
                .map_err(|_| bad_datestamp(value))?;
            return Ok(Self {
                instant: naive.and_utc(),
                granularity: Granularity::Second,
            });
        }

        Err(bad_datestamp(value))
    }

    /// The inclusive upper bound this datestamp expresses as an `until`
    /// argument: day granularity covers the whole day.
    #[must_use]
    pub fn upper_bound(&self) -> DateTime<Utc> {
        match self.granularity {
            Granularity::Day => self.instant + chrono::Duration::seconds(86_399),
            Granularity::Second => self.instant,
        }
    }
}

fn bad_datestamp(value: &str) -> OaiError {
    OaiError::BadArgument(format!(
        "'{value}' is not a valid datestamp (expected YYYY-MM-DD or YYYY-MM-DDThh:mm:ssZ)"
    ))
}

/// Format an instant as a second-granularity protocol datestamp.
#[must_use]
pub fn format_datestamp(instant: &DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// One row of an item's internal metadata document.
///
/// The canonical shape is schema-agnostic: `schema.element.qualifier` keys
/// with an optional language tag, matching the repository's flat metadata
/// value rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    /// Metadata schema short name (e.g. "dc").
    pub schema: String,

    /// Element name within the schema (e.g. "title").
    pub element: String,

    /// Optional qualifier (e.g. "issued" on "date").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,

    /// Optional ISO language tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// The field value.
    pub value: String,
}

impl MetadataEntry {
    /// Create an unqualified entry.
    #[must_use]
    pub fn new(
        schema: impl Into<String>,
        element: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            element: element.into(),
            qualifier: None,
            language: None,
            value: value.into(),
        }
    }

    /// Attach a qualifier.
    #[must_use]
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Attach a language tag.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// An item's canonical internal metadata document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    /// Flat list of metadata rows, in repository order.
    pub entries: Vec<MetadataEntry>,
}

impl MetadataDocument {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry.
    pub fn push(&mut self, entry: MetadataEntry) {
        self.entries.push(entry);
    }

    /// All entries for a schema.element pair, any qualifier.
    pub fn element<'a>(
        &'a self,
        schema: &'a str,
        element: &'a str,
    ) -> impl Iterator<Item = &'a MetadataEntry> {
        self.entries
            .iter()
            .filter(move |e| e.schema == schema && e.element == element)
    }

    /// Values for an exact schema.element.qualifier key.
    pub fn values<'a>(
        &'a self,
        schema: &'a str,
        element: &'a str,
        qualifier: Option<&'a str>,
    ) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |e| {
                e.schema == schema && e.element == element && e.qualifier.as_deref() == qualifier
            })
            .map(|e| e.value.as_str())
    }

    /// Whether the document has no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read-only projection of an archived item, as reported by the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Internal repository identifier (e.g. "123456789/42"). Stable,
    /// globally unique, never contains `_` (set specs depend on it).
    pub identifier: String,

    /// Last-modified instant used as the OAI datestamp.
    pub datestamp: DateTime<Utc>,

    /// Specs of every set the item belongs to, including ancestor
    /// community sets.
    pub sets: Vec<String>,

    /// Tombstone flag: the item was withdrawn but remains indexed.
    pub deleted: bool,

    /// The canonical internal metadata document. Empty for tombstones.
    pub metadata: MetadataDocument,
}

impl Item {
    /// Create a live item with the given metadata.
    #[must_use]
    pub fn new(
        identifier: impl Into<String>,
        datestamp: DateTime<Utc>,
        metadata: MetadataDocument,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            datestamp,
            sets: Vec::new(),
            deleted: false,
            metadata,
        }
    }

    /// Create a tombstone for a withdrawn item.
    #[must_use]
    pub fn tombstone(identifier: impl Into<String>, datestamp: DateTime<Utc>) -> Self {
        Self {
            identifier: identifier.into(),
            datestamp,
            sets: Vec::new(),
            deleted: true,
            metadata: MetadataDocument::new(),
        }
    }

    /// Assign set membership.
    #[must_use]
    pub fn with_sets(mut self, sets: Vec<String>) -> Self {
        self.sets = sets;
        self
    }
}

/// An OAI set derived from a community or collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Set {
    /// Unique, stable set spec (`col_...` or `com_...`).
    pub spec: String,

    /// Human-readable name.
    pub name: String,

    /// Optional free-text description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The six OAI-PMH 2.0 verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// Repository self-description.
    Identify,
    /// Enumerate supported metadata formats.
    ListMetadataFormats,
    /// Enumerate the set hierarchy.
    ListSets,
    /// Harvest headers only.
    ListIdentifiers,
    /// Harvest full records.
    ListRecords,
    /// Fetch a single record.
    GetRecord,
}

impl Verb {
    /// The wire name of the verb.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identify => "Identify",
            Self::ListMetadataFormats => "ListMetadataFormats",
            Self::ListSets => "ListSets",
            Self::ListIdentifiers => "ListIdentifiers",
            Self::ListRecords => "ListRecords",
            Self::GetRecord => "GetRecord",
        }
    }

    /// Parse a wire verb name. Case-sensitive, as required by the protocol.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Identify" => Some(Self::Identify),
            "ListMetadataFormats" => Some(Self::ListMetadataFormats),
            "ListSets" => Some(Self::ListSets),
            "ListIdentifiers" => Some(Self::ListIdentifiers),
            "ListRecords" => Some(Self::ListRecords),
            "GetRecord" => Some(Self::GetRecord),
            _ => None,
        }
    }
}

/// The validated, normalized filter set of a harvest.
///
/// Constructed once, either from fresh arguments or from a decoded
/// resumption token, and immutable afterwards; this is the only state that
/// round-trips between pages. Filter values are kept as the raw argument
/// strings so a token re-encodes byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    /// The verb this harvest belongs to.
    pub verb: Verb,

    /// Requested output format. `None` only for `ListSets`.
    pub metadata_prefix: Option<String>,

    /// Set spec filter.
    pub set: Option<String>,

    /// Lower datestamp bound, raw argument form.
    pub from: Option<String>,

    /// Upper datestamp bound, raw argument form.
    pub until: Option<String>,
}

impl QuerySpec {
    /// The spec of a fresh `ListSets` harvest (no filters apply).
    #[must_use]
    pub fn list_sets() -> Self {
        Self {
            verb: Verb::ListSets,
            metadata_prefix: None,
            set: None,
            from: None,
            until: None,
        }
    }
}

/// Pagination cursor carried through resumption tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Number of entries already consumed; the next page starts here.
    pub offset: usize,

    /// Complete list size captured when the first page was produced and
    /// frozen for the rest of the harvest.
    pub total: usize,
}
