//! Response assembly: the OAI-PMH XML envelope.
//!
//! Every response, success or protocol error, is a complete `OAI-PMH`
//! document with a `responseDate`, an echo of the request, and either the
//! verb payload or an `<error>` element. Per OAI-PMH 2.0 §3.2, responses to
//! requests that failed verb/argument validation echo no attributes.

use std::collections::HashMap;

use chrono::Utc;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::config::{RepositoryConfig, OAI_PROTOCOL_VERSION};
use crate::crosswalk::{DC_NAMESPACE, OAI_DC_NAMESPACE, OAI_DC_SCHEMA, XSI_NAMESPACE};
use crate::error::{OaiError, ProviderError};
use crate::formats::MetadataFormat;
use crate::types::{format_datestamp, Granularity, Item, Set};
use crate::xml::{close_element, into_string, open_element, raw_fragment, text_element, text_element_with_attrs};

/// Namespace of the OAI-PMH envelope.
pub const OAI_NAMESPACE: &str = "http://www.openarchives.org/OAI/2.0/";

/// Schema location of the OAI-PMH envelope.
pub const OAI_SCHEMA: &str = "http://www.openarchives.org/OAI/2.0/OAI-PMH.xsd";

const OAI_IDENTIFIER_NAMESPACE: &str = "http://www.openarchives.org/OAI/2.0/oai-identifier";
const OAI_IDENTIFIER_SCHEMA: &str = "http://www.openarchives.org/OAI/2.0/oai-identifier.xsd";

/// Protocol arguments echoed as request attributes, in canonical order.
const ECHO_ARGUMENTS: [&str; 6] = [
    "identifier",
    "metadataPrefix",
    "from",
    "until",
    "set",
    "resumptionToken",
];

/// An item rendered for output: `metadata` is `None` for deleted stubs.
#[derive(Debug, Clone)]
pub struct RenderedRecord {
    /// The item (header source).
    pub item: Item,

    /// Crosswalk output, absent for tombstones.
    pub metadata: Option<String>,
}

/// Data for the `<resumptionToken>` element.
///
/// An empty `token` value renders the explicitly empty element that tells
/// the harvester the list is complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    /// Token for the next page, or empty on the final page.
    pub token: String,

    /// Complete list size, frozen at the first page of the harvest.
    pub complete_list_size: usize,

    /// Number of entries returned before this page.
    pub cursor: usize,
}

/// Builds complete response documents for one repository.
pub struct Assembler<'a> {
    config: &'a RepositoryConfig,
}

impl<'a> Assembler<'a> {
    /// Create an assembler over the repository configuration.
    #[must_use]
    pub fn new(config: &'a RepositoryConfig) -> Self {
        Self { config }
    }

    /// A protocol error response.
    pub fn error(
        &self,
        params: &HashMap<String, String>,
        error: &OaiError,
    ) -> Result<String, ProviderError> {
        let echo = !error.suppresses_request_echo();
        self.envelope(params, echo, |w| {
            text_element_with_attrs(w, "error", &[("code", error.code())], &error.to_string())
        })
    }

    /// The `Identify` response.
    pub fn identify(&self, params: &HashMap<String, String>) -> Result<String, ProviderError> {
        self.envelope(params, true, |w| {
            open_element(w, "Identify", &[])?;
            text_element(w, "repositoryName", &self.config.repository_name)?;
            text_element(w, "baseURL", &self.config.base_url)?;
            text_element(w, "protocolVersion", OAI_PROTOCOL_VERSION)?;
            for email in &self.config.admin_emails {
                text_element(w, "adminEmail", email)?;
            }
            text_element(
                w,
                "earliestDatestamp",
                &format_datestamp(&self.config.earliest_datestamp),
            )?;
            text_element(w, "deletedRecord", self.config.deleted_record.as_str())?;
            text_element(w, "granularity", Granularity::Second.as_str())?;

            open_element(w, "description", &[])?;
            open_element(
                w,
                "oai-identifier",
                &[
                    ("xmlns", OAI_IDENTIFIER_NAMESPACE),
                    ("xmlns:xsi", XSI_NAMESPACE),
                    (
                        "xsi:schemaLocation",
                        &format!("{OAI_IDENTIFIER_NAMESPACE} {OAI_IDENTIFIER_SCHEMA}"),
                    ),
                ],
            )?;
            text_element(w, "scheme", "oai")?;
            text_element(w, "repositoryIdentifier", &self.config.identifier_host)?;
            text_element(w, "delimiter", ":")?;
            text_element(w, "sampleIdentifier", &self.config.sample_identifier())?;
            close_element(w, "oai-identifier")?;
            close_element(w, "description")?;

            close_element(w, "Identify")
        })
    }

    /// The `ListMetadataFormats` response.
    pub fn list_metadata_formats(
        &self,
        params: &HashMap<String, String>,
        formats: &[&MetadataFormat],
    ) -> Result<String, ProviderError> {
        self.envelope(params, true, |w| {
            open_element(w, "ListMetadataFormats", &[])?;
            for format in formats {
                open_element(w, "metadataFormat", &[])?;
                text_element(w, "metadataPrefix", &format.prefix)?;
                text_element(w, "schema", &format.schema)?;
                text_element(w, "metadataNamespace", &format.namespace)?;
                close_element(w, "metadataFormat")?;
            }
            close_element(w, "ListMetadataFormats")
        })
    }

    /// The `GetRecord` response.
    pub fn get_record(
        &self,
        params: &HashMap<String, String>,
        record: &RenderedRecord,
    ) -> Result<String, ProviderError> {
        self.envelope(params, true, |w| {
            open_element(w, "GetRecord", &[])?;
            self.write_record(w, record)?;
            close_element(w, "GetRecord")
        })
    }

    /// The `ListRecords` response.
    pub fn list_records(
        &self,
        params: &HashMap<String, String>,
        records: &[RenderedRecord],
        token: Option<&TokenInfo>,
    ) -> Result<String, ProviderError> {
        self.envelope(params, true, |w| {
            open_element(w, "ListRecords", &[])?;
            for record in records {
                self.write_record(w, record)?;
            }
            write_token(w, token)?;
            close_element(w, "ListRecords")
        })
    }

    /// The `ListIdentifiers` response.
    pub fn list_identifiers(
        &self,
        params: &HashMap<String, String>,
        items: &[Item],
        token: Option<&TokenInfo>,
    ) -> Result<String, ProviderError> {
        self.envelope(params, true, |w| {
            open_element(w, "ListIdentifiers", &[])?;
            for item in items {
                self.write_header(w, item)?;
            }
            write_token(w, token)?;
            close_element(w, "ListIdentifiers")
        })
    }

    /// The `ListSets` response.
    pub fn list_sets(
        &self,
        params: &HashMap<String, String>,
        sets: &[Set],
        token: Option<&TokenInfo>,
    ) -> Result<String, ProviderError> {
        self.envelope(params, true, |w| {
            open_element(w, "ListSets", &[])?;
            for set in sets {
                open_element(w, "set", &[])?;
                text_element(w, "setSpec", &set.spec)?;
                text_element(w, "setName", &set.name)?;
                if let Some(description) = &set.description {
                    open_element(w, "setDescription", &[])?;
                    open_element(
                        w,
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
                    text_element(w, "dc:description", description)?;
                    close_element(w, "oai_dc:dc")?;
                    close_element(w, "setDescription")?;
                }
                close_element(w, "set")?;
            }
            write_token(w, token)?;
            close_element(w, "ListSets")
        })
    }

    /// Write the shared envelope around a verb payload.
    fn envelope<F>(
        &self,
        params: &HashMap<String, String>,
        echo_attributes: bool,
        body: F,
    ) -> Result<String, ProviderError>
    where
        F: FnOnce(&mut Writer<Vec<u8>>) -> Result<(), quick_xml::Error>,
    {
        let mut writer = Writer::new(Vec::new());

        let write = |w: &mut Writer<Vec<u8>>| -> Result<(), quick_xml::Error> {
            w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
            open_element(
                w,
                "OAI-PMH",
                &[
                    ("xmlns", OAI_NAMESPACE),
                    ("xmlns:xsi", XSI_NAMESPACE),
                    ("xsi:schemaLocation", &format!("{OAI_NAMESPACE} {OAI_SCHEMA}")),
                ],
            )?;
            text_element(w, "responseDate", &format_datestamp(&Utc::now()))?;

            let mut request = BytesStart::new("request");
            if echo_attributes {
                if let Some(verb) = params.get("verb") {
                    request.push_attribute(("verb", verb.as_str()));
                }
                for key in ECHO_ARGUMENTS {
                    if let Some(value) = params.get(key) {
                        request.push_attribute((key, value.as_str()));
                    }
                }
            }
            w.write_event(Event::Start(request))?;
            w.write_event(Event::Text(BytesText::new(&self.config.base_url)))?;
            w.write_event(Event::End(BytesEnd::new("request")))?;

            body(w)?;
            close_element(w, "OAI-PMH")
        };

        write(&mut writer)?;
        Ok(into_string(writer))
    }

    /// Write a `<header>`, with the deleted status where applicable.
    fn write_header(
        &self,
        w: &mut Writer<Vec<u8>>,
        item: &Item,
    ) -> Result<(), quick_xml::Error> {
        let mut start = BytesStart::new("header");
        if item.deleted {
            start.push_attribute(("status", "deleted"));
        }
        w.write_event(Event::Start(start))?;
        text_element(w, "identifier", &self.config.oai_identifier(&item.identifier))?;
        text_element(w, "datestamp", &format_datestamp(&item.datestamp))?;
        for set in &item.sets {
            text_element(w, "setSpec", set)?;
        }
        close_element(w, "header")
    }

    /// Write a `<record>`: header plus metadata, or a deleted stub.
    fn write_record(
        &self,
        w: &mut Writer<Vec<u8>>,
        record: &RenderedRecord,
    ) -> Result<(), quick_xml::Error> {
        open_element(w, "record", &[])?;
        self.write_header(w, &record.item)?;
        if let Some(metadata) = &record.metadata {
            open_element(w, "metadata", &[])?;
            raw_fragment(w, metadata)?;
            close_element(w, "metadata")?;
        }
        close_element(w, "record")
    }
}

/// Write the `<resumptionToken>` element, if the harvest is paginated.
fn write_token(
    w: &mut Writer<Vec<u8>>,
    token: Option<&TokenInfo>,
) -> Result<(), quick_xml::Error> {
    let Some(info) = token else {
        return Ok(());
    };
    let mut start = BytesStart::new("resumptionToken");
    let size = info.complete_list_size.to_string();
    let cursor = info.cursor.to_string();
    start.push_attribute(("completeListSize", size.as_str()));
    start.push_attribute(("cursor", cursor.as_str()));
    if info.token.is_empty() {
        // Explicitly empty: the harvest is complete.
        w.write_event(Event::Empty(start))
    } else {
        w.write_event(Event::Start(start))?;
        w.write_event(Event::Text(BytesText::new(&info.token)))?;
        w.write_event(Event::End(BytesEnd::new("resumptionToken")))
    }
}
