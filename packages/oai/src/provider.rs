//! The provider service: ties dispatcher, index, crosswalks and assembler
//! together into a single request handler.
//!
//! `Provider` is constructed once at startup and shared across requests;
//! every call is stateless: harvest position round-trips through the
//! resumption token, never through the process.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::RepositoryConfig;
use crate::dispatch::{self, ValidatedRequest};
use crate::error::{OaiError, ProviderError, RequestError};
use crate::formats::FormatRegistry;
use crate::index::{ItemIndex, ItemQuery};
use crate::response::{Assembler, RenderedRecord, TokenInfo};
use crate::sets::SetResolver;
use crate::token;
use crate::types::{Cursor, Item, QuerySpec, Verb};

/// The OAI-PMH data provider.
pub struct Provider {
    config: RepositoryConfig,
    formats: FormatRegistry,
    index: Arc<dyn ItemIndex>,
}

impl Provider {
    /// Create a provider over a validated configuration.
    ///
    /// # Errors
    /// [`ProviderError::Config`] when the configuration is unusable or no
    /// metadata format is registered.
    pub fn new(
        config: RepositoryConfig,
        formats: FormatRegistry,
        index: Arc<dyn ItemIndex>,
    ) -> Result<Self, ProviderError> {
        config.validate()?;
        if formats.is_empty() {
            return Err(ProviderError::Config(
                "at least one metadata format must be registered".to_string(),
            ));
        }
        Ok(Self {
            config,
            formats,
            index,
        })
    }

    /// The repository configuration this provider serves.
    #[must_use]
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Handle one protocol request.
    ///
    /// Returns the complete response document; protocol errors are rendered
    /// into the envelope. `Err` is reserved for infrastructure failures the
    /// shell should answer with a 5xx.
    pub fn handle(&self, params: &HashMap<String, String>) -> Result<String, ProviderError> {
        tracing::info!(
            verb = params.get("verb").map(String::as_str).unwrap_or("-"),
            identifier = params.get("identifier").map(String::as_str),
            metadata_prefix = params.get("metadataPrefix").map(String::as_str),
            set = params.get("set").map(String::as_str),
            from = params.get("from").map(String::as_str),
            until = params.get("until").map(String::as_str),
            has_token = params.contains_key("resumptionToken"),
            "oai request"
        );

        match self.dispatch(params) {
            Ok(document) => Ok(document),
            Err(RequestError::Protocol(error)) => {
                tracing::debug!(code = error.code(), error = %error, "oai protocol error");
                Assembler::new(&self.config).error(params, &error)
            }
            Err(RequestError::Index(error)) => {
                tracing::error!(error = %error, "index failure during oai request");
                Err(ProviderError::Index(error))
            }
        }
    }

    fn dispatch(&self, params: &HashMap<String, String>) -> Result<String, RequestError> {
        let assembler = Assembler::new(&self.config);
        match dispatch::validate(params, &self.formats)? {
            ValidatedRequest::Identify => Ok(assembler.identify(params).map_err(serialize)?),

            ValidatedRequest::ListMetadataFormats { identifier } => {
                self.list_metadata_formats(params, identifier.as_deref())
            }

            ValidatedRequest::GetRecord {
                identifier,
                metadata_prefix,
            } => self.get_record(params, &identifier, &metadata_prefix),

            ValidatedRequest::ListSets { cursor } => self.list_sets(params, cursor),

            ValidatedRequest::Harvest { spec, cursor } => self.harvest(params, &spec, cursor),
        }
    }

    fn list_metadata_formats(
        &self,
        params: &HashMap<String, String>,
        identifier: Option<&str>,
    ) -> Result<String, RequestError> {
        let formats = match identifier {
            None => self.formats.formats().collect::<Vec<_>>(),
            Some(wire_id) => {
                let item = self.lookup_item(wire_id)?;
                if item.deleted {
                    return Err(OaiError::NoMetadataFormats(wire_id.to_string()).into());
                }
                let formats = self.formats.formats_for(&item);
                if formats.is_empty() {
                    return Err(OaiError::NoMetadataFormats(wire_id.to_string()).into());
                }
                formats
            }
        };
        Ok(Assembler::new(&self.config)
            .list_metadata_formats(params, &formats)
            .map_err(serialize)?)
    }

    fn get_record(
        &self,
        params: &HashMap<String, String>,
        identifier: &str,
        metadata_prefix: &str,
    ) -> Result<String, RequestError> {
        let item = self.lookup_item(identifier)?;

        let record = if item.deleted {
            if !self.config.deleted_record.tracks_deletions() {
                // Tombstones are invisible when deletions are not tracked.
                return Err(OaiError::IdDoesNotExist(identifier.to_string()).into());
            }
            RenderedRecord {
                item,
                metadata: None,
            }
        } else {
            let crosswalk = self
                .formats
                .crosswalk(metadata_prefix)
                .ok_or_else(|| OaiError::CannotDisseminateFormat(metadata_prefix.to_string()))?;
            if !crosswalk.is_available_for(&item) {
                return Err(
                    OaiError::CannotDisseminateFormat(metadata_prefix.to_string()).into(),
                );
            }
            let metadata = crosswalk.render(&item).map_err(|error| {
                tracing::warn!(
                    identifier = %item.identifier,
                    format = metadata_prefix,
                    error = %error,
                    "crosswalk failed"
                );
                OaiError::CannotDisseminateFormat(metadata_prefix.to_string())
            })?;
            RenderedRecord {
                item,
                metadata: Some(metadata),
            }
        };

        Ok(Assembler::new(&self.config)
            .get_record(params, &record)
            .map_err(serialize)?)
    }

    fn list_sets(
        &self,
        params: &HashMap<String, String>,
        cursor: Option<Cursor>,
    ) -> Result<String, RequestError> {
        let tree = self.index.set_tree()?;
        let resolver = SetResolver::from_tree(&tree);
        if resolver.total() == 0 {
            return Err(OaiError::NoSetHierarchy.into());
        }

        let offset = cursor.map_or(0, |c| c.offset);
        let page = resolver.page(offset, self.config.max_sets_per_page);
        if page.sets.is_empty() {
            // The hierarchy shrank below the cursor; the token no longer
            // names a reachable position.
            return Err(OaiError::BadResumptionToken.into());
        }

        // completeListSize is frozen at the first page of the harvest.
        let total = cursor.map_or(page.total, |c| c.total);
        let token_info = if page.has_more {
            Some(TokenInfo {
                token: token::encode(
                    &QuerySpec::list_sets(),
                    &Cursor {
                        offset: offset + page.sets.len(),
                        total,
                    },
                ),
                complete_list_size: total,
                cursor: offset,
            })
        } else if cursor.is_some() {
            Some(TokenInfo {
                token: String::new(),
                complete_list_size: total,
                cursor: offset,
            })
        } else {
            None
        };

        Ok(Assembler::new(&self.config)
            .list_sets(params, &page.sets, token_info.as_ref())
            .map_err(serialize)?)
    }

    fn harvest(
        &self,
        params: &HashMap<String, String>,
        spec: &QuerySpec,
        cursor: Option<Cursor>,
    ) -> Result<String, RequestError> {
        let query = ItemQuery::from_spec(spec, &self.config)?;
        let offset = cursor.map_or(0, |c| c.offset);
        let page = self
            .index
            .query_items(&query, offset, self.config.max_records_per_page)?;

        if page.items.is_empty() {
            return Err(OaiError::NoRecordsMatch.into());
        }

        let prefix = spec
            .metadata_prefix
            .as_deref()
            .ok_or(OaiError::BadResumptionToken)?;
        let crosswalk = self
            .formats
            .crosswalk(prefix)
            .ok_or_else(|| OaiError::CannotDisseminateFormat(prefix.to_string()))?;

        let fetched = page.items.len();
        // completeListSize is frozen at the first page; whether more pages
        // exist follows the index's current knowledge, so a grown dataset
        // still harvests to the end.
        let total = cursor.map_or(page.total, |c| c.total);
        let has_more = offset + fetched < page.total;

        let token_info = if has_more {
            Some(TokenInfo {
                token: token::encode(
                    spec,
                    &Cursor {
                        offset: offset + fetched,
                        total,
                    },
                ),
                complete_list_size: total,
                cursor: offset,
            })
        } else if cursor.is_some() {
            Some(TokenInfo {
                token: String::new(),
                complete_list_size: total,
                cursor: offset,
            })
        } else {
            None
        };

        let assembler = Assembler::new(&self.config);
        match spec.verb {
            Verb::ListIdentifiers => {
                let items: Vec<Item> = page
                    .items
                    .into_iter()
                    .filter(|item| item.deleted || crosswalk.is_available_for(item))
                    .collect();
                Ok(assembler
                    .list_identifiers(params, &items, token_info.as_ref())
                    .map_err(serialize)?)
            }
            Verb::ListRecords => {
                let mut records = Vec::with_capacity(page.items.len());
                for item in page.items {
                    if item.deleted {
                        records.push(RenderedRecord {
                            item,
                            metadata: None,
                        });
                        continue;
                    }
                    if !crosswalk.is_available_for(&item) {
                        tracing::debug!(
                            identifier = %item.identifier,
                            format = prefix,
                            "item not disseminable in requested format, skipped"
                        );
                        continue;
                    }
                    match crosswalk.render(&item) {
                        Ok(metadata) => records.push(RenderedRecord {
                            item,
                            metadata: Some(metadata),
                        }),
                        Err(error) => {
                            // Degrade per item; the rest of the page stands.
                            tracing::warn!(
                                identifier = %item.identifier,
                                format = prefix,
                                error = %error,
                                "crosswalk failed, record skipped"
                            );
                        }
                    }
                }
                Ok(assembler
                    .list_records(params, &records, token_info.as_ref())
                    .map_err(serialize)?)
            }
            // Dispatch only produces harvest requests for the list verbs.
            _ => Err(OaiError::BadVerb(spec.verb.as_str().to_string()).into()),
        }
    }

    /// Resolve a wire identifier to an indexed item.
    fn lookup_item(&self, wire_id: &str) -> Result<Item, RequestError> {
        let internal = self
            .config
            .parse_oai_identifier(wire_id)
            .ok_or_else(|| OaiError::IdDoesNotExist(wire_id.to_string()))?;
        let item = self
            .index
            .get_item(internal)?
            .ok_or_else(|| OaiError::IdDoesNotExist(wire_id.to_string()))?;
        Ok(item)
    }
}

/// Map an assembler failure into the handler error union.
///
/// Serialization problems are infrastructure, not protocol; they surface
/// through [`Provider::handle`] as [`ProviderError`].
fn serialize(error: ProviderError) -> RequestError {
    match error {
        ProviderError::Index(e) => RequestError::Index(e),
        // Config and serialization failures cannot be expressed to the
        // harvester as protocol errors; report the index as unavailable so
        // the shell answers 5xx.
        other => RequestError::Index(crate::error::IndexError::Unavailable(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::index::MemoryIndex;
    use crate::sets::SetSource;
    use crate::types::{Datestamp, MetadataDocument, MetadataEntry};

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn doc(title: &str) -> MetadataDocument {
        let mut doc = MetadataDocument::new();
        doc.push(MetadataEntry::new("dc", "title", title));
        doc
    }

    fn sample_provider() -> Provider {
        let mut index = MemoryIndex::new();
        index.add_collection(SetSource::new("123456789/2", "Theses"));
        index.add_item(
            Item::new(
                "123456789/4",
                Datestamp::parse("2024-02-01").unwrap().instant,
                doc("Four"),
            )
            .with_sets(vec!["col_123456789_2".to_string()]),
        );
        index.add_item(Item::tombstone(
            "123456789/5",
            Datestamp::parse("2024-02-15").unwrap().instant,
        ));
        Provider::new(
            test_config(),
            FormatRegistry::with_defaults(),
            Arc::new(index),
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = test_config();
        config.admin_emails.clear();
        let result = Provider::new(
            config,
            FormatRegistry::with_defaults(),
            Arc::new(MemoryIndex::new()),
        );
        assert!(matches!(result, Err(ProviderError::Config(_))));
    }

    #[test]
    fn test_new_rejects_empty_format_registry() {
        let result = Provider::new(
            test_config(),
            FormatRegistry::new(),
            Arc::new(MemoryIndex::new()),
        );
        assert!(matches!(result, Err(ProviderError::Config(_))));
    }

    #[test]
    fn test_protocol_errors_are_rendered_not_returned() {
        let provider = sample_provider();
        let xml = provider
            .handle(&params(&[("verb", "Frobnicate")]))
            .unwrap();
        assert!(xml.contains("<error code=\"badVerb\">"));
    }

    #[test]
    fn test_get_record_success() {
        let provider = sample_provider();
        let xml = provider
            .handle(&params(&[
                ("verb", "GetRecord"),
                ("identifier", "oai:depot.example.org:123456789/4"),
                ("metadataPrefix", "oai_dc"),
            ]))
            .unwrap();
        assert!(xml.contains("<dc:title>Four</dc:title>"));
        assert!(xml.contains("<identifier>oai:depot.example.org:123456789/4</identifier>"));
    }

    #[test]
    fn test_get_record_unknown_identifier() {
        let provider = sample_provider();
        let xml = provider
            .handle(&params(&[
                ("verb", "GetRecord"),
                ("identifier", "oai:depot.example.org:123456789/99"),
                ("metadataPrefix", "oai_dc"),
            ]))
            .unwrap();
        assert!(xml.contains("<error code=\"idDoesNotExist\">"));
    }

    #[test]
    fn test_get_record_foreign_identifier() {
        let provider = sample_provider();
        let xml = provider
            .handle(&params(&[
                ("verb", "GetRecord"),
                ("identifier", "oai:other.example.org:123456789/4"),
                ("metadataPrefix", "oai_dc"),
            ]))
            .unwrap();
        assert!(xml.contains("<error code=\"idDoesNotExist\">"));
    }

    #[test]
    fn test_get_record_deleted_item_is_a_stub() {
        let provider = sample_provider();
        let xml = provider
            .handle(&params(&[
                ("verb", "GetRecord"),
                ("identifier", "oai:depot.example.org:123456789/5"),
                ("metadataPrefix", "oai_dc"),
            ]))
            .unwrap();
        assert!(xml.contains("<header status=\"deleted\">"));
        assert!(!xml.contains("<metadata>"));
    }

    #[test]
    fn test_list_metadata_formats_for_repository_and_item() {
        let provider = sample_provider();

        let xml = provider
            .handle(&params(&[("verb", "ListMetadataFormats")]))
            .unwrap();
        assert!(xml.contains("<metadataPrefix>oai_dc</metadataPrefix>"));
        assert!(xml.contains("<metadataPrefix>qdc</metadataPrefix>"));

        let xml = provider
            .handle(&params(&[
                ("verb", "ListMetadataFormats"),
                ("identifier", "oai:depot.example.org:123456789/4"),
            ]))
            .unwrap();
        assert!(xml.contains("<metadataPrefix>oai_dc</metadataPrefix>"));
    }

    #[test]
    fn test_list_metadata_formats_for_deleted_item() {
        let provider = sample_provider();
        let xml = provider
            .handle(&params(&[
                ("verb", "ListMetadataFormats"),
                ("identifier", "oai:depot.example.org:123456789/5"),
            ]))
            .unwrap();
        assert!(xml.contains("<error code=\"noMetadataFormats\">"));
    }

    #[test]
    fn test_list_sets_without_hierarchy() {
        let provider = Provider::new(
            test_config(),
            FormatRegistry::with_defaults(),
            Arc::new(MemoryIndex::new()),
        )
        .unwrap();
        let xml = provider.handle(&params(&[("verb", "ListSets")])).unwrap();
        assert!(xml.contains("<error code=\"noSetHierarchy\">"));
    }

    #[test]
    fn test_list_records_no_matches() {
        let provider = sample_provider();
        let xml = provider
            .handle(&params(&[
                ("verb", "ListRecords"),
                ("metadataPrefix", "oai_dc"),
                ("from", "2030-01-01"),
            ]))
            .unwrap();
        assert!(xml.contains("<error code=\"noRecordsMatch\">"));
    }

    #[test]
    fn test_index_failure_is_not_a_protocol_error() {
        struct FailingIndex;

        impl ItemIndex for FailingIndex {
            fn get_item(
                &self,
                _identifier: &str,
            ) -> Result<Option<Item>, crate::error::IndexError> {
                Err(crate::error::IndexError::Timeout(5000))
            }

            fn query_items(
                &self,
                _query: &ItemQuery,
                _offset: usize,
                _limit: usize,
            ) -> Result<crate::index::ItemPage, crate::error::IndexError> {
                Err(crate::error::IndexError::Timeout(5000))
            }

            fn set_tree(&self) -> Result<crate::sets::SetTree, crate::error::IndexError> {
                Err(crate::error::IndexError::Unavailable("down".to_string()))
            }
        }

        let provider = Provider::new(
            test_config(),
            FormatRegistry::with_defaults(),
            Arc::new(FailingIndex),
        )
        .unwrap();

        let result = provider.handle(&params(&[
            ("verb", "ListRecords"),
            ("metadataPrefix", "oai_dc"),
        ]));
        assert!(matches!(result, Err(ProviderError::Index(_))));
    }
}
