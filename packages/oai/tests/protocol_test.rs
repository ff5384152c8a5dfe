//! End-to-end protocol tests for the OAI-PMH provider.
//!
//! Drives complete verb requests against an in-memory index and asserts on
//! the produced envelopes, including the pagination walk a real harvester
//! performs with resumption tokens.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use depot_oai::config::{test_config, DeletedRecordPolicy};
use depot_oai::error::IndexError;
use depot_oai::index::{ItemIndex, ItemPage, ItemQuery};
use depot_oai::sets::{SetSource, SetTree};
use depot_oai::types::{Datestamp, MetadataDocument, MetadataEntry};
use depot_oai::{FormatRegistry, Item, MemoryIndex, Provider, RepositoryConfig};

const OAI_NS: &str = "http://www.openarchives.org/OAI/2.0/";

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn doc(title: &str) -> MetadataDocument {
    let mut doc = MetadataDocument::new();
    doc.push(MetadataEntry::new("dc", "title", title));
    doc.push(MetadataEntry::new("dc", "creator", "Tester, Example"));
    doc
}

fn stamp(s: &str) -> chrono::DateTime<chrono::Utc> {
    Datestamp::parse(s).unwrap().instant
}

/// Repository from the specification example: col_A holds 3 items, col_B
/// holds 1, plus a tombstone outside both sets.
fn example_index() -> MemoryIndex {
    let mut index = MemoryIndex::new();
    index.add_collection(SetSource::new("123456789/2", "Collection A"));
    index.add_collection(SetSource::new("123456789/3", "Collection B"));

    let col_a = vec!["col_123456789_2".to_string()];
    let col_b = vec!["col_123456789_3".to_string()];

    index.add_item(Item::new("123456789/10", stamp("2024-01-05"), doc("A one")).with_sets(col_a.clone()));
    index.add_item(Item::new("123456789/11", stamp("2024-01-06"), doc("A two")).with_sets(col_a.clone()));
    index.add_item(Item::new("123456789/12", stamp("2024-01-07"), doc("A three")).with_sets(col_a));
    index.add_item(Item::new("123456789/20", stamp("2024-02-01"), doc("B one")).with_sets(col_b));
    index.add_item(Item::tombstone("123456789/30", stamp("2024-03-01")));
    index
}

fn provider_with(config: RepositoryConfig, index: MemoryIndex) -> Provider {
    Provider::new(config, FormatRegistry::with_defaults(), Arc::new(index)).unwrap()
}

fn example_provider(page_size: usize) -> Provider {
    let mut config = test_config();
    config.max_records_per_page = page_size;
    provider_with(config, example_index())
}

/// Header identifiers of a list response, in document order.
fn header_identifiers(xml: &str) -> Vec<String> {
    let doc = roxmltree::Document::parse(xml).expect("well-formed response");
    doc.descendants()
        .filter(|n| n.has_tag_name((OAI_NS, "header")))
        .filter_map(|h| {
            h.children()
                .find(|c| c.has_tag_name((OAI_NS, "identifier")))
                .and_then(|n| n.text())
                .map(String::from)
        })
        .collect()
}

/// The resumption token element: (text, completeListSize), if present.
fn resumption_token(xml: &str) -> Option<(Option<String>, Option<String>)> {
    let doc = roxmltree::Document::parse(xml).expect("well-formed response");
    doc.descendants()
        .find(|n| n.has_tag_name((OAI_NS, "resumptionToken")))
        .map(|n| {
            (
                n.text().map(String::from),
                n.attribute("completeListSize").map(String::from),
            )
        })
}

fn error_code(xml: &str) -> Option<String> {
    let doc = roxmltree::Document::parse(xml).expect("well-formed response");
    doc.descendants()
        .find(|n| n.has_tag_name((OAI_NS, "error")))
        .and_then(|n| n.attribute("code"))
        .map(String::from)
}

/// Walk a full harvest through successive resumption tokens.
fn walk_harvest(provider: &Provider, verb: &str, initial: &[(&str, &str)]) -> Vec<String> {
    let mut collected = Vec::new();
    let mut response = provider.handle(&params(initial)).unwrap();
    loop {
        collected.extend(header_identifiers(&response));
        match resumption_token(&response) {
            Some((Some(token), _)) if !token.is_empty() => {
                response = provider
                    .handle(&params(&[("verb", verb), ("resumptionToken", &token)]))
                    .unwrap();
            }
            _ => break,
        }
    }
    collected
}

#[test]
fn test_pagination_is_lossless_and_order_preserving() {
    // Walking page-by-page must yield exactly the identifiers of a single
    // unpaginated query, in the same order.
    let paged = example_provider(2);
    let unpaged = example_provider(100);

    for verb in ["ListRecords", "ListIdentifiers"] {
        let walked = walk_harvest(&paged, verb, &[("verb", verb), ("metadataPrefix", "oai_dc")]);
        let single = walk_harvest(&unpaged, verb, &[("verb", verb), ("metadataPrefix", "oai_dc")]);
        assert_eq!(walked, single, "verb {verb}");
        assert_eq!(walked.len(), 5, "verb {verb}: 4 live items + 1 tombstone");

        let mut sorted = walked.clone();
        sorted.sort();
        assert_eq!(walked, sorted, "identifier order is ascending");
    }
}

#[test]
fn test_example_scenario_from_specification() {
    // Sets: 2 sets, well under the page size, so no resumption token.
    let provider = example_provider(2);
    let xml = provider.handle(&params(&[("verb", "ListSets")])).unwrap();
    let doc = roxmltree::Document::parse(&xml).unwrap();
    let specs: Vec<_> = doc
        .descendants()
        .filter(|n| n.has_tag_name((OAI_NS, "setSpec")))
        .filter_map(|n| n.text())
        .collect();
    assert_eq!(specs, vec!["col_123456789_2", "col_123456789_3"]);
    assert!(resumption_token(&xml).is_none());

    // First page of col_A: 2 records plus a continuation token.
    let first = provider
        .handle(&params(&[
            ("verb", "ListRecords"),
            ("metadataPrefix", "oai_dc"),
            ("set", "col_123456789_2"),
        ]))
        .unwrap();
    assert_eq!(header_identifiers(&first).len(), 2);
    let (token, size) = resumption_token(&first).expect("token on first page");
    let token = token.expect("non-empty continuation token");
    assert_eq!(size.as_deref(), Some("3"));

    // Second page: the remaining record and an explicitly empty token.
    let second = provider
        .handle(&params(&[("verb", "ListRecords"), ("resumptionToken", &token)]))
        .unwrap();
    assert_eq!(
        header_identifiers(&second),
        vec!["oai:depot.example.org:123456789/12"]
    );
    let (token, size) = resumption_token(&second).expect("empty token on final page");
    assert!(token.is_none(), "final token element is empty");
    assert_eq!(size.as_deref(), Some("3"), "completeListSize frozen at 3");
}

#[test]
fn test_list_sets_pages_ceil_of_m_over_n() {
    // 5 sets with maxListSetsSize 2: exactly ceil(5/2) = 3 pages, the last
    // one carrying an empty resumption token.
    let mut index = MemoryIndex::new();
    for i in 1..=4 {
        index.add_collection(SetSource::new(format!("123456789/{i}"), format!("Col {i}")));
    }
    index.add_community(SetSource::new("123456789/1", "Root community"));

    let mut config = test_config();
    config.max_sets_per_page = 2;
    let provider = provider_with(config, index);

    let mut pages = 0;
    let mut seen = Vec::new();
    let mut response = provider.handle(&params(&[("verb", "ListSets")])).unwrap();
    loop {
        pages += 1;
        let doc = roxmltree::Document::parse(&response).unwrap();
        seen.extend(
            doc.descendants()
                .filter(|n| n.has_tag_name((OAI_NS, "setSpec")))
                .filter_map(|n| n.text().map(String::from)),
        );
        match resumption_token(&response) {
            Some((Some(token), _)) if !token.is_empty() => {
                response = provider
                    .handle(&params(&[("verb", "ListSets"), ("resumptionToken", &token)]))
                    .unwrap();
            }
            Some((None, _)) => break, // empty token: done
            other => panic!("expected a token element on every page, got {other:?}"),
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 5);
    assert!(seen.contains(&"com_123456789_1".to_string()));
}

/// Index wrapper counting harvest queries, to prove validation happens
/// before any backend work.
struct CountingIndex {
    inner: MemoryIndex,
    queries: AtomicUsize,
}

impl ItemIndex for CountingIndex {
    fn get_item(&self, identifier: &str) -> Result<Option<Item>, IndexError> {
        self.inner.get_item(identifier)
    }

    fn query_items(
        &self,
        query: &ItemQuery,
        offset: usize,
        limit: usize,
    ) -> Result<ItemPage, IndexError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query_items(query, offset, limit)
    }

    fn set_tree(&self) -> Result<SetTree, IndexError> {
        self.inner.set_tree()
    }
}

#[test]
fn test_invalid_arguments_never_reach_the_index() {
    let index = Arc::new(CountingIndex {
        inner: example_index(),
        queries: AtomicUsize::new(0),
    });
    let provider = Provider::new(
        test_config(),
        FormatRegistry::with_defaults(),
        Arc::clone(&index) as Arc<dyn ItemIndex>,
    )
    .unwrap();

    // metadataPrefix together with resumptionToken: badArgument, no query.
    let xml = provider
        .handle(&params(&[
            ("verb", "ListRecords"),
            ("metadataPrefix", "oai_dc"),
            ("resumptionToken", "v1/ListRecords/oai_dc////0/5"),
        ]))
        .unwrap();
    assert_eq!(error_code(&xml).as_deref(), Some("badArgument"));

    // Unknown argument, malformed dates, unknown prefix: same story.
    for bad in [
        vec![("verb", "ListRecords"), ("metadataPrefix", "oai_dc"), ("flavour", "x")],
        vec![("verb", "ListRecords"), ("metadataPrefix", "oai_dc"), ("from", "01-01-2024")],
        vec![("verb", "ListRecords"), ("metadataPrefix", "marc")],
        vec![("verb", "ListRecords")],
    ] {
        let xml = provider.handle(&params(&bad)).unwrap();
        assert!(error_code(&xml).is_some(), "request {bad:?} must fail");
    }

    assert_eq!(index.queries.load(Ordering::SeqCst), 0);
}

#[test]
fn test_corrupted_tokens_yield_bad_resumption_token() {
    let provider = example_provider(2);

    let first = provider
        .handle(&params(&[("verb", "ListRecords"), ("metadataPrefix", "oai_dc")]))
        .unwrap();
    let (Some(token), _) = resumption_token(&first).expect("continuation token") else {
        panic!("expected a non-empty token");
    };

    for corrupted in [
        token.replacen('/', "_", 1),
        format!("{token}/extra"),
        "v9/ListRecords/oai_dc////0/5".to_string(),
        "garbage".to_string(),
        String::new(),
    ] {
        let xml = provider
            .handle(&params(&[("verb", "ListRecords"), ("resumptionToken", &corrupted)]))
            .unwrap();
        assert_eq!(
            error_code(&xml).as_deref(),
            Some("badResumptionToken"),
            "token {corrupted:?}"
        );
    }
}

#[test]
fn test_get_record_deleted_returns_stub() {
    let provider = example_provider(100);
    let xml = provider
        .handle(&params(&[
            ("verb", "GetRecord"),
            ("identifier", "oai:depot.example.org:123456789/30"),
            ("metadataPrefix", "oai_dc"),
        ]))
        .unwrap();

    let doc = roxmltree::Document::parse(&xml).unwrap();
    let header = doc
        .descendants()
        .find(|n| n.has_tag_name((OAI_NS, "header")))
        .unwrap();
    assert_eq!(header.attribute("status"), Some("deleted"));
    assert!(!doc
        .descendants()
        .any(|n| n.has_tag_name((OAI_NS, "metadata"))));
}

#[test]
fn test_deleted_records_appear_in_harvests_as_stubs() {
    let provider = example_provider(100);
    let xml = provider
        .handle(&params(&[("verb", "ListRecords"), ("metadataPrefix", "oai_dc")]))
        .unwrap();

    let doc = roxmltree::Document::parse(&xml).unwrap();
    let deleted: Vec<_> = doc
        .descendants()
        .filter(|n| n.has_tag_name((OAI_NS, "header")))
        .filter(|n| n.attribute("status") == Some("deleted"))
        .collect();
    assert_eq!(deleted.len(), 1);
}

#[test]
fn test_deletions_hidden_when_policy_is_no() {
    let mut config = test_config();
    config.deleted_record = DeletedRecordPolicy::No;
    let provider = provider_with(config, example_index());

    let walked = walk_harvest(
        &provider,
        "ListIdentifiers",
        &[("verb", "ListIdentifiers"), ("metadataPrefix", "oai_dc")],
    );
    assert_eq!(walked.len(), 4, "tombstone is invisible");

    let xml = provider
        .handle(&params(&[
            ("verb", "GetRecord"),
            ("identifier", "oai:depot.example.org:123456789/30"),
            ("metadataPrefix", "oai_dc"),
        ]))
        .unwrap();
    assert_eq!(error_code(&xml).as_deref(), Some("idDoesNotExist"));
}

#[test]
fn test_identify_earliest_datestamp_bounds_every_record() {
    let mut config = test_config();
    config.earliest_datestamp = stamp("2024-01-01");
    let provider = provider_with(config, example_index());

    let identify = provider.handle(&params(&[("verb", "Identify")])).unwrap();
    let doc = roxmltree::Document::parse(&identify).unwrap();
    let earliest = doc
        .descendants()
        .find(|n| n.has_tag_name((OAI_NS, "earliestDatestamp")))
        .and_then(|n| n.text())
        .unwrap()
        .to_string();

    let records = provider
        .handle(&params(&[("verb", "ListIdentifiers"), ("metadataPrefix", "oai_dc")]))
        .unwrap();
    let doc = roxmltree::Document::parse(&records).unwrap();
    for datestamp in doc
        .descendants()
        .filter(|n| n.has_tag_name((OAI_NS, "datestamp")))
        .filter_map(|n| n.text())
    {
        // Second-granularity strings compare chronologically as strings.
        assert!(earliest.as_str() <= datestamp, "{earliest} <= {datestamp}");
    }
}

#[test]
fn test_date_range_filter_end_to_end() {
    let provider = example_provider(100);
    let xml = provider
        .handle(&params(&[
            ("verb", "ListIdentifiers"),
            ("metadataPrefix", "oai_dc"),
            ("from", "2024-01-06"),
            ("until", "2024-02-01"),
        ]))
        .unwrap();
    let ids = header_identifiers(&xml);
    assert_eq!(
        ids,
        vec![
            "oai:depot.example.org:123456789/11",
            "oai:depot.example.org:123456789/12",
            "oai:depot.example.org:123456789/20",
        ]
    );
}

#[test]
fn test_qdc_format_end_to_end() {
    let provider = example_provider(100);
    let xml = provider
        .handle(&params(&[
            ("verb", "GetRecord"),
            ("identifier", "oai:depot.example.org:123456789/10"),
            ("metadataPrefix", "qdc"),
        ]))
        .unwrap();
    assert!(xml.contains("<dc:title>A one</dc:title>"));
    assert!(xml.contains("qdc:qualifieddc"));
}

#[test]
fn test_response_is_schema_shaped() {
    // Spot-check the envelope basics on a representative response.
    let provider = example_provider(2);
    let xml = provider
        .handle(&params(&[("verb", "ListRecords"), ("metadataPrefix", "oai_dc")]))
        .unwrap();

    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    let doc = roxmltree::Document::parse(&xml).unwrap();
    let root = doc.root_element();
    assert_eq!(root.tag_name().name(), "OAI-PMH");
    assert_eq!(root.tag_name().namespace(), Some(OAI_NS));

    let request = root
        .children()
        .find(|n| n.has_tag_name((OAI_NS, "request")))
        .unwrap();
    assert_eq!(request.attribute("verb"), Some("ListRecords"));
    assert_eq!(request.attribute("metadataPrefix"), Some("oai_dc"));
}
