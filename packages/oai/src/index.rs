//! Index query adapter: the boundary to the external search index.
//!
//! The provider never touches the content store directly; it reads a
//! point-in-time snapshot through [`ItemIndex`]. Implementations must
//! return results in a **total order** over the item identifier (ascending
//! byte order, identifiers globally unique) so that paging twice with the
//! same cursor returns the same page. Blocking calls are expected to apply
//! their own bounded timeout and report it as [`IndexError::Timeout`].

use chrono::{DateTime, Utc};

use crate::config::RepositoryConfig;
use crate::error::{IndexError, Result};
use crate::sets::SetTree;
use crate::types::{Datestamp, Item, QuerySpec};

/// A protocol filter set translated into index terms.
///
/// Built from a validated [`QuerySpec`]; both bounds are inclusive UTC
/// instants (day-granularity `until` already expanded to the end of the
/// day).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemQuery {
    /// Restrict to members of this set spec.
    pub set: Option<String>,

    /// Inclusive lower datestamp bound.
    pub from: Option<DateTime<Utc>>,

    /// Inclusive upper datestamp bound.
    pub until: Option<DateTime<Utc>>,

    /// Whether tombstoned items are part of the result.
    pub include_deleted: bool,
}

impl ItemQuery {
    /// Translate a validated query spec into index terms.
    ///
    /// The spec's datestamp strings were validated at dispatch time, so a
    /// parse failure here means the spec was tampered with in a token; the
    /// caller maps the error accordingly.
    pub fn from_spec(spec: &QuerySpec, config: &RepositoryConfig) -> Result<Self> {
        let from = spec
            .from
            .as_deref()
            .map(Datestamp::parse)
            .transpose()?
            .map(|d| d.instant);
        let until = spec
            .until
            .as_deref()
            .map(Datestamp::parse)
            .transpose()?
            .map(|d| d.upper_bound());

        Ok(Self {
            set: spec.set.clone(),
            from,
            until,
            include_deleted: config.deleted_record.tracks_deletions(),
        })
    }

    /// Whether an item satisfies this filter.
    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        if item.deleted && !self.include_deleted {
            return false;
        }
        if let Some(set) = &self.set {
            if !item.sets.iter().any(|s| s == set) {
                return false;
            }
        }
        if let Some(from) = self.from {
            if item.datestamp < from {
                return false;
            }
        }
        if let Some(until) = self.until {
            if item.datestamp > until {
                return false;
            }
        }
        true
    }
}

/// One page of a harvest query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPage {
    /// Matching items in identifier order, at most the requested limit.
    pub items: Vec<Item>,

    /// Total number of items matching the query right now.
    pub total: usize,
}

/// Read-only view of the search index.
///
/// The index is owned and kept current by an external population job; this
/// subsystem treats it as eventually consistent and never writes to it.
pub trait ItemIndex: Send + Sync {
    /// Fetch one item by internal identifier, tombstones included.
    fn get_item(&self, identifier: &str) -> Result<Option<Item>, IndexError>;

    /// One page of items matching the query, ordered by identifier
    /// ascending, starting at `offset`.
    fn query_items(
        &self,
        query: &ItemQuery,
        offset: usize,
        limit: usize,
    ) -> Result<ItemPage, IndexError>;

    /// The community/collection projections defining the set hierarchy.
    fn set_tree(&self) -> Result<SetTree, IndexError>;
}

/// In-memory [`ItemIndex`] over a fixed snapshot.
///
/// Reference implementation used by the test suite and by small
/// deployments that can hold their projection in memory; it defines the
/// ordering contract real backends must reproduce.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    items: Vec<Item>,
    tree: SetTree,
}

impl MemoryIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item to the snapshot.
    pub fn add_item(&mut self, item: Item) {
        self.items.push(item);
    }

    /// Add a collection to the set hierarchy.
    pub fn add_collection(&mut self, source: crate::sets::SetSource) {
        self.tree.collections.push(source);
    }

    /// Add a community to the set hierarchy.
    pub fn add_community(&mut self, source: crate::sets::SetSource) {
        self.tree.communities.push(source);
    }

    fn sorted_matches(&self, query: &ItemQuery) -> Vec<&Item> {
        let mut matches: Vec<&Item> = self.items.iter().filter(|i| query.matches(i)).collect();
        matches.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        matches
    }
}

impl ItemIndex for MemoryIndex {
    fn get_item(&self, identifier: &str) -> Result<Option<Item>, IndexError> {
        Ok(self
            .items
            .iter()
            .find(|i| i.identifier == identifier)
            .cloned())
    }

    fn query_items(
        &self,
        query: &ItemQuery,
        offset: usize,
        limit: usize,
    ) -> Result<ItemPage, IndexError> {
        let matches = self.sorted_matches(query);
        let total = matches.len();
        let start = offset.min(total);
        let end = (start + limit).min(total);
        Ok(ItemPage {
            items: matches[start..end].iter().map(|i| (*i).clone()).collect(),
            total,
        })
    }

    fn set_tree(&self) -> Result<SetTree, IndexError> {
        Ok(self.tree.clone())
    }
}
