//! Set hierarchy resolution.
//!
//! OAI sets are derived from the repository's community/collection tree.
//! Collection sets and community sets live in separate spec namespaces
//! (`col_` / `com_`) so a community and a collection can never collide,
//! whatever their names. A spec is derived deterministically from the
//! source object's identifier (`/` mapped to `_`), so it is stable across
//! requests for the lifetime of the backing object.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{OaiError, Result};
use crate::types::Set;

/// Spec prefix for sets derived from collections.
pub const COLLECTION_SET_PREFIX: &str = "col_";

/// Spec prefix for sets derived from communities.
pub const COMMUNITY_SET_PREFIX: &str = "com_";

/// Shape of a set spec: prefix, then identifier characters (repository
/// identifiers are dotted/numeric handles whose `/` became `_`).
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static SET_SPEC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(col|com)_[A-Za-z0-9._-]+$").expect("valid regex"));

/// A community or collection as reported by the index, before it becomes a
/// set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetSource {
    /// Internal identifier (e.g. "123456789/2"). Must not contain `_`.
    pub identifier: String,

    /// Display name.
    pub name: String,

    /// Optional free-text description.
    pub description: Option<String>,
}

impl SetSource {
    /// Create a source without a description.
    #[must_use]
    pub fn new(identifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            description: None,
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// The community/collection projections that define the set hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetTree {
    /// Top-level and nested communities, flattened.
    pub communities: Vec<SetSource>,

    /// All collections, flattened.
    pub collections: Vec<SetSource>,
}

/// Derive the spec for a collection-backed set.
#[must_use]
pub fn collection_spec(identifier: &str) -> String {
    format!("{COLLECTION_SET_PREFIX}{}", identifier.replace('/', "_"))
}

/// Derive the spec for a community-backed set.
#[must_use]
pub fn community_spec(identifier: &str) -> String {
    format!("{COMMUNITY_SET_PREFIX}{}", identifier.replace('/', "_"))
}

/// Syntactic check of a `set` argument, performed before any index query.
///
/// An unknown but well-formed spec is not an error here; it simply matches
/// nothing.
pub fn validate_set_spec(spec: &str) -> Result<()> {
    if SET_SPEC_PATTERN.is_match(spec) {
        Ok(())
    } else {
        Err(OaiError::BadArgument(format!(
            "'{spec}' is not a valid set spec"
        )))
    }
}

/// One page of sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetPage {
    /// The sets on this page, in spec order.
    pub sets: Vec<Set>,

    /// Total number of sets in the hierarchy right now.
    pub total: usize,

    /// Whether pages remain after this one.
    pub has_more: bool,
}

/// Flattened, ordered view of the set hierarchy.
///
/// Sets are sorted by spec, which gives `ListSets` a stable pagination
/// order even while the underlying tree is being edited: inserts and
/// removals shift neighbours but never reorder survivors.
#[derive(Debug, Clone)]
pub struct SetResolver {
    sets: Vec<Set>,
}

impl SetResolver {
    /// Flatten a set tree into ordered OAI sets.
    #[must_use]
    pub fn from_tree(tree: &SetTree) -> Self {
        let mut sets: Vec<Set> = Vec::with_capacity(tree.collections.len() + tree.communities.len());

        for source in &tree.collections {
            sets.push(Set {
                spec: collection_spec(&source.identifier),
                name: source.name.clone(),
                description: source.description.clone(),
            });
        }
        for source in &tree.communities {
            sets.push(Set {
                spec: community_spec(&source.identifier),
                name: source.name.clone(),
                description: source.description.clone(),
            });
        }

        sets.sort_by(|a, b| a.spec.cmp(&b.spec));
        sets.dedup_by(|a, b| a.spec == b.spec);

        Self { sets }
    }

    /// Total number of sets.
    #[must_use]
    pub fn total(&self) -> usize {
        self.sets.len()
    }

    /// One page of the flattened hierarchy.
    #[must_use]
    pub fn page(&self, offset: usize, limit: usize) -> SetPage {
        let total = self.sets.len();
        let start = offset.min(total);
        let end = (start + limit).min(total);
        SetPage {
            sets: self.sets[start..end].to_vec(),
            total,
            has_more: end < total,
        }
    }

    /// Look up a set by spec.
    #[must_use]
    pub fn resolve(&self, spec: &str) -> Option<&Set> {
        self.sets.iter().find(|s| s.spec == spec)
    }
}
