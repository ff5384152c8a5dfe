//! Repository configuration and the OAI identifier scheme.
//!
//! Configuration is loaded once at startup, validated with
//! [`RepositoryConfig::validate`], and never mutated afterwards, so it can
//! be shared freely across concurrently handled requests.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Protocol version reported by `Identify`.
pub const OAI_PROTOCOL_VERSION: &str = "2.0";

/// Default maximum records per `ListRecords`/`ListIdentifiers` page.
pub const DEFAULT_MAX_RECORDS_PER_PAGE: usize = 100;

/// Default maximum sets per `ListSets` page.
pub const DEFAULT_MAX_SETS_PER_PAGE: usize = 50;

/// Repository identifier pattern: a hostname-shaped token, no colons.
///
/// The identifier host becomes the middle component of `oai:{host}:{id}`
/// identifiers, so it must not contain the scheme delimiter.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static HOST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.-]*$").expect("valid regex")
});

/// How the repository advertises deletion tracking to harvesters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletedRecordPolicy {
    /// Deletions are not exposed at all.
    No,
    /// Tombstones exist but may disappear.
    Transient,
    /// Tombstones are kept indefinitely.
    Persistent,
}

impl DeletedRecordPolicy {
    /// The protocol string for the `Identify` response.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::No => "no",
            Self::Transient => "transient",
            Self::Persistent => "persistent",
        }
    }

    /// Whether tombstoned items are visible to harvesters.
    #[must_use]
    pub fn tracks_deletions(&self) -> bool {
        !matches!(self, Self::No)
    }
}

/// Static configuration of the OAI-PMH data provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Human-readable repository name for `Identify`.
    pub repository_name: String,

    /// The base URL harvesters use, echoed in every response.
    pub base_url: String,

    /// Administrative contact addresses; at least one is required.
    pub admin_emails: Vec<String>,

    /// Host component of `oai:{host}:{id}` identifiers.
    pub identifier_host: String,

    /// Guaranteed lower bound on every datestamp in the repository.
    pub earliest_datestamp: DateTime<Utc>,

    /// Deletion-tracking policy advertised by `Identify`.
    pub deleted_record: DeletedRecordPolicy,

    /// Page size for record and identifier harvests.
    #[serde(default = "default_max_records")]
    pub max_records_per_page: usize,

    /// Page size for `ListSets`.
    #[serde(default = "default_max_sets")]
    pub max_sets_per_page: usize,
}

fn default_max_records() -> usize {
    DEFAULT_MAX_RECORDS_PER_PAGE
}

fn default_max_sets() -> usize {
    DEFAULT_MAX_SETS_PER_PAGE
}

impl RepositoryConfig {
    /// Check the configuration is usable before serving any request.
    ///
    /// # Errors
    /// [`ProviderError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.repository_name.trim().is_empty() {
            return Err(ProviderError::Config(
                "repository_name must not be empty".to_string(),
            ));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ProviderError::Config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.admin_emails.is_empty() {
            return Err(ProviderError::Config(
                "at least one admin email is required".to_string(),
            ));
        }
        if let Some(bad) = self.admin_emails.iter().find(|e| !e.contains('@')) {
            return Err(ProviderError::Config(format!(
                "admin email '{bad}' is not a mail address"
            )));
        }
        if !HOST_PATTERN.is_match(&self.identifier_host) {
            return Err(ProviderError::Config(format!(
                "identifier_host '{}' is not a valid repository identifier",
                self.identifier_host
            )));
        }
        if self.max_records_per_page == 0 || self.max_sets_per_page == 0 {
            return Err(ProviderError::Config(
                "page sizes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the wire identifier for an internal item identifier.
    ///
    /// # Examples
    /// ```
    /// use depot_oai::config::test_config;
    ///
    /// let config = test_config();
    /// assert_eq!(
    ///     config.oai_identifier("123456789/42"),
    ///     "oai:depot.example.org:123456789/42"
    /// );
    /// ```
    #[must_use]
    pub fn oai_identifier(&self, internal: &str) -> String {
        format!("oai:{}:{internal}", self.identifier_host)
    }

    /// Strip the `oai:{host}:` prefix from a wire identifier.
    ///
    /// Returns `None` when the identifier does not belong to this
    /// repository; callers map that to `idDoesNotExist`.
    #[must_use]
    pub fn parse_oai_identifier<'a>(&self, identifier: &'a str) -> Option<&'a str> {
        let rest = identifier.strip_prefix("oai:")?;
        let rest = rest.strip_prefix(self.identifier_host.as_str())?;
        let internal = rest.strip_prefix(':')?;
        if internal.is_empty() {
            return None;
        }
        Some(internal)
    }

    /// A sample wire identifier for the `Identify` description block.
    #[must_use]
    pub fn sample_identifier(&self) -> String {
        self.oai_identifier("123456789/1")
    }
}

/// A small, valid configuration for doctests and unit tests.
#[must_use]
pub fn test_config() -> RepositoryConfig {
    RepositoryConfig {
        repository_name: "Depot Test Archive".to_string(),
        base_url: "https://depot.example.org/oai/request".to_string(),
        admin_emails: vec!["admin@depot.example.org".to_string()],
        identifier_host: "depot.example.org".to_string(),
        earliest_datestamp: chrono::DateTime::UNIX_EPOCH,
        deleted_record: DeletedRecordPolicy::Persistent,
        max_records_per_page: DEFAULT_MAX_RECORDS_PER_PAGE,
        max_sets_per_page: DEFAULT_MAX_SETS_PER_PAGE,
    }
}
