//! Error types for the OAI-PMH provider.
//!
//! Uses the dual-error pattern: [`OaiError`] for protocol-level conditions
//! that are rendered into the response envelope as `<error code="...">`
//! elements, and [`IndexError`]/[`ProviderError`] for infrastructure
//! failures that the embedding shell surfaces as HTTP 5xx.

use thiserror::Error;

/// Protocol-level error carrying one of the fixed OAI-PMH 2.0 error codes.
///
/// These are client-caused (or empty-result) conditions. They terminate the
/// current request with an error element inside a normal HTTP 200 envelope
/// and never propagate as process failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OaiError {
    /// The verb argument is missing or not a legal OAI-PMH verb.
    #[error("'{0}' is not a legal OAI-PMH verb")]
    BadVerb(String),

    /// An argument is missing, repeated, illegal for the verb, or has
    /// invalid syntax.
    #[error("{0}")]
    BadArgument(String),

    /// The resumption token is malformed, from an incompatible version, or
    /// no longer interpretable against the current repository state.
    #[error("the resumption token is invalid or expired")]
    BadResumptionToken,

    /// The requested metadata prefix is not supported by the repository or
    /// by the addressed item.
    #[error("metadata format '{0}' cannot be disseminated")]
    CannotDisseminateFormat(String),

    /// The identifier is unknown to this repository.
    #[error("identifier '{0}' does not exist in this repository")]
    IdDoesNotExist(String),

    /// The combination of filter arguments matches no records.
    #[error("no records match the given criteria")]
    NoRecordsMatch,

    /// The addressed item has no disseminable metadata formats.
    #[error("no metadata formats are available for item '{0}'")]
    NoMetadataFormats(String),

    /// The repository does not define any sets.
    #[error("this repository does not maintain a set hierarchy")]
    NoSetHierarchy,
}

impl OaiError {
    /// The protocol error code for the `<error code="...">` attribute.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadVerb(_) => "badVerb",
            Self::BadArgument(_) => "badArgument",
            Self::BadResumptionToken => "badResumptionToken",
            Self::CannotDisseminateFormat(_) => "cannotDisseminateFormat",
            Self::IdDoesNotExist(_) => "idDoesNotExist",
            Self::NoRecordsMatch => "noRecordsMatch",
            Self::NoMetadataFormats(_) => "noMetadataFormats",
            Self::NoSetHierarchy => "noSetHierarchy",
        }
    }

    /// Whether the request echo must omit attributes.
    ///
    /// Per OAI-PMH 2.0 §3.2, responses to requests that fail verb or
    /// argument validation must not echo the (unvalidated) arguments.
    #[must_use]
    pub fn suppresses_request_echo(&self) -> bool {
        matches!(self, Self::BadVerb(_) | Self::BadArgument(_))
    }
}

/// Failure of the external search index collaborator.
///
/// Distinct from [`OaiError`]: these are transient, retryable from the
/// harvester's point of view, and must never be mapped to a protocol code.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The index did not answer within the configured deadline.
    #[error("index query timed out after {0} ms")]
    Timeout(u64),

    /// The index is unreachable or refused the query.
    #[error("index unavailable: {0}")]
    Unavailable(String),

    /// The index answered with data the adapter cannot interpret.
    #[error("index returned malformed data: {0}")]
    Malformed(String),
}

/// Failure while rendering an item's metadata into a target schema.
#[derive(Debug, Error)]
pub enum CrosswalkError {
    /// The item carries no metadata the crosswalk can work with.
    #[error("item '{identifier}' has no metadata usable by this crosswalk")]
    EmptyDocument {
        /// Internal identifier of the item.
        identifier: String,
    },

    /// Writing the output document failed.
    #[error("XML output failed: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Top-level failure returned by [`Provider::handle`](crate::Provider::handle).
///
/// Protocol errors never appear here; they are rendered into the envelope.
/// The embedding HTTP shell maps these to 5xx responses.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The search index collaborator failed.
    #[error("search index failure: {0}")]
    Index(#[from] IndexError),

    /// The repository configuration is unusable.
    #[error("invalid repository configuration: {0}")]
    Config(String),

    /// Serializing the response envelope failed.
    #[error("response serialization failed: {0}")]
    Serialize(#[from] quick_xml::Error),
}

/// Internal error union for verb handlers: either a protocol condition to
/// render, or an infrastructure failure to propagate.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Render as an `<error>` element.
    #[error(transparent)]
    Protocol(#[from] OaiError),

    /// Propagate to the shell as a 5xx.
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Result type alias for protocol-level operations.
pub type Result<T, E = OaiError> = std::result::Result<T, E>;
