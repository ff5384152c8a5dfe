//! Protocol dispatcher: verb parsing and per-verb argument validation.
//!
//! All validation happens here, before any index query is issued, so a
//! malformed request never incurs backend load. Unknown arguments are
//! rejected rather than ignored; harvesters probing for strict
//! conformance expect `badArgument`, not silence.

use std::collections::HashMap;

use crate::error::{OaiError, Result};
use crate::formats::FormatRegistry;
use crate::sets::validate_set_spec;
use crate::token;
use crate::types::{Cursor, Datestamp, QuerySpec, Verb};

/// A request that passed verb and argument validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedRequest {
    /// `Identify`, no arguments.
    Identify,

    /// `ListMetadataFormats`, optionally scoped to one item.
    ListMetadataFormats {
        /// Wire identifier, if given.
        identifier: Option<String>,
    },

    /// `GetRecord` for one item in one format.
    GetRecord {
        /// Wire identifier.
        identifier: String,
        /// Requested format prefix.
        metadata_prefix: String,
    },

    /// `ListSets`, fresh or resumed.
    ListSets {
        /// Cursor decoded from a resumption token, if resumed.
        cursor: Option<Cursor>,
    },

    /// `ListRecords` or `ListIdentifiers`, fresh or resumed.
    Harvest {
        /// The validated filter set.
        spec: QuerySpec,
        /// Cursor decoded from a resumption token, if resumed.
        cursor: Option<Cursor>,
    },
}

/// Arguments each verb accepts. Anything else is a `badArgument`.
fn allowed_arguments(verb: Verb) -> &'static [&'static str] {
    match verb {
        Verb::Identify => &[],
        Verb::ListMetadataFormats => &["identifier"],
        Verb::GetRecord => &["identifier", "metadataPrefix"],
        Verb::ListSets => &["resumptionToken"],
        Verb::ListIdentifiers | Verb::ListRecords => {
            &["metadataPrefix", "from", "until", "set", "resumptionToken"]
        }
    }
}

/// Validate a raw request into a [`ValidatedRequest`] or a protocol error.
pub fn validate(
    params: &HashMap<String, String>,
    registry: &FormatRegistry,
) -> Result<ValidatedRequest> {
    let verb = match params.get("verb") {
        Some(value) => Verb::parse(value)
            .ok_or_else(|| OaiError::BadVerb(value.clone()))?,
        None => return Err(OaiError::BadVerb(String::new())),
    };

    let allowed = allowed_arguments(verb);
    for key in params.keys() {
        if key != "verb" && !allowed.contains(&key.as_str()) {
            return Err(OaiError::BadArgument(format!(
                "argument '{key}' is not allowed for verb {}",
                verb.as_str()
            )));
        }
    }

    match verb {
        Verb::Identify => Ok(ValidatedRequest::Identify),

        Verb::ListMetadataFormats => Ok(ValidatedRequest::ListMetadataFormats {
            identifier: params.get("identifier").cloned(),
        }),

        Verb::GetRecord => {
            let identifier = require(params, "identifier", verb)?;
            let metadata_prefix = require(params, "metadataPrefix", verb)?;
            if !registry.contains(&metadata_prefix) {
                return Err(OaiError::CannotDisseminateFormat(metadata_prefix));
            }
            Ok(ValidatedRequest::GetRecord {
                identifier,
                metadata_prefix,
            })
        }

        Verb::ListSets => match params.get("resumptionToken") {
            None => Ok(ValidatedRequest::ListSets { cursor: None }),
            Some(value) => {
                let (spec, cursor) = token::decode(value)?;
                if spec.verb != Verb::ListSets {
                    return Err(OaiError::BadResumptionToken);
                }
                Ok(ValidatedRequest::ListSets {
                    cursor: Some(cursor),
                })
            }
        },

        Verb::ListIdentifiers | Verb::ListRecords => validate_harvest(params, registry, verb),
    }
}

fn validate_harvest(
    params: &HashMap<String, String>,
    registry: &FormatRegistry,
    verb: Verb,
) -> Result<ValidatedRequest> {
    if let Some(value) = params.get("resumptionToken") {
        // resumptionToken is an exclusive argument.
        if let Some(extra) = ["metadataPrefix", "from", "until", "set"]
            .iter()
            .find(|k| params.contains_key(**k))
        {
            return Err(OaiError::BadArgument(format!(
                "'{extra}' cannot be combined with a resumptionToken"
            )));
        }
        let (spec, cursor) = token::decode(value)?;
        if spec.verb != verb {
            return Err(OaiError::BadResumptionToken);
        }
        // The encoded filter set must still be valid against the current
        // registry; a stale or tampered token fails closed.
        validate_filters(&spec, registry).map_err(|_| OaiError::BadResumptionToken)?;
        return Ok(ValidatedRequest::Harvest {
            spec,
            cursor: Some(cursor),
        });
    }

    if !params.contains_key("metadataPrefix") {
        return Err(OaiError::BadArgument(format!(
            "verb {} requires either metadataPrefix or resumptionToken",
            verb.as_str()
        )));
    }

    let spec = QuerySpec {
        verb,
        metadata_prefix: params.get("metadataPrefix").cloned(),
        set: params.get("set").cloned(),
        from: params.get("from").cloned(),
        until: params.get("until").cloned(),
    };
    validate_filters(&spec, registry)?;
    Ok(ValidatedRequest::Harvest { spec, cursor: None })
}

/// Check a filter set: datestamp syntax and ordering, set spec shape,
/// metadata prefix registration.
///
/// Shared between fresh-argument validation (errors surface as-is) and
/// token re-validation (errors collapse to `badResumptionToken`).
pub(crate) fn validate_filters(spec: &QuerySpec, registry: &FormatRegistry) -> Result<()> {
    if let Some(prefix) = spec.metadata_prefix.as_deref() {
        if !registry.contains(prefix) {
            return Err(OaiError::CannotDisseminateFormat(prefix.to_string()));
        }
    }

    if let Some(set) = spec.set.as_deref() {
        validate_set_spec(set)?;
    }

    let from = spec.from.as_deref().map(Datestamp::parse).transpose()?;
    let until = spec.until.as_deref().map(Datestamp::parse).transpose()?;

    if let (Some(from), Some(until)) = (from, until) {
        if from.granularity != until.granularity {
            return Err(OaiError::BadArgument(
                "from and until must use the same granularity".to_string(),
            ));
        }
        if from.instant > until.instant {
            return Err(OaiError::BadArgument(
                "from must not be later than until".to_string(),
            ));
        }
    }

    Ok(())
}

fn require(params: &HashMap<String, String>, key: &str, verb: Verb) -> Result<String> {
    params.get(key).cloned().ok_or_else(|| {
        OaiError::BadArgument(format!(
            "verb {} requires the '{key}' argument",
            verb.as_str()
        ))
    })
}
