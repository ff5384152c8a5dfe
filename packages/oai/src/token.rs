//! Resumption token codec.
//!
//! Tokens are versioned, slash-delimited and human-readable so operators
//! can diagnose them straight from harvester logs:
//!
//! ```text
//! v1/ListRecords/oai_dc/col_123456789_2/2024-01-01//100/523
//! ```
//!
//! Fields: version, verb, metadataPrefix, set, from, until, offset,
//! completeListSize. Empty fields mean "argument absent". None of the field
//! values can contain `/` (verbs and prefixes are bare words, set specs use
//! `_`, datestamps use `-` and `:`), so the encoding is unambiguous. A
//! token is self-describing: decoding needs no server-side state, and
//! encode→decode→encode reproduces the input byte-for-byte.

use crate::error::{OaiError, Result};
use crate::types::{Cursor, QuerySpec, Verb};

/// Version tag of the current token layout. Tokens carrying any other tag
/// are rejected rather than reinterpreted.
pub const TOKEN_VERSION: &str = "v1";

const FIELD_COUNT: usize = 8;

/// Encode a query spec and cursor into a token string.
#[must_use]
pub fn encode(spec: &QuerySpec, cursor: &Cursor) -> String {
    format!(
        "{TOKEN_VERSION}/{}/{}/{}/{}/{}/{}/{}",
        spec.verb.as_str(),
        spec.metadata_prefix.as_deref().unwrap_or(""),
        spec.set.as_deref().unwrap_or(""),
        spec.from.as_deref().unwrap_or(""),
        spec.until.as_deref().unwrap_or(""),
        cursor.offset,
        cursor.total,
    )
}

/// Decode a token string back into its query spec and cursor.
///
/// Fails closed: any malformed, truncated or version-mismatched token is a
/// `badResumptionToken`, never a silently substituted default. The caller
/// still re-validates the decoded filter set against the current format
/// registry before use.
pub fn decode(token: &str) -> Result<(QuerySpec, Cursor)> {
    let fields: Vec<&str> = token.split('/').collect();
    if fields.len() != FIELD_COUNT {
        return Err(OaiError::BadResumptionToken);
    }
    if fields[0] != TOKEN_VERSION {
        return Err(OaiError::BadResumptionToken);
    }

    let verb = match Verb::parse(fields[1]) {
        Some(verb @ (Verb::ListRecords | Verb::ListIdentifiers | Verb::ListSets)) => verb,
        // Non-list verbs never issue tokens.
        _ => return Err(OaiError::BadResumptionToken),
    };

    let offset: usize = fields[6]
        .parse()
        .map_err(|_| OaiError::BadResumptionToken)?;
    let total: usize = fields[7]
        .parse()
        .map_err(|_| OaiError::BadResumptionToken)?;

    let spec = QuerySpec {
        verb,
        metadata_prefix: optional(fields[2]),
        set: optional(fields[3]),
        from: optional(fields[4]),
        until: optional(fields[5]),
    };

    // ListSets tokens carry no filters; a filter there means tampering.
    if verb == Verb::ListSets
        && (spec.metadata_prefix.is_some()
            || spec.set.is_some()
            || spec.from.is_some()
            || spec.until.is_some())
    {
        return Err(OaiError::BadResumptionToken);
    }
    // Harvest tokens always carry the prefix they were issued for.
    if verb != Verb::ListSets && spec.metadata_prefix.is_none() {
        return Err(OaiError::BadResumptionToken);
    }

    Ok((spec, Cursor { offset, total }))
}

fn optional(field: &str) -> Option<String> {
    if field.is_empty() {
        None
    } else {
        Some(field.to_string())
    }
}
