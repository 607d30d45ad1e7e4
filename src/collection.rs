//! Use-case label → vector collection name.
//!
//! Every upload is routed to the collection named after its use case:
//! the label is lower-cased, spaces become underscores, and `rag_` is
//! prepended. Labels that normalize to the same string share a collection.
//!
//! No character validation happens here. Backends that restrict identifier
//! characters reject bad names when they are used (see
//! [`store::astra`](crate::store::astra)).

use std::fmt;

use serde::Serialize;

pub const COLLECTION_PREFIX: &str = "rag_";

/// Name of a vector collection derived from a use-case label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CollectionName(String);

impl CollectionName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CollectionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the collection name for a use-case label.
///
/// ```rust
/// use docvec::collection::collection_name;
///
/// assert_eq!(collection_name("Technical Docs").as_str(), "rag_technical_docs");
/// ```
pub fn collection_name(use_case: &str) -> CollectionName {
    let normalized = use_case.to_lowercase().replace(' ', "_");
    CollectionName(format!("{}{}", COLLECTION_PREFIX, normalized))
}

/// Substitute `default` for a blank use-case label.
///
/// Applied at the input boundary (CLI flag, upload form), before
/// [`collection_name`].
pub fn resolve_use_case<'a>(input: Option<&'a str>, default: &'a str) -> &'a str {
    match input {
        Some(label) if !label.trim().is_empty() => label,
        _ => default,
    }
}
