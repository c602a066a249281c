//! # Query JSON Model
//!
//! The wire form of a state query, as submitted by domains during coin
//! selection:
//!
//! ```json
//! {
//!   "eq":   [{"field": "owner", "value": "0xabc..."}],
//!   "gt":   [{"field": ".created", "value": 1700000000000}],
//!   "sort": [".created"],
//!   "limit": 10
//! }
//! ```
//!
//! All operator groups are AND-ed together. Fields are the schema's indexed
//! labels plus the pseudo-field `.created`. Sort entries accept a leading
//! `-` or a trailing ` desc` for descending order.

use crate::domain::errors::StateStoreError;
use serde::Deserialize;

/// Field/value pair for single-valued operators.
#[derive(Clone, Debug, Deserialize)]
pub struct OpSingleVal {
    /// Label name or `.created`.
    pub field: String,
    /// Comparison value; type must match the label's type.
    pub value: serde_json::Value,
}

/// Field/values pair for `in` / `nin`.
#[derive(Clone, Debug, Deserialize)]
pub struct OpMultiVal {
    /// Label name or `.created`.
    pub field: String,
    /// Candidate values.
    pub values: Vec<serde_json::Value>,
}

/// Field-only operand for `null`.
#[derive(Clone, Debug, Deserialize)]
pub struct OpField {
    /// Label name.
    pub field: String,
}

/// A parsed state query.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct QueryJson {
    /// Equality.
    #[serde(default)]
    pub eq: Vec<OpSingleVal>,
    /// Inequality.
    #[serde(default)]
    pub neq: Vec<OpSingleVal>,
    /// Strictly less than.
    #[serde(default)]
    pub lt: Vec<OpSingleVal>,
    /// Less than or equal.
    #[serde(default)]
    pub lte: Vec<OpSingleVal>,
    /// Strictly greater than.
    #[serde(default)]
    pub gt: Vec<OpSingleVal>,
    /// Greater than or equal.
    #[serde(default)]
    pub gte: Vec<OpSingleVal>,
    /// Membership.
    #[serde(default, rename = "in")]
    pub in_: Vec<OpMultiVal>,
    /// Non-membership.
    #[serde(default)]
    pub nin: Vec<OpMultiVal>,
    /// Wildcard match (`%` any run, `_` one char); string labels only.
    #[serde(default)]
    pub like: Vec<OpSingleVal>,
    /// Label-is-absent test.
    #[serde(default)]
    pub null: Vec<OpField>,
    /// Sort order; `field`, `-field`, or `field desc`.
    #[serde(default)]
    pub sort: Vec<String>,
    /// Maximum results.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl QueryJson {
    /// Parses a query from its JSON wire form.
    ///
    /// # Errors
    /// `Query` when the JSON is malformed.
    pub fn parse(query_json: &str) -> Result<Self, StateStoreError> {
        serde_json::from_str(query_json).map_err(|e| StateStoreError::Query(e.to_string()))
    }

    /// An unconstrained query.
    pub fn all() -> Self {
        Self::default()
    }
}

/// One resolved sort key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortField {
    /// Label name or `.created`.
    pub field: String,
    /// Ascending unless negated.
    pub ascending: bool,
}

/// Resolves a sort entry: `owner`, `-owner`, and `owner desc` are all valid.
pub fn resolve_sort_field(entry: &str) -> SortField {
    let mut parts = entry.splitn(2, ' ');
    let head = parts.next().unwrap_or_default();
    let tail = parts.next().unwrap_or_default();
    let (field, negated) = match head.strip_prefix('-') {
        Some(stripped) => (stripped, true),
        None => (head, false),
    };
    let descending = negated || tail.eq_ignore_ascii_case("desc");
    SortField {
        field: field.to_string(),
        ascending: !descending,
    }
}
