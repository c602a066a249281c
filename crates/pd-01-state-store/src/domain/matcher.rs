//! # Query Matcher
//!
//! Evaluates a parsed [`QueryJson`] against one state's extracted labels.
//! Field names resolve against the schema's indexed labels plus `.created`;
//! an unresolvable field or a value of the wrong type fails the whole query
//! with a `Query` error rather than silently matching nothing.

use crate::domain::errors::StateStoreError;
use crate::domain::query::{resolve_sort_field, QueryJson};
use shared_types::{LabelType, LabelValue, StateSchema, UtcMillis};
use std::cmp::Ordering;

/// The pseudo-field exposing the state's creation timestamp.
pub const CREATED_FIELD: &str = ".created";

/// The label view of one stored state during evaluation.
pub struct LabeledState<'a> {
    /// Extracted `(name, value)` pairs; absent labels have no entry.
    pub labels: &'a [(String, LabelValue)],
    /// Creation timestamp (`.created`).
    pub created: UtcMillis,
}

impl LabeledState<'_> {
    fn value_of(&self, field: &str) -> Option<LabelValue> {
        if field == CREATED_FIELD {
            return Some(LabelValue::Uint(self.created as u128));
        }
        self.labels
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.clone())
    }
}

/// Resolves a query field to its comparison type.
fn resolve_field(schema: &StateSchema, field: &str) -> Result<LabelType, StateStoreError> {
    if field == CREATED_FIELD {
        return Ok(LabelType::Uint);
    }
    schema
        .label_type(field)
        .ok_or_else(|| StateStoreError::Query(format!("unknown field {field}")))
}

/// Coerces a query value to the label's comparison type.
fn coerce(
    field: &str,
    label_type: LabelType,
    raw: &serde_json::Value,
) -> Result<LabelValue, StateStoreError> {
    let bad_value =
        || StateStoreError::Query(format!("value for field {field} has wrong type: {raw}"));
    match label_type {
        LabelType::Uint => match raw {
            serde_json::Value::Number(n) => {
                n.as_u64().map(|v| LabelValue::Uint(v as u128)).ok_or_else(bad_value)
            }
            serde_json::Value::String(s) => parse_numeric(s)
                .and_then(|v| u128::try_from(v).ok())
                .map(LabelValue::Uint)
                .ok_or_else(bad_value),
            _ => Err(bad_value()),
        },
        LabelType::Int => match raw {
            serde_json::Value::Number(n) => {
                n.as_i64().map(|v| LabelValue::Int(v as i128)).ok_or_else(bad_value)
            }
            serde_json::Value::String(s) => {
                parse_numeric(s).map(LabelValue::Int).ok_or_else(bad_value)
            }
            _ => Err(bad_value()),
        },
        LabelType::String => raw
            .as_str()
            .map(|s| LabelValue::Text(s.to_string()))
            .ok_or_else(bad_value),
        LabelType::Bytes => raw
            .as_str()
            .map(|s| LabelValue::Text(s.to_lowercase()))
            .ok_or_else(bad_value),
        LabelType::Bool => raw.as_bool().map(LabelValue::Bool).ok_or_else(bad_value),
    }
}

fn parse_numeric(s: &str) -> Option<i128> {
    if let Some(hex_digits) = s.strip_prefix("0x") {
        i128::from_str_radix(hex_digits, 16).ok()
    } else {
        s.parse::<i128>().ok()
    }
}

/// Same-type ordering; `None` when the variants differ or are unordered.
fn order(a: &LabelValue, b: &LabelValue) -> Option<Ordering> {
    match (a, b) {
        (LabelValue::Uint(x), LabelValue::Uint(y)) => Some(x.cmp(y)),
        (LabelValue::Int(x), LabelValue::Int(y)) => Some(x.cmp(y)),
        (LabelValue::Text(x), LabelValue::Text(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Evaluates the query against one state. All operator groups AND together.
pub fn matches(
    schema: &StateSchema,
    query: &QueryJson,
    state: &LabeledState<'_>,
) -> Result<bool, StateStoreError> {
    for op in &query.eq {
        let label_type = resolve_field(schema, &op.field)?;
        let test = coerce(&op.field, label_type, &op.value)?;
        match state.value_of(&op.field) {
            Some(actual) if actual == test => {}
            _ => return Ok(false),
        }
    }
    for op in &query.neq {
        let label_type = resolve_field(schema, &op.field)?;
        let test = coerce(&op.field, label_type, &op.value)?;
        match state.value_of(&op.field) {
            Some(actual) if actual == test => return Ok(false),
            _ => {}
        }
    }
    let range_groups: [(&[crate::domain::query::OpSingleVal], fn(Ordering) -> bool); 4] = [
        (&query.lt, |o| o == Ordering::Less),
        (&query.lte, |o| o != Ordering::Greater),
        (&query.gt, |o| o == Ordering::Greater),
        (&query.gte, |o| o != Ordering::Less),
    ];
    for (ops, accept) in range_groups {
        for op in ops {
            let label_type = resolve_field(schema, &op.field)?;
            if matches!(label_type, LabelType::Bool) {
                return Err(StateStoreError::Query(format!(
                    "field {} does not support range comparison",
                    op.field
                )));
            }
            let test = coerce(&op.field, label_type, &op.value)?;
            let actual = match state.value_of(&op.field) {
                Some(actual) => actual,
                None => return Ok(false),
            };
            match order(&actual, &test) {
                Some(ordering) if accept(ordering) => {}
                _ => return Ok(false),
            }
        }
    }
    for op in &query.in_ {
        let label_type = resolve_field(schema, &op.field)?;
        let candidates = op
            .values
            .iter()
            .map(|v| coerce(&op.field, label_type, v))
            .collect::<Result<Vec<_>, _>>()?;
        match state.value_of(&op.field) {
            Some(actual) if candidates.contains(&actual) => {}
            _ => return Ok(false),
        }
    }
    for op in &query.nin {
        let label_type = resolve_field(schema, &op.field)?;
        let candidates = op
            .values
            .iter()
            .map(|v| coerce(&op.field, label_type, v))
            .collect::<Result<Vec<_>, _>>()?;
        match state.value_of(&op.field) {
            Some(actual) if candidates.contains(&actual) => return Ok(false),
            _ => {}
        }
    }
    for op in &query.like {
        let label_type = resolve_field(schema, &op.field)?;
        if !label_type.supports_like() {
            return Err(StateStoreError::Query(format!(
                "field {} does not support LIKE",
                op.field
            )));
        }
        let test = coerce(&op.field, label_type, &op.value)?;
        let (LabelValue::Text(pattern), Some(LabelValue::Text(actual))) =
            (&test, state.value_of(&op.field))
        else {
            return Ok(false);
        };
        if !like_match(pattern, &actual) {
            return Ok(false);
        }
    }
    for op in &query.null {
        if op.field == CREATED_FIELD {
            return Err(StateStoreError::Query(
                "field .created is never null".to_string(),
            ));
        }
        resolve_field(schema, &op.field)?;
        if state.value_of(&op.field).is_some() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// SQL-style LIKE: `%` matches any run, `_` matches one character.
pub fn like_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    like_match_inner(&p, &t)
}

fn like_match_inner(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => text.is_empty(),
        Some(('%', rest)) => {
            (0..=text.len()).any(|skip| like_match_inner(rest, &text[skip..]))
        }
        Some(('_', rest)) => !text.is_empty() && like_match_inner(rest, &text[1..]),
        Some((c, rest)) => text.first() == Some(c) && like_match_inner(rest, &text[1..]),
    }
}

/// Orders two states by the query's sort entries; ties keep insertion order.
/// Absent labels sort after present ones.
pub fn compare_for_sort(
    schema: &StateSchema,
    sort: &[String],
    a: &LabeledState<'_>,
    b: &LabeledState<'_>,
) -> Result<Ordering, StateStoreError> {
    for entry in sort {
        let sort_field = resolve_sort_field(entry);
        resolve_field(schema, &sort_field.field)?;
        let va = a.value_of(&sort_field.field);
        let vb = b.value_of(&sort_field.field);
        let ordering = match (va, vb) {
            (Some(x), Some(y)) => order(&x, &y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let ordering = if sort_field.ascending {
            ordering
        } else {
            ordering.reverse()
        };
        if ordering != Ordering::Equal {
            return Ok(ordering);
        }
    }
    Ok(Ordering::Equal)
}
