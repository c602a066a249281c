//! # State Schemas
//!
//! A domain declares the shape of its private states as an ABI-style tuple.
//! Components marked `indexed` become queryable labels in the state store.
//!
//! The schema identity is the Keccak-256 of its canonical signature string:
//!
//! ```text
//! type=SimpleCoin(bytes32 salt,address owner,uint256 amount),labels=[owner,amount]
//! ```
//!
//! so two nodes that parse the same schema JSON always agree on the schema ID.

use crate::errors::{ErrorKind, PtocError};
use crate::ids::Bytes32;
use serde::{Deserialize, Serialize};

/// The comparison class of an indexed label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelType {
    /// Unsigned integer types (`uint8`..`uint256`), compared numerically.
    Uint,
    /// Signed integer types (`int8`..`int256`), compared numerically.
    Int,
    /// `string` labels; the only type that supports LIKE matching.
    String,
    /// `address`, `bytesN` and other hex-encoded values, compared as
    /// normalized lowercase strings.
    Bytes,
    /// `bool` labels.
    Bool,
}

impl LabelType {
    /// Maps an ABI type name to its label class.
    fn from_abi_type(abi_type: &str) -> Option<Self> {
        if abi_type.starts_with("uint") {
            Some(Self::Uint)
        } else if abi_type.starts_with("int") {
            Some(Self::Int)
        } else if abi_type == "string" {
            Some(Self::String)
        } else if abi_type == "address" || abi_type.starts_with("bytes") {
            Some(Self::Bytes)
        } else if abi_type == "bool" {
            Some(Self::Bool)
        } else {
            None
        }
    }

    /// Whether LIKE is valid against this label type.
    pub fn supports_like(&self) -> bool {
        matches!(self, Self::String)
    }
}

/// A typed label value extracted from a state's data JSON.
#[derive(Clone, Debug, PartialEq)]
pub enum LabelValue {
    /// Numeric value for Uint labels.
    Uint(u128),
    /// Numeric value for Int labels.
    Int(i128),
    /// String value (String and Bytes labels, normalized lowercase for hex).
    Text(String),
    /// Boolean value.
    Bool(bool),
}

/// One component of a schema tuple.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Field name within the state data JSON.
    pub name: String,
    /// ABI type name, e.g. `uint256`.
    #[serde(rename = "type")]
    pub abi_type: String,
    /// Indexed components become queryable labels.
    #[serde(default)]
    pub indexed: bool,
}

/// Raw JSON shape of a domain-declared schema.
#[derive(Deserialize)]
struct SchemaJson {
    #[serde(rename = "type")]
    tuple_type: String,
    #[serde(rename = "internalType", default)]
    internal_type: String,
    components: Vec<SchemaField>,
}

/// A parsed state schema with indexed-label metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSchema {
    /// Struct name extracted from the `internalType`.
    pub name: String,
    /// All tuple components in declaration order.
    pub fields: Vec<SchemaField>,
}

impl StateSchema {
    /// Parses a schema from the domain's ABI-tuple JSON.
    ///
    /// # Errors
    /// `ConfigError` when the JSON is malformed, the tuple has no components,
    /// or an indexed component has a type that cannot be used as a label.
    pub fn parse(schema_json: &str) -> Result<Self, PtocError> {
        let raw: SchemaJson = serde_json::from_str(schema_json)
            .map_err(|e| PtocError::new(ErrorKind::Config, format!("invalid schema JSON: {e}")))?;
        if raw.tuple_type != "tuple" {
            return Err(PtocError::new(
                ErrorKind::Config,
                format!("schema root must be a tuple, got {}", raw.tuple_type),
            ));
        }
        if raw.components.is_empty() {
            return Err(PtocError::new(
                ErrorKind::Config,
                "schema tuple has no components",
            ));
        }
        for field in raw.components.iter().filter(|f| f.indexed) {
            if LabelType::from_abi_type(&field.abi_type).is_none() {
                return Err(PtocError::new(
                    ErrorKind::Config,
                    format!(
                        "indexed field {} has un-indexable type {}",
                        field.name, field.abi_type
                    ),
                ));
            }
        }
        let name = raw
            .internal_type
            .rsplit(' ')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("State")
            .to_string();
        Ok(Self {
            name,
            fields: raw.components,
        })
    }

    /// Canonical signature string, e.g.
    /// `type=Coin(bytes32 salt,address owner,uint256 amount),labels=[owner,amount]`.
    pub fn signature(&self) -> String {
        let field_list = self
            .fields
            .iter()
            .map(|f| format!("{} {}", f.abi_type, f.name))
            .collect::<Vec<_>>()
            .join(",");
        let labels = self
            .fields
            .iter()
            .filter(|f| f.indexed)
            .map(|f| f.name.clone())
            .collect::<Vec<_>>()
            .join(",");
        format!("type={}({}),labels=[{}]", self.name, field_list, labels)
    }

    /// Schema ID: Keccak-256 of the canonical signature.
    pub fn id(&self) -> Bytes32 {
        Bytes32::keccak(self.signature().as_bytes())
    }

    /// Indexed fields, in declaration order.
    pub fn labels(&self) -> impl Iterator<Item = &SchemaField> {
        self.fields.iter().filter(|f| f.indexed)
    }

    /// The label class of a named field, if it is an indexed label.
    pub fn label_type(&self, field_name: &str) -> Option<LabelType> {
        self.fields
            .iter()
            .find(|f| f.indexed && f.name == field_name)
            .and_then(|f| LabelType::from_abi_type(&f.abi_type))
    }

    /// Extracts typed label values from a state's data JSON.
    ///
    /// A label absent from the data (or JSON null) yields no entry; queries
    /// observe it through the `null` operator.
    ///
    /// # Errors
    /// `ValidationError` when the data JSON is malformed or a present label
    /// value does not match its declared type.
    pub fn extract_labels(&self, data_json: &str) -> Result<Vec<(String, LabelValue)>, PtocError> {
        let data: serde_json::Value = serde_json::from_str(data_json).map_err(|e| {
            PtocError::new(ErrorKind::Validation, format!("invalid state data: {e}"))
        })?;
        let mut labels = Vec::new();
        for field in self.labels() {
            let raw = match data.get(&field.name) {
                None | Some(serde_json::Value::Null) => continue,
                Some(raw) => raw,
            };
            let label_type = LabelType::from_abi_type(&field.abi_type).ok_or_else(|| {
                PtocError::new(
                    ErrorKind::Config,
                    format!("un-indexable label type {}", field.abi_type),
                )
            })?;
            labels.push((field.name.clone(), parse_label(&field.name, label_type, raw)?));
        }
        Ok(labels)
    }
}

fn parse_label(
    name: &str,
    label_type: LabelType,
    raw: &serde_json::Value,
) -> Result<LabelValue, PtocError> {
    let type_error = || {
        PtocError::new(
            ErrorKind::Validation,
            format!("label {name} has wrong JSON type: {raw}"),
        )
    };
    match label_type {
        LabelType::Uint => match raw {
            serde_json::Value::Number(n) => {
                n.as_u64().map(|v| LabelValue::Uint(v as u128)).ok_or_else(type_error)
            }
            serde_json::Value::String(s) => parse_numeric_string(s)
                .and_then(|v| u128::try_from(v).ok())
                .map(LabelValue::Uint)
                .ok_or_else(type_error),
            _ => Err(type_error()),
        },
        LabelType::Int => match raw {
            serde_json::Value::Number(n) => {
                n.as_i64().map(|v| LabelValue::Int(v as i128)).ok_or_else(type_error)
            }
            serde_json::Value::String(s) => {
                parse_numeric_string(s).map(LabelValue::Int).ok_or_else(type_error)
            }
            _ => Err(type_error()),
        },
        LabelType::String => raw
            .as_str()
            .map(|s| LabelValue::Text(s.to_string()))
            .ok_or_else(type_error),
        LabelType::Bytes => raw
            .as_str()
            .map(|s| LabelValue::Text(s.to_lowercase()))
            .ok_or_else(type_error),
        LabelType::Bool => raw.as_bool().map(LabelValue::Bool).ok_or_else(type_error),
    }
}

/// Numbers arrive from domains as JSON numbers, decimal strings, or 0x-hex
/// strings; all three forms must land on the same label value.
fn parse_numeric_string(s: &str) -> Option<i128> {
    if let Some(hex_digits) = s.strip_prefix("0x") {
        i128::from_str_radix(hex_digits, 16).ok()
    } else {
        s.parse::<i128>().ok()
    }
}
