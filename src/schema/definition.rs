//! Raw serde types matching the JSON definition file.
//!
//! A node is a piece when the object carries a string `"type"` key; any other
//! object is a folder of nested nodes. The file's key order is preserved
//! (serde_json `preserve_order`) and becomes column declaration order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNode {
    Piece(RawPiece),
    Folder(serde_json::Map<String, Value>),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawPiece {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub default: Value,
    #[serde(default)]
    pub array: bool,
    /// Minimum length for strings, minimum value for numbers.
    #[serde(default)]
    pub min: Option<f64>,
    /// Maximum length for strings, maximum value for numbers.
    #[serde(default)]
    pub max: Option<f64>,
}
