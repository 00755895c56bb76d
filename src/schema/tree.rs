//! Resolved schema tree: ordered folders of typed, defaulted pieces.

use crate::error::SchemaError;
use crate::provider::ColumnSpec;
use crate::schema::definition::{RawNode, RawPiece};
use serde_json::Value;

/// Declared type of a leaf piece.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PieceKind {
    String,
    Integer,
    Float,
    Boolean,
    Any,
}

impl PieceKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "string" => Some(PieceKind::String),
            "integer" => Some(PieceKind::Integer),
            "float" => Some(PieceKind::Float),
            "boolean" => Some(PieceKind::Boolean),
            "any" => Some(PieceKind::Any),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PieceKind::String => "string",
            PieceKind::Integer => "integer",
            PieceKind::Float => "float",
            PieceKind::Boolean => "boolean",
            PieceKind::Any => "any",
        }
    }
}

/// A leaf configuration key: type, default, and validation bounds.
#[derive(Clone, Debug)]
pub struct SchemaPiece {
    pub kind: PieceKind,
    pub default: Value,
    pub array: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl SchemaPiece {
    fn from_raw(path: &str, raw: RawPiece) -> Result<Self, SchemaError> {
        let kind = PieceKind::from_name(&raw.kind).ok_or_else(|| SchemaError::UnknownType {
            path: path.to_string(),
            type_name: raw.kind.clone(),
        })?;
        let invalid = |reason: String| SchemaError::InvalidDefinition {
            path: path.to_string(),
            reason,
        };
        if let (Some(min), Some(max)) = (raw.min, raw.max) {
            if min > max {
                return Err(invalid(format!("min {} exceeds max {}", min, max)));
            }
        }
        if kind == PieceKind::String {
            // Length bounds become VARCHAR sizes; negatives are meaningless.
            if raw.min.is_some_and(|v| v < 0.0) || raw.max.is_some_and(|v| v < 0.0) {
                return Err(invalid("string length bounds must be non-negative".into()));
            }
        }
        let default = if raw.array && raw.default.is_null() {
            Value::Array(Vec::new())
        } else {
            raw.default
        };
        let piece = SchemaPiece {
            kind,
            default,
            array: raw.array,
            min: raw.min,
            max: raw.max,
        };
        // The declared default must satisfy the piece's own rule.
        piece.parse(path, &piece.default)?;
        Ok(piece)
    }

    /// Validate a candidate value against this piece's type and bounds.
    /// Null is accepted and means "unset". Returns the value unchanged.
    pub fn parse(&self, path: &str, value: &Value) -> Result<Value, SchemaError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        if self.array {
            let items = value.as_array().ok_or_else(|| SchemaError::Validation {
                path: path.to_string(),
                reason: format!("expected an array of {}", self.kind.as_str()),
            })?;
            for item in items {
                self.check_scalar(path, item)?;
            }
        } else {
            self.check_scalar(path, value)?;
        }
        Ok(value.clone())
    }

    fn check_scalar(&self, path: &str, value: &Value) -> Result<(), SchemaError> {
        let fail = |reason: String| SchemaError::Validation {
            path: path.to_string(),
            reason,
        };
        match self.kind {
            PieceKind::String => {
                let s = value
                    .as_str()
                    .ok_or_else(|| fail("expected a string".into()))?;
                let len = s.chars().count() as f64;
                if let Some(min) = self.min.filter(|min| len < *min) {
                    return Err(fail(format!("shorter than {} characters", min)));
                }
                if let Some(max) = self.max.filter(|max| len > *max) {
                    return Err(fail(format!("longer than {} characters", max)));
                }
            }
            PieceKind::Integer => {
                let n = value
                    .as_i64()
                    .ok_or_else(|| fail("expected an integer".into()))?;
                self.check_int_range(path, n)?;
            }
            PieceKind::Float => {
                let n = value
                    .as_f64()
                    .ok_or_else(|| fail("expected a number".into()))?;
                self.check_range(path, n)?;
            }
            PieceKind::Boolean => {
                if !value.is_boolean() {
                    return Err(fail("expected a boolean".into()));
                }
            }
            PieceKind::Any => {}
        }
        Ok(())
    }

    fn check_range(&self, path: &str, n: f64) -> Result<(), SchemaError> {
        if self.min.is_some_and(|min| n < min) || self.max.is_some_and(|max| n > max) {
            return Err(self.range_error(path, n.to_string()));
        }
        Ok(())
    }

    /// Integer comparison against the (f64) bounds. Rounding the value to f64
    /// would lose precision past 2^53, so compare as integers: `n < min` iff
    /// `n < ceil(min)`, `n > max` iff `n > floor(max)`. The f64-to-i128 cast
    /// saturates, which keeps infinite/huge bounds correct.
    fn check_int_range(&self, path: &str, n: i64) -> Result<(), SchemaError> {
        let below = self.min.is_some_and(|min| (n as i128) < min.ceil() as i128);
        let above = self.max.is_some_and(|max| (n as i128) > max.floor() as i128);
        if below || above {
            return Err(self.range_error(path, n.to_string()));
        }
        Ok(())
    }

    fn range_error(&self, path: &str, n: String) -> SchemaError {
        let min = self.min.map(|v| v.to_string()).unwrap_or_default();
        let max = self.max.map(|v| v.to_string()).unwrap_or_default();
        SchemaError::Validation {
            path: path.to_string(),
            reason: format!("{} is outside the range {}..{}", n, min, max),
        }
    }
}

/// A node in the schema tree.
#[derive(Clone, Debug)]
pub enum SchemaNode {
    Folder(SchemaFolder),
    Piece(SchemaPiece),
}

/// An ordered namespace of named child nodes.
#[derive(Clone, Debug, Default)]
pub struct SchemaFolder {
    entries: Vec<(String, SchemaNode)>,
}

impl SchemaFolder {
    /// Build the tree from a parsed definition-file object.
    pub fn from_definition(definition: &Value) -> Result<Self, SchemaError> {
        let object = definition
            .as_object()
            .ok_or_else(|| SchemaError::InvalidDefinition {
                path: String::new(),
                reason: "schema definition must be a JSON object".into(),
            })?;
        Self::from_object("", object)
    }

    fn from_object(
        prefix: &str,
        object: &serde_json::Map<String, Value>,
    ) -> Result<Self, SchemaError> {
        let mut entries = Vec::with_capacity(object.len());
        for (name, child) in object {
            let path = join_path(prefix, name);
            let raw: RawNode = serde_json::from_value(child.clone()).map_err(|e| {
                SchemaError::InvalidDefinition {
                    path: path.clone(),
                    reason: e.to_string(),
                }
            })?;
            let node = match raw {
                RawNode::Piece(piece) => SchemaNode::Piece(SchemaPiece::from_raw(&path, piece)?),
                RawNode::Folder(children) => {
                    SchemaNode::Folder(Self::from_object(&path, &children)?)
                }
            };
            entries.push((name.clone(), node));
        }
        Ok(SchemaFolder { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.entries.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Navigate to a node by dotted path (e.g. `"channels.modlog"`).
    pub fn resolve(&self, path: &str) -> Option<&SchemaNode> {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let node = self
            .entries
            .iter()
            .find(|(name, _)| name == head)
            .map(|(_, node)| node)?;
        match (node, rest) {
            (node, None) => Some(node),
            (SchemaNode::Folder(folder), Some(rest)) => folder.resolve(rest),
            (SchemaNode::Piece(_), Some(_)) => None,
        }
    }

    /// Recursive mapping of each child to its default value.
    pub fn defaults(&self) -> Value {
        let mut object = serde_json::Map::new();
        for (name, node) in &self.entries {
            let value = match node {
                SchemaNode::Folder(folder) => folder.defaults(),
                SchemaNode::Piece(piece) => piece.default.clone(),
            };
            object.insert(name.clone(), value);
        }
        Value::Object(object)
    }

    /// Flatten to one column per reachable piece, in declaration order.
    /// Nested pieces are named by their dotted path.
    pub fn columns(&self) -> Vec<ColumnSpec> {
        let mut out = Vec::new();
        self.collect_columns("", &mut out);
        out
    }

    fn collect_columns(&self, prefix: &str, out: &mut Vec<ColumnSpec>) {
        for (name, node) in &self.entries {
            let path = join_path(prefix, name);
            match node {
                SchemaNode::Folder(folder) => folder.collect_columns(&path, out),
                SchemaNode::Piece(piece) => out.push(ColumnSpec::from_piece(path, piece)),
            }
        }
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}
