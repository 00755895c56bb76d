//! Storage abstraction: the gateway drives every backend through this trait
//! and never branches on backend kind. Backend-specific typing lives in the
//! provider's `column_type`; everything else is expressed over JSON rows
//! keyed by the identity column.

pub mod document;
pub mod postgres;
pub mod registry;

use crate::error::ProviderError;
use crate::schema::{PieceKind, SchemaPiece};
use async_trait::async_trait;
use serde_json::Value;

pub use registry::ProviderRegistry;

/// Column name of the synthetic identity key present on every table.
pub const IDENTITY_COLUMN: &str = "id";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Relational,
    Document,
}

/// Backend-neutral description of one column/field.
#[derive(Clone, Debug)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: PieceKind,
    pub array: bool,
    /// Upper length bound for string pieces, when declared.
    pub max_length: Option<u32>,
    /// The synthetic primary-key column (`id`): unique, non-null.
    pub identity: bool,
}

impl ColumnSpec {
    /// The always-present identity column, prepended to every table.
    pub fn identity() -> Self {
        ColumnSpec {
            name: IDENTITY_COLUMN.to_string(),
            kind: PieceKind::String,
            array: false,
            max_length: None,
            identity: true,
        }
    }

    pub fn from_piece(name: String, piece: &SchemaPiece) -> Self {
        let max_length = match piece.kind {
            PieceKind::String => piece.max.map(|max| max as u32),
            _ => None,
        };
        ColumnSpec {
            name,
            kind: piece.kind,
            array: piece.array,
            max_length,
            identity: false,
        }
    }
}

/// A pluggable storage backend. Shared process-wide through the
/// [`ProviderRegistry`]; gateways look providers up by name and never own them.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry key for this provider.
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// Whether the backing table/collection exists. Must be side-effect free.
    async fn has_table(&self, table: &str) -> Result<bool, ProviderError>;

    /// Create the backing table/collection. Callers check `has_table` first;
    /// no create-if-not-exists semantics are required here.
    async fn create_table(&self, table: &str, columns: &[ColumnSpec]) -> Result<(), ProviderError>;

    /// Dialect-specific type string for one column. Document providers report
    /// the abstract kind name.
    fn column_type(&self, column: &ColumnSpec) -> String;

    /// Fetch one row by identity, as a JSON object, or `None` when absent.
    async fn get(&self, table: &str, id: &str) -> Result<Option<Value>, ProviderError>;

    /// Fetch every row in the table.
    async fn get_all(&self, table: &str) -> Result<Vec<Value>, ProviderError>;

    /// Whether a row with this identity exists.
    async fn has(&self, table: &str, id: &str) -> Result<bool, ProviderError>;

    /// Insert a new row. `data` must be a JSON object; the identity column is
    /// filled from `id`.
    async fn create(&self, table: &str, id: &str, data: &Value) -> Result<(), ProviderError>;

    /// Merge `data` into an existing row. Fails with [`ProviderError::RowNotFound`]
    /// when the row is absent.
    async fn update(&self, table: &str, id: &str, data: &Value) -> Result<(), ProviderError>;

    /// Overwrite an existing row entirely.
    async fn replace(&self, table: &str, id: &str, data: &Value) -> Result<(), ProviderError>;

    /// Delete a row. Deleting an absent row is not an error.
    async fn delete(&self, table: &str, id: &str) -> Result<(), ProviderError>;
}
