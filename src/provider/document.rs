//! Reference document provider over sled. Each table maps to a sled tree;
//! the tree key is the identity field, so uniqueness comes for free.

use crate::error::ProviderError;
use crate::provider::{ColumnSpec, Provider, ProviderKind, IDENTITY_COLUMN};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

pub struct DocumentProvider {
    db: sled::Db,
}

impl DocumentProvider {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        Ok(DocumentProvider {
            db: sled::open(path)?,
        })
    }

    fn tree(&self, table: &str) -> Result<sled::Tree, ProviderError> {
        Ok(self.db.open_tree(table)?)
    }

    /// Stored form of a row: the caller's object with the identity field set.
    fn document(table: &str, id: &str, data: &Value) -> Result<Vec<u8>, ProviderError> {
        let object = data.as_object().ok_or_else(|| ProviderError::NotAnObject {
            table: table.to_string(),
        })?;
        let mut stored = serde_json::Map::new();
        stored.insert(IDENTITY_COLUMN.to_string(), Value::String(id.to_string()));
        for (name, value) in object {
            if name != IDENTITY_COLUMN {
                stored.insert(name.clone(), value.clone());
            }
        }
        Ok(serde_json::to_vec(&Value::Object(stored))?)
    }
}

/// Recursively merge `patch` into `base`. Non-object values replace.
fn merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (name, value) in patch {
                match base.get_mut(name) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(name.clone(), value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

#[async_trait]
impl Provider for DocumentProvider {
    fn name(&self) -> &str {
        "document"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Document
    }

    async fn has_table(&self, table: &str) -> Result<bool, ProviderError> {
        Ok(self
            .db
            .tree_names()
            .iter()
            .any(|name| name.as_ref() == table.as_bytes()))
    }

    async fn create_table(&self, table: &str, _columns: &[ColumnSpec]) -> Result<(), ProviderError> {
        // Documents are schemaless; opening the tree is the whole bootstrap.
        self.db.open_tree(table)?;
        self.db.flush()?;
        Ok(())
    }

    fn column_type(&self, column: &ColumnSpec) -> String {
        if column.array {
            format!("{}[]", column.kind.as_str())
        } else {
            column.kind.as_str().to_string()
        }
    }

    async fn get(&self, table: &str, id: &str) -> Result<Option<Value>, ProviderError> {
        match self.tree(table)?.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn get_all(&self, table: &str) -> Result<Vec<Value>, ProviderError> {
        let mut rows = Vec::new();
        for entry in self.tree(table)?.iter() {
            let (_, bytes) = entry?;
            rows.push(serde_json::from_slice(&bytes)?);
        }
        Ok(rows)
    }

    async fn has(&self, table: &str, id: &str) -> Result<bool, ProviderError> {
        Ok(self.tree(table)?.contains_key(id.as_bytes())?)
    }

    async fn create(&self, table: &str, id: &str, data: &Value) -> Result<(), ProviderError> {
        let tree = self.tree(table)?;
        tree.insert(id.as_bytes(), Self::document(table, id, data)?)?;
        tree.flush()?;
        Ok(())
    }

    async fn update(&self, table: &str, id: &str, data: &Value) -> Result<(), ProviderError> {
        let tree = self.tree(table)?;
        let bytes = tree
            .get(id.as_bytes())?
            .ok_or_else(|| ProviderError::RowNotFound {
                table: table.to_string(),
                id: id.to_string(),
            })?;
        let mut row: Value = serde_json::from_slice(&bytes)?;
        merge(&mut row, data);
        tree.insert(id.as_bytes(), Self::document(table, id, &row)?)?;
        tree.flush()?;
        Ok(())
    }

    async fn replace(&self, table: &str, id: &str, data: &Value) -> Result<(), ProviderError> {
        self.create(table, id, data).await
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), ProviderError> {
        let tree = self.tree(table)?;
        tree.remove(id.as_bytes())?;
        tree.flush()?;
        Ok(())
    }
}
