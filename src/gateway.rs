//! One configuration domain: owns the schema tree, resolves its provider by
//! name, and drives the one-shot initialization protocol.

use crate::error::{GatewayError, SchemaBootstrapError};
use crate::provider::{ColumnSpec, Provider, ProviderRegistry};
use crate::schema::{io, SchemaFolder};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::fs;

/// Init progress. The transition out of `Pending` happens synchronously,
/// before the first await, so overlapping `init` calls cannot both pass the
/// guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InitStatus {
    Pending,
    Initializing,
    Ready,
}

/// Gateway for one configuration domain (e.g. `"guilds"`). Construction is
/// cheap and synchronous; all I/O happens in [`Gateway::init`], which must
/// complete before the read accessors are usable.
pub struct Gateway {
    domain: String,
    provider_name: String,
    registry: Arc<ProviderRegistry>,
    base_dir: PathBuf,
    definition_path: PathBuf,
    status: Mutex<InitStatus>,
    schema: OnceLock<SchemaFolder>,
}

impl Gateway {
    /// `provider_name` falls back to the registry's default name when absent.
    /// The domain doubles as the backing table/collection name.
    pub fn new(
        domain: impl Into<String>,
        provider_name: Option<&str>,
        registry: Arc<ProviderRegistry>,
        base_dir: impl Into<PathBuf>,
    ) -> Self {
        let domain = domain.into();
        let provider_name = provider_name
            .map(str::to_string)
            .unwrap_or_else(|| registry.default_name());
        let base_dir = base_dir.into();
        let definition_path = base_dir.join(format!("{}_Schema.json", domain));
        Gateway {
            domain,
            provider_name,
            registry,
            base_dir,
            definition_path,
            status: Mutex::new(InitStatus::Pending),
            schema: OnceLock::new(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn definition_path(&self) -> &Path {
        &self.definition_path
    }

    pub fn ready(&self) -> bool {
        *self.status.lock().expect("gateway status lock poisoned") == InitStatus::Ready
    }

    /// Resolve the provider against the registry. Looked up on every call so
    /// registration after construction is observed; `None` when the name is
    /// unregistered (the decision how to handle that is the caller's).
    pub fn provider(&self) -> Option<Arc<dyn Provider>> {
        self.registry.get(&self.provider_name)
    }

    /// The schema tree, once `init` has completed.
    pub fn schema(&self) -> Option<&SchemaFolder> {
        self.schema.get()
    }

    /// One-shot initialization: schema bootstrap (definition file + tree),
    /// then storage bootstrap (table existence + creation). Calling this on a
    /// gateway that is initializing or ready fails with
    /// [`GatewayError::AlreadyInitialized`] without re-running either effect.
    ///
    /// On failure nothing is committed as ready and the status reverts, so
    /// the whole call may be retried; every effect is safe to re-run.
    pub async fn init(&self, default_schema: &Value) -> Result<(), GatewayError> {
        {
            let mut status = self.status.lock().expect("gateway status lock poisoned");
            if *status != InitStatus::Pending {
                return Err(GatewayError::AlreadyInitialized {
                    domain: self.domain.clone(),
                });
            }
            *status = InitStatus::Initializing;
        }

        match self.bootstrap(default_schema).await {
            Ok(schema) => {
                let _ = self.schema.set(schema);
                *self.status.lock().expect("gateway status lock poisoned") = InitStatus::Ready;
                tracing::info!(domain = %self.domain, "gateway ready");
                Ok(())
            }
            Err(err) => {
                *self.status.lock().expect("gateway status lock poisoned") = InitStatus::Pending;
                Err(err)
            }
        }
    }

    async fn bootstrap(&self, default_schema: &Value) -> Result<SchemaFolder, GatewayError> {
        fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| self.schema_phase(e))?;
        let effective = io::load_or_create(&self.definition_path, default_schema)
            .await
            .map_err(|e| self.schema_phase(e))?;
        let schema =
            SchemaFolder::from_definition(&effective).map_err(|e| self.schema_phase(e))?;

        let provider = self
            .provider()
            .ok_or_else(|| GatewayError::UnknownProvider {
                name: self.provider_name.clone(),
            })?;
        let storage_phase = |source| GatewayError::StorageBootstrap {
            domain: self.domain.clone(),
            source,
        };
        if !provider
            .has_table(&self.domain)
            .await
            .map_err(storage_phase)?
        {
            let mut columns = vec![ColumnSpec::identity()];
            columns.extend(schema.columns());
            tracing::info!(
                domain = %self.domain,
                provider = provider.name(),
                columns = columns.len(),
                "creating backing table"
            );
            provider
                .create_table(&self.domain, &columns)
                .await
                .map_err(storage_phase)?;
        }
        Ok(schema)
    }

    /// The schema tree's recursive default values plus the synthetic
    /// `"default": true` marker that tells fallback values apart from a
    /// persisted row that happens to equal them.
    ///
    /// Precondition: `init` has completed.
    pub fn defaults(&self) -> Result<Value, GatewayError> {
        let schema = self.schema.get().ok_or_else(|| self.not_initialized())?;
        let mut defaults = schema.defaults();
        if let Some(object) = defaults.as_object_mut() {
            object.insert("default".to_string(), Value::Bool(true));
        }
        Ok(defaults)
    }

    /// Identity column first, then one `(name, type)` pair per piece in
    /// declaration order, rendered through the resolved provider's dialect.
    ///
    /// Precondition: `init` has completed.
    pub fn sql_schema(&self) -> Result<Vec<(String, String)>, GatewayError> {
        let schema = self.schema.get().ok_or_else(|| self.not_initialized())?;
        let provider = self
            .provider()
            .ok_or_else(|| GatewayError::UnknownProvider {
                name: self.provider_name.clone(),
            })?;
        let identity = ColumnSpec::identity();
        let mut out = vec![(identity.name.clone(), provider.column_type(&identity))];
        for column in schema.columns() {
            let type_string = provider.column_type(&column);
            out.push((column.name, type_string));
        }
        Ok(out)
    }

    fn schema_phase(&self, source: impl Into<SchemaBootstrapError>) -> GatewayError {
        GatewayError::SchemaBootstrap {
            domain: self.domain.clone(),
            source: source.into(),
        }
    }

    fn not_initialized(&self) -> GatewayError {
        GatewayError::NotInitialized {
            domain: self.domain.clone(),
        }
    }
}
