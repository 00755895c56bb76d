//! Typed errors, one enum per layer.

use thiserror::Error;

/// Problems with a schema definition or a value checked against it.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("unknown piece type '{type_name}' at '{path}'")]
    UnknownType { path: String, type_name: String },
    #[error("invalid schema definition at '{path}': {reason}")]
    InvalidDefinition { path: String, reason: String },
    #[error("value for '{path}' failed validation: {reason}")]
    Validation { path: String, reason: String },
}

/// Storage backend failures, relational or document.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("document store: {0}")]
    Document(#[from] sled::Error),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("row '{id}' not found in '{table}'")]
    RowNotFound { table: String, id: String },
    #[error("row data for '{table}' must be a JSON object")]
    NotAnObject { table: String },
}

/// What failed during schema bootstrap: the filesystem or the definition
/// itself.
#[derive(Error, Debug)]
pub enum SchemaBootstrapError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Errors surfaced by the gateway itself. Bootstrap failures carry the domain
/// and the failing phase so a filesystem problem can be told apart from a
/// storage-backend problem.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// `init` was called on a gateway that is initializing or already ready.
    /// This is a caller bug, not a transient condition.
    #[error("gateway '{domain}' is already initialized")]
    AlreadyInitialized { domain: String },
    /// A read accessor was used before `init` completed.
    #[error("gateway '{domain}' is not initialized; call init first")]
    NotInitialized { domain: String },
    #[error("no provider named '{name}' is registered")]
    UnknownProvider { name: String },
    #[error("schema bootstrap failed for '{domain}': {source}")]
    SchemaBootstrap {
        domain: String,
        #[source]
        source: SchemaBootstrapError,
    },
    #[error("storage bootstrap failed for '{domain}': {source}")]
    StorageBootstrap {
        domain: String,
        #[source]
        source: ProviderError,
    },
}
