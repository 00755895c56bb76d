//! Schema-driven settings gateway: declare a hierarchical configuration
//! schema once, then persist, validate, and retrieve per-entity values
//! through a pluggable relational or document backend.
//!
//! A [`Gateway`] owns one configuration domain (its schema tree and backing
//! table), resolves its [`Provider`] by name from a [`ProviderRegistry`], and
//! drives a one-shot, race-guarded initialization protocol: load or heal the
//! JSON definition file, build the schema tree, and create the backing
//! table/collection when absent.

pub mod error;
pub mod gateway;
pub mod provider;
pub mod schema;

pub use error::{GatewayError, ProviderError, SchemaBootstrapError, SchemaError};
pub use gateway::Gateway;
pub use provider::document::DocumentProvider;
pub use provider::postgres::PostgresProvider;
pub use provider::{ColumnSpec, Provider, ProviderKind, ProviderRegistry, IDENTITY_COLUMN};
pub use schema::{PieceKind, SchemaFolder, SchemaNode, SchemaPiece};
