//! End-to-end coverage of the gateway initialization protocol.

use async_trait::async_trait;
use serde_json::{json, Value};
use settings_gateway::{
    ColumnSpec, DocumentProvider, Gateway, GatewayError, Provider, ProviderError, ProviderKind,
    ProviderRegistry,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory provider that records every bootstrap call.
#[derive(Default)]
struct RecordingProvider {
    table_exists: AtomicBool,
    has_table_calls: AtomicUsize,
    create_table_calls: AtomicUsize,
    created_columns: Mutex<Vec<String>>,
}

#[async_trait]
impl Provider for RecordingProvider {
    fn name(&self) -> &str {
        "recording"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Document
    }

    async fn has_table(&self, _table: &str) -> Result<bool, ProviderError> {
        self.has_table_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.table_exists.load(Ordering::SeqCst))
    }

    async fn create_table(&self, _table: &str, columns: &[ColumnSpec]) -> Result<(), ProviderError> {
        self.create_table_calls.fetch_add(1, Ordering::SeqCst);
        *self.created_columns.lock().unwrap() =
            columns.iter().map(|c| c.name.clone()).collect();
        self.table_exists.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn column_type(&self, column: &ColumnSpec) -> String {
        if column.identity {
            "VARCHAR(19)".to_string()
        } else {
            column.kind.as_str().to_string()
        }
    }

    async fn get(&self, _: &str, _: &str) -> Result<Option<Value>, ProviderError> {
        Ok(None)
    }
    async fn get_all(&self, _: &str) -> Result<Vec<Value>, ProviderError> {
        Ok(Vec::new())
    }
    async fn has(&self, _: &str, _: &str) -> Result<bool, ProviderError> {
        Ok(false)
    }
    async fn create(&self, _: &str, _: &str, _: &Value) -> Result<(), ProviderError> {
        Ok(())
    }
    async fn update(&self, _: &str, _: &str, _: &Value) -> Result<(), ProviderError> {
        Ok(())
    }
    async fn replace(&self, _: &str, _: &str, _: &Value) -> Result<(), ProviderError> {
        Ok(())
    }
    async fn delete(&self, _: &str, _: &str) -> Result<(), ProviderError> {
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn guild_schema() -> Value {
    json!({ "prefix": { "type": "string", "default": "!" } })
}

fn recording_setup() -> (Arc<ProviderRegistry>, Arc<RecordingProvider>) {
    let registry = Arc::new(ProviderRegistry::new("recording"));
    let provider = Arc::new(RecordingProvider::default());
    registry.register(provider.clone());
    (registry, provider)
}

#[tokio::test]
async fn init_writes_the_definition_file_and_builds_the_schema() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (registry, provider) = recording_setup();
    let gateway = Gateway::new("guilds", None, registry, dir.path());

    assert!(!gateway.ready());
    gateway.init(&guild_schema()).await.unwrap();
    assert!(gateway.ready());

    let on_disk: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("guilds_Schema.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(on_disk, guild_schema());

    assert_eq!(gateway.defaults().unwrap(), json!({ "prefix": "!", "default": true }));
    assert_eq!(
        gateway.sql_schema().unwrap(),
        vec![
            ("id".to_string(), "VARCHAR(19)".to_string()),
            ("prefix".to_string(), "string".to_string()),
        ]
    );
    assert_eq!(provider.create_table_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *provider.created_columns.lock().unwrap(),
        vec!["id".to_string(), "prefix".to_string()]
    );
}

#[tokio::test]
async fn second_init_fails_without_rerunning_either_effect() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, provider) = recording_setup();
    let gateway = Gateway::new("guilds", None, registry, dir.path());

    gateway.init(&guild_schema()).await.unwrap();
    let err = gateway.init(&guild_schema()).await.unwrap_err();
    assert!(matches!(err, GatewayError::AlreadyInitialized { ref domain } if domain == "guilds"));
    assert_eq!(provider.has_table_calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.create_table_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_init_admits_exactly_one_caller() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, provider) = recording_setup();
    let gateway = Gateway::new("guilds", None, registry, dir.path());

    let schema = guild_schema();
    let (first, second) = tokio::join!(gateway.init(&schema), gateway.init(&schema));
    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(GatewayError::AlreadyInitialized { .. }))));
    assert_eq!(provider.create_table_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn existing_table_suppresses_creation() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, provider) = recording_setup();
    provider.table_exists.store(true, Ordering::SeqCst);
    let gateway = Gateway::new("guilds", None, registry, dir.path());

    gateway.init(&guild_schema()).await.unwrap();
    assert_eq!(provider.has_table_calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.create_table_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn corrupt_definition_file_is_healed_without_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("guilds_Schema.json"), "{ broken").unwrap();
    let (registry, _provider) = recording_setup();
    let gateway = Gateway::new("guilds", None, registry, dir.path());

    gateway.init(&guild_schema()).await.unwrap();
    let on_disk: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("guilds_Schema.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(on_disk, guild_schema());
}

#[tokio::test]
async fn second_gateway_loads_the_persisted_definition_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _provider) = recording_setup();

    let first = Gateway::new("guilds", None, registry.clone(), dir.path());
    first.init(&guild_schema()).await.unwrap();

    // A different default on the second boot must lose to the persisted file.
    let other_default = json!({ "prefix": { "type": "string", "default": "?" } });
    let second = Gateway::new("guilds", None, registry, dir.path());
    second.init(&other_default).await.unwrap();

    assert_eq!(
        second.defaults().unwrap(),
        json!({ "prefix": "!", "default": true })
    );
    let on_disk: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("guilds_Schema.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(on_disk, guild_schema());
}

#[tokio::test]
async fn invalid_definition_fails_in_the_schema_phase_with_domain_context() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, provider) = recording_setup();
    let gateway = Gateway::new("guilds", None, registry, dir.path());

    let err = gateway
        .init(&json!({ "color": { "type": "rgb", "default": null } }))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::SchemaBootstrap { ref domain, .. } if domain == "guilds"));
    let message = err.to_string();
    assert!(message.contains("schema bootstrap"), "message: {message}");
    assert!(message.contains("guilds"), "message: {message}");
    assert!(message.contains("rgb"), "message: {message}");

    // Schema-phase failures never reach the storage phase.
    assert_eq!(provider.has_table_calls.load(Ordering::SeqCst), 0);
    assert!(!gateway.ready());
}

#[tokio::test]
async fn accessors_before_init_report_the_precondition() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _provider) = recording_setup();
    let gateway = Gateway::new("guilds", None, registry, dir.path());

    assert!(matches!(
        gateway.defaults().unwrap_err(),
        GatewayError::NotInitialized { .. }
    ));
    assert!(matches!(
        gateway.sql_schema().unwrap_err(),
        GatewayError::NotInitialized { .. }
    ));
    assert!(gateway.schema().is_none());
}

#[tokio::test]
async fn unregistered_provider_fails_init_but_is_observable_later() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProviderRegistry::new("recording"));
    let gateway = Gateway::new("guilds", None, registry.clone(), dir.path());

    assert!(gateway.provider().is_none());
    let err = gateway.init(&guild_schema()).await.unwrap_err();
    assert!(matches!(err, GatewayError::UnknownProvider { ref name } if name == "recording"));
    assert!(!gateway.ready());

    // Late registration is observed and the whole call can be retried.
    registry.register(Arc::new(RecordingProvider::default()));
    assert!(gateway.provider().is_some());
    gateway.init(&guild_schema()).await.unwrap();
    assert!(gateway.ready());
}

#[tokio::test]
async fn explicit_provider_name_overrides_the_registry_default() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _provider) = recording_setup();
    let gateway = Gateway::new("users", Some("absent"), registry, dir.path());
    assert_eq!(gateway.provider_name(), "absent");
    assert!(gateway.provider().is_none());
}

#[tokio::test]
async fn document_provider_serves_a_full_boot_and_row_cycle() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ProviderRegistry::new("document"));
    let provider = Arc::new(
        DocumentProvider::open(dir.path().join("store")).expect("open document store"),
    );
    registry.register(provider.clone());

    let gateway = Gateway::new("guilds", None, registry, dir.path().join("bwd"));
    let schema = json!({
        "prefix": { "type": "string", "default": "!", "max": 10.0 },
        "channels": {
            "modlog": { "type": "string", "default": null }
        }
    });
    gateway.init(&schema).await.unwrap();

    assert!(provider.has_table("guilds").await.unwrap());
    assert_eq!(
        gateway.defaults().unwrap(),
        json!({
            "prefix": "!",
            "channels": { "modlog": null },
            "default": true
        })
    );

    provider
        .create("guilds", "4444", &json!({ "prefix": "?" }))
        .await
        .unwrap();
    let row = provider.get("guilds", "4444").await.unwrap().unwrap();
    assert_eq!(row["prefix"], json!("?"));
}
