//! Definition-file persistence.
//!
//! The file is a bootstrap artifact, not a source of truth: a missing or
//! unparsable file is healed by rewriting the supplied default. Writes go
//! through a temp file and a rename so a crash mid-write never leaves a
//! partially-written file observable.

use serde_json::Value;
use std::io;
use std::path::Path;
use tokio::fs;

/// Load the definition at `path`, or atomically write `default` there and
/// return it when the file is absent or does not parse.
pub async fn load_or_create(path: &Path, default: &Value) -> io::Result<Value> {
    match fs::read_to_string(path).await {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "definition file is corrupt; rewriting with the default schema"
                );
                write_atomic(path, default).await?;
                Ok(default.clone())
            }
        },
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            write_atomic(path, default).await?;
            Ok(default.clone())
        }
        Err(err) => Err(err),
    }
}

/// Write `value` as pretty JSON via temp-file-then-rename.
pub async fn write_atomic(path: &Path, value: &Value) -> io::Result<()> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, content).await?;
    fs::rename(&temp_path, path).await
}
