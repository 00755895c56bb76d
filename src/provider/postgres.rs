//! Reference relational provider over PostgreSQL (sqlx).

use crate::error::ProviderError;
use crate::provider::{ColumnSpec, Provider, ProviderKind, IDENTITY_COLUMN};
use crate::schema::PieceKind;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgPool, PgTypeInfo, Postgres};
use sqlx::Database;

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// A value that can be bound to a PostgreSQL query. Converts from serde_json::Value.
#[derive(Clone, Debug)]
enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Json(Value),
}

impl PgBindValue {
    fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PgBindValue::I64(i)
                } else {
                    PgBindValue::F64(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => PgBindValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => PgBindValue::Json(v.clone()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null => <Option<i32> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::String(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
            PgBindValue::Json(v) => <Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

pub struct PostgresProvider {
    pool: PgPool,
}

impl PostgresProvider {
    pub fn new(pool: PgPool) -> Self {
        PostgresProvider { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, ProviderError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(PostgresProvider { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Columns and bind values for an INSERT/UPDATE, identity excluded.
    fn row_entries<'a>(
        table: &str,
        data: &'a Value,
    ) -> Result<Vec<(&'a String, PgBindValue)>, ProviderError> {
        let object = data.as_object().ok_or_else(|| ProviderError::NotAnObject {
            table: table.to_string(),
        })?;
        Ok(object
            .iter()
            .filter(|(name, _)| name.as_str() != IDENTITY_COLUMN)
            .map(|(name, value)| (name, PgBindValue::from_json(value)))
            .collect())
    }
}

#[async_trait]
impl Provider for PostgresProvider {
    fn name(&self) -> &str {
        "postgres"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Relational
    }

    async fn has_table(&self, table: &str) -> Result<bool, ProviderError> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1)",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists.0)
    }

    async fn create_table(&self, table: &str, columns: &[ColumnSpec]) -> Result<(), ProviderError> {
        let col_defs: Vec<String> = columns
            .iter()
            .map(|c| {
                let mut def = format!("{} {}", quote(&c.name), self.column_type(c));
                if c.identity {
                    def.push_str(" NOT NULL UNIQUE PRIMARY KEY");
                }
                def
            })
            .collect();
        let sql = format!("CREATE TABLE {} (\n  {}\n)", quote(table), col_defs.join(",\n  "));
        tracing::debug!(sql = %sql, "create table");
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    fn column_type(&self, column: &ColumnSpec) -> String {
        if column.identity {
            return "VARCHAR(19)".to_string();
        }
        if column.array {
            return "JSONB".to_string();
        }
        match column.kind {
            PieceKind::String => column
                .max_length
                .map(|n| format!("VARCHAR({})", n))
                .unwrap_or_else(|| "TEXT".to_string()),
            PieceKind::Integer => "BIGINT".to_string(),
            PieceKind::Float => "DOUBLE PRECISION".to_string(),
            PieceKind::Boolean => "BOOL".to_string(),
            PieceKind::Any => "JSONB".to_string(),
        }
    }

    async fn get(&self, table: &str, id: &str) -> Result<Option<Value>, ProviderError> {
        let sql = format!(
            "SELECT row_to_json(t) FROM {} t WHERE t.{} = $1",
            quote(table),
            quote(IDENTITY_COLUMN)
        );
        let row: Option<(Value,)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn get_all(&self, table: &str) -> Result<Vec<Value>, ProviderError> {
        let sql = format!("SELECT row_to_json(t) FROM {} t", quote(table));
        let rows: Vec<(Value,)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|(value,)| value).collect())
    }

    async fn has(&self, table: &str, id: &str) -> Result<bool, ProviderError> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = $1)",
            quote(table),
            quote(IDENTITY_COLUMN)
        );
        let exists: (bool,) = sqlx::query_as(&sql).bind(id).fetch_one(&self.pool).await?;
        Ok(exists.0)
    }

    async fn create(&self, table: &str, id: &str, data: &Value) -> Result<(), ProviderError> {
        let entries = Self::row_entries(table, data)?;
        let mut columns = vec![quote(IDENTITY_COLUMN)];
        let mut placeholders = vec!["$1".to_string()];
        for (i, (name, _)) in entries.iter().enumerate() {
            columns.push(quote(name));
            placeholders.push(format!("${}", i + 2));
        }
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(table),
            columns.join(", "),
            placeholders.join(", ")
        );
        tracing::debug!(sql = %sql, "insert row");
        let mut query = sqlx::query(&sql).bind(id);
        for (_, value) in entries {
            query = query.bind(value);
        }
        query.execute(&self.pool).await?;
        Ok(())
    }

    async fn update(&self, table: &str, id: &str, data: &Value) -> Result<(), ProviderError> {
        let entries = Self::row_entries(table, data)?;
        if entries.is_empty() {
            return Ok(());
        }
        let assignments: Vec<String> = entries
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("{} = ${}", quote(name), i + 2))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = $1",
            quote(table),
            assignments.join(", "),
            quote(IDENTITY_COLUMN)
        );
        tracing::debug!(sql = %sql, "update row");
        let mut query = sqlx::query(&sql).bind(id);
        for (_, value) in entries {
            query = query.bind(value);
        }
        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(ProviderError::RowNotFound {
                table: table.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn replace(&self, table: &str, id: &str, data: &Value) -> Result<(), ProviderError> {
        let mut tx = self.pool.begin().await?;
        let delete_sql = format!(
            "DELETE FROM {} WHERE {} = $1",
            quote(table),
            quote(IDENTITY_COLUMN)
        );
        sqlx::query(&delete_sql).bind(id).execute(&mut *tx).await?;

        let entries = Self::row_entries(table, data)?;
        let mut columns = vec![quote(IDENTITY_COLUMN)];
        let mut placeholders = vec!["$1".to_string()];
        for (i, (name, _)) in entries.iter().enumerate() {
            columns.push(quote(name));
            placeholders.push(format!("${}", i + 2));
        }
        let insert_sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(table),
            columns.join(", "),
            placeholders.join(", ")
        );
        let mut query = sqlx::query(&insert_sql).bind(id);
        for (_, value) in entries {
            query = query.bind(value);
        }
        query.execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), ProviderError> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1",
            quote(table),
            quote(IDENTITY_COLUMN)
        );
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }
}
