//! PostgreSQL storage backend.
//!
//! Executes dynamically-built SQL over a `sqlx::PgPool` and returns rows as
//! dynamic JSON records by wrapping every statement in `row_to_json`, so no
//! compile-time schema knowledge is required. Literal values are inlined
//! with quote escaping by the query layer's formatter.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};
use tracing::error;

use crate::entity::EntityDescriptor;
use crate::query::conditions::format_value;
use crate::query::SelectQuery;
use crate::storage::{Record, Storage, StorageError, StorageResult};

/// sqlstate: relation does not exist
const UNDEFINED_TABLE: &str = "42P01";
/// sqlstate: column does not exist / invalid column reference
const UNDEFINED_COLUMN: &str = "42703";
const INVALID_COLUMN_REFERENCE: &str = "42P10";

#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_error(entity: &str, err: sqlx::Error) -> StorageError {
        match &err {
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.to_string()).unwrap_or_default();
                match code.as_str() {
                    UNDEFINED_TABLE => {
                        error!(entity = entity, code = %code, "relation missing for entity");
                        StorageError::TableNotFound {
                            entity: entity.to_string(),
                            message: db.message().to_string(),
                        }
                    }
                    UNDEFINED_COLUMN | INVALID_COLUMN_REFERENCE => {
                        error!(entity = entity, code = %code, "schema mismatch for entity");
                        StorageError::Schema {
                            entity: entity.to_string(),
                            message: db.message().to_string(),
                        }
                    }
                    _ => StorageError::Query(db.message().to_string()),
                }
            }
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Tls(_) => StorageError::Communication(err.to_string()),
            _ => StorageError::Query(err.to_string()),
        }
    }

    fn decode_record(entity: &str, row: &sqlx::postgres::PgRow) -> StorageResult<Record> {
        let value: Value = row
            .try_get("record")
            .map_err(|e| Self::map_error(entity, e))?;
        match value {
            Value::Object(map) => Ok(map),
            other => Err(StorageError::Query(format!(
                "expected row object for {entity}, got {other}"
            ))),
        }
    }

    /// Render `(col, ..) VALUES (val, ..)` fragments with sorted columns so
    /// generated SQL is deterministic.
    fn column_fragments(attrs: &Record) -> (String, String) {
        let mut columns: Vec<&String> = attrs.keys().collect();
        columns.sort();
        let names = columns
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let values = columns
            .iter()
            .map(|c| format_value(&attrs[c.as_str()]))
            .collect::<Vec<_>>()
            .join(", ");
        (names, values)
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn insert(&self, entity: &EntityDescriptor, attrs: &Record) -> StorageResult<Record> {
        let (columns, values) = Self::column_fragments(attrs);
        let sql = format!(
            "INSERT INTO {table} AS t ({columns}) VALUES ({values}) RETURNING row_to_json(t) AS record",
            table = entity.name,
        );

        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::map_error(&entity.name, e))?;
        Self::decode_record(&entity.name, &row)
    }

    async fn fetch_by_id(
        &self,
        entity: &EntityDescriptor,
        id: &Value,
    ) -> StorageResult<Option<Record>> {
        let sql = format!(
            "SELECT row_to_json(t) AS record FROM {table} AS t WHERE t.{pk} = {id}",
            table = entity.name,
            pk = entity.primary_key,
            id = format_value(id),
        );

        let row = sqlx::query(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::map_error(&entity.name, e))?;
        match row {
            Some(row) => Ok(Some(Self::decode_record(&entity.name, &row)?)),
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        entity: &EntityDescriptor,
        id: &Value,
        attrs: &Record,
    ) -> StorageResult<Option<Record>> {
        let mut columns: Vec<&String> = attrs.keys().collect();
        columns.sort();
        let assignments = columns
            .iter()
            .map(|c| format!("{} = {}", c, format_value(&attrs[c.as_str()])))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "UPDATE {table} AS t SET {assignments} WHERE t.{pk} = {id} RETURNING row_to_json(t) AS record",
            table = entity.name,
            pk = entity.primary_key,
            id = format_value(id),
        );

        let row = sqlx::query(&sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::map_error(&entity.name, e))?;
        match row {
            Some(row) => Ok(Some(Self::decode_record(&entity.name, &row)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, entity: &EntityDescriptor, id: &Value) -> StorageResult<bool> {
        let sql = format!(
            "DELETE FROM {table} WHERE {pk} = {id}",
            table = entity.name,
            pk = entity.primary_key,
            id = format_value(id),
        );

        let result = sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::map_error(&entity.name, e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn select(
        &self,
        entity: &EntityDescriptor,
        query: &SelectQuery,
    ) -> StorageResult<Vec<Record>> {
        let sql = format!(
            "SELECT row_to_json(q) AS record FROM ({inner}) AS q",
            inner = query.sql,
        );

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::map_error(&entity.name, e))?;
        rows.iter()
            .map(|row| Self::decode_record(&entity.name, row))
            .collect()
    }

    async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Self::map_error("health", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_fragments_are_sorted_and_escaped() {
        let attrs = json!({"name": "o'clock", "count": 3})
            .as_object()
            .cloned()
            .unwrap();
        let (columns, values) = PgStorage::column_fragments(&attrs);
        assert_eq!(columns, "count, name");
        assert_eq!(values, "3, 'o''clock'");
    }
}
