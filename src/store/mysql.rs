//! `CatalogStore` over an sqlx MySQL connection pool.

use crate::error::StoreError;
use crate::store::adapter::{CatalogStore, Row, SqlValue, Statement};
use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row as _, TypeInfo};
use std::time::Duration;
use tracing::{debug, info};

/// Catalog store backed by a MySQL/MariaDB database.
///
/// The search statements only read, so the pool can point at a replica.
#[derive(Debug, Clone)]
pub struct MySqlCatalogStore {
    pool: MySqlPool,
}

impl MySqlCatalogStore {
    /// Wraps an existing pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Opens a pool sized for interactive search traffic.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = MySqlPoolOptions::new()
            .min_connections(1)
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .connect(url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        info!("Connected catalog store");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for MySqlCatalogStore {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        let mut query = sqlx::query(statement.sql());
        for value in statement.params() {
            query = match value {
                SqlValue::Null => query.bind(None::<String>),
                SqlValue::Int(v) => query.bind(*v),
                SqlValue::UInt(v) => query.bind(*v),
                SqlValue::Float(v) => query.bind(*v),
                SqlValue::Text(v) => query.bind(v.as_str()),
            };
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::query_with_source("catalog query failed", e))?;

        debug!(rows = rows.len(), "catalog query returned");
        rows.iter().map(decode_row).collect()
    }
}

fn decode_row(row: &MySqlRow) -> Result<Row, StoreError> {
    let mut decoded = Row::new();
    for column in row.columns() {
        let value = decode_value(row, column.ordinal(), column.type_info().name())
            .map_err(|e| StoreError::decode(column.name(), e.to_string()))?;
        decoded.insert(column.name(), value);
    }
    Ok(decoded)
}

/// Maps a MySQL column to the closest [`SqlValue`]. The search statements
/// cast aggregates to integers, so DECIMAL never shows up here.
fn decode_value(row: &MySqlRow, index: usize, type_name: &str) -> Result<SqlValue, sqlx::Error> {
    let value = match type_name {
        "NULL" => None,
        "BOOLEAN" => row.try_get::<Option<bool>, _>(index)?.map(|b| SqlValue::Int(i64::from(b))),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            row.try_get::<Option<i64>, _>(index)?.map(SqlValue::Int)
        }
        name if name.ends_with("UNSIGNED") => row.try_get::<Option<u64>, _>(index)?.map(SqlValue::UInt),
        "FLOAT" | "DOUBLE" => row.try_get::<Option<f64>, _>(index)?.map(SqlValue::Float),
        _ => row.try_get::<Option<String>, _>(index)?.map(SqlValue::Text),
    };
    Ok(value.unwrap_or(SqlValue::Null))
}
