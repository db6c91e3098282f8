//! Defines the `CatalogStore` trait and the statement/row types it exchanges.

use crate::error::StoreError;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A typed value bound to a `?` placeholder, or read back from a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<u64> for SqlValue {
    fn from(value: u64) -> Self {
        SqlValue::UInt(value)
    }
}

impl From<u32> for SqlValue {
    fn from(value: u32) -> Self {
        SqlValue::UInt(u64::from(value))
    }
}

impl From<usize> for SqlValue {
    fn from(value: usize) -> Self {
        SqlValue::UInt(value as u64)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

impl fmt::Display for SqlValue {
    /// SQL-literal style rendering, used for observation and logs only.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Int(v) => write!(f, "{v}"),
            SqlValue::UInt(v) => write!(f, "{v}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Text(v) => write!(f, "'{}'", v.replace('\\', "\\\\").replace('\'', "\\'")),
        }
    }
}

/// An SQL template with `?` placeholders and the values bound to them, in
/// order.
///
/// Text is appended with [`push_sql`](Self::push_sql) and values with
/// [`push_bind`](Self::push_bind), which writes the placeholder and records
/// the value in one step so the two can never drift apart. Only trusted
/// text (table names, column names, keywords) goes through `push_sql`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Appends trusted SQL text.
    pub fn push_sql(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Appends a `?` placeholder bound to `value`.
    pub fn push_bind(&mut self, value: impl Into<SqlValue>) -> &mut Self {
        self.sql.push('?');
        self.params.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    /// The template with every placeholder replaced by its rendered value.
    ///
    /// Meant for observers and logs. It is never sent to the store.
    pub fn render(&self) -> String {
        let mut rendered = String::with_capacity(self.sql.len() + self.params.len() * 8);
        let mut params = self.params.iter();
        for c in self.sql.chars() {
            if c == '?' {
                if let Some(value) = params.next() {
                    rendered.push_str(&value.to_string());
                    continue;
                }
            }
            rendered.push(c);
        }
        rendered
    }
}

/// One result row: column name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: BTreeMap<String, SqlValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.columns.insert(column.into(), value.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(column, value);
        self
    }

    /// The raw value of `column`, or `None` when the row lacks it.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns.get(column)
    }

    /// A required unsigned integer column.
    pub fn u64(&self, column: &str) -> Result<u64, StoreError> {
        self.opt_u64(column)?
            .ok_or_else(|| StoreError::decode(column, "missing or NULL"))
    }

    /// Reads a nullable unsigned integer column.
    ///
    /// # Arguments
    ///
    /// * `column` - The column name as selected by the statement.
    ///
    /// # Returns
    ///
    /// `None` for a missing or NULL column. Signed values are accepted when
    /// non-negative; anything else is a [`StoreError::Decode`].
    pub fn opt_u64(&self, column: &str) -> Result<Option<u64>, StoreError> {
        match self.get(column) {
            None | Some(SqlValue::Null) => Ok(None),
            Some(SqlValue::UInt(v)) => Ok(Some(*v)),
            Some(SqlValue::Int(v)) => u64::try_from(*v)
                .map(Some)
                .map_err(|_| StoreError::decode(column, format!("negative value {v}"))),
            Some(other) => Err(StoreError::decode(column, format!("expected integer, got {other}"))),
        }
    }

    /// Signed counterpart of [`opt_u64`](Self::opt_u64). Unsigned values
    /// above `i64::MAX` fail to decode.
    pub fn opt_i64(&self, column: &str) -> Result<Option<i64>, StoreError> {
        match self.get(column) {
            None | Some(SqlValue::Null) => Ok(None),
            Some(SqlValue::Int(v)) => Ok(Some(*v)),
            Some(SqlValue::UInt(v)) => i64::try_from(*v)
                .map(Some)
                .map_err(|_| StoreError::decode(column, format!("value {v} out of range"))),
            Some(other) => Err(StoreError::decode(column, format!("expected integer, got {other}"))),
        }
    }

    /// Relevance scores. Integers widen to `f64`.
    pub fn opt_f64(&self, column: &str) -> Result<Option<f64>, StoreError> {
        match self.get(column) {
            None | Some(SqlValue::Null) => Ok(None),
            Some(SqlValue::Float(v)) => Ok(Some(*v)),
            Some(SqlValue::Int(v)) => Ok(Some(*v as f64)),
            Some(SqlValue::UInt(v)) => Ok(Some(*v as f64)),
            Some(other) => Err(StoreError::decode(column, format!("expected number, got {other}"))),
        }
    }

    /// A nullable text column. Integer values are rendered as text.
    pub fn opt_text(&self, column: &str) -> Result<Option<String>, StoreError> {
        match self.get(column) {
            None | Some(SqlValue::Null) => Ok(None),
            Some(SqlValue::Text(v)) => Ok(Some(v.clone())),
            Some(SqlValue::Int(v)) => Ok(Some(v.to_string())),
            Some(SqlValue::UInt(v)) => Ok(Some(v.to_string())),
            Some(other) => Err(StoreError::decode(column, format!("expected text, got {other}"))),
        }
    }
}

/// The storage boundary: run one parameterized statement, get rows back.
///
/// Implementations must bind [`Statement::params`] as typed parameters and
/// never splice them into the SQL text.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>, StoreError>;
}

#[async_trait]
impl<S: CatalogStore + ?Sized> CatalogStore for Arc<S> {
    async fn execute(&self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
        (**self).execute(statement).await
    }
}
