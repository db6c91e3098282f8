//! Error types shared by the search core and the storage boundary.

use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors surfaced by a search call.
///
/// None of these are retried inside the crate. Retrying on storage errors is
/// a transport-layer decision.
#[derive(Debug, Error)]
pub enum SearchError {
  /// A setup defect, such as an unknown field identifier. Validation of the
  /// storefront configuration should have prevented it.
  #[error("configuration error: {0}")]
  Configuration(String),

  /// Malformed request input, for example a negative limit.
  #[error("validation error: {0}")]
  Validation(String),

  /// The catalog store round trip failed.
  #[error("storage error: {0}")]
  Storage(#[from] StoreError),

  /// The caller cancelled the search between two strategies.
  #[error("search cancelled")]
  Cancelled,

  /// The engine timeout elapsed between two strategies.
  #[error("search timed out after {0:?}")]
  Timeout(Duration),
}

impl SearchError {
  pub(crate) fn configuration(message: impl Into<String>) -> Self {
    Self::Configuration(message.into())
  }

  pub(crate) fn validation(message: impl Into<String>) -> Self {
    Self::Validation(message.into())
  }
}

/// Errors raised by a [`CatalogStore`](crate::store::CatalogStore).
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("query failed: {message}")]
  Query {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
  },

  #[error("cannot decode column `{column}`: {message}")]
  Decode { column: String, message: String },

  #[error("catalog store unavailable: {0}")]
  Unavailable(String),
}

impl StoreError {
  pub fn query(message: impl Into<String>) -> Self {
    Self::Query {
      message: message.into(),
      source: None,
    }
  }

  pub fn query_with_source(
    message: impl Into<String>,
    source: impl std::error::Error + Send + Sync + 'static,
  ) -> Self {
    Self::Query {
      message: message.into(),
      source: Some(Box::new(source)),
    }
  }

  pub(crate) fn decode(column: &str, message: impl Into<String>) -> Self {
    Self::Decode {
      column: column.to_string(),
      message: message.into(),
    }
  }
}
