//! The `SearchEngineProvider` trait, the seam between the engine and storage.

use crate::context::StrategyRequest;
use crate::error::Result;
use crate::query::SearchQuery;
use crate::strategy::StrategyId;
use crate::types::{CategoryMatch, ManufacturerMatch, ProductMatch};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Runs matching strategies against a catalog.
///
/// The engine decides which strategies run, in which order, and with what
/// budget; a provider only knows how to evaluate one strategy. Each
/// strategy owns its ordering (see [`StrategyId::ranking`]).
///
/// Implementations must:
/// - return at most `limit` records, and none at all for a limit of zero;
/// - never return a product listed in the exclusion set;
/// - issue at most one catalog query per call;
/// - pass user-derived text to the store only as bound parameters.
///
/// The `Send` and `Sync` bounds let one provider serve concurrent requests.
#[async_trait]
pub trait SearchEngineProvider: Send + Sync {
  /// Evaluates one product strategy.
  async fn execute(
    &self,
    strategy: StrategyId,
    request: StrategyRequest<'_>,
  ) -> Result<Vec<ProductMatch>>;

  /// Categories whose name matches any word of the keyword.
  async fn search_categories(&self, query: &SearchQuery, limit: usize) -> Result<Vec<CategoryMatch>>;

  /// Manufacturers of enabled products whose name matches any keyword word.
  async fn search_manufacturers(
    &self,
    query: &SearchQuery,
    limit: usize,
  ) -> Result<Vec<ManufacturerMatch>>;
}

#[async_trait]
impl<P: SearchEngineProvider + ?Sized> SearchEngineProvider for Arc<P> {
  async fn execute(
    &self,
    strategy: StrategyId,
    request: StrategyRequest<'_>,
  ) -> Result<Vec<ProductMatch>> {
    (**self).execute(strategy, request).await
  }

  async fn search_categories(&self, query: &SearchQuery, limit: usize) -> Result<Vec<CategoryMatch>> {
    (**self).search_categories(query, limit).await
  }

  async fn search_manufacturers(
    &self,
    query: &SearchQuery,
    limit: usize,
  ) -> Result<Vec<ManufacturerMatch>> {
    (**self).search_manufacturers(query, limit).await
  }
}

/// What a catalog query is about to look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTarget {
  Products(StrategyId),
  Categories,
  Manufacturers,
}

impl fmt::Display for QueryTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      QueryTarget::Products(strategy) => write!(f, "products:{strategy}"),
      QueryTarget::Categories => f.write_str("categories"),
      QueryTarget::Manufacturers => f.write_str("manufacturers"),
    }
  }
}

/// Payload passed to a [`QueryObserver`] just before a catalog query runs.
#[derive(Debug, Clone)]
pub struct QueryEvent<'a> {
  pub target: QueryTarget,
  /// The raw keyword.
  pub query_text: &'a str,
  /// The statement with its parameters rendered inline. For display only.
  pub bound_sql: &'a str,
  pub limit: usize,
  pub alpha_filter: Option<char>,
}

/// Callback invoked synchronously before every catalog query a provider
/// issues. It observes only; it cannot alter the query.
pub type QueryObserver = Arc<dyn Fn(&QueryEvent<'_>) + Send + Sync>;
