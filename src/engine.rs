//! The search engine that drives the strategy sequence for one request.

use crate::audit::SearchAudit;
use crate::context::StrategyRequest;
use crate::error::{Result, SearchError};
use crate::provider::SearchEngineProvider;
use crate::query::SearchQuery;
use crate::strategy::{StrategyCatalog, StrategyId};
use crate::types::{
  CategoryMatch, Completion, ManufacturerMatch, ProductMatch, SearchRequest, SearchResponse, SeenIds,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What to do when a search is cancelled or times out between strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelPolicy {
  /// Return the products gathered so far, flagged in
  /// [`SearchResponse::completion`].
  #[default]
  Partial,
  /// Fail with [`SearchError::Cancelled`] or [`SearchError::Timeout`].
  Fail,
}

/// What to do when the category or manufacturer lookup fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupFailurePolicy {
  /// Fail the whole search.
  #[default]
  FailRequest,
  /// Log a warning and return an empty list for that entity type.
  Degrade,
}

/// Tunables of a [`SearchEngine`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
  /// Checked between strategies; a strategy already running is not interrupted.
  pub timeout: Option<Duration>,
  pub cancel_policy: CancelPolicy,
  pub lookup_failure: LookupFailurePolicy,
}

/// Runs a [`SearchRequest`] against a [`SearchEngineProvider`].
///
/// The product strategies of the enabled fields run one after another, each
/// asked only for the slots still free and told which products earlier
/// strategies already returned. The category and manufacturer lookups run
/// concurrently with that loop on the same task.
///
/// The engine holds no per-request state and can be shared across tasks.
///
/// # Examples
///
/// ```rust
/// use instasearch::prelude::*;
///
/// # tokio_test_block(async {
/// let catalog = MemoryCatalog::builder()
///   .product(CatalogProduct::new(1, "Wrench set"))
///   .product(CatalogProduct::new(2, "Torque wrench"))
///   .build();
/// let engine = SearchEngine::builder(catalog).build();
///
/// let request = SearchRequest::builder(SearchQuery::new("wrench"))
///   .field(FieldId::Name)
///   .product_limit(5)
///   .build();
/// let response = engine.search(&request).await.unwrap();
/// assert_eq!(response.products.len(), 2);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #   tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
pub struct SearchEngine<P> {
  provider: P,
  options: EngineOptions,
  audit: Option<Arc<dyn SearchAudit>>,
}

impl<P: SearchEngineProvider> SearchEngine<P> {
  /// Creates an engine with default options and no audit hook.
  ///
  /// # Arguments
  ///
  /// * `provider` - The catalog backend every strategy and lookup runs on.
  ///
  /// # Returns
  ///
  /// An engine that never times out, returns partial results on
  /// cancellation and fails the request when a lookup fails. Use
  /// [`SearchEngine::builder`] to change any of that.
  pub fn new(provider: P) -> Self {
    Self {
      provider,
      options: EngineOptions::default(),
      audit: None,
    }
  }

  /// Starts a [`SearchEngineBuilder`] around `provider`.
  pub fn builder(provider: P) -> SearchEngineBuilder<P> {
    SearchEngineBuilder::new(provider)
  }

  /// The backend this engine queries.
  pub fn provider(&self) -> &P {
    &self.provider
  }

  /// Timeout and failure policies in effect for every search.
  pub fn options(&self) -> &EngineOptions {
    &self.options
  }

  /// Runs `request` to completion. Same as [`search_with_cancel`] with a
  /// token that is never cancelled.
  ///
  /// [`search_with_cancel`]: SearchEngine::search_with_cancel
  pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
    self.search_with_cancel(request, &CancellationToken::new()).await
  }

  /// Runs `request`, checking `cancel` and the configured timeout before
  /// each product strategy.
  ///
  /// # Errors
  ///
  /// - [`SearchError::Validation`] for a negative limit, before any catalog
  ///   query runs.
  /// - [`SearchError::Storage`] when a product strategy fails, or a lookup
  ///   fails under [`LookupFailurePolicy::FailRequest`].
  /// - [`SearchError::Cancelled`] / [`SearchError::Timeout`] under
  ///   [`CancelPolicy::Fail`].
  pub async fn search_with_cancel(
    &self,
    request: &SearchRequest,
    cancel: &CancellationToken,
  ) -> Result<SearchResponse> {
    let limits = request.limits().validate()?;
    let query = request.query();
    if query.is_empty() {
      debug!("empty keyword, nothing to search");
      return Ok(SearchResponse::empty());
    }

    let strategies = StrategyCatalog::resolve(request.fields());
    let deadline = self.options.timeout.map(|timeout| Instant::now() + timeout);

    let ((products, completion), categories, manufacturers) = tokio::try_join!(
      self.collect_products(query, &strategies, limits.products, cancel, deadline),
      self.lookup_categories(query, limits.categories),
      self.lookup_manufacturers(query, limits.manufacturers),
    )?;

    let response = SearchResponse {
      products,
      categories,
      manufacturers,
      completion,
    };

    info!(
      keyword = query.keyword(),
      products = response.products.len(),
      categories = response.categories.len(),
      manufacturers = response.manufacturers.len(),
      completion = ?response.completion,
      "search finished"
    );

    if let Some(audit) = &self.audit {
      audit.record(query.keyword(), response.len());
    }

    Ok(response)
  }

  async fn collect_products(
    &self,
    query: &SearchQuery,
    strategies: &[StrategyId],
    limit: usize,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
  ) -> Result<(Vec<ProductMatch>, Completion)> {
    let mut products: Vec<ProductMatch> = Vec::with_capacity(limit);
    let mut seen = SeenIds::default();

    for &strategy in strategies {
      let remaining = limit - products.len();
      if remaining == 0 {
        break;
      }
      if cancel.is_cancelled() {
        return self.interrupted(products, Completion::Cancelled);
      }
      if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
        return self.interrupted(products, Completion::TimedOut);
      }

      let hits = self
        .provider
        .execute(strategy, StrategyRequest::new(query, &seen, remaining))
        .await?;

      let returned = hits.len();
      let mut accepted = 0;
      for hit in hits {
        if products.len() == limit {
          break;
        }
        if seen.insert(hit.id) {
          products.push(hit);
          accepted += 1;
        }
      }

      debug!(
        strategy = %strategy,
        limit = remaining,
        returned,
        accepted,
        "strategy finished"
      );
    }

    Ok((products, Completion::Complete))
  }

  fn interrupted(
    &self,
    products: Vec<ProductMatch>,
    completion: Completion,
  ) -> Result<(Vec<ProductMatch>, Completion)> {
    debug!(gathered = products.len(), completion = ?completion, "strategy loop interrupted");
    match (self.options.cancel_policy, completion) {
      (CancelPolicy::Partial, _) => Ok((products, completion)),
      (CancelPolicy::Fail, Completion::TimedOut) => {
        Err(SearchError::Timeout(self.options.timeout.unwrap_or_default()))
      }
      (CancelPolicy::Fail, _) => Err(SearchError::Cancelled),
    }
  }

  async fn lookup_categories(&self, query: &SearchQuery, limit: usize) -> Result<Vec<CategoryMatch>> {
    if limit == 0 {
      return Ok(Vec::new());
    }
    let found = self.provider.search_categories(query, limit).await;
    self.settle_lookup("categories", found, limit)
  }

  async fn lookup_manufacturers(
    &self,
    query: &SearchQuery,
    limit: usize,
  ) -> Result<Vec<ManufacturerMatch>> {
    if limit == 0 {
      return Ok(Vec::new());
    }
    let found = self.provider.search_manufacturers(query, limit).await;
    self.settle_lookup("manufacturers", found, limit)
  }

  fn settle_lookup<T>(&self, entity: &str, found: Result<Vec<T>>, limit: usize) -> Result<Vec<T>> {
    match found {
      Ok(mut records) => {
        records.truncate(limit);
        Ok(records)
      }
      Err(error) => match self.options.lookup_failure {
        LookupFailurePolicy::FailRequest => Err(error),
        LookupFailurePolicy::Degrade => {
          warn!(entity, %error, "lookup failed, returning no results");
          Ok(Vec::new())
        }
      },
    }
  }
}

/// Builder for [`SearchEngine`].
pub struct SearchEngineBuilder<P> {
  provider: P,
  options: EngineOptions,
  audit: Option<Arc<dyn SearchAudit>>,
}

impl<P: SearchEngineProvider> SearchEngineBuilder<P> {
  pub fn new(provider: P) -> Self {
    Self {
      provider,
      options: EngineOptions::default(),
      audit: None,
    }
  }

  pub fn options(mut self, options: EngineOptions) -> Self {
    self.options = options;
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.options.timeout = Some(timeout);
    self
  }

  pub fn cancel_policy(mut self, policy: CancelPolicy) -> Self {
    self.options.cancel_policy = policy;
    self
  }

  pub fn lookup_failure_policy(mut self, policy: LookupFailurePolicy) -> Self {
    self.options.lookup_failure = policy;
    self
  }

  pub fn audit(mut self, audit: impl SearchAudit + 'static) -> Self {
    self.audit = Some(Arc::new(audit));
    self
  }

  pub fn shared_audit(mut self, audit: Arc<dyn SearchAudit>) -> Self {
    self.audit = Some(audit);
    self
  }

  pub fn build(self) -> SearchEngine<P> {
    SearchEngine {
      provider: self.provider,
      options: self.options,
      audit: self.audit,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::providers::memory::{CatalogProduct, MemoryCatalog};
  use crate::strategy::FieldId;

  fn catalog() -> MemoryCatalog {
    MemoryCatalog::builder()
      .product(CatalogProduct::new(1, "Wrench 10mm"))
      .product(CatalogProduct::new(2, "Wrench 12mm"))
      .product(CatalogProduct::new(3, "Torque wrench"))
      .build()
  }

  fn request(keyword: &str, limit: i64) -> SearchRequest {
    SearchRequest::builder(SearchQuery::new(keyword))
      .field(FieldId::Name)
      .product_limit(limit)
      .build()
  }

  #[tokio::test]
  async fn test_budget_is_respected() {
    let engine = SearchEngine::new(catalog());
    let response = engine.search(&request("wrench", 2)).await.unwrap();
    assert_eq!(response.products.len(), 2);
    assert_eq!(response.completion, Completion::Complete);
  }

  #[tokio::test]
  async fn test_prefix_matches_come_first() {
    let engine = SearchEngine::new(catalog());
    let response = engine.search(&request("wrench", 5)).await.unwrap();
    let strategies: Vec<StrategyId> = response.products.iter().map(|p| p.strategy).collect();
    assert_eq!(
      strategies,
      vec![StrategyId::NameBegins, StrategyId::NameBegins, StrategyId::NameRelevance]
    );
  }

  #[tokio::test]
  async fn test_cancelled_token_fails_under_fail_policy() {
    let engine = SearchEngine::builder(catalog())
      .cancel_policy(CancelPolicy::Fail)
      .build();
    let token = CancellationToken::new();
    token.cancel();
    let result = engine.search_with_cancel(&request("wrench", 5), &token).await;
    assert!(matches!(result, Err(SearchError::Cancelled)));
  }

  #[tokio::test]
  async fn test_negative_limit_is_rejected() {
    let engine = SearchEngine::new(catalog());
    let result = engine.search(&request("wrench", -1)).await;
    assert!(matches!(result, Err(SearchError::Validation(_))));
  }
}
