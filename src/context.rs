//! Per-invocation context handed to a provider for one strategy.

use crate::query::SearchQuery;
use crate::types::SeenIds;

/// Inputs for a single strategy invocation.
///
/// Built fresh by the engine for every strategy; it borrows the request's
/// query and the ids accumulated so far, so nothing outlives the search call.
#[derive(Debug, Clone, Copy)]
pub struct StrategyRequest<'a> {
  /// The normalized keyword, language and alpha filter.
  pub query: &'a SearchQuery,
  /// Products matched by earlier strategies. They must not be returned again.
  pub exclude: &'a SeenIds,
  /// Remaining product budget. Zero means "return nothing".
  pub limit: usize,
}

impl<'a> StrategyRequest<'a> {
  pub fn new(query: &'a SearchQuery, exclude: &'a SeenIds, limit: usize) -> Self {
    Self {
      query,
      exclude,
      limit,
    }
  }
}
