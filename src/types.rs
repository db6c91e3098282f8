//! Core data types: result records, limits, requests and responses.

use crate::error::{Result, SearchError};
use crate::query::SearchQuery;
use crate::strategy::{FieldId, StrategyId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identifier of a product in the catalog.
pub type ProductId = u64;

/// A product matched by one strategy invocation.
///
/// Only the ranking attributes the producing strategy computes are set; the
/// others stay at their defaults (`None`, or zero views).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMatch {
  pub id: ProductId,
  pub name: String,
  #[serde(default)]
  pub model: String,
  #[serde(default)]
  pub image: Option<String>,
  #[serde(default)]
  pub manufacturer: Option<String>,
  #[serde(default)]
  pub master_category_id: Option<u64>,
  #[serde(default)]
  pub sort_order: i64,
  /// Rolling view count; zero when the product has none recorded.
  #[serde(default)]
  pub views: u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub relevance: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description_relevance: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options_stock_model: Option<String>,
  /// The strategy that produced this record.
  pub strategy: StrategyId,
}

/// A category whose name matched the keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMatch {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub image: Option<String>,
  #[serde(default)]
  pub sort_order: i64,
}

/// A manufacturer whose name matched the keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManufacturerMatch {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub image: Option<String>,
}

/// Product ids already accumulated during one search, in insertion order.
///
/// Every strategy after the first receives this set as its exclusion list,
/// so a product matched earlier is never reconsidered.
#[derive(Debug, Clone, Default)]
pub struct SeenIds {
  order: Vec<ProductId>,
  index: HashSet<ProductId>,
}

impl SeenIds {
  /// Records `id`, returning false if it was already present.
  pub fn insert(&mut self, id: ProductId) -> bool {
    if self.index.insert(id) {
      self.order.push(id);
      true
    } else {
      false
    }
  }

  pub fn contains(&self, id: ProductId) -> bool {
    self.index.contains(&id)
  }

  pub fn len(&self) -> usize {
    self.order.len()
  }

  pub fn is_empty(&self) -> bool {
    self.order.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = ProductId> + '_ {
    self.order.iter().copied()
  }
}

impl FromIterator<ProductId> for SeenIds {
  fn from_iter<I: IntoIterator<Item = ProductId>>(iter: I) -> Self {
    let mut seen = SeenIds::default();
    for id in iter {
      seen.insert(id);
    }
    seen
  }
}

/// Per-entity result limits as received from configuration.
///
/// Signed on purpose: the values arrive from an external layer, and a
/// negative one must be reported rather than made unrepresentable upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchLimits {
  pub products: i64,
  #[serde(default)]
  pub categories: i64,
  #[serde(default)]
  pub manufacturers: i64,
}

impl SearchLimits {
  pub fn products(products: i64) -> Self {
    Self {
      products,
      categories: 0,
      manufacturers: 0,
    }
  }

  /// Checks that no limit is negative.
  pub fn validate(&self) -> Result<CheckedLimits> {
    Ok(CheckedLimits {
      products: non_negative("product", self.products)?,
      categories: non_negative("category", self.categories)?,
      manufacturers: non_negative("manufacturer", self.manufacturers)?,
    })
  }
}

fn non_negative(entity: &str, limit: i64) -> Result<usize> {
  usize::try_from(limit)
    .map_err(|_| SearchError::validation(format!("{entity} limit must not be negative, got {limit}")))
}

/// Limits after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckedLimits {
  pub products: usize,
  pub categories: usize,
  pub manufacturers: usize,
}

/// Everything one search call needs.
#[derive(Debug, Clone)]
pub struct SearchRequest {
  query: SearchQuery,
  fields: Vec<FieldId>,
  limits: SearchLimits,
}

impl SearchRequest {
  /// Starts a request for `query`.
  pub fn builder(query: SearchQuery) -> SearchRequestBuilder {
    SearchRequestBuilder {
      query,
      fields: Vec::new(),
      limits: SearchLimits::default(),
    }
  }

  pub fn query(&self) -> &SearchQuery {
    &self.query
  }

  pub fn fields(&self) -> &[FieldId] {
    &self.fields
  }

  pub fn limits(&self) -> SearchLimits {
    self.limits
  }
}

/// Builder for [`SearchRequest`].
#[derive(Debug)]
pub struct SearchRequestBuilder {
  query: SearchQuery,
  fields: Vec<FieldId>,
  limits: SearchLimits,
}

impl SearchRequestBuilder {
  /// Appends one enabled field. Declaration order is priority order.
  pub fn field(mut self, field: FieldId) -> Self {
    self.fields.push(field);
    self
  }

  pub fn fields(mut self, fields: impl IntoIterator<Item = FieldId>) -> Self {
    self.fields.extend(fields);
    self
  }

  pub fn limits(mut self, limits: SearchLimits) -> Self {
    self.limits = limits;
    self
  }

  pub fn product_limit(mut self, limit: i64) -> Self {
    self.limits.products = limit;
    self
  }

  pub fn category_limit(mut self, limit: i64) -> Self {
    self.limits.categories = limit;
    self
  }

  pub fn manufacturer_limit(mut self, limit: i64) -> Self {
    self.limits.manufacturers = limit;
    self
  }

  pub fn build(self) -> SearchRequest {
    SearchRequest {
      query: self.query,
      fields: self.fields,
      limits: self.limits,
    }
  }
}

/// Whether the product loop ran to its natural end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
  #[default]
  Complete,
  /// The cancellation token fired between two strategies.
  Cancelled,
  /// The engine timeout elapsed between two strategies.
  TimedOut,
}

/// The three result lists of one search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
  pub products: Vec<ProductMatch>,
  pub categories: Vec<CategoryMatch>,
  pub manufacturers: Vec<ManufacturerMatch>,
  #[serde(default)]
  pub completion: Completion,
}

impl SearchResponse {
  pub fn empty() -> Self {
    Self::default()
  }

  /// Total number of records across all three lists.
  pub fn len(&self) -> usize {
    self.products.len() + self.categories.len() + self.manufacturers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_seen_ids_keep_insertion_order() {
    let mut seen = SeenIds::default();
    assert!(seen.insert(7));
    assert!(seen.insert(3));
    assert!(!seen.insert(7));
    assert_eq!(seen.iter().collect::<Vec<_>>(), vec![7, 3]);
    assert!(seen.contains(3));
    assert_eq!(seen.len(), 2);
  }

  #[test]
  fn test_negative_limits_are_rejected() {
    let limits = SearchLimits {
      products: 5,
      categories: -1,
      manufacturers: 0,
    };
    let err = limits.validate().unwrap_err();
    assert!(matches!(err, SearchError::Validation(_)));
    assert!(err.to_string().contains("category"));
  }

  #[test]
  fn test_valid_limits() {
    let checked = SearchLimits::products(5).validate().unwrap();
    assert_eq!(
      checked,
      CheckedLimits {
        products: 5,
        categories: 0,
        manufacturers: 0
      }
    );
  }

  #[test]
  fn test_response_serializes_lists() {
    let response = SearchResponse {
      manufacturers: vec![ManufacturerMatch {
        id: 2,
        name: "Acme".into(),
        image: None,
      }],
      ..SearchResponse::default()
    };
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["manufacturers"][0]["name"], "Acme");
    assert_eq!(json["completion"], "complete");
    assert_eq!(response.len(), 1);
  }
}
