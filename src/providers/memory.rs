//! In-memory catalog evaluating every strategy without a database.

use crate::context::StrategyRequest;
use crate::error::{Result, SearchError};
use crate::provider::SearchEngineProvider;
use crate::providers::relevance::{tokenize, RelevanceIndex};
use crate::query::SearchQuery;
use crate::strategy::{RankingPolicy, StrategyId};
use crate::types::{CategoryMatch, ManufacturerMatch, ProductId, ProductMatch};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A product as stored in a [`MemoryCatalog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogProduct {
  pub id: ProductId,
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub model: String,
  #[serde(default)]
  pub image: Option<String>,
  #[serde(default)]
  pub manufacturer_id: Option<u64>,
  #[serde(default)]
  pub master_category_id: Option<u64>,
  #[serde(default)]
  pub sort_order: i64,
  #[serde(default)]
  pub views: u64,
  #[serde(default)]
  pub meta_keywords: String,
  /// Stock-by-attribute model numbers.
  #[serde(default)]
  pub options_stock_models: Vec<String>,
  #[serde(default = "enabled")]
  pub enabled: bool,
}

impl CatalogProduct {
  /// An enabled product with only an id and a display name.
  ///
  /// # Arguments
  ///
  /// * `id` - Unique product id; strategies exclude by it.
  /// * `name` - Display name, matched by every name strategy.
  pub fn new(id: ProductId, name: impl Into<String>) -> Self {
    Self {
      id,
      name: name.into(),
      description: String::new(),
      model: String::new(),
      image: None,
      manufacturer_id: None,
      master_category_id: None,
      sort_order: 0,
      views: 0,
      meta_keywords: String::new(),
      options_stock_models: Vec::new(),
      enabled: true,
    }
  }

  /// Long description, matched by the name-and-description relevance strategy.
  pub fn description(mut self, description: impl Into<String>) -> Self {
    self.description = description.into();
    self
  }

  pub fn model(mut self, model: impl Into<String>) -> Self {
    self.model = model.into();
    self
  }

  /// Links the product to a [`CatalogManufacturer`] by id.
  pub fn manufacturer(mut self, manufacturer_id: u64) -> Self {
    self.manufacturer_id = Some(manufacturer_id);
    self
  }

  /// Sets the master category, used by the product-category strategy.
  pub fn category(mut self, category_id: u64) -> Self {
    self.master_category_id = Some(category_id);
    self
  }

  /// Tie-break before name; lower sorts first.
  pub fn sort_order(mut self, sort_order: i64) -> Self {
    self.sort_order = sort_order;
    self
  }

  /// Total page views, the popularity ranking key.
  pub fn views(mut self, views: u64) -> Self {
    self.views = views;
    self
  }

  pub fn meta_keywords(mut self, keywords: impl Into<String>) -> Self {
    self.meta_keywords = keywords.into();
    self
  }

  /// Adds one stock-by-attribute model number. Can be called repeatedly.
  pub fn options_stock_model(mut self, model: impl Into<String>) -> Self {
    self.options_stock_models.push(model.into());
    self
  }

  /// Marks the product disabled. No strategy will return it.
  pub fn disabled(mut self) -> Self {
    self.enabled = false;
    self
  }
}

/// A category as stored in a [`MemoryCatalog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogCategory {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub image: Option<String>,
  #[serde(default)]
  pub sort_order: i64,
  #[serde(default = "enabled")]
  pub enabled: bool,
}

/// A manufacturer as stored in a [`MemoryCatalog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogManufacturer {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub image: Option<String>,
}

fn enabled() -> bool {
  true
}

#[derive(Debug, Default, Deserialize)]
struct CatalogData {
  #[serde(default)]
  products: Vec<CatalogProduct>,
  #[serde(default)]
  categories: Vec<CatalogCategory>,
  #[serde(default)]
  manufacturers: Vec<CatalogManufacturer>,
}

/// Single-language catalog held in memory.
///
/// Mirrors the relational provider's semantics: `LIKE` patterns and `REGEXP`
/// alternations are matched case-insensitively, and BM25 stands in for the
/// store's natural-language relevance. Query expansion is not emulated, and
/// the language id of a query is ignored.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
  products: Vec<CatalogProduct>,
  categories: HashMap<u64, CatalogCategory>,
  manufacturers: HashMap<u64, CatalogManufacturer>,
  name_relevance: RelevanceIndex,
  description_relevance: RelevanceIndex,
}

impl MemoryCatalog {
  pub fn builder() -> MemoryCatalogBuilder {
    MemoryCatalogBuilder::default()
  }

  /// Loads `{"products": [...], "categories": [...], "manufacturers": [...]}`.
  pub fn from_json(json: &str) -> Result<Self> {
    let data: CatalogData = serde_json::from_str(json)
      .map_err(|e| SearchError::configuration(format!("invalid catalog JSON: {e}")))?;
    Ok(Self::new(data.products, data.categories, data.manufacturers))
  }

  pub fn new(
    products: Vec<CatalogProduct>,
    categories: Vec<CatalogCategory>,
    manufacturers: Vec<CatalogManufacturer>,
  ) -> Self {
    let name_relevance = RelevanceIndex::build(products.iter().map(|p| p.name.as_str()));
    let description_relevance =
      RelevanceIndex::build(products.iter().map(|p| p.description.as_str()));
    Self {
      products,
      categories: categories.into_iter().map(|c| (c.id, c)).collect(),
      manufacturers: manufacturers.into_iter().map(|m| (m.id, m)).collect(),
      name_relevance,
      description_relevance,
    }
  }

  pub fn products(&self) -> &[CatalogProduct] {
    &self.products
  }

  fn manufacturer_name(&self, product: &CatalogProduct) -> Option<&str> {
    product
      .manufacturer_id
      .and_then(|id| self.manufacturers.get(&id))
      .map(|m| m.name.as_str())
  }

  fn category_name(&self, product: &CatalogProduct) -> Option<&str> {
    product
      .master_category_id
      .and_then(|id| self.categories.get(&id))
      .map(|c| c.name.as_str())
  }

  /// Evaluates one product against a strategy; `None` when it does not match.
  fn evaluate(
    &self,
    strategy: StrategyId,
    doc: usize,
    product: &CatalogProduct,
    matchers: &Matchers,
  ) -> Option<ProductMatch> {
    let mut found = self.to_match(product, strategy);

    let matched = match strategy {
      StrategyId::NameBegins => matchers.prefix.is_match(&product.name),
      StrategyId::NameContains => matchers.alternation.is_match(&product.name),
      StrategyId::ModelExact => product.model.to_lowercase() == matchers.keyword,
      StrategyId::ModelBroad => matchers.alternation.is_match(&product.model),
      StrategyId::MetaKeywords => matchers.alternation.is_match(&product.meta_keywords),
      StrategyId::ProductCategory => self
        .category_name(product)
        .is_some_and(|name| matchers.alternation.is_match(name)),
      StrategyId::ProductManufacturer => self
        .manufacturer_name(product)
        .is_some_and(|name| matchers.alternation.is_match(name)),
      StrategyId::NameRelevance => {
        found.relevance = Some(self.name_relevance.score(doc, &matchers.terms));
        matchers.substring.is_match(&product.name)
      }
      StrategyId::NameDescriptionRelevance => {
        found.relevance = Some(self.name_relevance.score(doc, &matchers.terms));
        found.description_relevance = Some(self.description_relevance.score(doc, &matchers.terms));
        matchers.substring.is_match(&product.name) || matchers.substring.is_match(&product.description)
      }
      StrategyId::ModelOptionsStock => {
        found.options_stock_model = product
          .options_stock_models
          .iter()
          .filter(|model| matchers.substring.is_match(model))
          .max()
          .cloned();
        found.options_stock_model.is_some()
      }
    };

    matched.then_some(found)
  }

  fn to_match(&self, product: &CatalogProduct, strategy: StrategyId) -> ProductMatch {
    let popularity = strategy.ranking() == RankingPolicy::PopularityFirst;
    ProductMatch {
      id: product.id,
      name: product.name.clone(),
      model: product.model.clone(),
      image: product.image.clone(),
      manufacturer: self.manufacturer_name(product).map(str::to_string),
      master_category_id: product.master_category_id,
      sort_order: product.sort_order,
      views: if popularity { product.views } else { 0 },
      relevance: None,
      description_relevance: None,
      options_stock_model: None,
      strategy,
    }
  }
}

/// Builder for [`MemoryCatalog`].
#[derive(Debug, Default)]
pub struct MemoryCatalogBuilder {
  products: Vec<CatalogProduct>,
  categories: Vec<CatalogCategory>,
  manufacturers: Vec<CatalogManufacturer>,
}

impl MemoryCatalogBuilder {
  pub fn product(mut self, product: CatalogProduct) -> Self {
    self.products.push(product);
    self
  }

  pub fn category(mut self, id: u64, name: impl Into<String>, sort_order: i64) -> Self {
    self.categories.push(CatalogCategory {
      id,
      name: name.into(),
      image: None,
      sort_order,
      enabled: true,
    });
    self
  }

  pub fn manufacturer(mut self, id: u64, name: impl Into<String>) -> Self {
    self.manufacturers.push(CatalogManufacturer {
      id,
      name: name.into(),
      image: None,
    });
    self
  }

  pub fn build(self) -> MemoryCatalog {
    MemoryCatalog::new(self.products, self.categories, self.manufacturers)
  }
}

/// The query's derived forms compiled for in-memory matching.
struct Matchers {
  keyword: String,
  prefix: Regex,
  substring: Regex,
  alternation: Regex,
  alpha: Option<Regex>,
  terms: Vec<String>,
}

impl Matchers {
  fn compile(query: &SearchQuery) -> Result<Self> {
    Ok(Self {
      keyword: query.keyword().to_lowercase(),
      prefix: like_regex(query.prefix())?,
      substring: like_regex(query.substring())?,
      alternation: case_insensitive(query.alternation())?,
      alpha: query.alpha_pattern().as_deref().map(like_regex).transpose()?,
      terms: tokenize(query.keyword()),
    })
  }

  fn passes_alpha(&self, name: &str) -> bool {
    self.alpha.as_ref().map_or(true, |alpha| alpha.is_match(name))
  }
}

fn case_insensitive(pattern: &str) -> Result<Regex> {
  RegexBuilder::new(pattern)
    .case_insensitive(true)
    .build()
    .map_err(|e| SearchError::validation(format!("invalid match pattern: {e}")))
}

/// Translates a SQL `LIKE` pattern (`%`, `_`, `\` escapes) to an anchored regex.
fn like_regex(pattern: &str) -> Result<Regex> {
  let mut translated = String::from("^");
  let mut chars = pattern.chars();
  while let Some(c) = chars.next() {
    match c {
      '%' => translated.push_str(".*"),
      '_' => translated.push('.'),
      '\\' => {
        if let Some(escaped) = chars.next() {
          translated.push_str(&regex::escape(&escaped.to_string()));
        }
      }
      other => translated.push_str(&regex::escape(&other.to_string())),
    }
  }
  translated.push('$');
  RegexBuilder::new(&translated)
    .case_insensitive(true)
    .dot_matches_new_line(true)
    .build()
    .map_err(|e| SearchError::validation(format!("invalid LIKE pattern: {e}")))
}

fn rank(policy: RankingPolicy, a: &ProductMatch, b: &ProductMatch) -> Ordering {
  let desc = |x: Option<f64>, y: Option<f64>| {
    y.unwrap_or(0.0)
      .partial_cmp(&x.unwrap_or(0.0))
      .unwrap_or(Ordering::Equal)
  };
  match policy {
    RankingPolicy::RelevanceFirst => desc(a.relevance, b.relevance)
      .then_with(|| desc(a.description_relevance, b.description_relevance))
      .then_with(|| a.sort_order.cmp(&b.sort_order))
      .then_with(|| a.name.cmp(&b.name)),
    RankingPolicy::PopularityFirst => b
      .views
      .cmp(&a.views)
      .then_with(|| a.sort_order.cmp(&b.sort_order))
      .then_with(|| a.name.cmp(&b.name)),
    RankingPolicy::OptionsStockModel => b.options_stock_model.cmp(&a.options_stock_model),
  }
}

#[async_trait]
impl SearchEngineProvider for MemoryCatalog {
  async fn execute(
    &self,
    strategy: StrategyId,
    request: StrategyRequest<'_>,
  ) -> Result<Vec<ProductMatch>> {
    if request.limit == 0 {
      return Ok(Vec::new());
    }
    let matchers = Matchers::compile(request.query)?;
    let eligible = |(doc, product): (usize, &CatalogProduct)| {
      if !product.enabled || request.exclude.contains(product.id) || !matchers.passes_alpha(&product.name) {
        return None;
      }
      self.evaluate(strategy, doc, product, &matchers)
    };

    #[cfg(feature = "parallel")]
    let mut found: Vec<ProductMatch> = self.products.par_iter().enumerate().filter_map(eligible).collect();
    #[cfg(not(feature = "parallel"))]
    let mut found: Vec<ProductMatch> = self.products.iter().enumerate().filter_map(eligible).collect();

    let policy = strategy.ranking();
    found.sort_by(|a, b| rank(policy, a, b));
    found.truncate(request.limit);
    Ok(found)
  }

  async fn search_categories(&self, query: &SearchQuery, limit: usize) -> Result<Vec<CategoryMatch>> {
    if limit == 0 {
      return Ok(Vec::new());
    }
    let alternation = case_insensitive(query.alternation())?;
    let mut found: Vec<CategoryMatch> = self
      .categories
      .values()
      .filter(|c| c.enabled && alternation.is_match(&c.name))
      .map(|c| CategoryMatch {
        id: c.id,
        name: c.name.clone(),
        image: c.image.clone(),
        sort_order: c.sort_order,
      })
      .collect();
    found.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
    found.truncate(limit);
    Ok(found)
  }

  async fn search_manufacturers(
    &self,
    query: &SearchQuery,
    limit: usize,
  ) -> Result<Vec<ManufacturerMatch>> {
    if limit == 0 {
      return Ok(Vec::new());
    }
    let alternation = case_insensitive(query.alternation())?;
    let stocked: BTreeSet<u64> = self
      .products
      .iter()
      .filter(|p| p.enabled)
      .filter_map(|p| p.manufacturer_id)
      .collect();
    let mut found: Vec<ManufacturerMatch> = stocked
      .iter()
      .filter_map(|id| self.manufacturers.get(id))
      .filter(|m| alternation.is_match(&m.name))
      .map(|m| ManufacturerMatch {
        id: m.id,
        name: m.name.clone(),
        image: m.image.clone(),
      })
      .collect();
    found.sort_by(|a, b| a.name.cmp(&b.name));
    found.truncate(limit);
    Ok(found)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_like_regex() {
    let begins = like_regex("wre%").unwrap();
    assert!(begins.is_match("Wrench set"));
    assert!(!begins.is_match("torque wrench"));

    let literal = like_regex(r"%10\%%").unwrap();
    assert!(literal.is_match("save 10% now"));
    assert!(!literal.is_match("save 10 now"));

    let single = like_regex("b_lt").unwrap();
    assert!(single.is_match("BOLT"));
    assert!(!single.is_match("boolt"));
  }

  #[test]
  fn test_from_json() {
    let catalog = MemoryCatalog::from_json(
      r#"{"products": [{"id": 1, "name": "Bolt", "views": 3}], "manufacturers": [{"id": 1, "name": "Acme"}]}"#,
    )
    .unwrap();
    assert_eq!(catalog.products().len(), 1);
    assert!(catalog.products()[0].enabled);
    assert!(MemoryCatalog::from_json("{").is_err());
  }

  #[tokio::test]
  async fn test_model_exact_ignores_case() {
    let catalog = MemoryCatalog::builder()
      .product(CatalogProduct::new(1, "Hex key").model("HK-5"))
      .product(CatalogProduct::new(2, "Hex key set").model("HK-5S"))
      .build();
    let query = SearchQuery::new("hk-5");
    let seen = Default::default();
    let found = catalog
      .execute(StrategyId::ModelExact, StrategyRequest::new(&query, &seen, 5))
      .await
      .unwrap();
    assert_eq!(found.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1]);
  }

  #[tokio::test]
  async fn test_options_stock_orders_by_model_desc() {
    let catalog = MemoryCatalog::builder()
      .product(CatalogProduct::new(1, "Glove").options_stock_model("GL-100-S"))
      .product(CatalogProduct::new(2, "Boot").options_stock_model("GL-100-M").options_stock_model("X"))
      .product(CatalogProduct::new(3, "Hat").options_stock_model("HT-1"))
      .build();
    let query = SearchQuery::new("GL-100");
    let seen = Default::default();
    let found = catalog
      .execute(StrategyId::ModelOptionsStock, StrategyRequest::new(&query, &seen, 5))
      .await
      .unwrap();
    assert_eq!(found.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(found[1].options_stock_model.as_deref(), Some("GL-100-M"));
  }

  #[tokio::test]
  async fn test_relevance_prefers_better_name_match() {
    let catalog = MemoryCatalog::builder()
      .product(CatalogProduct::new(1, "Bench vise with wrench holder").sort_order(0))
      .product(CatalogProduct::new(2, "Wrench").sort_order(5))
      .build();
    let query = SearchQuery::new("wrench");
    let seen = Default::default();
    let found = catalog
      .execute(StrategyId::NameRelevance, StrategyRequest::new(&query, &seen, 5))
      .await
      .unwrap();
    assert_eq!(found.iter().map(|p| p.id).collect::<Vec<_>>(), vec![2, 1]);
    assert!(found[0].relevance.unwrap() > found[1].relevance.unwrap());
  }

  #[tokio::test]
  async fn test_manufacturers_need_an_enabled_product() {
    let catalog = MemoryCatalog::builder()
      .manufacturer(1, "Acme Tools")
      .manufacturer(2, "Acme Paints")
      .manufacturer(3, "Bosch")
      .product(CatalogProduct::new(1, "Drill").manufacturer(1))
      .product(CatalogProduct::new(2, "Paint").manufacturer(2).disabled())
      .product(CatalogProduct::new(3, "Saw").manufacturer(3))
      .build();
    let found = catalog
      .search_manufacturers(&SearchQuery::new("acme"), 5)
      .await
      .unwrap();
    assert_eq!(found.iter().map(|m| m.id).collect::<Vec<_>>(), vec![1]);
  }

  #[tokio::test]
  async fn test_disabled_products_never_match() {
    let wrench = |id| {
      CatalogProduct::new(id, "Wrench")
        .description("wrench")
        .model("wrench")
        .meta_keywords("wrench")
        .options_stock_model("wrench")
        .category(1)
        .manufacturer(1)
    };
    let catalog = MemoryCatalog::builder()
      .category(1, "Wrench tools", 0)
      .manufacturer(1, "Wrench Co")
      .product(wrench(1).disabled())
      .product(wrench(2))
      .build();
    let query = SearchQuery::new("wrench");
    let seen = Default::default();

    for strategy in [
      StrategyId::ProductCategory,
      StrategyId::ProductManufacturer,
      StrategyId::MetaKeywords,
      StrategyId::ModelOptionsStock,
      StrategyId::ModelBroad,
      StrategyId::ModelExact,
      StrategyId::NameBegins,
      StrategyId::NameRelevance,
      StrategyId::NameDescriptionRelevance,
      StrategyId::NameContains,
    ] {
      let found = catalog
        .execute(strategy, StrategyRequest::new(&query, &seen, 5))
        .await
        .unwrap();
      assert_eq!(found.iter().map(|p| p.id).collect::<Vec<_>>(), vec![2], "{strategy:?}");
    }
  }
}
