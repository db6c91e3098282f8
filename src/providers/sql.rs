//! A `SearchEngineProvider` that issues one parameterized SQL statement per
//! strategy against a Zen Cart style catalog schema (MySQL dialect).

use crate::context::StrategyRequest;
use crate::error::{Result, SearchError, StoreError};
use crate::provider::{QueryEvent, QueryObserver, QueryTarget, SearchEngineProvider};
use crate::query::SearchQuery;
use crate::store::{CatalogStore, Row, Statement};
use crate::strategy::StrategyId;
use crate::types::{CategoryMatch, ManufacturerMatch, ProductMatch, SeenIds};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Columns every product statement selects, in addition to its ranking columns.
const PRODUCT_COLUMNS: &str = "p.products_id, p.products_model, p.products_image, \
  p.master_categories_id, p.products_sort_order, pd.products_name, m.manufacturers_name";

/// Physical table names, all sharing one configurable prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTables {
  pub products: String,
  pub products_description: String,
  pub manufacturers: String,
  pub categories: String,
  pub categories_description: String,
  pub meta_tags_products_description: String,
  pub count_product_views: String,
  pub products_options_stock: String,
}

impl Default for CatalogTables {
  fn default() -> Self {
    Self::prefixed("")
  }
}

impl CatalogTables {
  /// Table names with `prefix` prepended.
  ///
  /// Table names are the only text spliced into statements, so the prefix
  /// is limited to ASCII letters, digits and underscores.
  pub fn with_prefix(prefix: &str) -> Result<Self> {
    if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
      return Err(SearchError::configuration(format!(
        "table prefix `{prefix}` may only contain letters, digits and underscores"
      )));
    }
    Ok(Self::prefixed(prefix))
  }

  fn prefixed(prefix: &str) -> Self {
    let table = |name: &str| format!("{prefix}{name}");
    Self {
      products: table("products"),
      products_description: table("products_description"),
      manufacturers: table("manufacturers"),
      categories: table("categories"),
      categories_description: table("categories_description"),
      meta_tags_products_description: table("meta_tags_products_description"),
      count_product_views: table("count_product_views"),
      products_options_stock: table("products_options_stock"),
    }
  }
}

/// How the relevance strategies score a match with `MATCH .. AGAINST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelevanceMode {
  /// Natural-language mode on the raw keyword.
  Natural,
  /// Natural-language mode on the raw keyword, `WITH QUERY EXPANSION`.
  #[default]
  Expanded,
  /// `IN BOOLEAN MODE` on the `word*` expansion token.
  Boolean,
}

impl RelevanceMode {
  /// `Expanded` when `enabled`, otherwise `Natural`.
  pub fn from_query_expansion(enabled: bool) -> Self {
    if enabled {
      RelevanceMode::Expanded
    } else {
      RelevanceMode::Natural
    }
  }

  /// The value bound inside `AGAINST (...)` and the modifier following it.
  fn against<'q>(&self, query: &'q SearchQuery) -> (&'q str, &'static str) {
    match self {
      RelevanceMode::Natural => (query.keyword(), ""),
      RelevanceMode::Expanded => (query.keyword(), " WITH QUERY EXPANSION"),
      RelevanceMode::Boolean => (query.boolean_expansion(), " IN BOOLEAN MODE"),
    }
  }
}

/// Extra table a popularity-ranked strategy needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtraJoin {
  None,
  MetaTags,
  MasterCategory,
}

/// The single predicate that distinguishes one popularity strategy from
/// another: `<column> <operator> ?` bound to `pattern`.
struct PopularityMatch<'a> {
  join: ExtraJoin,
  column: &'static str,
  operator: &'static str,
  pattern: &'a str,
}

impl<'a> PopularityMatch<'a> {
  fn new(join: ExtraJoin, column: &'static str, operator: &'static str, pattern: &'a str) -> Self {
    Self {
      join,
      column,
      operator,
      pattern,
    }
  }
}

/// Relational implementation of [`SearchEngineProvider`].
///
/// Every keyword-derived value reaches the store as a bound parameter; the
/// statement text is assembled only from table names, column names and SQL
/// keywords.
///
/// # Examples
///
/// ```no_run
/// # async fn demo() -> instasearch::error::Result<()> {
/// use instasearch::prelude::*;
///
/// let store = MySqlCatalogStore::connect("mysql://shop@localhost/shop").await?;
/// let provider = SqlSearchEngineProvider::new(store)
///     .with_tables(CatalogTables::with_prefix("zen_")?)
///     .query_expansion(false);
/// let engine = SearchEngine::builder(provider).build();
///
/// let request = SearchRequest::builder(SearchQuery::new("wrench"))
///     .field(FieldId::Name)
///     .product_limit(5)
///     .build();
/// let response = engine.search(&request).await?;
/// # Ok(())
/// # }
/// ```
pub struct SqlSearchEngineProvider<S> {
  store: S,
  tables: CatalogTables,
  relevance: RelevanceMode,
  observer: Option<QueryObserver>,
}

impl<S: CatalogStore> SqlSearchEngineProvider<S> {
  /// Uses unprefixed table names and full-text query expansion.
  pub fn new(store: S) -> Self {
    Self {
      store,
      tables: CatalogTables::default(),
      relevance: RelevanceMode::Expanded,
      observer: None,
    }
  }

  /// Replaces the table names, usually with [`CatalogTables::with_prefix`].
  pub fn with_tables(mut self, tables: CatalogTables) -> Self {
    self.tables = tables;
    self
  }

  /// Toggles `WITH QUERY EXPANSION` on the relevance strategies. Without it
  /// they score the raw keyword in plain natural-language mode.
  pub fn query_expansion(mut self, enabled: bool) -> Self {
    self.relevance = RelevanceMode::from_query_expansion(enabled);
    self
  }

  /// Sets the full-text scoring mode directly. [`RelevanceMode::Boolean`]
  /// is only reachable this way.
  pub fn relevance_mode(mut self, mode: RelevanceMode) -> Self {
    self.relevance = mode;
    self
  }

  /// Registers a callback run right before each catalog query.
  pub fn with_observer(mut self, observer: impl Fn(&QueryEvent<'_>) + Send + Sync + 'static) -> Self {
    self.observer = Some(Arc::new(observer));
    self
  }

  /// The store every statement runs against.
  pub fn store(&self) -> &S {
    &self.store
  }

  /// The statement a strategy runs for `request`.
  pub fn product_statement(&self, strategy: StrategyId, request: &StrategyRequest<'_>) -> Statement {
    let q = request.query;
    let matcher = match strategy {
      StrategyId::NameBegins => {
        PopularityMatch::new(ExtraJoin::None, "pd.products_name", "LIKE", q.prefix())
      }
      StrategyId::NameContains => {
        PopularityMatch::new(ExtraJoin::None, "pd.products_name", "REGEXP", q.alternation())
      }
      StrategyId::ModelExact => {
        PopularityMatch::new(ExtraJoin::None, "p.products_model", "=", q.keyword())
      }
      StrategyId::ModelBroad => {
        PopularityMatch::new(ExtraJoin::None, "p.products_model", "REGEXP", q.alternation())
      }
      StrategyId::MetaKeywords => PopularityMatch::new(
        ExtraJoin::MetaTags,
        "mtpd.metatags_keywords",
        "REGEXP",
        q.alternation(),
      ),
      StrategyId::ProductCategory => PopularityMatch::new(
        ExtraJoin::MasterCategory,
        "cd.categories_name",
        "REGEXP",
        q.alternation(),
      ),
      StrategyId::ProductManufacturer => {
        PopularityMatch::new(ExtraJoin::None, "m.manufacturers_name", "REGEXP", q.alternation())
      }
      StrategyId::NameRelevance => return self.relevance_statement(request, false),
      StrategyId::NameDescriptionRelevance => return self.relevance_statement(request, true),
      StrategyId::ModelOptionsStock => return self.options_stock_statement(request),
    };
    self.popularity_statement(request, matcher)
  }

  /// Prefix, regex, and exact matches ranked by views, sort order, then name.
  fn popularity_statement(&self, request: &StrategyRequest<'_>, matcher: PopularityMatch<'_>) -> Statement {
    let t = &self.tables;
    let q = request.query;
    let language = q.language_id();

    let mut stmt = Statement::new(format!(
      "SELECT {PRODUCT_COLUMNS}, CAST(IFNULL(cpv.total_views, 0) AS UNSIGNED) AS total_views \
       FROM {} p JOIN {} pd ON (p.products_id = pd.products_id)",
      t.products, t.products_description
    ));
    match matcher.join {
      ExtraJoin::MetaTags => {
        stmt.push_sql(&format!(
          " JOIN {} mtpd ON (p.products_id = mtpd.products_id AND mtpd.language_id = ",
          t.meta_tags_products_description
        ));
        stmt.push_bind(language).push_sql(")");
      }
      ExtraJoin::MasterCategory => {
        stmt.push_sql(&format!(
          " LEFT JOIN {} cd ON (cd.categories_id = p.master_categories_id)",
          t.categories_description
        ));
      }
      ExtraJoin::None => {}
    }
    stmt.push_sql(&format!(
      " LEFT JOIN {} m ON (m.manufacturers_id = p.manufacturers_id) \
       LEFT JOIN (SELECT product_id, SUM(views) AS total_views FROM {} WHERE language_id = ",
      t.manufacturers, t.count_product_views
    ));
    stmt
      .push_bind(language)
      .push_sql(" GROUP BY product_id) cpv ON (p.products_id = cpv.product_id) WHERE p.products_status <> 0");
    push_alpha_filter(&mut stmt, q);

    stmt.push_sql(&format!(" AND {} {} ", matcher.column, matcher.operator));
    stmt.push_bind(matcher.pattern);
    if matcher.join == ExtraJoin::MasterCategory {
      stmt.push_sql(" AND cd.language_id = ").push_bind(language);
    }
    stmt.push_sql(" AND pd.language_id = ").push_bind(language);
    push_exclusion(&mut stmt, request.exclude);

    stmt.push_sql(
      " ORDER BY IFNULL(cpv.total_views, 0) DESC, p.products_sort_order, pd.products_name LIMIT ",
    );
    stmt.push_bind(request.limit);
    stmt
  }

  /// Containment on name (and description) ranked by full-text relevance.
  fn relevance_statement(&self, request: &StrategyRequest<'_>, include_description: bool) -> Statement {
    let t = &self.tables;
    let q = request.query;
    let (against, mode) = self.relevance.against(q);

    let mut stmt = Statement::new(format!("SELECT {PRODUCT_COLUMNS}, MATCH(pd.products_name) AGAINST ("));
    stmt.push_bind(against).push_sql(mode).push_sql(") AS name_relevance");
    if include_description {
      stmt.push_sql(", MATCH(pd.products_description) AGAINST (");
      stmt.push_bind(against).push_sql(mode).push_sql(") AS description_relevance");
    }
    stmt.push_sql(&format!(
      " FROM {} pd JOIN {} p ON (p.products_id = pd.products_id) \
       LEFT JOIN {} m ON (m.manufacturers_id = p.manufacturers_id) \
       WHERE p.products_status <> 0",
      t.products_description, t.products, t.manufacturers
    ));
    push_alpha_filter(&mut stmt, q);
    stmt.push_sql(" AND pd.language_id = ").push_bind(q.language_id());
    push_exclusion(&mut stmt, request.exclude);

    stmt.push_sql(" AND (pd.products_name LIKE ").push_bind(q.substring());
    if include_description {
      stmt.push_sql(" OR pd.products_description LIKE ").push_bind(q.substring());
    }
    stmt.push_sql(") ORDER BY name_relevance DESC, ");
    if include_description {
      stmt.push_sql("description_relevance DESC, ");
    }
    stmt.push_sql("p.products_sort_order, pd.products_name LIMIT ");
    stmt.push_bind(request.limit);
    stmt
  }

  /// Stock-by-attribute model lookup. Written against the
  /// products-options-stock schema and not expected to apply elsewhere.
  fn options_stock_statement(&self, request: &StrategyRequest<'_>) -> Statement {
    let t = &self.tables;
    let q = request.query;

    let mut stmt = Statement::new(format!(
      "SELECT {PRODUCT_COLUMNS}, MAX(posm.pos_model) AS pos_model \
       FROM {} p LEFT JOIN {} m ON (m.manufacturers_id = p.manufacturers_id) \
       LEFT JOIN {} posm ON (posm.products_id = p.products_id) \
       LEFT JOIN {} pd ON (pd.products_id = p.products_id) \
       WHERE pd.language_id = ",
      t.products, t.manufacturers, t.products_options_stock, t.products_description
    ));
    stmt.push_bind(q.language_id()).push_sql(" AND p.products_status = 1");
    push_alpha_filter(&mut stmt, q);
    stmt.push_sql(" AND posm.pos_model LIKE ").push_bind(q.substring());
    push_exclusion(&mut stmt, request.exclude);
    stmt.push_sql(
      " GROUP BY p.products_id, p.products_model, p.products_image, p.master_categories_id, \
       p.products_sort_order, pd.products_name, m.manufacturers_name \
       ORDER BY pos_model DESC LIMIT ",
    );
    stmt.push_bind(request.limit);
    stmt
  }

  /// Enabled categories by name; sort order then name, no further tie-break.
  pub fn categories_statement(&self, query: &SearchQuery, limit: usize) -> Statement {
    let mut stmt = Statement::new(format!(
      "SELECT c.categories_id, cd.categories_name, c.categories_image, c.sort_order \
       FROM {} c LEFT JOIN {} cd ON (cd.categories_id = c.categories_id) \
       WHERE c.categories_status <> 0 AND cd.categories_name REGEXP ",
      self.tables.categories, self.tables.categories_description
    ));
    stmt.push_bind(query.alternation());
    stmt.push_sql(" AND cd.language_id = ").push_bind(query.language_id());
    stmt.push_sql(" ORDER BY c.sort_order, cd.categories_name LIMIT ").push_bind(limit);
    stmt
  }

  /// Distinct manufacturers of enabled products, ordered by name only.
  pub fn manufacturers_statement(&self, query: &SearchQuery, limit: usize) -> Statement {
    let mut stmt = Statement::new(format!(
      "SELECT DISTINCT m.manufacturers_id, m.manufacturers_name, m.manufacturers_image \
       FROM {} p LEFT JOIN {} m ON (m.manufacturers_id = p.manufacturers_id) \
       WHERE p.products_status <> 0 AND m.manufacturers_name REGEXP ",
      self.tables.products, self.tables.manufacturers
    ));
    stmt.push_bind(query.alternation());
    stmt.push_sql(" ORDER BY m.manufacturers_name LIMIT ").push_bind(limit);
    stmt
  }

  async fn run(
    &self,
    target: QueryTarget,
    query: &SearchQuery,
    limit: usize,
    statement: Statement,
  ) -> Result<Vec<Row>> {
    if let Some(observer) = &self.observer {
      let bound_sql = statement.render();
      observer(&QueryEvent {
        target,
        query_text: query.keyword(),
        bound_sql: &bound_sql,
        limit,
        alpha_filter: query.alpha_filter(),
      });
    }

    let rows = self.store.execute(&statement).await?;
    debug!(%target, limit, rows = rows.len(), "catalog query finished");
    Ok(rows)
  }
}

#[async_trait]
impl<S: CatalogStore> SearchEngineProvider for SqlSearchEngineProvider<S> {
  async fn execute(
    &self,
    strategy: StrategyId,
    request: StrategyRequest<'_>,
  ) -> Result<Vec<ProductMatch>> {
    if request.limit == 0 {
      return Ok(Vec::new());
    }
    let statement = self.product_statement(strategy, &request);
    let rows = self
      .run(QueryTarget::Products(strategy), request.query, request.limit, statement)
      .await?;

    let mut products = Vec::with_capacity(rows.len());
    for row in &rows {
      let product = product_from_row(row, strategy)?;
      if !request.exclude.contains(product.id) && products.len() < request.limit {
        products.push(product);
      }
    }
    Ok(products)
  }

  async fn search_categories(&self, query: &SearchQuery, limit: usize) -> Result<Vec<CategoryMatch>> {
    if limit == 0 {
      return Ok(Vec::new());
    }
    let statement = self.categories_statement(query, limit);
    let rows = self.run(QueryTarget::Categories, query, limit, statement).await?;
    let categories = rows
      .iter()
      .map(category_from_row)
      .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(categories)
  }

  async fn search_manufacturers(
    &self,
    query: &SearchQuery,
    limit: usize,
  ) -> Result<Vec<ManufacturerMatch>> {
    if limit == 0 {
      return Ok(Vec::new());
    }
    let statement = self.manufacturers_statement(query, limit);
    let rows = self.run(QueryTarget::Manufacturers, query, limit, statement).await?;
    let manufacturers = rows
      .iter()
      .map(manufacturer_from_row)
      .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(manufacturers)
  }
}

fn push_alpha_filter(stmt: &mut Statement, query: &SearchQuery) {
  if let Some(pattern) = query.alpha_pattern() {
    stmt.push_sql(" AND pd.products_name LIKE ").push_bind(pattern);
  }
}

/// `NOT IN` over the ids matched so far, one placeholder per id. Omitted
/// when nothing was matched yet, since `NOT IN ()` is not valid SQL.
fn push_exclusion(stmt: &mut Statement, exclude: &SeenIds) {
  if exclude.is_empty() {
    return;
  }
  stmt.push_sql(" AND p.products_id NOT IN (");
  for (i, id) in exclude.iter().enumerate() {
    if i > 0 {
      stmt.push_sql(", ");
    }
    stmt.push_bind(id);
  }
  stmt.push_sql(")");
}

fn product_from_row(row: &Row, strategy: StrategyId) -> std::result::Result<ProductMatch, StoreError> {
  Ok(ProductMatch {
    id: row.u64("products_id")?,
    name: row.opt_text("products_name")?.unwrap_or_default(),
    model: row.opt_text("products_model")?.unwrap_or_default(),
    image: row.opt_text("products_image")?,
    manufacturer: row.opt_text("manufacturers_name")?,
    master_category_id: row.opt_u64("master_categories_id")?,
    sort_order: row.opt_i64("products_sort_order")?.unwrap_or(0),
    views: row.opt_u64("total_views")?.unwrap_or(0),
    relevance: row.opt_f64("name_relevance")?,
    description_relevance: row.opt_f64("description_relevance")?,
    options_stock_model: row.opt_text("pos_model")?,
    strategy,
  })
}

fn category_from_row(row: &Row) -> std::result::Result<CategoryMatch, StoreError> {
  Ok(CategoryMatch {
    id: row.u64("categories_id")?,
    name: row.opt_text("categories_name")?.unwrap_or_default(),
    image: row.opt_text("categories_image")?,
    sort_order: row.opt_i64("sort_order")?.unwrap_or(0),
  })
}

fn manufacturer_from_row(row: &Row) -> std::result::Result<ManufacturerMatch, StoreError> {
  Ok(ManufacturerMatch {
    id: row.u64("manufacturers_id")?,
    name: row.opt_text("manufacturers_name")?.unwrap_or_default(),
    image: row.opt_text("manufacturers_image")?,
  })
}
