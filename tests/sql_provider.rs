use instasearch::prelude::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Answers statements with queued row sets and keeps every statement it ran.
#[derive(Default)]
struct RecordingStore {
  answers: Mutex<VecDeque<Vec<Row>>>,
  statements: Mutex<Vec<Statement>>,
}

impl RecordingStore {
  fn answering(answers: Vec<Vec<Row>>) -> Self {
    Self {
      answers: Mutex::new(answers.into()),
      statements: Mutex::new(Vec::new()),
    }
  }

  fn statements(&self) -> Vec<Statement> {
    self.statements.lock().unwrap().clone()
  }
}

#[async_trait::async_trait]
impl CatalogStore for RecordingStore {
  async fn execute(&self, statement: &Statement) -> Result<Vec<Row>, StoreError> {
    self.statements.lock().unwrap().push(statement.clone());
    Ok(self.answers.lock().unwrap().pop_front().unwrap_or_default())
  }
}

struct BrokenStore;

#[async_trait::async_trait]
impl CatalogStore for BrokenStore {
  async fn execute(&self, _statement: &Statement) -> Result<Vec<Row>, StoreError> {
    Err(StoreError::query("Lost connection to MySQL server during query"))
  }
}

fn product(id: u64, name: &str, views: u64) -> Row {
  Row::new()
    .with("products_id", id)
    .with("products_name", name)
    .with("products_model", format!("M-{id}"))
    .with("products_image", SqlValue::Null)
    .with("manufacturers_name", "Acme")
    .with("master_categories_id", 4u64)
    .with("products_sort_order", 0i64)
    .with("total_views", views)
}

#[tokio::test]
async fn test_statements_follow_the_strategy_loop() {
  let store = Arc::new(RecordingStore::answering(vec![
    vec![product(11, "Wrench 10mm", 40), product(12, "Wrench set", 3)],
    vec![product(13, "Torque wrench", 0)],
    vec![product(14, "Pipe wrench", 0)],
  ]));
  let events = Arc::new(Mutex::new(Vec::new()));
  let sink = events.clone();
  let provider = SqlSearchEngineProvider::new(store.clone())
    .with_tables(CatalogTables::with_prefix("zen_").unwrap())
    .with_observer(move |event: &QueryEvent<'_>| {
      sink
        .lock()
        .unwrap()
        .push((event.target, event.query_text.to_string(), event.limit, event.bound_sql.to_string()));
    });
  let engine = SearchEngine::new(provider);

  let request = SearchRequest::builder(SearchQuery::new("wrench"))
    .field(FieldId::Name)
    .product_limit(4)
    .build();
  let response = engine.search(&request).await.unwrap();

  assert_eq!(
    response.products.iter().map(|p| p.id).collect::<Vec<_>>(),
    vec![11, 12, 13, 14]
  );
  assert_eq!(response.products[0].views, 40);
  assert_eq!(response.products[0].manufacturer.as_deref(), Some("Acme"));

  let statements = store.statements();
  assert_eq!(statements.len(), 3);
  for statement in &statements {
    assert!(statement.sql().contains("zen_products"));
    assert!(!statement.sql().contains("wrench"));
    assert_eq!(statement.sql().matches('?').count(), statement.params().len());
  }
  assert!(!statements[0].sql().contains("NOT IN"));
  assert!(statements[1].sql().contains("NOT IN (?, ?)"));
  assert!(statements[2].sql().contains("NOT IN (?, ?, ?)"));
  assert_eq!(statements[1].params().last(), Some(&SqlValue::UInt(2)));
  assert_eq!(statements[2].params().last(), Some(&SqlValue::UInt(1)));

  let events = events.lock().unwrap();
  let targets: Vec<QueryTarget> = events.iter().map(|e| e.0).collect();
  assert_eq!(
    targets,
    vec![
      QueryTarget::Products(StrategyId::NameBegins),
      QueryTarget::Products(StrategyId::NameRelevance),
      QueryTarget::Products(StrategyId::NameContains),
    ]
  );
  assert!(events.iter().all(|e| e.1 == "wrench"));
  assert_eq!(events.iter().map(|e| e.2).collect::<Vec<_>>(), vec![4, 2, 1]);
  assert!(events[0].3.contains("'wrench%'"));
}

#[tokio::test]
async fn test_lookups_are_single_statements() {
  let store = Arc::new(RecordingStore::answering(vec![]));
  let provider = SqlSearchEngineProvider::new(store.clone());

  let query = SearchQuery::new("acme tools");
  assert!(provider.search_categories(&query, 0).await.unwrap().is_empty());
  assert!(store.statements().is_empty());

  provider.search_categories(&query, 3).await.unwrap();
  provider.search_manufacturers(&query, 2).await.unwrap();

  let statements = store.statements();
  assert_eq!(statements.len(), 2);
  assert!(statements[0].params().contains(&SqlValue::Text("acme|tools".into())));
  assert!(statements[1].sql().contains("DISTINCT"));
  assert_eq!(statements[1].params().last(), Some(&SqlValue::UInt(2)));
}

#[tokio::test]
async fn test_store_failure_surfaces_as_storage_error() {
  let engine = SearchEngine::new(SqlSearchEngineProvider::new(BrokenStore));
  let request = SearchRequest::builder(SearchQuery::new("wrench"))
    .field(FieldId::ModelExact)
    .product_limit(5)
    .build();

  let error = engine.search(&request).await.unwrap_err();
  assert!(matches!(error, SearchError::Storage(StoreError::Query { .. })));
  assert!(error.to_string().contains("Lost connection"));
}

#[tokio::test]
async fn test_settings_configure_the_provider() {
  let settings = SearchSettings::from_toml_str(
    r#"
fields = ["name-description"]
product_limit = 2
use_query_expansion = false
table_prefix = "shop_"
"#,
  )
  .unwrap();

  let store = Arc::new(RecordingStore::default());
  let engine = SearchEngine::new(settings.sql_provider(store.clone()).unwrap());
  let request = settings.request("hex key").unwrap();
  engine.search(&request).await.unwrap();

  let statements = store.statements();
  assert_eq!(statements.len(), 3);
  assert!(statements[0].sql().contains("shop_products_description"));
  assert!(statements[1].sql().contains("AGAINST (?) AS name_relevance"));
  assert!(!statements[1].sql().contains("BOOLEAN"));
  assert!(!statements[1].sql().contains("EXPANSION"));
  assert_eq!(statements[1].params()[0], SqlValue::Text("hex key".into()));
}

#[tokio::test]
async fn test_boolean_relevance_is_opt_in() {
  let settings = SearchSettings::from_toml_str(
    r#"
fields = ["name"]
relevance_mode = "boolean"
"#,
  )
  .unwrap();

  let store = Arc::new(RecordingStore::default());
  let engine = SearchEngine::new(settings.sql_provider(store.clone()).unwrap());
  engine.search(&settings.request("hex key").unwrap()).await.unwrap();

  let statements = store.statements();
  assert!(statements[1].sql().contains("AGAINST (? IN BOOLEAN MODE)"));
  assert_eq!(statements[1].params()[0], SqlValue::Text("hex* key*".into()));
}
