//! Instant search over a small in-memory hardware catalog.
//!
//! ```text
//! cargo run --example instant_search -- "wrench" [alpha-letter]
//! ```

use instasearch::prelude::*;
use std::env;

const CATALOG: &str = include_str!("catalog.json");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .init();

  let mut args = env::args().skip(1);
  let keyword = args.next().unwrap_or_else(|| "wrench".to_string());
  let alpha = args.next().and_then(|letter| letter.chars().next());

  let settings = SearchSettings::development();
  let engine = SearchEngine::builder(MemoryCatalog::from_json(CATALOG)?)
    .lookup_failure_policy(LookupFailurePolicy::Degrade)
    .audit(TracingAudit::default())
    .build();

  let mut query = settings.query(&keyword);
  if let Some(letter) = alpha {
    query = query.with_alpha_filter(letter)?;
  }
  let request = SearchRequest::builder(query)
    .fields(settings.field_ids()?)
    .limits(settings.limits())
    .build();

  let response = engine.search(&request).await?;
  println!("{}", serde_json::to_string_pretty(&response)?);
  Ok(())
}
