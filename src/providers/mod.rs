//! Built-in [`SearchEngineProvider`](crate::provider::SearchEngineProvider)
//! implementations.
//!
//! - [`SqlSearchEngineProvider`] issues one parameterized statement per
//!   strategy through a [`CatalogStore`](crate::store::CatalogStore).
//! - [`MemoryCatalog`] evaluates the same strategies over data held in memory.

pub mod memory;
pub mod relevance;
pub mod sql;

pub use memory::{CatalogCategory, CatalogManufacturer, CatalogProduct, MemoryCatalog, MemoryCatalogBuilder};
pub use sql::{CatalogTables, RelevanceMode, SqlSearchEngineProvider};
