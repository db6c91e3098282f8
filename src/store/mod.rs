//! Storage boundary for the catalog.

pub mod adapter;
#[cfg(feature = "mysql")]
pub mod mysql;

pub use adapter::{CatalogStore, Row, SqlValue, Statement};
#[cfg(feature = "mysql")]
pub use mysql::MySqlCatalogStore;
