//! Instasearch - multi-strategy instant search for storefront catalogs.
//!
//! A keyword typed into a search box is sanitized, turned into the patterns
//! the matching strategies need, and run through the strategies of every
//! enabled field in priority order until the product budget is filled.
//! Categories and manufacturers whose names match are looked up alongside.
//!
//! ```rust
//! use instasearch::prelude::*;
//!
//! let settings = SearchSettings::default();
//! let request = settings.request("  <b>socket</b> wrench ").unwrap();
//! assert_eq!(request.query().keyword(), "socket wrench");
//! assert_eq!(request.query().alternation(), "socket|wrench");
//! ```

pub mod audit;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod provider;
pub mod providers;
pub mod query;
pub mod sanitize;
pub mod store;
pub mod strategy;
pub mod types;

pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::audit::*;
    pub use crate::config::*;
    pub use crate::context::*;
    pub use crate::engine::*;
    pub use crate::error::{SearchError, StoreError};
    pub use crate::provider::*;
    pub use crate::providers::*;
    pub use crate::query::*;
    pub use crate::sanitize::*;
    pub use crate::store::*;
    pub use crate::strategy::*;
    pub use crate::types::*;
}
