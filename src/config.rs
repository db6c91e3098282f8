//! Storefront-level search settings.
//!
//! Loaded from TOML, e.g.
//!
//! ```toml
//! fields = ["name-description", "model-broad"]
//! product_limit = 5
//! category_limit = 3
//! table_prefix = "zen_"
//! ```

use crate::error::{Result, SearchError};
use crate::providers::sql::{CatalogTables, RelevanceMode, SqlSearchEngineProvider};
use crate::query::{SearchQuery, DEFAULT_LANGUAGE_ID};
use crate::sanitize::KeywordSanitizer;
use crate::store::CatalogStore;
use crate::strategy::FieldId;
use crate::types::{SearchLimits, SearchRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Search settings as an administrator configures them.
///
/// Every field has a default, so an empty document is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Enabled search fields, in priority order.
    #[serde(default = "default_fields")]
    pub fields: Vec<String>,

    #[serde(default = "default_product_limit")]
    pub product_limit: i64,

    /// Zero disables the category lookup.
    #[serde(default)]
    pub category_limit: i64,

    /// Zero disables the manufacturer lookup.
    #[serde(default)]
    pub manufacturer_limit: i64,

    #[serde(default = "default_min_keyword_length")]
    pub min_keyword_length: usize,

    #[serde(default = "default_max_keyword_length")]
    pub max_keyword_length: usize,

    /// Adds `WITH QUERY EXPANSION` to the natural-language relevance score.
    #[serde(default = "default_use_query_expansion")]
    pub use_query_expansion: bool,

    /// Overrides `use_query_expansion` when set, e.g. `relevance_mode = "boolean"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_mode: Option<RelevanceMode>,

    #[serde(default)]
    pub table_prefix: String,

    #[serde(default = "default_language_id")]
    pub language_id: u32,
}

fn default_fields() -> Vec<String> {
    vec![
        FieldId::NameDescription.as_str().to_string(),
        FieldId::ModelBroad.as_str().to_string(),
    ]
}

fn default_product_limit() -> i64 {
    5
}

fn default_min_keyword_length() -> usize {
    3
}

fn default_max_keyword_length() -> usize {
    100
}

fn default_use_query_expansion() -> bool {
    true
}

fn default_language_id() -> u32 {
    DEFAULT_LANGUAGE_ID
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            fields: default_fields(),
            product_limit: default_product_limit(),
            category_limit: 0,
            manufacturer_limit: 0,
            min_keyword_length: default_min_keyword_length(),
            max_keyword_length: default_max_keyword_length(),
            use_query_expansion: default_use_query_expansion(),
            relevance_mode: None,
            table_prefix: String::new(),
            language_id: default_language_id(),
        }
    }
}

impl SearchSettings {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)
            .map_err(|e| SearchError::configuration(format!("invalid search settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads, parses and validates a TOML file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SearchError::configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let settings = Self::from_toml_str(&content)?;

        tracing::info!("Loaded search settings from: {}", path.display());
        Ok(settings)
    }

    /// Every field, generous limits and short keywords. For local catalogs.
    pub fn development() -> Self {
        Self {
            fields: FieldId::ALL.iter().map(|f| f.as_str().to_string()).collect(),
            product_limit: 10,
            category_limit: 5,
            manufacturer_limit: 5,
            min_keyword_length: 1,
            ..Self::default()
        }
    }

    /// Checks the settings as a whole.
    ///
    /// Unknown or repeated fields and an invalid table prefix are
    /// configuration errors; negative limits and inverted keyword bounds are
    /// validation errors.
    pub fn validate(&self) -> Result<()> {
        self.field_ids()?;
        self.limits().validate()?;
        if self.min_keyword_length > self.max_keyword_length {
            return Err(SearchError::validation(format!(
                "min_keyword_length ({}) exceeds max_keyword_length ({})",
                self.min_keyword_length, self.max_keyword_length
            )));
        }
        self.tables()?;
        Ok(())
    }

    /// The enabled fields, parsed, in configured order.
    pub fn field_ids(&self) -> Result<Vec<FieldId>> {
        let mut seen = HashSet::new();
        self.fields
            .iter()
            .map(|name| {
                let field: FieldId = name.parse()?;
                if !seen.insert(field) {
                    return Err(SearchError::configuration(format!(
                        "search field `{name}` is listed twice"
                    )));
                }
                Ok(field)
            })
            .collect()
    }

    pub fn limits(&self) -> SearchLimits {
        SearchLimits {
            products: self.product_limit,
            categories: self.category_limit,
            manufacturers: self.manufacturer_limit,
        }
    }

    pub fn sanitizer(&self) -> KeywordSanitizer {
        KeywordSanitizer::new(self.min_keyword_length, self.max_keyword_length)
    }

    pub fn tables(&self) -> Result<CatalogTables> {
        CatalogTables::with_prefix(&self.table_prefix)
    }

    /// Sanitizes a raw keyword into a query in the configured language.
    pub fn query(&self, raw_keyword: &str) -> SearchQuery {
        SearchQuery::new(self.sanitizer().sanitize(raw_keyword)).with_language(self.language_id)
    }

    /// Builds a complete request from raw user input.
    pub fn request(&self, raw_keyword: &str) -> Result<SearchRequest> {
        Ok(
            SearchRequest::builder(self.query(raw_keyword))
                .fields(self.field_ids()?)
                .limits(self.limits())
                .build(),
        )
    }

    /// The explicit `relevance_mode`, or the one implied by `use_query_expansion`.
    pub fn relevance_mode(&self) -> RelevanceMode {
        self.relevance_mode
            .unwrap_or_else(|| RelevanceMode::from_query_expansion(self.use_query_expansion))
    }

    /// A relational provider honouring the table prefix and relevance mode.
    pub fn sql_provider<S: CatalogStore>(&self, store: S) -> Result<SqlSearchEngineProvider<S>> {
        Ok(SqlSearchEngineProvider::new(store)
            .with_tables(self.tables()?)
            .relevance_mode(self.relevance_mode()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let settings = SearchSettings::from_toml_str("").unwrap();
        assert_eq!(settings, SearchSettings::default());
        assert_eq!(
            settings.field_ids().unwrap(),
            vec![FieldId::NameDescription, FieldId::ModelBroad]
        );
    }

    #[test]
    fn test_unknown_field_is_configuration_error() {
        let result = SearchSettings::from_toml_str(r#"fields = ["name", "colour"]"#);
        assert!(matches!(result, Err(SearchError::Configuration(_))));
    }

    #[test]
    fn test_duplicate_field_is_configuration_error() {
        let result = SearchSettings::from_toml_str(r#"fields = ["name", "name"]"#);
        assert!(matches!(result, Err(SearchError::Configuration(_))));
    }

    #[test]
    fn test_negative_limit_is_validation_error() {
        let result = SearchSettings::from_toml_str("category_limit = -2");
        assert!(matches!(result, Err(SearchError::Validation(_))));
    }

    #[test]
    fn test_inverted_keyword_bounds() {
        let result = SearchSettings::from_toml_str("min_keyword_length = 10\nmax_keyword_length = 5");
        assert!(matches!(result, Err(SearchError::Validation(_))));
    }

    #[test]
    fn test_bad_table_prefix() {
        let result = SearchSettings::from_toml_str(r#"table_prefix = "zen; DROP""#);
        assert!(matches!(result, Err(SearchError::Configuration(_))));
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "fields = [\"model-exact\", \"name\"]\nproduct_limit = 8\nmanufacturer_limit = 2\ntable_prefix = \"zen_\""
        )
        .unwrap();

        let settings = SearchSettings::from_toml_file(file.path()).unwrap();
        assert_eq!(settings.field_ids().unwrap(), vec![FieldId::ModelExact, FieldId::Name]);
        assert_eq!(settings.limits(), SearchLimits { products: 8, categories: 0, manufacturers: 2 });
        assert!(settings.use_query_expansion);
        assert_eq!(settings.relevance_mode(), RelevanceMode::Expanded);
    }

    #[test]
    fn test_relevance_mode_settings() {
        let natural = SearchSettings::from_toml_str("use_query_expansion = false").unwrap();
        assert_eq!(natural.relevance_mode(), RelevanceMode::Natural);

        let boolean = SearchSettings::from_toml_str(
            "use_query_expansion = true\nrelevance_mode = \"boolean\"",
        )
        .unwrap();
        assert_eq!(boolean.relevance_mode(), RelevanceMode::Boolean);

        let result = SearchSettings::from_toml_str(r#"relevance_mode = "fuzzy""#);
        assert!(matches!(result, Err(SearchError::Configuration(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = SearchSettings::from_toml_file("/nonexistent/instasearch.toml");
        assert!(matches!(result, Err(SearchError::Configuration(_))));
    }

    #[test]
    fn test_request_sanitizes_keyword() {
        let settings = SearchSettings::default();
        let request = settings.request("  <b>hex</b>&nbsp;key ").unwrap();
        assert_eq!(request.query().keyword(), "hex key");
        assert_eq!(request.limits().products, 5);

        let too_short = settings.request("ab").unwrap();
        assert!(too_short.query().is_empty());
    }

    #[test]
    fn test_development_preset_is_valid() {
        let settings = SearchSettings::development();
        settings.validate().unwrap();
        assert_eq!(settings.field_ids().unwrap().len(), FieldId::ALL.len());
    }
}
