//! Field identifiers, strategy identifiers and the static table linking them.

use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A logical search target enabled by the storefront configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldId {
    Category,
    Manufacturer,
    MetaKeywords,
    ModelBroad,
    ModelExact,
    Name,
    NameDescription,
}

impl FieldId {
    /// Every field, in declaration order.
    pub const ALL: [FieldId; 7] = [
        FieldId::Category,
        FieldId::Manufacturer,
        FieldId::MetaKeywords,
        FieldId::ModelBroad,
        FieldId::ModelExact,
        FieldId::Name,
        FieldId::NameDescription,
    ];

    /// The configuration identifier of this field.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldId::Category => "category",
            FieldId::Manufacturer => "manufacturer",
            FieldId::MetaKeywords => "meta-keywords",
            FieldId::ModelBroad => "model-broad",
            FieldId::ModelExact => "model-exact",
            FieldId::Name => "name",
            FieldId::NameDescription => "name-description",
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldId {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        FieldId::ALL
            .into_iter()
            .find(|field| field.as_str() == s.trim())
            .ok_or_else(|| SearchError::configuration(format!("unknown search field `{s}`")))
    }
}

/// One matching technique against one product attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    /// Name of the product's master category matches any keyword word.
    ProductCategory,
    /// Manufacturer name matches any keyword word.
    ProductManufacturer,
    /// Product meta keywords match any keyword word.
    MetaKeywords,
    /// Stock-by-attribute model numbers contain the keyword. Only meaningful
    /// on catalogs carrying the products-options-stock tables.
    ModelOptionsStock,
    /// Product model matches any keyword word.
    ModelBroad,
    /// Product model equals the keyword.
    ModelExact,
    /// Product name begins with the keyword.
    NameBegins,
    /// Product name contains the keyword, ranked by full-text relevance.
    NameRelevance,
    /// Product name or description contains the keyword, ranked by full-text
    /// relevance of both.
    NameDescriptionRelevance,
    /// Product name matches any keyword word.
    NameContains,
}

impl StrategyId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::ProductCategory => "product_category",
            StrategyId::ProductManufacturer => "product_manufacturer",
            StrategyId::MetaKeywords => "meta_keywords",
            StrategyId::ModelOptionsStock => "model_options_stock",
            StrategyId::ModelBroad => "model_broad",
            StrategyId::ModelExact => "model_exact",
            StrategyId::NameBegins => "name_begins",
            StrategyId::NameRelevance => "name_relevance",
            StrategyId::NameDescriptionRelevance => "name_description_relevance",
            StrategyId::NameContains => "name_contains",
        }
    }

    /// The ordering this strategy applies to its own matches.
    pub fn ranking(&self) -> RankingPolicy {
        match self {
            StrategyId::NameRelevance | StrategyId::NameDescriptionRelevance => {
                RankingPolicy::RelevanceFirst
            }
            StrategyId::ModelOptionsStock => RankingPolicy::OptionsStockModel,
            StrategyId::ProductCategory
            | StrategyId::ProductManufacturer
            | StrategyId::MetaKeywords
            | StrategyId::ModelBroad
            | StrategyId::ModelExact
            | StrategyId::NameBegins
            | StrategyId::NameContains => RankingPolicy::PopularityFirst,
        }
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a strategy orders its matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingPolicy {
    /// Name relevance desc, description relevance desc (when scored), sort
    /// order asc, name asc.
    RelevanceFirst,
    /// Total views desc (missing counts as zero), sort order asc, name asc.
    PopularityFirst,
    /// Options-stock model desc, no further tie-break.
    OptionsStockModel,
}

/// Static mapping from a field to the strategies run for it.
///
/// The table is part of the program, never configuration.
pub struct StrategyCatalog;

impl StrategyCatalog {
    /// The ordered strategies for a single field.
    pub fn strategies(field: FieldId) -> &'static [StrategyId] {
        match field {
            FieldId::Category => &[StrategyId::ProductCategory],
            FieldId::Manufacturer => &[StrategyId::ProductManufacturer],
            FieldId::MetaKeywords => &[StrategyId::MetaKeywords],
            FieldId::ModelBroad => &[StrategyId::ModelOptionsStock, StrategyId::ModelBroad],
            FieldId::ModelExact => &[StrategyId::ModelExact],
            FieldId::Name => &[
                StrategyId::NameBegins,
                StrategyId::NameRelevance,
                StrategyId::NameContains,
            ],
            FieldId::NameDescription => &[
                StrategyId::NameBegins,
                StrategyId::NameDescriptionRelevance,
                StrategyId::NameContains,
            ],
        }
    }

    /// Flattens the fields into one strategy sequence. Field order is kept,
    /// then strategy order within each field.
    pub fn resolve(fields: &[FieldId]) -> Vec<StrategyId> {
        fields
            .iter()
            .flat_map(|field| Self::strategies(*field).iter().copied())
            .collect()
    }

    /// Parses configuration identifiers and resolves them.
    ///
    /// An unknown identifier is a configuration defect and fails the whole
    /// resolution.
    pub fn resolve_names<S: AsRef<str>>(names: &[S]) -> Result<Vec<StrategyId>> {
        let fields = names
            .iter()
            .map(|name| name.as_ref().parse::<FieldId>())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::resolve(&fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_round_trips_through_identifier() {
        for field in FieldId::ALL {
            assert_eq!(field.as_str().parse::<FieldId>().unwrap(), field);
        }
    }

    #[test]
    fn test_unknown_field_is_configuration_error() {
        let err = "price".parse::<FieldId>().unwrap_err();
        assert!(matches!(err, SearchError::Configuration(_)));
    }

    #[test]
    fn test_resolve_keeps_field_then_strategy_order() {
        let strategies = StrategyCatalog::resolve(&[FieldId::ModelExact, FieldId::Name]);
        assert_eq!(
            strategies,
            vec![
                StrategyId::ModelExact,
                StrategyId::NameBegins,
                StrategyId::NameRelevance,
                StrategyId::NameContains,
            ]
        );
    }

    #[test]
    fn test_model_broad_runs_options_stock_first() {
        assert_eq!(
            StrategyCatalog::strategies(FieldId::ModelBroad),
            &[StrategyId::ModelOptionsStock, StrategyId::ModelBroad]
        );
    }

    #[test]
    fn test_resolve_names_rejects_unknown() {
        let err = StrategyCatalog::resolve_names(&["name", "colour"]).unwrap_err();
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn test_field_serde_uses_kebab_case() {
        let json = serde_json::to_string(&FieldId::NameDescription).unwrap();
        assert_eq!(json, "\"name-description\"");
    }
}
