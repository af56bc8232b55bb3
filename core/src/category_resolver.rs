//! Maps a firm's free-text risk category onto one of the standard categories.
//!
//! Resolution order:
//!   1. the organization's explicit mapping table (exact match)
//!   2. the keyword rule table, in priority order (case-insensitive)
//!   3. the configured default category
//!
//! Resolution is total: every input yields exactly one standard category.

use crate::{
    config::CategoryRulesConfig,
    error::{EngineError, EngineResult},
    model::{CategoryMapping, StandardCategory},
};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a resolved category came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ResolutionSource {
    Mapping,
    Keyword { pattern: String },
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub category: StandardCategory,
    #[serde(flatten)]
    pub source:   ResolutionSource,
}

/// One organization's explicit internal → standard mapping table.
#[derive(Debug, Clone, Default)]
pub struct OrganizationMappings {
    entries: HashMap<String, StandardCategory>,
}

impl OrganizationMappings {
    /// Later rows for the same internal name replace earlier ones.
    pub fn from_rows(rows: &[CategoryMapping]) -> Self {
        let entries = rows
            .iter()
            .map(|m| (m.internal_category.clone(), m.standard))
            .collect();
        Self { entries }
    }

    pub fn get(&self, internal_category: &str) -> Option<StandardCategory> {
        self.entries.get(internal_category).copied()
    }
}

#[derive(Debug, Clone)]
struct KeywordRule {
    pattern:  Regex,
    category: StandardCategory,
}

#[derive(Debug, Clone)]
pub struct CategoryResolver {
    rules:   Vec<KeywordRule>,
    default: StandardCategory,
}

impl CategoryResolver {
    /// Compile the rule table. Fails only on an invalid pattern.
    pub fn from_config(config: &CategoryRulesConfig) -> EngineResult<Self> {
        let mut ordered: Vec<_> = config.rules.iter().collect();
        // Stable sort: equal priorities keep file order.
        ordered.sort_by_key(|r| r.priority);

        let rules = ordered
            .into_iter()
            .map(|r| {
                let pattern = RegexBuilder::new(&r.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| EngineError::InvalidPattern {
                        pattern: r.pattern.clone(),
                        source,
                    })?;
                Ok(KeywordRule { pattern, category: r.category })
            })
            .collect::<EngineResult<Vec<_>>>()?;

        Ok(Self { rules, default: config.default_category })
    }

    pub fn default_category(&self) -> StandardCategory {
        self.default
    }

    pub fn resolve(&self, category: &str, mappings: &OrganizationMappings) -> StandardCategory {
        self.resolve_with_source(category, mappings).category
    }

    pub fn resolve_with_source(&self, category: &str, mappings: &OrganizationMappings) -> Resolution {
        if let Some(standard) = mappings.get(category) {
            return Resolution { category: standard, source: ResolutionSource::Mapping };
        }
        if let Some(rule) = self.rules.iter().find(|r| r.pattern.is_match(category)) {
            return Resolution {
                category: rule.category,
                source:   ResolutionSource::Keyword { pattern: rule.pattern.as_str().to_string() },
            };
        }
        Resolution { category: self.default, source: ResolutionSource::Default }
    }
}
