use crate::model::StandardCategory;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Severity bands ─────────────────────────────────────────────────

/// Inclusive lower bounds for each severity band on a 1..=25 rating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityBands {
    pub critical: f64,
    pub high:     f64,
    pub medium:   f64,
}

impl Default for SeverityBands {
    fn default() -> Self {
        Self { critical: 20.0, high: 12.0, medium: 6.0 }
    }
}

// ── Outlier detection ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// A firm is flagged when |z| is strictly greater than this.
    pub z_threshold: f64,
    /// Categories with fewer qualifying firms are skipped.
    pub min_firms:   usize,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self { z_threshold: 1.5, min_firms: 3 }
    }
}

// ── Compliance tracking ────────────────────────────────────────────

/// Upper bound on `ComplianceConfig::rate_precision`.
pub const MAX_RATE_PRECISION: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    /// Decimal places kept on the compliance rate percentage.
    pub rate_precision: u32,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self { rate_precision: 1 }
    }
}

// ── Fetch fan-out ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_ms: u64,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_ms: 10_000 }
    }
}

// ── Category rules ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRuleConfig {
    /// Case-insensitive regular expression tested against the free-text category.
    pub pattern:  String,
    pub category: StandardCategory,
    /// Lower values are evaluated first; ties keep file order.
    #[serde(default)]
    pub priority: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRulesConfig {
    pub default_category: StandardCategory,
    pub rules:            Vec<CategoryRuleConfig>,
}

impl Default for CategoryRulesConfig {
    fn default() -> Self {
        let rule = |pattern: &str, category, priority| CategoryRuleConfig {
            pattern: pattern.into(),
            category,
            priority,
        };
        Self {
            default_category: StandardCategory::Operational,
            rules: vec![
                rule(r"regulat|complian|legal|aml|kyc|sanction|licen[cs]", StandardCategory::Compliance, 10),
                rule(r"reputat|brand|media|public|client trust", StandardCategory::Reputational, 20),
                rule(r"strateg|competit|business model|governance|board", StandardCategory::Strategic, 30),
                rule(r"market|credit|liquidity|capital|financ|investment|counterparty", StandardCategory::Financial, 40),
                rule(r"operat|fraud|cyber|technolog|\bit\b|system|process|people|outsourc|continuity", StandardCategory::Operational, 50),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct EngineConfigFile {
    #[serde(default)]
    severity:   SeverityBands,
    #[serde(default)]
    outlier:    OutlierConfig,
    #[serde(default)]
    compliance: ComplianceConfig,
    #[serde(default)]
    fetch:      FetchConfig,
}

// ── Engine config ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub severity:   SeverityBands,
    pub outlier:    OutlierConfig,
    pub compliance: ComplianceConfig,
    pub fetch:      FetchConfig,
    pub categories: CategoryRulesConfig,
}

impl EngineConfig {
    /// Load from the data/ directory.
    /// In tests, use EngineConfig::default().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/analytics/engine_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let file: EngineConfigFile = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;

        let rules_path = format!("{data_dir}/analytics/category_rules.json");
        let rules_content = std::fs::read_to_string(&rules_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {rules_path}: {e}"))?;
        let categories: CategoryRulesConfig = serde_json::from_str(&rules_content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {rules_path}: {e}"))?;

        let bands = &file.severity;
        if !(bands.medium < bands.high && bands.high < bands.critical) {
            anyhow::bail!(
                "severity bands must increase: medium {} < high {} < critical {}",
                bands.medium,
                bands.high,
                bands.critical
            );
        }

        if file.compliance.rate_precision > MAX_RATE_PRECISION {
            anyhow::bail!(
                "compliance.rate_precision {} exceeds {MAX_RATE_PRECISION}",
                file.compliance.rate_precision
            );
        }

        log::debug!(
            "config loaded from {data_dir}: {} category rules, z_threshold={}",
            categories.rules.len(),
            file.outlier.z_threshold
        );

        Ok(Self {
            severity:   file.severity,
            outlier:    file.outlier,
            compliance: file.compliance,
            fetch:      file.fetch,
            categories,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// A data dir holding the shipped rules and an engine config with the
    /// given rate precision.
    fn data_dir(name: &str, rate_precision: u32) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("grc-config-{name}-{}", std::process::id()));
        let analytics = dir.join("analytics");
        std::fs::create_dir_all(&analytics).unwrap();
        std::fs::write(
            analytics.join("category_rules.json"),
            include_str!("../../data/analytics/category_rules.json"),
        )
        .unwrap();
        let config = serde_json::json!({
            "severity":   { "critical": 20.0, "high": 12.0, "medium": 6.0 },
            "compliance": { "rate_precision": rate_precision },
        });
        std::fs::write(analytics.join("engine_config.json"), config.to_string()).unwrap();
        dir
    }

    #[test]
    fn load_accepts_precision_at_cap() {
        let dir = data_dir("cap", MAX_RATE_PRECISION);
        let config = EngineConfig::load(dir.to_str().unwrap()).unwrap();
        assert_eq!(config.compliance.rate_precision, MAX_RATE_PRECISION);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn load_rejects_oversized_precision() {
        let dir = data_dir("oversized", 400);
        let err = EngineConfig::load(dir.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("rate_precision"), "{err}");
        std::fs::remove_dir_all(dir).ok();
    }
}
