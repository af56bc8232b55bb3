//! Statistical outlier detection across firms, per standard category.
//!
//! For each category independently:
//!   - gather the average rating of every firm with data in that category
//!   - skip when fewer than `min_firms` qualify, or the spread is zero
//!   - flag firms whose population z-score magnitude exceeds the threshold
//!
//! Records from all categories are sorted by |z| descending.
//! Stateless: re-run whenever the sector snapshot changes.

use crate::{
    config::OutlierConfig,
    model::StandardCategory,
    sector_aggregator::SectorSnapshot,
    types::EntityId,
};
use serde::{Deserialize, Serialize};

/// Spreads below this are treated as no variance.
const MIN_STD_DEV: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierDirection {
    Above,
    Below,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierRecord {
    pub organization_id:   EntityId,
    pub organization_name: String,
    pub category:          StandardCategory,
    pub rating:            f64,
    pub sector_mean:       f64,
    pub sector_std_dev:    f64,
    /// |z|
    pub deviation:         f64,
    pub direction:         OutlierDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    InsufficientSample { firms: usize },
    NoVariance { mean: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCategory {
    pub category: StandardCategory,
    #[serde(flatten)]
    pub reason:   SkipReason,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OutlierReport {
    pub records: Vec<OutlierRecord>,
    pub skipped: Vec<SkippedCategory>,
}

/// Population mean and standard deviation. Caller guarantees non-empty input.
fn mean_and_std_dev(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

pub struct OutlierDetector {
    config: OutlierConfig,
}

impl OutlierDetector {
    pub fn new(config: OutlierConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, snapshot: &SectorSnapshot) -> OutlierReport {
        let mut report = OutlierReport::default();

        for category in StandardCategory::ALL {
            let firms: Vec<(&EntityId, &String, f64)> = snapshot
                .rows
                .iter()
                .filter_map(|row| {
                    row.cell(category)
                        .avg_rating
                        .map(|avg| (&row.organization_id, &row.organization_name, avg))
                })
                .collect();

            if firms.len() < self.config.min_firms {
                report.skipped.push(SkippedCategory {
                    category,
                    reason: SkipReason::InsufficientSample { firms: firms.len() },
                });
                continue;
            }

            let ratings: Vec<f64> = firms.iter().map(|(_, _, r)| *r).collect();
            let (mean, std_dev) = mean_and_std_dev(&ratings);
            if std_dev < MIN_STD_DEV {
                report.skipped.push(SkippedCategory {
                    category,
                    reason: SkipReason::NoVariance { mean },
                });
                continue;
            }

            for (org_id, org_name, rating) in firms {
                let z = (rating - mean) / std_dev;
                if z.abs() <= self.config.z_threshold {
                    continue;
                }
                report.records.push(OutlierRecord {
                    organization_id:   org_id.clone(),
                    organization_name: org_name.clone(),
                    category,
                    rating,
                    sector_mean: mean,
                    sector_std_dev: std_dev,
                    deviation: z.abs(),
                    direction: if z > 0.0 { OutlierDirection::Above } else { OutlierDirection::Below },
                });
            }
        }

        // Stable sort; equal deviations keep category order, then row order.
        report
            .records
            .sort_by(|a, b| b.deviation.total_cmp(&a.deviation));

        log::debug!(
            "outliers: {} flagged, {} categories skipped",
            report.records.len(),
            report.skipped.len()
        );
        report
    }
}
