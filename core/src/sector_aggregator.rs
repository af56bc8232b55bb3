//! Sector aggregation across every firm assigned to one regulator.
//!
//! This module:
//!   1. Resolves each firm's open risks onto standard categories
//!   2. Builds one portfolio row per firm with per-category cells
//!   3. Buckets every risk into the 5×5 likelihood × impact heatmap
//!   4. Computes sector-level category averages
//!   5. Measures mapping completeness (firms covering all five categories)
//!
//! Output is a snapshot: no clock, no randomness, rows sorted by name then id.
//! Firms whose data failed to load are flagged and otherwise treated as
//! having no risks.

use crate::{
    category_resolver::{CategoryResolver, OrganizationMappings, ResolutionSource},
    config::SeverityBands,
    model::{CategoryMapping, Organization, Rating, Risk, StandardCategory},
    severity::Severity,
    types::EntityId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const CATEGORY_COUNT: usize = StandardCategory::ALL.len();

// ── Input ────────────────────────────────────────────────────────────────────

/// A risk after category resolution; all the aggregator needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRisk {
    pub risk_id:    EntityId,
    pub category:   StandardCategory,
    pub likelihood: Rating,
    pub impact:     Rating,
}

impl ResolvedRisk {
    pub fn rating(&self) -> u8 {
        self.likelihood.value() * self.impact.value()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrganizationData {
    Loaded {
        risks: Vec<ResolvedRisk>,
        /// Internal category names that matched neither a mapping nor a rule.
        unmapped_categories: Vec<String>,
    },
    Failed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationPortfolio {
    pub organization: Organization,
    pub data:         OrganizationData,
}

impl OrganizationPortfolio {
    /// Resolve a firm's raw register. Closed risks are dropped.
    pub fn resolve(
        organization: Organization,
        risks:        &[Risk],
        mappings:     &[CategoryMapping],
        resolver:     &CategoryResolver,
    ) -> Self {
        let table = OrganizationMappings::from_rows(mappings);
        let mut unmapped = BTreeSet::new();
        let resolved = risks
            .iter()
            .filter(|r| r.status.is_open())
            .map(|r| {
                let resolution = resolver.resolve_with_source(&r.category, &table);
                if resolution.source == ResolutionSource::Default {
                    unmapped.insert(r.category.clone());
                }
                ResolvedRisk {
                    risk_id:    r.risk_id.clone(),
                    category:   resolution.category,
                    likelihood: r.likelihood,
                    impact:     r.impact,
                }
            })
            .collect();

        Self {
            organization,
            data: OrganizationData::Loaded {
                risks: resolved,
                unmapped_categories: unmapped.into_iter().collect(),
            },
        }
    }

    pub fn failed(organization: Organization, reason: impl Into<String>) -> Self {
        Self { organization, data: OrganizationData::Failed { reason: reason.into() } }
    }
}

// ── Output ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCell {
    pub category:       StandardCategory,
    pub risk_count:     u32,
    /// `None` means no data, which is distinct from an average of zero.
    pub avg_rating:     Option<f64>,
    pub severity:       Option<Severity>,
    pub critical_count: u32,
    pub high_count:     u32,
}

impl CategoryCell {
    pub fn has_data(&self) -> bool {
        self.risk_count > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DataStatus {
    Loaded,
    FetchFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRow {
    pub organization_id:     EntityId,
    pub organization_name:   String,
    pub institution_type:    String,
    pub data_status:         DataStatus,
    /// One cell per standard category, in `StandardCategory::ALL` order.
    pub cells:               Vec<CategoryCell>,
    pub total_risks:         u32,
    pub overall_avg_rating:  Option<f64>,
    /// Worst severity across the cells that have data.
    pub overall_severity:    Option<Severity>,
    pub unmapped_categories: Vec<String>,
}

impl PortfolioRow {
    pub fn cell(&self, category: StandardCategory) -> &CategoryCell {
        &self.cells[category.index()]
    }

    pub fn covers_all_categories(&self) -> bool {
        self.cells.iter().all(CategoryCell::has_data)
    }
}

/// Risk counts indexed `[likelihood - 1][impact - 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeatmapMatrix {
    pub cells: [[u32; 5]; 5],
}

impl HeatmapMatrix {
    fn bucket(value: u8) -> usize {
        usize::from(value.clamp(Rating::MIN, Rating::MAX) - 1)
    }

    pub fn record(&mut self, likelihood: u8, impact: u8) {
        self.cells[Self::bucket(likelihood)][Self::bucket(impact)] += 1;
    }

    pub fn count(&self, likelihood: u8, impact: u8) -> u32 {
        self.cells[Self::bucket(likelihood)][Self::bucket(impact)]
    }

    pub fn total(&self) -> u32 {
        self.cells.iter().flatten().sum()
    }

    /// Color band of a cell, from its `likelihood * impact` product.
    pub fn severity_at(&self, likelihood: u8, impact: u8, bands: &SeverityBands) -> Severity {
        let l = likelihood.clamp(Rating::MIN, Rating::MAX);
        let i = impact.clamp(Rating::MIN, Rating::MAX);
        bands.classify(f64::from(l * i))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAverage {
    pub category:       StandardCategory,
    /// Mean of the per-firm averages, over firms with data in this category.
    pub avg_rating:     Option<f64>,
    pub total_risks:    u32,
    pub critical_count: u32,
    pub high_count:     u32,
    pub firm_count:     u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorSnapshot {
    pub rows:                 Vec<PortfolioRow>,
    pub heatmap:              HeatmapMatrix,
    pub category_averages:    Vec<CategoryAverage>,
    /// Fraction of firms with at least one risk in every standard category.
    pub mapping_completeness: f64,
    pub total_risks:          u32,
    pub failed_organizations: Vec<EntityId>,
}

impl SectorSnapshot {
    /// Firms with data, highest overall average first; ties by name then id.
    pub fn most_at_risk(&self, n: usize) -> Vec<&PortfolioRow> {
        let mut ranked: Vec<&PortfolioRow> = self
            .rows
            .iter()
            .filter(|r| r.overall_avg_rating.is_some())
            .collect();
        ranked.sort_by(|a, b| {
            let (a_avg, b_avg) = (a.overall_avg_rating.unwrap_or(0.0), b.overall_avg_rating.unwrap_or(0.0));
            b_avg
                .total_cmp(&a_avg)
                .then_with(|| a.organization_name.cmp(&b.organization_name))
                .then_with(|| a.organization_id.cmp(&b.organization_id))
        });
        ranked.truncate(n);
        ranked
    }

    pub fn category_average(&self, category: StandardCategory) -> &CategoryAverage {
        &self.category_averages[category.index()]
    }
}

// ── Aggregation ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct CellAccumulator {
    ratings:  Vec<u8>,
    critical: u32,
    high:     u32,
}

impl CellAccumulator {
    fn push(&mut self, rating: u8, bands: &SeverityBands) {
        let r = f64::from(rating);
        if r >= bands.critical {
            self.critical += 1;
        } else if r >= bands.high {
            self.high += 1;
        }
        self.ratings.push(rating);
    }

    fn finish(&self, category: StandardCategory, bands: &SeverityBands) -> CategoryCell {
        let avg_rating = mean_u8(&self.ratings);
        CategoryCell {
            category,
            risk_count: self.ratings.len() as u32,
            avg_rating,
            severity: avg_rating.map(|a| bands.classify(a)),
            critical_count: self.critical,
            high_count: self.high,
        }
    }
}

fn mean_u8(values: &[u8]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: u32 = values.iter().map(|&v| u32::from(v)).sum();
    Some(f64::from(sum) / values.len() as f64)
}

pub struct SectorAggregator {
    bands: SeverityBands,
}

impl SectorAggregator {
    pub fn new(bands: SeverityBands) -> Self {
        Self { bands }
    }

    pub fn aggregate(&self, portfolios: &[OrganizationPortfolio]) -> SectorSnapshot {
        let mut ordered: Vec<&OrganizationPortfolio> = portfolios.iter().collect();
        ordered.sort_by(|a, b| {
            a.organization
                .name
                .cmp(&b.organization.name)
                .then_with(|| a.organization.organization_id.cmp(&b.organization.organization_id))
        });

        let mut heatmap = HeatmapMatrix::default();
        let mut rows = Vec::with_capacity(ordered.len());
        let mut failed_organizations = Vec::new();

        for portfolio in ordered {
            let org = &portfolio.organization;
            let (risks, unmapped, data_status): (&[ResolvedRisk], &[String], DataStatus) =
                match &portfolio.data {
                    OrganizationData::Loaded { risks, unmapped_categories } => {
                        (risks.as_slice(), unmapped_categories.as_slice(), DataStatus::Loaded)
                    }
                    OrganizationData::Failed { reason } => {
                        failed_organizations.push(org.organization_id.clone());
                        (
                            &[] as &[ResolvedRisk],
                            &[] as &[String],
                            DataStatus::FetchFailed { reason: reason.clone() },
                        )
                    }
                };

            let mut cells: [CellAccumulator; CATEGORY_COUNT] = Default::default();
            let mut all_ratings = Vec::with_capacity(risks.len());
            for risk in risks {
                let rating = risk.rating();
                cells[risk.category.index()].push(rating, &self.bands);
                all_ratings.push(rating);
                heatmap.record(risk.likelihood.value(), risk.impact.value());
            }

            let cells: Vec<CategoryCell> = StandardCategory::ALL
                .iter()
                .map(|&c| cells[c.index()].finish(c, &self.bands))
                .collect();
            let overall_severity = cells.iter().filter_map(|c| c.severity).max();

            rows.push(PortfolioRow {
                organization_id: org.organization_id.clone(),
                organization_name: org.name.clone(),
                institution_type: org.institution_type.clone(),
                data_status,
                total_risks: all_ratings.len() as u32,
                overall_avg_rating: mean_u8(&all_ratings),
                overall_severity,
                cells,
                unmapped_categories: unmapped.to_vec(),
            });
        }

        let category_averages = StandardCategory::ALL
            .iter()
            .map(|&c| Self::category_average(c, &rows))
            .collect();

        let complete = rows.iter().filter(|r| r.covers_all_categories()).count();
        let mapping_completeness = if rows.is_empty() {
            0.0
        } else {
            complete as f64 / rows.len() as f64
        };
        let total_risks = rows.iter().map(|r| r.total_risks).sum();

        log::debug!(
            "sector: firms={} failed={} risks={} completeness={:.2}",
            rows.len(),
            failed_organizations.len(),
            total_risks,
            mapping_completeness
        );

        SectorSnapshot {
            rows,
            heatmap,
            category_averages,
            mapping_completeness,
            total_risks,
            failed_organizations,
        }
    }

    fn category_average(category: StandardCategory, rows: &[PortfolioRow]) -> CategoryAverage {
        let cells: Vec<&CategoryCell> = rows
            .iter()
            .map(|r| r.cell(category))
            .filter(|c| c.has_data())
            .collect();
        let firm_count = cells.len() as u32;
        let avg_rating = if cells.is_empty() {
            None
        } else {
            let sum: f64 = cells.iter().filter_map(|c| c.avg_rating).sum();
            Some(sum / f64::from(firm_count))
        };
        CategoryAverage {
            category,
            avg_rating,
            total_risks: cells.iter().map(|c| c.risk_count).sum(),
            critical_count: cells.iter().map(|c| c.critical_count).sum(),
            high_count: cells.iter().map(|c| c.high_count).sum(),
            firm_count,
        }
    }
}
