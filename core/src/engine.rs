//! The analytics engine: configuration, category rules and a record source
//! wired together behind the regulator-facing operations.
//!
//! DATA FLOW (fixed):
//!   risks + controls ──> DIME ──> residual
//!   risks + mappings ──> category resolver ──> sector aggregator ──> outliers
//!   submissions + deadline ──> compliance tracker
//!
//! RULES:
//!   - The engine never writes to the source.
//!   - Fetches fan out; computation runs once all data has arrived.
//!   - Every result is a fresh value; nothing is cached between calls.

use crate::{
    category_resolver::CategoryResolver,
    compliance_tracker::{ComplianceReport, ComplianceTracker},
    config::EngineConfig,
    error::{EngineError, EngineResult},
    fetch::{self, PortfolioSource},
    model::{Control, Regulator, Risk},
    outlier_detector::{OutlierDetector, OutlierReport},
    residual::{self, RiskAssessment},
    sector_aggregator::{SectorAggregator, SectorSnapshot},
    types::Period,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything a regulator dashboard needs for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatorReport {
    pub regulator:  Regulator,
    pub period:     Period,
    pub sector:     SectorSnapshot,
    pub outliers:   OutlierReport,
    pub compliance: ComplianceReport,
}

pub struct AnalyticsEngine<S: PortfolioSource> {
    config:   EngineConfig,
    resolver: CategoryResolver,
    source:   Arc<S>,
}

impl<S: PortfolioSource> AnalyticsEngine<S> {
    /// Fails only when a category rule pattern does not compile.
    pub fn new(config: EngineConfig, source: S) -> EngineResult<Self> {
        let resolver = CategoryResolver::from_config(&config.categories)?;
        Ok(Self {
            config,
            resolver,
            source: Arc::new(source),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolver(&self) -> &CategoryResolver {
        &self.resolver
    }

    pub async fn regulator(&self, code: &str) -> EngineResult<Regulator> {
        let code_owned = code.to_string();
        fetch::blocking(&self.source, move |s| s.regulator_by_code(&code_owned))
            .await?
            .ok_or_else(|| EngineError::RegulatorNotFound(code.to_string()))
    }

    /// Portfolio rows, heatmap and category averages for every assigned firm.
    pub async fn sector_snapshot(&self, regulator: &Regulator) -> EngineResult<SectorSnapshot> {
        let regulator_id = regulator.regulator_id.clone();
        let organizations =
            fetch::blocking(&self.source, move |s| s.assigned_organizations(&regulator_id)).await?;

        let portfolios = fetch::fetch_portfolios(
            &self.source,
            &self.resolver,
            organizations,
            self.config.fetch.timeout(),
        )
        .await;

        Ok(SectorAggregator::new(self.config.severity).aggregate(&portfolios))
    }

    pub fn detect_outliers(&self, snapshot: &SectorSnapshot) -> OutlierReport {
        OutlierDetector::new(self.config.outlier).detect(snapshot)
    }

    pub async fn outliers(&self, regulator: &Regulator) -> EngineResult<OutlierReport> {
        let snapshot = self.sector_snapshot(regulator).await?;
        Ok(self.detect_outliers(&snapshot))
    }

    /// Submission status of every assigned firm for `period`, evaluated at `now`.
    pub async fn compliance(
        &self,
        regulator: &Regulator,
        period:    Period,
        now:       DateTime<Utc>,
    ) -> EngineResult<ComplianceReport> {
        let regulator_id = regulator.regulator_id.clone();
        let (organizations, deadline) = fetch::blocking(&self.source, move |s| {
            Ok((
                s.assigned_organizations(&regulator_id)?,
                s.submission_deadline(&regulator_id, period)?,
            ))
        })
        .await?;

        if deadline.is_none() {
            log::info!("compliance: no deadline configured for {} {period}", regulator.code);
        }

        let submissions = fetch::fetch_submissions(
            &self.source,
            organizations,
            period,
            self.config.fetch.timeout(),
        )
        .await;

        Ok(ComplianceTracker::new(self.config.compliance).track(
            period,
            deadline.as_ref(),
            &submissions,
            now,
        ))
    }

    /// Residual view of one risk; `controls` may include unsaved ones.
    pub fn assess_risk(&self, risk: &Risk, controls: &[Control]) -> RiskAssessment {
        residual::assess_risk(risk, controls, &self.config.severity)
    }

    /// Residual view of every open risk on one firm's register.
    pub async fn assess_register(&self, organization_id: &str) -> EngineResult<Vec<RiskAssessment>> {
        let org_id = organization_id.to_string();
        let register = fetch::blocking(&self.source, move |s| {
            s.organization_risks(&org_id)?
                .into_iter()
                .filter(|r| r.status.is_open())
                .map(|r| -> EngineResult<(Risk, Vec<Control>)> {
                    let controls = s.controls_for_risk(&r.risk_id)?;
                    Ok((r, controls))
                })
                .collect::<EngineResult<Vec<_>>>()
        })
        .await?;

        Ok(register
            .iter()
            .map(|(risk, controls)| self.assess_risk(risk, controls))
            .collect())
    }

    /// Sector, outliers and compliance for one regulator and period.
    pub async fn regulator_report(
        &self,
        regulator_code: &str,
        period:         Period,
        now:            DateTime<Utc>,
    ) -> EngineResult<RegulatorReport> {
        let regulator = self.regulator(regulator_code).await?;
        let sector = self.sector_snapshot(&regulator).await?;
        let outliers = self.detect_outliers(&sector);
        let compliance = self.compliance(&regulator, period, now).await?;

        log::info!(
            "report {} {period}: firms={} risks={} outliers={} compliance={}%",
            regulator.code,
            sector.rows.len(),
            sector.total_risks,
            outliers.records.len(),
            compliance.stats.compliance_rate
        );

        Ok(RegulatorReport { regulator, period, sector, outliers, compliance })
    }
}
