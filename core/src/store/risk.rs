//! Store methods for risks, controls and category mappings.

use super::AnalyticsStore;
use crate::{
    error::EngineResult,
    model::{CategoryMapping, Control, ControlTarget, DimeScore, Rating, Risk, StandardCategory},
};
use rusqlite::params;

/// Raw `risk` row before range checks.
struct RiskRow {
    risk_id:         String,
    organization_id: String,
    category:        String,
    likelihood:      i64,
    impact:          i64,
    status:          String,
}

impl RiskRow {
    fn validate(self) -> EngineResult<Risk> {
        Ok(Risk {
            likelihood:      Rating::new(self.likelihood)?,
            impact:          Rating::new(self.impact)?,
            status:          self.status.parse()?,
            risk_id:         self.risk_id,
            organization_id: self.organization_id,
            category:        self.category,
        })
    }
}

/// Raw `risk_control` row before range checks.
struct ControlRow {
    control_id: String,
    risk_id:    String,
    target:     String,
    scores:     [Option<i64>; 4],
}

impl ControlRow {
    fn validate(self) -> EngineResult<Control> {
        let [d, i, m, e] = self.scores;
        Ok(Control {
            control_id: self.control_id,
            risk_id:    self.risk_id,
            target:     ControlTarget::parse(&self.target),
            dime:       DimeScore::new(d, i, m, e)?,
        })
    }
}

fn target_text(target: ControlTarget) -> &'static str {
    match target {
        ControlTarget::Likelihood => "Likelihood",
        ControlTarget::Impact     => "Impact",
        ControlTarget::Unassigned => "",
    }
}

impl AnalyticsStore {
    pub fn insert_risk(&self, risk: &Risk) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO risk
             (risk_id, organization_id, category, likelihood_inherent, impact_inherent, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                risk.risk_id,
                risk.organization_id,
                risk.category,
                risk.likelihood.value(),
                risk.impact.value(),
                risk.status.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_control(&self, control: &Control) -> EngineResult<()> {
        let dime = &control.dime;
        self.conn.execute(
            "INSERT INTO risk_control
             (control_id, risk_id, target, design_score, implementation_score,
              monitoring_score, evaluation_score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                control.control_id,
                control.risk_id,
                target_text(control.target),
                dime.design(),
                dime.implementation(),
                dime.monitoring(),
                dime.evaluation(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_category_mapping(&self, mapping: &CategoryMapping) -> EngineResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO category_mapping
             (organization_id, internal_category, standard_code)
             VALUES (?1, ?2, ?3)",
            params![mapping.organization_id, mapping.internal_category, mapping.standard.code()],
        )?;
        Ok(())
    }

    /// Every risk on an organization's register, closed ones included.
    pub fn organization_risks(&self, organization_id: &str) -> EngineResult<Vec<Risk>> {
        let mut stmt = self.conn.prepare(
            "SELECT risk_id, organization_id, category, likelihood_inherent,
                    impact_inherent, status
             FROM risk WHERE organization_id = ?1
             ORDER BY risk_id ASC",
        )?;
        let rows = stmt
            .query_map(params![organization_id], |row| {
                Ok(RiskRow {
                    risk_id:         row.get(0)?,
                    organization_id: row.get(1)?,
                    category:        row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    likelihood:      row.get(3)?,
                    impact:          row.get(4)?,
                    status:          row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RiskRow::validate).collect()
    }

    pub fn controls_for_risk(&self, risk_id: &str) -> EngineResult<Vec<Control>> {
        let mut stmt = self.conn.prepare(
            "SELECT control_id, risk_id, target, design_score, implementation_score,
                    monitoring_score, evaluation_score
             FROM risk_control WHERE risk_id = ?1
             ORDER BY control_id ASC",
        )?;
        let rows = stmt
            .query_map(params![risk_id], |row| {
                Ok(ControlRow {
                    control_id: row.get(0)?,
                    risk_id:    row.get(1)?,
                    target:     row.get(2)?,
                    scores:     [row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?],
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ControlRow::validate).collect()
    }

    /// Explicit mappings; rows naming an unknown standard code are skipped.
    pub fn category_mappings(&self, organization_id: &str) -> EngineResult<Vec<CategoryMapping>> {
        let mut stmt = self.conn.prepare(
            "SELECT organization_id, internal_category, standard_code
             FROM category_mapping WHERE organization_id = ?1
             ORDER BY internal_category ASC",
        )?;
        let rows = stmt
            .query_map(params![organization_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut mappings = Vec::with_capacity(rows.len());
        for (organization_id, internal_category, code) in rows {
            match code.parse::<StandardCategory>() {
                Ok(standard) => mappings.push(CategoryMapping {
                    organization_id,
                    internal_category,
                    standard,
                }),
                Err(e) => log::warn!(
                    "store: mapping '{internal_category}' for {organization_id} skipped: {e}"
                ),
            }
        }
        Ok(mappings)
    }
}
