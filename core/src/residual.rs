//! Residual risk aggregation.
//!
//! Controls are split by the dimension they target. Only the single most
//! effective control per dimension reduces that dimension; overlapping
//! controls are not combined. Neither dimension can drop below 1.

use crate::{
    config::SeverityBands,
    dime,
    model::{Control, ControlTarget, Rating, Risk},
    severity::Severity,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidualRisk {
    pub residual_likelihood: u8,
    pub residual_impact:     u8,
    pub residual_score:      u8,
}

/// Inherent and residual view of one risk with the controls it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_id:                  String,
    pub inherent_score:           u8,
    pub inherent_severity:        Severity,
    pub likelihood_effectiveness: f64,
    pub impact_effectiveness:     f64,
    pub residual:                 ResidualRisk,
    pub residual_severity:        Severity,
}

/// Highest effectiveness among controls aimed at `target`; 0 when none.
/// Unattested controls count as 0.
pub fn max_effectiveness(controls: &[Control], target: ControlTarget) -> f64 {
    controls
        .iter()
        .filter(|c| c.target == target)
        .map(|c| dime::effectiveness(&c.dime).unwrap_or(0.0))
        .fold(0.0, f64::max)
}

fn reduce(inherent: u8, effectiveness: f64) -> u8 {
    let reduction = (f64::from(inherent - 1) * effectiveness).round() as u8;
    inherent.saturating_sub(reduction).max(1)
}

/// Residual likelihood, impact and score for an arbitrary in-memory control list.
/// Controls targeting neither dimension are ignored.
pub fn residual_risk(likelihood: Rating, impact: Rating, controls: &[Control]) -> ResidualRisk {
    let residual_likelihood = reduce(
        likelihood.value(),
        max_effectiveness(controls, ControlTarget::Likelihood),
    );
    let residual_impact = reduce(impact.value(), max_effectiveness(controls, ControlTarget::Impact));
    ResidualRisk {
        residual_likelihood,
        residual_impact,
        residual_score: residual_likelihood * residual_impact,
    }
}

/// Full assessment of one risk; `controls` may include unsaved ones.
pub fn assess_risk(risk: &Risk, controls: &[Control], bands: &SeverityBands) -> RiskAssessment {
    let residual = residual_risk(risk.likelihood, risk.impact, controls);
    let inherent_score = risk.inherent_score();
    RiskAssessment {
        risk_id: risk.risk_id.clone(),
        inherent_score,
        inherent_severity: bands.classify(f64::from(inherent_score)),
        likelihood_effectiveness: max_effectiveness(controls, ControlTarget::Likelihood),
        impact_effectiveness: max_effectiveness(controls, ControlTarget::Impact),
        residual,
        residual_severity: bands.classify(f64::from(residual.residual_score)),
    }
}
