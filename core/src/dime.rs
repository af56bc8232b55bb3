//! DIME control effectiveness.
//!
//! Design and Implementation gate everything: either one scored zero makes
//! the control worthless, either one unset means the control is not attested.
//! Monitoring and Evaluation count as zero when unset.

use crate::model::DimeScore;

/// Sum of four sub-scores at their maximum.
pub const DIME_MAX_TOTAL: f64 = 12.0;

/// Effectiveness as a fraction in `[0, 1]`, or `None` when not attested.
pub fn effectiveness(score: &DimeScore) -> Option<f64> {
    if score.design() == Some(0) || score.implementation() == Some(0) {
        return Some(0.0);
    }
    let design = score.design()?;
    let implementation = score.implementation()?;
    let total = design
        + implementation
        + score.monitoring().unwrap_or(0)
        + score.evaluation().unwrap_or(0);
    Some(f64::from(total) / DIME_MAX_TOTAL)
}

/// Effectiveness rounded to a whole percentage, for display.
pub fn effectiveness_percent(score: &DimeScore) -> Option<u8> {
    effectiveness(score).map(|e| (e * 100.0).round() as u8)
}
