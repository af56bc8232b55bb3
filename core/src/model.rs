//! Validated record types read from the snapshot.
//!
//! RULE: ranges are enforced here, in constructors, and nowhere else.
//! The computation modules take these types and assume they are valid.

use crate::{
    error::{EngineError, EngineResult},
    types::{EntityId, Period},
};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── Standard categories ──────────────────────────────────────────────────────

/// The five regulator-defined categories used for cross-firm comparison.
/// Declaration order is the canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StandardCategory {
    #[serde(rename = "STR")]
    Strategic,
    #[serde(rename = "OPS")]
    Operational,
    #[serde(rename = "FIN")]
    Financial,
    #[serde(rename = "CMP")]
    Compliance,
    #[serde(rename = "REP")]
    Reputational,
}

impl StandardCategory {
    pub const ALL: [StandardCategory; 5] = [
        StandardCategory::Strategic,
        StandardCategory::Operational,
        StandardCategory::Financial,
        StandardCategory::Compliance,
        StandardCategory::Reputational,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            StandardCategory::Strategic    => "STR",
            StandardCategory::Operational  => "OPS",
            StandardCategory::Financial    => "FIN",
            StandardCategory::Compliance   => "CMP",
            StandardCategory::Reputational => "REP",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StandardCategory::Strategic    => "Strategic",
            StandardCategory::Operational  => "Operational",
            StandardCategory::Financial    => "Financial",
            StandardCategory::Compliance   => "Compliance & Legal",
            StandardCategory::Reputational => "Reputational",
        }
    }

    /// Position in `ALL`; used to index fixed-size per-category arrays.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for StandardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for StandardCategory {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        StandardCategory::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::UnknownVariant {
                kind:  "standard category",
                value: s.to_string(),
            })
    }
}

// ── Ratings and scores ───────────────────────────────────────────────────────

/// Inherent likelihood or impact, 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> EngineResult<Self> {
        if !(Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            return Err(EngineError::OutOfRange {
                field:    "rating",
                value,
                expected: "1..=5",
            });
        }
        Ok(Self(value as u8))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Rating {
    type Error = EngineError;
    fn try_from(v: i64) -> EngineResult<Self> { Self::new(v) }
}

impl From<Rating> for u8 {
    fn from(r: Rating) -> Self { r.0 }
}

/// The four DIME sub-scores of one control, each 0..=3 or unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawDimeScore")]
pub struct DimeScore {
    design:         Option<u8>,
    implementation: Option<u8>,
    monitoring:     Option<u8>,
    evaluation:     Option<u8>,
}

impl DimeScore {
    pub const MAX_SUB_SCORE: u8 = 3;

    pub fn new(
        design:         Option<i64>,
        implementation: Option<i64>,
        monitoring:     Option<i64>,
        evaluation:     Option<i64>,
    ) -> EngineResult<Self> {
        Ok(Self {
            design:         sub_score("design_score", design)?,
            implementation: sub_score("implementation_score", implementation)?,
            monitoring:     sub_score("monitoring_score", monitoring)?,
            evaluation:     sub_score("evaluation_score", evaluation)?,
        })
    }

    /// All four sub-scores present.
    pub fn attested(d: u8, i: u8, m: u8, e: u8) -> EngineResult<Self> {
        Self::new(Some(d.into()), Some(i.into()), Some(m.into()), Some(e.into()))
    }

    pub fn design(&self) -> Option<u8>         { self.design }
    pub fn implementation(&self) -> Option<u8> { self.implementation }
    pub fn monitoring(&self) -> Option<u8>     { self.monitoring }
    pub fn evaluation(&self) -> Option<u8>     { self.evaluation }
}

#[derive(Deserialize)]
struct RawDimeScore {
    design:         Option<i64>,
    implementation: Option<i64>,
    monitoring:     Option<i64>,
    evaluation:     Option<i64>,
}

impl TryFrom<RawDimeScore> for DimeScore {
    type Error = EngineError;

    fn try_from(raw: RawDimeScore) -> EngineResult<Self> {
        Self::new(raw.design, raw.implementation, raw.monitoring, raw.evaluation)
    }
}

fn sub_score(field: &'static str, value: Option<i64>) -> EngineResult<Option<u8>> {
    match value {
        None => Ok(None),
        Some(v) if (0..=DimeScore::MAX_SUB_SCORE as i64).contains(&v) => Ok(Some(v as u8)),
        Some(v) => Err(EngineError::OutOfRange { field, value: v, expected: "0..=3" }),
    }
}

// ── Risks and controls ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskStatus {
    Open,
    InProgress,
    Mitigated,
    Accepted,
    Closed,
}

impl RiskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskStatus::Open       => "open",
            RiskStatus::InProgress => "in_progress",
            RiskStatus::Mitigated  => "mitigated",
            RiskStatus::Accepted   => "accepted",
            RiskStatus::Closed     => "closed",
        }
    }

    /// Everything except `Closed` still sits on the firm's register.
    pub fn is_open(&self) -> bool {
        !matches!(self, RiskStatus::Closed)
    }
}

impl FromStr for RiskStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s.trim().to_ascii_lowercase().replace(' ', "_").as_str() {
            "open"        => Ok(RiskStatus::Open),
            "in_progress" => Ok(RiskStatus::InProgress),
            "mitigated"   => Ok(RiskStatus::Mitigated),
            "accepted"    => Ok(RiskStatus::Accepted),
            "closed"      => Ok(RiskStatus::Closed),
            _ => Err(EngineError::UnknownVariant { kind: "risk status", value: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub risk_id:         EntityId,
    pub organization_id: EntityId,
    /// Free-text category as entered by the firm.
    pub category:        String,
    pub likelihood:      Rating,
    pub impact:          Rating,
    pub status:          RiskStatus,
}

impl Risk {
    pub fn inherent_score(&self) -> u8 {
        self.likelihood.value() * self.impact.value()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlTarget {
    Likelihood,
    Impact,
    /// Any target text other than the two dimensions; ignored by aggregation.
    Unassigned,
}

impl ControlTarget {
    /// Lenient parse: unknown text becomes `Unassigned` rather than an error.
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "likelihood" => ControlTarget::Likelihood,
            "impact"     => ControlTarget::Impact,
            _            => ControlTarget::Unassigned,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Control {
    pub control_id: EntityId,
    pub risk_id:    EntityId,
    pub target:     ControlTarget,
    pub dime:       DimeScore,
}

// ── Organizations and regulators ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub organization_id:  EntityId,
    pub name:             String,
    pub institution_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Regulator {
    pub regulator_id: EntityId,
    pub code:         String,
    pub name:         String,
}

/// Organization-scoped mapping from an internal category name to a standard one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub organization_id:   EntityId,
    pub internal_category: String,
    pub standard:          StandardCategory,
}

// ── Submissions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    RevisionRequested,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Draft             => "draft",
            SubmissionStatus::Submitted         => "submitted",
            SubmissionStatus::UnderReview       => "under_review",
            SubmissionStatus::Approved          => "approved",
            SubmissionStatus::RevisionRequested => "revision_requested",
        }
    }

    /// Statuses that count toward the compliance rate.
    pub fn is_compliant(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::Submitted | SubmissionStatus::UnderReview | SubmissionStatus::Approved
        )
    }

    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        matches!(
            (self, next),
            (Draft, Submitted)
                | (Submitted, UnderReview)
                | (UnderReview, Approved)
                | (UnderReview, RevisionRequested)
                | (RevisionRequested, Submitted)
        )
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s.trim() {
            "draft"              => Ok(SubmissionStatus::Draft),
            "submitted"          => Ok(SubmissionStatus::Submitted),
            "under_review"       => Ok(SubmissionStatus::UnderReview),
            "approved"           => Ok(SubmissionStatus::Approved),
            "revision_requested" => Ok(SubmissionStatus::RevisionRequested),
            _ => Err(EngineError::UnknownVariant { kind: "submission status", value: s.to_string() }),
        }
    }
}

/// Reject a lifecycle change the workflow does not allow.
pub fn validate_transition(from: SubmissionStatus, to: SubmissionStatus) -> EngineResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(EngineError::IllegalTransition { from, to })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub submission_id:   EntityId,
    pub organization_id: EntityId,
    pub period:          Period,
    pub status:          SubmissionStatus,
    pub created_at:      DateTime<Utc>,
    pub submitted_at:    Option<DateTime<Utc>>,
    pub reviewed_at:     Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionDeadline {
    pub regulator_id:      EntityId,
    pub period:            Period,
    pub deadline_date:     NaiveDate,
    pub grace_period_days: u32,
    pub notes:             Option<String>,
}

impl SubmissionDeadline {
    pub fn new(
        regulator_id:      EntityId,
        period:            Period,
        deadline_date:     NaiveDate,
        grace_period_days: i64,
        notes:             Option<String>,
    ) -> EngineResult<Self> {
        let grace_period_days = u32::try_from(grace_period_days).map_err(|_| {
            EngineError::OutOfRange {
                field:    "grace_period_days",
                value:    grace_period_days,
                expected: ">= 0",
            }
        })?;
        Ok(Self { regulator_id, period, deadline_date, grace_period_days, notes })
    }

    /// 00:00 UTC on `deadline_date + grace_period_days`.
    pub fn effective_deadline(&self) -> DateTime<Utc> {
        let date = self
            .deadline_date
            .checked_add_days(Days::new(self.grace_period_days.into()))
            .unwrap_or(NaiveDate::MAX);
        date.and_time(NaiveTime::MIN).and_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        assert_eq!(Rating::new(5).unwrap().value(), 5);
    }

    #[test]
    fn dime_sub_scores_capped_at_three() {
        assert!(DimeScore::new(Some(4), Some(1), None, None).is_err());
        assert!(DimeScore::new(Some(-1), Some(1), None, None).is_err());
        assert!(DimeScore::new(None, None, None, None).is_ok());
    }

    #[test]
    fn grace_days_extend_the_deadline() {
        let d = SubmissionDeadline::new(
            "reg-1".into(),
            "Q1 2026".parse().unwrap(),
            NaiveDate::from_ymd_opt(2026, 4, 30).unwrap(),
            5,
            None,
        )
        .unwrap();
        assert_eq!(d.effective_deadline().to_rfc3339(), "2026-05-05T00:00:00+00:00");
        assert!(SubmissionDeadline::new(
            "reg-1".into(),
            "Q1 2026".parse().unwrap(),
            NaiveDate::from_ymd_opt(2026, 4, 30).unwrap(),
            -1,
            None,
        )
        .is_err());
    }
}
