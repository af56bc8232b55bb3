//! Quarterly submission compliance against a regulator deadline.
//!
//! This module:
//!   1. Picks each assigned organization's current submission for the period
//!   2. Classifies it compliant, pending or overdue against the deadline
//!   3. Freezes early/late timing at the moment of submission
//!   4. Computes aggregate stats and the compliance rate
//!
//! Effective deadline = deadline date + grace period days (00:00 UTC).
//! days_relative = ceil((t - effective deadline) / 1 day):
//!   negative = days remaining, zero = due today, positive = days overdue.
//!
//! A period with no deadline configured reports `NoDeadline`; it never
//! falls back to an implied date, and nothing is ever overdue against it.

use crate::{
    config::{ComplianceConfig, MAX_RATE_PRECISION},
    model::{Organization, Submission, SubmissionDeadline, SubmissionStatus},
    types::{EntityId, Period},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MILLIS_PER_DAY: i64 = 86_400_000;

// ── Deadline arithmetic ──────────────────────────────────────────────────────

/// Whole days from the effective deadline to `at`, rounded up.
pub fn days_relative(effective_deadline: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    let millis = (at - effective_deadline).num_milliseconds();
    // ceil(millis / day) for a positive divisor
    -((-millis).div_euclid(MILLIS_PER_DAY))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeadlineStatus {
    NoDeadline,
    DaysRemaining { days: i64 },
    DueToday,
    Overdue { days: i64 },
}

impl DeadlineStatus {
    pub fn at(deadline: Option<&SubmissionDeadline>, at: DateTime<Utc>) -> Self {
        match deadline {
            None => DeadlineStatus::NoDeadline,
            Some(d) => Self::from_days_relative(days_relative(d.effective_deadline(), at)),
        }
    }

    pub fn from_days_relative(days: i64) -> Self {
        match days {
            d if d < 0 => DeadlineStatus::DaysRemaining { days: -d },
            0 => DeadlineStatus::DueToday,
            d => DeadlineStatus::Overdue { days: d },
        }
    }

    pub fn is_overdue(&self) -> bool {
        matches!(self, DeadlineStatus::Overdue { .. })
    }
}

// ── Input ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubmissionData {
    Loaded { submissions: Vec<Submission> },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationSubmissions {
    pub organization: Organization,
    pub data:         SubmissionData,
}

// ── Output ───────────────────────────────────────────────────────────────────

/// Per-organization status. `NotSubmitted` is never conflated with `Draft`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationStatus {
    NotSubmitted,
    Draft,
    Submitted,
    UnderReview,
    Approved,
    RevisionRequested,
    FetchFailed,
}

impl From<SubmissionStatus> for OrganizationStatus {
    fn from(s: SubmissionStatus) -> Self {
        match s {
            SubmissionStatus::Draft             => OrganizationStatus::Draft,
            SubmissionStatus::Submitted         => OrganizationStatus::Submitted,
            SubmissionStatus::UnderReview       => OrganizationStatus::UnderReview,
            SubmissionStatus::Approved          => OrganizationStatus::Approved,
            SubmissionStatus::RevisionRequested => OrganizationStatus::RevisionRequested,
        }
    }
}

impl OrganizationStatus {
    pub fn is_compliant(&self) -> bool {
        matches!(
            self,
            OrganizationStatus::Submitted
                | OrganizationStatus::UnderReview
                | OrganizationStatus::Approved
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceClass {
    Compliant,
    Pending,
    Overdue,
    /// Submissions could not be loaded.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationCompliance {
    pub organization_id:   EntityId,
    pub organization_name: String,
    pub status:            OrganizationStatus,
    pub classification:    ComplianceClass,
    pub submission_id:     Option<EntityId>,
    pub submitted_at:      Option<DateTime<Utc>>,
    /// Deadline status evaluated at `submitted_at`; does not move with time.
    pub submission_timing: Option<DeadlineStatus>,
    pub fetch_error:       Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComplianceStats {
    pub total_orgs:         u32,
    /// Organizations counted toward the rate: submitted, under review or approved.
    pub submitted:          u32,
    pub approved:           u32,
    /// Submitted or under review, awaiting a regulator decision.
    pub pending_review:     u32,
    pub overdue:            u32,
    pub compliance_rate:    f64,
    pub not_submitted:      u32,
    pub draft:              u32,
    pub revision_requested: u32,
    pub late_submissions:   u32,
    pub fetch_failed:       u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub period:             Period,
    pub effective_deadline: Option<DateTime<Utc>>,
    /// Relative to the evaluation time.
    pub deadline_status:    DeadlineStatus,
    pub organizations:      Vec<OrganizationCompliance>,
    pub stats:              ComplianceStats,
}

// ── Tracker ──────────────────────────────────────────────────────────────────

fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision.min(MAX_RATE_PRECISION) as i32);
    (value * factor).round() / factor
}

/// The submission that represents the organization for `period`: the most
/// recently created one, ties broken by submission time then id.
fn current_submission<'a>(submissions: &'a [Submission], period: Period) -> Option<&'a Submission> {
    submissions
        .iter()
        .filter(|s| s.period == period)
        .max_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.submitted_at.cmp(&b.submitted_at))
                .then_with(|| a.submission_id.cmp(&b.submission_id))
        })
}

pub struct ComplianceTracker {
    config: ComplianceConfig,
}

impl ComplianceTracker {
    pub fn new(config: ComplianceConfig) -> Self {
        Self { config }
    }

    /// Group a flat submission list by organization, then track.
    /// Submissions from organizations not in `organizations` are ignored.
    pub fn track_submissions(
        &self,
        period:        Period,
        deadline:      Option<&SubmissionDeadline>,
        organizations: &[Organization],
        submissions:   &[Submission],
        now:           DateTime<Utc>,
    ) -> ComplianceReport {
        let mut by_org: HashMap<&str, Vec<Submission>> = organizations
            .iter()
            .map(|o| (o.organization_id.as_str(), Vec::new()))
            .collect();
        for s in submissions {
            match by_org.get_mut(s.organization_id.as_str()) {
                Some(list) => list.push(s.clone()),
                None => log::warn!(
                    "compliance: submission {} from unassigned organization {} ignored",
                    s.submission_id,
                    s.organization_id
                ),
            }
        }

        let inputs: Vec<OrganizationSubmissions> = organizations
            .iter()
            .map(|o| OrganizationSubmissions {
                organization: o.clone(),
                data: SubmissionData::Loaded {
                    submissions: by_org.remove(o.organization_id.as_str()).unwrap_or_default(),
                },
            })
            .collect();

        self.track(period, deadline, &inputs, now)
    }

    pub fn track(
        &self,
        period:        Period,
        deadline:      Option<&SubmissionDeadline>,
        organizations: &[OrganizationSubmissions],
        now:           DateTime<Utc>,
    ) -> ComplianceReport {
        let deadline = deadline.filter(|d| {
            let matches = d.period == period;
            if !matches {
                log::warn!("compliance: deadline for {} ignored while tracking {period}", d.period);
            }
            matches
        });
        let deadline_status = DeadlineStatus::at(deadline, now);

        let mut rows: Vec<OrganizationCompliance> = organizations
            .iter()
            .map(|entry| self.classify(entry, period, deadline, deadline_status))
            .collect();
        rows.sort_by(|a, b| {
            a.organization_name
                .cmp(&b.organization_name)
                .then_with(|| a.organization_id.cmp(&b.organization_id))
        });

        let stats = self.stats(&rows);
        log::debug!(
            "compliance {period}: {}/{} compliant ({}%), overdue={}",
            stats.submitted,
            stats.total_orgs,
            stats.compliance_rate,
            stats.overdue
        );

        ComplianceReport {
            period,
            effective_deadline: deadline.map(SubmissionDeadline::effective_deadline),
            deadline_status,
            organizations: rows,
            stats,
        }
    }

    fn classify(
        &self,
        entry:           &OrganizationSubmissions,
        period:          Period,
        deadline:        Option<&SubmissionDeadline>,
        deadline_status: DeadlineStatus,
    ) -> OrganizationCompliance {
        let org = &entry.organization;
        let mut row = OrganizationCompliance {
            organization_id:   org.organization_id.clone(),
            organization_name: org.name.clone(),
            status:            OrganizationStatus::NotSubmitted,
            classification:    ComplianceClass::Pending,
            submission_id:     None,
            submitted_at:      None,
            submission_timing: None,
            fetch_error:       None,
        };

        let submissions = match &entry.data {
            SubmissionData::Loaded { submissions } => submissions,
            SubmissionData::Failed { reason } => {
                row.status = OrganizationStatus::FetchFailed;
                row.classification = ComplianceClass::Unknown;
                row.fetch_error = Some(reason.clone());
                return row;
            }
        };

        if let Some(current) = current_submission(submissions, period) {
            row.status = current.status.into();
            row.submission_id = Some(current.submission_id.clone());
            if current.status != SubmissionStatus::Draft {
                row.submitted_at = current.submitted_at;
                row.submission_timing = current.submitted_at.map(|at| DeadlineStatus::at(deadline, at));
            }
        }

        row.classification = if row.status.is_compliant() {
            ComplianceClass::Compliant
        } else if deadline_status.is_overdue() {
            ComplianceClass::Overdue
        } else {
            ComplianceClass::Pending
        };
        row
    }

    fn stats(&self, rows: &[OrganizationCompliance]) -> ComplianceStats {
        let count = |pred: &dyn Fn(&OrganizationCompliance) -> bool| {
            rows.iter().filter(|r| pred(r)).count() as u32
        };
        let total_orgs = rows.len() as u32;
        let submitted = count(&|r| r.status.is_compliant());
        let compliance_rate = if total_orgs == 0 {
            0.0
        } else {
            round_to(
                f64::from(submitted) / f64::from(total_orgs) * 100.0,
                self.config.rate_precision,
            )
        };

        ComplianceStats {
            total_orgs,
            submitted,
            approved: count(&|r| r.status == OrganizationStatus::Approved),
            pending_review: count(&|r| {
                matches!(r.status, OrganizationStatus::Submitted | OrganizationStatus::UnderReview)
            }),
            overdue: count(&|r| r.classification == ComplianceClass::Overdue),
            compliance_rate,
            not_submitted: count(&|r| r.status == OrganizationStatus::NotSubmitted),
            draft: count(&|r| r.status == OrganizationStatus::Draft),
            revision_requested: count(&|r| r.status == OrganizationStatus::RevisionRequested),
            late_submissions: count(&|r| r.submission_timing.is_some_and(|t| t.is_overdue())),
            fetch_failed: count(&|r| r.status == OrganizationStatus::FetchFailed),
        }
    }
}
