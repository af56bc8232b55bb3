//! Submission compliance: classification, frozen timing, stats and rate.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use grc_analytics_core::{
    compliance_tracker::{
        ComplianceClass, ComplianceTracker, DeadlineStatus, OrganizationStatus,
        OrganizationSubmissions, SubmissionData,
    },
    config::ComplianceConfig,
    model::{validate_transition, Organization, Submission, SubmissionDeadline, SubmissionStatus},
    types::Period,
};

fn q1() -> Period {
    "Q1 2026".parse().unwrap()
}

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// 30 April 2026 plus five days of grace: effective 5 May 2026 00:00 UTC.
fn deadline() -> SubmissionDeadline {
    SubmissionDeadline::new(
        "reg-1".into(),
        q1(),
        NaiveDate::from_ymd_opt(2026, 4, 30).unwrap(),
        5,
        None,
    )
    .unwrap()
}

fn orgs(n: usize) -> Vec<Organization> {
    (0..n)
        .map(|i| Organization {
            organization_id:  format!("org-{i:02}"),
            name:             format!("Firm {i:02}"),
            institution_type: "bank".into(),
        })
        .collect()
}

fn submission(
    id:           &str,
    org_id:       &str,
    status:       SubmissionStatus,
    created_at:   DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
) -> Submission {
    Submission {
        submission_id:   id.into(),
        organization_id: org_id.into(),
        period:          q1(),
        status,
        created_at,
        submitted_at,
        reviewed_at:     None,
    }
}

fn tracker() -> ComplianceTracker {
    ComplianceTracker::new(ComplianceConfig::default())
}

#[test]
fn seven_of_ten_is_seventy_percent() {
    let orgs = orgs(10);
    let mut subs = Vec::new();
    for i in 0..6 {
        subs.push(submission(
            &format!("s-{i}"),
            &format!("org-{i:02}"),
            SubmissionStatus::Submitted,
            at(2026, 4, 1, 9),
            Some(at(2026, 4, 20, 9)),
        ));
    }
    subs.push(submission(
        "s-6",
        "org-06",
        SubmissionStatus::Approved,
        at(2026, 4, 1, 9),
        Some(at(2026, 4, 10, 9)),
    ));

    let report = tracker().track_submissions(q1(), Some(&deadline()), &orgs, &subs, at(2026, 4, 25, 0));
    let stats = &report.stats;

    assert_eq!(stats.total_orgs, 10);
    assert_eq!(stats.submitted, 7);
    assert_eq!(stats.approved, 1);
    assert_eq!(stats.pending_review, 6);
    assert_eq!(stats.not_submitted, 3);
    assert_eq!(stats.overdue, 0);
    assert_eq!(stats.compliance_rate, 70.0);
}

#[test]
fn missing_submissions_become_overdue_after_effective_deadline() {
    let orgs = orgs(3);
    let subs = vec![
        submission("s-0", "org-00", SubmissionStatus::Submitted, at(2026, 4, 1, 9), Some(at(2026, 4, 2, 9))),
        submission("s-1", "org-01", SubmissionStatus::Draft, at(2026, 4, 1, 9), None),
    ];

    // Inside the grace window: pending, not overdue.
    let before = tracker().track_submissions(q1(), Some(&deadline()), &orgs, &subs, at(2026, 5, 3, 12));
    assert_eq!(before.deadline_status, DeadlineStatus::DaysRemaining { days: 1 });
    assert_eq!(before.stats.overdue, 0);

    let after = tracker().track_submissions(q1(), Some(&deadline()), &orgs, &subs, at(2026, 5, 8, 0));
    assert_eq!(after.deadline_status, DeadlineStatus::Overdue { days: 3 });
    assert_eq!(after.stats.overdue, 2);

    let classes: Vec<ComplianceClass> = after.organizations.iter().map(|o| o.classification).collect();
    assert_eq!(
        classes,
        vec![ComplianceClass::Compliant, ComplianceClass::Overdue, ComplianceClass::Overdue]
    );
    assert_eq!(after.organizations[1].status, OrganizationStatus::Draft);
    assert_eq!(after.organizations[2].status, OrganizationStatus::NotSubmitted);
}

/// Late is decided at submission time and does not move afterwards.
#[test]
fn timing_is_frozen_at_submission() {
    let orgs = orgs(2);
    let subs = vec![
        // One hour past the effective deadline.
        submission("s-late", "org-00", SubmissionStatus::Submitted, at(2026, 4, 1, 9), Some(at(2026, 5, 5, 1))),
        // Two days early.
        submission("s-early", "org-01", SubmissionStatus::UnderReview, at(2026, 4, 1, 9), Some(at(2026, 5, 3, 0))),
    ];

    for now in [at(2026, 5, 6, 0), at(2026, 9, 1, 0)] {
        let report = tracker().track_submissions(q1(), Some(&deadline()), &orgs, &subs, now);
        assert_eq!(report.organizations[0].submission_timing, Some(DeadlineStatus::Overdue { days: 1 }));
        assert_eq!(
            report.organizations[1].submission_timing,
            Some(DeadlineStatus::DaysRemaining { days: 2 })
        );
        assert_eq!(report.stats.late_submissions, 1);
        // Late but submitted still counts as compliant.
        assert_eq!(report.organizations[0].classification, ComplianceClass::Compliant);
    }
}

#[test]
fn submission_on_effective_date_midnight_is_due_today() {
    let orgs = orgs(1);
    let subs = vec![submission(
        "s-0",
        "org-00",
        SubmissionStatus::Submitted,
        at(2026, 4, 1, 9),
        Some(at(2026, 5, 5, 0)),
    )];
    let report = tracker().track_submissions(q1(), Some(&deadline()), &orgs, &subs, at(2026, 6, 1, 0));
    assert_eq!(report.organizations[0].submission_timing, Some(DeadlineStatus::DueToday));
    assert_eq!(report.stats.late_submissions, 0);
}

#[test]
fn no_deadline_means_never_overdue() {
    let report = tracker().track_submissions(q1(), None, &orgs(2), &[], at(2030, 1, 1, 0));
    assert_eq!(report.deadline_status, DeadlineStatus::NoDeadline);
    assert_eq!(report.effective_deadline, None);
    assert_eq!(report.stats.overdue, 0);
    assert!(report
        .organizations
        .iter()
        .all(|o| o.classification == ComplianceClass::Pending));
}

#[test]
fn deadline_for_another_period_is_ignored() {
    let q2_deadline = SubmissionDeadline::new(
        "reg-1".into(),
        q1().next(),
        NaiveDate::from_ymd_opt(2026, 7, 31).unwrap(),
        0,
        None,
    )
    .unwrap();
    let report = tracker().track_submissions(q1(), Some(&q2_deadline), &orgs(1), &[], at(2027, 1, 1, 0));
    assert_eq!(report.deadline_status, DeadlineStatus::NoDeadline);
}

#[test]
fn revision_requested_is_not_compliant() {
    let orgs = orgs(2);
    let subs = vec![
        submission("s-0", "org-00", SubmissionStatus::RevisionRequested, at(2026, 4, 1, 9), Some(at(2026, 4, 2, 9))),
        submission("s-1", "org-01", SubmissionStatus::Approved, at(2026, 4, 1, 9), Some(at(2026, 4, 2, 9))),
    ];
    let report = tracker().track_submissions(q1(), Some(&deadline()), &orgs, &subs, at(2026, 4, 20, 0));
    assert_eq!(report.stats.revision_requested, 1);
    assert_eq!(report.stats.submitted, 1);
    assert_eq!(report.stats.compliance_rate, 50.0);
    assert_eq!(report.organizations[0].classification, ComplianceClass::Pending);
}

#[test]
fn latest_created_submission_represents_the_organization() {
    let orgs = orgs(1);
    let subs = vec![
        submission("s-old", "org-00", SubmissionStatus::Approved, at(2026, 4, 1, 9), Some(at(2026, 4, 2, 9))),
        submission("s-new", "org-00", SubmissionStatus::Draft, at(2026, 4, 10, 9), None),
    ];
    let report = tracker().track_submissions(q1(), Some(&deadline()), &orgs, &subs, at(2026, 4, 20, 0));
    let row = &report.organizations[0];
    assert_eq!(row.submission_id.as_deref(), Some("s-new"));
    assert_eq!(row.status, OrganizationStatus::Draft);
    assert_eq!(row.submitted_at, None);
    assert_eq!(report.stats.draft, 1);
}

#[test]
fn fetch_failure_is_unknown_and_counts_in_denominator() {
    let [a, b]: [Organization; 2] = orgs(2).try_into().unwrap();
    let inputs = vec![
        OrganizationSubmissions {
            organization: a,
            data: SubmissionData::Loaded {
                submissions: vec![submission(
                    "s-0",
                    "org-00",
                    SubmissionStatus::Submitted,
                    at(2026, 4, 1, 9),
                    Some(at(2026, 4, 2, 9)),
                )],
            },
        },
        OrganizationSubmissions {
            organization: b,
            data: SubmissionData::Failed { reason: "database is locked".into() },
        },
    ];
    let report = tracker().track(q1(), Some(&deadline()), &inputs, at(2026, 6, 1, 0));

    assert_eq!(report.stats.total_orgs, 2);
    assert_eq!(report.stats.fetch_failed, 1);
    assert_eq!(report.stats.compliance_rate, 50.0);
    assert_eq!(report.stats.overdue, 0);
    let failed = &report.organizations[1];
    assert_eq!(failed.status, OrganizationStatus::FetchFailed);
    assert_eq!(failed.classification, ComplianceClass::Unknown);
    assert_eq!(failed.fetch_error.as_deref(), Some("database is locked"));
}

#[test]
fn empty_population_has_zero_rate() {
    let report = tracker().track_submissions(q1(), Some(&deadline()), &[], &[], at(2026, 4, 1, 0));
    assert_eq!(report.stats.total_orgs, 0);
    assert_eq!(report.stats.compliance_rate, 0.0);
}

#[test]
fn rate_rounds_to_one_decimal() {
    let orgs = orgs(3);
    let subs: Vec<Submission> = (0..2)
        .map(|i| {
            submission(
                &format!("s-{i}"),
                &format!("org-{i:02}"),
                SubmissionStatus::Submitted,
                at(2026, 4, 1, 9),
                Some(at(2026, 4, 2, 9)),
            )
        })
        .collect();
    let report = tracker().track_submissions(q1(), None, &orgs, &subs, at(2026, 4, 5, 0));
    assert_eq!(report.stats.compliance_rate, 66.7);
}

#[test]
fn workflow_transitions() {
    use SubmissionStatus::*;
    assert!(validate_transition(Draft, Submitted).is_ok());
    assert!(validate_transition(Submitted, UnderReview).is_ok());
    assert!(validate_transition(UnderReview, Approved).is_ok());
    assert!(validate_transition(UnderReview, RevisionRequested).is_ok());
    assert!(validate_transition(RevisionRequested, Submitted).is_ok());

    assert!(validate_transition(Draft, Approved).is_err());
    assert!(validate_transition(Approved, Submitted).is_err());
    assert!(validate_transition(Submitted, Draft).is_err());
}

#[test]
fn negative_grace_period_rejected() {
    let err = SubmissionDeadline::new(
        "reg-1".into(),
        q1(),
        NaiveDate::from_ymd_opt(2026, 4, 30).unwrap(),
        -1,
        None,
    );
    assert!(err.is_err());
}
