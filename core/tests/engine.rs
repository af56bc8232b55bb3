//! End-to-end: seeded SQLite snapshot through the async engine.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use grc_analytics_core::{
    compliance_tracker::{ComplianceClass, OrganizationStatus},
    config::EngineConfig,
    engine::AnalyticsEngine,
    error::{EngineError, EngineResult},
    fetch::{PortfolioSource, SqliteSource},
    model::{
        CategoryMapping, Control, ControlTarget, DimeScore, Organization, Rating, Regulator, Risk,
        RiskStatus, StandardCategory, Submission, SubmissionDeadline, SubmissionStatus,
    },
    outlier_detector::OutlierDirection,
    sector_aggregator::DataStatus,
    store::AnalyticsStore,
    types::Period,
};
use std::time::Duration;

fn q1() -> Period {
    Period::new(1, 2026).unwrap()
}

fn at(m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, m, d, 12, 0, 0).unwrap()
}

/// Five firms under FSC. The returned store must stay alive for the
/// shared in-memory database to persist.
fn seed(name: &str) -> (AnalyticsStore, String) {
    let _ = env_logger::builder().is_test(true).try_init();
    let uri = format!("file:{name}?mode=memory&cache=shared");
    let store = AnalyticsStore::open(&uri).expect("open shared store");
    store.migrate().expect("migration");

    store
        .insert_regulator(&Regulator {
            regulator_id: "reg-1".into(),
            code:         "FSC".into(),
            name:         "Financial Services Commission".into(),
        })
        .unwrap();

    // (id, name, cyber likelihood, cyber impact)
    let firms = [
        ("org-a", "Alpha Bank", 1, 5),
        ("org-b", "Beta Bank", 1, 5),
        ("org-c", "Gamma Credit", 1, 5),
        ("org-d", "Delta Trust", 1, 5),
        ("org-e", "Epsilon Capital", 4, 5),
    ];
    for (id, name, l, i) in firms {
        store
            .insert_organization(&Organization {
                organization_id:  id.into(),
                name:             name.into(),
                institution_type: "bank".into(),
            })
            .unwrap();
        store.assign_organization("reg-1", id).unwrap();
        store
            .insert_risk(&Risk {
                risk_id:         format!("{id}-cyber"),
                organization_id: id.into(),
                category:        "Cyber".into(),
                likelihood:      Rating::new(l).unwrap(),
                impact:          Rating::new(i).unwrap(),
                status:          RiskStatus::Open,
            })
            .unwrap();
    }

    // Alpha maps its own label and carries a closed risk.
    store
        .insert_category_mapping(&CategoryMapping {
            organization_id:   "org-a".into(),
            internal_category: "Pillar 2".into(),
            standard:          StandardCategory::Financial,
        })
        .unwrap();
    store
        .insert_risk(&Risk {
            risk_id:         "org-a-p2".into(),
            organization_id: "org-a".into(),
            category:        "Pillar 2".into(),
            likelihood:      Rating::new(3).unwrap(),
            impact:          Rating::new(3).unwrap(),
            status:          RiskStatus::Open,
        })
        .unwrap();
    store
        .insert_risk(&Risk {
            risk_id:         "org-a-old".into(),
            organization_id: "org-a".into(),
            category:        "Legacy".into(),
            likelihood:      Rating::new(5).unwrap(),
            impact:          Rating::new(5).unwrap(),
            status:          RiskStatus::Closed,
        })
        .unwrap();
    store
        .insert_control(&Control {
            control_id: "ctl-1".into(),
            risk_id:    "org-a-p2".into(),
            target:     ControlTarget::Likelihood,
            dime:       DimeScore::attested(3, 3, 3, 3).unwrap(),
        })
        .unwrap();

    store
        .insert_submission_deadline(
            &SubmissionDeadline::new(
                "reg-1".into(),
                q1(),
                NaiveDate::from_ymd_opt(2026, 4, 30).unwrap(),
                5,
                None,
            )
            .unwrap(),
        )
        .unwrap();

    let submitted = [
        ("org-a", SubmissionStatus::Approved, Some(at(4, 10))),
        ("org-b", SubmissionStatus::Submitted, Some(at(5, 6))),
        ("org-c", SubmissionStatus::Draft, None),
    ];
    for (org, status, submitted_at) in submitted {
        store
            .insert_submission(&Submission {
                submission_id:   format!("{org}-q1"),
                organization_id: org.into(),
                period:          q1(),
                status,
                created_at:      at(4, 1),
                submitted_at,
                reviewed_at:     None,
            })
            .unwrap();
    }

    (store, uri)
}

fn engine(uri: &str) -> AnalyticsEngine<SqliteSource> {
    AnalyticsEngine::new(EngineConfig::default(), SqliteSource::new(uri)).unwrap()
}

#[tokio::test]
async fn regulator_report_end_to_end() {
    let (_keep, uri) = seed("engine_report");
    let report = engine(&uri).regulator_report("FSC", q1(), at(5, 20)).await.unwrap();

    let sector = &report.sector;
    assert_eq!(sector.rows.len(), 5);
    assert_eq!(sector.total_risks, 6, "closed risk excluded");
    assert_eq!(sector.heatmap.total(), 6);
    assert!(sector.failed_organizations.is_empty());

    let alpha = &sector.rows[0];
    assert_eq!(alpha.organization_id, "org-a");
    assert_eq!(alpha.cell(StandardCategory::Financial).avg_rating, Some(9.0));
    assert!(alpha.unmapped_categories.is_empty());

    assert_eq!(report.outliers.records.len(), 1);
    let outlier = &report.outliers.records[0];
    assert_eq!(outlier.organization_id, "org-e");
    assert_eq!(outlier.direction, OutlierDirection::Above);

    let compliance = &report.compliance;
    assert_eq!(compliance.stats.total_orgs, 5);
    assert_eq!(compliance.stats.submitted, 2);
    assert_eq!(compliance.stats.compliance_rate, 40.0);
    assert_eq!(compliance.stats.overdue, 3);
    assert_eq!(compliance.stats.late_submissions, 1);
}

#[tokio::test]
async fn unknown_regulator_is_an_error() {
    let (_keep, uri) = seed("engine_unknown_reg");
    let err = engine(&uri).regulator_report("NOPE", q1(), at(5, 20)).await.unwrap_err();
    assert!(matches!(err, EngineError::RegulatorNotFound(code) if code == "NOPE"));
}

#[tokio::test]
async fn period_without_deadline_has_no_overdue() {
    let (_keep, uri) = seed("engine_no_deadline");
    let engine = engine(&uri);
    let regulator = engine.regulator("FSC").await.unwrap();
    let report = engine.compliance(&regulator, q1().next(), at(12, 31)).await.unwrap();

    assert_eq!(report.stats.overdue, 0);
    assert_eq!(report.stats.not_submitted, 5);
    assert!(report
        .organizations
        .iter()
        .all(|o| o.classification == ComplianceClass::Pending));
}

#[tokio::test]
async fn register_assessment_applies_controls() {
    let (_keep, uri) = seed("engine_register");
    let assessments = engine(&uri).assess_register("org-a").await.unwrap();

    assert_eq!(assessments.len(), 2, "closed risk excluded");
    let pillar = assessments.iter().find(|a| a.risk_id == "org-a-p2").unwrap();
    assert_eq!(pillar.inherent_score, 9);
    assert_eq!(pillar.residual.residual_likelihood, 1);
    assert_eq!(pillar.residual.residual_score, 3);
}

/// Delegates to SQLite except for one organization, which always fails.
struct FlakySource {
    inner:   SqliteSource,
    failing: &'static str,
}

impl FlakySource {
    fn check(&self, organization_id: &str) -> EngineResult<()> {
        if organization_id == self.failing {
            return Err(EngineError::Other(anyhow::anyhow!("connection reset")));
        }
        Ok(())
    }
}

impl PortfolioSource for FlakySource {
    fn regulator_by_code(&self, code: &str) -> EngineResult<Option<Regulator>> {
        self.inner.regulator_by_code(code)
    }
    fn assigned_organizations(&self, regulator_id: &str) -> EngineResult<Vec<Organization>> {
        self.inner.assigned_organizations(regulator_id)
    }
    fn organization_risks(&self, organization_id: &str) -> EngineResult<Vec<Risk>> {
        self.check(organization_id)?;
        self.inner.organization_risks(organization_id)
    }
    fn category_mappings(&self, organization_id: &str) -> EngineResult<Vec<CategoryMapping>> {
        self.inner.category_mappings(organization_id)
    }
    fn controls_for_risk(&self, risk_id: &str) -> EngineResult<Vec<Control>> {
        self.inner.controls_for_risk(risk_id)
    }
    fn submissions(&self, organization_id: &str, period: Period) -> EngineResult<Vec<Submission>> {
        self.check(organization_id)?;
        self.inner.submissions(organization_id, period)
    }
    fn submission_deadline(
        &self,
        regulator_id: &str,
        period:       Period,
    ) -> EngineResult<Option<SubmissionDeadline>> {
        self.inner.submission_deadline(regulator_id, period)
    }
}

#[tokio::test]
async fn one_failing_organization_does_not_sink_the_report() {
    let (_keep, uri) = seed("engine_partial_failure");
    let source = FlakySource { inner: SqliteSource::new(uri.as_str()), failing: "org-e" };
    let engine = AnalyticsEngine::new(EngineConfig::default(), source).unwrap();
    let report = engine.regulator_report("FSC", q1(), at(5, 20)).await.unwrap();

    assert_eq!(report.sector.rows.len(), 5);
    assert_eq!(report.sector.failed_organizations, vec!["org-e".to_string()]);
    let epsilon = report.sector.rows.iter().find(|r| r.organization_id == "org-e").unwrap();
    assert!(matches!(&epsilon.data_status, DataStatus::FetchFailed { reason } if reason.contains("connection reset")));
    // Without Epsilon every cyber rating is 5: no variance, no outliers.
    assert!(report.outliers.records.is_empty());

    let failed = report
        .compliance
        .organizations
        .iter()
        .find(|o| o.organization_id == "org-e")
        .unwrap();
    assert_eq!(failed.status, OrganizationStatus::FetchFailed);
    assert_eq!(failed.classification, ComplianceClass::Unknown);
    assert_eq!(report.compliance.stats.total_orgs, 5);
}

/// Blocks past the fetch timeout for one organization.
struct SlowSource {
    inner: SqliteSource,
}

impl PortfolioSource for SlowSource {
    fn regulator_by_code(&self, code: &str) -> EngineResult<Option<Regulator>> {
        self.inner.regulator_by_code(code)
    }
    fn assigned_organizations(&self, regulator_id: &str) -> EngineResult<Vec<Organization>> {
        self.inner.assigned_organizations(regulator_id)
    }
    fn organization_risks(&self, organization_id: &str) -> EngineResult<Vec<Risk>> {
        if organization_id == "org-b" {
            std::thread::sleep(Duration::from_millis(1_000));
        }
        self.inner.organization_risks(organization_id)
    }
    fn category_mappings(&self, organization_id: &str) -> EngineResult<Vec<CategoryMapping>> {
        self.inner.category_mappings(organization_id)
    }
    fn controls_for_risk(&self, risk_id: &str) -> EngineResult<Vec<Control>> {
        self.inner.controls_for_risk(risk_id)
    }
    fn submissions(&self, organization_id: &str, period: Period) -> EngineResult<Vec<Submission>> {
        self.inner.submissions(organization_id, period)
    }
    fn submission_deadline(
        &self,
        regulator_id: &str,
        period:       Period,
    ) -> EngineResult<Option<SubmissionDeadline>> {
        self.inner.submission_deadline(regulator_id, period)
    }
}

#[tokio::test]
async fn slow_organization_times_out_and_is_flagged() {
    let (_keep, uri) = seed("engine_timeout");
    let mut config = EngineConfig::default();
    config.fetch.timeout_ms = 200;
    let engine = AnalyticsEngine::new(config, SlowSource { inner: SqliteSource::new(uri.as_str()) }).unwrap();

    let regulator = engine.regulator("FSC").await.unwrap();
    let snapshot = engine.sector_snapshot(&regulator).await.unwrap();

    assert_eq!(snapshot.failed_organizations, vec!["org-b".to_string()]);
    assert_eq!(snapshot.rows.len(), 5);
}
