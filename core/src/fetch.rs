//! Concurrent per-organization fetch.
//!
//! One blocking task per organization, all inside a single `JoinSet`, each
//! bounded by the configured timeout. Results are fanned in on the calling
//! task in input order. A failed, panicked or timed-out organization is
//! recorded as failed; the others are unaffected.
//!
//! Cancellation: dropping the returned future drops the `JoinSet`, which
//! abandons every in-flight fetch. A blocking call already running on the
//! pool still runs to completion; its result is discarded.

use crate::{
    category_resolver::CategoryResolver,
    compliance_tracker::{OrganizationSubmissions, SubmissionData},
    error::{EngineError, EngineResult},
    model::{
        CategoryMapping, Control, Organization, Regulator, Risk, Submission, SubmissionDeadline,
    },
    sector_aggregator::OrganizationPortfolio,
    store::AnalyticsStore,
    types::Period,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Read access to the record store. Implementations block; callers run them
/// on the blocking pool.
pub trait PortfolioSource: Send + Sync + 'static {
    fn regulator_by_code(&self, code: &str) -> EngineResult<Option<Regulator>>;
    fn assigned_organizations(&self, regulator_id: &str) -> EngineResult<Vec<Organization>>;
    fn organization_risks(&self, organization_id: &str) -> EngineResult<Vec<Risk>>;
    fn category_mappings(&self, organization_id: &str) -> EngineResult<Vec<CategoryMapping>>;
    fn controls_for_risk(&self, risk_id: &str) -> EngineResult<Vec<Control>>;
    fn submissions(&self, organization_id: &str, period: Period) -> EngineResult<Vec<Submission>>;
    fn submission_deadline(
        &self,
        regulator_id: &str,
        period:       Period,
    ) -> EngineResult<Option<SubmissionDeadline>>;
}

/// `PortfolioSource` over a SQLite snapshot. Opens one connection per call so
/// concurrent fetches never share a connection.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    path: String,
}

impl SqliteSource {
    /// `path` may be a file or a shared-cache memory URI
    /// (`file:name?mode=memory&cache=shared`). It is opened read-only and
    /// must already exist.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    fn store(&self) -> EngineResult<AnalyticsStore> {
        AnalyticsStore::open_read_only(&self.path)
    }
}

impl PortfolioSource for SqliteSource {
    fn regulator_by_code(&self, code: &str) -> EngineResult<Option<Regulator>> {
        self.store()?.regulator_by_code(code)
    }

    fn assigned_organizations(&self, regulator_id: &str) -> EngineResult<Vec<Organization>> {
        self.store()?.assigned_organizations(regulator_id)
    }

    fn organization_risks(&self, organization_id: &str) -> EngineResult<Vec<Risk>> {
        self.store()?.organization_risks(organization_id)
    }

    fn category_mappings(&self, organization_id: &str) -> EngineResult<Vec<CategoryMapping>> {
        self.store()?.category_mappings(organization_id)
    }

    fn controls_for_risk(&self, risk_id: &str) -> EngineResult<Vec<Control>> {
        self.store()?.controls_for_risk(risk_id)
    }

    fn submissions(&self, organization_id: &str, period: Period) -> EngineResult<Vec<Submission>> {
        self.store()?.submissions(organization_id, period)
    }

    fn submission_deadline(
        &self,
        regulator_id: &str,
        period:       Period,
    ) -> EngineResult<Option<SubmissionDeadline>> {
        self.store()?.submission_deadline(regulator_id, period)
    }
}

/// Run a single blocking source call off the async runtime.
pub async fn blocking<S, T, F>(source: &Arc<S>, call: F) -> EngineResult<T>
where
    S: PortfolioSource,
    T: Send + 'static,
    F: FnOnce(&S) -> EngineResult<T> + Send + 'static,
{
    let source = Arc::clone(source);
    tokio::task::spawn_blocking(move || call(&*source))
        .await
        .map_err(|e| EngineError::Other(anyhow::anyhow!("blocking fetch failed: {e}")))?
}

/// Fetch one value per organization concurrently; failures become `Err(reason)`.
async fn fan_out<S, T, F>(
    source:        &Arc<S>,
    organizations: &[Organization],
    timeout:       Duration,
    fetch:         F,
) -> Vec<Result<T, String>>
where
    S: PortfolioSource,
    T: Send + 'static,
    F: Fn(&S, &Organization) -> EngineResult<T> + Send + Sync + 'static,
{
    let fetch = Arc::new(fetch);
    let mut set = JoinSet::new();

    for (idx, org) in organizations.iter().cloned().enumerate() {
        let source = Arc::clone(source);
        let fetch = Arc::clone(&fetch);
        set.spawn(async move {
            let task = tokio::task::spawn_blocking(move || (*fetch)(&*source, &org));
            let outcome = match tokio::time::timeout(timeout, task).await {
                Ok(Ok(Ok(value))) => Ok(value),
                Ok(Ok(Err(e)))    => Err(e.to_string()),
                Ok(Err(join))     => Err(format!("fetch task failed: {join}")),
                Err(_)            => Err(format!("timed out after {} ms", timeout.as_millis())),
            };
            (idx, outcome)
        });
    }

    let mut results: Vec<Option<Result<T, String>>> =
        organizations.iter().map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((idx, outcome)) => results[idx] = Some(outcome),
            Err(e) => log::warn!("fetch: task join error: {e}"),
        }
    }

    organizations
        .iter()
        .zip(results)
        .map(|(org, outcome)| {
            let outcome = outcome.unwrap_or_else(|| Err("fetch task aborted".to_string()));
            if let Err(reason) = &outcome {
                log::warn!("fetch: organization {} failed: {reason}", org.organization_id);
            }
            outcome
        })
        .collect()
}

/// Load and resolve every organization's open risks.
pub async fn fetch_portfolios<S: PortfolioSource>(
    source:        &Arc<S>,
    resolver:      &CategoryResolver,
    organizations: Vec<Organization>,
    timeout:       Duration,
) -> Vec<OrganizationPortfolio> {
    let outcomes = fan_out(source, &organizations, timeout, |source, org| {
        let risks = source.organization_risks(&org.organization_id)?;
        let mappings = source.category_mappings(&org.organization_id)?;
        Ok((risks, mappings))
    })
    .await;

    organizations
        .into_iter()
        .zip(outcomes)
        .map(|(org, outcome)| match outcome {
            Ok((risks, mappings)) => OrganizationPortfolio::resolve(org, &risks, &mappings, resolver),
            Err(reason) => OrganizationPortfolio::failed(org, reason),
        })
        .collect()
}

/// Load every organization's submissions for one period.
pub async fn fetch_submissions<S: PortfolioSource>(
    source:        &Arc<S>,
    organizations: Vec<Organization>,
    period:        Period,
    timeout:       Duration,
) -> Vec<OrganizationSubmissions> {
    let outcomes = fan_out(source, &organizations, timeout, move |source, org| {
        source.submissions(&org.organization_id, period)
    })
    .await;

    organizations
        .into_iter()
        .zip(outcomes)
        .map(|(organization, outcome)| OrganizationSubmissions {
            organization,
            data: match outcome {
                Ok(submissions) => SubmissionData::Loaded { submissions },
                Err(reason) => SubmissionData::Failed { reason },
            },
        })
        .collect()
}
