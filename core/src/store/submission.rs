//! Store methods for submissions and submission deadlines.

use super::{parse_date, parse_timestamp, AnalyticsStore};
use crate::{
    error::EngineResult,
    model::{Submission, SubmissionDeadline},
    types::Period,
};
use rusqlite::{params, OptionalExtension};

/// Raw `submission` row before parsing.
struct SubmissionRow {
    submission_id:   String,
    organization_id: String,
    period:          String,
    status:          String,
    created_at:      String,
    submitted_at:    Option<String>,
    reviewed_at:     Option<String>,
}

impl SubmissionRow {
    fn validate(self) -> EngineResult<Submission> {
        Ok(Submission {
            period:          self.period.parse()?,
            status:          self.status.parse()?,
            created_at:      parse_timestamp("created_at", &self.created_at)?,
            submitted_at:    self
                .submitted_at
                .as_deref()
                .map(|v| parse_timestamp("submitted_at", v))
                .transpose()?,
            reviewed_at:     self
                .reviewed_at
                .as_deref()
                .map(|v| parse_timestamp("reviewed_at", v))
                .transpose()?,
            submission_id:   self.submission_id,
            organization_id: self.organization_id,
        })
    }
}

impl AnalyticsStore {
    pub fn insert_submission(&self, submission: &Submission) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO submission
             (submission_id, organization_id, period, status, created_at,
              submitted_at, reviewed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                submission.submission_id,
                submission.organization_id,
                submission.period.to_string(),
                submission.status.as_str(),
                submission.created_at.to_rfc3339(),
                submission.submitted_at.map(|t| t.to_rfc3339()),
                submission.reviewed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn insert_submission_deadline(&self, deadline: &SubmissionDeadline) -> EngineResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO submission_deadline
             (regulator_id, period, deadline_date, grace_period_days, notes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                deadline.regulator_id,
                deadline.period.to_string(),
                deadline.deadline_date.format("%Y-%m-%d").to_string(),
                deadline.grace_period_days,
                deadline.notes,
            ],
        )?;
        Ok(())
    }

    /// All of an organization's submissions for one period.
    pub fn submissions(&self, organization_id: &str, period: Period) -> EngineResult<Vec<Submission>> {
        let mut stmt = self.conn.prepare(
            "SELECT submission_id, organization_id, period, status, created_at,
                    submitted_at, reviewed_at
             FROM submission
             WHERE organization_id = ?1 AND period = ?2
             ORDER BY created_at ASC, submission_id ASC",
        )?;
        let rows = stmt
            .query_map(params![organization_id, period.to_string()], |row| {
                Ok(SubmissionRow {
                    submission_id:   row.get(0)?,
                    organization_id: row.get(1)?,
                    period:          row.get(2)?,
                    status:          row.get(3)?,
                    created_at:      row.get(4)?,
                    submitted_at:    row.get(5)?,
                    reviewed_at:     row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(SubmissionRow::validate).collect()
    }

    /// The deadline for (regulator, period), or `None` when none is configured.
    pub fn submission_deadline(
        &self,
        regulator_id: &str,
        period:       Period,
    ) -> EngineResult<Option<SubmissionDeadline>> {
        let row = self
            .conn
            .query_row(
                "SELECT regulator_id, deadline_date, grace_period_days, notes
                 FROM submission_deadline WHERE regulator_id = ?1 AND period = ?2",
                params![regulator_id, period.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(regulator_id, date, grace, notes)| {
            SubmissionDeadline::new(
                regulator_id,
                period,
                parse_date("deadline_date", &date)?,
                grace,
                notes,
            )
        })
        .transpose()
    }
}
