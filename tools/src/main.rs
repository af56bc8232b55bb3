//! analytics-runner: headless regulator report over a SQLite snapshot.
//!
//! Usage:
//!   analytics-runner --db snapshot.db --regulator FSC --period "Q1 2026"
//!   analytics-runner --db snapshot.db --regulator FSC --json
//!   analytics-runner --db snapshot.db --regulator FSC --as-of 2026-05-10T12:00:00Z

use anyhow::Result;
use chrono::{DateTime, Datelike, Utc};
use grc_analytics_core::{
    compliance_tracker::{ComplianceClass, ComplianceReport, DeadlineStatus},
    config::EngineConfig,
    engine::{AnalyticsEngine, RegulatorReport},
    fetch::SqliteSource,
    model::StandardCategory,
    outlier_detector::{OutlierDirection, OutlierReport, SkipReason},
    sector_aggregator::{DataStatus, SectorSnapshot},
    types::Period,
};
use std::env;

#[derive(serde::Serialize)]
struct RunnerOutput<'a> {
    generated_at: DateTime<Utc>,
    report:       &'a RegulatorReport,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let json_mode = args.iter().any(|a| a == "--json");
    let db = string_arg(&args, "--db").unwrap_or("analytics.db");
    let regulator = string_arg(&args, "--regulator")
        .ok_or_else(|| anyhow::anyhow!("--regulator <code> is required"))?;
    let data_dir = string_arg(&args, "--data-dir").unwrap_or("./data");
    let now = parse_arg(&args, "--as-of", Utc::now());
    let period = match string_arg(&args, "--period") {
        Some(text) => text.parse::<Period>()?,
        None => current_period(now)?,
    };

    let config = match EngineConfig::load(data_dir) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("{e}; falling back to built-in defaults");
            EngineConfig::default()
        }
    };

    if !json_mode {
        println!("GRC analytics: analytics-runner");
        println!("  db:         {db}");
        println!("  regulator:  {regulator}");
        println!("  period:     {period}");
        println!("  as of:      {}", now.to_rfc3339());
        println!("  data_dir:   {data_dir}");
        println!();
    }

    let engine = AnalyticsEngine::new(config, SqliteSource::new(db))?;
    let report = engine.regulator_report(regulator, period, now).await?;

    if json_mode {
        let output = RunnerOutput { generated_at: Utc::now(), report: &report };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_sector(&report.sector);
        print_outliers(&report.outliers);
        print_compliance(&report.compliance);
    }

    Ok(())
}

fn print_sector(sector: &SectorSnapshot) {
    println!("=== SECTOR ({} firms, {} open risks) ===", sector.rows.len(), sector.total_risks);
    println!("  mapping completeness: {:.0}%", sector.mapping_completeness * 100.0);
    for id in &sector.failed_organizations {
        println!("  [!] data unavailable: {id}");
    }

    println!();
    println!("  heatmap (rows = likelihood 5..1, cols = impact 1..5)");
    for l in (1..=5u8).rev() {
        let row: Vec<String> = (1..=5u8)
            .map(|i| format!("{:>4}", sector.heatmap.count(l, i)))
            .collect();
        println!("    L{l} {}", row.join(""));
    }

    println!();
    println!("  category averages");
    for avg in &sector.category_averages {
        match avg.avg_rating {
            Some(a) => println!(
                "    {:<20} {a:>5.1}  firms={} risks={} critical={} high={}",
                avg.category.label(),
                avg.firm_count,
                avg.total_risks,
                avg.critical_count,
                avg.high_count
            ),
            None => println!("    {:<20}   n/a", avg.category.label()),
        }
    }

    println!();
    println!("  firms");
    for row in &sector.rows {
        let cells: Vec<String> = StandardCategory::ALL
            .iter()
            .map(|&c| match row.cell(c).avg_rating {
                Some(a) => format!("{}={a:.1}", c.code()),
                None => format!("{}=-", c.code()),
            })
            .collect();
        let flag = match &row.data_status {
            DataStatus::Loaded => String::new(),
            DataStatus::FetchFailed { reason } => format!("  [fetch failed: {reason}]"),
        };
        println!("    {:<28} {}{flag}", row.organization_name, cells.join(" "));
    }
    println!();
}

fn print_outliers(report: &OutlierReport) {
    println!("=== OUTLIERS ({}) ===", report.records.len());
    for r in &report.records {
        let arrow = match r.direction {
            OutlierDirection::Above => "above",
            OutlierDirection::Below => "below",
        };
        println!(
            "  {:<28} {} {:.1} ({arrow} mean {:.1}, |z|={:.2})",
            r.organization_name,
            r.category.code(),
            r.rating,
            r.sector_mean,
            r.deviation
        );
    }
    for s in &report.skipped {
        match s.reason {
            SkipReason::InsufficientSample { firms } => {
                println!("  skipped {}: only {firms} firms with data", s.category.code())
            }
            SkipReason::NoVariance { mean } => {
                println!("  skipped {}: no variance (mean {mean:.1})", s.category.code())
            }
        }
    }
    println!();
}

fn print_compliance(report: &ComplianceReport) {
    let stats = &report.stats;
    println!("=== COMPLIANCE {} ===", report.period);
    match report.deadline_status {
        DeadlineStatus::NoDeadline => println!("  deadline:       not configured"),
        DeadlineStatus::DaysRemaining { days } => println!("  deadline:       {days} days remaining"),
        DeadlineStatus::DueToday => println!("  deadline:       due today"),
        DeadlineStatus::Overdue { days } => println!("  deadline:       passed {days} days ago"),
    }
    println!("  rate:           {}%", stats.compliance_rate);
    println!("  submitted:      {}/{}", stats.submitted, stats.total_orgs);
    println!("  approved:       {}", stats.approved);
    println!("  pending review: {}", stats.pending_review);
    println!("  overdue:        {}", stats.overdue);
    println!("  late:           {}", stats.late_submissions);
    if stats.fetch_failed > 0 {
        println!("  fetch failed:   {}", stats.fetch_failed);
    }
    for org in &report.organizations {
        if org.classification == ComplianceClass::Overdue {
            println!("    overdue: {}", org.organization_name);
        }
    }
}

fn current_period(now: DateTime<Utc>) -> Result<Period> {
    let quarter = (now.month0() / 3 + 1) as u8;
    Ok(Period::new(quarter, now.year())?)
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
