//! comp-runner: headless scheduler for the referral compensation jobs.
//!
//! Usage:
//!   comp-runner --db comp.db --job all
//!   comp-runner --db comp.db --job payouts --period 2026-11
//!   comp-runner --db comp.db --job leaderboard --metric conversions --period-type weekly --limit 10
//!   comp-runner --db comp.db --job tiers --now 2026-12-01T00:00:00Z --json

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use referral_comp_core::{
    clock::{Clock, FixedClock, SystemClock},
    config::EngineConfig,
    job::{JobReport, JobRunner, LeaderboardJob, PayoutJob, TierMaintenanceJob},
    leaderboard::{LeaderboardMetric, Leaderboards},
    performance::PeriodType,
    service::{CompensationService, Ports},
    store::SqliteStore,
};
use std::{env, sync::Arc};

#[derive(serde::Serialize)]
struct RunOutput {
    job:          String,
    ran_at:       DateTime<Utc>,
    reports:      Vec<JobReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    leaderboards: Option<Leaderboards>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = str_arg(&args, "--db").unwrap_or("comp.db");
    let data_dir = str_arg(&args, "--data-dir").unwrap_or("./data");
    let job = str_arg(&args, "--job").unwrap_or("all");
    let period = str_arg(&args, "--period");
    let metric: LeaderboardMetric = parse_arg(&args, "--metric", LeaderboardMetric::Revenue);
    let period_type: PeriodType = parse_arg(&args, "--period-type", PeriodType::Monthly);
    let limit = str_arg(&args, "--limit").and_then(|l| l.parse::<usize>().ok());
    let as_json = args.iter().any(|a| a == "--json");

    let clock: Arc<dyn Clock> = match str_arg(&args, "--now") {
        Some(raw) => {
            let at = DateTime::parse_from_rfc3339(raw)
                .map_err(|e| anyhow!("Invalid --now {raw}: {e}"))?
                .with_timezone(&Utc);
            Arc::new(FixedClock::new(at))
        }
        None => Arc::new(SystemClock),
    };

    if !as_json {
        println!("Referral compensation: comp-runner");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!("  job:       {job}");
        println!("  now:       {}", clock.now().to_rfc3339());
        println!();
    }

    let config = EngineConfig::load(data_dir)?;
    let store = Arc::new(SqliteStore::open(db)?);
    store.migrate()?;
    let service = CompensationService::new(Ports::sqlite(store, clock.clone()), &config);

    let mut leaderboards = None;
    let reports = match job {
        "all" => JobRunner::scheduled(
            PayoutJob { period: period.map(str::to_string) },
            LeaderboardJob { period_type, metric, limit },
        )
        .run_all(&service),
        "payouts" => {
            let mut runner = JobRunner::new();
            runner.register(Box::new(PayoutJob { period: period.map(str::to_string) }));
            runner.run_all(&service)
        }
        "tiers" => {
            let mut runner = JobRunner::new();
            runner.register(Box::new(TierMaintenanceJob));
            runner.run_all(&service)
        }
        "leaderboard" => {
            let boards = service.generate_leaderboards(period_type, metric, limit)?;
            let report = JobReport {
                job:       "leaderboards".into(),
                processed: boards.overall.len(),
                changed:   0,
                failures:  boards.failures.clone(),
            };
            leaderboards = Some(boards);
            vec![report]
        }
        other => return Err(anyhow!("Unknown --job {other}; expected all, payouts, tiers or leaderboard")),
    };

    if as_json {
        let output = RunOutput {
            job: job.to_string(),
            ran_at: clock.now(),
            reports,
            leaderboards,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_summary(&reports, leaderboards.as_ref());
    }

    Ok(())
}

fn print_summary(reports: &[JobReport], leaderboards: Option<&Leaderboards>) {
    println!("=== RUN SUMMARY ===");
    for report in reports {
        println!(
            "  {:<18} processed: {:>4}  changed: {:>4}  failed: {:>3}",
            report.job,
            report.processed,
            report.changed,
            report.failures.len()
        );
        for failure in &report.failures {
            println!("    ! {}: {}", failure.agent_id, failure.reason);
        }
    }

    if let Some(boards) = leaderboards {
        println!();
        println!("=== LEADERBOARD ({}) ===", boards.metric.as_str());
        if boards.overall.is_empty() {
            println!("  (No active agents)");
        }
        for entry in &boards.overall {
            println!("  {:>3}. {:<24} {:>12.2}", entry.rank, entry.agent_id, entry.score);
        }
    }
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
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
