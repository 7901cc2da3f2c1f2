//! Scheduled batch jobs and the runner that drives them.
//!
//! RUN ORDER (fixed):
//!   1. Tier maintenance
//!   2. Payouts
//!   3. Leaderboards
//!
//! RULES:
//!   - Jobs run in registration order.
//!   - A failing job is logged and reported; later jobs still run.
//!   - Jobs never bypass the service to reach storage.

use crate::{
    error::CompResult,
    leaderboard::LeaderboardMetric,
    performance::PeriodType,
    service::CompensationService,
    types::{AgentFailure, Timestamp},
};
use serde::{Deserialize, Serialize};

/// Summary of a run over many agents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub job:       String,
    pub processed: usize,
    pub changed:   usize,
    pub failures:  Vec<AgentFailure>,
}

pub trait ScheduledJob: Send {
    /// Unique stable name for this job.
    fn name(&self) -> &'static str;

    fn run(&self, service: &CompensationService) -> CompResult<JobReport>;
}

/// Payout label for the month containing `at`, e.g. "2026-11".
pub fn payout_period_label(at: Timestamp) -> String {
    at.format("%Y-%m").to_string()
}

/// Batches due commissions. The period label defaults to the current month.
#[derive(Debug, Clone, Default)]
pub struct PayoutJob {
    pub period: Option<String>,
}

impl ScheduledJob for PayoutJob {
    fn name(&self) -> &'static str {
        "payouts"
    }

    fn run(&self, service: &CompensationService) -> CompResult<JobReport> {
        let period = self
            .period
            .clone()
            .unwrap_or_else(|| payout_period_label(service.now()));
        let run = service.process_commission_payouts(&period, None)?;
        Ok(JobReport {
            job:       self.name().into(),
            processed: run.batches.len() + run.skipped.len(),
            changed:   run.batches.len(),
            failures:  run.skipped,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TierMaintenanceJob;

impl ScheduledJob for TierMaintenanceJob {
    fn name(&self) -> &'static str {
        "tier_maintenance"
    }

    fn run(&self, service: &CompensationService) -> CompResult<JobReport> {
        service.evaluate_all_tiers()
    }
}

/// Recomputes the boards, warming the metrics cache as a side effect.
/// `limit` bounds the overall board; `None` uses the configured size.
#[derive(Debug, Clone, Copy)]
pub struct LeaderboardJob {
    pub period_type: PeriodType,
    pub metric:      LeaderboardMetric,
    pub limit:       Option<usize>,
}

impl Default for LeaderboardJob {
    fn default() -> Self {
        Self { period_type: PeriodType::Monthly, metric: LeaderboardMetric::Revenue, limit: None }
    }
}

impl ScheduledJob for LeaderboardJob {
    fn name(&self) -> &'static str {
        "leaderboards"
    }

    fn run(&self, service: &CompensationService) -> CompResult<JobReport> {
        let boards = service.generate_leaderboards(self.period_type, self.metric, self.limit)?;
        if let Some(leader) = boards.overall.first() {
            log::info!(
                "leaderboards: {} {} leader is {} ({:.2})",
                self.period_type.as_str(),
                self.metric.as_str(),
                leader.agent_id,
                leader.score
            );
        }
        Ok(JobReport {
            job:       self.name().into(),
            processed: boards.overall.len(),
            changed:   0,
            failures:  boards.failures,
        })
    }
}

pub struct JobRunner {
    jobs: Vec<Box<dyn ScheduledJob>>,
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRunner {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    /// The standard nightly schedule with default settings.
    pub fn standard() -> Self {
        Self::scheduled(PayoutJob::default(), LeaderboardJob::default())
    }

    /// The standard schedule in its fixed order, with caller-chosen payout
    /// and leaderboard settings.
    pub fn scheduled(payouts: PayoutJob, leaderboards: LeaderboardJob) -> Self {
        let mut runner = Self::new();
        runner.register(Box::new(TierMaintenanceJob));
        runner.register(Box::new(payouts));
        runner.register(Box::new(leaderboards));
        runner
    }

    /// Register a job. Call in the documented run order.
    pub fn register(&mut self, job: Box<dyn ScheduledJob>) {
        self.jobs.push(job);
    }

    pub fn job_names(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|j| j.name()).collect()
    }

    /// Run every job in order. A job that fails outright yields a report
    /// with no processed agents and the error recorded.
    pub fn run_all(&self, service: &CompensationService) -> Vec<JobReport> {
        let mut reports = Vec::with_capacity(self.jobs.len());
        for job in &self.jobs {
            log::info!("job: starting {}", job.name());
            match job.run(service) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    log::error!("job: {} failed: {e}", job.name());
                    reports.push(JobReport {
                        job:      job.name().into(),
                        failures: vec![AgentFailure::new("*", e)],
                        ..JobReport::default()
                    });
                }
            }
        }
        reports
    }
}
