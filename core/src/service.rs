//! The compensation service: every operation exposed to the API layer.
//!
//! RULES:
//!   - Storage, cache, notifications and quality feeds are reached only
//!     through the port traits.
//!   - Notification failures are logged and never fail the operation.
//!   - Batch operations isolate failures per agent and report them
//!     alongside the partial result.

use crate::{
    agent::{Agent, AgentCredit, AgentFilter, AgentPatch},
    cache::InMemoryCache,
    clock::Clock,
    commission::{
        AgentContext, CommissionAward, CommissionCalculator, CommissionFilter, CommissionStatus,
        ConversionContext, LeadContext,
    },
    config::EngineConfig,
    error::{CompError, CompResult},
    event::CompEvent,
    job::JobReport,
    lead::{LeadFilter, LeadStatus},
    leaderboard::{AgentScore, LeaderboardMetric, LeaderboardRanker, Leaderboards},
    payout::{PayoutBatcher, PayoutRun},
    performance::{aggregate, PerformanceAggregator, PerformanceMetrics, PeriodRange, PeriodType},
    ports::{AgentStore, Cache, CommissionLedger, LeadStore, NotificationDispatcher, QualitySource},
    scoring::{self, LeadPriority, PerformanceInputs},
    store::SqliteStore,
    tier::{Tier, TierCatalog},
    types::{AgentFailure, AgentId, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tier points earned per conversion, before the value component.
const POINTS_PER_CONVERSION: i64 = 10;

/// The collaborators a service is wired to.
#[derive(Clone)]
pub struct Ports {
    pub agents:   Arc<dyn AgentStore>,
    pub leads:    Arc<dyn LeadStore>,
    pub ledger:   Arc<dyn CommissionLedger>,
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub cache:    Arc<dyn Cache>,
    pub quality:  Arc<dyn QualitySource>,
    pub clock:    Arc<dyn Clock>,
}

impl Ports {
    /// Everything backed by one SQLite store, with an in-process cache.
    pub fn sqlite(store: Arc<SqliteStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            agents:   store.clone(),
            leads:    store.clone(),
            ledger:   store.clone(),
            notifier: store.clone(),
            cache:    Arc::new(InMemoryCache::new(clock.clone())),
            quality:  store,
            clock,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierChange {
    pub old_tier: Tier,
    pub new_tier: Tier,
}

impl TierChange {
    pub fn changed(&self) -> bool {
        self.old_tier != self.new_tier
    }
}

pub struct CompensationService {
    ports:       Ports,
    catalog:     Arc<TierCatalog>,
    calculator:  CommissionCalculator,
    aggregator:  PerformanceAggregator,
    batcher:     PayoutBatcher,
    ranker:      LeaderboardRanker,
}

impl CompensationService {
    pub fn new(ports: Ports, config: &EngineConfig) -> Self {
        Self {
            catalog:    config.tiers.clone(),
            calculator: CommissionCalculator::new(config.tiers.clone(), &config.rules, &config.payout),
            aggregator: PerformanceAggregator::new(ports.cache.clone(), config.cache.clone()),
            batcher:    PayoutBatcher::new(config.payout.clone()),
            ranker:     LeaderboardRanker::new(config.leaderboard.clone()),
            ports,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.ports.clock.now()
    }

    pub fn catalog(&self) -> &TierCatalog {
        &self.catalog
    }

    fn agent(&self, agent_id: &str) -> CompResult<Agent> {
        self.ports
            .agents
            .get(agent_id)?
            .ok_or_else(|| CompError::not_found("agent", agent_id))
    }

    fn notify(&self, agent_id: &str, event: CompEvent) {
        if let Err(e) = self.ports.notifier.notify(agent_id, &event) {
            log::warn!(
                "notify: {} for agent {agent_id} not delivered: {e}",
                event.event_type()
            );
        }
    }

    // ── Commissions ────────────────────────────────────────────

    /// Compute and record the award for a converted lead.
    pub fn calculate_commission(
        &self,
        lead_id: &str,
        final_amount: f64,
        context: ConversionContext,
    ) -> CompResult<CommissionAward> {
        if !final_amount.is_finite() || final_amount < 0.0 {
            return Err(CompError::Validation(format!(
                "final amount must be a non-negative amount, got {final_amount}"
            )));
        }
        if context.days_to_convert.is_some_and(|d| d < 0) {
            return Err(CompError::Validation("days to convert cannot be negative".into()));
        }
        if context.follow_up_delay_hours.is_some_and(|h| !h.is_finite() || h < 0.0) {
            return Err(CompError::Validation("follow-up delay must be a non-negative number of hours".into()));
        }

        let lead = self
            .ports
            .leads
            .get(lead_id)?
            .ok_or_else(|| CompError::not_found("lead", lead_id))?;
        let agent = self.agent(&lead.agent_id)?;

        let already_awarded = self
            .ports
            .ledger
            .find(&CommissionFilter::for_lead(lead_id))?
            .into_iter()
            .any(|a| a.status != CommissionStatus::Cancelled);
        if already_awarded {
            return Err(CompError::Validation(format!(
                "lead {lead_id} already has an active commission"
            )));
        }

        let history = self.ports.ledger.find(&CommissionFilter::for_agent(&agent.agent_id))?;
        let now = self.now();

        let lead_context = LeadContext {
            lead_id:               lead.lead_id.clone(),
            days_to_convert:       context
                .days_to_convert
                .unwrap_or_else(|| scoring::days_between(lead.assigned_at, now)),
            follow_up_delay_hours: context.follow_up_delay_hours.unwrap_or(0.0),
        };
        let agent_context = AgentContext {
            agent_id:               agent.agent_id.clone(),
            tier:                   agent.tier,
            historical_award_count: history.len(),
        };

        let award = self.calculator.calculate(final_amount, &lead_context, &agent_context, now)?;
        // The ledger enforces one live award per lead and applies the credit
        // in the same transaction; the lookup above is only a fast path.
        let credit = AgentCredit {
            revenue:     final_amount,
            commission:  award.total_amount,
            tier_points: POINTS_PER_CONVERSION + (final_amount / 1000.0).floor() as i64,
            conversions: 1,
            active_at:   now,
        };
        self.ports.ledger.insert(&award, &credit)?;
        self.aggregator.invalidate_agent(&agent.agent_id);

        log::info!(
            "commission: {} awarded {:.2} to agent {} for lead {} (tier {})",
            award.commission_id, award.total_amount, award.agent_id, award.lead_id, award.tier
        );
        self.notify(
            &agent.agent_id,
            CompEvent::CommissionCreated {
                commission_id: award.commission_id.clone(),
                agent_id:      award.agent_id.clone(),
                lead_id:       award.lead_id.clone(),
                total_amount:  award.total_amount,
                payout_date:   award.payout_date,
                occurred_at:   now,
            },
        );

        Ok(award)
    }

    /// Move an award through its approval lifecycle. Requesting the
    /// current status is a no-op.
    pub fn transition_commission(
        &self,
        commission_id: &str,
        status: CommissionStatus,
    ) -> CompResult<CommissionAward> {
        let mut award = self
            .ports
            .ledger
            .get(commission_id)?
            .ok_or_else(|| CompError::not_found("commission", commission_id))?;

        if award.status == status {
            return Ok(award);
        }
        if !award.status.can_transition_to(status) {
            return Err(CompError::Validation(format!(
                "commission {commission_id} cannot move from {} to {}",
                award.status.as_str(),
                status.as_str()
            )));
        }

        let now = self.now();
        self.ports.ledger.update_status(commission_id, status, now)?;
        let from = award.status;
        award.status = status;
        award.updated_at = now;

        log::info!(
            "commission: {commission_id} {} -> {}",
            from.as_str(),
            status.as_str()
        );
        self.notify(
            &award.agent_id,
            CompEvent::CommissionStatusChanged {
                commission_id: award.commission_id.clone(),
                agent_id:      award.agent_id.clone(),
                from,
                to: status,
                occurred_at: now,
            },
        );
        Ok(award)
    }

    // ── Performance ────────────────────────────────────────────

    fn metrics_for(&self, agent_id: &str, period: &PeriodRange) -> CompResult<PerformanceMetrics> {
        self.aggregator.metrics_for(agent_id, period, || {
            let leads = self.ports.leads.find(
                &LeadFilter::for_agent(agent_id).assigned_between(period.start, period.end),
            )?;
            let awards = self.ports.ledger.find(&CommissionFilter {
                agent_id:     Some(agent_id.to_string()),
                created_from: Some(period.start),
                created_to:   Some(period.end),
                ..CommissionFilter::default()
            })?;
            let quality = self.ports.quality.quality_metrics(agent_id, period)?;
            Ok(aggregate(agent_id, period, &leads, &awards, quality))
        })
    }

    /// Metrics for one agent over a period. Bounds default to the
    /// calendar period containing now.
    pub fn get_agent_performance_metrics(
        &self,
        agent_id: &str,
        period_type: PeriodType,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> CompResult<PerformanceMetrics> {
        self.agent(agent_id)?;
        let period = PeriodRange::resolve(period_type, start, end, self.now())?;
        self.metrics_for(agent_id, &period)
    }

    /// Weighted 0-100 score from lifetime conversion rate, external
    /// ratings and recent activity.
    pub fn agent_performance_score(&self, agent_id: &str) -> CompResult<u8> {
        let agent = self.agent(agent_id)?;
        let total = self.ports.leads.count_by_agent(agent_id, &LeadFilter::default())?;
        let won = self
            .ports
            .leads
            .count_by_agent(agent_id, &LeadFilter::default().with_statuses(&[LeadStatus::Won]))?;

        let inputs = PerformanceInputs {
            conversion_rate:  (total > 0).then(|| f64::from(won) / f64::from(total) * 100.0),
            experience_score: agent.experience_score,
            network_score:    agent.network_score,
            last_active_at:   agent.last_active_at,
        };
        Ok(scoring::performance_score(&inputs, self.now()))
    }

    /// Open leads ordered for follow-up.
    pub fn prioritize_leads(&self, agent_id: &str) -> CompResult<Vec<LeadPriority>> {
        self.agent(agent_id)?;
        let open: Vec<LeadStatus> = LeadStatus::ALL.into_iter().filter(|s| !s.is_terminal()).collect();
        let leads = self
            .ports
            .leads
            .find(&LeadFilter::for_agent(agent_id).with_statuses(&open))?;
        Ok(scoring::prioritize(&leads, self.now()))
    }

    // ── Tiers ──────────────────────────────────────────────────

    /// Promote the agent to the highest tier this month's metrics
    /// qualify for. Nothing is written when the tier is unchanged.
    pub fn evaluate_agent_tier(&self, agent_id: &str) -> CompResult<TierChange> {
        let agent = self.agent(agent_id)?;
        let now = self.now();
        let period = PeriodType::Monthly.range_containing(now);
        let metrics = self.metrics_for(agent_id, &period)?;

        let change = TierChange {
            old_tier: agent.tier,
            new_tier: self.catalog.evaluate_upgrade(&metrics.tier_metrics(), agent.tier),
        };
        if !change.changed() {
            log::debug!("tier: agent {agent_id} stays {}", change.old_tier);
            return Ok(change);
        }

        self.ports.agents.update(
            agent_id,
            &AgentPatch { tier: Some(change.new_tier), ..AgentPatch::default() },
        )?;
        self.aggregator.invalidate_agent(agent_id);

        log::info!(
            "tier: agent {agent_id} promoted {} -> {}",
            change.old_tier, change.new_tier
        );
        self.notify(
            agent_id,
            CompEvent::TierUpgraded {
                agent_id:    agent_id.to_string(),
                old_tier:    change.old_tier,
                new_tier:    change.new_tier,
                occurred_at: now,
            },
        );
        Ok(change)
    }

    /// Evaluate every active agent; one failure does not stop the rest.
    pub fn evaluate_all_tiers(&self) -> CompResult<JobReport> {
        let agents = self.ports.agents.find_active(&AgentFilter::default())?;
        let mut report = JobReport { job: "tier_maintenance".into(), ..JobReport::default() };

        for agent in &agents {
            match self.evaluate_agent_tier(&agent.agent_id) {
                Ok(change) => {
                    report.processed += 1;
                    if change.changed() {
                        report.changed += 1;
                    }
                }
                Err(e) => {
                    log::warn!("tier: evaluation failed for agent {}: {e}", agent.agent_id);
                    report.failures.push(AgentFailure::new(&agent.agent_id, e));
                }
            }
        }

        log::info!(
            "tier: evaluated {} agents, {} promoted, {} failed",
            report.processed,
            report.changed,
            report.failures.len()
        );
        Ok(report)
    }

    // ── Payouts ────────────────────────────────────────────────

    /// Batch every due, unbatched commission per agent for `period`.
    /// Agents whose batch conflicts with an earlier run are skipped and
    /// reported; they are picked up again on the next schedule.
    pub fn process_commission_payouts(
        &self,
        period: &str,
        agent_ids: Option<&[AgentId]>,
    ) -> CompResult<PayoutRun> {
        if period.trim().is_empty() {
            return Err(CompError::Validation("payout period label is required".into()));
        }

        let now = self.now();
        let mut due = self.ports.ledger.find(&CommissionFilter {
            statuses:       Some(vec![CommissionStatus::Pending, CommissionStatus::Approved]),
            payout_due_by:  Some(now),
            unbatched_only: true,
            ..CommissionFilter::default()
        })?;
        if let Some(ids) = agent_ids {
            due.retain(|a| ids.contains(&a.agent_id));
        }

        let mut run = PayoutRun { period: period.to_string(), ..PayoutRun::default() };

        for (agent_id, awards) in PayoutBatcher::group_by_agent(due, now) {
            let Some(batch) = self.batcher.assemble(&agent_id, period, &awards, now) else {
                continue;
            };

            match self.ports.ledger.record_payout_batch(&batch) {
                Ok(()) => {
                    log::info!(
                        "payout: batch {} for agent {agent_id}: {} commissions, gross {:.2}, fee {:.2}, net {:.2}",
                        batch.batch_id,
                        batch.commission_ids.len(),
                        batch.gross_amount,
                        batch.fee_total,
                        batch.net_amount
                    );
                    self.notify(
                        &agent_id,
                        CompEvent::PayoutBatched {
                            batch_id:         batch.batch_id.clone(),
                            agent_id:         agent_id.clone(),
                            period:           period.to_string(),
                            commission_count: batch.commission_ids.len(),
                            net_amount:       batch.net_amount,
                            occurred_at:      now,
                        },
                    );
                    run.batches.push(batch);
                }
                Err(e) if e.is_recoverable() => {
                    log::warn!("payout: skipping agent {agent_id} until next run: {e}");
                    run.skipped.push(AgentFailure::new(&agent_id, e));
                }
                Err(e) => {
                    log::warn!("payout: batch for agent {agent_id} failed: {e}");
                    run.skipped.push(AgentFailure::new(&agent_id, e));
                }
            }
        }

        log::info!(
            "payout: period {period}: {} batches, net {:.2}, {} skipped",
            run.batches.len(),
            run.total_net(),
            run.skipped.len()
        );
        Ok(run)
    }

    // ── Leaderboards ───────────────────────────────────────────

    fn agent_score(
        &self,
        agent: &Agent,
        period: &PeriodRange,
        metric: LeaderboardMetric,
    ) -> CompResult<AgentScore> {
        let current = self.metrics_for(&agent.agent_id, period)?;
        let previous = if metric.needs_previous_period() {
            Some(self.metrics_for(&agent.agent_id, &period.previous())?)
        } else {
            None
        };
        Ok(AgentScore {
            agent_id: agent.agent_id.clone(),
            tier:     agent.tier,
            region:   agent.region.clone(),
            score:    metric.score(&current, previous.as_ref()),
        })
    }

    /// Rank every active agent on `metric` for the current period.
    /// `limit` bounds the overall board; it defaults to the configured size.
    pub fn generate_leaderboards(
        &self,
        period_type: PeriodType,
        metric: LeaderboardMetric,
        limit: Option<usize>,
    ) -> CompResult<Leaderboards> {
        let period = period_type.range_containing(self.now());
        let agents = self.ports.agents.find_active(&AgentFilter::default())?;

        let mut scores = Vec::with_capacity(agents.len());
        let mut failures = Vec::new();
        for agent in &agents {
            match self.agent_score(agent, &period, metric) {
                Ok(score) => scores.push(score),
                Err(e) => {
                    log::warn!("leaderboard: skipping agent {}: {e}", agent.agent_id);
                    failures.push(AgentFailure::new(&agent.agent_id, e));
                }
            }
        }

        let limit = limit.unwrap_or_else(|| self.ranker.default_limit());
        Ok(self.ranker.build(metric, &scores, limit, failures))
    }
}
