//! Commission calculation for a single conversion.
//!
//! Steps, always in this order:
//!   1. base = transaction value x tier base rate
//!   2. bonuses: every bonus rule evaluated independently, summed
//!   3. penalties: every penalty rule evaluated independently, summed
//!   4. final = max(0, base + bonuses - penalties) x tier multiplier
//!   5. payout date = configured day of the following month (UTC)
//!
//! Adding a rule never changes how the existing ones evaluate.

use crate::{
    config::{CommissionRulesConfig, PayoutConfig},
    error::{CompError, CompResult},
    tier::{Tier, TierCatalog},
    types::{round_currency, AgentId, CommissionId, LeadId, ParseLabelError, Timestamp},
};
use chrono::{Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::{str::FromStr, sync::Arc};

// ── Award records ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Approved,
    Paid,
    Disputed,
    Cancelled,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending   => "pending",
            Self::Approved  => "approved",
            Self::Paid      => "paid",
            Self::Disputed  => "disputed",
            Self::Cancelled => "cancelled",
        }
    }

    /// pending -> approved -> paid; pending/approved -> disputed ->
    /// approved | cancelled. Paid and cancelled are final.
    pub fn can_transition_to(&self, next: CommissionStatus) -> bool {
        use CommissionStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Disputed)
                | (Approved, Paid)
                | (Approved, Disputed)
                | (Disputed, Approved)
                | (Disputed, Cancelled)
        )
    }

    /// Statuses a payout run collects.
    pub fn is_payable(&self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }
}

impl FromStr for CommissionStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending"   => Ok(Self::Pending),
            "approved"  => Ok(Self::Approved),
            "paid"      => Ok(Self::Paid),
            "disputed"  => Ok(Self::Disputed),
            "cancelled" => Ok(Self::Cancelled),
            other       => Err(ParseLabelError::new("commission status", other)),
        }
    }
}

/// One bonus or penalty line on an award.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub rule:        String,
    pub description: String,
    /// Always non-negative; whether it adds or subtracts depends on the list it is in.
    pub amount:      f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionAward {
    pub commission_id:   CommissionId,
    pub agent_id:        AgentId,
    pub lead_id:         LeadId,
    /// The transaction value the commission is computed on.
    pub base_amount:     f64,
    /// Tier base rate in percent.
    pub rate:            f64,
    pub base_commission: f64,
    pub tier:            Tier,
    pub tier_multiplier: f64,
    pub bonuses:         Vec<Adjustment>,
    pub penalties:       Vec<Adjustment>,
    pub total_amount:    f64,
    pub status:          CommissionStatus,
    pub created_at:      Timestamp,
    pub updated_at:      Timestamp,
    pub payout_date:     Timestamp,
    pub batch_id:        Option<String>,
}

impl CommissionAward {
    pub fn bonus_total(&self) -> f64 {
        round_currency(self.bonuses.iter().map(|b| b.amount).sum())
    }

    pub fn penalty_total(&self) -> f64 {
        round_currency(self.penalties.iter().map(|p| p.amount).sum())
    }
}

/// Filter for `CommissionLedger::find`.
#[derive(Debug, Clone, Default)]
pub struct CommissionFilter {
    pub agent_id:       Option<AgentId>,
    pub lead_id:        Option<LeadId>,
    pub statuses:       Option<Vec<CommissionStatus>>,
    /// Inclusive upper bound on `payout_date`.
    pub payout_due_by:  Option<Timestamp>,
    /// Inclusive lower bound on `created_at`.
    pub created_from:   Option<Timestamp>,
    /// Exclusive upper bound on `created_at`.
    pub created_to:     Option<Timestamp>,
    pub unbatched_only: bool,
}

impl CommissionFilter {
    pub fn for_agent(agent_id: &str) -> Self {
        Self { agent_id: Some(agent_id.to_string()), ..Self::default() }
    }

    pub fn for_lead(lead_id: &str) -> Self {
        Self { lead_id: Some(lead_id.to_string()), ..Self::default() }
    }

    pub fn matches(&self, award: &CommissionAward) -> bool {
        if let Some(agent_id) = &self.agent_id {
            if &award.agent_id != agent_id {
                return false;
            }
        }
        if let Some(lead_id) = &self.lead_id {
            if &award.lead_id != lead_id {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&award.status) {
                return false;
            }
        }
        if let Some(due) = self.payout_due_by {
            if award.payout_date > due {
                return false;
            }
        }
        if let Some(from) = self.created_from {
            if award.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.created_to {
            if award.created_at >= to {
                return false;
            }
        }
        !(self.unbatched_only && award.batch_id.is_some())
    }
}

// ── Inputs ─────────────────────────────────────────────────────────

/// Conversion details supplied by the caller of `calculate_commission`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionContext {
    /// Derived from the lead's assignment date when absent.
    pub days_to_convert:       Option<i64>,
    pub follow_up_delay_hours: Option<f64>,
}

/// Resolved per-lead facts the rules look at.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadContext {
    pub lead_id:               LeadId,
    pub days_to_convert:       i64,
    pub follow_up_delay_hours: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentContext {
    pub agent_id:               AgentId,
    pub tier:                   Tier,
    /// Awards the agent held before this one.
    pub historical_award_count: usize,
}

/// Everything a rule may inspect.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub transaction_value: f64,
    pub lead:              &'a LeadContext,
    pub agent:             &'a AgentContext,
}

// ── Rules ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Bonus,
    Penalty,
}

/// An independent bonus or penalty evaluator.
pub trait CommissionRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn kind(&self) -> RuleKind;
    /// `Some` when the rule applies; the amount is non-negative.
    fn evaluate(&self, input: &RuleInput<'_>) -> Option<Adjustment>;
}

pub struct FastConversionBonus {
    pub max_days: i64,
    pub percent:  f64,
}

impl CommissionRule for FastConversionBonus {
    fn name(&self) -> &'static str { "fast_conversion" }
    fn kind(&self) -> RuleKind { RuleKind::Bonus }

    fn evaluate(&self, input: &RuleInput<'_>) -> Option<Adjustment> {
        (input.lead.days_to_convert <= self.max_days).then(|| Adjustment {
            rule:        self.name().into(),
            description: format!("converted within {} days", self.max_days),
            amount:      round_currency(input.transaction_value * self.percent / 100.0),
        })
    }
}

pub struct HighValueBonus {
    pub threshold: f64,
    pub percent:   f64,
}

impl CommissionRule for HighValueBonus {
    fn name(&self) -> &'static str { "high_value" }
    fn kind(&self) -> RuleKind { RuleKind::Bonus }

    fn evaluate(&self, input: &RuleInput<'_>) -> Option<Adjustment> {
        (input.transaction_value >= self.threshold).then(|| Adjustment {
            rule:        self.name().into(),
            description: format!("transaction of at least {:.2}", self.threshold),
            amount:      round_currency(input.transaction_value * self.percent / 100.0),
        })
    }
}

pub struct FirstConversionBonus {
    pub amount: f64,
}

impl CommissionRule for FirstConversionBonus {
    fn name(&self) -> &'static str { "first_conversion" }
    fn kind(&self) -> RuleKind { RuleKind::Bonus }

    fn evaluate(&self, input: &RuleInput<'_>) -> Option<Adjustment> {
        (input.agent.historical_award_count == 0).then(|| Adjustment {
            rule:        self.name().into(),
            description: "agent's first conversion".into(),
            amount:      round_currency(self.amount),
        })
    }
}

pub struct LateFollowUpPenalty {
    pub max_hours: f64,
    pub amount:    f64,
}

impl CommissionRule for LateFollowUpPenalty {
    fn name(&self) -> &'static str { "late_follow_up" }
    fn kind(&self) -> RuleKind { RuleKind::Penalty }

    fn evaluate(&self, input: &RuleInput<'_>) -> Option<Adjustment> {
        (input.lead.follow_up_delay_hours > self.max_hours).then(|| Adjustment {
            rule:        self.name().into(),
            description: format!("follow-up later than {} hours", self.max_hours),
            amount:      round_currency(self.amount),
        })
    }
}

/// The program's rule set, in evaluation order.
pub fn standard_rules(config: &CommissionRulesConfig) -> Vec<Box<dyn CommissionRule>> {
    vec![
        Box::new(FastConversionBonus {
            max_days: config.fast_conversion_days,
            percent:  config.fast_conversion_percent,
        }),
        Box::new(HighValueBonus {
            threshold: config.high_value_threshold,
            percent:   config.high_value_percent,
        }),
        Box::new(FirstConversionBonus { amount: config.first_conversion_bonus }),
        Box::new(LateFollowUpPenalty {
            max_hours: config.late_follow_up_hours,
            amount:    config.late_follow_up_penalty,
        }),
    ]
}

// ── Calculator ─────────────────────────────────────────────────────

pub struct CommissionCalculator {
    catalog:    Arc<TierCatalog>,
    rules:      Vec<Box<dyn CommissionRule>>,
    payout_day: u32,
}

impl CommissionCalculator {
    pub fn new(
        catalog: Arc<TierCatalog>,
        rules: &CommissionRulesConfig,
        payout: &PayoutConfig,
    ) -> Self {
        Self::with_rules(catalog, standard_rules(rules), payout.payout_day)
    }

    pub fn with_rules(
        catalog: Arc<TierCatalog>,
        rules: Vec<Box<dyn CommissionRule>>,
        payout_day: u32,
    ) -> Self {
        Self { catalog, rules, payout_day }
    }

    pub fn catalog(&self) -> &TierCatalog {
        &self.catalog
    }

    /// Compute a pending award. Pure apart from the fresh award id.
    pub fn calculate(
        &self,
        transaction_value: f64,
        lead: &LeadContext,
        agent: &AgentContext,
        now: Timestamp,
    ) -> CompResult<CommissionAward> {
        if !transaction_value.is_finite() || transaction_value < 0.0 {
            return Err(CompError::Validation(format!(
                "transaction value must be a non-negative amount, got {transaction_value}"
            )));
        }

        let tier = self.catalog.get(agent.tier)?;
        let base_commission = round_currency(transaction_value * tier.base_rate / 100.0);

        let input = RuleInput { transaction_value, lead, agent };
        let mut bonuses = Vec::new();
        let mut penalties = Vec::new();
        for rule in &self.rules {
            if let Some(adjustment) = rule.evaluate(&input) {
                match rule.kind() {
                    RuleKind::Bonus   => bonuses.push(adjustment),
                    RuleKind::Penalty => penalties.push(adjustment),
                }
            }
        }

        let bonus_total: f64 = bonuses.iter().map(|b| b.amount).sum();
        let penalty_total: f64 = penalties.iter().map(|p| p.amount).sum();
        let pre_multiplier = (base_commission + bonus_total - penalty_total).max(0.0);
        let total_amount = round_currency(pre_multiplier * tier.bonus_multiplier);

        Ok(CommissionAward {
            commission_id:   uuid::Uuid::new_v4().to_string(),
            agent_id:        agent.agent_id.clone(),
            lead_id:         lead.lead_id.clone(),
            base_amount:     transaction_value,
            rate:            tier.base_rate,
            base_commission,
            tier:            tier.tier,
            tier_multiplier: tier.bonus_multiplier,
            bonuses,
            penalties,
            total_amount,
            status:          CommissionStatus::Pending,
            created_at:      now,
            updated_at:      now,
            payout_date:     payout_date_after(now, self.payout_day)?,
            batch_id:        None,
        })
    }
}

/// `day` of the calendar month after `at`, midnight UTC.
pub fn payout_date_after(at: Timestamp, day: u32) -> CompResult<Timestamp> {
    let (year, month) = if at.month() == 12 {
        (at.year() + 1, 1)
    } else {
        (at.year(), at.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .ok_or_else(|| {
            CompError::Configuration(format!("payout day {day} does not exist in {year}-{month:02}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 12, 20, 9, 30, 0).unwrap()
    }

    fn calculator() -> CommissionCalculator {
        let config = EngineConfig::default_test();
        CommissionCalculator::new(config.tiers.clone(), &config.rules, &config.payout)
    }

    fn lead(days: i64, delay: f64) -> LeadContext {
        LeadContext {
            lead_id: "lead-1".into(),
            days_to_convert: days,
            follow_up_delay_hours: delay,
        }
    }

    fn agent(tier: Tier, history: usize) -> AgentContext {
        AgentContext {
            agent_id: "agent-1".into(),
            tier,
            historical_award_count: history,
        }
    }

    #[test]
    fn gold_first_fast_high_value_conversion() {
        let award = calculator()
            .calculate(12_000.0, &lead(5, 0.0), &agent(Tier::Gold, 0), now())
            .unwrap();
        assert_eq!(award.base_commission, 1200.0);
        let amounts: Vec<f64> = award.bonuses.iter().map(|b| b.amount).collect();
        assert_eq!(amounts, vec![240.0, 120.0, 100.0]);
        assert!(award.penalties.is_empty());
        assert_eq!(award.total_amount, 2075.0);
        assert_eq!(award.status, CommissionStatus::Pending);
    }

    #[test]
    fn penalties_never_push_the_total_negative() {
        let award = calculator()
            .calculate(100.0, &lead(30, 72.0), &agent(Tier::Bronze, 3), now())
            .unwrap();
        assert_eq!(award.base_commission, 5.0);
        assert_eq!(award.penalty_total(), 50.0);
        assert_eq!(award.total_amount, 0.0);
    }

    #[test]
    fn no_rules_fire_for_a_plain_conversion() {
        let award = calculator()
            .calculate(2_000.0, &lead(20, 24.0), &agent(Tier::Silver, 2), now())
            .unwrap();
        assert!(award.bonuses.is_empty());
        assert!(award.penalties.is_empty());
        // 150 x 1.1
        assert_eq!(award.total_amount, 165.0);
    }

    #[test]
    fn identical_inputs_give_identical_amounts() {
        let calc = calculator();
        let a = calc.calculate(8_750.0, &lead(3, 50.0), &agent(Tier::Platinum, 0), now()).unwrap();
        let b = calc.calculate(8_750.0, &lead(3, 50.0), &agent(Tier::Platinum, 0), now()).unwrap();
        assert_eq!(a.total_amount, b.total_amount);
        assert_eq!(a.bonuses, b.bonuses);
        assert_eq!(a.penalties, b.penalties);
        assert_eq!(a.payout_date, b.payout_date);
    }

    #[test]
    fn negative_transaction_value_is_rejected() {
        let result = calculator().calculate(-1.0, &lead(1, 0.0), &agent(Tier::Gold, 0), now());
        assert!(matches!(result, Err(CompError::Validation(_))));
    }

    #[test]
    fn payout_date_rolls_into_next_year() {
        let date = payout_date_after(now(), 15).unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2027, 1, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn status_machine_protects_paid_awards() {
        use CommissionStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Paid));
        assert!(Disputed.can_transition_to(Cancelled));
        assert!(!Paid.can_transition_to(Disputed));
        assert!(!Paid.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Paid));
        assert!(!Cancelled.can_transition_to(Approved));
    }
}
