//! Payout batching: one batch per agent per run, holding every payable
//! commission whose payout date has arrived.
//!
//! The batcher only assembles batches. Persisting them, and guarding
//! against a second run claiming the same commissions, is the ledger's
//! job (`CommissionLedger::record_payout_batch`). Marking awards paid is
//! a separate approval step.

use crate::{
    commission::CommissionAward,
    config::PayoutConfig,
    types::{round_currency, AgentFailure, AgentId, BatchId, CommissionId, ParseLabelError, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Paid,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid    => "paid",
        }
    }
}

impl FromStr for PayoutStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid"    => Ok(Self::Paid),
            other     => Err(ParseLabelError::new("payout status", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutFee {
    pub kind:   String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutBatch {
    pub batch_id:       BatchId,
    pub agent_id:       AgentId,
    /// Idempotency key together with `agent_id`, e.g. "2026-10".
    pub period:         String,
    pub commission_ids: Vec<CommissionId>,
    pub gross_amount:   f64,
    pub fees:           Vec<PayoutFee>,
    pub fee_total:      f64,
    pub net_amount:     f64,
    pub status:         PayoutStatus,
    pub created_at:     Timestamp,
}

/// Outcome of one payout run: the batches written and the agents left
/// for the next run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayoutRun {
    pub period:  String,
    pub batches: Vec<PayoutBatch>,
    pub skipped: Vec<AgentFailure>,
}

impl PayoutRun {
    pub fn total_net(&self) -> f64 {
        round_currency(self.batches.iter().map(|b| b.net_amount).sum())
    }
}

pub struct PayoutBatcher {
    config: PayoutConfig,
}

impl PayoutBatcher {
    pub fn new(config: PayoutConfig) -> Self {
        Self { config }
    }

    /// Processing fee: `fee_percent` of the gross, capped at `fee_cap`.
    pub fn fee_for(&self, gross: f64) -> f64 {
        round_currency((gross * self.config.fee_percent / 100.0).min(self.config.fee_cap).max(0.0))
    }

    pub fn is_eligible(award: &CommissionAward, now: Timestamp) -> bool {
        award.status.is_payable() && award.batch_id.is_none() && award.payout_date <= now
    }

    /// Eligible awards grouped by agent, agents in id order.
    pub fn group_by_agent(
        awards: Vec<CommissionAward>,
        now: Timestamp,
    ) -> BTreeMap<AgentId, Vec<CommissionAward>> {
        let mut grouped: BTreeMap<AgentId, Vec<CommissionAward>> = BTreeMap::new();
        for award in awards.into_iter().filter(|a| Self::is_eligible(a, now)) {
            grouped.entry(award.agent_id.clone()).or_default().push(award);
        }
        grouped
    }

    /// Build the batch for one agent. `None` when nothing is eligible.
    pub fn assemble(
        &self,
        agent_id: &str,
        period: &str,
        awards: &[CommissionAward],
        now: Timestamp,
    ) -> Option<PayoutBatch> {
        let eligible: Vec<&CommissionAward> = awards
            .iter()
            .filter(|a| a.agent_id == agent_id && Self::is_eligible(a, now))
            .collect();
        if eligible.is_empty() {
            return None;
        }

        let gross_amount = round_currency(eligible.iter().map(|a| a.total_amount).sum());
        let fee = self.fee_for(gross_amount);
        let fees = vec![PayoutFee { kind: "processing".into(), amount: fee }];
        let fee_total = round_currency(fees.iter().map(|f| f.amount).sum());

        Some(PayoutBatch {
            batch_id:       uuid::Uuid::new_v4().to_string(),
            agent_id:       agent_id.to_string(),
            period:         period.to_string(),
            commission_ids: eligible.iter().map(|a| a.commission_id.clone()).collect(),
            gross_amount,
            fees,
            fee_total,
            net_amount:     round_currency(gross_amount - fee_total),
            status:         PayoutStatus::Pending,
            created_at:     now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{commission::CommissionStatus, tier::Tier};
    use chrono::{Duration, TimeZone, Utc};

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 11, 16, 0, 0, 0).unwrap()
    }

    fn award(id: &str, agent: &str, total: f64, status: CommissionStatus, due: Timestamp) -> CommissionAward {
        CommissionAward {
            commission_id:   id.into(),
            agent_id:        agent.into(),
            lead_id:         format!("lead-{id}"),
            base_amount:     total * 10.0,
            rate:            10.0,
            base_commission: total,
            tier:            Tier::Gold,
            tier_multiplier: 1.0,
            bonuses:         vec![],
            penalties:       vec![],
            total_amount:    total,
            status,
            created_at:      due - Duration::days(30),
            updated_at:      due - Duration::days(30),
            payout_date:     due,
            batch_id:        None,
        }
    }

    fn batcher() -> PayoutBatcher {
        PayoutBatcher::new(PayoutConfig::default())
    }

    #[test]
    fn small_batches_pay_three_percent() {
        let awards = vec![
            award("c1", "a", 300.0, CommissionStatus::Pending, now()),
            award("c2", "a", 200.0, CommissionStatus::Approved, now()),
        ];
        let batch = batcher().assemble("a", "2026-11", &awards, now()).unwrap();
        assert_eq!(batch.gross_amount, 500.0);
        assert_eq!(batch.fee_total, 15.0);
        assert_eq!(batch.net_amount, 485.0);
        assert_eq!(batch.commission_ids, vec!["c1", "c2"]);
    }

    #[test]
    fn fee_is_capped() {
        let awards = vec![award("c1", "a", 2_075.0, CommissionStatus::Approved, now())];
        let batch = batcher().assemble("a", "2026-11", &awards, now()).unwrap();
        assert_eq!(batch.fee_total, 25.0);
        assert_eq!(batch.net_amount, 2_050.0);
    }

    #[test]
    fn ineligible_awards_are_left_out() {
        let mut batched = award("c4", "a", 100.0, CommissionStatus::Pending, now());
        batched.batch_id = Some("earlier".into());
        let awards = vec![
            award("c1", "a", 100.0, CommissionStatus::Paid, now()),
            award("c2", "a", 100.0, CommissionStatus::Disputed, now()),
            award("c3", "a", 100.0, CommissionStatus::Pending, now() + Duration::days(1)),
            batched,
        ];
        assert!(batcher().assemble("a", "2026-11", &awards, now()).is_none());
    }

    #[test]
    fn grouping_keeps_agents_in_id_order() {
        let awards = vec![
            award("c1", "zed", 10.0, CommissionStatus::Pending, now()),
            award("c2", "amy", 10.0, CommissionStatus::Pending, now()),
            award("c3", "amy", 10.0, CommissionStatus::Cancelled, now()),
        ];
        let grouped = PayoutBatcher::group_by_agent(awards, now());
        let agents: Vec<_> = grouped.keys().cloned().collect();
        assert_eq!(agents, vec!["amy", "zed"]);
        assert_eq!(grouped["amy"].len(), 1);
    }

    #[test]
    fn fee_bounds_hold_across_amounts() {
        let batcher = batcher();
        for gross in [0.0, 0.01, 99.99, 833.33, 833.34, 1_000_000.0] {
            let fee = batcher.fee_for(gross);
            assert!(fee <= 25.0);
            assert!(fee <= round_currency(gross * 0.03) + 1e-9);
        }
    }
}
