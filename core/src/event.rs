//! Domain events handed to the notification dispatcher.
//!
//! Variants are added over time, never removed or reordered.

use crate::{
    commission::CommissionStatus,
    tier::Tier,
    types::{AgentId, BatchId, CommissionId, LeadId, Timestamp},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompEvent {
    CommissionCreated {
        commission_id: CommissionId,
        agent_id:      AgentId,
        lead_id:       LeadId,
        total_amount:  f64,
        payout_date:   Timestamp,
        occurred_at:   Timestamp,
    },
    CommissionStatusChanged {
        commission_id: CommissionId,
        agent_id:      AgentId,
        from:          CommissionStatus,
        to:            CommissionStatus,
        occurred_at:   Timestamp,
    },
    TierUpgraded {
        agent_id:    AgentId,
        old_tier:    Tier,
        new_tier:    Tier,
        occurred_at: Timestamp,
    },
    PayoutBatched {
        batch_id:         BatchId,
        agent_id:         AgentId,
        period:           String,
        commission_count: usize,
        net_amount:       f64,
        occurred_at:      Timestamp,
    },
}

impl CompEvent {
    /// Stable name used for the event_type column and dispatcher routing.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CommissionCreated { .. }       => "commission_created",
            Self::CommissionStatusChanged { .. } => "commission_status_changed",
            Self::TierUpgraded { .. }            => "tier_upgraded",
            Self::PayoutBatched { .. }           => "payout_batched",
        }
    }

    pub fn occurred_at(&self) -> Timestamp {
        match self {
            Self::CommissionCreated { occurred_at, .. }
            | Self::CommissionStatusChanged { occurred_at, .. }
            | Self::TierUpgraded { occurred_at, .. }
            | Self::PayoutBatched { occurred_at, .. } => *occurred_at,
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:          Option<i64>,
    pub agent_id:    AgentId,
    pub event_type:  String,
    pub payload:     String, // JSON-serialized CompEvent
    pub recorded_at: Timestamp,
}
