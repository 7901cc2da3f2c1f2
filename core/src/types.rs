//! Shared primitive types used across the compensation core.

use chrono::{DateTime, Utc};

/// Stable identifier of a referral agent.
pub type AgentId = String;

/// Stable identifier of a lead in an agent's pipeline.
pub type LeadId = String;

/// Identifier of a commission award (uuid v4 rendered as text).
pub type CommissionId = String;

/// Identifier of a payout batch (uuid v4 rendered as text).
pub type BatchId = String;

/// All timestamps are UTC.
pub type Timestamp = DateTime<Utc>;

/// Round a monetary amount to cents, half away from zero.
pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// An agent left out of a batch operation, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AgentFailure {
    pub agent_id: AgentId,
    pub reason:   String,
}

impl AgentFailure {
    pub fn new(agent_id: &str, reason: impl std::fmt::Display) -> Self {
        Self { agent_id: agent_id.to_string(), reason: reason.to_string() }
    }
}

/// Error returned when a stored or configured enum label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseLabelError {
    pub kind:  &'static str,
    pub value: String,
}

impl ParseLabelError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}
