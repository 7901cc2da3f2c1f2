//! Collaborator interfaces the compensation core consumes.
//!
//! RULE: Services only reach storage, caching and messaging through
//! these traits. `store::SqliteStore` and `cache::InMemoryCache` are the
//! bundled implementations; tests may substitute their own.

use crate::{
    agent::{Agent, AgentCredit, AgentFilter, AgentPatch},
    commission::{CommissionAward, CommissionFilter, CommissionStatus},
    error::CompResult,
    event::CompEvent,
    lead::{Lead, LeadFilter},
    payout::PayoutBatch,
    performance::{PeriodRange, QualityMetrics},
    types::Timestamp,
};

pub trait AgentStore: Send + Sync {
    fn get(&self, agent_id: &str) -> CompResult<Option<Agent>>;

    /// Apply `patch` and return the updated agent. NotFound if absent.
    fn update(&self, agent_id: &str, patch: &AgentPatch) -> CompResult<Agent>;

    /// Active agents matching `filter`, ordered by agent id.
    fn find_active(&self, filter: &AgentFilter) -> CompResult<Vec<Agent>>;
}

pub trait LeadStore: Send + Sync {
    fn get(&self, lead_id: &str) -> CompResult<Option<Lead>>;

    /// Matching leads ordered by lead id.
    fn find(&self, filter: &LeadFilter) -> CompResult<Vec<Lead>>;

    fn count_by_agent(&self, agent_id: &str, filter: &LeadFilter) -> CompResult<u32>;
}

pub trait CommissionLedger: Send + Sync {
    /// Append a new award and apply `credit` to its agent, atomically.
    /// Returns the credited agent. Validation when the lead already holds
    /// a non-cancelled award. Awards are never deleted.
    fn insert(&self, award: &CommissionAward, credit: &AgentCredit) -> CompResult<Agent>;

    fn get(&self, commission_id: &str) -> CompResult<Option<CommissionAward>>;

    /// Matching awards ordered by creation time, then id.
    fn find(&self, filter: &CommissionFilter) -> CompResult<Vec<CommissionAward>>;

    fn update_status(
        &self,
        commission_id: &str,
        status: CommissionStatus,
        at: Timestamp,
    ) -> CompResult<()>;

    /// Persist a batch and stamp its commissions with the batch id,
    /// atomically. Fails with ConcurrencyConflict when `(agent_id, period)`
    /// is already batched or any commission is already stamped.
    fn record_payout_batch(&self, batch: &PayoutBatch) -> CompResult<()>;

    fn payout_batches(&self, agent_id: &str) -> CompResult<Vec<PayoutBatch>>;
}

/// Notification delivery error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Fire-and-forget outbound notifications. Callers log failures and move on.
pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, agent_id: &str, event: &CompEvent) -> Result<(), NotifyError>;
}

/// Key/value cache with per-entry TTL and tag invalidation.
/// Best-effort: a miss is always a valid answer.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String, ttl_seconds: u64, tags: &[String]);
    fn invalidate_by_tag(&self, tag: &str);
}

/// Externally sourced service-quality figures.
pub trait QualitySource: Send + Sync {
    fn quality_metrics(&self, agent_id: &str, period: &PeriodRange) -> CompResult<QualityMetrics>;
}
