//! Referral agent records and the patch shape accepted by the agent store.

use crate::{
    tier::Tier,
    types::{AgentId, ParseLabelError, Timestamp},
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Suspended,
    Inactive,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active    => "active",
            Self::Suspended => "suspended",
            Self::Inactive  => "inactive",
        }
    }
}

impl FromStr for AgentStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active"    => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "inactive"  => Ok(Self::Inactive),
            other       => Err(ParseLabelError::new("agent status", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id:          AgentId,
    pub name:              String,
    pub region:            String,
    pub tier:              Tier,
    pub tier_points:       i64,
    pub status:            AgentStatus,
    pub joined_at:         Timestamp,
    pub last_active_at:    Option<Timestamp>,
    /// Externally supplied 0-100 experience rating.
    pub experience_score:  Option<f64>,
    /// Externally supplied 0-100 network reach rating.
    pub network_score:     Option<f64>,
    pub total_revenue:     f64,
    pub total_commission:  f64,
    pub total_conversions: i64,
}

impl Agent {
    /// A freshly onboarded bronze agent with zeroed cumulative metrics.
    pub fn new(agent_id: &str, name: &str, region: &str, joined_at: Timestamp) -> Self {
        Self {
            agent_id:          agent_id.to_string(),
            name:              name.to_string(),
            region:            region.to_string(),
            tier:              Tier::Bronze,
            tier_points:       0,
            status:            AgentStatus::Active,
            joined_at,
            last_active_at:    None,
            experience_score:  None,
            network_score:     None,
            total_revenue:     0.0,
            total_commission:  0.0,
            total_conversions: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }
}

/// Partial update applied by `AgentStore::update`. `None` leaves a field untouched.
/// Cumulative figures are never patched; they only grow through `AgentCredit`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentPatch {
    pub tier:           Option<Tier>,
    pub status:         Option<AgentStatus>,
    pub last_active_at: Option<Timestamp>,
}

impl AgentPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Increments applied to an agent's cumulative figures when an award is
/// recorded. Applied relative to the stored values, never as absolutes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentCredit {
    pub revenue:     f64,
    pub commission:  f64,
    pub tier_points: i64,
    pub conversions: i64,
    pub active_at:   Timestamp,
}

/// Filter for `AgentStore::find_active`.
#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    pub agent_ids: Option<Vec<AgentId>>,
    pub tier:      Option<Tier>,
    pub region:    Option<String>,
}

impl AgentFilter {
    pub fn matches(&self, agent: &Agent) -> bool {
        if let Some(ids) = &self.agent_ids {
            if !ids.iter().any(|id| id == &agent.agent_id) {
                return false;
            }
        }
        if let Some(tier) = self.tier {
            if agent.tier != tier {
                return false;
            }
        }
        if let Some(region) = &self.region {
            if &agent.region != region {
                return false;
            }
        }
        true
    }
}
