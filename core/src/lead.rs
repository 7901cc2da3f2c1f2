//! Leads tracked through an agent's sales pipeline.

use crate::types::{AgentId, LeadId, ParseLabelError, Timestamp};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Negotiating,
    ProposalSent,
    Won,
    Lost,
    Dormant,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 8] = [
        Self::New,
        Self::Contacted,
        Self::Qualified,
        Self::Negotiating,
        Self::ProposalSent,
        Self::Won,
        Self::Lost,
        Self::Dormant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New          => "new",
            Self::Contacted    => "contacted",
            Self::Qualified    => "qualified",
            Self::Negotiating  => "negotiating",
            Self::ProposalSent => "proposal_sent",
            Self::Won          => "won",
            Self::Lost         => "lost",
            Self::Dormant      => "dormant",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Won | Self::Lost | Self::Dormant)
    }
}

impl FromStr for LeadStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseLabelError::new("lead status", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Temperature {
    Hot,
    Warm,
    Cold,
}

impl Temperature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot  => "hot",
            Self::Warm => "warm",
            Self::Cold => "cold",
        }
    }
}

impl FromStr for Temperature {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hot"  => Ok(Self::Hot),
            "warm" => Ok(Self::Warm),
            "cold" => Ok(Self::Cold),
            other  => Err(ParseLabelError::new("lead temperature", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Urgent,
    High,
    Medium,
    Low,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High   => "high",
            Self::Medium => "medium",
            Self::Low    => "low",
        }
    }
}

impl FromStr for Urgency {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "urgent" => Ok(Self::Urgent),
            "high"   => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low"    => Ok(Self::Low),
            other    => Err(ParseLabelError::new("lead urgency", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub lead_id:           LeadId,
    pub agent_id:          AgentId,
    pub status:            LeadStatus,
    pub temperature:       Temperature,
    pub urgency:           Urgency,
    pub estimated_value:   f64,
    pub interaction_count: u32,
    pub last_contact_date: Option<Timestamp>,
    pub assigned_at:       Timestamp,
    pub close_date:        Option<Timestamp>,
}

impl Lead {
    /// A new, cold, low-urgency lead with no interactions yet.
    pub fn new(lead_id: &str, agent_id: &str, estimated_value: f64, assigned_at: Timestamp) -> Self {
        Self {
            lead_id:           lead_id.to_string(),
            agent_id:          agent_id.to_string(),
            status:            LeadStatus::New,
            temperature:       Temperature::Cold,
            urgency:           Urgency::Low,
            estimated_value,
            interaction_count: 0,
            last_contact_date: None,
            assigned_at,
            close_date:        None,
        }
    }
}

/// Filter for `LeadStore::find` and `LeadStore::count_by_agent`.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub agent_id:      Option<AgentId>,
    pub statuses:      Option<Vec<LeadStatus>>,
    /// Inclusive lower bound on `assigned_at`.
    pub assigned_from: Option<Timestamp>,
    /// Exclusive upper bound on `assigned_at`.
    pub assigned_to:   Option<Timestamp>,
}

impl LeadFilter {
    pub fn for_agent(agent_id: &str) -> Self {
        Self { agent_id: Some(agent_id.to_string()), ..Self::default() }
    }

    pub fn with_statuses(mut self, statuses: &[LeadStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn assigned_between(mut self, from: Timestamp, to: Timestamp) -> Self {
        self.assigned_from = Some(from);
        self.assigned_to = Some(to);
        self
    }

    pub fn matches(&self, lead: &Lead) -> bool {
        if let Some(agent_id) = &self.agent_id {
            if &lead.agent_id != agent_id {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&lead.status) {
                return false;
            }
        }
        if let Some(from) = self.assigned_from {
            if lead.assigned_at < from {
                return false;
            }
        }
        if let Some(to) = self.assigned_to {
            if lead.assigned_at >= to {
                return false;
            }
        }
        true
    }
}
