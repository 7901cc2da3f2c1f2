//! Leaderboard ranking.
//!
//! Scores are computed per agent elsewhere; this module only orders
//! them. Ordering is score descending, then agent id ascending, so the
//! output is a total order and identical input always ranks identically.

use crate::{
    config::LeaderboardConfig,
    performance::PerformanceMetrics,
    tier::Tier,
    types::{round_currency, AgentFailure, AgentId, ParseLabelError},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardMetric {
    Revenue,
    Conversions,
    Satisfaction,
    Growth,
}

impl LeaderboardMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Revenue      => "revenue",
            Self::Conversions  => "conversions",
            Self::Satisfaction => "satisfaction",
            Self::Growth       => "growth",
        }
    }

    /// Only growth looks at the preceding period.
    pub fn needs_previous_period(&self) -> bool {
        matches!(self, Self::Growth)
    }

    pub fn score(&self, current: &PerformanceMetrics, previous: Option<&PerformanceMetrics>) -> f64 {
        match self {
            Self::Revenue      => current.total_revenue,
            Self::Conversions  => f64::from(current.converted_leads),
            Self::Satisfaction => current.quality.customer_satisfaction,
            Self::Growth => {
                let before = previous.map(|p| p.total_revenue).unwrap_or(0.0);
                growth_percent(before, current.total_revenue)
            }
        }
    }
}

impl FromStr for LeaderboardMetric {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "revenue"      => Ok(Self::Revenue),
            "conversions"  => Ok(Self::Conversions),
            "satisfaction" => Ok(Self::Satisfaction),
            "growth"       => Ok(Self::Growth),
            other          => Err(ParseLabelError::new("leaderboard metric", other)),
        }
    }
}

/// Percent change from `before` to `after`. From nothing to something
/// counts as 100; nothing to nothing as 0.
pub fn growth_percent(before: f64, after: f64) -> f64 {
    if before > 0.0 {
        round_currency((after - before) / before * 100.0)
    } else if after > 0.0 {
        100.0
    } else {
        0.0
    }
}

/// An agent's score plus the attributes boards are split by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentScore {
    pub agent_id: AgentId,
    pub tier:     Tier,
    pub region:   String,
    pub score:    f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub agent_id: AgentId,
    pub score:    f64,
    /// 1-based.
    pub rank:     u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboards {
    pub metric:    LeaderboardMetric,
    pub overall:   Vec<LeaderboardEntry>,
    pub by_tier:   BTreeMap<Tier, Vec<LeaderboardEntry>>,
    pub by_region: BTreeMap<String, Vec<LeaderboardEntry>>,
    /// Agents whose metrics could not be computed.
    pub failures:  Vec<AgentFailure>,
}

/// Order `(agent, score)` pairs and keep the first `limit`.
/// NaN counts as 0 and -0.0 as 0.0, so equal displayed scores fall back to
/// the agent id. Negative scores (shrinking growth) rank below zero.
pub fn rank(scores: &[(AgentId, f64)], limit: usize) -> Vec<LeaderboardEntry> {
    let mut ordered: Vec<(&AgentId, f64)> = scores
        .iter()
        .map(|(id, score)| (id, if score.is_nan() { 0.0 } else { *score + 0.0 }))
        .collect();
    ordered.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    ordered
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(position, (agent_id, score))| LeaderboardEntry {
            agent_id: agent_id.clone(),
            score,
            rank: position as u32 + 1,
        })
        .collect()
}

fn pairs<F>(scores: &[AgentScore], include: F) -> Vec<(AgentId, f64)>
where
    F: Fn(&AgentScore) -> bool,
{
    scores
        .iter()
        .filter(|s| include(s))
        .map(|s| (s.agent_id.clone(), s.score))
        .collect()
}

pub struct LeaderboardRanker {
    config: LeaderboardConfig,
}

impl LeaderboardRanker {
    pub fn new(config: LeaderboardConfig) -> Self {
        Self { config }
    }

    pub fn default_limit(&self) -> usize {
        self.config.default_limit
    }

    /// Overall top-`limit`, plus per-tier and per-region boards at their
    /// configured sizes.
    pub fn build(
        &self,
        metric: LeaderboardMetric,
        scores: &[AgentScore],
        limit: usize,
        failures: Vec<AgentFailure>,
    ) -> Leaderboards {
        let overall = rank(&pairs(scores, |_| true), limit);

        let mut by_tier = BTreeMap::new();
        for tier in Tier::ALL {
            let members = pairs(scores, |s| s.tier == tier);
            if !members.is_empty() {
                by_tier.insert(tier, rank(&members, self.config.tier_limit));
            }
        }

        let mut by_region = BTreeMap::new();
        let mut regions: Vec<&String> = scores.iter().map(|s| &s.region).collect();
        regions.sort();
        regions.dedup();
        for region in regions {
            let members = pairs(scores, |s| &s.region == region);
            by_region.insert(region.clone(), rank(&members, self.config.region_limit));
        }

        Leaderboards { metric, overall, by_tier, by_region, failures }
    }
}
