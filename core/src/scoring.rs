//! Lead and agent scoring primitives.
//!
//! Every function here is pure: the caller supplies "now", nothing
//! touches storage, and identical inputs give identical scores.
//! Scores are whole numbers in [0, 100].

use crate::{
    lead::{Lead, LeadStatus, Temperature, Urgency},
    types::{LeadId, Timestamp},
};
use serde::{Deserialize, Serialize};

const MAX_SCORE: f64 = 100.0;

fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, MAX_SCORE) as u8
}

/// Whole days elapsed from `then` to `now`; never negative.
pub fn days_between(then: Timestamp, now: Timestamp) -> i64 {
    (now - then).num_days().max(0)
}

fn urgency_weight(urgency: Urgency) -> f64 {
    match urgency {
        Urgency::Urgent => 30.0,
        Urgency::High   => 20.0,
        Urgency::Medium => 10.0,
        Urgency::Low    => 5.0,
    }
}

fn temperature_weight(temperature: Temperature) -> f64 {
    match temperature {
        Temperature::Hot  => 30.0,
        Temperature::Warm => 20.0,
        Temperature::Cold => 10.0,
    }
}

/// Prioritisation score for a lead.
///
/// value (max 50) + urgency + temperature + interactions (max 20)
/// + contact recency (20 points decaying one per day).
pub fn lead_score(lead: &Lead, now: Timestamp) -> u8 {
    let value_points = (lead.estimated_value / 1000.0).clamp(0.0, 50.0);
    let interaction_points = (f64::from(lead.interaction_count) * 2.0).min(20.0);
    // Never contacted: no recency credit.
    let recency_points = lead
        .last_contact_date
        .map(|last| (20 - days_between(last, now)).max(0) as f64)
        .unwrap_or(0.0);

    clamp_score(
        value_points
            + urgency_weight(lead.urgency)
            + temperature_weight(lead.temperature)
            + interaction_points
            + recency_points,
    )
}

fn status_base_probability(status: LeadStatus) -> f64 {
    match status {
        LeadStatus::New          => 0.10,
        LeadStatus::Contacted    => 0.15,
        LeadStatus::Qualified    => 0.30,
        LeadStatus::Negotiating  => 0.60,
        LeadStatus::ProposalSent => 0.70,
        LeadStatus::Won          => 1.0,
        LeadStatus::Lost         => 0.0,
        LeadStatus::Dormant      => 0.05,
    }
}

fn temperature_multiplier(temperature: Temperature) -> f64 {
    match temperature {
        Temperature::Hot  => 1.5,
        Temperature::Warm => 1.2,
        Temperature::Cold => 0.8,
    }
}

fn interaction_multiplier(interactions: u32) -> f64 {
    if interactions > 5 {
        1.3
    } else if interactions > 2 {
        1.1
    } else {
        1.0
    }
}

fn age_decay(age_days: i64) -> f64 {
    if age_days > 90 {
        0.5
    } else if age_days > 30 {
        0.8
    } else {
        1.0
    }
}

/// Estimated chance, in percent, that the lead converts.
pub fn conversion_probability(lead: &Lead, now: Timestamp) -> u8 {
    let probability = status_base_probability(lead.status)
        * temperature_multiplier(lead.temperature)
        * interaction_multiplier(lead.interaction_count)
        * age_decay(days_between(lead.assigned_at, now));
    clamp_score(probability * 100.0)
}

/// Inputs to the agent performance score. Each is on a 0-100 scale;
/// a missing input contributes nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceInputs {
    pub conversion_rate:  Option<f64>,
    pub experience_score: Option<f64>,
    pub network_score:    Option<f64>,
    pub last_active_at:   Option<Timestamp>,
}

fn component(value: Option<f64>) -> f64 {
    value
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, MAX_SCORE))
        .unwrap_or(0.0)
}

/// Weighted agent score: conversion 40%, experience 30%, network 20%,
/// recent activity 10%.
pub fn performance_score(inputs: &PerformanceInputs, now: Timestamp) -> u8 {
    let activity_score = inputs
        .last_active_at
        .map(|at| (MAX_SCORE - 5.0 * days_between(at, now) as f64).max(0.0))
        .unwrap_or(0.0);

    clamp_score(
        component(inputs.conversion_rate) * 0.4
            + component(inputs.experience_score) * 0.3
            + component(inputs.network_score) * 0.2
            + activity_score * 0.1,
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadPriority {
    pub lead_id:                LeadId,
    pub lead_score:             u8,
    pub conversion_probability: u8,
}

/// Score every lead and order them for follow-up: highest score first,
/// then highest probability, then lead id.
pub fn prioritize(leads: &[Lead], now: Timestamp) -> Vec<LeadPriority> {
    let mut priorities: Vec<LeadPriority> = leads
        .iter()
        .map(|lead| LeadPriority {
            lead_id:                lead.lead_id.clone(),
            lead_score:             lead_score(lead, now),
            conversion_probability: conversion_probability(lead, now),
        })
        .collect();

    priorities.sort_by(|a, b| {
        b.lead_score
            .cmp(&a.lead_score)
            .then(b.conversion_probability.cmp(&a.conversion_probability))
            .then_with(|| a.lead_id.cmp(&b.lead_id))
    });
    priorities
}
