//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use referral_comp_core::{
    agent::Agent,
    clock::FixedClock,
    config::EngineConfig,
    error::{CompError, CompResult},
    lead::{Lead, LeadStatus},
    performance::{PeriodRange, QualityMetrics},
    ports::QualitySource,
    service::{CompensationService, Ports},
    store::SqliteStore,
    tier::Tier,
};
use std::sync::Arc;

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

/// Quality feed backed by the store, except one agent whose lookups fail.
pub struct FlakyQuality {
    pub store:  Arc<SqliteStore>,
    pub broken: &'static str,
}

impl QualitySource for FlakyQuality {
    fn quality_metrics(&self, agent_id: &str, period: &PeriodRange) -> CompResult<QualityMetrics> {
        if agent_id == self.broken {
            return Err(CompError::Other(anyhow::anyhow!("quality feed timed out for {agent_id}")));
        }
        self.store.quality_metrics(agent_id, period)
    }
}

pub struct Harness {
    pub store:   Arc<SqliteStore>,
    pub clock:   Arc<FixedClock>,
    pub service: CompensationService,
}

impl Harness {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::build(now, None)
    }

    /// Like `new`, but quality lookups for `broken_agent` fail.
    pub fn with_broken_quality(now: DateTime<Utc>, broken_agent: &'static str) -> Self {
        Self::build(now, Some(broken_agent))
    }

    fn build(now: DateTime<Utc>, broken_agent: Option<&'static str>) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let store = Arc::new(SqliteStore::in_memory().expect("in-memory store"));
        store.migrate().expect("migration");
        let clock = Arc::new(FixedClock::new(now));
        let mut ports = Ports::sqlite(store.clone(), clock.clone());
        if let Some(broken) = broken_agent {
            ports.quality = Arc::new(FlakyQuality { store: store.clone(), broken });
        }
        let service = CompensationService::new(ports, &EngineConfig::default_test());
        Self { store, clock, service }
    }

    pub fn add_agent(&self, agent_id: &str, region: &str, tier: Tier) -> Agent {
        let mut agent = Agent::new(agent_id, &format!("Agent {agent_id}"), region, at(2025, 1, 6, 9));
        agent.tier = tier;
        self.store.upsert_agent(&agent).expect("insert agent");
        agent
    }

    /// A won lead assigned at `assigned_at`, ready for a commission.
    pub fn add_won_lead(&self, lead_id: &str, agent_id: &str, value: f64, assigned_at: DateTime<Utc>) -> Lead {
        let mut lead = Lead::new(lead_id, agent_id, value, assigned_at);
        lead.status = LeadStatus::Won;
        lead.close_date = Some(assigned_at);
        self.store.upsert_lead(&lead).expect("insert lead");
        lead
    }

    pub fn add_lead(&self, lead: &Lead) {
        self.store.upsert_lead(lead).expect("insert lead");
    }
}
