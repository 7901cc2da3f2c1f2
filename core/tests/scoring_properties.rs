//! Seeded sweeps over the pure calculators: bounds and ordering hold for
//! arbitrary inputs, and the same seed always sees the same results.

use chrono::{Duration, TimeZone, Utc};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use referral_comp_core::{
    commission::{AgentContext, CommissionCalculator, LeadContext},
    config::EngineConfig,
    lead::{Lead, LeadStatus, Temperature, Urgency},
    leaderboard::rank,
    scoring::{conversion_probability, lead_score, performance_score, prioritize, PerformanceInputs},
    tier::{Tier, TierCatalog, TierMetrics},
    types::Timestamp,
};

const SEED: u64 = 0x5EED_CAFE_F00D_0001;
const CASES: usize = 2_000;

fn now() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 11, 20, 12, 0, 0).unwrap()
}

fn random_lead(rng: &mut Pcg64Mcg, i: usize) -> Lead {
    let assigned_at = now() - Duration::days(rng.gen_range(0..400));
    let mut lead = Lead::new(&format!("lead-{i:05}"), "agent", rng.gen_range(-5_000.0..250_000.0), assigned_at);
    lead.status = LeadStatus::ALL[rng.gen_range(0..LeadStatus::ALL.len())];
    lead.temperature = [Temperature::Hot, Temperature::Warm, Temperature::Cold][rng.gen_range(0..3)];
    lead.urgency = [Urgency::Urgent, Urgency::High, Urgency::Medium, Urgency::Low][rng.gen_range(0..4)];
    lead.interaction_count = rng.gen_range(0..40);
    if rng.gen_bool(0.7) {
        lead.last_contact_date = Some(now() - Duration::hours(rng.gen_range(-48..2_000)));
    }
    lead
}

#[test]
fn lead_scores_stay_in_range() {
    let mut rng = Pcg64Mcg::seed_from_u64(SEED);
    for i in 0..CASES {
        let lead = random_lead(&mut rng, i);
        let score = lead_score(&lead, now());
        let probability = conversion_probability(&lead, now());
        assert!(score <= 100, "lead score {score} for {lead:?}");
        assert!(probability <= 100, "probability {probability} for {lead:?}");
    }
}

#[test]
fn performance_scores_stay_in_range() {
    let mut rng = Pcg64Mcg::seed_from_u64(SEED ^ 1);
    for _ in 0..CASES {
        let mut maybe = |lo: f64, hi: f64| rng.gen_bool(0.8).then(|| rng.gen_range(lo..hi));
        let inputs = PerformanceInputs {
            conversion_rate:  maybe(-20.0, 150.0),
            experience_score: maybe(-20.0, 150.0),
            network_score:    maybe(-20.0, 150.0),
            last_active_at:   Some(now() - Duration::days(30)),
        };
        assert!(performance_score(&inputs, now()) <= 100, "{inputs:?}");
    }
}

#[test]
fn prioritised_order_is_total_and_repeatable() {
    let mut rng = Pcg64Mcg::seed_from_u64(SEED ^ 2);
    let leads: Vec<Lead> = (0..300).map(|i| random_lead(&mut rng, i)).collect();

    let ordered = prioritize(&leads, now());
    assert_eq!(ordered.len(), leads.len());
    for pair in ordered.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let key_a = (std::cmp::Reverse(a.lead_score), std::cmp::Reverse(a.conversion_probability), &a.lead_id);
        let key_b = (std::cmp::Reverse(b.lead_score), std::cmp::Reverse(b.conversion_probability), &b.lead_id);
        assert!(key_a < key_b, "{a:?} should precede {b:?}");
    }

    let mut reversed = leads.clone();
    reversed.reverse();
    assert_eq!(prioritize(&reversed, now()), ordered);
}

#[test]
fn commission_totals_are_never_negative_and_rounded_to_cents() {
    let config = EngineConfig::default_test();
    let calculator = CommissionCalculator::new(config.tiers.clone(), &config.rules, &config.payout);
    let mut rng = Pcg64Mcg::seed_from_u64(SEED ^ 3);

    for i in 0..CASES {
        let value = rng.gen_range(0.0..80_000.0);
        let lead = LeadContext {
            lead_id:               format!("lead-{i}"),
            days_to_convert:       rng.gen_range(0..90),
            follow_up_delay_hours: rng.gen_range(0.0..120.0),
        };
        let agent = AgentContext {
            agent_id:               "agent".into(),
            tier:                   Tier::ALL[rng.gen_range(0..Tier::ALL.len())],
            historical_award_count: rng.gen_range(0..3),
        };
        let award = calculator.calculate(value, &lead, &agent, now()).unwrap();
        assert!(award.total_amount >= 0.0, "{award:?}");
        let cents = award.total_amount * 100.0;
        assert!((cents - cents.round()).abs() < 1e-6, "unrounded total {}", award.total_amount);
    }
}

#[test]
fn tier_evaluation_never_demotes() {
    let catalog = TierCatalog::standard();
    let mut rng = Pcg64Mcg::seed_from_u64(SEED ^ 4);
    for _ in 0..CASES {
        let metrics = TierMetrics {
            monthly_revenue:       rng.gen_range(0.0..80_000.0),
            monthly_conversions:   rng.gen_range(0..30),
            customer_satisfaction: rng.gen_range(0.0..5.0),
            retention_rate:        rng.gen_range(0.0..100.0),
        };
        let current = Tier::ALL[rng.gen_range(0..Tier::ALL.len())];
        let next = catalog.evaluate_upgrade(&metrics, current);
        assert!(next >= current, "{current:?} -> {next:?} for {metrics:?}");
    }
}

#[test]
fn ranking_is_a_strict_total_order() {
    let mut rng = Pcg64Mcg::seed_from_u64(SEED ^ 5);
    let scores: Vec<(String, f64)> = (0..500)
        .map(|i| {
            // Coarse scores so ties are common.
            let score = if rng.gen_bool(0.05) { f64::NAN } else { f64::from(rng.gen_range(0..20)) * 50.0 };
            (format!("agent-{i:03}"), score)
        })
        .collect();

    let entries = rank(&scores, usize::MAX);
    assert_eq!(entries.len(), scores.len());
    for (i, pair) in entries.windows(2).enumerate() {
        assert_eq!(pair[0].rank as usize, i + 1);
        assert!(
            pair[0].score > pair[1].score
                || (pair[0].score == pair[1].score && pair[0].agent_id < pair[1].agent_id),
            "{:?} before {:?}",
            pair[0],
            pair[1]
        );
    }
}
