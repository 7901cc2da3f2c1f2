//! Leaderboards built from live service data.

mod common;

use chrono::Duration;
use common::{at, Harness};
use referral_comp_core::{
    agent::AgentStatus,
    clock::Clock,
    commission::ConversionContext,
    job::{JobRunner, LeaderboardJob, PayoutJob},
    leaderboard::{LeaderboardEntry, LeaderboardMetric},
    performance::PeriodType,
    tier::Tier,
};

fn convert(h: &Harness, lead_id: &str, agent_id: &str, value: f64) {
    let assigned_at = h.clock.now() - Duration::days(3);
    h.add_won_lead(lead_id, agent_id, value, assigned_at);
    h.service
        .calculate_commission(lead_id, value, ConversionContext::default())
        .expect("commission");
}

fn seeded() -> Harness {
    let h = Harness::new(at(2026, 10, 15, 12));
    seed(&h);
    h
}

/// a, b in north; c in south; d suspended. October activity for a only.
fn seed(h: &Harness) {
    h.add_agent("a", "north", Tier::Bronze);
    h.add_agent("b", "north", Tier::Silver);
    h.add_agent("c", "south", Tier::Bronze);
    let mut d = h.add_agent("d", "south", Tier::Gold);
    d.status = AgentStatus::Suspended;
    h.store.upsert_agent(&d).unwrap();

    convert(h, "a-oct", "a", 10_000.0);

    h.clock.set(at(2026, 11, 20, 12));
    convert(h, "a-nov", "a", 5_000.0);
    convert(h, "b-nov", "b", 5_000.0);
    convert(h, "c-nov", "c", 8_000.0);
    convert(h, "d-nov", "d", 50_000.0);
}

fn ids(entries: &[LeaderboardEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.agent_id.as_str()).collect()
}

#[test]
fn revenue_board_orders_by_score_then_agent_id() {
    let h = seeded();
    let boards = h
        .service
        .generate_leaderboards(PeriodType::Monthly, LeaderboardMetric::Revenue, None)
        .unwrap();

    assert_eq!(ids(&boards.overall), vec!["c", "a", "b"]);
    let ranks: Vec<u32> = boards.overall.iter().map(|e| e.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
    assert_eq!(boards.overall[0].score, 8_000.0);

    assert_eq!(ids(&boards.by_tier[&Tier::Bronze]), vec!["c", "a"]);
    assert_eq!(ids(&boards.by_tier[&Tier::Silver]), vec!["b"]);
    assert!(!boards.by_tier.contains_key(&Tier::Gold), "suspended agents are not ranked");
    assert_eq!(ids(&boards.by_region["north"]), vec!["a", "b"]);
    assert_eq!(ids(&boards.by_region["south"]), vec!["c"]);
    assert!(boards.failures.is_empty());
}

#[test]
fn limit_bounds_the_overall_board() {
    let h = seeded();
    let boards = h
        .service
        .generate_leaderboards(PeriodType::Monthly, LeaderboardMetric::Revenue, Some(2))
        .unwrap();
    assert_eq!(ids(&boards.overall), vec!["c", "a"]);
    assert_eq!(ids(&boards.by_region["north"]), vec!["a", "b"]);
}

#[test]
fn growth_compares_against_the_previous_period() {
    let h = seeded();
    let boards = h
        .service
        .generate_leaderboards(PeriodType::Monthly, LeaderboardMetric::Growth, None)
        .unwrap();

    assert_eq!(ids(&boards.overall), vec!["b", "c", "a"]);
    let scores: Vec<f64> = boards.overall.iter().map(|e| e.score).collect();
    assert_eq!(scores, vec![100.0, 100.0, -50.0]);
}

#[test]
fn conversions_board_counts_won_leads_in_period() {
    let h = seeded();
    let boards = h
        .service
        .generate_leaderboards(PeriodType::Monthly, LeaderboardMetric::Conversions, None)
        .unwrap();
    assert!(boards.overall.iter().all(|e| e.score == 1.0));
    assert_eq!(ids(&boards.overall), vec!["a", "b", "c"]);
}

#[test]
fn boards_are_identical_for_identical_state() {
    let h = seeded();
    let first = h
        .service
        .generate_leaderboards(PeriodType::Weekly, LeaderboardMetric::Revenue, None)
        .unwrap();
    let second = h
        .service
        .generate_leaderboards(PeriodType::Weekly, LeaderboardMetric::Revenue, None)
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn one_agent_failing_does_not_sink_the_boards() {
    let h = Harness::with_broken_quality(at(2026, 10, 15, 12), "b");
    seed(&h);

    let boards = h
        .service
        .generate_leaderboards(PeriodType::Monthly, LeaderboardMetric::Revenue, None)
        .expect("partial boards");

    assert_eq!(ids(&boards.overall), vec!["c", "a"]);
    assert_eq!(ids(&boards.by_region["north"]), vec!["a"]);
    assert!(!boards.by_tier.contains_key(&Tier::Silver));
    assert_eq!(boards.failures.len(), 1);
    assert_eq!(boards.failures[0].agent_id, "b");
    assert!(boards.failures[0].reason.contains("quality feed timed out"), "{:?}", boards.failures);
}

#[test]
fn scheduled_run_uses_the_requested_board_settings() {
    let h = seeded();
    let runner = JobRunner::scheduled(
        PayoutJob { period: Some("2026-11-adhoc".into()) },
        LeaderboardJob { period_type: PeriodType::Monthly, metric: LeaderboardMetric::Growth, limit: Some(1) },
    );
    let reports = runner.run_all(&h.service);

    let names: Vec<&str> = reports.iter().map(|r| r.job.as_str()).collect();
    assert_eq!(names, vec!["tier_maintenance", "payouts", "leaderboards"]);
    assert_eq!(reports[2].processed, 1, "overall board capped at the requested limit");
}
