//! Payout batching against the SQLite ledger, including overlapping runs.

mod common;

use common::{at, Harness};
use referral_comp_core::{
    commission::{CommissionFilter, CommissionStatus, ConversionContext},
    error::CompError,
    job::{JobRunner, PayoutJob},
    ports::CommissionLedger,
    tier::Tier,
};

fn slow() -> ConversionContext {
    ConversionContext { days_to_convert: Some(20), follow_up_delay_hours: Some(1.0) }
}

/// Two agents with awards created on 2026-11-10, payable from 2026-12-15.
fn seeded() -> Harness {
    let h = Harness::new(at(2026, 11, 10, 12));
    h.add_agent("agent-a", "north", Tier::Bronze);
    h.add_agent("agent-b", "south", Tier::Bronze);
    h.add_won_lead("a-1", "agent-a", 4_000.0, at(2026, 10, 1, 9));
    h.add_won_lead("a-2", "agent-a", 6_000.0, at(2026, 10, 2, 9));
    h.add_won_lead("b-1", "agent-b", 2_000.0, at(2026, 10, 3, 9));
    for (lead, value) in [("a-1", 4_000.0), ("a-2", 6_000.0), ("b-1", 2_000.0)] {
        h.service.calculate_commission(lead, value, slow()).expect("commission");
    }
    h
}

#[test]
fn nothing_is_paid_before_the_payout_date() {
    let h = seeded();
    h.clock.set(at(2026, 12, 14, 23));
    let run = h.service.process_commission_payouts("2026-12", None).unwrap();
    assert!(run.batches.is_empty());
    assert!(run.skipped.is_empty());
}

#[test]
fn one_batch_per_agent_net_of_processing_fee() {
    let h = seeded();
    h.clock.set(at(2026, 12, 16, 6));
    let run = h.service.process_commission_payouts("2026-12", None).unwrap();

    assert_eq!(run.batches.len(), 2);
    let a = &run.batches[0];
    assert_eq!(a.agent_id, "agent-a");
    // 300 (first award) + 300
    assert_eq!(a.gross_amount, 600.0);
    assert_eq!(a.fee_total, 18.0);
    assert_eq!(a.net_amount, 582.0);
    assert_eq!(a.commission_ids.len(), 2);

    let b = &run.batches[1];
    assert_eq!(b.agent_id, "agent-b");
    assert_eq!(b.gross_amount, 200.0);
    assert_eq!(b.fee_total, 6.0);
    assert_eq!(b.net_amount, 194.0);
    assert_eq!(run.total_net(), 776.0);

    let stamped = CommissionLedger::find(&*h.store, &CommissionFilter::for_agent("agent-a")).unwrap();
    assert!(stamped.iter().all(|c| c.batch_id.as_deref() == Some(a.batch_id.as_str())));
    assert_eq!(h.store.payout_batches("agent-a").unwrap(), vec![a.clone()]);
}

#[test]
fn rerunning_a_period_pays_nothing_twice() {
    let h = seeded();
    h.clock.set(at(2026, 12, 16, 6));
    let first = h.service.process_commission_payouts("2026-12", None).unwrap();
    let second = h.service.process_commission_payouts("2026-12", None).unwrap();

    assert_eq!(first.batches.len(), 2);
    assert!(second.batches.is_empty());
    assert!(second.skipped.is_empty());
}

#[test]
fn an_agent_already_batched_for_the_period_is_skipped_not_failed() {
    let h = seeded();
    h.clock.set(at(2026, 12, 16, 6));
    h.service.process_commission_payouts("2026-12", None).unwrap();

    // A late award for agent-a that is already due when the clock moves on.
    h.add_won_lead("a-3", "agent-a", 1_000.0, at(2026, 11, 20, 9));
    h.clock.set(at(2026, 12, 17, 6));
    let late = h.service.calculate_commission("a-3", 1_000.0, slow()).unwrap();
    h.clock.set(at(2027, 1, 16, 6));

    let run = h.service.process_commission_payouts("2026-12", None).unwrap();
    assert!(run.batches.is_empty());
    assert_eq!(run.skipped.len(), 1);
    assert_eq!(run.skipped[0].agent_id, "agent-a");

    let untouched = CommissionLedger::get(&*h.store, &late.commission_id).unwrap().unwrap();
    assert_eq!(untouched.batch_id, None);

    // The next period picks it up.
    let next = h.service.process_commission_payouts("2027-01", None).unwrap();
    assert_eq!(next.batches.len(), 1);
    assert_eq!(next.batches[0].commission_ids, vec![late.commission_id]);
}

#[test]
fn concurrent_runs_batch_each_commission_once() {
    let h = seeded();
    h.clock.set(at(2026, 12, 16, 6));

    let runs = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| h.service.process_commission_payouts("2026-12", None)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("payout thread"))
            .collect::<Vec<_>>()
    });

    let mut batched_agents: Vec<String> = runs
        .iter()
        .flat_map(|run| run.as_ref().unwrap().batches.iter().map(|b| b.agent_id.clone()))
        .collect();
    batched_agents.sort();
    assert_eq!(batched_agents, vec!["agent-a", "agent-b"]);

    assert_eq!(h.store.payout_batches("agent-a").unwrap().len(), 1);
    assert_eq!(h.store.payout_batches("agent-b").unwrap().len(), 1);
}

#[test]
fn agent_subset_and_status_filters_apply() {
    let h = seeded();
    let b_award = CommissionLedger::find(&*h.store, &CommissionFilter::for_agent("agent-b"))
        .unwrap()
        .remove(0);
    h.service
        .transition_commission(&b_award.commission_id, CommissionStatus::Disputed)
        .unwrap();
    h.clock.set(at(2026, 12, 16, 6));

    let only_b = h
        .service
        .process_commission_payouts("2026-12", Some(&["agent-b".to_string()][..]))
        .unwrap();
    assert!(only_b.batches.is_empty(), "disputed awards are not payable");

    let only_a = h
        .service
        .process_commission_payouts("2026-12", Some(&["agent-a".to_string()][..]))
        .unwrap();
    assert_eq!(only_a.batches.len(), 1);
    assert_eq!(only_a.batches[0].agent_id, "agent-a");
}

#[test]
fn empty_period_label_is_rejected() {
    let h = seeded();
    let err = h.service.process_commission_payouts("  ", None).unwrap_err();
    assert!(matches!(err, CompError::Validation(_)));
}

#[test]
fn payout_job_labels_the_current_month() {
    let h = seeded();
    h.clock.set(at(2026, 12, 16, 6));

    let mut runner = JobRunner::new();
    runner.register(Box::new(PayoutJob::default()));
    let reports = runner.run_all(&h.service);

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].job, "payouts");
    assert_eq!(reports[0].changed, 2);
    let batches = h.store.payout_batches("agent-b").unwrap();
    assert_eq!(batches[0].period, "2026-12");

    let events = h.store.events_for_agent("agent-b").unwrap();
    assert_eq!(events.last().map(|e| e.event_type.as_str()), Some("payout_batched"));
}
