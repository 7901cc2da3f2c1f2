//! Referral-program compensation core.
//!
//! Pure calculators (scoring, tier, commission, payout, leaderboard) sit
//! under a service layer that reaches storage, caching and notifications
//! through the traits in `ports`.

pub mod agent;
pub mod cache;
pub mod clock;
pub mod commission;
pub mod config;
pub mod error;
pub mod event;
pub mod job;
pub mod lead;
pub mod leaderboard;
pub mod payout;
pub mod performance;
pub mod ports;
pub mod scoring;
pub mod service;
pub mod store;
pub mod tier;
pub mod types;
