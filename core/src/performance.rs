//! Per-agent performance metrics over a period.
//!
//! Metrics are derived, never authoritative. `aggregate` is a pure fold
//! over the leads and awards it is handed; the aggregator wraps it in a
//! TTL cache keyed by agent and period, tagged by agent so that a new
//! commission drops every cached view of that agent.
//!
//! Quality figures (satisfaction, retention, response time) come from an
//! external source and are passed in as-is.

use crate::{
    commission::{CommissionAward, CommissionStatus},
    config::CacheTtlConfig,
    error::{CompError, CompResult},
    lead::{Lead, LeadStatus},
    ports::Cache,
    tier::TierMetrics,
    types::{round_currency, AgentId, ParseLabelError, Timestamp},
};
use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::{str::FromStr, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily     => "daily",
            Self::Weekly    => "weekly",
            Self::Monthly   => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly    => "yearly",
        }
    }

    /// The calendar period containing `at`. Weeks start on Monday.
    pub fn range_containing(&self, at: Timestamp) -> PeriodRange {
        let date = at.date_naive();
        let (start, end) = match self {
            Self::Daily => (date, date + Duration::days(1)),
            Self::Weekly => {
                let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
                (monday, monday + Duration::days(7))
            }
            Self::Monthly => {
                let first = first_of_month(date.year(), date.month());
                (first, add_months(first, 1))
            }
            Self::Quarterly => {
                let first = first_of_month(date.year(), (date.month0() / 3) * 3 + 1);
                (first, add_months(first, 3))
            }
            Self::Yearly => {
                let first = first_of_month(date.year(), 1);
                (first, add_months(first, 12))
            }
        };
        PeriodRange {
            period_type: *self,
            start: midnight(start),
            end:   midnight(end),
        }
    }
}

impl FromStr for PeriodType {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily"     => Ok(Self::Daily),
            "weekly"    => Ok(Self::Weekly),
            "monthly"   => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly"    => Ok(Self::Yearly),
            other       => Err(ParseLabelError::new("period type", other)),
        }
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn add_months(first: NaiveDate, months: u32) -> NaiveDate {
    first
        .checked_add_months(chrono::Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

fn midnight(date: NaiveDate) -> Timestamp {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// Half-open `[start, end)` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRange {
    pub period_type: PeriodType,
    pub start:       Timestamp,
    pub end:         Timestamp,
}

impl PeriodRange {
    /// Explicit bounds default to the calendar period containing `now`.
    pub fn resolve(
        period_type: PeriodType,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
        now: Timestamp,
    ) -> CompResult<Self> {
        let current = period_type.range_containing(now);
        let range = Self {
            period_type,
            start: start.unwrap_or(current.start),
            end:   end.unwrap_or(current.end),
        };
        if range.start >= range.end {
            return Err(CompError::Validation(format!(
                "period start {} must be before end {}",
                range.start, range.end
            )));
        }
        Ok(range)
    }

    /// The window of equal length ending where this one starts.
    pub fn previous(&self) -> Self {
        let length = self.end - self.start;
        Self {
            period_type: self.period_type,
            start:       self.start - length,
            end:         self.start,
        }
    }

    pub fn contains(&self, at: Timestamp) -> bool {
        self.start <= at && at < self.end
    }

    fn cache_key(&self, agent_id: &str) -> String {
        format!(
            "performance:{agent_id}:{}:{}:{}",
            self.period_type.as_str(),
            self.start.timestamp(),
            self.end.timestamp()
        )
    }
}

/// Externally measured service quality for an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// 0-5 rating scale.
    pub customer_satisfaction:  f64,
    /// Percentage, 0-100.
    pub retention_rate:         f64,
    pub average_response_hours: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityMetrics {
    pub total_interactions:        u64,
    pub contacted_leads:           u32,
    pub avg_interactions_per_lead: f64,
    pub last_contact_at:           Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub agent_id:           AgentId,
    pub period:             PeriodRange,
    pub total_leads:        u32,
    pub converted_leads:    u32,
    pub lost_leads:         u32,
    /// Percent of period leads that were won.
    pub conversion_rate:    f64,
    pub total_revenue:      f64,
    pub total_commission:   f64,
    pub average_lead_value: f64,
    pub average_deal_size:  f64,
    pub activity:           ActivityMetrics,
    pub quality:            QualityMetrics,
}

impl PerformanceMetrics {
    pub fn tier_metrics(&self) -> TierMetrics {
        TierMetrics {
            monthly_revenue:       self.total_revenue,
            monthly_conversions:   self.converted_leads,
            customer_satisfaction: self.quality.customer_satisfaction,
            retention_rate:        self.quality.retention_rate,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Fold an agent's period leads and awards into metrics.
///
/// Leads count when assigned inside the period; awards count when
/// created inside it and not cancelled. Anything else is ignored, so
/// callers may pass a superset.
pub fn aggregate(
    agent_id: &str,
    period: &PeriodRange,
    leads: &[Lead],
    awards: &[CommissionAward],
    quality: QualityMetrics,
) -> PerformanceMetrics {
    let leads: Vec<&Lead> = leads
        .iter()
        .filter(|l| l.agent_id == agent_id && period.contains(l.assigned_at))
        .collect();
    let awards: Vec<&CommissionAward> = awards
        .iter()
        .filter(|a| {
            a.agent_id == agent_id
                && period.contains(a.created_at)
                && a.status != CommissionStatus::Cancelled
        })
        .collect();

    let total_leads = leads.len() as u32;
    let converted_leads = leads.iter().filter(|l| l.status == LeadStatus::Won).count() as u32;
    let lost_leads = leads.iter().filter(|l| l.status == LeadStatus::Lost).count() as u32;

    let total_revenue = round_currency(awards.iter().map(|a| a.base_amount).sum());
    let total_commission = round_currency(awards.iter().map(|a| a.total_amount).sum());
    let pipeline_value: f64 = leads.iter().map(|l| l.estimated_value).sum();

    let total_interactions: u64 = leads.iter().map(|l| u64::from(l.interaction_count)).sum();
    let activity = ActivityMetrics {
        total_interactions,
        contacted_leads: leads.iter().filter(|l| l.interaction_count > 0).count() as u32,
        avg_interactions_per_lead: round_currency(ratio(
            total_interactions as f64,
            f64::from(total_leads),
        )),
        last_contact_at: leads.iter().filter_map(|l| l.last_contact_date).max(),
    };

    PerformanceMetrics {
        agent_id: agent_id.to_string(),
        period: *period,
        total_leads,
        converted_leads,
        lost_leads,
        conversion_rate: round_currency(
            ratio(f64::from(converted_leads), f64::from(total_leads)) * 100.0,
        ),
        total_revenue,
        total_commission,
        average_lead_value: round_currency(ratio(pipeline_value, f64::from(total_leads))),
        average_deal_size: round_currency(ratio(total_revenue, awards.len() as f64)),
        activity,
        quality,
    }
}

pub fn agent_tag(agent_id: &str) -> String {
    format!("agent:{agent_id}")
}

/// Read-through cache in front of `aggregate`.
pub struct PerformanceAggregator {
    cache: Arc<dyn Cache>,
    ttl:   CacheTtlConfig,
}

impl PerformanceAggregator {
    pub fn new(cache: Arc<dyn Cache>, ttl: CacheTtlConfig) -> Self {
        Self { cache, ttl }
    }

    /// Return cached metrics for `(agent, period)` or compute and store them.
    /// Failed computations are not cached.
    pub fn metrics_for<F>(
        &self,
        agent_id: &str,
        period: &PeriodRange,
        compute: F,
    ) -> CompResult<PerformanceMetrics>
    where
        F: FnOnce() -> CompResult<PerformanceMetrics>,
    {
        let key = period.cache_key(agent_id);
        if let Some(cached) = self.cache.get(&key) {
            match serde_json::from_str::<PerformanceMetrics>(&cached) {
                Ok(metrics) => {
                    log::debug!("performance: cache hit {key}");
                    return Ok(metrics);
                }
                Err(e) => log::warn!("performance: discarding unreadable cache entry {key}: {e}"),
            }
        }

        let metrics = compute()?;
        let payload = serde_json::to_string(&metrics)?;
        self.cache.set(
            &key,
            payload,
            self.ttl.ttl_for(period.period_type),
            &[agent_tag(agent_id), "performance".to_string()],
        );
        log::debug!("performance: cached {key}");
        Ok(metrics)
    }

    /// Drop every cached view of one agent.
    pub fn invalidate_agent(&self, agent_id: &str) {
        self.cache.invalidate_by_tag(&agent_tag(agent_id));
    }
}
