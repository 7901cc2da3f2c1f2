use crate::{
    performance::PeriodType,
    tier::{TierCatalog, TierDefinition},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
struct TierCatalogFile {
    tiers: Vec<TierDefinition>,
}

/// Thresholds for the standard bonus and penalty rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionRulesConfig {
    /// Conversions within this many days earn the fast-conversion bonus.
    pub fast_conversion_days:    i64,
    /// Percent of the transaction value.
    pub fast_conversion_percent: f64,
    pub high_value_threshold:    f64,
    /// Percent of the transaction value.
    pub high_value_percent:      f64,
    /// Flat amount for an agent's first award.
    pub first_conversion_bonus:  f64,
    /// Follow-ups slower than this are penalised.
    pub late_follow_up_hours:    f64,
    pub late_follow_up_penalty:  f64,
}

impl Default for CommissionRulesConfig {
    fn default() -> Self {
        Self {
            fast_conversion_days:    7,
            fast_conversion_percent: 2.0,
            high_value_threshold:    10_000.0,
            high_value_percent:      1.0,
            first_conversion_bonus:  100.0,
            late_follow_up_hours:    48.0,
            late_follow_up_penalty:  50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutConfig {
    /// Processing fee, percent of the batch gross.
    pub fee_percent: f64,
    /// Upper bound on the processing fee.
    pub fee_cap:     f64,
    /// Day of the month after conversion on which an award becomes payable.
    /// Must exist in every month (1-28).
    pub payout_day:  u32,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            fee_percent: 3.0,
            fee_cap:     25.0,
            payout_day:  15,
        }
    }
}

/// Cache lifetime of computed performance metrics, per period granularity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheTtlConfig {
    pub daily_seconds:     u64,
    pub weekly_seconds:    u64,
    pub monthly_seconds:   u64,
    pub quarterly_seconds: u64,
    pub yearly_seconds:    u64,
}

impl CacheTtlConfig {
    pub fn ttl_for(&self, period: PeriodType) -> u64 {
        match period {
            PeriodType::Daily     => self.daily_seconds,
            PeriodType::Weekly    => self.weekly_seconds,
            PeriodType::Monthly   => self.monthly_seconds,
            PeriodType::Quarterly => self.quarterly_seconds,
            PeriodType::Yearly    => self.yearly_seconds,
        }
    }
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            daily_seconds:     3_600,
            weekly_seconds:    7_200,
            monthly_seconds:   14_400,
            quarterly_seconds: 43_200,
            yearly_seconds:    86_400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    pub default_limit: usize,
    pub tier_limit:    usize,
    pub region_limit:  usize,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            default_limit: 50,
            tier_limit:    20,
            region_limit:  20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub tiers:       Arc<TierCatalog>,
    pub rules:       CommissionRulesConfig,
    pub payout:      PayoutConfig,
    pub cache:       CacheTtlConfig,
    pub leaderboard: LeaderboardConfig,
}

impl EngineConfig {
    /// Load from the data/ directory.
    /// In tests, use EngineConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let tier_path = format!("{data_dir}/tiers/tier_catalog.json");
        let tier_content = std::fs::read_to_string(&tier_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {tier_path}: {e}"))?;
        let tier_file: TierCatalogFile = serde_json::from_str(&tier_content)?;
        let tiers = TierCatalog::new(tier_file.tiers)
            .map_err(|e| anyhow::anyhow!("Invalid {tier_path}: {e}"))?;

        let rules_path = format!("{data_dir}/commission/commission_rules.json");
        let rules_content = std::fs::read_to_string(&rules_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {rules_path}: {e}"))?;
        let rules: CommissionRulesConfig = serde_json::from_str(&rules_content)?;

        let payout_path = format!("{data_dir}/payout/payout_config.json");
        let payout_content = std::fs::read_to_string(&payout_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {payout_path}: {e}"))?;
        let payout: PayoutConfig = serde_json::from_str(&payout_content)?;
        if !(1..=28).contains(&payout.payout_day) {
            anyhow::bail!("Invalid {payout_path}: payout_day {} must be 1-28", payout.payout_day);
        }
        if payout.fee_percent < 0.0 || payout.fee_cap < 0.0 {
            anyhow::bail!("Invalid {payout_path}: fees must be non-negative");
        }

        Ok(Self {
            tiers: Arc::new(tiers),
            rules,
            payout,
            cache: CacheTtlConfig::default(),
            leaderboard: LeaderboardConfig::default(),
        })
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        Self {
            tiers:       Arc::new(TierCatalog::standard()),
            rules:       CommissionRulesConfig::default(),
            payout:      PayoutConfig::default(),
            cache:       CacheTtlConfig::default(),
            leaderboard: LeaderboardConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_shipped_data_directory() {
        let data_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../data");
        let config = EngineConfig::load(data_dir).expect("load data/");
        assert_eq!(*config.tiers, TierCatalog::standard());
        assert_eq!(config.rules, CommissionRulesConfig::default());
        assert_eq!(config.payout, PayoutConfig::default());
    }

    #[test]
    fn missing_directory_reports_the_path() {
        let err = EngineConfig::load("/nonexistent/comp-data").unwrap_err();
        assert!(err.to_string().contains("tier_catalog.json"));
    }

    #[test]
    fn ttl_grows_with_period_length() {
        let ttl = CacheTtlConfig::default();
        assert_eq!(ttl.ttl_for(PeriodType::Daily), 3_600);
        assert_eq!(ttl.ttl_for(PeriodType::Monthly), 14_400);
        assert_eq!(ttl.ttl_for(PeriodType::Yearly), 86_400);
    }
}
