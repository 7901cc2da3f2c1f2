//! Tier catalog: commission rate, multiplier and promotion thresholds
//! for each performance bracket.
//!
//! RULE: The catalog is immutable once built. It is constructed from
//! configuration at startup and shared by reference; nothing mutates it.
//!
//! Promotion scans from the highest tier downwards and stops at the first
//! tier whose every threshold is met, so an agent can jump several tiers
//! at once. There is no downgrade path.

use crate::{
    error::{CompError, CompResult},
    types::ParseLabelError,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    /// Lowest to highest.
    pub const ALL: [Tier; 4] = [Self::Bronze, Self::Silver, Self::Gold, Self::Platinum];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bronze   => "bronze",
            Self::Silver   => "silver",
            Self::Gold     => "gold",
            Self::Platinum => "platinum",
        }
    }
}

impl FromStr for Tier {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bronze"   => Ok(Self::Bronze),
            "silver"   => Ok(Self::Silver),
            "gold"     => Ok(Self::Gold),
            "platinum" => Ok(Self::Platinum),
            other      => Err(ParseLabelError::new("tier", other)),
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TierRequirements {
    pub monthly_revenue:       f64,
    pub monthly_conversions:   u32,
    /// 0-5 rating scale.
    pub customer_satisfaction: f64,
    /// Percentage, 0-100.
    pub retention_rate:        f64,
}

impl TierRequirements {
    pub fn met_by(&self, metrics: &TierMetrics) -> bool {
        metrics.monthly_revenue >= self.monthly_revenue
            && metrics.monthly_conversions >= self.monthly_conversions
            && metrics.customer_satisfaction >= self.customer_satisfaction
            && metrics.retention_rate >= self.retention_rate
    }

    fn dominates(&self, lower: &TierRequirements) -> bool {
        self.monthly_revenue >= lower.monthly_revenue
            && self.monthly_conversions >= lower.monthly_conversions
            && self.customer_satisfaction >= lower.customer_satisfaction
            && self.retention_rate >= lower.retention_rate
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierDefinition {
    pub tier:             Tier,
    pub label:            String,
    /// Percentage of the transaction value, e.g. 10.0 for 10%.
    pub base_rate:        f64,
    pub bonus_multiplier: f64,
    pub requirements:     TierRequirements,
}

/// Monthly figures the catalog evaluates promotion against.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TierMetrics {
    pub monthly_revenue:       f64,
    pub monthly_conversions:   u32,
    pub customer_satisfaction: f64,
    pub retention_rate:        f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TierCatalog {
    /// Sorted lowest to highest, one entry per tier.
    tiers: Vec<TierDefinition>,
}

impl TierCatalog {
    /// Build and validate a catalog. Every tier must appear exactly once,
    /// rates must be in (0, 100], multipliers positive, and requirements
    /// must not decrease from one tier to the next.
    pub fn new(mut tiers: Vec<TierDefinition>) -> CompResult<Self> {
        tiers.sort_by_key(|d| d.tier);

        for (expected, def) in Tier::ALL.iter().zip(tiers.iter()) {
            if def.tier != *expected {
                return Err(CompError::Configuration(format!(
                    "tier catalog is missing '{expected}' or lists '{}' twice",
                    def.tier
                )));
            }
        }
        if tiers.len() != Tier::ALL.len() {
            return Err(CompError::Configuration(format!(
                "tier catalog must define {} tiers, found {}",
                Tier::ALL.len(),
                tiers.len()
            )));
        }

        for def in &tiers {
            if !(def.base_rate > 0.0 && def.base_rate <= 100.0) {
                return Err(CompError::Configuration(format!(
                    "tier '{}' base rate {} is outside (0, 100]",
                    def.tier, def.base_rate
                )));
            }
            if def.bonus_multiplier <= 0.0 || !def.bonus_multiplier.is_finite() {
                return Err(CompError::Configuration(format!(
                    "tier '{}' bonus multiplier {} must be positive",
                    def.tier, def.bonus_multiplier
                )));
            }
        }

        for pair in tiers.windows(2) {
            if !pair[1].requirements.dominates(&pair[0].requirements) {
                return Err(CompError::Configuration(format!(
                    "tier '{}' requirements are lower than '{}'",
                    pair[1].tier, pair[0].tier
                )));
            }
        }

        Ok(Self { tiers })
    }

    /// The default program table.
    pub fn standard() -> Self {
        let tiers = vec![
            TierDefinition {
                tier: Tier::Bronze,
                label: "Bronze".into(),
                base_rate: 5.0,
                bonus_multiplier: 1.0,
                requirements: TierRequirements::default(),
            },
            TierDefinition {
                tier: Tier::Silver,
                label: "Silver".into(),
                base_rate: 7.5,
                bonus_multiplier: 1.1,
                requirements: TierRequirements {
                    monthly_revenue:       10_000.0,
                    monthly_conversions:   5,
                    customer_satisfaction: 3.5,
                    retention_rate:        70.0,
                },
            },
            TierDefinition {
                tier: Tier::Gold,
                label: "Gold".into(),
                base_rate: 10.0,
                bonus_multiplier: 1.25,
                requirements: TierRequirements {
                    monthly_revenue:       25_000.0,
                    monthly_conversions:   10,
                    customer_satisfaction: 4.0,
                    retention_rate:        80.0,
                },
            },
            TierDefinition {
                tier: Tier::Platinum,
                label: "Platinum".into(),
                base_rate: 12.5,
                bonus_multiplier: 1.5,
                requirements: TierRequirements {
                    monthly_revenue:       50_000.0,
                    monthly_conversions:   20,
                    customer_satisfaction: 4.5,
                    retention_rate:        90.0,
                },
            },
        ];
        Self { tiers }
    }

    pub fn definitions(&self) -> &[TierDefinition] {
        &self.tiers
    }

    pub fn get(&self, tier: Tier) -> CompResult<&TierDefinition> {
        self.tiers
            .iter()
            .find(|d| d.tier == tier)
            .ok_or_else(|| CompError::Configuration(format!("tier '{tier}' is not in the catalog")))
    }

    /// Highest tier above `current` whose thresholds are all met,
    /// or `current` when none qualifies. Never returns a lower tier.
    pub fn evaluate_upgrade(&self, metrics: &TierMetrics, current: Tier) -> Tier {
        self.tiers
            .iter()
            .rev()
            .take_while(|d| d.tier > current)
            .find(|d| d.requirements.met_by(metrics))
            .map(|d| d.tier)
            .unwrap_or(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platinum_metrics() -> TierMetrics {
        TierMetrics {
            monthly_revenue:       60_000.0,
            monthly_conversions:   25,
            customer_satisfaction: 4.8,
            retention_rate:        95.0,
        }
    }

    #[test]
    fn bronze_jumps_straight_to_platinum() {
        let catalog = TierCatalog::standard();
        assert_eq!(
            catalog.evaluate_upgrade(&platinum_metrics(), Tier::Bronze),
            Tier::Platinum
        );
    }

    #[test]
    fn one_missed_threshold_blocks_that_tier() {
        let catalog = TierCatalog::standard();
        let metrics = TierMetrics { retention_rate: 85.0, ..platinum_metrics() };
        assert_eq!(catalog.evaluate_upgrade(&metrics, Tier::Bronze), Tier::Gold);
    }

    #[test]
    fn never_returns_a_lower_tier() {
        let catalog = TierCatalog::standard();
        let nothing = TierMetrics::default();
        for tier in Tier::ALL {
            assert!(catalog.evaluate_upgrade(&nothing, tier) >= tier);
            assert!(catalog.evaluate_upgrade(&platinum_metrics(), tier) >= tier);
        }
        assert_eq!(catalog.evaluate_upgrade(&nothing, Tier::Gold), Tier::Gold);
    }

    #[test]
    fn standard_table_passes_validation() {
        let rebuilt = TierCatalog::new(TierCatalog::standard().definitions().to_vec()).unwrap();
        assert_eq!(rebuilt, TierCatalog::standard());
    }

    #[test]
    fn missing_tier_is_a_configuration_error() {
        let mut defs = TierCatalog::standard().definitions().to_vec();
        defs.retain(|d| d.tier != Tier::Gold);
        assert!(matches!(TierCatalog::new(defs), Err(CompError::Configuration(_))));
    }

    #[test]
    fn duplicate_tier_is_a_configuration_error() {
        let mut defs = TierCatalog::standard().definitions().to_vec();
        defs[2] = TierDefinition { tier: Tier::Silver, ..defs[2].clone() };
        assert!(matches!(TierCatalog::new(defs), Err(CompError::Configuration(_))));
    }

    #[test]
    fn decreasing_requirements_are_rejected() {
        let mut defs = TierCatalog::standard().definitions().to_vec();
        defs[3].requirements.monthly_revenue = 1_000.0;
        assert!(matches!(TierCatalog::new(defs), Err(CompError::Configuration(_))));
    }
}
