//! Scenario Engine
//!
//! One scenario per bucket in the group: the world where that bucket resolves
//! YES and every other bucket resolves NO. Buckets the user did not select
//! can still win, so they get a scenario too.

use serde::{Deserialize, Serialize};

use super::allocation::BucketAllocation;
use crate::models::HedgeGroup;

/// P&L outcome when a specific bucket wins YES
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub winning_bucket: String,
    pub winning_label: String,
    /// Market-implied probability, yes / sum(yes)
    pub probability: f64,
    pub net_pnl: f64,
    pub is_profitable: bool,
}

/// Build the scenario for every bucket of `group`, in group order.
///
/// Probabilities are renormalised against the sum of YES prices so they add
/// up to one; an all-zero tiling gives every scenario probability 0.
pub fn build_scenarios(group: &HedgeGroup, allocations: &[BucketAllocation]) -> Vec<Scenario> {
    let sum_yes = group.sum_yes_prices() as f64;
    let active: Vec<&BucketAllocation> = allocations.iter().filter(|a| a.is_active()).collect();

    group
        .buckets
        .iter()
        .map(|bucket| {
            let probability = if sum_yes > 0.0 {
                bucket.yes_price as f64 / sum_yes
            } else {
                0.0
            };

            let net_pnl: f64 = active
                .iter()
                .map(|a| {
                    if a.ticker == bucket.ticker {
                        a.loss_if_yes_wins
                    } else {
                        a.profit_if_no_wins
                    }
                })
                .sum();

            Scenario {
                winning_bucket: bucket.ticker.clone(),
                winning_label: bucket.range_label.clone(),
                probability,
                net_pnl,
                is_profitable: net_pnl > 0.0,
            }
        })
        .collect()
}

/// Probability-weighted net P&L
pub fn expected_profit(scenarios: &[Scenario]) -> f64 {
    scenarios.iter().map(|s| s.probability * s.net_pnl).sum()
}

/// Probability mass of the scenarios that end in profit
pub fn win_probability(scenarios: &[Scenario]) -> f64 {
    scenarios
        .iter()
        .filter(|s| s.is_profitable)
        .map(|s| s.probability)
        .sum()
}

/// (worst, best) net P&L, both zero when there are no scenarios
pub fn pnl_range(scenarios: &[Scenario]) -> (f64, f64) {
    if scenarios.is_empty() {
        return (0.0, 0.0);
    }
    scenarios.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
        (lo.min(s.net_pnl), hi.max(s.net_pnl))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hedge::allocation::AllocationEngine;
    use crate::models::Bucket;

    fn three_bucket_group() -> HedgeGroup {
        HedgeGroup::new(
            "KXHIGHNY-26FEB24",
            vec![
                Bucket::new("B1", "≤30°", 20),
                Bucket::new("B2", "31° to 32°", 35),
                Bucket::new("B3", "≥33°", 50),
            ],
        )
    }

    #[test]
    fn test_bucket_three_wins() {
        let group = three_bucket_group();
        let allocs = AllocationEngine::default().allocate(&group, 100.0, 0.01, None);
        let scenarios = build_scenarios(&group, &allocs);

        assert_eq!(scenarios.len(), 3);
        let s3 = &scenarios[2];
        assert_eq!(s3.winning_bucket, "B3");
        assert!((s3.probability - 50.0 / 105.0).abs() < 1e-12);

        let expected = allocs[2].loss_if_yes_wins + allocs[0].profit_if_no_wins + allocs[1].profit_if_no_wins;
        assert!((s3.net_pnl - expected).abs() < 1e-9);
        assert_eq!(s3.is_profitable, expected > 0.0);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let group = three_bucket_group();
        let scenarios = build_scenarios(&group, &[]);
        let total: f64 = scenarios.iter().map(|s| s.probability).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_allocations_means_flat_pnl() {
        let scenarios = build_scenarios(&three_bucket_group(), &[]);
        assert!(scenarios.iter().all(|s| s.net_pnl == 0.0 && !s.is_profitable));
        assert_eq!(expected_profit(&scenarios), 0.0);
        assert_eq!(pnl_range(&scenarios), (0.0, 0.0));
    }

    #[test]
    fn test_unselected_bucket_still_has_scenario() {
        let group = three_bucket_group();
        let selected = ["B1".to_string(), "B2".to_string()].into_iter().collect();
        let allocs = AllocationEngine::default().allocate(&group, 100.0, 0.01, Some(&selected));
        let scenarios = build_scenarios(&group, &allocs);

        // B3 wins: both held NOs pay out
        let s3 = &scenarios[2];
        let expected = allocs[0].profit_if_no_wins + allocs[1].profit_if_no_wins;
        assert!((s3.net_pnl - expected).abs() < 1e-9);
        assert!(s3.is_profitable);
    }

    #[test]
    fn test_zero_sum_yes_guard() {
        let group = HedgeGroup::new("G", vec![Bucket::new("A", "a", 0), Bucket::new("B", "b", 0)]);
        let scenarios = build_scenarios(&group, &[]);
        assert!(scenarios.iter().all(|s| s.probability == 0.0));
    }

    #[test]
    fn test_summary_helpers() {
        let group = three_bucket_group();
        let allocs = AllocationEngine::default().allocate(&group, 100.0, 0.01, None);
        let scenarios = build_scenarios(&group, &allocs);
        let (worst, best) = pnl_range(&scenarios);

        assert!(worst <= best);
        let win = win_probability(&scenarios);
        assert!((0.0..=1.0 + 1e-12).contains(&win));
        let ev = expected_profit(&scenarios);
        assert!(ev >= worst - 1e-9 && ev <= best + 1e-9);
    }
}
