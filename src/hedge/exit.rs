//! Exit Analyzer
//!
//! Models closing a losing NO leg early. If a bucket's YES probability climbs
//! to the exit threshold before resolution, we sell the NO at
//! `(1 - threshold) * 100` cents instead of riding it to zero.
//!
//! For a leg with entry NO price `e`, exit NO price `x <= e` and `n` contracts:
//!   loss_if_held = -(n*e/100 + fees)
//!   loss_if_exit = n*x/100 - n*e/100 - fees
//! so exiting recovers `n*x/100` and can never lose more than holding.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::allocation::BucketAllocation;
use super::scenarios::Scenario;
use crate::models::HedgeGroup;

/// Default YES probability at which a leg is closed
pub const DEFAULT_EXIT_THRESHOLD: f64 = 0.65;

/// Thresholds are clamped into this band so an exit price always exists
const MIN_EXIT_THRESHOLD: f64 = 0.01;
const MAX_EXIT_THRESHOLD: f64 = 0.99;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    /// Compute exit analysis and exit-adjusted EV
    pub enabled: bool,
    /// YES probability that triggers the exit
    pub threshold: f64,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: DEFAULT_EXIT_THRESHOLD,
        }
    }
}

/// Economics of exiting one leg early versus holding it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitAnalysisEntry {
    pub ticker: String,
    pub range_label: String,
    pub contracts: u32,
    pub entry_no_price: u32,
    /// NO price we would sell at, capped at the entry price
    pub exit_no_price: u32,
    /// Current YES price of the bucket
    pub current_yes_price: u32,
    /// Bucket already trades at or above the trigger
    pub already_triggered: bool,
    pub entry_cost: f64,
    pub exit_trigger_yes_prob: f64,
    pub loss_if_held: f64,
    pub loss_if_exit: f64,
    pub num_other_buckets: usize,
    pub profit_per_other_bucket: f64,
    pub profit_from_others: f64,
    pub net_pnl: f64,
    /// Dollars saved by exiting, |loss_if_held| - |loss_if_exit| (never negative)
    pub improvement: f64,
}

/// Clamp a caller-supplied threshold into the open unit interval
pub fn clamp_threshold(threshold: f64) -> f64 {
    if threshold.is_nan() {
        return DEFAULT_EXIT_THRESHOLD;
    }
    threshold.clamp(MIN_EXIT_THRESHOLD, MAX_EXIT_THRESHOLD)
}

#[derive(Debug, Clone, Default)]
pub struct ExitAnalyzer;

impl ExitAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// One entry per active, viable allocation, in allocation order
    pub fn analyze(
        &self,
        group: &HedgeGroup,
        allocations: &[BucketAllocation],
        exit_threshold: f64,
    ) -> Vec<ExitAnalysisEntry> {
        let threshold = clamp_threshold(exit_threshold);
        let trigger_no_price = ((1.0 - threshold) * 100.0).round() as u32;

        let legs: Vec<&BucketAllocation> = allocations
            .iter()
            .filter(|a| a.is_active() && a.viable)
            .collect();

        let entries: Vec<ExitAnalysisEntry> = legs
            .iter()
            .map(|alloc| {
                let current_yes_price = group
                    .bucket(&alloc.ticker)
                    .map(|b| b.yes_price)
                    .unwrap_or(alloc.yes_price);
                let already_triggered = current_yes_price as f64 >= threshold * 100.0;

                // Selling above what we paid is not an exit of a losing leg
                let exit_no_price = trigger_no_price.min(alloc.no_price);
                let exit_value = alloc.contracts as f64 * exit_no_price as f64 / 100.0;

                let loss_if_held = alloc.loss_if_yes_wins;
                let loss_if_exit = (exit_value - alloc.cost - alloc.fees).min(0.0);

                let others: Vec<&&BucketAllocation> =
                    legs.iter().filter(|o| o.ticker != alloc.ticker).collect();
                let num_other_buckets = others.len();
                let profit_from_others: f64 = others.iter().map(|o| o.profit_if_no_wins).sum();
                let profit_per_other_bucket = if num_other_buckets > 0 {
                    profit_from_others / num_other_buckets as f64
                } else {
                    0.0
                };

                ExitAnalysisEntry {
                    ticker: alloc.ticker.clone(),
                    range_label: alloc.range_label.clone(),
                    contracts: alloc.contracts,
                    entry_no_price: alloc.no_price,
                    exit_no_price,
                    current_yes_price,
                    already_triggered,
                    entry_cost: alloc.cost,
                    exit_trigger_yes_prob: threshold,
                    loss_if_held,
                    loss_if_exit,
                    num_other_buckets,
                    profit_per_other_bucket,
                    profit_from_others,
                    net_pnl: loss_if_exit + profit_from_others,
                    improvement: (loss_if_exit - loss_if_held).max(0.0),
                }
            })
            .collect();

        debug!(
            group = %group.group_id,
            threshold,
            legs = entries.len(),
            triggered = entries.iter().filter(|e| e.already_triggered).count(),
            "exit analysis complete"
        );

        entries
    }

    /// Expected profit when every winning leg is exited at the threshold
    /// instead of held. Scenarios whose winner holds no leg keep their P&L.
    pub fn adjusted_expected_profit(
        &self,
        scenarios: &[Scenario],
        entries: &[ExitAnalysisEntry],
    ) -> f64 {
        scenarios
            .iter()
            .map(|s| {
                let improvement = entries
                    .iter()
                    .find(|e| e.ticker == s.winning_bucket)
                    .map_or(0.0, |e| e.improvement);
                s.probability * (s.net_pnl + improvement)
            })
            .sum()
    }
}
