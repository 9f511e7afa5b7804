//! Allocation Engine
//! Mission: Turn a budget into NO contracts across a bucket tiling
//! Philosophy: Never spend a cent more than the budget
//!
//! Sizing rule: every included, viable bucket receives a share of the budget
//! proportional to its profit margin `(100 - no) / no`, so cheap NOs (more
//! upside per dollar at risk) get more capital than expensive ones. Contract
//! counts are floored, and leftover budget from rounding stays unspent.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Bucket, HedgeGroup};

/// Cheapest NO the engine will buy (cents)
const DEFAULT_MIN_NO_PRICE: u32 = 5;

/// Most expensive NO the engine will buy (cents)
const DEFAULT_MAX_NO_PRICE: u32 = 87;

/// Viability band for NO prices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Below this the NO is a sucker bet: the bucket is very likely to win
    pub min_no_price: u32,
    /// Above this the profit margin is too thin to be worth the fee
    pub max_no_price: u32,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            min_no_price: DEFAULT_MIN_NO_PRICE,
            max_no_price: DEFAULT_MAX_NO_PRICE,
        }
    }
}

/// Position sized for one bucket of the group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketAllocation {
    pub ticker: String,
    pub range_label: String,
    /// Cents per NO contract
    pub no_price: u32,
    pub yes_price: u32,
    pub contracts: u32,
    /// Dollars paid for contracts, excluding fees
    pub cost: f64,
    pub fees: f64,
    /// cost + fees
    pub total_outlay: f64,
    /// Dollars made if this bucket resolves NO
    pub profit_if_no_wins: f64,
    /// Dollars lost if this bucket resolves YES (always <= 0)
    pub loss_if_yes_wins: f64,
    /// Selected by the user
    pub included: bool,
    /// Passes price and fee filters
    pub viable: bool,
}

impl BucketAllocation {
    /// Economics of holding `contracts` NO contracts on `bucket`.
    ///
    /// This is the single formula for a position; both fresh allocation and
    /// manual overrides go through it.
    pub fn for_contracts(
        bucket: &Bucket,
        contracts: u32,
        fee_per_contract: f64,
        included: bool,
        viable: bool,
    ) -> Self {
        let (cost, fees, profit_if_no_wins, loss_if_yes_wins) = if contracts == 0 {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            let n = contracts as f64;
            let no = bucket.no_price.min(100) as f64;
            let cost = n * no / 100.0;
            let fees = n * fee_per_contract;
            let profit = n * (100.0 - no) / 100.0 - fees;
            (cost, fees, profit, -(cost + fees))
        };

        Self {
            ticker: bucket.ticker.clone(),
            range_label: bucket.range_label.clone(),
            no_price: bucket.no_price,
            yes_price: bucket.yes_price,
            contracts,
            cost,
            fees,
            total_outlay: cost + fees,
            profit_if_no_wins,
            loss_if_yes_wins,
            included,
            viable,
        }
    }

    /// Holds contracts that take part in the hedge
    pub fn is_active(&self) -> bool {
        self.included && self.contracts > 0
    }
}

/// Sizes NO positions across a hedge group
#[derive(Debug, Clone, Default)]
pub struct AllocationEngine {
    config: AllocationConfig,
}

impl AllocationEngine {
    pub fn new(config: AllocationConfig) -> Self {
        Self { config }
    }

    /// Whether a NO on `bucket` is worth buying at this fee.
    ///
    /// Degenerate prices (0 or 100 cents) are never viable, whatever the band.
    pub fn is_viable(&self, bucket: &Bucket, fee_per_contract: f64) -> bool {
        let min = self.config.min_no_price.max(1);
        let max = self.config.max_no_price.min(99);
        let no = bucket.no_price;

        if no == 0 || no >= 100 || no < min || no > max {
            return false;
        }

        let profit_per_contract = (100 - no) as f64 / 100.0 - fee_per_contract;
        profit_per_contract > 0.0
    }

    /// Allocate `budget` dollars across the selected buckets of `group`.
    ///
    /// Every bucket of the group gets an entry, in group order. Buckets not in
    /// `selected` (None = all) come back with `included = false` and no
    /// contracts. Unknown tickers in `selected` are ignored. A non-positive
    /// budget yields an all-zero allocation.
    pub fn allocate(
        &self,
        group: &HedgeGroup,
        budget: f64,
        fee_per_contract: f64,
        selected: Option<&HashSet<String>>,
    ) -> Vec<BucketAllocation> {
        let fee = if fee_per_contract.is_finite() {
            fee_per_contract.max(0.0)
        } else {
            0.0
        };
        let budget = if budget.is_finite() { budget.max(0.0) } else { 0.0 };

        let is_selected = |b: &Bucket| selected.map_or(true, |s| s.contains(&b.ticker));

        let weights: Vec<Option<f64>> = group
            .buckets
            .iter()
            .map(|b| {
                if is_selected(b) && self.is_viable(b, fee) {
                    Some(margin_weight(b.no_price))
                } else {
                    None
                }
            })
            .collect();
        let total_weight: f64 = weights.iter().flatten().sum();

        let allocations: Vec<BucketAllocation> = group
            .buckets
            .iter()
            .zip(&weights)
            .map(|(bucket, weight)| {
                let included = is_selected(bucket);
                let viable = weight.is_some();
                let contracts = match weight {
                    Some(w) if total_weight > 0.0 && budget > 0.0 => {
                        let share = w / total_weight * budget;
                        contracts_for_share(share, bucket.no_price, fee)
                    }
                    _ => 0,
                };
                BucketAllocation::for_contracts(bucket, contracts, fee, included, viable)
            })
            .collect();

        debug!(
            group = %group.group_id,
            budget,
            fee,
            viable = weights.iter().flatten().count(),
            contracts = allocations.iter().map(|a| a.contracts as u64).sum::<u64>(),
            "allocated hedge budget"
        );

        allocations
    }
}

/// Upside per dollar at risk for a NO bought at `no_price` cents
fn margin_weight(no_price: u32) -> f64 {
    (100.0 - no_price as f64) / no_price as f64
}

/// Largest whole number of contracts whose cost plus fees fits in `share`
fn contracts_for_share(share: f64, no_price: u32, fee: f64) -> u32 {
    let per_contract = no_price as f64 / 100.0 + fee;
    if per_contract <= 0.0 || share <= 0.0 {
        return 0;
    }

    let mut contracts = (share / per_contract).floor().min(u32::MAX as f64) as u32;
    // Float division can land a hair above the exact quotient
    if contracts > 0 && contracts as f64 * per_contract > share {
        contracts -= 1;
    }
    contracts
}
