//! Hedge Calculator
//! Mission: One pipeline from group + budget to a fully scored hedge
//!
//! Allocation -> scenarios -> summary -> quality -> exit analysis. Fresh
//! calculations and manual contract overrides share the same pipeline, so a
//! result computed incrementally is identical to one computed from scratch.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::allocation::{AllocationEngine, BucketAllocation};
use super::config::HedgeConfig;
use super::error::HedgeError;
use super::exit::{clamp_threshold, ExitAnalysisEntry, ExitAnalyzer};
use super::quality::{Quality, QualityInputs, QualityScorer};
use super::scenarios::{build_scenarios, expected_profit, pnl_range, win_probability, Scenario};
use super::simulation::{DistributionSimulator, SimulationConfig, SimulationReport};
use crate::models::HedgeGroup;

/// Parameters of one calculation request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HedgeRequest {
    /// Dollars to deploy
    pub budget: f64,
    /// Dollars per contract
    pub fee_per_contract: f64,
    /// Buckets to include; None means all
    pub selected_tickers: Option<HashSet<String>>,
    /// Overrides the configured exit threshold
    pub exit_threshold: Option<f64>,
}

impl HedgeRequest {
    pub fn new(budget: f64, fee_per_contract: f64) -> Self {
        Self {
            budget,
            fee_per_contract,
            selected_tickers: None,
            exit_threshold: None,
        }
    }

    pub fn with_selected<I, S>(mut self, tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_tickers = Some(tickers.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_exit_threshold(mut self, threshold: f64) -> Self {
        self.exit_threshold = Some(threshold);
        self
    }

    /// Reject inputs outside their domains before they reach the engine
    pub fn validate(&self) -> Result<(), HedgeError> {
        if !self.budget.is_finite() || self.budget <= 0.0 {
            return Err(HedgeError::InvalidBudget(self.budget));
        }
        self.validate_terms()
    }

    /// Fee and exit threshold only, for requests whose spend is fixed by
    /// explicit contract counts rather than a budget
    pub fn validate_terms(&self) -> Result<(), HedgeError> {
        if !self.fee_per_contract.is_finite() || self.fee_per_contract < 0.0 {
            return Err(HedgeError::InvalidFee(self.fee_per_contract));
        }
        if let Some(t) = self.exit_threshold {
            if !(t > 0.0 && t < 1.0) {
                return Err(HedgeError::InvalidExitThreshold(t));
            }
        }
        Ok(())
    }
}

/// Complete result of a hedge calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HedgeResult {
    pub group_id: String,
    pub budget: f64,
    pub fee_per_contract: f64,
    pub allocations: Vec<BucketAllocation>,
    pub scenarios: Vec<Scenario>,
    pub total_cost: f64,
    pub total_fees: f64,
    pub total_outlay: f64,
    pub total_contracts: u64,
    pub expected_profit: f64,
    pub worst_case_pnl: f64,
    pub best_case_pnl: f64,
    /// Probability mass of profitable scenarios, 0-1
    pub win_probability: f64,
    /// fees / cost; high means fees eat the edge
    pub fee_cost_ratio: f64,
    pub quality: Quality,
    pub quality_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjusted_expected_profit: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exit_analysis: Vec<ExitAnalysisEntry>,
}

impl HedgeResult {
    pub fn active_allocations(&self) -> impl Iterator<Item = &BucketAllocation> {
        self.allocations.iter().filter(|a| a.is_active())
    }
}

/// Stateless façade over the engine components
#[derive(Debug, Clone, Default)]
pub struct HedgeCalculator {
    config: HedgeConfig,
}

impl HedgeCalculator {
    pub fn new(config: HedgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HedgeConfig {
        &self.config
    }

    /// Allocate and score a hedge for `group`.
    ///
    /// Total over its inputs: a non-positive budget yields a well-formed
    /// trivial result. Use [`HedgeRequest::validate`] to reject bad input.
    pub fn calculate(&self, group: &HedgeGroup, request: &HedgeRequest) -> HedgeResult {
        let engine = AllocationEngine::new(self.config.allocation.clone());
        let allocations = engine.allocate(
            group,
            request.budget,
            request.fee_per_contract,
            request.selected_tickers.as_ref(),
        );
        self.assemble(group, request, allocations)
    }

    /// Rebuild a result from user-chosen contract counts.
    ///
    /// Tickers missing from `contracts` hold nothing. Positions go through the
    /// same formula and pipeline as [`calculate`](Self::calculate).
    pub fn recompute(
        &self,
        group: &HedgeGroup,
        request: &HedgeRequest,
        contracts: &HashMap<String, u32>,
    ) -> Result<HedgeResult, HedgeError> {
        if let Some(unknown) = contracts.keys().find(|t| group.bucket(t).is_none()) {
            return Err(HedgeError::UnknownTicker(unknown.clone()));
        }

        let fee = sanitize_fee(request.fee_per_contract);
        let engine = AllocationEngine::new(self.config.allocation.clone());
        let allocations = group
            .buckets
            .iter()
            .map(|bucket| {
                let selected = request
                    .selected_tickers
                    .as_ref()
                    .map_or(true, |s| s.contains(&bucket.ticker));
                let n = contracts.get(&bucket.ticker).copied().unwrap_or(0);
                let viable = selected && engine.is_viable(bucket, fee);
                // Degenerate prices cannot hold a position
                let n = if bucket.no_price == 0 || bucket.no_price >= 100 { 0 } else { n };
                BucketAllocation::for_contracts(bucket, n, fee, selected, viable)
            })
            .collect();

        Ok(self.assemble(group, request, allocations))
    }

    /// Run the Monte Carlo return simulation for a finished result
    pub fn simulate<R: Rng + ?Sized>(
        &self,
        result: &HedgeResult,
        overrides: Option<&SimulationConfig>,
        rng: &mut R,
    ) -> Result<SimulationReport, HedgeError> {
        let config = overrides.unwrap_or(&self.config.simulation);
        let simulator = DistributionSimulator::new(config.clone());
        simulator.run(&result.scenarios, result.total_outlay, rng)
    }

    fn assemble(
        &self,
        group: &HedgeGroup,
        request: &HedgeRequest,
        allocations: Vec<BucketAllocation>,
    ) -> HedgeResult {
        let scenarios = build_scenarios(group, &allocations);

        let active: Vec<&BucketAllocation> = allocations.iter().filter(|a| a.is_active()).collect();
        let total_cost: f64 = active.iter().map(|a| a.cost).sum();
        let total_fees: f64 = active.iter().map(|a| a.fees).sum();
        let total_contracts: u64 = active.iter().map(|a| a.contracts as u64).sum();

        let expected = expected_profit(&scenarios);
        let (worst_case_pnl, best_case_pnl) = pnl_range(&scenarios);
        let win_prob = win_probability(&scenarios);
        let fee_cost_ratio = if total_cost > 0.0 { total_fees / total_cost } else { 0.0 };

        let verdict = QualityScorer::new(self.config.quality.clone()).score(&QualityInputs {
            fee_cost_ratio,
            overround: group.overround() as f64,
            all_have_liquidity: group.all_have_liquidity(),
            win_probability: win_prob,
            worst_case_pnl,
            expected_profit: expected,
            active_legs: active.len(),
            total_cost,
            max_yes_price: group.max_yes_price(),
        });

        let mut result = HedgeResult {
            group_id: group.group_id.clone(),
            budget: request.budget,
            fee_per_contract: request.fee_per_contract,
            total_cost,
            total_fees,
            total_outlay: total_cost + total_fees,
            total_contracts,
            expected_profit: expected,
            worst_case_pnl,
            best_case_pnl,
            win_probability: win_prob,
            fee_cost_ratio,
            quality: verdict.quality,
            quality_reason: verdict.reason,
            exit_threshold: None,
            adjusted_expected_profit: None,
            exit_analysis: Vec::new(),
            allocations,
            scenarios,
        };

        if self.config.exit.enabled {
            let threshold = clamp_threshold(request.exit_threshold.unwrap_or(self.config.exit.threshold));
            let analyzer = ExitAnalyzer::new();
            let entries = analyzer.analyze(group, &result.allocations, threshold);
            let adjusted = if entries.is_empty() {
                result.expected_profit
            } else {
                analyzer.adjusted_expected_profit(&result.scenarios, &entries)
            };
            result.exit_threshold = Some(threshold);
            result.adjusted_expected_profit = Some(adjusted);
            result.exit_analysis = entries;
        }

        debug!(
            group = %result.group_id,
            outlay = result.total_outlay,
            expected = result.expected_profit,
            worst = result.worst_case_pnl,
            quality = result.quality.as_str(),
            "hedge calculated"
        );

        result
    }
}

fn sanitize_fee(fee: f64) -> f64 {
    if fee.is_finite() {
        fee.max(0.0)
    } else {
        0.0
    }
}
