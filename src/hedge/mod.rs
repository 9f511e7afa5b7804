//! Hedge Engine
//! Mission: Deploy a fixed budget across a bucket tiling so the position pays
//! whichever bucket resolves YES
//! Philosophy: Pure functions over immutable inputs, no state between requests
//!
//! Group -> allocation -> scenarios -> quality verdict
//! Allocations + exit threshold -> exit analysis
//! Scenarios + outlay -> simulated return distribution

pub mod allocation;
pub mod calculator;
pub mod config;
pub mod error;
pub mod exit;
pub mod quality;
pub mod scenarios;
pub mod simulation;


pub use allocation::{AllocationConfig, AllocationEngine, BucketAllocation};
pub use calculator::{HedgeCalculator, HedgeRequest, HedgeResult};
pub use config::{HedgeConfig, DEFAULT_FEE_PER_CONTRACT};
pub use error::HedgeError;
pub use exit::{ExitAnalysisEntry, ExitAnalyzer, ExitConfig, DEFAULT_EXIT_THRESHOLD};
pub use quality::{Quality, QualityInputs, QualityScorer, QualityThresholds, QualityVerdict};
pub use scenarios::{build_scenarios, Scenario};
pub use simulation::{
    simulate_returns, DistributionSimulator, HistogramBin, ReturnSummary, SimulationConfig,
    SimulationReport, MAX_NUM_SIMULATIONS, MAX_RANGE_PCT,
};
