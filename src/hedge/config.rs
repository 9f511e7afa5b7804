//! Hedge Engine Configuration
//!
//! Every tunable the engine reads lives here and is passed into each call.
//! The engine keeps no state of its own between requests.

use serde::{Deserialize, Serialize};

use super::allocation::AllocationConfig;
use super::exit::ExitConfig;
use super::quality::QualityThresholds;
use super::simulation::SimulationConfig;

/// Default fee per contract in dollars
pub const DEFAULT_FEE_PER_CONTRACT: f64 = 0.011;

/// Main configuration for the hedge engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HedgeConfig {
    /// Fee charged per contract when the caller does not supply one
    pub default_fee_per_contract: f64,

    /// Viability band for NO prices
    pub allocation: AllocationConfig,

    /// Early-exit modelling
    pub exit: ExitConfig,

    /// Quality verdict thresholds
    pub quality: QualityThresholds,

    /// Monte Carlo return distribution
    pub simulation: SimulationConfig,
}

impl Default for HedgeConfig {
    fn default() -> Self {
        Self {
            default_fee_per_contract: DEFAULT_FEE_PER_CONTRACT,
            allocation: AllocationConfig::default(),
            exit: ExitConfig::default(),
            quality: QualityThresholds::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let raw = r#"
            default_fee_per_contract = 0.02

            [exit]
            threshold = 0.7

            [simulation]
            num_simulations = 500
        "#;

        let config: HedgeConfig = toml::from_str(raw).expect("partial config should parse");
        assert_eq!(config.default_fee_per_contract, 0.02);
        assert_eq!(config.exit.threshold, 0.7);
        assert!(config.exit.enabled);
        assert_eq!(config.simulation.num_simulations, 500);
        assert_eq!(config.simulation.bin_size_pct, SimulationConfig::default().bin_size_pct);
        assert_eq!(config.allocation, AllocationConfig::default());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: HedgeConfig = toml::from_str("").unwrap();
        assert_eq!(config, HedgeConfig::default());
    }
}
