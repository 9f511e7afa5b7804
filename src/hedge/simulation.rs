//! Return Distribution Simulator
//!
//! Monte Carlo over scenario probabilities. The market-implied probability
//! of each scenario is treated as a noisy estimate: every trial perturbs the
//! probabilities, renormalises, draws one winning scenario, jitters its P&L
//! for slippage, and records the percentage return on outlay.
//!
//! The random source is injected so a fixed seed reproduces a histogram
//! exactly. Callers running simulations concurrently must give each one its
//! own RNG.

use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics, Statistics};
use tracing::debug;

use super::error::HedgeError;
use super::scenarios::Scenario;

pub const DEFAULT_NUM_SIMULATIONS: usize = 2000;
pub const DEFAULT_BIN_SIZE_PCT: f64 = 5.0;

/// Upper bound on trials accepted from callers
pub const MAX_NUM_SIMULATIONS: usize = 200_000;

/// Widest histogram half-range, in percent
pub const MAX_RANGE_PCT: f64 = 1000.0;

/// Smallest bin width; finer resolution just produces noise
const MIN_BIN_SIZE_PCT: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Trials per run
    pub num_simulations: usize,
    /// Histogram bin width in percentage points
    pub bin_size_pct: f64,
    /// Histogram spans [-range_pct, +range_pct]
    pub range_pct: f64,
    /// Each probability moves by up to this much (absolute) per trial
    pub probability_noise: f64,
    /// Perturbed probabilities never drop below this
    pub probability_floor: f64,
    /// Slippage jitter on P&L, as a percentage of total outlay
    pub pnl_jitter_pct: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_simulations: DEFAULT_NUM_SIMULATIONS,
            bin_size_pct: DEFAULT_BIN_SIZE_PCT,
            range_pct: 100.0,
            probability_noise: 0.05,
            probability_floor: 1e-4,
            pnl_jitter_pct: 2.0,
        }
    }
}

impl SimulationConfig {
    /// Reject trial counts, bin widths and ranges the simulator will not run
    pub fn validate(&self) -> Result<(), HedgeError> {
        if self.num_simulations > MAX_NUM_SIMULATIONS {
            return Err(HedgeError::InvalidSimulation(format!(
                "numSimulations must be at most {} (got {})",
                MAX_NUM_SIMULATIONS, self.num_simulations
            )));
        }
        if !self.bin_size_pct.is_finite() || self.bin_size_pct <= 0.0 {
            return Err(HedgeError::InvalidSimulation(
                "binSizePct must be a positive number".to_string(),
            ));
        }
        if !self.range_pct.is_finite() || self.range_pct <= 0.0 || self.range_pct > MAX_RANGE_PCT {
            return Err(HedgeError::InvalidSimulation(format!(
                "rangePct must be in (0, {}]",
                MAX_RANGE_PCT
            )));
        }
        Ok(())
    }
}

/// One histogram bucket; `bin` is the lower edge in percent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub bin: f64,
    pub count: usize,
}

/// Shape statistics of the simulated returns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnSummary {
    pub trials: usize,
    pub mean_return_pct: f64,
    pub std_dev_pct: f64,
    pub p5_return_pct: f64,
    pub median_return_pct: f64,
    pub p95_return_pct: f64,
    /// Share of trials that lost money
    pub loss_probability: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub histogram: Vec<HistogramBin>,
    pub summary: ReturnSummary,
}

pub struct DistributionSimulator {
    config: SimulationConfig,
}

impl DistributionSimulator {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Percentage return of each trial. Empty for no scenarios or no outlay.
    pub fn sample_returns<R: Rng + ?Sized>(
        &self,
        scenarios: &[Scenario],
        total_outlay: f64,
        rng: &mut R,
    ) -> Result<Vec<f64>, HedgeError> {
        self.config.validate()?;
        if scenarios.is_empty() || !(total_outlay > 0.0) || !total_outlay.is_finite() {
            return Ok(Vec::new());
        }

        let trials = self.config.num_simulations;
        let noise = finite_or(self.config.probability_noise, 0.0).abs();
        let floor = finite_or(self.config.probability_floor, 0.0).max(f64::MIN_POSITIVE);
        let jitter = finite_or(self.config.pnl_jitter_pct, 0.0).abs() / 100.0 * total_outlay;

        let mut weights = vec![0.0; scenarios.len()];
        let mut returns = Vec::with_capacity(trials);

        for _ in 0..trials {
            for (w, s) in weights.iter_mut().zip(scenarios) {
                let shift = if noise > 0.0 { rng.gen_range(-noise..=noise) } else { 0.0 };
                *w = (s.probability + shift).max(floor);
            }
            let total: f64 = weights.iter().sum();

            let draw: f64 = rng.gen();
            let mut cumulative = 0.0;
            let mut chosen = scenarios.len() - 1;
            for (i, w) in weights.iter().enumerate() {
                cumulative += w / total;
                if draw < cumulative {
                    chosen = i;
                    break;
                }
            }

            let slippage = if jitter > 0.0 { rng.gen_range(-jitter..=jitter) } else { 0.0 };
            let pnl = scenarios[chosen].net_pnl + slippage;
            returns.push(pnl / total_outlay * 100.0);
        }

        Ok(returns)
    }

    /// Fixed-width histogram over [-range, +range]. Out-of-range returns land
    /// in the edge bins, so the counts always add up to the number of returns.
    pub fn bin_returns(&self, returns: &[f64]) -> Vec<HistogramBin> {
        let range = finite_or(self.config.range_pct, 100.0)
            .abs()
            .clamp(MIN_BIN_SIZE_PCT, MAX_RANGE_PCT);
        let bin_size = clamp_bin_size(self.config.bin_size_pct, range);
        let num_bins = ((2.0 * range / bin_size).ceil() as usize).max(1);

        let mut counts = vec![0usize; num_bins];
        for &r in returns {
            let idx = ((r + range) / bin_size).floor();
            let idx = if idx.is_nan() { 0.0 } else { idx.clamp(0.0, (num_bins - 1) as f64) };
            counts[idx as usize] += 1;
        }

        counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBin {
                bin: round6(-range + i as f64 * bin_size),
                count,
            })
            .collect()
    }

    /// Histogram plus summary statistics for one run
    pub fn run<R: Rng + ?Sized>(
        &self,
        scenarios: &[Scenario],
        total_outlay: f64,
        rng: &mut R,
    ) -> Result<SimulationReport, HedgeError> {
        let returns = self.sample_returns(scenarios, total_outlay, rng)?;
        if returns.is_empty() {
            return Ok(SimulationReport::default());
        }

        let report = SimulationReport {
            histogram: self.bin_returns(&returns),
            summary: summarize_returns(&returns),
        };

        debug!(
            trials = report.summary.trials,
            mean = report.summary.mean_return_pct,
            loss_probability = report.summary.loss_probability,
            "return distribution simulated"
        );

        Ok(report)
    }
}

impl Default for DistributionSimulator {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

/// Simulate `num_simulations` trials and bin them at `bin_size_pct` with the
/// default noise model. Empty scenarios or non-positive outlay give an empty
/// histogram; more than `MAX_NUM_SIMULATIONS` trials is an error.
pub fn simulate_returns<R: Rng + ?Sized>(
    scenarios: &[Scenario],
    total_outlay: f64,
    num_simulations: usize,
    bin_size_pct: f64,
    rng: &mut R,
) -> Result<Vec<HistogramBin>, HedgeError> {
    let simulator = DistributionSimulator::new(SimulationConfig {
        num_simulations,
        bin_size_pct,
        ..SimulationConfig::default()
    });
    let returns = simulator.sample_returns(scenarios, total_outlay, rng)?;
    if returns.is_empty() {
        return Ok(Vec::new());
    }
    Ok(simulator.bin_returns(&returns))
}

pub fn summarize_returns(returns: &[f64]) -> ReturnSummary {
    if returns.is_empty() {
        return ReturnSummary::default();
    }

    let mean = returns.iter().mean();
    let std_dev = if returns.len() > 1 {
        returns.iter().std_dev()
    } else {
        0.0
    };

    let mut data = Data::new(returns.to_vec());
    let losses = returns.iter().filter(|r| **r < 0.0).count();

    ReturnSummary {
        trials: returns.len(),
        mean_return_pct: finite_or(mean, 0.0),
        std_dev_pct: finite_or(std_dev, 0.0),
        p5_return_pct: finite_or(data.percentile(5), 0.0),
        median_return_pct: finite_or(data.percentile(50), 0.0),
        p95_return_pct: finite_or(data.percentile(95), 0.0),
        loss_probability: losses as f64 / returns.len() as f64,
    }
}

fn clamp_bin_size(bin_size_pct: f64, range: f64) -> f64 {
    if !bin_size_pct.is_finite() || bin_size_pct <= 0.0 {
        return DEFAULT_BIN_SIZE_PCT.min(2.0 * range);
    }
    bin_size_pct.clamp(MIN_BIN_SIZE_PCT, 2.0 * range)
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scenarios() -> Vec<Scenario> {
        [("A", 0.2, 12.0), ("B", 0.33, -8.0), ("C", 0.47, 5.5)]
            .iter()
            .map(|(t, p, pnl)| Scenario {
                winning_bucket: t.to_string(),
                winning_label: t.to_string(),
                probability: *p,
                net_pnl: *pnl,
                is_profitable: *pnl > 0.0,
            })
            .collect()
    }

    fn total(hist: &[HistogramBin]) -> usize {
        hist.iter().map(|b| b.count).sum()
    }

    #[test]
    fn test_counts_match_trials() {
        let mut rng = StdRng::seed_from_u64(7);
        let hist = simulate_returns(&scenarios(), 95.0, 2000, 5.0, &mut rng).unwrap();
        assert_eq!(hist.len(), 40);
        assert_eq!(total(&hist), 2000);
        assert_eq!(hist[0].bin, -100.0);
        assert_eq!(hist[39].bin, 95.0);
        assert!(hist.windows(2).all(|w| w[0].bin < w[1].bin));
    }

    #[test]
    fn test_seed_reproduces_histogram() {
        let a = simulate_returns(&scenarios(), 95.0, 1500, 3.0, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = simulate_returns(&scenarios(), 95.0, 1500, 3.0, &mut StdRng::seed_from_u64(42)).unwrap();
        let c = simulate_returns(&scenarios(), 95.0, 1500, 3.0, &mut StdRng::seed_from_u64(43)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_degenerate_inputs_are_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(simulate_returns(&[], 95.0, 100, 5.0, &mut rng).unwrap().is_empty());
        assert!(simulate_returns(&scenarios(), 0.0, 100, 5.0, &mut rng).unwrap().is_empty());
        assert!(simulate_returns(&scenarios(), -3.0, 100, 5.0, &mut rng).unwrap().is_empty());
        assert!(simulate_returns(&scenarios(), f64::NAN, 100, 5.0, &mut rng).unwrap().is_empty());
    }

    #[test]
    fn test_out_of_range_returns_clamp_to_edges() {
        let simulator = DistributionSimulator::new(SimulationConfig {
            bin_size_pct: 10.0,
            ..SimulationConfig::default()
        });
        let hist = simulator.bin_returns(&[-450.0, -100.0, 0.0, 99.99, 100.0, 1e9]);

        assert_eq!(hist.len(), 20);
        assert_eq!(total(&hist), 6);
        assert_eq!(hist[0].count, 2);
        assert_eq!(hist[10].count, 1);
        assert_eq!(hist[19].count, 3);
    }

    #[test]
    fn test_invalid_bin_size_falls_back() {
        let simulator = DistributionSimulator::new(SimulationConfig {
            bin_size_pct: -1.0,
            ..SimulationConfig::default()
        });
        let hist = simulator.bin_returns(&[1.0, 2.0]);
        assert_eq!(hist.len(), 40);
        assert_eq!(total(&hist), 2);
    }

    #[test]
    fn test_noise_free_sampling_only_hits_scenario_returns() {
        let simulator = DistributionSimulator::new(SimulationConfig {
            num_simulations: 500,
            probability_noise: 0.0,
            pnl_jitter_pct: 0.0,
            ..SimulationConfig::default()
        });
        let outlay = 50.0;
        let returns = simulator
            .sample_returns(&scenarios(), outlay, &mut StdRng::seed_from_u64(3))
            .unwrap();

        assert_eq!(returns.len(), 500);
        let allowed: Vec<f64> = scenarios().iter().map(|s| s.net_pnl / outlay * 100.0).collect();
        assert!(returns.iter().all(|r| allowed.iter().any(|a| (a - r).abs() < 1e-9)));
    }

    #[test]
    fn test_run_reports_summary() {
        let simulator = DistributionSimulator::new(SimulationConfig {
            num_simulations: 3000,
            ..SimulationConfig::default()
        });
        let report = simulator
            .run(&scenarios(), 40.0, &mut StdRng::seed_from_u64(11))
            .unwrap();

        assert_eq!(report.summary.trials, 3000);
        assert_eq!(total(&report.histogram), 3000);
        assert!(report.summary.p5_return_pct <= report.summary.median_return_pct);
        assert!(report.summary.median_return_pct <= report.summary.p95_return_pct);
        assert!(report.summary.loss_probability > 0.0 && report.summary.loss_probability < 1.0);
        assert!(report.summary.std_dev_pct > 0.0);
    }

    #[test]
    fn test_zero_trials() {
        let hist = simulate_returns(&scenarios(), 95.0, 0, 5.0, &mut StdRng::seed_from_u64(1)).unwrap();
        assert!(hist.is_empty());
    }

    #[test]
    fn test_trials_above_limit_are_rejected() {
        let mut rng = StdRng::seed_from_u64(9);
        let err = simulate_returns(&scenarios(), 95.0, 250_000, 5.0, &mut rng).unwrap_err();
        assert!(matches!(err, HedgeError::InvalidSimulation(_)));
        assert!(err.to_string().contains("250000"));

        let simulator = DistributionSimulator::new(SimulationConfig {
            num_simulations: MAX_NUM_SIMULATIONS + 1,
            ..SimulationConfig::default()
        });
        assert!(simulator.run(&scenarios(), 95.0, &mut rng).is_err());
    }

    #[test]
    fn test_trials_at_limit_are_all_counted() {
        let mut rng = StdRng::seed_from_u64(9);
        let hist = simulate_returns(&scenarios(), 95.0, MAX_NUM_SIMULATIONS, 5.0, &mut rng).unwrap();
        assert_eq!(total(&hist), MAX_NUM_SIMULATIONS);
    }

    #[test]
    fn test_validate_rejects_bad_range_and_bins() {
        for config in [
            SimulationConfig { bin_size_pct: 0.0, ..SimulationConfig::default() },
            SimulationConfig { bin_size_pct: f64::NAN, ..SimulationConfig::default() },
            SimulationConfig { range_pct: 1e12, ..SimulationConfig::default() },
            SimulationConfig { range_pct: -5.0, ..SimulationConfig::default() },
        ] {
            assert!(config.validate().is_err(), "{:?}", config);
        }
        assert!(SimulationConfig::default().validate().is_ok());
    }
}
