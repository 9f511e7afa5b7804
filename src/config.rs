//! Server Configuration
//!
//! Engine settings are layered: built-in defaults, then an optional TOML file
//! at `HEDGE_CONFIG_PATH`, then `HEDGE_*` environment overrides. Per-request
//! parameters sit on top of all three.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use dotenv::dotenv;
use tracing::{info, warn};

use crate::hedge::{HedgeConfig, SimulationConfig, MAX_NUM_SIMULATIONS, MAX_RANGE_PCT};

pub const DEFAULT_PORT: u16 = 5050;
pub const DEFAULT_REFRESH_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Market snapshot JSON served as hedge groups
    pub markets_path: PathBuf,
    /// Snapshot reload interval; 0 disables background refresh
    pub refresh_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            bind: env::var("HEDGE_BIND").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("HEDGE_PORT").unwrap_or(DEFAULT_PORT),
            markets_path: env::var("HEDGE_MARKETS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/markets_snapshot.json")),
            refresh_secs: env_parse("HEDGE_REFRESH_SECS").unwrap_or(DEFAULT_REFRESH_SECS),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Load `.env` from the working directory (and parents), then the crate root
pub fn load_env() {
    let _ = dotenv();

    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}

/// Defaults, overlaid by `HEDGE_CONFIG_PATH` and then by env overrides
pub fn load_hedge_config() -> Result<HedgeConfig> {
    let mut config = match env::var("HEDGE_CONFIG_PATH") {
        Ok(path) => {
            let config = read_hedge_config(Path::new(&path))?;
            info!(path = %path, "⚙️ loaded hedge config file");
            config
        }
        Err(_) => HedgeConfig::default(),
    };
    apply_env_overrides(&mut config);
    sanitize_simulation(&mut config.simulation);
    Ok(config)
}

pub fn read_hedge_config(path: &Path) -> Result<HedgeConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read hedge config {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("failed to parse hedge config {}", path.display()))
}

fn apply_env_overrides(config: &mut HedgeConfig) {
    if let Some(fee) = env_parse::<f64>("HEDGE_FEE_PER_CONTRACT") {
        if fee.is_finite() && fee >= 0.0 {
            config.default_fee_per_contract = fee;
        } else {
            warn!(fee, "ignoring invalid HEDGE_FEE_PER_CONTRACT");
        }
    }
    if let Some(threshold) = env_parse::<f64>("HEDGE_EXIT_THRESHOLD") {
        if threshold > 0.0 && threshold < 1.0 {
            config.exit.threshold = threshold;
        } else {
            warn!(threshold, "ignoring invalid HEDGE_EXIT_THRESHOLD");
        }
    }
    if let Some(n) = env_parse::<usize>("HEDGE_NUM_SIMULATIONS") {
        config.simulation.num_simulations = n;
    }
    if let Some(bin) = env_parse::<f64>("HEDGE_BIN_SIZE_PCT") {
        if bin.is_finite() && bin > 0.0 {
            config.simulation.bin_size_pct = bin;
        } else {
            warn!(bin, "ignoring invalid HEDGE_BIN_SIZE_PCT");
        }
    }
}

/// Reset simulation settings the simulator would reject back to defaults
fn sanitize_simulation(sim: &mut SimulationConfig) {
    let defaults = SimulationConfig::default();
    if sim.num_simulations == 0 || sim.num_simulations > MAX_NUM_SIMULATIONS {
        warn!(
            num_simulations = sim.num_simulations,
            max = MAX_NUM_SIMULATIONS,
            "num_simulations out of range, using default"
        );
        sim.num_simulations = defaults.num_simulations;
    }
    if !sim.bin_size_pct.is_finite() || sim.bin_size_pct <= 0.0 {
        warn!(bin_size_pct = sim.bin_size_pct, "invalid bin_size_pct, using default");
        sim.bin_size_pct = defaults.bin_size_pct;
    }
    if !sim.range_pct.is_finite() || sim.range_pct <= 0.0 || sim.range_pct > MAX_RANGE_PCT {
        warn!(
            range_pct = sim.range_pct,
            max = MAX_RANGE_PCT,
            "range_pct out of range, using default"
        );
        sim.range_pct = defaults.range_pct;
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}
