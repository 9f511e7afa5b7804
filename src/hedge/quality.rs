//! Hedge Quality Scorer
//!
//! Collapses the economics of a hedge into a good / fair / poor verdict.
//! Thresholds are tunable but each input only ever pushes in one direction:
//! more overround or expected profit moves toward "good", heavier fees or an
//! illiquid leg move toward "poor".

use serde::{Deserialize, Serialize};

/// Verdict on whether a hedge is worth placing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Good,
    Fair,
    Poor,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Good => "good",
            Quality::Fair => "fair",
            Quality::Poor => "poor",
        }
    }
}

/// Quality thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Fees above this fraction of contract cost make the hedge poor
    pub max_fee_cost_ratio: f64,
    /// Fees must stay at or below this fraction of cost for a good verdict
    pub good_fee_cost_ratio: f64,
    /// Overround (points) at or above which a positive-EV hedge is good
    pub good_overround: f64,
    /// Below this overround a negative-EV hedge is poor
    pub min_overround: f64,
    /// Probability of profit required for a good verdict
    pub good_win_probability: f64,
    /// A bucket at or above this YES price means the market is nearly settled
    pub settled_yes_price: u32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            max_fee_cost_ratio: 0.5,
            good_fee_cost_ratio: 0.25,
            good_overround: 3.0,
            min_overround: 1.0,
            good_win_probability: 0.5,
            settled_yes_price: 90,
        }
    }
}

/// Everything the scorer looks at
#[derive(Debug, Clone, Default)]
pub struct QualityInputs {
    pub fee_cost_ratio: f64,
    pub overround: f64,
    pub all_have_liquidity: bool,
    pub win_probability: f64,
    pub worst_case_pnl: f64,
    pub expected_profit: f64,
    /// Legs actually holding contracts
    pub active_legs: usize,
    pub total_cost: f64,
    pub max_yes_price: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityVerdict {
    pub quality: Quality,
    /// Dominant cause, only set for poor verdicts
    pub reason: String,
}

impl QualityVerdict {
    fn poor(reason: impl Into<String>) -> Self {
        Self {
            quality: Quality::Poor,
            reason: reason.into(),
        }
    }

    fn plain(quality: Quality) -> Self {
        Self {
            quality,
            reason: String::new(),
        }
    }
}

pub struct QualityScorer {
    thresholds: QualityThresholds,
}

impl QualityScorer {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn score(&self, inputs: &QualityInputs) -> QualityVerdict {
        let t = &self.thresholds;

        let finite = [
            inputs.fee_cost_ratio,
            inputs.overround,
            inputs.win_probability,
            inputs.worst_case_pnl,
            inputs.expected_profit,
            inputs.total_cost,
        ]
        .iter()
        .all(|v| v.is_finite());

        if !finite || inputs.active_legs == 0 || inputs.total_cost <= 0.0 {
            return QualityVerdict::poor("insufficient data");
        }

        if !inputs.all_have_liquidity {
            return QualityVerdict::poor("Illiquid leg - at least one bucket has no order book");
        }

        if inputs.fee_cost_ratio > t.max_fee_cost_ratio {
            return QualityVerdict::poor(format!(
                "Fees are {:.0}% of cost - poor economics",
                inputs.fee_cost_ratio * 100.0
            ));
        }

        if inputs.max_yes_price >= t.settled_yes_price {
            return QualityVerdict::poor(format!(
                "Market is {}% resolved - nearly settled",
                inputs.max_yes_price
            ));
        }

        if inputs.expected_profit < 0.0 && inputs.overround < t.min_overround {
            return QualityVerdict::poor(format!(
                "Overround too low ({:.0} pts) - negative expected value",
                inputs.overround
            ));
        }

        let edge = inputs.worst_case_pnl > 0.0
            || (inputs.overround >= t.good_overround
                && inputs.win_probability >= t.good_win_probability);

        if edge
            && inputs.expected_profit > 0.0
            && inputs.fee_cost_ratio <= t.good_fee_cost_ratio
            && inputs.active_legs > 1
        {
            return QualityVerdict::plain(Quality::Good);
        }

        QualityVerdict::plain(Quality::Fair)
    }
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new(QualityThresholds::default())
    }
}
