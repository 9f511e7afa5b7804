//! Market Data Model
//! Buckets and hedge groups as handed to the engine by the ingestion layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a group tracks the daily high or the daily low temperature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    High,
    Low,
}

impl MarketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::High => "high",
            MarketType::Low => "low",
        }
    }
}

/// One mutually-exclusive outcome range within a market family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub ticker: String,
    /// e.g. "30° to 31°", "27° or below"
    pub range_label: String,
    /// Cents, 0-100
    pub yes_price: u32,
    /// Cents paid for NO: the NO ask when quoted, otherwise 100 - yes
    pub no_price: u32,
    #[serde(default)]
    pub has_liquidity: bool,
    #[serde(default)]
    pub volume: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_time: Option<DateTime<Utc>>,
}

impl Bucket {
    /// Bucket priced at the nominal NO = 100 - YES with a live book
    pub fn new(ticker: impl Into<String>, range_label: impl Into<String>, yes_price: u32) -> Self {
        let yes_price = yes_price.min(100);
        Self {
            ticker: ticker.into(),
            range_label: range_label.into(),
            yes_price,
            no_price: 100 - yes_price,
            has_liquidity: true,
            volume: 0,
            close_time: None,
        }
    }

    pub fn with_no_price(mut self, no_price: u32) -> Self {
        self.no_price = no_price;
        self
    }

    pub fn with_liquidity(mut self, has_liquidity: bool) -> Self {
        self.has_liquidity = has_liquidity;
        self
    }

    pub fn with_volume(mut self, volume: u64) -> Self {
        self.volume = volume;
        self
    }

    /// Cents earned per NO contract if this bucket resolves NO
    pub fn no_profit_if_wins(&self) -> i64 {
        100 - self.no_price as i64
    }

    /// Cents lost per NO contract if this bucket resolves YES
    pub fn no_loss_if_loses(&self) -> i64 {
        self.no_price as i64
    }
}

/// A complete tiling of the outcome space for one city, date and market type.
///
/// Exactly one bucket resolves YES. Derived aggregates are computed on demand
/// so they can never drift from the bucket prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HedgeGroup {
    /// e.g. "KXHIGHNY-26FEB24"
    pub group_id: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub date: String,
    pub market_type: MarketType,
    pub buckets: Vec<Bucket>,
}

impl HedgeGroup {
    pub fn new(group_id: impl Into<String>, buckets: Vec<Bucket>) -> Self {
        Self {
            group_id: group_id.into(),
            city: String::new(),
            date: String::new(),
            market_type: MarketType::High,
            buckets,
        }
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Sum of YES prices in cents. Above 100 means the tiling is overpriced.
    pub fn sum_yes_prices(&self) -> u32 {
        self.buckets.iter().map(|b| b.yes_price).sum()
    }

    /// Percentage points by which the YES prices exceed a fair 100
    pub fn overround(&self) -> i64 {
        self.sum_yes_prices() as i64 - 100
    }

    /// Cents to buy one NO on every bucket
    pub fn sum_no_prices(&self) -> u32 {
        self.buckets.iter().map(|b| b.no_price).sum()
    }

    pub fn all_have_liquidity(&self) -> bool {
        self.buckets.iter().all(|b| b.has_liquidity)
    }

    pub fn max_yes_price(&self) -> u32 {
        self.buckets.iter().map(|b| b.yes_price).max().unwrap_or(0)
    }

    pub fn bucket(&self, ticker: &str) -> Option<&Bucket> {
        self.buckets.iter().find(|b| b.ticker == ticker)
    }
}

/// Group plus its derived aggregates, as served to clients
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HedgeGroupView {
    #[serde(flatten)]
    pub group: HedgeGroup,
    pub num_buckets: usize,
    pub sum_yes_prices: u32,
    pub overround: i64,
    pub sum_no_prices: u32,
    pub all_have_liquidity: bool,
}

impl From<&HedgeGroup> for HedgeGroupView {
    fn from(group: &HedgeGroup) -> Self {
        Self {
            num_buckets: group.num_buckets(),
            sum_yes_prices: group.sum_yes_prices(),
            overround: group.overround(),
            sum_no_prices: group.sum_no_prices(),
            all_have_liquidity: group.all_have_liquidity(),
            group: group.clone(),
        }
    }
}

/// Listing metadata returned next to the groups
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupsMeta {
    pub timestamp: String,
    pub count: usize,
    pub total_markets: usize,
    pub price_source: String,
}
