//! Market Grouper
//! Mission: Turn individual temperature bucket markets into hedge-able groups
//!
//! Tickers follow `KX<HIGH|LOW><CITY>-<YYMMMDD>-<B|T><value>`, e.g.
//! `KXHIGHNY-26FEB24-B46.5`. Every market sharing series and date belongs to
//! the same group, and together they tile the outcome space.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::{Bucket, HedgeGroup, MarketType};

lazy_static::lazy_static! {
    static ref TICKER_RE: Regex =
        Regex::new(r"^KX(HIGH|LOW)([A-Z]{2,5})-(\d{2}[A-Z]{3}\d{2})-([BT])([\d.]+)$").unwrap();
    static ref RANGE_RE: Regex = Regex::new(
        r"\d+(?:\.\d+)?°?\s*(?:to\b|or\s+below|or\s+above|and\s+above)\s*(?:\d+(?:\.\d+)?°?)?"
    )
    .unwrap();
    static ref NUMBER_RE: Regex = Regex::new(r"\d+(?:\.\d+)?").unwrap();
}

const CITY_NAMES: &[(&str, &str)] = &[
    ("NY", "New York"),
    ("CHI", "Chicago"),
    ("LAX", "Los Angeles"),
    ("LA", "Los Angeles"),
    ("MIA", "Miami"),
    ("BOS", "Boston"),
    ("DEN", "Denver"),
    ("ATL", "Atlanta"),
    ("PHL", "Philadelphia"),
    ("PHX", "Phoenix"),
    ("TATL", "Atlanta"),
    ("TBOS", "Boston"),
];

/// A single exchange market as delivered by the price feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMarket {
    pub ticker: String,
    #[serde(default)]
    pub question: String,
    /// Cents
    pub yes_price: u32,
    /// Cents; 0 when the book has no NO ask
    #[serde(default)]
    pub no_ask: u32,
    #[serde(default)]
    pub has_liquidity: bool,
    #[serde(default)]
    pub volume: u64,
    #[serde(default)]
    pub close_time: Option<DateTime<Utc>>,
}

/// Bucket (`B`) or threshold (`T`) contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrikeKind {
    Bucket,
    Threshold,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTicker {
    pub market_type: MarketType,
    pub city_code: String,
    pub date: String,
    pub kind: StrikeKind,
    pub value: f64,
}

impl ParsedTicker {
    pub fn series(&self) -> String {
        let side = match self.market_type {
            MarketType::High => "HIGH",
            MarketType::Low => "LOW",
        };
        format!("KX{}{}", side, self.city_code)
    }

    pub fn group_id(&self) -> String {
        format!("{}-{}", self.series(), self.date)
    }
}

/// Parse a temperature market ticker. Returns None for anything else.
pub fn parse_ticker(ticker: &str) -> Option<ParsedTicker> {
    let caps = TICKER_RE.captures(ticker)?;

    let market_type = match &caps[1] {
        "HIGH" => MarketType::High,
        _ => MarketType::Low,
    };
    let kind = match &caps[4] {
        "B" => StrikeKind::Bucket,
        _ => StrikeKind::Threshold,
    };
    let value: f64 = caps[5].parse().ok()?;

    Some(ParsedTicker {
        market_type,
        city_code: caps[2].to_string(),
        date: caps[3].to_string(),
        kind,
        value,
    })
}

/// Calendar date of a ticker date segment (`26FEB24` is 2026-02-24)
pub fn ticker_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date, "%y%b%d").ok()
}

pub fn city_name(code: &str) -> String {
    CITY_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| code.to_string())
}

/// Human-readable range for a bucket, preferring the question wording
/// ("28° to 29°", "27° or below", "36° or above")
pub fn range_label(question: &str, kind: StrikeKind, value: f64) -> String {
    let q = question.to_lowercase();
    if let Some(m) = RANGE_RE.find(&q) {
        return m.as_str().trim().to_string();
    }

    match kind {
        StrikeKind::Bucket => {
            let lower = value.trunc() as i64;
            format!("{}° to {}°", lower, lower + 1)
        }
        StrikeKind::Threshold => {
            let v = value.trunc() as i64;
            if q.contains("below") || q.contains('<') {
                format!("≤{}°", v)
            } else if q.contains("above") || q.contains('>') {
                format!("≥{}°", v)
            } else {
                format!("{}°", v)
            }
        }
    }
}

/// Ascending order by first number, "or below" first and "or above" last
fn bucket_sort_key(label: &str) -> f64 {
    let lower = label.to_lowercase();
    let Some(first) = NUMBER_RE
        .find(&lower)
        .and_then(|m| m.as_str().parse::<f64>().ok())
    else {
        return 0.0;
    };

    if lower.contains("below") || lower.starts_with('≤') {
        first - 1000.0
    } else if lower.contains("above") || lower.starts_with('≥') {
        first + 1000.0
    } else {
        first
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketGrouper;

impl MarketGrouper {
    pub fn new() -> Self {
        Self
    }

    /// Group markets by (series, date), buckets ascending, groups by calendar
    /// date then city
    pub fn group_markets(&self, markets: &[RawMarket]) -> Vec<HedgeGroup> {
        let mut groups: HashMap<String, HedgeGroup> = HashMap::new();

        for market in markets {
            let Some(parsed) = parse_ticker(&market.ticker) else {
                debug!(ticker = %market.ticker, "skipping non-matching ticker");
                continue;
            };

            let group = groups.entry(parsed.group_id()).or_insert_with(|| HedgeGroup {
                group_id: parsed.group_id(),
                city: city_name(&parsed.city_code),
                date: parsed.date.clone(),
                market_type: parsed.market_type,
                buckets: Vec::new(),
            });

            let yes_price = market.yes_price.min(100);
            let no_price = if market.no_ask > 0 {
                market.no_ask.min(100)
            } else {
                100 - yes_price
            };

            group.buckets.push(Bucket {
                ticker: market.ticker.clone(),
                range_label: range_label(&market.question, parsed.kind, parsed.value),
                yes_price,
                no_price,
                has_liquidity: market.has_liquidity,
                volume: market.volume,
                close_time: market.close_time,
            });
        }

        let mut result: Vec<HedgeGroup> = groups.into_values().collect();
        for group in &mut result {
            group.buckets.sort_by(|a, b| {
                bucket_sort_key(&a.range_label).total_cmp(&bucket_sort_key(&b.range_label))
            });
        }
        result.sort_by(|a, b| {
            (ticker_date(&a.date), a.city.as_str(), a.group_id.as_str())
                .cmp(&(ticker_date(&b.date), b.city.as_str(), b.group_id.as_str()))
        });

        info!(
            markets = markets.len(),
            groups = result.len(),
            "📦 grouped markets into hedge groups"
        );
        result
    }
}
