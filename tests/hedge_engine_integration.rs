//! Integration tests for the hedge engine
//!
//! Loads `tests/fixtures/markets_snapshot.json` through the public library
//! API and runs groups through calculate, recompute and simulate.

use std::collections::HashMap;
use std::path::PathBuf;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use hedgebot_backend::hedge::{HedgeCalculator, HedgeConfig, HedgeRequest, Quality};
use hedgebot_backend::models::{HedgeGroup, MarketType};
use hedgebot_backend::store::GroupStore;

const NY: &str = "KXHIGHNY-26FEB24";
const CHI: &str = "KXLOWCHI-25FEB24";

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("markets_snapshot.json")
}

fn load_group(id: &str) -> HedgeGroup {
    let store = GroupStore::open(fixture_path()).expect("fixture loads");
    store.find_group(id).expect("group in fixture")
}

#[test]
fn test_fixture_groups() {
    let store = GroupStore::open(fixture_path()).unwrap();
    let catalog = store.catalog();

    // The BTC market is not a temperature bucket
    assert_eq!(catalog.total_markets, 8);
    assert_eq!(catalog.price_source, "kalshi-snapshot");

    let ids: Vec<&str> = catalog.groups.iter().map(|g| g.group_id.as_str()).collect();
    assert_eq!(ids, vec![CHI, NY]);

    let ny = load_group(NY);
    assert_eq!(ny.city, "New York");
    assert_eq!(ny.market_type, MarketType::High);
    assert_eq!(ny.sum_yes_prices(), 105);
    assert_eq!(ny.buckets.first().unwrap().range_label, "29° or below");
    assert_eq!(ny.buckets.last().unwrap().range_label, "36° or above");
    assert_eq!(ny.buckets[1].no_price, 79);
}

#[test]
fn test_calculate_respects_budget_and_viability() {
    let group = load_group(NY);
    let calc = HedgeCalculator::default();
    let result = calc.calculate(&group, &HedgeRequest::new(500.0, 0.011));

    assert!(result.total_outlay <= 500.0);
    assert!(result.total_outlay > 450.0, "most of the budget is deployed");

    for alloc in &result.allocations {
        if alloc.no_price > 87 {
            assert!(!alloc.viable, "{} is outside the band", alloc.ticker);
            assert_eq!(alloc.contracts, 0);
        } else {
            assert!(alloc.contracts > 0, "{} should be held", alloc.ticker);
        }
    }

    let total_prob: f64 = result.scenarios.iter().map(|s| s.probability).sum();
    assert!((total_prob - 1.0).abs() < 1e-9);
    assert!(result.worst_case_pnl < 0.0);
    assert!(result.best_case_pnl > 0.0);
    assert_eq!(result.exit_threshold, Some(0.65));
    assert_eq!(result.exit_analysis.len(), 3);
    assert!(result.adjusted_expected_profit.unwrap() >= result.expected_profit);
}

#[test]
fn test_larger_budget_never_holds_less() {
    let group = load_group(NY);
    let calc = HedgeCalculator::default();
    let small = calc.calculate(&group, &HedgeRequest::new(250.0, 0.011));
    let large = calc.calculate(&group, &HedgeRequest::new(1000.0, 0.011));

    for (s, l) in small.allocations.iter().zip(&large.allocations) {
        assert!(l.contracts >= s.contracts);
    }
}

#[test]
fn test_nearly_settled_group_is_poor() {
    let group = load_group(CHI);
    let result = HedgeCalculator::default().calculate(&group, &HedgeRequest::new(100.0, 0.011));

    assert_eq!(result.quality, Quality::Poor);
    assert_eq!(result.quality_reason, "Market is 92% resolved - nearly settled");
}

#[test]
fn test_recompute_matches_calculate() {
    let group = load_group(NY);
    let calc = HedgeCalculator::default();
    let request = HedgeRequest::new(500.0, 0.011);
    let fresh = calc.calculate(&group, &request);

    let contracts: HashMap<String, u32> = fresh
        .allocations
        .iter()
        .map(|a| (a.ticker.clone(), a.contracts))
        .collect();
    let recomputed = calc.recompute(&group, &request, &contracts).unwrap();

    assert_eq!(recomputed, fresh);
}

#[test]
fn test_selection_and_config_layers() {
    let group = load_group(NY);
    let mut config = HedgeConfig::default();
    config.exit.enabled = false;
    let calc = HedgeCalculator::new(config);

    let request = HedgeRequest::new(300.0, 0.011)
        .with_selected(["KXHIGHNY-26FEB24-B30.5", "KXHIGHNY-26FEB24-B34.5", "NOT-A-TICKER"]);
    let result = calc.calculate(&group, &request);

    let held: Vec<&str> = result.active_allocations().map(|a| a.ticker.as_str()).collect();
    assert_eq!(held, vec!["KXHIGHNY-26FEB24-B30.5", "KXHIGHNY-26FEB24-B34.5"]);
    assert!(result.exit_analysis.is_empty());
    assert!(result.adjusted_expected_profit.is_none());
}

#[test]
fn test_seeded_simulation() {
    let group = load_group(NY);
    let calc = HedgeCalculator::default();
    let result = calc.calculate(&group, &HedgeRequest::new(500.0, 0.011));

    let first = calc
        .simulate(&result, None, &mut ChaCha8Rng::seed_from_u64(11))
        .unwrap();
    let second = calc
        .simulate(&result, None, &mut ChaCha8Rng::seed_from_u64(11))
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first.summary.trials, 2000);
    assert_eq!(first.histogram.iter().map(|b| b.count).sum::<usize>(), 2000);
    assert!(first.summary.loss_probability > 0.0 && first.summary.loss_probability < 1.0);
}
