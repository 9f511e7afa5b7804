//! Group Store
//! Mission: Hold the latest grouped market snapshot for concurrent readers
//!
//! The snapshot file is re-read on refresh and swapped in atomically. Readers
//! clone an `Arc` to the current catalog and never block a refresh for long.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::grouping::{MarketGrouper, RawMarket};
use crate::models::HedgeGroup;

/// On-disk market snapshot written by the price feed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    #[serde(default = "default_price_source")]
    pub price_source: String,
    #[serde(default)]
    pub markets: Vec<RawMarket>,
}

fn default_price_source() -> String {
    "snapshot".to_string()
}

/// Immutable grouping of one snapshot
#[derive(Debug, Clone)]
pub struct GroupCatalog {
    pub groups: Vec<HedgeGroup>,
    pub total_markets: usize,
    pub price_source: String,
    pub loaded_at: DateTime<Utc>,
}

impl GroupCatalog {
    pub fn from_snapshot(snapshot: &MarketSnapshot) -> Self {
        let groups = MarketGrouper::new().group_markets(&snapshot.markets);
        let total_markets = groups.iter().map(|g| g.buckets.len()).sum();
        Self {
            groups,
            total_markets,
            price_source: snapshot.price_source.clone(),
            loaded_at: Utc::now(),
        }
    }

    /// Case-insensitive lookup by group id
    pub fn find(&self, group_id: &str) -> Option<&HedgeGroup> {
        self.groups
            .iter()
            .find(|g| g.group_id.eq_ignore_ascii_case(group_id))
    }
}

pub struct GroupStore {
    path: Option<PathBuf>,
    catalog: RwLock<Arc<GroupCatalog>>,
}

impl GroupStore {
    /// Load a snapshot file. Fails if the file is missing or malformed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let snapshot = read_snapshot(&path)?;
        let catalog = GroupCatalog::from_snapshot(&snapshot);
        info!(
            path = %path.display(),
            groups = catalog.groups.len(),
            markets = catalog.total_markets,
            "📂 loaded market snapshot"
        );
        Ok(Self {
            path: Some(path),
            catalog: RwLock::new(Arc::new(catalog)),
        })
    }

    /// In-memory store with no backing file; `refresh` is a no-op
    pub fn from_markets(price_source: impl Into<String>, markets: Vec<RawMarket>) -> Self {
        let snapshot = MarketSnapshot {
            price_source: price_source.into(),
            markets,
        };
        Self {
            path: None,
            catalog: RwLock::new(Arc::new(GroupCatalog::from_snapshot(&snapshot))),
        }
    }

    /// Re-read the backing file. On failure the previous catalog stays live.
    pub fn refresh(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let snapshot = match read_snapshot(path) {
            Ok(s) => s,
            Err(e) => {
                warn!("⚠️ snapshot refresh failed, keeping previous groups: {:#}", e);
                return Err(e);
            }
        };
        let catalog = GroupCatalog::from_snapshot(&snapshot);
        info!(
            groups = catalog.groups.len(),
            markets = catalog.total_markets,
            "🔄 refreshed market snapshot"
        );
        *self.catalog.write() = Arc::new(catalog);
        Ok(())
    }

    pub fn catalog(&self) -> Arc<GroupCatalog> {
        self.catalog.read().clone()
    }

    pub fn find_group(&self, group_id: &str) -> Option<HedgeGroup> {
        self.catalog().find(group_id).cloned()
    }
}

fn read_snapshot(path: &Path) -> Result<MarketSnapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read market snapshot {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse market snapshot {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SNAPSHOT: &str = r#"{
        "priceSource": "kalshi-live",
        "markets": [
            {"ticker": "KXHIGHNY-26FEB24-T29", "question": "29° or below", "yesPrice": 15, "hasLiquidity": true},
            {"ticker": "KXHIGHNY-26FEB24-B30.5", "question": "30° to 31°", "yesPrice": 40, "noAsk": 61, "hasLiquidity": true},
            {"ticker": "KXHIGHNY-26FEB24-T31", "question": "32° or above", "yesPrice": 50, "hasLiquidity": true},
            {"ticker": "KXLOWDEN-26FEB24-B10.5", "question": "10° to 11°", "yesPrice": 30}
        ]
    }"#;

    fn write_snapshot(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_open_groups_snapshot() {
        let file = write_snapshot(SNAPSHOT);
        let store = GroupStore::open(file.path()).unwrap();
        let catalog = store.catalog();

        assert_eq!(catalog.groups.len(), 2);
        assert_eq!(catalog.total_markets, 4);
        assert_eq!(catalog.price_source, "kalshi-live");

        let ny = store.find_group("kxhighny-26feb24").expect("case-insensitive lookup");
        assert_eq!(ny.buckets.len(), 3);
        assert_eq!(ny.sum_yes_prices(), 105);
        assert!(store.find_group("KXHIGHMIA-26FEB24").is_none());
    }

    #[test]
    fn test_refresh_swaps_catalog() {
        let file = write_snapshot(SNAPSHOT);
        let store = GroupStore::open(file.path()).unwrap();
        let before = store.catalog();

        let replacement = r#"{"markets": [{"ticker": "KXHIGHMIA-27FEB24-B80.5", "yesPrice": 20}]}"#;
        std::fs::write(file.path(), replacement).unwrap();
        store.refresh().unwrap();

        let after = store.catalog();
        assert_eq!(after.groups.len(), 1);
        assert_eq!(after.price_source, "snapshot");
        assert!(store.find_group("KXHIGHMIA-27FEB24").is_some());
        // Readers holding the old Arc keep a consistent view
        assert_eq!(before.groups.len(), 2);
    }

    #[test]
    fn test_failed_refresh_keeps_previous() {
        let file = write_snapshot(SNAPSHOT);
        let store = GroupStore::open(file.path()).unwrap();
        std::fs::write(file.path(), "not json").unwrap();

        assert!(store.refresh().is_err());
        assert_eq!(store.catalog().groups.len(), 2);
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = GroupStore::open(dir.path().join("missing.json")).err().unwrap();
        assert!(format!("{:#}", err).contains("failed to read market snapshot"));
    }

    #[test]
    fn test_in_memory_store() {
        let store = GroupStore::from_markets(
            "test",
            vec![RawMarket {
                ticker: "KXHIGHCHI-26FEB24-B20.5".to_string(),
                question: String::new(),
                yes_price: 30,
                no_ask: 0,
                has_liquidity: true,
                volume: 0,
                close_time: None,
            }],
        );
        assert!(store.refresh().is_ok());
        assert_eq!(store.catalog().groups.len(), 1);
    }
}
