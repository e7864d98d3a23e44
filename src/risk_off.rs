use crate::clock::Clock;
use crate::error::RiskOffIoError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Persisted per-market cooldown record (spec.md §3, §6). Presence with
/// `sleep_till` in the future blocks new buys for that market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskOffRecord {
    pub time: DateTime<Utc>,
    pub question: String,
    pub msg: String,
    pub sleep_till: DateTime<Utc>,
}

impl RiskOffRecord {
    pub fn is_active(&self, clock: &dyn Clock) -> bool {
        self.sleep_till > clock.now()
    }
}

/// One JSON file per market at `positions/<market_id>.json`. Writes are
/// full-file overwrites; reads tolerate absence (spec.md §6).
#[derive(Debug, Clone)]
pub struct RiskOffStore {
    base_dir: PathBuf,
}

impl RiskOffStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, market_id: &str) -> PathBuf {
        self.base_dir.join(format!("{market_id}.json"))
    }

    pub async fn read(&self, market_id: &str) -> Result<Option<RiskOffRecord>, RiskOffIoError> {
        let path = self.path_for(market_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let record: RiskOffRecord = serde_json::from_slice(&bytes)?;
                Ok(Some(record))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn write(
        &self,
        market_id: &str,
        record: &RiskOffRecord,
    ) -> Result<(), RiskOffIoError> {
        if !self.base_dir.as_os_str().is_empty() {
            tokio::fs::create_dir_all(&self.base_dir).await?;
        }
        let path = self.path_for(market_id);
        let bytes = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(&path, bytes).await?;
        info!(market_id, sleep_till = %record.sleep_till, "risk-off record written");
        Ok(())
    }

    /// Convenience used by the Market Maker's buy branch (spec.md §4.4.2b):
    /// `true` when an active (not-yet-expired) record exists.
    pub async fn is_blocking_buys(
        &self,
        market_id: &str,
        clock: &dyn Clock,
    ) -> Result<bool, RiskOffIoError> {
        match self.read(market_id).await? {
            Some(record) if record.is_active(clock) => {
                warn!(market_id, sleep_till = %record.sleep_till, "risk-off cooldown blocking buys");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}
