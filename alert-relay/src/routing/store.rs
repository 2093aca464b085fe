//! Reloadable routing snapshot.
//!
//! Readers take a cheap `Arc` of the current table; the reload ticker builds
//! a complete new table off to the side and swaps it in atomically, so a
//! request sees either the old or the new snapshot, never a mix.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::table::{Destination, RoutingFile, RoutingTable, SplunkDestination};
use crate::metrics::MetricsCollector;
use crate::{Error, Result};

/// Shortest period the reload ticker runs at.
pub const MIN_RELOAD_INTERVAL: Duration = Duration::from_millis(10);

/// Location of the two routing files.
#[derive(Debug, Clone)]
pub struct RoutingSource {
    pub prometheus_path: PathBuf,
    pub splunk_path: PathBuf,
}

impl RoutingSource {
    /// Reads and validates both files into a fresh table.
    pub async fn load(&self) -> Result<RoutingTable> {
        let destinations: Vec<Destination> = read_routing_file(&self.prometheus_path)
            .await?
            .ok_or_else(|| {
                Error::config(format!(
                    "routing file {} does not exist",
                    self.prometheus_path.display()
                ))
            })?;

        let splunk_destinations: Vec<SplunkDestination> =
            match read_routing_file(&self.splunk_path).await? {
                Some(destinations) => destinations,
                None => {
                    warn!(
                        path = %self.splunk_path.display(),
                        "Splunk routing file not found, no splunk routes configured"
                    );
                    Vec::new()
                }
            };

        Ok(RoutingTable::new(destinations, splunk_destinations))
    }
}

/// `Ok(None)` when the file does not exist.
async fn read_routing_file<D: DeserializeOwned>(path: &Path) -> Result<Option<Vec<D>>> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let file: RoutingFile<D> = serde_json::from_slice(&raw)
        .map_err(|e| Error::config(format!("invalid routing file {}: {}", path.display(), e)))?;

    debug!(path = %path.display(), count = file.destinations.len(), "Parsed routing file");
    Ok(Some(file.destinations))
}

/// Atomically swappable routing table.
pub struct RoutingStore {
    current: ArcSwap<RoutingTable>,
    source: RoutingSource,
    metrics: Arc<MetricsCollector>,
}

impl RoutingStore {
    pub fn new(source: RoutingSource, metrics: Arc<MetricsCollector>) -> Self {
        Self::with_table(RoutingTable::default(), source, metrics)
    }

    pub fn with_table(
        table: RoutingTable,
        source: RoutingSource,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            current: ArcSwap::from_pointee(table),
            source,
            metrics,
        }
    }

    /// Current snapshot. Hold it for the whole request.
    pub fn snapshot(&self) -> Arc<RoutingTable> {
        self.current.load_full()
    }

    /// Reloads both files; on any failure the served snapshot is left as is.
    pub async fn reload(&self) -> Result<()> {
        match self.source.load().await {
            Ok(table) => {
                info!(
                    destinations = table.destinations.len(),
                    splunk_destinations = table.splunk_destinations.len(),
                    "Routing table reloaded"
                );
                self.current.store(Arc::new(table));
                Ok(())
            }
            Err(e) => {
                self.metrics.record_config_reload_failure();
                error!(error = %e, "Failed to reload routing table, keeping previous snapshot");
                Err(e)
            }
        }
    }

    /// Spawns the periodic reload task. Failures are logged and the ticker
    /// keeps running until `cancel_token` fires. Intervals below
    /// [`MIN_RELOAD_INTERVAL`] are raised to it.
    pub fn spawn_reloader(
        self: &Arc<Self>,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_RELOAD_INTERVAL));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; the initial load already ran.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Routing reloader shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let _ = store.reload().await;
                    }
                }
            }
        })
    }
}
