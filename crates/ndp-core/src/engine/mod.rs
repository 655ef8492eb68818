//! Retry engine driver
//!
//! [`NdpEngine`] owns the periodic tick of the neighbor cache. Every period it
//! runs [`NeighborCache::tick`] for each interface in turn, which ages entries,
//! retransmits solicitations and expires Reachable, Incomplete and Probe
//! entries.
//!
//! ## Lifecycle
//!
//! 1. Build the [`NeighborCache`] and wrap it in an `Arc`
//! 2. Create the engine with [`NdpEngine::new()`]
//! 3. Start it with [`NdpEngine::run()`] (or spawn it on a task)
//! 4. On shutdown every table is cleared before `run` returns
//!
//! The cache stays usable from other tasks the whole time; the engine is just
//! one more caller serializing through the per-interface tables.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, info};

use crate::cache::NeighborCache;
use crate::config::EngineConfig;
use crate::error::Result;

/// Periodic driver for the neighbor cache
pub struct NdpEngine {
    cache: Arc<NeighborCache>,
    period: Duration,
}

impl NdpEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `cache`: Cache to drive, shared with the rest of the stack
    /// - `config`: Engine configuration (tick period)
    pub fn new(cache: Arc<NeighborCache>, config: &EngineConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            cache,
            period: Duration::from_millis(config.tick_interval_ms),
        })
    }

    /// The cache this engine drives
    pub fn cache(&self) -> &Arc<NeighborCache> {
        &self.cache
    }

    /// Run until SIGINT
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown, tables cleared
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run until `shutdown_rx` fires (or its sender is dropped)
    ///
    /// Embedders that manage their own signals use this instead of
    /// [`run()`](Self::run). `None` falls back to SIGINT.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        info!(
            "NDP engine started: {} interface(s), tick every {:?}",
            self.cache.interfaces(),
            self.period
        );

        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                Some(_) = ticks.next() => {
                    self.tick_all().await;
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.cache.clear();
        info!("Neighbor tables cleared, engine stopped");

        Ok(())
    }

    /// Run one tick on every interface
    pub async fn tick_all(&self) {
        for ifc in 0..self.cache.interfaces() {
            self.cache.tick(ifc).await;
        }
        debug!("Tick complete");
    }
}
