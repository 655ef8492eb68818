//! Contract Test: Engine Lifecycle
//!
//! Constraints verified:
//! - The engine drives the retry engine on its own, at the configured period
//! - It terminates promptly on the shutdown signal, or when the sender is dropped
//! - Every table is cleared before `run` returns
//! - The cache stays usable from other tasks while the engine runs

mod common;

use common::*;
use ndp_core::{EngineConfig, Lookup, NdpEngine, NeighborState};
use std::sync::Arc;
use tokio::time::{Duration, sleep, timeout};

fn fast() -> EngineConfig {
    EngineConfig { tick_interval_ms: 10 }
}

#[tokio::test]
async fn shutdown_signal_terminates_engine_and_clears_tables() {
    let h = Harness::new(config(4));
    h.cache
        .set_static_or_reachable(0, ip(1), mac(1), NeighborState::Static)
        .await
        .unwrap();

    let engine = NdpEngine::new(Arc::clone(&h.cache), &fast()).expect("engine construction succeeds");
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    sleep(Duration::from_millis(50)).await;
    assert!(shutdown_tx.send(()).is_ok(), "shutdown signal send succeeds");

    let result = timeout(Duration::from_secs(5), engine_handle).await;
    assert!(result.is_ok(), "Engine should terminate within 5 seconds");
    assert!(result.unwrap().unwrap().is_ok());

    assert_eq!(h.cache.entry_count(0), 0, "tables cleared on exit");
}

#[tokio::test]
async fn dropped_sender_also_stops_engine() {
    let h = Harness::new(config(4));
    let engine = NdpEngine::new(Arc::clone(&h.cache), &fast()).unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let engine_handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    drop(shutdown_tx);

    let result = timeout(Duration::from_secs(5), engine_handle).await;
    assert!(result.is_ok(), "Engine should terminate when the sender goes away");
}

#[tokio::test]
async fn engine_ages_entries_while_running() {
    let h = Harness::new(config(4));
    h.cache
        .set_static_or_reachable(0, ip(1), mac(1), NeighborState::Reachable)
        .await
        .unwrap();

    let engine = NdpEngine::new(Arc::clone(&h.cache), &fast()).unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    // resolution runs out after three solicitations, reachable time is 30 ticks
    assert_eq!(h.cache.lookup_and_lock(0, ip(2), true).await, Lookup::Pending);
    sleep(Duration::from_millis(600)).await;

    assert_eq!(h.link.multicast_count(), 3);
    assert_eq!(h.cache.lookup_and_lock(0, ip(2), false).await, Lookup::NotFound);
    assert_eq!(h.state_of(0, ip(1)), Some(NeighborState::Stale));

    shutdown_tx.send(()).unwrap();
    timeout(Duration::from_secs(5), engine_handle)
        .await
        .expect("engine stops")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn idle_engine_sends_nothing() {
    let h = Harness::new(config(4));
    let engine = NdpEngine::new(Arc::clone(&h.cache), &fast()).unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    sleep(Duration::from_millis(100)).await;
    assert!(h.link.solicitations().is_empty());
    assert_eq!(h.notifier.call_count(), 0);

    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().unwrap();
}
