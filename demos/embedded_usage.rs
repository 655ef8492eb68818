//! Minimal embedding example for ndp-core
//!
//! An application owns the neighbor cache, plugs in its own link, notifier
//! and router list, and drives the engine itself. The "network" here is an
//! in-process peer that answers solicitations for the addresses it owns.

use async_trait::async_trait;
use ndp_core::traits::{AdvertisementReply, ChangeNotifier, NdpLink, RouterList, SolicitationRequest};
use ndp_core::{AdvertFlags, InterfaceId, LinkAddr, Lookup, NdpConfig, NdpEngine, NeighborCache, NeighborState};
use std::collections::HashMap;
use std::net::Ipv6Addr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};

/// Link that hands every solicitation to the simulated peer
struct LoopbackLink {
    wire: mpsc::UnboundedSender<(InterfaceId, SolicitationRequest)>,
}

#[async_trait]
impl NdpLink for LoopbackLink {
    async fn send_solicitation(&self, ifc: InterfaceId, request: SolicitationRequest) -> ndp_core::Result<()> {
        println!("[Link] NS for {} -> {}", request.target, request.destination);
        self.wire
            .send((ifc, request))
            .map_err(|_| ndp_core::Error::link("peer is gone"))
    }

    async fn send_advertisement(&self, _ifc: InterfaceId, reply: AdvertisementReply) -> ndp_core::Result<()> {
        println!("[Link] NA for {} -> {}", reply.target, reply.destination);
        Ok(())
    }

    fn is_local_address(&self, _ifc: InterfaceId, _addr: &Ipv6Addr) -> bool {
        false
    }
}

/// Mirrors cache changes into a map, the way a forwarding table would
#[derive(Default)]
struct ForwardingTable {
    routes: std::sync::Mutex<HashMap<Ipv6Addr, LinkAddr>>,
}

#[async_trait]
impl ChangeNotifier for ForwardingTable {
    async fn neighbor_changed(&self, _ifc: InterfaceId, ip: Ipv6Addr, link_addr: LinkAddr, valid: bool) {
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        if valid {
            routes.insert(ip, link_addr);
        } else {
            routes.remove(&ip);
        }
        println!("[Table] {} -> {} ({})", ip, link_addr, if valid { "added" } else { "removed" });
    }
}

struct PrintingRouterList;

#[async_trait]
impl RouterList for PrintingRouterList {
    async fn retract(&self, ifc: InterfaceId, ip: Ipv6Addr) {
        println!("[Routers] {} on interface {} is no longer a router", ip, ifc);
    }
}

/// Answer solicitations for the peer's own addresses with solicited, override advertisements
fn spawn_peer(
    cache: Arc<NeighborCache>,
    mut wire: mpsc::UnboundedReceiver<(InterfaceId, SolicitationRequest)>,
    owned: HashMap<Ipv6Addr, LinkAddr>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some((ifc, request)) = wire.recv().await {
            if let Some(link_addr) = owned.get(&request.target) {
                let flags = AdvertFlags {
                    router: false,
                    solicited: true,
                    override_flag: true,
                };
                cache
                    .update_from_advertisement(ifc, request.target, Some(*link_addr), flags)
                    .await;
            }
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    println!("=== Embedded ndp-core Example ===\n");

    let gateway: Ipv6Addr = "fe80::1".parse()?;
    let printer: Ipv6Addr = "fe80::42".parse()?;
    let absent: Ipv6Addr = "fe80::dead".parse()?;

    let mut config = NdpConfig::new().with_capacity(8);
    config.engine.tick_interval_ms = 50;

    let (wire_tx, wire_rx) = mpsc::unbounded_channel();
    let table = Arc::new(ForwardingTable::default());
    let cache = Arc::new(
        NeighborCache::new(&config, Arc::new(LoopbackLink { wire: wire_tx }))?
            .with_notifier(Arc::clone(&table) as Arc<dyn ChangeNotifier>)
            .with_router_list(Arc::new(PrintingRouterList)),
    );

    let peer = spawn_peer(
        Arc::clone(&cache),
        wire_rx,
        HashMap::from([(printer, "02:00:00:00:00:42".parse()?)]),
    );

    println!("1. Pinning the gateway as a static neighbor...");
    cache
        .set_static_or_reachable(0, gateway, "02:00:00:00:00:01".parse()?, NeighborState::Static)
        .await?;

    println!("2. Starting engine in background...");
    let engine = NdpEngine::new(Arc::clone(&cache), &config.engine)?;
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    println!("3. Resolving {} and {}...", printer, absent);
    for target in [printer, absent] {
        match cache.lookup_and_lock(0, target, true).await {
            Lookup::Locked(handle) => cache.unlock(handle),
            Lookup::Pending => println!("   {} is pending resolution", target),
            Lookup::NotFound => println!("   {} has no entry", target),
        }
    }

    sleep(Duration::from_millis(300)).await;

    println!("\n4. Sending a frame to {}...", printer);
    if let Lookup::Locked(handle) = cache.lookup_and_lock(0, printer, false).await {
        let guard = cache.guard(handle);
        println!("   frame goes to {}", guard.link_addr());
    }

    match cache.resolve(0, absent, false).await {
        Ok(link_addr) => println!("   {} unexpectedly resolved to {}", absent, link_addr),
        Err(e) => println!("   {} did not resolve: {}", absent, e),
    }

    println!("\n5. Cache contents:");
    println!("{}", serde_json::to_string_pretty(&cache.snapshot(0, 8))?);

    println!("\n6. Stopping engine...");
    let _ = shutdown_tx.send(());
    engine_handle.await??;
    peer.abort();

    println!("\n=== Embedding Successful ===");
    println!("Key Points:");
    println!("- The application owns the cache and the engine lifecycle");
    println!("- Collaborators are plain trait objects");
    println!("- Stopping the engine clears every table");

    Ok(())
}
