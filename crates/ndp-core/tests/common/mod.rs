//! Test doubles and common utilities for neighbor cache contract tests
//!
//! The doubles only record what the cache asked of them; they never feed
//! anything back except the local-address answer.

#![allow(dead_code)]

use async_trait::async_trait;
use ndp_core::error::Result;
use ndp_core::traits::{AdvertisementReply, ChangeNotifier, NdpLink, RouterList, SolicitationRequest};
use ndp_core::{InterfaceId, LinkAddr, NdpConfig, NeighborCache};
use std::net::Ipv6Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Link that records every transmission
pub struct RecordingLink {
    solicitations: Arc<std::sync::Mutex<Vec<SolicitationRequest>>>,
    advertisements: Arc<std::sync::Mutex<Vec<AdvertisementReply>>>,
    local: Vec<Ipv6Addr>,
    fail_sends: bool,
    stall_unicast: bool,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self {
            solicitations: Arc::new(std::sync::Mutex::new(Vec::new())),
            advertisements: Arc::new(std::sync::Mutex::new(Vec::new())),
            local: Vec::new(),
            fail_sends: false,
            stall_unicast: false,
        }
    }

    /// Answer `is_local_address` with true for these addresses
    pub fn with_local(mut self, addrs: &[Ipv6Addr]) -> Self {
        self.local = addrs.to_vec();
        self
    }

    /// Make every transmission fail
    pub fn failing(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    /// Make unicast solicitations hang after being recorded
    pub fn stalling_unicast(mut self) -> Self {
        self.stall_unicast = true;
        self
    }

    pub fn solicitations(&self) -> Vec<SolicitationRequest> {
        self.solicitations.lock().unwrap().clone()
    }

    pub fn multicast_count(&self) -> usize {
        self.solicitations().iter().filter(|s| s.is_multicast()).count()
    }

    pub fn unicast_count(&self) -> usize {
        self.solicitations().iter().filter(|s| !s.is_multicast()).count()
    }

    pub fn advertisements(&self) -> Vec<AdvertisementReply> {
        self.advertisements.lock().unwrap().clone()
    }
}

#[async_trait]
impl NdpLink for RecordingLink {
    async fn send_solicitation(&self, _ifc: InterfaceId, request: SolicitationRequest) -> Result<()> {
        self.solicitations.lock().unwrap().push(request);
        if self.stall_unicast && !request.is_multicast() {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        }
        if self.fail_sends {
            return Err(ndp_core::Error::link("link down"));
        }
        Ok(())
    }

    async fn send_advertisement(&self, _ifc: InterfaceId, reply: AdvertisementReply) -> Result<()> {
        self.advertisements.lock().unwrap().push(reply);
        if self.fail_sends {
            return Err(ndp_core::Error::link("link down"));
        }
        Ok(())
    }

    fn is_local_address(&self, _ifc: InterfaceId, addr: &Ipv6Addr) -> bool {
        self.local.contains(addr)
    }
}

/// Notifier that records every change event
pub struct RecordingNotifier {
    call_count: Arc<AtomicUsize>,
    events: Arc<std::sync::Mutex<Vec<(InterfaceId, Ipv6Addr, LinkAddr, bool)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            call_count: Arc::new(AtomicUsize::new(0)),
            events: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    /// Create a notifier that shares counters with another instance
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            call_count: Arc::clone(&other.call_count),
            events: Arc::clone(&other.events),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Recorded `(ip, link, valid)` triples, interface dropped
    pub fn events(&self) -> Vec<(Ipv6Addr, LinkAddr, bool)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, ip, link, valid)| (*ip, *link, *valid))
            .collect()
    }
}

#[async_trait]
impl ChangeNotifier for RecordingNotifier {
    async fn neighbor_changed(&self, ifc: InterfaceId, ip: Ipv6Addr, link_addr: LinkAddr, valid: bool) {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push((ifc, ip, link_addr, valid));
    }
}

/// Router list that records retractions
pub struct RecordingRouterList {
    retracted: Arc<std::sync::Mutex<Vec<Ipv6Addr>>>,
}

impl RecordingRouterList {
    pub fn new() -> Self {
        Self {
            retracted: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            retracted: Arc::clone(&other.retracted),
        }
    }

    pub fn retracted(&self) -> Vec<Ipv6Addr> {
        self.retracted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RouterList for RecordingRouterList {
    async fn retract(&self, _ifc: InterfaceId, ip: Ipv6Addr) {
        self.retracted.lock().unwrap().push(ip);
    }
}

/// Cache wired to recording doubles
pub struct Harness {
    pub cache: Arc<NeighborCache>,
    pub link: Arc<RecordingLink>,
    pub notifier: RecordingNotifier,
    pub routers: RecordingRouterList,
}

impl Harness {
    pub fn new(config: NdpConfig) -> Self {
        Self::with_link(config, RecordingLink::new())
    }

    pub fn with_link(config: NdpConfig, link: RecordingLink) -> Self {
        let link = Arc::new(link);
        let notifier = RecordingNotifier::new();
        let routers = RecordingRouterList::new();

        let cache = NeighborCache::new(&config, link.clone())
            .expect("valid config")
            .with_notifier(Arc::new(RecordingNotifier::sharing_counters_with(&notifier)))
            .with_router_list(Arc::new(RecordingRouterList::sharing_counters_with(&routers)));

        Self {
            cache: Arc::new(cache),
            link,
            notifier,
            routers,
        }
    }

    /// Run `n` retry engine steps on `ifc`
    pub async fn ticks(&self, ifc: InterfaceId, n: usize) {
        for _ in 0..n {
            self.cache.tick(ifc).await;
        }
    }

    pub fn state_of(&self, ifc: InterfaceId, ip: Ipv6Addr) -> Option<ndp_core::NeighborState> {
        self.cache
            .snapshot(ifc, usize::MAX)
            .into_iter()
            .find(|s| s.ip == ip)
            .map(|s| s.state)
    }
}

/// Single-interface configuration with default NUD timers
pub fn config(capacity: usize) -> NdpConfig {
    NdpConfig::new().with_interfaces(1).with_capacity(capacity)
}

pub fn ip(n: u16) -> Ipv6Addr {
    Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, n)
}

pub fn mac(n: u8) -> LinkAddr {
    LinkAddr([0x02, 0x00, 0x5e, 0x00, 0x00, n])
}

pub fn flags(solicited: bool, override_flag: bool) -> ndp_core::AdvertFlags {
    ndp_core::AdvertFlags {
        router: false,
        solicited,
        override_flag,
    }
}

/// Solicitation/advertisement body: flags, reserved, target, options
pub fn ndp_body(flag_bits: u8, target: Ipv6Addr, options: &[u8]) -> Vec<u8> {
    let mut body = vec![flag_bits, 0, 0, 0];
    body.extend_from_slice(&target.octets());
    body.extend_from_slice(options);
    body
}

/// One link-layer address option (type 1 = source, 2 = target)
pub fn lla_option(kind: u8, addr: LinkAddr) -> Vec<u8> {
    let mut option = vec![kind, 1];
    option.extend_from_slice(&addr.octets());
    option
}
