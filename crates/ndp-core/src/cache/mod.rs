//! Neighbor cache
//!
//! [`NeighborCache`] owns one bounded table per interface and exposes the
//! resolver, the inbound message updater, the administrative operations and
//! the retry engine step.
//!
//! ## Locking
//!
//! ```text
//!   lookup / update / tick
//!            │
//!            ▼
//!   ┌──────────────────────┐   copy out ip, link, action
//!   │ table mutex (per ifc)│ ─────────────────────────────┐
//!   │  EntryStore + state  │                              │
//!   └──────────────────────┘                              ▼
//!                                          ┌───────────────────────────────┐
//!                                          │ NdpLink / ChangeNotifier /    │
//!                                          │ RouterList (after release)    │
//!                                          └───────────────────────────────┘
//! ```
//!
//! Every read-modify-write of an entry happens while the interface's
//! `parking_lot::Mutex` is held. The mutex guard is confined to a block that
//! ends before any `.await`, so transmissions and callouts always run with the
//! table released and only see values copied out of it.

mod entry;
mod handle;
mod state;
mod store;

pub use handle::{NeighborGuard, NeighborHandle};

use parking_lot::Mutex;
use std::net::Ipv6Addr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::config::NdpConfig;
use crate::error::{Error, Result};
use crate::traits::{AdvertisementReply, ChangeNotifier, NdpLink, RouterList, SolicitationRequest};
use crate::types::{AdvertFlags, InterfaceId, LinkAddr, NeighborSnapshot, NeighborState};
use crate::wire::{self, NeighborAdvertisement, NeighborSolicitation, WireError};
use handle::{PendingProbes, ProbeToken};
use state::{LookupStep, NudTimers, TickAction};
use store::{Allocation, EntryStore};

/// Result of [`NeighborCache::lookup_and_lock`]
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup {
    /// Entry usable; the handle must be unlocked exactly once
    Locked(NeighborHandle),
    /// Resolution in progress, retry later
    Pending,
    /// No entry and none could be created
    NotFound,
}

/// One interface's table
///
/// `generation` changes on every [`NeighborCache::clear`], so handles issued
/// before a clear are recognized and ignored instead of unbalancing a lock.
#[derive(Debug)]
struct Table {
    store: EntryStore,
    generation: u64,
}

/// IPv6 neighbor cache for all interfaces
pub struct NeighborCache {
    tables: Vec<Mutex<Table>>,
    timers: NudTimers,
    defensive: bool,
    link: Arc<dyn NdpLink>,
    notifier: Option<Arc<dyn ChangeNotifier>>,
    router_list: Option<Arc<dyn RouterList>>,
}

impl NeighborCache {
    /// Create a cache with one empty table per configured interface
    pub fn new(config: &NdpConfig, link: Arc<dyn NdpLink>) -> Result<Self> {
        config.validate()?;

        let tables = (0..config.interfaces)
            .map(|_| {
                Mutex::new(Table {
                    store: EntryStore::new(config.cache.capacity),
                    generation: 0,
                })
            })
            .collect();

        Ok(Self {
            tables,
            timers: NudTimers::from(&config.nud),
            defensive: config.cache.defensive_processing,
            link,
            notifier: None,
            router_list: None,
        })
    }

    /// Attach a change notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Attach the default router list
    pub fn with_router_list(mut self, router_list: Arc<dyn RouterList>) -> Self {
        self.router_list = Some(router_list);
        self
    }

    pub fn interfaces(&self) -> usize {
        self.tables.len()
    }

    /// Slots per interface table
    pub fn capacity(&self) -> usize {
        self.tables
            .first()
            .map(|table| table.lock().store.capacity())
            .unwrap_or(0)
    }

    fn table(&self, ifc: InterfaceId) -> &Mutex<Table> {
        match self.tables.get(ifc) {
            Some(table) => table,
            None => panic!(
                "interface {} out of range ({} configured)",
                ifc,
                self.tables.len()
            ),
        }
    }

    /// Look up `ip` and lock its entry if it is usable
    ///
    /// A Stale entry moves to Delay. A miss with `create_if_missing` starts
    /// resolution (the first multicast solicitation is sent after the table is
    /// released) and reports `Pending`.
    pub async fn lookup_and_lock(&self, ifc: InterfaceId, ip: Ipv6Addr, create_if_missing: bool) -> Lookup {
        let (step, slot, generation, replaced) = {
            let mut table = self.table(ifc).lock();
            let generation = table.generation;

            let allocation = if create_if_missing {
                match table.store.find_or_allocate(ip) {
                    Ok(allocation) => allocation,
                    Err(_) => {
                        warn!("Neighbor table {} exhausted, cannot resolve {}", ifc, ip);
                        return Lookup::NotFound;
                    }
                }
            } else {
                match table.store.find_existing(&ip) {
                    Some(slot) => Allocation {
                        slot,
                        created: false,
                        replaced: None,
                    },
                    None => return Lookup::NotFound,
                }
            };

            let step = state::lookup(table.store.get_mut(allocation.slot), &self.timers);
            (step, allocation.slot, generation, allocation.replaced)
        };

        if let Some((old_ip, old_link)) = replaced {
            debug!("Evicted {} ({}) on interface {} to resolve {}", old_ip, old_link, ifc, ip);
            self.notify(ifc, old_ip, old_link, false).await;
        }

        match step {
            LookupStep::Locked => Lookup::Locked(NeighborHandle {
                ifc,
                slot,
                generation,
                ip,
            }),
            LookupStep::Pending => Lookup::Pending,
            LookupStep::Resolve => {
                debug!("Resolving {} on interface {}", ip, ifc);
                self.transmit(ifc, SolicitationRequest::multicast(ip)).await;
                Lookup::Pending
            }
        }
    }

    /// Give back the lock reference held by `handle`
    ///
    /// # Panics
    ///
    /// If the entry is not locked, which means a handle was forged or
    /// released twice.
    pub fn unlock(&self, handle: NeighborHandle) {
        self.release(handle.ifc, handle.slot, handle.generation);
    }

    pub(crate) fn release_probe(&self, token: ProbeToken) {
        self.release(token.ifc, token.slot, token.generation);
    }

    fn release(&self, ifc: InterfaceId, slot: usize, generation: u64) {
        let mut table = self.table(ifc).lock();
        if table.generation != generation {
            debug!("Ignoring unlock of slot {} on interface {} issued before clear", slot, ifc);
            return;
        }
        table.store.get_mut(slot).release();
    }

    /// Link-layer address of a locked entry
    ///
    /// A handle issued before [`clear`](Self::clear) yields [`LinkAddr::UNKNOWN`].
    pub fn link_addr(&self, handle: &NeighborHandle) -> LinkAddr {
        let table = self.table(handle.ifc).lock();
        if table.generation != handle.generation {
            return LinkAddr::UNKNOWN;
        }
        table.store.get(handle.slot).link_addr
    }

    /// Wrap a handle so that it is unlocked when the guard goes out of scope
    pub fn guard(&self, handle: NeighborHandle) -> NeighborGuard<'_> {
        NeighborGuard::new(self, handle)
    }

    /// Look up, copy the link-layer address and unlock in one call
    pub async fn resolve(&self, ifc: InterfaceId, ip: Ipv6Addr, create_if_missing: bool) -> Result<LinkAddr> {
        match self.lookup_and_lock(ifc, ip, create_if_missing).await {
            Lookup::Locked(handle) => {
                let link_addr = self.link_addr(&handle);
                self.unlock(handle);
                Ok(link_addr)
            }
            Lookup::Pending => Err(Error::pending(ip.to_string())),
            Lookup::NotFound => Err(Error::not_found(ip.to_string())),
        }
    }

    /// Learn from the source link-layer address of a solicitation (or of a
    /// router-originated message carrying one)
    ///
    /// Without a link-layer address nothing is learned and no slot is claimed.
    pub async fn update_from_solicitation(
        &self,
        ifc: InterfaceId,
        remote_ip: Ipv6Addr,
        link_addr: Option<LinkAddr>,
        is_router: bool,
    ) {
        let Some(link_addr) = link_addr else {
            return;
        };

        let (outcome, replaced) = {
            let mut table = self.table(ifc).lock();
            let allocation = match table.store.find_or_allocate(remote_ip) {
                Ok(allocation) => allocation,
                Err(_) => {
                    warn!("Neighbor table {} exhausted, not learning {}", ifc, remote_ip);
                    return;
                }
            };
            let entry = table.store.get_mut(allocation.slot);
            let outcome = state::solicitation(entry, link_addr, is_router, allocation.created);
            debug!("Solicitation from {} on interface {}: now {}", remote_ip, ifc, entry.state);
            (outcome, allocation.replaced)
        };

        if let Some((old_ip, old_link)) = replaced {
            self.notify(ifc, old_ip, old_link, false).await;
        }
        if outcome.committed {
            self.notify(ifc, remote_ip, link_addr, true).await;
        }
    }

    /// Apply a Neighbor Advertisement for `target`
    ///
    /// Advertisements for addresses without an entry are ignored.
    pub async fn update_from_advertisement(
        &self,
        ifc: InterfaceId,
        target: Ipv6Addr,
        link_addr: Option<LinkAddr>,
        flags: AdvertFlags,
    ) {
        let (outcome, committed_link) = {
            let mut table = self.table(ifc).lock();
            let Some(slot) = table.store.find_existing(&target) else {
                trace!("Advertisement for unknown neighbor {} on interface {}", target, ifc);
                return;
            };
            let entry = table.store.get_mut(slot);
            let outcome = state::advertisement(entry, link_addr, flags, self.defensive, &self.timers);
            debug!(
                "Advertisement from {} on interface {} (S={} O={} R={}): now {}",
                target, ifc, flags.solicited, flags.override_flag, flags.router, entry.state
            );
            (outcome, entry.link_addr)
        };

        if outcome.committed {
            self.notify(ifc, target, committed_link, true).await;
        }
        if outcome.retract_router {
            debug!("{} on interface {} is no longer a router", target, ifc);
            if let Some(router_list) = &self.router_list {
                router_list.retract(ifc, target).await;
            }
        }
    }

    /// Administratively pin `ip` to `link_addr` as Static, or mark it Reachable
    pub async fn set_static_or_reachable(
        &self,
        ifc: InterfaceId,
        ip: Ipv6Addr,
        link_addr: LinkAddr,
        state: NeighborState,
    ) -> Result<()> {
        if !matches!(state, NeighborState::Static | NeighborState::Reachable) {
            return Err(Error::not_permitted(format!("cannot set {} to state {}", ip, state)));
        }
        if ip.is_unspecified() || ip.is_multicast() || link_addr.is_multicast() {
            return Err(Error::not_permitted(format!("{} -> {} is not a unicast mapping", ip, link_addr)));
        }

        let (outcome, replaced) = {
            let mut table = self.table(ifc).lock();
            let allocation = table
                .store
                .find_or_allocate(ip)
                .map_err(|_| Error::busy(format!("neighbor table {} exhausted", ifc)))?;
            let entry = table.store.get_mut(allocation.slot);
            if entry.is_locked() {
                return Err(Error::busy(format!("{} is locked", ip)));
            }
            let outcome = state::administrative_set(entry, link_addr, state, allocation.created, &self.timers);
            (outcome, allocation.replaced)
        };

        debug!("Set {} -> {} ({}) on interface {}", ip, link_addr, state, ifc);
        if let Some((old_ip, old_link)) = replaced {
            self.notify(ifc, old_ip, old_link, false).await;
        }
        if outcome.committed {
            self.notify(ifc, ip, link_addr, true).await;
        }
        Ok(())
    }

    /// Remove the entry for `ip`
    pub async fn remove_entry(&self, ifc: InterfaceId, ip: Ipv6Addr) -> Result<()> {
        let removed = {
            let mut table = self.table(ifc).lock();
            let slot = table
                .store
                .find_existing(&ip)
                .ok_or_else(|| Error::not_found(ip.to_string()))?;
            let entry = table.store.get_mut(slot);
            if entry.is_locked() {
                return Err(Error::busy(format!("{} is locked", ip)));
            }
            let removed = entry.state.is_resolved().then_some(entry.link_addr);
            entry.reset();
            removed
        };

        debug!("Removed {} from interface {}", ip, ifc);
        if let Some(link_addr) = removed {
            self.notify(ifc, ip, link_addr, false).await;
        }
        Ok(())
    }

    /// Retry engine step: age every entry of `ifc` and run expired timers
    pub async fn tick(&self, ifc: InterfaceId) {
        let (generation, actions) = {
            let mut table = self.table(ifc).lock();
            let generation = table.generation;
            let actions: Vec<(usize, TickAction)> = (0..table.store.capacity())
                .filter_map(|slot| {
                    let action = state::tick(table.store.get_mut(slot), &self.timers);
                    (action != TickAction::Idle).then_some((slot, action))
                })
                .collect();
            (generation, actions)
        };

        let tokens = actions
            .iter()
            .filter(|(_, action)| matches!(action, TickAction::Probe(_)))
            .map(|(slot, _)| ProbeToken {
                ifc,
                slot: *slot,
                generation,
            })
            .collect();
        let mut probes = PendingProbes::new(self, tokens);

        for (slot, action) in actions {
            match action {
                TickAction::Idle => {}
                TickAction::Solicit(request) => {
                    trace!("Retransmitting solicitation for {} on interface {}", request.target, ifc);
                    self.transmit(ifc, request).await;
                }
                TickAction::Probe(request) => {
                    trace!("Probing {} on interface {}", request.target, ifc);
                    self.transmit(ifc, request).await;
                    probes.release(slot);
                }
                TickAction::Unresolved(ip) => {
                    debug!("Resolution of {} on interface {} failed", ip, ifc);
                }
                TickAction::Unreachable(ip, link_addr) => {
                    debug!("{} ({}) on interface {} unreachable", ip, link_addr, ifc);
                    self.notify(ifc, ip, link_addr, false).await;
                }
            }
        }
    }

    /// Upper-layer confirmation that `ip` is reachable (e.g. a TCP ACK)
    pub fn reachability_confirmed(&self, ifc: InterfaceId, ip: Ipv6Addr) {
        let mut table = self.table(ifc).lock();
        if let Some(slot) = table.store.find_existing(&ip) {
            if state::reachability_confirmed(table.store.get_mut(slot), &self.timers) {
                trace!("Reachability of {} on interface {} confirmed", ip, ifc);
            }
        }
    }

    /// Up to `max` resolved entries of `ifc`
    pub fn snapshot(&self, ifc: InterfaceId, max: usize) -> Vec<NeighborSnapshot> {
        let table = self.table(ifc).lock();
        table
            .store
            .iter()
            .filter(|entry| entry.state.is_resolved())
            .take(max)
            .map(|entry| entry.snapshot())
            .collect()
    }

    /// Number of resolved entries of `ifc`
    pub fn entry_count(&self, ifc: InterfaceId) -> usize {
        let table = self.table(ifc).lock();
        table.store.iter().filter(|entry| entry.state.is_resolved()).count()
    }

    /// Whether `ip` has a resolved entry on `ifc`
    pub fn is_reachable(&self, ifc: InterfaceId, ip: Ipv6Addr) -> bool {
        let table = self.table(ifc).lock();
        table
            .store
            .find_existing(&ip)
            .is_some_and(|slot| table.store.get(slot).state.is_resolved())
    }

    /// Reset every table
    ///
    /// Handles issued before the clear become inert.
    pub fn clear(&self) {
        for table in &self.tables {
            let mut table = table.lock();
            table.store.clear();
            table.generation = table.generation.wrapping_add(1);
        }
    }

    /// Handle the body of an inbound Neighbor Solicitation
    ///
    /// `Err(Error::Malformed)` means the message was discarded without
    /// touching the cache.
    pub async fn receive_solicitation(
        &self,
        ifc: InterfaceId,
        source: Ipv6Addr,
        destination: Ipv6Addr,
        body: &[u8],
    ) -> Result<()> {
        let message = NeighborSolicitation::parse(body).map_err(|e| discard(ifc, e))?;

        if source.is_unspecified() {
            if !wire::is_solicited_node_multicast(&destination) {
                return Err(discard(ifc, WireError::NotSolicitedNodeDestination(destination)));
            }
            if message.source_link_addr.is_some() {
                return Err(discard(ifc, WireError::UnspecifiedSourceWithLinkAddr));
            }
        }

        if !self.link.is_local_address(ifc, &message.target) {
            trace!("Solicitation for foreign target {} on interface {}", message.target, ifc);
            return Ok(());
        }

        if !self.defensive && !source.is_unspecified() {
            self.update_from_solicitation(ifc, source, message.source_link_addr, false)
                .await;
        }

        let multicast = destination.is_multicast();
        let reply = if source.is_unspecified() {
            AdvertisementReply {
                destination: wire::ALL_NODES,
                target: message.target,
                solicited: false,
                override_flag: multicast,
                include_target_link_addr: multicast,
            }
        } else {
            AdvertisementReply {
                destination: source,
                target: message.target,
                solicited: true,
                override_flag: multicast,
                include_target_link_addr: multicast,
            }
        };

        if let Err(e) = self.link.send_advertisement(ifc, reply).await {
            warn!("Failed to send advertisement for {} on interface {}: {}", message.target, ifc, e);
        }
        Ok(())
    }

    /// Handle the body of an inbound Neighbor Advertisement
    pub async fn receive_advertisement(&self, ifc: InterfaceId, destination: Ipv6Addr, body: &[u8]) -> Result<()> {
        let message = NeighborAdvertisement::parse(body).map_err(|e| discard(ifc, e))?;

        if destination.is_multicast() && message.flags.solicited {
            return Err(discard(ifc, WireError::SolicitedFlagOnMulticast(destination)));
        }

        self.update_from_advertisement(ifc, message.target, message.target_link_addr, message.flags)
            .await;
        Ok(())
    }

    async fn transmit(&self, ifc: InterfaceId, request: SolicitationRequest) {
        if let Err(e) = self.link.send_solicitation(ifc, request).await {
            warn!("Failed to send solicitation for {} on interface {}: {}", request.target, ifc, e);
        }
    }

    async fn notify(&self, ifc: InterfaceId, ip: Ipv6Addr, link_addr: LinkAddr, valid: bool) {
        if let Some(notifier) = &self.notifier {
            notifier.neighbor_changed(ifc, ip, link_addr, valid).await;
        }
    }
}

fn discard(ifc: InterfaceId, err: WireError) -> Error {
    debug!("Discarding NDP message on interface {}: {}", ifc, err);
    Error::Malformed(err)
}
