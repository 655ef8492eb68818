//! Lock handles for cache entries
//!
//! A consumer that gets [`Lookup::Locked`](super::Lookup::Locked) owns one lock
//! reference on the entry. The reference keeps the slot from being evicted,
//! removed or having its address overwritten until it is given back, either
//! explicitly through [`NeighborCache::unlock`] or by dropping a
//! [`NeighborGuard`].
//!
//! The retry engine's Probe cycle takes its own reference for the duration of
//! a unicast transmission. That reference is represented by a [`ProbeToken`],
//! which has no `Drop` behaviour: it is handed across the `.await` of the
//! transmission and released explicitly afterwards. The tokens of one tick
//! are parked in [`PendingProbes`], which gives back whatever is left if the
//! tick future is dropped mid-transmission.

use std::fmt;
use std::net::Ipv6Addr;

use super::NeighborCache;
use crate::types::{InterfaceId, LinkAddr};

/// Opaque reference to a locked entry
///
/// Deliberately neither `Clone` nor `Copy`: every handle stands for exactly
/// one lock reference and is consumed by [`NeighborCache::unlock`].
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "a locked neighbor entry stays locked until the handle is unlocked"]
pub struct NeighborHandle {
    pub(crate) ifc: InterfaceId,
    pub(crate) slot: usize,
    pub(crate) generation: u64,
    pub(crate) ip: Ipv6Addr,
}

impl NeighborHandle {
    /// Interface whose table holds the entry
    pub fn interface(&self) -> InterfaceId {
        self.ifc
    }

    /// Neighbor address the handle was issued for
    pub fn ip(&self) -> Ipv6Addr {
        self.ip
    }
}

/// Scope-bound lock reference, released on drop
pub struct NeighborGuard<'a> {
    cache: &'a NeighborCache,
    handle: Option<NeighborHandle>,
}

impl<'a> NeighborGuard<'a> {
    pub(crate) fn new(cache: &'a NeighborCache, handle: NeighborHandle) -> Self {
        Self {
            cache,
            handle: Some(handle),
        }
    }

    /// Link-layer address of the locked entry
    pub fn link_addr(&self) -> LinkAddr {
        self.handle
            .as_ref()
            .map(|handle| self.cache.link_addr(handle))
            .unwrap_or(LinkAddr::UNKNOWN)
    }

    pub fn ip(&self) -> Option<Ipv6Addr> {
        self.handle.as_ref().map(NeighborHandle::ip)
    }

    /// Give up scope-based release and return the raw handle
    pub fn into_handle(mut self) -> Option<NeighborHandle> {
        self.handle.take()
    }
}

impl fmt::Debug for NeighborGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeighborGuard").field("handle", &self.handle).finish()
    }
}

impl Drop for NeighborGuard<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.cache.unlock(handle);
        }
    }
}

/// Lock reference held by the retry engine across a unicast probe
///
/// Not scope-bound. The tick that issued it must pass it back to
/// [`NeighborCache::release_probe`] once the transmission has completed,
/// whether or not it succeeded.
#[derive(Debug)]
#[must_use = "a probe token must be released after the transmission"]
pub(crate) struct ProbeToken {
    pub ifc: InterfaceId,
    pub slot: usize,
    pub generation: u64,
}

/// Probe tokens issued by one tick and not yet released
///
/// Dropping it releases every remaining token, so a cancelled tick cannot
/// leave an entry locked.
pub(crate) struct PendingProbes<'a> {
    cache: &'a NeighborCache,
    tokens: Vec<ProbeToken>,
}

impl<'a> PendingProbes<'a> {
    pub(crate) fn new(cache: &'a NeighborCache, tokens: Vec<ProbeToken>) -> Self {
        Self { cache, tokens }
    }

    /// Release the token for `slot` once its transmission is over
    pub(crate) fn release(&mut self, slot: usize) {
        if let Some(pos) = self.tokens.iter().position(|token| token.slot == slot) {
            let token = self.tokens.swap_remove(pos);
            self.cache.release_probe(token);
        }
    }
}

impl Drop for PendingProbes<'_> {
    fn drop(&mut self) {
        for token in self.tokens.drain(..) {
            self.cache.release_probe(token);
        }
    }
}
