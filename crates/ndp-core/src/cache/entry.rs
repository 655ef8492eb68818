//! One slot of a neighbor table

use std::net::Ipv6Addr;

use crate::types::{LinkAddr, NeighborSnapshot, NeighborState};

/// Neighbor cache entry
///
/// Only ever touched while the owning table's mutex is held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NeighborEntry {
    pub ip: Ipv6Addr,
    pub link_addr: LinkAddr,
    pub state: NeighborState,
    /// Ticks since creation or reuse, saturating
    pub life_time: u32,
    /// Ticks until the state's timeout action
    pub timer: u16,
    /// Solicitations sent in the current resolution or probe cycle
    pub retry_count: u8,
    /// Outstanding reservations; a locked entry is never evicted
    pub lock: u32,
    pub is_router: bool,
}

impl NeighborEntry {
    pub fn free() -> Self {
        Self {
            ip: Ipv6Addr::UNSPECIFIED,
            link_addr: LinkAddr::UNKNOWN,
            state: NeighborState::Free,
            life_time: 0,
            timer: 0,
            retry_count: 0,
            lock: 0,
            is_router: false,
        }
    }

    /// Return the slot to Free
    pub fn reset(&mut self) {
        debug_assert_eq!(self.lock, 0, "freeing locked neighbor {}", self.ip);
        *self = Self::free();
    }

    pub fn is_free(&self) -> bool {
        self.state == NeighborState::Free
    }

    pub fn is_locked(&self) -> bool {
        self.lock > 0
    }

    /// Non-Free entry for `ip`
    pub fn matches(&self, ip: &Ipv6Addr) -> bool {
        !self.is_free() && self.ip == *ip
    }

    pub fn age(&mut self) {
        self.life_time = self.life_time.saturating_add(1);
    }

    pub fn acquire(&mut self) {
        self.lock = self
            .lock
            .checked_add(1)
            .unwrap_or_else(|| panic!("lock count overflow on neighbor {}", self.ip));
    }

    pub fn release(&mut self) {
        assert!(self.lock > 0, "unbalanced unlock of neighbor {}", self.ip);
        self.lock -= 1;
    }

    pub fn snapshot(&self) -> NeighborSnapshot {
        NeighborSnapshot {
            ip: self.ip,
            link_addr: self.link_addr,
            state: self.state,
        }
    }
}

impl Default for NeighborEntry {
    fn default() -> Self {
        Self::free()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_entries_match_nothing() {
        let entry = NeighborEntry::free();
        assert!(!entry.matches(&Ipv6Addr::UNSPECIFIED));
    }

    #[test]
    fn life_time_saturates() {
        let mut entry = NeighborEntry {
            life_time: u32::MAX,
            ..NeighborEntry::free()
        };
        entry.age();
        assert_eq!(entry.life_time, u32::MAX);
    }

    #[test]
    #[should_panic(expected = "unbalanced unlock")]
    fn release_without_acquire_panics() {
        NeighborEntry::free().release();
    }

    #[test]
    fn reset_returns_slot_to_free() {
        let mut entry = NeighborEntry {
            ip: "fe80::1".parse().unwrap(),
            link_addr: LinkAddr([2, 0, 0, 0, 0, 1]),
            state: NeighborState::Reachable,
            life_time: 9,
            timer: 3,
            retry_count: 2,
            lock: 0,
            is_router: true,
        };
        entry.reset();
        assert_eq!(entry, NeighborEntry::free());
    }
}
