//! Fixed-capacity entry table for one interface

use std::net::Ipv6Addr;

use super::entry::NeighborEntry;
use crate::types::{LinkAddr, NeighborState};

/// Every slot is locked or Static
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Exhausted;

/// Result of [`EntryStore::find_or_allocate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Allocation {
    pub slot: usize,
    /// The slot was Free or reclaimed and now holds `ip` in state Free
    pub created: bool,
    /// Mapping evicted to make room, if it had been committed
    pub replaced: Option<(Ipv6Addr, LinkAddr)>,
}

#[derive(Debug)]
pub(crate) struct EntryStore {
    entries: Vec<NeighborEntry>,
}

impl EntryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![NeighborEntry::free(); capacity],
        }
    }

    pub fn find_existing(&self, ip: &Ipv6Addr) -> Option<usize> {
        self.entries.iter().position(|entry| entry.matches(ip))
    }

    /// Existing entry for `ip`, else a Free slot, else the oldest unlocked
    /// non-Static entry
    ///
    /// Age ties go to the lowest slot index. A newly claimed slot is reset and
    /// keyed to `ip` but left Free; the caller moves it into its first state
    /// before releasing the table.
    pub fn find_or_allocate(&mut self, ip: Ipv6Addr) -> Result<Allocation, Exhausted> {
        if let Some(slot) = self.find_existing(&ip) {
            return Ok(Allocation {
                slot,
                created: false,
                replaced: None,
            });
        }

        let mut free_slot = None;
        let mut oldest: Option<usize> = None;

        for (slot, entry) in self.entries.iter().enumerate() {
            if entry.is_locked() {
                continue;
            }
            if entry.is_free() {
                free_slot = Some(slot);
                break;
            }
            if entry.state == NeighborState::Static {
                continue;
            }
            match oldest {
                Some(best) if entry.life_time <= self.entries[best].life_time => {}
                _ => oldest = Some(slot),
            }
        }

        let (slot, replaced) = match (free_slot, oldest) {
            (Some(slot), _) => (slot, None),
            (None, Some(slot)) => {
                let victim = &self.entries[slot];
                let replaced = victim
                    .state
                    .is_resolved()
                    .then_some((victim.ip, victim.link_addr));
                (slot, replaced)
            }
            (None, None) => return Err(Exhausted),
        };

        let entry = &mut self.entries[slot];
        entry.reset();
        entry.ip = ip;

        Ok(Allocation {
            slot,
            created: true,
            replaced,
        })
    }

    pub fn get(&self, slot: usize) -> &NeighborEntry {
        &self.entries[slot]
    }

    pub fn get_mut(&mut self, slot: usize) -> &mut NeighborEntry {
        &mut self.entries[slot]
    }

    pub fn iter(&self) -> impl Iterator<Item = &NeighborEntry> {
        self.entries.iter()
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Reset every slot, locks included
    pub fn clear(&mut self) {
        self.entries.fill(NeighborEntry::free());
    }
}
