//! NUD state transitions
//!
//! Pure functions over a single [`NeighborEntry`]. They run inside the table's
//! exclusive region and never perform I/O; anything that has to leave the
//! region (a transmission, a notification) is described by the return value
//! and carried out by the caller after release.

use std::net::Ipv6Addr;

use super::entry::NeighborEntry;
use crate::config::NudConfig;
use crate::traits::SolicitationRequest;
use crate::types::{AdvertFlags, LinkAddr, NeighborState};

/// NUD timers and limits, in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NudTimers {
    pub retrans: u16,
    pub delay: u16,
    pub reachable: u16,
    pub max_multicast: u8,
    pub max_unicast: u8,
}

impl From<&NudConfig> for NudTimers {
    fn from(config: &NudConfig) -> Self {
        Self {
            retrans: config.retrans_timer_secs,
            delay: config.delay_first_probe_secs,
            reachable: config.reachable_time_secs,
            max_multicast: config.max_multicast_solicit,
            max_unicast: config.max_unicast_solicit,
        }
    }
}

/// Side effects owed after an inbound message or administrative update
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Outcome {
    /// The committed IP → link-layer mapping was created or changed
    pub committed: bool,
    /// The neighbor stopped advertising itself as a router
    pub retract_router: bool,
}

/// What a lookup did to the entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LookupStep {
    /// Entry usable, one lock reference taken
    Locked,
    /// Resolution already under way
    Pending,
    /// Resolution just started, first multicast solicitation owed
    Resolve,
}

/// What a timer tick asks of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickAction {
    Idle,
    /// Retransmit a multicast solicitation for an Incomplete entry
    Solicit(SolicitationRequest),
    /// Send a unicast probe; a lock reference was taken for the transmission
    Probe(SolicitationRequest),
    /// Resolution failed, entry freed
    Unresolved(Ipv6Addr),
    /// Probing failed, entry freed
    Unreachable(Ipv6Addr, LinkAddr),
}

/// Free → Incomplete
pub(crate) fn start_resolution(entry: &mut NeighborEntry, timers: &NudTimers) {
    entry.state = NeighborState::Incomplete;
    entry.link_addr = LinkAddr::UNKNOWN;
    entry.timer = timers.retrans;
    entry.retry_count = 1;
    entry.life_time = 0;
    entry.is_router = false;
}

pub(crate) fn lookup(entry: &mut NeighborEntry, timers: &NudTimers) -> LookupStep {
    match entry.state {
        NeighborState::Reachable | NeighborState::Static | NeighborState::Delay | NeighborState::Probe => {
            entry.acquire();
            LookupStep::Locked
        }
        NeighborState::Stale => {
            entry.state = NeighborState::Delay;
            entry.timer = timers.delay;
            entry.retry_count = 0;
            entry.acquire();
            LookupStep::Locked
        }
        NeighborState::Incomplete => LookupStep::Pending,
        NeighborState::Free => {
            start_resolution(entry, timers);
            LookupStep::Resolve
        }
    }
}

/// One retry engine step for a single slot
pub(crate) fn tick(entry: &mut NeighborEntry, timers: &NudTimers) -> TickAction {
    match entry.state {
        NeighborState::Free | NeighborState::Static => return TickAction::Idle,
        NeighborState::Stale => {
            entry.age();
            return TickAction::Idle;
        }
        NeighborState::Incomplete
        | NeighborState::Delay
        | NeighborState::Probe
        | NeighborState::Reachable => {}
    }

    entry.age();
    entry.timer = entry.timer.saturating_sub(1);
    if entry.timer > 0 {
        return TickAction::Idle;
    }

    match entry.state {
        NeighborState::Incomplete if entry.retry_count >= timers.max_multicast => {
            let ip = entry.ip;
            entry.reset();
            TickAction::Unresolved(ip)
        }
        NeighborState::Incomplete => {
            entry.timer = timers.retrans;
            entry.retry_count = entry.retry_count.saturating_add(1);
            TickAction::Solicit(SolicitationRequest::multicast(entry.ip))
        }
        NeighborState::Probe if entry.retry_count >= timers.max_unicast => {
            if entry.is_locked() {
                // held by a consumer; evict on the first tick after it unlocks
                entry.timer = 1;
                return TickAction::Idle;
            }
            let (ip, link_addr) = (entry.ip, entry.link_addr);
            entry.reset();
            TickAction::Unreachable(ip, link_addr)
        }
        NeighborState::Delay | NeighborState::Probe => {
            entry.state = NeighborState::Probe;
            entry.timer = timers.retrans;
            entry.retry_count = entry.retry_count.saturating_add(1);
            entry.acquire();
            TickAction::Probe(SolicitationRequest::unicast(entry.ip, entry.link_addr))
        }
        NeighborState::Reachable => {
            entry.state = NeighborState::Stale;
            TickAction::Idle
        }
        NeighborState::Free | NeighborState::Stale | NeighborState::Static => TickAction::Idle,
    }
}

fn confirm(entry: &mut NeighborEntry, timers: &NudTimers) {
    entry.state = NeighborState::Reachable;
    entry.timer = timers.reachable;
    entry.retry_count = 0;
}

fn set_router(entry: &mut NeighborEntry, is_router: bool, outcome: &mut Outcome) {
    outcome.retract_router = entry.is_router && !is_router;
    entry.is_router = is_router;
}

/// Apply a Neighbor Advertisement to an existing entry
pub(crate) fn advertisement(
    entry: &mut NeighborEntry,
    link_addr: Option<LinkAddr>,
    flags: AdvertFlags,
    defensive: bool,
    timers: &NudTimers,
) -> Outcome {
    let mut outcome = Outcome::default();

    match entry.state {
        NeighborState::Free | NeighborState::Static => {}
        NeighborState::Incomplete => {
            let Some(addr) = link_addr else {
                return outcome;
            };
            if flags.solicited {
                entry.link_addr = addr;
                confirm(entry, timers);
            } else if !defensive {
                entry.link_addr = addr;
                entry.state = NeighborState::Stale;
            } else {
                return outcome;
            }
            set_router(entry, flags.router, &mut outcome);
            outcome.committed = true;
        }
        NeighborState::Stale | NeighborState::Delay | NeighborState::Probe | NeighborState::Reachable => {
            let differs = link_addr.is_some_and(|addr| addr != entry.link_addr);
            let unlocked = !entry.is_locked();

            match (flags.solicited, flags.override_flag) {
                (true, true) => {
                    if differs && unlocked {
                        entry.link_addr = link_addr.unwrap_or(entry.link_addr);
                        outcome.committed = true;
                    }
                    if !differs || unlocked {
                        confirm(entry, timers);
                        set_router(entry, flags.router, &mut outcome);
                    }
                }
                (true, false) if !differs => {
                    confirm(entry, timers);
                    set_router(entry, flags.router, &mut outcome);
                }
                (false, true) if differs && unlocked && !defensive => {
                    entry.link_addr = link_addr.unwrap_or(entry.link_addr);
                    entry.state = NeighborState::Stale;
                    set_router(entry, flags.router, &mut outcome);
                    outcome.committed = true;
                }
                _ => {}
            }
        }
    }

    outcome
}

/// Apply the source link-layer address of a solicitation
///
/// `created` means the slot was claimed for this message and is still Free.
/// The router flag can be raised here but only an advertisement clears it.
pub(crate) fn solicitation(
    entry: &mut NeighborEntry,
    link_addr: LinkAddr,
    is_router: bool,
    created: bool,
) -> Outcome {
    let mut outcome = Outcome::default();
    let differs = link_addr != entry.link_addr;
    let unlocked = !entry.is_locked();

    if created {
        entry.link_addr = link_addr;
        entry.state = NeighborState::Stale;
        entry.is_router = is_router;
        outcome.committed = true;
        return outcome;
    }

    match entry.state {
        NeighborState::Free | NeighborState::Static => {}
        NeighborState::Reachable => {
            if differs {
                if unlocked {
                    entry.link_addr = link_addr;
                    entry.is_router |= is_router;
                    outcome.committed = true;
                }
                entry.state = NeighborState::Stale;
            }
        }
        NeighborState::Incomplete | NeighborState::Stale | NeighborState::Delay | NeighborState::Probe => {
            if differs && unlocked {
                entry.link_addr = link_addr;
                entry.is_router |= is_router;
                entry.state = NeighborState::Stale;
                outcome.committed = true;
            }
        }
    }

    outcome
}

/// Upper-layer reachability hint
pub(crate) fn reachability_confirmed(entry: &mut NeighborEntry, timers: &NudTimers) -> bool {
    match entry.state {
        NeighborState::Delay | NeighborState::Stale | NeighborState::Reachable => {
            confirm(entry, timers);
            true
        }
        _ => false,
    }
}

/// Administrative Static/Reachable assignment
pub(crate) fn administrative_set(
    entry: &mut NeighborEntry,
    link_addr: LinkAddr,
    state: NeighborState,
    created: bool,
    timers: &NudTimers,
) -> Outcome {
    let changed = created || entry.link_addr != link_addr;
    entry.link_addr = link_addr;

    if state == NeighborState::Reachable {
        confirm(entry, timers);
    } else {
        entry.state = state;
        entry.timer = 0;
        entry.retry_count = 0;
    }

    Outcome {
        committed: changed,
        retract_router: false,
    }
}
