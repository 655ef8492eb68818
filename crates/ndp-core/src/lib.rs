// # ndp-core
//
// IPv6 Neighbor Discovery neighbor cache for embedded network stacks.
//
// ## Architecture Overview
//
// This library keeps, per network interface, a bounded table mapping IPv6
// addresses to link-layer addresses and runs the RFC 4861 Neighbor
// Unreachability Detection state machine over it:
// - **NeighborCache**: lookup-and-lock resolver, inbound message updater and
//   administrative operations
// - **NdpEngine**: periodic driver that ages entries and retransmits solicitations
// - **NdpLink**: trait for the IPv6 layer that actually transmits NDP messages
// - **ChangeNotifier**: trait for mirroring cache changes into an external table
// - **RouterList**: trait for the default router list collaborator
//
// ## Design Principles
//
// 1. **One exclusive region per interface**: every entry mutation happens under
//    the interface table's mutex
// 2. **Side effects after release**: transmissions and callouts run after the
//    mutex is released, on values copied out of the table
// 3. **Handles, not references**: consumers hold opaque slot handles, never
//    references into the table
// 4. **Library-First**: the daemon is a thin shell around this crate

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod traits;
pub mod types;
pub mod wire;

// Re-export core types for convenience
pub use cache::{Lookup, NeighborCache, NeighborGuard, NeighborHandle};
pub use config::{CacheConfig, EngineConfig, NdpConfig, NudConfig};
pub use engine::NdpEngine;
pub use error::{Error, Result};
pub use notify::{ChannelNotifier, NeighborEvent};
pub use traits::{AdvertisementReply, ChangeNotifier, NdpLink, RouterList, SolicitationRequest};
pub use types::{AdvertFlags, InterfaceId, LinkAddr, NeighborSnapshot, NeighborState};
pub use wire::WireError;
