//! Collaborator traits for the neighbor cache
//!
//! The cache never touches the wire or any other table directly; it calls out
//! through these interfaces after releasing its exclusive region.
//!
//! - [`NdpLink`]: Transmit solicitations/advertisements, answer local-address queries
//! - [`ChangeNotifier`]: Mirror committed IP → link-layer mappings elsewhere
//! - [`RouterList`]: Default router list, told when a neighbor stops being a router

pub mod link;
pub mod notifier;
pub mod router_list;

pub use link::{AdvertisementReply, NdpLink, SolicitationRequest};
pub use notifier::ChangeNotifier;
pub use router_list::RouterList;
