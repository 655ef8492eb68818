//! Channel-backed change notifier
//!
//! [`ChannelNotifier`] turns [`ChangeNotifier`] callouts into [`NeighborEvent`]s
//! on a bounded `tokio::sync::mpsc` channel. A slow consumer never stalls the
//! cache: when the channel is full the event is dropped with a warning.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::Ipv6Addr;
use tokio::sync::mpsc;
use tracing::warn;

use crate::traits::ChangeNotifier;
use crate::types::{InterfaceId, LinkAddr};

/// A committed mapping change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborEvent {
    pub ifc: InterfaceId,
    pub ip: Ipv6Addr,
    pub link_addr: LinkAddr,
    /// `false` when the mapping was removed
    pub valid: bool,
}

/// [`ChangeNotifier`] that forwards events to an mpsc receiver
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<NeighborEvent>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiver that yields its events
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<NeighborEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ChangeNotifier for ChannelNotifier {
    async fn neighbor_changed(&self, ifc: InterfaceId, ip: Ipv6Addr, link_addr: LinkAddr, valid: bool) {
        let event = NeighborEvent {
            ifc,
            ip,
            link_addr,
            valid,
        };

        if self.tx.try_send(event).is_err() {
            warn!(
                "Neighbor event channel full or closed, dropping event for {} on interface {}",
                ip, ifc
            );
        }
    }
}
