// # Router List Trait
//
// The Default Router List lives outside the neighbor cache. The cache only
// tells it when an advertisement shows that a neighbor is no longer a router.

use async_trait::async_trait;
use std::net::Ipv6Addr;

use crate::types::InterfaceId;

/// Default router list collaborator
#[async_trait]
pub trait RouterList: Send + Sync {
    /// Drop `ip` from the default router list of `ifc`
    async fn retract(&self, ifc: InterfaceId, ip: Ipv6Addr);
}
