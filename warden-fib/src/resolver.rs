//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! The external link-layer-state collaborator: ARP for IPv4, neighbor
//! discovery for IPv6. The FIB core never performs resolution itself; it
//! only registers interest and reacts to callbacks, which may arrive on
//! an arbitrary worker thread.

use std::net::IpAddr;
use std::sync::Arc;

use warden_utils::MacAddr;

use crate::slot::Interface;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NeighborProto {
    Arp,
    NeighborDiscovery,
}

// One delivery of a resolution callback. `call_again` mirrors the
// contract's null/non-null flag: `false` means this is the final
// delivery for the subscription and the caller must treat the entry as
// released.
#[derive(Clone, Copy, Debug)]
pub struct ResolverEvent {
    pub mapping: Option<MacAddr>,
    pub stale: bool,
    pub call_again: bool,
}

pub type ResolverCallback = Arc<dyn Fn(ResolverEvent) + Send + Sync>;

// Implemented by the embedding appliance. `hold` registers interest in
// `ip` on `iface`'s link; the resolver invokes `callback` zero or more
// times with fresh mappings and exactly once with `call_again: false`
// once the subscription is torn down (either because resolution
// permanently failed or because `put` was called).
pub trait Resolver: Send + Sync {
    fn hold(
        &self,
        proto: NeighborProto,
        ip: IpAddr,
        iface: Interface,
        callback: ResolverCallback,
    ) -> Result<(), ()>;

    fn put(&self, proto: NeighborProto, ip: IpAddr, iface: Interface);
}

pub fn proto_for(addr: IpAddr) -> NeighborProto {
    match addr {
        IpAddr::V4(_) => NeighborProto::Arp,
        IpAddr::V6(_) => NeighborProto::NeighborDiscovery,
    }
}
