//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};
use prefix_trie::PrefixMap;
use warden_utils::address::{AddressFamily, IpNetworkExt};

use crate::slot::SlotId;

// Rule database, kept alongside the LPM table (see `lpm.rs`) so that the
// security-hole check and `dump` can enumerate prefixes by containment,
// something a lookup-optimized LPM structure doesn't support cheaply.
#[derive(Debug)]
pub struct Rib {
    v4: PrefixMap<Ipv4Network, SlotId>,
    v6: PrefixMap<Ipv6Network, SlotId>,
}

impl Rib {
    pub fn new() -> Self {
        Rib {
            v4: PrefixMap::new(),
            v6: PrefixMap::new(),
        }
    }

    pub fn add(&mut self, prefix: IpNetwork, slot: SlotId) -> bool {
        match prefix {
            IpNetwork::V4(p) => family_add(&mut self.v4, p, slot),
            IpNetwork::V6(p) => family_add(&mut self.v6, p, slot),
        }
    }

    pub fn remove(&mut self, prefix: IpNetwork) -> Option<SlotId> {
        match prefix {
            IpNetwork::V4(p) => self.v4.remove(&p),
            IpNetwork::V6(p) => self.v6.remove(&p),
        }
    }

    pub fn get(&self, prefix: IpNetwork) -> Option<SlotId> {
        match prefix {
            IpNetwork::V4(p) => self.v4.get(&p).copied(),
            IpNetwork::V6(p) => self.v6.get(&p).copied(),
        }
    }

    // Longest-prefix match over an address, expressed as its host prefix.
    pub fn lookup(&self, prefix: IpNetwork) -> Option<(IpNetwork, SlotId)> {
        match prefix {
            IpNetwork::V4(p) => self
                .v4
                .get_lpm(&p)
                .map(|(p, slot)| (IpNetwork::V4(p), *slot)),
            IpNetwork::V6(p) => self
                .v6
                .get_lpm(&p)
                .map(|(p, slot)| (IpNetwork::V6(p), *slot)),
        }
    }

    // Every entry of the given family, in whatever order the underlying
    // trie iterates. Used by `dump`, which has no containment root to
    // filter against.
    pub fn iter_all(
        &self,
        family: AddressFamily,
    ) -> Box<dyn Iterator<Item = (IpNetwork, SlotId)> + '_> {
        match family {
            AddressFamily::Ipv4 => {
                Box::new(self.v4.iter().map(|(p, slot)| (IpNetwork::V4(p), *slot)))
            }
            AddressFamily::Ipv6 => {
                Box::new(self.v6.iter().map(|(p, slot)| (IpNetwork::V6(p), *slot)))
            }
        }
    }

    // All RIB entries strictly contained in `root`, plus `root` itself if
    // present. Used by the security-hole check when `root`'s new action is
    // `DROP`/`GRANTOR`: no longer prefix may escape protection.
    pub fn iter_longer(
        &self,
        root: IpNetwork,
    ) -> Box<dyn Iterator<Item = (IpNetwork, SlotId)> + '_> {
        match root {
            IpNetwork::V4(root) => {
                Box::new(self.v4.iter().filter_map(move |(p, slot)| {
                    contains_or_eq(&root.into(), &p.into())
                        .then_some((IpNetwork::V4(p), *slot))
                }))
            }
            IpNetwork::V6(root) => {
                Box::new(self.v6.iter().filter_map(move |(p, slot)| {
                    contains_or_eq(&root.into(), &p.into())
                        .then_some((IpNetwork::V6(p), *slot))
                }))
            }
        }
    }

    // All RIB entries that contain `query` (shorter or equal prefixes on
    // the matching branch), walked by successive mask truncation. Bounded
    // by the address family's bit width, so this stays cheap even though
    // it isn't a single trie descent.
    pub fn iter_shorter(
        &self,
        query: IpNetwork,
    ) -> Vec<(IpNetwork, SlotId)> {
        let family = query.address_family();
        let mut out = Vec::new();
        for len in (1..=query.prefix()).rev() {
            let ancestor = match query {
                IpNetwork::V4(p) => {
                    Ipv4Network::new(p.ip(), len).ok().map(IpNetwork::V4)
                }
                IpNetwork::V6(p) => {
                    Ipv6Network::new(p.ip(), len).ok().map(IpNetwork::V6)
                }
            };
            let Some(ancestor) = ancestor.map(|a| a.apply_mask()) else {
                continue;
            };
            if let Some(slot) = self.get(ancestor) {
                out.push((ancestor, slot));
            }
        }
        debug_assert_eq!(family, query.address_family());
        out
    }
}

fn family_add<P: prefix_trie::Prefix>(
    map: &mut PrefixMap<P, SlotId>,
    prefix: P,
    slot: SlotId,
) -> bool {
    if map.get(&prefix).is_some() {
        return false;
    }
    map.insert(prefix, slot);
    true
}

fn contains_or_eq(root: &IpNetwork, candidate: &IpNetwork) -> bool {
    root == candidate || root.is_supernet_of(candidate)
}
