//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Lookup-optimized longest-prefix-match index, kept in lockstep with the
//! [`Rib`](crate::rib::Rib) but laid out differently: keys are the
//! address's bits in host order, walked most-significant-bit first, so
//! branch nodes fall on the numerically significant bits of the address
//! rather than on its wire-order byte boundaries.

use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};

use crate::slot::SlotId;

trait HostKey: Copy {
    const BITS: u8;

    fn bit(&self, index: u8) -> bool;
}

impl HostKey for u32 {
    const BITS: u8 = 32;

    fn bit(&self, index: u8) -> bool {
        (self >> (31 - index)) & 1 == 1
    }
}

impl HostKey for u128 {
    const BITS: u8 = 128;

    fn bit(&self, index: u8) -> bool {
        (self >> (127 - index)) & 1 == 1
    }
}

#[derive(Clone)]
struct Node<K> {
    key: K,
    len: u8,
    slot: Option<SlotId>,
    children: [Option<Box<Node<K>>>; 2],
}

impl<K: HostKey> Node<K> {
    fn leaf(key: K, len: u8) -> Self {
        Node {
            key,
            len,
            slot: None,
            children: [None, None],
        }
    }
}

#[derive(Clone)]
struct Trie<K> {
    root: Option<Box<Node<K>>>,
}

impl<K: HostKey> Trie<K> {
    fn new() -> Self {
        Trie { root: None }
    }

    // Returns `false` without modifying the trie if a slot is already
    // installed at this exact key/length (the RIB is the source of truth
    // for duplicate rejection; this is a defensive check against the two
    // structures drifting out of lockstep).
    fn insert(&mut self, key: K, len: u8, slot: SlotId) -> bool {
        let mut cur = self.root.get_or_insert_with(|| {
            Box::new(Node::leaf(key, 0))
        });
        for depth in 0..len {
            let bit = key.bit(depth) as usize;
            cur = cur.children[bit]
                .get_or_insert_with(|| Box::new(Node::leaf(key, depth + 1)));
        }
        if cur.slot.is_some() {
            return false;
        }
        cur.slot = Some(slot);
        true
    }

    fn remove(&mut self, key: K, len: u8) -> Option<SlotId> {
        let mut cur = self.root.as_mut()?;
        for depth in 0..len {
            let bit = key.bit(depth) as usize;
            cur = cur.children[bit].as_mut()?;
        }
        cur.slot.take()
    }

    fn get(&self, key: K, len: u8) -> Option<SlotId> {
        let mut cur = self.root.as_deref()?;
        for depth in 0..len {
            let bit = key.bit(depth) as usize;
            cur = cur.children[bit].as_deref()?;
        }
        cur.slot
    }

    // Walks from the root along `key`'s bits, remembering the deepest
    // node that carries an installed slot.
    fn lookup(&self, key: K) -> Option<(K, u8, SlotId)> {
        let mut cur = self.root.as_deref()?;
        let mut best = cur.slot.map(|s| (cur.key, cur.len, s));
        for depth in 0..K::BITS {
            let bit = key.bit(depth) as usize;
            match &cur.children[bit] {
                Some(next) => {
                    cur = next;
                    if let Some(slot) = cur.slot {
                        best = Some((cur.key, cur.len, slot));
                    }
                }
                None => break,
            }
        }
        best
    }
}

// Top-level LPM table, one bit-trie per address family.
#[derive(Clone)]
pub struct Lpm {
    v4: Trie<u32>,
    v6: Trie<u128>,
}

impl Lpm {
    pub fn new() -> Self {
        Lpm {
            v4: Trie::new(),
            v6: Trie::new(),
        }
    }

    // Returns `false` if a slot was already installed at this prefix
    // (see [`Trie::insert`]); the caller must then roll back the matching
    // RIB insertion.
    pub fn add(&mut self, prefix: IpNetwork, slot: SlotId) -> bool {
        match prefix {
            IpNetwork::V4(p) => {
                self.v4.insert(host_key_v4(p), p.prefix(), slot)
            }
            IpNetwork::V6(p) => {
                self.v6.insert(host_key_v6(p), p.prefix(), slot)
            }
        }
    }

    pub fn remove(&mut self, prefix: IpNetwork) -> Option<SlotId> {
        match prefix {
            IpNetwork::V4(p) => self.v4.remove(host_key_v4(p), p.prefix()),
            IpNetwork::V6(p) => self.v6.remove(host_key_v6(p), p.prefix()),
        }
    }

    // Longest-prefix match against a single address.
    pub fn lookup(&self, addr: std::net::IpAddr) -> Option<SlotId> {
        match addr {
            std::net::IpAddr::V4(a) => {
                self.v4.lookup(u32::from(a)).map(|(_, _, s)| s)
            }
            std::net::IpAddr::V6(a) => {
                self.v6.lookup(u128::from(a)).map(|(_, _, s)| s)
            }
        }
    }
}

impl Default for Lpm {
    fn default() -> Self {
        Self::new()
    }
}

fn host_key_v4(net: Ipv4Network) -> u32 {
    u32::from(net.ip())
}

fn host_key_v6(net: Ipv6Network) -> u128 {
    u128::from(net.ip())
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn v4(addr: &str, len: u8) -> IpNetwork {
        IpNetwork::V4(Ipv4Network::new(addr.parse::<Ipv4Addr>().unwrap(), len).unwrap())
    }

    #[test]
    fn longest_prefix_wins() {
        let mut lpm = Lpm::new();
        lpm.add(v4("10.0.0.0", 8), SlotId(1));
        lpm.add(v4("10.1.0.0", 16), SlotId(2));
        lpm.add(v4("10.1.2.0", 24), SlotId(3));

        assert_eq!(
            lpm.lookup("10.1.2.5".parse().unwrap()),
            Some(SlotId(3))
        );
        assert_eq!(
            lpm.lookup("10.1.3.5".parse().unwrap()),
            Some(SlotId(2))
        );
        assert_eq!(
            lpm.lookup("10.2.0.0".parse().unwrap()),
            Some(SlotId(1))
        );
        assert_eq!(lpm.lookup("192.0.2.1".parse().unwrap()), None);
    }

    #[test]
    fn remove_falls_back_to_covering_prefix() {
        let mut lpm = Lpm::new();
        lpm.add(v4("10.0.0.0", 8), SlotId(1));
        lpm.add(v4("10.1.0.0", 16), SlotId(2));

        assert_eq!(lpm.remove(v4("10.1.0.0", 16)), Some(SlotId(2)));
        assert_eq!(
            lpm.lookup("10.1.2.3".parse().unwrap()),
            Some(SlotId(1))
        );
    }
}
