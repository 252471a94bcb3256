//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;

use warden_utils::MacAddr;

use crate::error::NoSpaceError;
use crate::l2cache::{L2CacheEntry, L2CacheHandle};
use crate::slot::Interface;

// Per-interface, per-family hash table from neighbor address to a shared
// layer-2 cache entry. Entries live in a fixed-capacity array; the hash
// table only ever holds indices into it. Capacity is chosen once, at
// construction, from the interface's LAN sizing rule.
//
// The internal mutex exists because this structure is touched both by the
// control thread (acquire/release, under the FIB manager's lock) and by
// resolver worker threads canceling a subscription concurrently with a
// fresh acquire of the same address; it has nothing to do with the
// lock-free discipline the forwarder hot path relies on, which only ever
// touches the `L2CacheEntry` handles it already holds.
#[derive(Debug)]
pub struct NeighborTable {
    pub iface: Interface,
    local_mac: MacAddr,
    header_ethertype: u16,
    vlan_id: Option<u16>,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    entries: Vec<L2CacheHandle>,
    index: HashMap<IpAddr, usize>,
    cursor: usize,
}

pub enum Acquired {
    Existing(L2CacheHandle),
    Created(L2CacheHandle),
}

impl NeighborTable {
    pub fn new(
        iface: Interface,
        capacity: usize,
        local_mac: MacAddr,
        header_ethertype: u16,
        vlan_id: Option<u16>,
    ) -> Self {
        let entries = (0..capacity)
            .map(|_| L2CacheEntry::empty(unspecified_placeholder()))
            .collect();
        NeighborTable {
            iface,
            local_mac,
            header_ethertype,
            vlan_id,
            inner: Mutex::new(Inner {
                entries,
                index: HashMap::new(),
                cursor: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    // Looks up or creates the cache entry for `neighbor_ip`, bumping its
    // reference count. Returns `NoSpace` if the table is full of active
    // entries. The caller is responsible for registering the resolver
    // subscription when a new entry is created.
    pub fn acquire(
        &self,
        neighbor_ip: IpAddr,
    ) -> Result<Acquired, NoSpaceError> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(&idx) = inner.index.get(&neighbor_ip) {
            let handle = inner.entries[idx].clone();
            handle.bump();
            return Ok(Acquired::Existing(handle));
        }

        let capacity = inner.entries.len();
        for offset in 0..capacity {
            let idx = (inner.cursor + offset) % capacity;
            if inner.entries[idx].is_free() {
                let template = self.header_template();
                let entry = L2CacheEntry::empty(neighbor_ip);
                entry.reset(template);
                inner.entries[idx] = entry.clone();
                inner.index.insert(neighbor_ip, idx);
                inner.cursor = (idx + 1) % capacity;
                return Ok(Acquired::Created(entry));
            }
        }

        Err(NoSpaceError::NeighborTableFull(neighbor_ip))
    }

    // Decrements the reference count for `neighbor_ip`. Returns the
    // handle if the caller must now cancel the resolver subscription (the
    // table has already forgotten this address; the handle itself will
    // be zeroed by the eventual finalization callback).
    pub fn release(&self, neighbor_ip: IpAddr) -> Option<L2CacheHandle> {
        let mut inner = self.inner.lock().unwrap();
        let idx = *inner.index.get(&neighbor_ip)?;
        let handle = inner.entries[idx].clone();
        let must_cancel = handle.release();
        if must_cancel {
            inner.index.remove(&neighbor_ip);
        }
        must_cancel.then_some(handle)
    }

    pub fn dump(&self, mut f: impl FnMut(IpAddr, u32, bool)) {
        let inner = self.inner.lock().unwrap();
        for (&ip, &idx) in inner.index.iter() {
            let entry = &inner.entries[idx];
            f(ip, entry.ref_count(), entry.load().stale);
        }
    }

    fn header_template(&self) -> Vec<u8> {
        match self.vlan_id {
            Some(vlan) => MacAddr::eth_header_vlan(
                MacAddr::UNSPECIFIED,
                self.local_mac,
                vlan,
                self.header_ethertype,
            ),
            None => MacAddr::eth_header(
                MacAddr::UNSPECIFIED,
                self.local_mac,
                self.header_ethertype,
            ),
        }
    }
}

fn unspecified_placeholder() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}
