//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use arc_swap::ArcSwap;
use tracing::warn;
use warden_utils::MacAddr;

// The Ethernet (optionally VLAN-tagged) header and its staleness flag, as
// published by the resolver. Readers load this with a single atomic
// pointer read and never observe a torn header.
#[derive(Clone, Debug)]
pub struct HeaderSnapshot {
    pub header: Vec<u8>,
    pub stale: bool,
}

impl HeaderSnapshot {
    fn empty() -> Self {
        HeaderSnapshot {
            header: Vec::new(),
            stale: true,
        }
    }
}

// A reference-counted layer-2 header cache entry. One entry per resolved
// neighbor; shared by every FIB slot (gateway or grantor pair) that routes
// through that neighbor.
#[derive(Debug)]
pub struct L2CacheEntry {
    pub neighbor_ip: IpAddr,
    ref_cnt: AtomicU32,
    snapshot: ArcSwap<HeaderSnapshot>,
}

pub type L2CacheHandle = Arc<L2CacheEntry>;

impl L2CacheEntry {
    pub(crate) fn empty(neighbor_ip: IpAddr) -> L2CacheHandle {
        Arc::new(L2CacheEntry {
            neighbor_ip,
            ref_cnt: AtomicU32::new(0),
            snapshot: ArcSwap::from_pointee(HeaderSnapshot::empty()),
        })
    }

    pub fn is_free(&self) -> bool {
        self.ref_cnt.load(Ordering::Acquire) == 0
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_cnt.load(Ordering::Acquire)
    }

    // Loads a consistent snapshot of the current header and staleness
    // flag. Safe to call without any lock; this is the hot-path read.
    pub fn load(&self) -> Arc<HeaderSnapshot> {
        self.snapshot.load_full()
    }

    pub(crate) fn reset(&self, template: Vec<u8>) {
        self.ref_cnt.store(1, Ordering::Release);
        self.snapshot.store(Arc::new(HeaderSnapshot {
            header: template,
            stale: true,
        }));
    }

    pub(crate) fn bump(&self) {
        self.ref_cnt.fetch_add(1, Ordering::AcqRel);
    }

    // Decrements the reference count. Returns `true` if the caller must
    // cancel the outstanding resolver subscription (the count was 1, and
    // the eventual finalization callback is now solely responsible for
    // zeroing the entry). The decrement itself is a CAS loop that never
    // takes the count below 1: the 1 -> 0 transition is the resolver's.
    pub(crate) fn release(&self) -> bool {
        loop {
            let cur = self.ref_cnt.load(Ordering::Acquire);
            if cur >= 2 {
                match self.ref_cnt.compare_exchange(
                    cur,
                    cur - 1,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return false,
                    Err(_) => continue,
                }
            }
            return true;
        }
    }

    // Publishes a freshly resolved header.
    pub(crate) fn publish(&self, header: Vec<u8>, stale: bool) {
        self.snapshot.store(Arc::new(HeaderSnapshot { header, stale }));
    }

    // Invoked by the resolver's finalization callback. The entry is
    // expected to be at ref_cnt == 1 at this point (the last holder
    // having already canceled its subscription); if not, the count is
    // forced to zero and a warning is logged, matching the tolerant
    // behavior of the system this core is modeled on.
    pub(crate) fn finalize(&self) {
        let prev = self.ref_cnt.swap(0, Ordering::AcqRel);
        if prev != 1 {
            warn!(
                neighbor = %self.neighbor_ip,
                ref_cnt = prev,
                "finalizing layer-2 cache entry with unexpected reference count"
            );
        }
        self.snapshot.store(Arc::new(HeaderSnapshot::empty()));
    }

    pub(crate) fn patch_mac(&self, mac: MacAddr) -> Vec<u8> {
        let current = self.snapshot.load();
        let mut header = current.header.clone();
        if header.len() >= 6 {
            MacAddr::patch_dst(&mut header, mac);
        }
        header
    }
}
