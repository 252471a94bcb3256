//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use smallvec::SmallVec;

use crate::l2cache::L2CacheHandle;

// A `GRANTOR` FIB slot forwards to one of several grantor peers, each
// reached through a back-side gateway. `GrantorPair` owns the shared
// layer-2 entry for its gateway so the set can be released member by
// member on teardown.
#[derive(Clone, Debug)]
pub struct GrantorPair {
    pub grantor_ip: IpAddr,
    pub gateway: L2CacheHandle,
}

// An immutable array of grantor pairs, at most 255 entries, published by
// atomic pointer-swap. Readers on the forwarding path load the current
// `Arc` and see either the whole old set or the whole new one, never a
// partial update.
#[derive(Debug)]
pub struct GrantorSet {
    pairs: ArcSwap<SmallVec<[GrantorPair; 4]>>,
}

impl GrantorSet {
    pub const MAX_PAIRS: usize = 255;

    pub fn new(pairs: Vec<GrantorPair>) -> Self {
        GrantorSet {
            pairs: ArcSwap::from_pointee(pairs.into_iter().collect()),
        }
    }

    // Hot-path read: the forwarder loads the current snapshot and picks a
    // pair (e.g. via a hash of the flow) without ever taking a lock.
    pub fn load(&self) -> Arc<SmallVec<[GrantorPair; 4]>> {
        self.pairs.load_full()
    }

    // Publishes a replacement set and returns the previous one, whose
    // members the caller must release only after draining readers.
    pub fn replace(
        &self,
        pairs: Vec<GrantorPair>,
    ) -> Arc<SmallVec<[GrantorPair; 4]>> {
        self.pairs.swap(Arc::new(pairs.into_iter().collect()))
    }

    pub fn len(&self) -> usize {
        self.pairs.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::l2cache::L2CacheEntry;

    #[test]
    fn replace_publishes_new_set_and_returns_old() {
        let ip_a: IpAddr = "198.51.100.1".parse().unwrap();
        let ip_b: IpAddr = "198.51.100.2".parse().unwrap();
        let set = GrantorSet::new(vec![GrantorPair {
            grantor_ip: ip_a,
            gateway: L2CacheEntry::empty(ip_a),
        }]);
        assert_eq!(set.len(), 1);

        let old = set.replace(vec![GrantorPair {
            grantor_ip: ip_b,
            gateway: L2CacheEntry::empty(ip_b),
        }]);
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].grantor_ip, ip_a);
        assert_eq!(set.len(), 1);
        assert_eq!(set.load()[0].grantor_ip, ip_b);
    }
}
