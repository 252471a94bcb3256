//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};

// Address family of a prefix or address handled by the FIB core.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

// Extension methods for IpAddr.
pub trait IpAddrExt {
    // Returns true if this address is eligible to be used as a neighbor or
    // gateway address (not loopback, broadcast, multicast or unspecified).
    fn is_usable(&self) -> bool;

    // Converts this address into a host prefix (prefix length equal to the
    // address family's full width).
    fn to_host_prefix(&self) -> IpNetwork;

    fn address_family(&self) -> AddressFamily;
}

// Extension methods for IpNetwork.
pub trait IpNetworkExt {
    // Applies the network mask to the prefix, discarding any host bits.
    #[must_use]
    fn apply_mask(&self) -> IpNetwork;

    fn address_family(&self) -> AddressFamily;

    // Returns true if `addr` falls within this prefix.
    fn contains_addr(&self, addr: IpAddr) -> bool;

    // Returns true if `self` is a strict supernet of `other` (same family,
    // `self` shorter, and `other` falls within `self`).
    fn is_supernet_of(&self, other: &IpNetwork) -> bool;
}

// ===== impl AddressFamily =====

impl AddressFamily {
    pub fn addr_len(&self) -> usize {
        match self {
            AddressFamily::Ipv4 => 4,
            AddressFamily::Ipv6 => 16,
        }
    }

    pub fn max_prefixlen(&self) -> u8 {
        match self {
            AddressFamily::Ipv4 => Ipv4Network::MAX_PREFIXLEN,
            AddressFamily::Ipv6 => Ipv6Network::MAX_PREFIXLEN,
        }
    }
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

// ===== impl IpAddr =====

impl IpAddrExt for IpAddr {
    fn is_usable(&self) -> bool {
        !(self.is_loopback() || self.is_multicast() || self.is_unspecified())
            && match self {
                IpAddr::V4(addr) => !addr.is_broadcast(),
                IpAddr::V6(_) => true,
            }
    }

    fn to_host_prefix(&self) -> IpNetwork {
        match self {
            IpAddr::V4(addr) => {
                Ipv4Network::new(*addr, Ipv4Network::MAX_PREFIXLEN)
                    .unwrap()
                    .into()
            }
            IpAddr::V6(addr) => {
                Ipv6Network::new(*addr, Ipv6Network::MAX_PREFIXLEN)
                    .unwrap()
                    .into()
            }
        }
    }

    fn address_family(&self) -> AddressFamily {
        match self {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }
}

// ===== impl IpNetwork =====

impl IpNetworkExt for IpNetwork {
    fn apply_mask(&self) -> IpNetwork {
        match self {
            IpNetwork::V4(prefix) => {
                Ipv4Network::new(prefix.network(), prefix.prefix())
                    .unwrap()
                    .into()
            }
            IpNetwork::V6(prefix) => {
                Ipv6Network::new(prefix.network(), prefix.prefix())
                    .unwrap()
                    .into()
            }
        }
    }

    fn address_family(&self) -> AddressFamily {
        match self {
            IpNetwork::V4(_) => AddressFamily::Ipv4,
            IpNetwork::V6(_) => AddressFamily::Ipv6,
        }
    }

    fn contains_addr(&self, addr: IpAddr) -> bool {
        self.contains(addr)
    }

    fn is_supernet_of(&self, other: &IpNetwork) -> bool {
        match (self, other) {
            (IpNetwork::V4(a), IpNetwork::V4(b)) => {
                a.prefix() < b.prefix() && Ipv4Network::is_supernet_of(*a, *b)
            }
            (IpNetwork::V6(a), IpNetwork::V6(b)) => {
                a.prefix() < b.prefix() && Ipv6Network::is_supernet_of(*a, *b)
            }
            _ => false,
        }
    }
}

// Neighbor-table capacity implied by a LAN prefix, per the address
// family's sizing rule (see the neighbor cache module for how IPv6 uses
// an explicit bound instead).
pub fn ipv4_host_capacity(prefix: &Ipv4Network) -> usize {
    let host_bits = Ipv4Network::MAX_PREFIXLEN - prefix.prefix();
    1usize << host_bits
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    use super::*;

    #[test]
    fn usable_addresses() {
        assert!(IpAddr::from_str("10.0.0.1").unwrap().is_usable());
        assert!(!IpAddr::from_str("0.0.0.0").unwrap().is_usable());
        assert!(!IpAddr::from_str("255.255.255.255").unwrap().is_usable());
        assert!(!IpAddr::from_str("224.0.0.1").unwrap().is_usable());
    }

    #[test]
    fn supernet_relation() {
        let narrow: IpNetwork =
            Ipv4Network::new(Ipv4Addr::new(10, 1, 1, 0), 24)
                .unwrap()
                .into();
        let wide: IpNetwork = Ipv4Network::new(Ipv4Addr::new(10, 1, 0, 0), 16)
            .unwrap()
            .into();
        assert!(wide.is_supernet_of(&narrow));
        assert!(!narrow.is_supernet_of(&wide));
        assert!(!wide.is_supernet_of(&wide));
    }

    #[test]
    fn host_capacity() {
        let lan = Ipv4Network::new(Ipv4Addr::new(10, 0, 0, 0), 24).unwrap();
        assert_eq!(ipv4_host_capacity(&lan), 256);
    }
}
