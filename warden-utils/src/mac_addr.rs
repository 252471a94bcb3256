//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

// 48-bit MAC address (IEEE EUI-48 format).
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct MacAddr([u8; 6]);

// EtherType values relevant to the forwarding header templates below.
pub mod ether_type {
    pub const IPV4: u16 = 0x0800;
    pub const IPV6: u16 = 0x86dd;
    pub const VLAN: u16 = 0x8100;
}

// ===== impl MacAddr =====

impl MacAddr {
    pub const UNSPECIFIED: Self = Self([0; 6]);

    pub fn as_bytes(&self) -> [u8; 6] {
        self.0
    }

    // Builds an untagged Ethernet header template (dst, src, ethertype).
    pub fn eth_header(dst: MacAddr, src: MacAddr, ethertype: u16) -> Vec<u8> {
        let mut buf = Vec::with_capacity(14);
        buf.extend_from_slice(&dst.0);
        buf.extend_from_slice(&src.0);
        buf.extend_from_slice(&ethertype.to_be_bytes());
        buf
    }

    // Builds a VLAN-tagged Ethernet header template (dst, src, 802.1Q tag,
    // inner ethertype).
    pub fn eth_header_vlan(
        dst: MacAddr,
        src: MacAddr,
        vlan_id: u16,
        ethertype: u16,
    ) -> Vec<u8> {
        let mut buf = Vec::with_capacity(18);
        buf.extend_from_slice(&dst.0);
        buf.extend_from_slice(&src.0);
        buf.extend_from_slice(&ether_type::VLAN.to_be_bytes());
        buf.extend_from_slice(&(vlan_id & 0x0fff).to_be_bytes());
        buf.extend_from_slice(&ethertype.to_be_bytes());
        buf
    }

    // Overwrites the destination MAC field (the first 6 bytes) of a header
    // built by `eth_header`/`eth_header_vlan`.
    pub fn patch_dst(header: &mut [u8], dst: MacAddr) {
        header[0..6].copy_from_slice(&dst.0);
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(bytes: [u8; 6]) -> Self {
        MacAddr(bytes)
    }
}

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5],
        ))
    }
}
