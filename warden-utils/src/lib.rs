//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Address family and MAC address helpers shared by the lower layers of
//! the FIB core.

pub mod address;
pub mod mac_addr;

pub use address::{AddressFamily, IpAddrExt, IpNetworkExt};
pub use mac_addr::MacAddr;
