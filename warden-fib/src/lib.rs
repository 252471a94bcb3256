//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! The forwarding-information-base and neighbor-resolution core of a
//! DDoS-protection appliance.
//!
//! [`FibManager`] is the single entry point: it owns the per-family RIB
//! ([`rib`]) and LPM ([`lpm`]) tables, the per-interface neighbor caches
//! ([`neigh`], [`l2cache`]), and the FIB slot arrays ([`slot`]) that tie
//! them together. Mutations (`add_entry`, `delete_entry`,
//! `update_grantor_set`, the `dump_*` family) take the manager's single
//! lock; [`FibManager::lookup`] is the lock-free hot path forwarder
//! threads call on every packet.
//!
//! The embedding appliance supplies two collaborators at construction
//! time: a [`resolver::Resolver`] that performs ARP/ND, and a
//! [`sync::ForwarderSync`] that posts reader-drain barriers to the
//! forwarder threads.

pub mod error;
pub mod fib;
pub mod grantor;
pub mod l2cache;
pub mod lpm;
pub mod neigh;
pub mod resolver;
pub mod rib;
pub mod slot;
pub mod sync;

pub use error::{Error, Result};
pub use fib::{AddKind, Config, FibManager, InterfaceConfig};
pub use resolver::{NeighborProto, Resolver, ResolverCallback, ResolverEvent};
pub use slot::{FibSlot, Interface, RouteProps, SlotAction, SlotId};
pub use sync::{ChannelForwarderSync, ForwarderSync};
