//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! The FIB manager: the single mutation entry point for routes, gateways
//! and grantor sets, and the lock-free lookup entry point forwarder
//! threads use on every packet.

use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};
use tracing::debug;
use warden_utils::address::{AddressFamily, IpAddrExt, IpNetworkExt, ipv4_host_capacity};
use warden_utils::mac_addr::ether_type;
use warden_utils::MacAddr;

use crate::error::{Error, InternalError, InvalidArgError, NoSpaceError, NotPermittedError, Result};
use crate::grantor::{GrantorPair, GrantorSet};
use crate::l2cache::L2CacheHandle;
use crate::lpm::Lpm;
use crate::neigh::{Acquired, NeighborTable};
use crate::resolver::{proto_for, Resolver, ResolverCallback, ResolverEvent};
use crate::rib::Rib;
use crate::slot::{FibSlot, Interface, RouteProps, SlotAction, SlotId};
use crate::sync::{DrainBarrier, ForwarderSync};

// What an `add_entry` call installs. `Drop` and `Grantor` are the two
// protective actions the security-hole check (invariant 5) shields from
// being shadowed by a more specific `Gateway` entry.
#[derive(Clone, Debug)]
pub enum AddKind {
    Drop,
    Gateway { iface: Interface, gateway: IpAddr },
    Grantor(Vec<(IpAddr, IpAddr)>),
}

impl AddKind {
    fn name(&self) -> &'static str {
        match self {
            AddKind::Drop => "DROP",
            AddKind::Gateway { iface: Interface::Front, .. } => "GATEWAY_FRONT",
            AddKind::Gateway { iface: Interface::Back, .. } => "GATEWAY_BACK",
            AddKind::Grantor(_) => "GRANTOR",
        }
    }

    fn is_protective(&self) -> bool {
        matches!(self, AddKind::Drop | AddKind::Grantor(_))
    }
}

// Per-interface boot-time configuration. Neighbor prefixes are derived
// from `lan_v4`/`lan_v6` and are immutable for the process lifetime.
pub struct InterfaceConfig {
    pub mac: MacAddr,
    pub vlan_id: Option<u16>,
    pub lan_v4: Option<Ipv4Network>,
    pub lan_v6: Option<Ipv6Network>,
    pub neighbor_capacity_v6: usize,
}

pub struct Config {
    pub front: InterfaceConfig,
    pub back: InterfaceConfig,
    pub fib_capacity_v4: usize,
    pub fib_capacity_v6: usize,
}

struct InterfaceState {
    neigh_v4: Option<Arc<NeighborTable>>,
    neigh_v6: Option<Arc<NeighborTable>>,
}

struct ControlState {
    rib: Rib,
    cursor_v4: usize,
    cursor_v6: usize,
}

// The FIB core. Cheap to share: construct once behind an `Arc` and hand
// clones of that `Arc` to both the control-plane caller and the
// forwarder threads (forwarders only ever call `lookup`).
pub struct FibManager {
    front: InterfaceState,
    back: InterfaceState,
    resolver: Arc<dyn Resolver>,
    forwarder_sync: Arc<dyn ForwarderSync>,
    slots_v4: Vec<ArcSwap<FibSlot>>,
    slots_v6: Vec<ArcSwap<FibSlot>>,
    lpm: ArcSwap<Lpm>,
    control: Mutex<ControlState>,
}

impl FibManager {
    pub fn new(
        config: Config,
        resolver: Arc<dyn Resolver>,
        forwarder_sync: Arc<dyn ForwarderSync>,
    ) -> Self {
        let slots_v4: Vec<_> = (0..config.fib_capacity_v4)
            .map(|_| ArcSwap::from_pointee(FibSlot::empty()))
            .collect();
        let slots_v6: Vec<_> = (0..config.fib_capacity_v6)
            .map(|_| ArcSwap::from_pointee(FibSlot::empty()))
            .collect();

        let mut control = ControlState {
            rib: Rib::new(),
            cursor_v4: 0,
            cursor_v6: 0,
        };
        let mut lpm = Lpm::new();

        let front = Self::build_interface(
            Interface::Front,
            &config.front,
            &slots_v4,
            &slots_v6,
            &mut control,
            &mut lpm,
        );
        let back = Self::build_interface(
            Interface::Back,
            &config.back,
            &slots_v4,
            &slots_v6,
            &mut control,
            &mut lpm,
        );

        FibManager {
            front,
            back,
            resolver,
            forwarder_sync,
            slots_v4,
            slots_v6,
            lpm: ArcSwap::from_pointee(lpm),
            control: Mutex::new(control),
        }
    }

    fn build_interface(
        iface: Interface,
        cfg: &InterfaceConfig,
        slots_v4: &[ArcSwap<FibSlot>],
        slots_v6: &[ArcSwap<FibSlot>],
        control: &mut ControlState,
        lpm: &mut Lpm,
    ) -> InterfaceState {
        let neigh_v4 = cfg.lan_v4.map(|lan| {
            let capacity = ipv4_host_capacity(&lan);
            let table = Arc::new(NeighborTable::new(
                iface,
                capacity,
                cfg.mac,
                ether_type::IPV4,
                cfg.vlan_id,
            ));
            let slot_id = allocate_slot(slots_v4, &mut control.cursor_v4)
                .expect("FIB capacity too small to hold a neighbor slot");
            install(slots_v4, slot_id, SlotAction::Neighbor(table.clone()));
            let prefix = IpNetwork::V4(lan).apply_mask();
            control.rib.add(prefix, slot_id);
            lpm.add(prefix, slot_id);
            table
        });

        let neigh_v6 = cfg.lan_v6.map(|lan| {
            let table = Arc::new(NeighborTable::new(
                iface,
                cfg.neighbor_capacity_v6,
                cfg.mac,
                ether_type::IPV6,
                cfg.vlan_id,
            ));
            let slot_id = allocate_slot(slots_v6, &mut control.cursor_v6)
                .expect("FIB capacity too small to hold a neighbor slot");
            install(slots_v6, slot_id, SlotAction::Neighbor(table.clone()));
            let prefix = IpNetwork::V6(lan).apply_mask();
            control.rib.add(prefix, slot_id);
            lpm.add(prefix, slot_id);
            table
        });

        InterfaceState { neigh_v4, neigh_v6 }
    }

    // ===== hot path =====

    // Longest-prefix match, safe to call without any lock. Returns the
    // slot the forwarder should act on; `None` means no route matches.
    pub fn lookup(&self, addr: IpAddr) -> Option<Arc<FibSlot>> {
        let slot_id = self.lpm.load().lookup(addr)?;
        Some(self.slots(addr.address_family())[slot_id.0 as usize].load_full())
    }

    // ===== mutation =====

    pub fn add_entry(
        &self,
        prefix: IpNetwork,
        kind: AddKind,
        props: RouteProps,
    ) -> Result<()> {
        if prefix.prefix() == 0 {
            return Err(Error::InvalidArg(InvalidArgError::ZeroPrefixLength));
        }
        if let AddKind::Grantor(pairs) = &kind {
            if pairs.is_empty() {
                return Err(Error::InvalidArg(
                    InvalidArgError::NoGrantorsSpecified,
                ));
            }
            if pairs.len() > GrantorSet::MAX_PAIRS {
                return Err(Error::InvalidArg(InvalidArgError::TooManyGrantors(
                    pairs.len(),
                )));
            }
        }

        let family = prefix.address_family();
        let mut control = self.control.lock().unwrap();

        if control.rib.get(prefix).is_some() {
            return Err(Error::Exists(prefix));
        }

        for (_, slot_id) in control.rib.iter_shorter(prefix) {
            if self.load_slot(family, slot_id).action.is_neighbor() {
                return Err(Error::NotPermitted(
                    NotPermittedError::PrefixCollidesWithLan(prefix),
                ));
            }
        }

        match &kind {
            AddKind::Drop => {}
            AddKind::Gateway { gateway, .. } => {
                if gateway.address_family() != family {
                    return Err(Error::InvalidArg(InvalidArgError::FamilyMismatch));
                }
                if !gateway.is_usable() {
                    return Err(Error::InvalidArg(
                        InvalidArgError::UnusableGatewayAddress(*gateway),
                    ));
                }
                if prefix.contains_addr(*gateway) {
                    return Err(Error::NotPermitted(
                        NotPermittedError::GatewayInsideOwnPrefix {
                            prefix,
                            gateway: *gateway,
                        },
                    ));
                }
            }
            AddKind::Grantor(pairs) => {
                for (grantor_ip, gateway_ip) in pairs {
                    if grantor_ip.address_family() != family
                        || gateway_ip.address_family() != family
                    {
                        return Err(Error::InvalidArg(
                            InvalidArgError::FamilyMismatch,
                        ));
                    }
                    if !gateway_ip.is_usable() {
                        return Err(Error::InvalidArg(
                            InvalidArgError::UnusableGatewayAddress(*gateway_ip),
                        ));
                    }
                    if prefix.contains_addr(*gateway_ip) {
                        return Err(Error::NotPermitted(
                            NotPermittedError::GatewayInsideOwnPrefix {
                                prefix,
                                gateway: *gateway_ip,
                            },
                        ));
                    }
                }
            }
        }

        if kind.is_protective() {
            for (blocking, slot_id) in control.rib.iter_longer(prefix) {
                if !self.load_slot(family, slot_id).action.is_protective() {
                    return Err(Error::NotPermitted(
                        NotPermittedError::SecurityHole { prefix, blocking },
                    ));
                }
            }
        } else {
            for (blocking, slot_id) in control.rib.iter_shorter(prefix) {
                if self.load_slot(family, slot_id).action.is_protective() {
                    return Err(Error::NotPermitted(
                        NotPermittedError::SecurityHole { prefix, blocking },
                    ));
                }
            }
        }

        let kind_name = kind.name();
        let action = match kind {
            AddKind::Drop => SlotAction::Drop(props),
            AddKind::Gateway { iface, gateway } => {
                let table =
                    self.neighbor_table_for_gateway(&control, iface, family, gateway)?;
                let handle = self.acquire_gateway(iface, table, gateway)?;
                SlotAction::Gateway { iface, l2: handle, props }
            }
            AddKind::Grantor(pairs) => {
                let mut built: Vec<GrantorPair> = Vec::with_capacity(pairs.len());
                for (grantor_ip, gateway_ip) in pairs {
                    let table = match self.neighbor_table_for_gateway(
                        &control,
                        Interface::Back,
                        family,
                        gateway_ip,
                    ) {
                        Ok(table) => table,
                        Err(err) => {
                            for pair in &built {
                                self.release_l2(Interface::Back, &pair.gateway);
                            }
                            return Err(err);
                        }
                    };
                    match self.acquire_gateway(Interface::Back, table, gateway_ip) {
                        Ok(handle) => built.push(GrantorPair {
                            grantor_ip,
                            gateway: handle,
                        }),
                        Err(err) => {
                            for pair in &built {
                                self.release_l2(Interface::Back, &pair.gateway);
                            }
                            return Err(err);
                        }
                    }
                }
                SlotAction::Grantor(GrantorSet::new(built))
            }
        };

        let slot_id = match allocate_slot(self.slots(family), self.cursor_mut(&mut control, family))
        {
            Some(id) => id,
            None => {
                self.release_action_resources(&action);
                return Err(Error::NoSpace(NoSpaceError::FibSlotsExhausted));
            }
        };

        install(self.slots(family), slot_id, action);
        control.rib.add(prefix, slot_id);

        let mut new_lpm = (**self.lpm.load()).clone();
        if !new_lpm.add(prefix, slot_id) {
            let installed = self.load_slot(family, slot_id);
            self.release_action_resources(&installed.action);
            zero(self.slots(family), slot_id);
            if control.rib.remove(prefix).is_none() {
                debug_assert!(false, "rollback of RIB add for {prefix} failed");
                return Err(Error::Internal(InternalError::RollbackFailed(prefix)));
            }
            debug_assert!(false, "RIB and LPM disagree on {prefix}");
            return Err(Error::Internal(InternalError::RibLpmDesync(prefix)));
        }
        self.lpm.store(Arc::new(new_lpm));

        debug!(%prefix, action = kind_name, "installed FIB entry");
        Ok(())
    }

    pub fn delete_entry(&self, prefix: IpNetwork) -> Result<()> {
        let family = prefix.address_family();
        let mut control = self.control.lock().unwrap();

        let slot_id = control.rib.get(prefix).ok_or(Error::NotFound(prefix))?;
        let current = self.load_slot(family, slot_id);
        if current.action.is_neighbor() {
            return Err(Error::NotPermitted(
                NotPermittedError::NeighborPrefixImmutable(prefix),
            ));
        }

        control.rib.remove(prefix);
        let mut new_lpm = (**self.lpm.load()).clone();
        new_lpm.remove(prefix);
        self.lpm.store(Arc::new(new_lpm));

        self.drain_readers();

        self.release_action_resources(&current.action);
        zero(self.slots(family), slot_id);
        debug!(%prefix, "removed FIB entry");
        Ok(())
    }

    pub fn update_grantor_set(
        &self,
        prefix: IpNetwork,
        pairs: Vec<(IpAddr, IpAddr)>,
    ) -> Result<()> {
        if pairs.is_empty() {
            return Err(Error::InvalidArg(InvalidArgError::NoGrantorsSpecified));
        }
        if pairs.len() > GrantorSet::MAX_PAIRS {
            return Err(Error::InvalidArg(InvalidArgError::TooManyGrantors(
                pairs.len(),
            )));
        }

        let family = prefix.address_family();
        let control = self.control.lock().unwrap();
        let slot_id = control.rib.get(prefix).ok_or(Error::NotFound(prefix))?;
        let current = self.load_slot(family, slot_id);
        let Some(set) = current.action.as_grantor() else {
            return Err(Error::InvalidArg(InvalidArgError::ActionMismatch {
                prefix,
                requested: "GRANTOR",
                installed: current.action.name(),
            }));
        };

        for (grantor_ip, gateway_ip) in &pairs {
            if grantor_ip.address_family() != family || gateway_ip.address_family() != family {
                return Err(Error::InvalidArg(InvalidArgError::FamilyMismatch));
            }
            if !gateway_ip.is_usable() {
                return Err(Error::InvalidArg(InvalidArgError::UnusableGatewayAddress(
                    *gateway_ip,
                )));
            }
            if prefix.contains_addr(*gateway_ip) {
                return Err(Error::NotPermitted(
                    NotPermittedError::GatewayInsideOwnPrefix {
                        prefix,
                        gateway: *gateway_ip,
                    },
                ));
            }
        }

        let mut built: Vec<GrantorPair> = Vec::with_capacity(pairs.len());
        for (grantor_ip, gateway_ip) in pairs {
            let table = match self.neighbor_table_for_gateway(
                &control,
                Interface::Back,
                family,
                gateway_ip,
            ) {
                Ok(table) => table,
                Err(err) => {
                    for pair in &built {
                        self.release_l2(Interface::Back, &pair.gateway);
                    }
                    return Err(err);
                }
            };
            match self.acquire_gateway(Interface::Back, table, gateway_ip) {
                Ok(handle) => built.push(GrantorPair { grantor_ip, gateway: handle }),
                Err(err) => {
                    for pair in &built {
                        self.release_l2(Interface::Back, &pair.gateway);
                    }
                    return Err(err);
                }
            }
        }

        let old = set.replace(built);
        drop(control);

        self.drain_readers();

        for pair in old.iter() {
            self.release_l2(Interface::Back, &pair.gateway);
        }
        debug!(%prefix, "updated grantor set");
        Ok(())
    }

    // Streams every RIB entry of `family` to `f` in bounded batches,
    // dropping and re-acquiring the control lock between batches so a
    // large dump never starves a pending mutator. Each individual
    // callback invocation still runs with the lock held, matching the
    // consistency the source dump routine gives its caller.
    pub fn dump(
        &self,
        family: AddressFamily,
        mut f: impl FnMut(IpNetwork, &str) -> bool,
    ) {
        const BATCH_SIZE: usize = 64;

        let prefixes: Vec<IpNetwork> = {
            let control = self.control.lock().unwrap();
            control.rib.iter_all(family).map(|(prefix, _)| prefix).collect()
        };

        for batch in prefixes.chunks(BATCH_SIZE) {
            let control = self.control.lock().unwrap();
            for &prefix in batch {
                let Some(slot_id) = control.rib.get(prefix) else {
                    // Deleted by a racing mutator since the snapshot was
                    // taken; skip rather than report a stale entry.
                    continue;
                };
                let slot = self.load_slot(family, slot_id);
                if !f(prefix, slot.action.name()) {
                    return;
                }
            }
        }
    }

    pub fn dump_neighbors(
        &self,
        iface: Interface,
        family: AddressFamily,
        f: impl FnMut(IpAddr, u32, bool),
    ) {
        if let Some(table) = self.neighbor_table(iface, family) {
            table.dump(f);
        }
    }

    // ===== internals =====

    fn slots(&self, family: AddressFamily) -> &[ArcSwap<FibSlot>] {
        match family {
            AddressFamily::Ipv4 => &self.slots_v4,
            AddressFamily::Ipv6 => &self.slots_v6,
        }
    }

    fn load_slot(&self, family: AddressFamily, id: SlotId) -> Arc<FibSlot> {
        self.slots(family)[id.0 as usize].load_full()
    }

    fn cursor_mut<'a>(
        &self,
        control: &'a mut ControlState,
        family: AddressFamily,
    ) -> &'a mut usize {
        match family {
            AddressFamily::Ipv4 => &mut control.cursor_v4,
            AddressFamily::Ipv6 => &mut control.cursor_v6,
        }
    }

    fn neighbor_table(&self, iface: Interface, family: AddressFamily) -> Option<&Arc<NeighborTable>> {
        let side = match iface {
            Interface::Front => &self.front,
            Interface::Back => &self.back,
        };
        match family {
            AddressFamily::Ipv4 => side.neigh_v4.as_ref(),
            AddressFamily::Ipv6 => side.neigh_v6.as_ref(),
        }
    }

    // Resolves `gateway` against the RIB and confirms it lands on the
    // NEIGHBOR_* slot configured for `iface`/`family`, not merely that
    // such a slot exists. A gateway off every configured LAN, or on the
    // wrong interface's LAN, is rejected here rather than silently
    // accepted against the wrong neighbor table.
    fn neighbor_table_for_gateway(
        &self,
        control: &ControlState,
        iface: Interface,
        family: AddressFamily,
        gateway: IpAddr,
    ) -> Result<&Arc<NeighborTable>> {
        let table = self
            .neighbor_table(iface, family)
            .ok_or(Error::InvalidArg(InvalidArgError::NoLanConfigured))?;
        let on_lan = control
            .rib
            .lookup(gateway.to_host_prefix())
            .is_some_and(|(_, slot_id)| {
                matches!(
                    &self.load_slot(family, slot_id).action,
                    SlotAction::Neighbor(t) if t.iface == iface
                )
            });
        if !on_lan {
            return Err(Error::InvalidArg(InvalidArgError::GatewayNotOnLan {
                gateway,
                iface,
            }));
        }
        Ok(table)
    }

    fn acquire_gateway(
        &self,
        iface: Interface,
        table: &Arc<NeighborTable>,
        gateway: IpAddr,
    ) -> Result<L2CacheHandle> {
        match table.acquire(gateway) {
            Ok(Acquired::Existing(handle)) => Ok(handle),
            Ok(Acquired::Created(handle)) => {
                if self
                    .register_resolver(iface, gateway, handle.clone())
                    .is_err()
                {
                    table.release(gateway);
                    handle.finalize();
                    return Err(Error::ResolverFail(gateway));
                }
                Ok(handle)
            }
            Err(e) => Err(Error::NoSpace(e)),
        }
    }

    fn register_resolver(
        &self,
        iface: Interface,
        ip: IpAddr,
        handle: L2CacheHandle,
    ) -> std::result::Result<(), ()> {
        let callback: ResolverCallback = Arc::new(move |event: ResolverEvent| {
            if event.call_again {
                if let Some(mac) = event.mapping {
                    let header = handle.patch_mac(mac);
                    handle.publish(header, event.stale);
                }
            } else {
                handle.finalize();
            }
        });
        self.resolver.hold(proto_for(ip), ip, iface, callback)
    }

    fn release_l2(&self, iface: Interface, handle: &L2CacheHandle) {
        let family = handle.neighbor_ip.address_family();
        if let Some(table) = self.neighbor_table(iface, family)
            && table.release(handle.neighbor_ip).is_some()
        {
            self.resolver.put(proto_for(handle.neighbor_ip), handle.neighbor_ip, iface);
        }
    }

    fn release_action_resources(&self, action: &SlotAction) {
        match action {
            SlotAction::Drop(_) | SlotAction::Empty | SlotAction::Neighbor(_) => {}
            SlotAction::Gateway { iface, l2, .. } => self.release_l2(*iface, l2),
            SlotAction::Grantor(set) => {
                for pair in set.load().iter() {
                    self.release_l2(Interface::Back, &pair.gateway);
                }
            }
        }
    }

    fn drain_readers(&self) {
        let (barrier, tokens) = DrainBarrier::new(self.forwarder_sync.forwarder_count());
        self.forwarder_sync.request_drain(tokens);
        barrier.wait();
    }
}

fn allocate_slot(slots: &[ArcSwap<FibSlot>], cursor: &mut usize) -> Option<SlotId> {
    let capacity = slots.len();
    if capacity == 0 {
        return None;
    }
    for offset in 0..capacity {
        let idx = (*cursor + offset) % capacity;
        if slots[idx].load().action.is_empty() {
            *cursor = (idx + 1) % capacity;
            return Some(SlotId(idx as u32));
        }
    }
    None
}

fn install(slots: &[ArcSwap<FibSlot>], id: SlotId, action: SlotAction) {
    slots[id.0 as usize].store(Arc::new(FibSlot { action }));
}

fn zero(slots: &[ArcSwap<FibSlot>], id: SlotId) {
    slots[id.0 as usize].store(Arc::new(FibSlot::empty()));
}
