//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Shared fixtures for the integration tests: a synchronous resolver test
//! double and a two-interface [`FibManager`] builder.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};

use ipnetwork::Ipv4Network;
use warden_fib::{
    ChannelForwarderSync, Config, FibManager, Interface, InterfaceConfig, NeighborProto, Resolver,
    ResolverCallback, ResolverEvent,
};
use warden_utils::MacAddr;

// A resolver that answers `hold` synchronously with a resolved mapping
// and remembers the callback so a later `put` can drive the
// finalization path deterministically, without the background threads a
// production resolver would use.
#[derive(Default)]
pub struct TestResolver {
    callbacks: Mutex<HashMap<(IpAddr, Interface), ResolverCallback>>,
}

impl Resolver for TestResolver {
    fn hold(
        &self,
        _proto: NeighborProto,
        ip: IpAddr,
        iface: Interface,
        callback: ResolverCallback,
    ) -> Result<(), ()> {
        callback(ResolverEvent {
            mapping: Some(MacAddr::from([0x02, 0, 0, 0, 0, 1])),
            stale: false,
            call_again: true,
        });
        self.callbacks.lock().unwrap().insert((ip, iface), callback);
        Ok(())
    }

    fn put(&self, _proto: NeighborProto, ip: IpAddr, iface: Interface) {
        if let Some(cb) = self.callbacks.lock().unwrap().remove(&(ip, iface)) {
            cb(ResolverEvent {
                mapping: None,
                stale: true,
                call_again: false,
            });
        }
    }
}

pub fn test_fib() -> FibManager {
    let config = Config {
        front: InterfaceConfig {
            mac: MacAddr::from([0x02, 0, 0, 0, 0, 0x10]),
            vlan_id: None,
            lan_v4: Some(Ipv4Network::new(Ipv4Addr::new(10, 0, 0, 1), 24).unwrap()),
            lan_v6: None,
            neighbor_capacity_v6: 64,
        },
        back: InterfaceConfig {
            mac: MacAddr::from([0x02, 0, 0, 0, 0, 0x20]),
            vlan_id: None,
            lan_v4: Some(Ipv4Network::new(Ipv4Addr::new(192, 168, 0, 1), 24).unwrap()),
            lan_v6: None,
            neighbor_capacity_v6: 64,
        },
        fib_capacity_v4: 256,
        fib_capacity_v6: 256,
    };
    let resolver = Arc::new(TestResolver::default());
    // Zero forwarders: the drain barrier returns immediately, which keeps
    // these tests single-threaded and deterministic.
    let forwarder_sync = Arc::new(ChannelForwarderSync::new(vec![]));
    FibManager::new(config, resolver, forwarder_sync)
}

pub fn v4(addr: &str) -> IpAddr {
    addr.parse().unwrap()
}
