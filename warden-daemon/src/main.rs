//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! A minimal wiring example for [`warden_fib`]: constructs a
//! [`FibManager`](warden_fib::FibManager) with a two-interface
//! configuration, a stub resolver standing in for the link-layer-state
//! subsystem, and a channel-backed forwarder-sync, then drives the
//! mutation API through a short scripted scenario while a couple of
//! "forwarder" threads poll the lock-free lookup path.
//!
//! This binary ships as a demonstration of the wiring contract; the core
//! itself is a library intended to be embedded by the appliance's
//! control plane.

mod stub_resolver;

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::unbounded;
use ipnetwork::Ipv4Network;
use tracing::info;
use tracing_subscriber::EnvFilter;
use warden_fib::{
    AddKind, ChannelForwarderSync, Config, FibManager, InterfaceConfig, RouteProps,
};
use warden_utils::{AddressFamily, MacAddr};

use crate::stub_resolver::StubResolver;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();

    let front_mac = MacAddr::from([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
    let back_mac = MacAddr::from([0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);

    let config = Config {
        front: InterfaceConfig {
            mac: front_mac,
            vlan_id: None,
            lan_v4: Some(Ipv4Network::new(Ipv4Addr::new(10, 0, 0, 1), 24).unwrap()),
            lan_v6: None,
            neighbor_capacity_v6: 1024,
        },
        back: InterfaceConfig {
            mac: back_mac,
            vlan_id: None,
            lan_v4: Some(Ipv4Network::new(Ipv4Addr::new(192, 168, 0, 1), 24).unwrap()),
            lan_v6: None,
            neighbor_capacity_v6: 1024,
        },
        fib_capacity_v4: 4096,
        fib_capacity_v6: 4096,
    };

    let resolver = Arc::new(StubResolver::new());

    // Two pretend forwarder threads, each polling its mailbox and acking
    // drain tokens as soon as they arrive, mirroring how a real forwarder
    // would check its mailbox between packets.
    let (tx_a, rx_a) = unbounded();
    let (tx_b, rx_b) = unbounded();
    let forwarder_sync = Arc::new(ChannelForwarderSync::new(vec![tx_a, tx_b]));

    let shutdown = Arc::new(AtomicBool::new(false));
    let mut forwarder_handles = Vec::new();
    for (name, rx) in [("front", rx_a), ("back", rx_b)] {
        let shutdown = shutdown.clone();
        forwarder_handles.push(thread::spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                if let Ok(token) = rx.recv_timeout(Duration::from_millis(50)) {
                    info!(forwarder = name, "acking reader-drain token");
                    token.ack();
                }
            }
        }));
    }

    let fib = FibManager::new(config, resolver, forwarder_sync);

    info!("installing a DROP rule for 1.2.3.0/24");
    fib.add_entry(
        "1.2.3.0/24".parse().unwrap(),
        AddKind::Drop,
        RouteProps { priority: 100 },
    )
    .expect("add DROP rule");

    info!("installing a GATEWAY_FRONT rule for 8.0.0.0/8 via 10.0.0.2");
    fib.add_entry(
        "8.0.0.0/8".parse().unwrap(),
        AddKind::Gateway {
            iface: warden_fib::Interface::Front,
            gateway: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
        },
        RouteProps { priority: 50 },
    )
    .expect("add GATEWAY_FRONT rule");

    info!("installing a GRANTOR rule for 172.16.0.0/16");
    fib.add_entry(
        "172.16.0.0/16".parse().unwrap(),
        AddKind::Grantor(vec![(
            IpAddr::V4(Ipv4Addr::new(203, 0, 113, 10)),
            IpAddr::V4(Ipv4Addr::new(192, 168, 0, 2)),
        )]),
        RouteProps::default(),
    )
    .expect("add GRANTOR rule");

    // Give the stub resolver a moment to deliver its first mapping before
    // we dump and look things up, just so the printed output is
    // interesting; the FIB itself is usable the instant `add_entry`
    // returns.
    thread::sleep(Duration::from_millis(50));

    info!("dumping IPv4 FIB entries");
    fib.dump(AddressFamily::Ipv4, |prefix, action| {
        info!(%prefix, action, "fib entry");
        true
    });

    let probe: IpAddr = "1.2.3.42".parse().unwrap();
    match fib.lookup(probe) {
        Some(slot) => info!(%probe, action = slot.action.name(), "lookup"),
        None => info!(%probe, "lookup: no match"),
    }

    info!("removing the DROP rule for 1.2.3.0/24");
    fib.delete_entry("1.2.3.0/24".parse().unwrap())
        .expect("delete DROP rule");

    shutdown.store(true, Ordering::Relaxed);
    for handle in forwarder_handles {
        let _ = handle.join();
    }
}
