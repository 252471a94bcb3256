//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Exercises the concrete scenarios and invariants against the public
//! API, using a synchronous test-double resolver so reference-count
//! transitions are deterministic within a single thread.

mod common;

use warden_fib::error::{Error, NotPermittedError};
use warden_fib::{AddKind, FibManager, Interface, RouteProps};
use warden_utils::AddressFamily;

use common::{test_fib, v4};

// Scenario 1: add drop and probe.
#[test]
fn add_drop_and_probe() {
    let fib = test_fib();
    fib.add_entry(
        "1.2.3.0/24".parse().unwrap(),
        AddKind::Drop,
        RouteProps::default(),
    )
    .unwrap();

    let slot = fib.lookup(v4("1.2.3.5")).expect("drop rule matches");
    assert_eq!(slot.action.name(), "DROP");

    assert!(fib.lookup(v4("2.2.2.2")).is_none());
}

// Scenario 2: gateway with shared neighbor.
#[test]
fn gateway_with_shared_neighbor() {
    let fib = test_fib();
    let gw = v4("10.0.0.2");

    fib.add_entry(
        "8.0.0.0/8".parse().unwrap(),
        AddKind::Gateway { iface: Interface::Front, gateway: gw },
        RouteProps::default(),
    )
    .unwrap();
    fib.add_entry(
        "9.0.0.0/8".parse().unwrap(),
        AddKind::Gateway { iface: Interface::Front, gateway: gw },
        RouteProps::default(),
    )
    .unwrap();

    let ref_count = |fib: &FibManager| -> Option<u32> {
        let mut found = None;
        fib.dump_neighbors(Interface::Front, AddressFamily::Ipv4, |ip, refs, _| {
            if ip == gw {
                found = Some(refs);
            }
        });
        found
    };
    assert_eq!(ref_count(&fib), Some(2));

    fib.delete_entry("8.0.0.0/8".parse().unwrap()).unwrap();
    assert_eq!(ref_count(&fib), Some(1));

    fib.delete_entry("9.0.0.0/8".parse().unwrap()).unwrap();
    // The test resolver finalizes synchronously from `put`, so the entry
    // is already gone from the neighbor table.
    assert_eq!(ref_count(&fib), None);
}

// Scenario 3: security-hole rejection.
#[test]
fn security_hole_rejection() {
    let fib = test_fib();
    fib.add_entry(
        "10.1.0.0/16".parse().unwrap(),
        AddKind::Grantor(vec![(v4("203.0.113.1"), v4("192.168.0.2"))]),
        RouteProps::default(),
    )
    .unwrap();

    let err = fib
        .add_entry(
            "10.1.1.0/24".parse().unwrap(),
            AddKind::Gateway { iface: Interface::Back, gateway: v4("192.168.0.3") },
            RouteProps::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::NotPermitted(NotPermittedError::SecurityHole { .. })
    ));
}

// Scenario 4: gateway inside its own prefix.
#[test]
fn gateway_inside_own_prefix() {
    let fib = test_fib();
    let err = fib
        .add_entry(
            "10.0.0.0/8".parse().unwrap(),
            AddKind::Gateway { iface: Interface::Front, gateway: v4("10.0.0.2") },
            RouteProps::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::NotPermitted(NotPermittedError::GatewayInsideOwnPrefix { .. })
    ));
}

// Scenario 5: grantor update never drops below one pair during the
// transition, and old members are released exactly once.
#[test]
fn grantor_update_replaces_atomically() {
    let fib = test_fib();
    let prefix: ipnetwork::IpNetwork = "172.16.0.0/16".parse().unwrap();
    let gw_old = v4("192.168.0.2");
    fib.add_entry(
        prefix,
        AddKind::Grantor(vec![(v4("203.0.113.1"), gw_old)]),
        RouteProps::default(),
    )
    .unwrap();

    fib.update_grantor_set(
        prefix,
        vec![
            (v4("203.0.113.1"), v4("192.168.0.10")),
            (v4("203.0.113.2"), v4("192.168.0.11")),
            (v4("203.0.113.3"), v4("192.168.0.12")),
        ],
    )
    .unwrap();

    let slot = fib.lookup(v4("172.16.5.5")).unwrap();
    let set = slot.action.as_grantor().unwrap();
    assert_eq!(set.len(), 3);

    // The old gateway's reference was released exactly once: it's now
    // gone from the back neighbor table.
    let mut seen_old = false;
    fib.dump_neighbors(Interface::Back, AddressFamily::Ipv4, |ip, _, _| {
        if ip == gw_old {
            seen_old = true;
        }
    });
    assert!(!seen_old);
}

// A grantor pair's gateway address is checked for containment in the
// prefix exactly like a plain gateway's, both on add and on update.
#[test]
fn grantor_gateway_inside_own_prefix_rejected() {
    let fib = test_fib();
    let prefix: ipnetwork::IpNetwork = "203.0.113.0/24".parse().unwrap();

    let err = fib
        .add_entry(
            prefix,
            AddKind::Grantor(vec![(v4("203.0.113.1"), v4("203.0.113.5"))]),
            RouteProps::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::NotPermitted(NotPermittedError::GatewayInsideOwnPrefix { .. })
    ));

    fib.add_entry(
        "172.16.0.0/16".parse().unwrap(),
        AddKind::Grantor(vec![(v4("203.0.113.1"), v4("192.168.0.2"))]),
        RouteProps::default(),
    )
    .unwrap();
    let err = fib
        .update_grantor_set(
            "172.16.0.0/16".parse().unwrap(),
            vec![(v4("203.0.113.1"), v4("172.16.0.5"))],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::NotPermitted(NotPermittedError::GatewayInsideOwnPrefix { .. })
    ));
}

// Scenario 6: LAN collision.
#[test]
fn lan_collision_rejected() {
    let fib = test_fib();
    let err = fib
        .add_entry(
            "10.0.0.128/25".parse().unwrap(),
            AddKind::Drop,
            RouteProps::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::NotPermitted(NotPermittedError::PrefixCollidesWithLan(_))
    ));
}

// A gateway off every configured LAN is rejected rather than silently
// bound to whichever interface the caller named.
#[test]
fn gateway_off_lan_rejected() {
    let fib = test_fib();
    let err = fib
        .add_entry(
            "8.0.0.0/8".parse().unwrap(),
            AddKind::Gateway { iface: Interface::Front, gateway: v4("198.51.100.2") },
            RouteProps::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArg(_)));
}

// A gateway that resolves to the *other* interface's LAN is rejected,
// not silently acquired against the named interface's neighbor table.
#[test]
fn gateway_on_wrong_interface_lan_rejected() {
    let fib = test_fib();
    let err = fib
        .add_entry(
            "8.0.0.0/8".parse().unwrap(),
            AddKind::Gateway { iface: Interface::Front, gateway: v4("192.168.0.2") },
            RouteProps::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArg(_)));
}

// An unusable gateway address (multicast, unspecified, broadcast) is
// rejected before any resolver subscription is attempted.
#[test]
fn unusable_gateway_address_rejected() {
    let fib = test_fib();
    let err = fib
        .add_entry(
            "8.0.0.0/8".parse().unwrap(),
            AddKind::Gateway { iface: Interface::Front, gateway: v4("0.0.0.0") },
            RouteProps::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArg(_)));
}

// Round-trip: add then delete leaves the dump output identical.
#[test]
fn round_trip_add_delete() {
    let fib = test_fib();
    let before: Vec<_> = {
        let mut entries = Vec::new();
        fib.dump(AddressFamily::Ipv4, |prefix, action| {
            entries.push((prefix, action.to_string()));
            true
        });
        entries
    };

    fib.add_entry(
        "198.51.100.0/24".parse().unwrap(),
        AddKind::Drop,
        RouteProps::default(),
    )
    .unwrap();
    fib.delete_entry("198.51.100.0/24".parse().unwrap())
        .unwrap();

    let after: Vec<_> = {
        let mut entries = Vec::new();
        fib.dump(AddressFamily::Ipv4, |prefix, action| {
            entries.push((prefix, action.to_string()));
            true
        });
        entries
    };
    assert_eq!(before, after);
}

// Idempotent delete on NEIGHBOR: rejected, no-op.
#[test]
fn delete_neighbor_prefix_rejected() {
    let fib = test_fib();
    let err = fib
        .delete_entry("10.0.0.0/24".parse().unwrap())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::NotPermitted(NotPermittedError::NeighborPrefixImmutable(_))
    ));

    // Still resolves to the NEIGHBOR_FRONT slot afterward.
    let slot = fib.lookup(v4("10.0.0.50")).unwrap();
    assert_eq!(slot.action.name(), "NEIGHBOR_FRONT");
}

// Duplicate add of an already-present prefix is rejected as EXISTS
// regardless of whether the re-add requests the same action or a
// different one; the prefix's presence alone decides, not a comparison
// against the action installed there.
#[test]
fn duplicate_add_is_rejected() {
    let fib = test_fib();
    let prefix: ipnetwork::IpNetwork = "203.0.113.0/24".parse().unwrap();
    fib.add_entry(prefix, AddKind::Drop, RouteProps::default())
        .unwrap();

    assert!(matches!(
        fib.add_entry(prefix, AddKind::Drop, RouteProps::default()),
        Err(Error::Exists(_))
    ));
    assert!(matches!(
        fib.add_entry(
            prefix,
            AddKind::Gateway { iface: Interface::Front, gateway: v4("10.0.0.2") },
            RouteProps::default()
        ),
        Err(Error::Exists(_))
    ));
}
