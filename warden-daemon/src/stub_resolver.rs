//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! A stand-in for the link-layer-state subsystem that performs ARP/ND in
//! a real deployment. This one resolves every address to a synthetic MAC
//! derived from its bytes after a short simulated delay, purely so the
//! demo binary has something to observe.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{Sender, bounded};
use warden_fib::{Interface, NeighborProto, Resolver, ResolverCallback, ResolverEvent};
use warden_utils::MacAddr;

const RESOLUTION_DELAY: Duration = Duration::from_millis(20);

pub struct StubResolver {
    subscriptions: Mutex<HashMap<(IpAddr, Interface), Sender<()>>>,
}

impl StubResolver {
    pub fn new() -> Self {
        StubResolver {
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    fn synthetic_mac(ip: IpAddr) -> MacAddr {
        let mut bytes = [0u8; 6];
        bytes[0] = 0x02;
        match ip {
            IpAddr::V4(v4) => bytes[2..6].copy_from_slice(&v4.octets()),
            IpAddr::V6(v6) => {
                let octets = v6.octets();
                bytes[2..6].copy_from_slice(&octets[12..16]);
            }
        }
        MacAddr::from(bytes)
    }
}

impl Default for StubResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for StubResolver {
    fn hold(
        &self,
        _proto: NeighborProto,
        ip: IpAddr,
        iface: Interface,
        callback: ResolverCallback,
    ) -> Result<(), ()> {
        let (cancel_tx, cancel_rx) = bounded(1);
        self.subscriptions
            .lock()
            .unwrap()
            .insert((ip, iface), cancel_tx);

        std::thread::spawn(move || {
            if cancel_rx.recv_timeout(RESOLUTION_DELAY).is_ok() {
                callback(ResolverEvent {
                    mapping: None,
                    stale: true,
                    call_again: false,
                });
                return;
            }
            callback(ResolverEvent {
                mapping: Some(Self::synthetic_mac(ip)),
                stale: false,
                call_again: true,
            });
            // Block until canceled; a real resolver would keep refreshing
            // on its own schedule instead of waiting indefinitely.
            let _ = cancel_rx.recv();
            callback(ResolverEvent {
                mapping: None,
                stale: true,
                call_again: false,
            });
        });

        Ok(())
    }

    fn put(&self, _proto: NeighborProto, ip: IpAddr, iface: Interface) {
        if let Some(cancel_tx) =
            self.subscriptions.lock().unwrap().remove(&(ip, iface))
        {
            let _ = cancel_tx.send(());
        }
    }
}
