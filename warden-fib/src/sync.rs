//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! The reader-drain barrier: after the mutator unlinks a FIB slot from
//! the RIB and LPM, it must wait until every forwarder thread has
//! observed a state in which that slot is no longer reachable before
//! releasing the resources (layer-2 entries, grantor sets) the slot
//! referenced.

use std::sync::{Arc, Condvar, Mutex};

use crossbeam_channel::Sender;

// A single forwarder's acknowledgment obligation for one drain round.
// Dropping it without calling `ack` is a logic error in the forwarder
// (the barrier would hang), so `ack` consumes it.
pub struct DrainToken {
    remaining: Arc<(Mutex<usize>, Condvar)>,
}

impl DrainToken {
    pub fn ack(self) {
        let (lock, cvar) = &*self.remaining;
        let mut remaining = lock.lock().unwrap();
        *remaining -= 1;
        if *remaining == 0 {
            cvar.notify_all();
        }
    }
}

// Held by the mutator while a drain round is outstanding.
pub struct DrainBarrier {
    remaining: Arc<(Mutex<usize>, Condvar)>,
}

impl DrainBarrier {
    // Creates a barrier for `forwarders` participants, returning one
    // token per participant alongside it.
    pub fn new(forwarders: usize) -> (Self, Vec<DrainToken>) {
        let remaining = Arc::new((Mutex::new(forwarders), Condvar::new()));
        let tokens = (0..forwarders)
            .map(|_| DrainToken {
                remaining: Arc::clone(&remaining),
            })
            .collect();
        (DrainBarrier { remaining }, tokens)
    }

    // Blocks until every token has been acknowledged. A barrier for zero
    // forwarders (e.g. in tests) returns immediately.
    pub fn wait(self) {
        let (lock, cvar) = &*self.remaining;
        let mut remaining = lock.lock().unwrap();
        while *remaining > 0 {
            remaining = cvar.wait(remaining).unwrap();
        }
    }
}

// Implemented by the embedding appliance's forwarding layer (or, for
// tests and the demo binary, by `ChannelForwarderSync` below).
pub trait ForwarderSync: Send + Sync {
    // Delivers one drain token to each registered forwarder and returns
    // immediately; forwarders ack asynchronously as they cross the drain
    // point in their own poll loop.
    fn request_drain(&self, tokens: Vec<DrainToken>);

    fn forwarder_count(&self) -> usize;
}

// A concrete `ForwarderSync` built on a fixed set of per-forwarder
// mailboxes. Each forwarder thread owns the matching `Receiver<DrainToken>`
// and is expected to poll it between packets, acking promptly so the
// mutator isn't held up.
pub struct ChannelForwarderSync {
    mailboxes: Vec<Sender<DrainToken>>,
}

impl ChannelForwarderSync {
    pub fn new(mailboxes: Vec<Sender<DrainToken>>) -> Self {
        ChannelForwarderSync { mailboxes }
    }
}

impl ForwarderSync for ChannelForwarderSync {
    fn request_drain(&self, tokens: Vec<DrainToken>) {
        for (mailbox, token) in self.mailboxes.iter().zip(tokens) {
            // A forwarder that has shut down its receiver is treated as
            // already drained rather than blocking the mutator forever:
            // ack the token ourselves instead of letting the failed send
            // drop it silently.
            if let Err(err) = mailbox.send(token) {
                err.into_inner().ack();
            }
        }
    }

    fn forwarder_count(&self) -> usize {
        self.mailboxes.len()
    }
}
