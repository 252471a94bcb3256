//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use tracing::{error, warn};

use crate::slot::Interface;

// FIB manager error type.
//
// Every fallible entry point returns this type. A failed call leaves the
// FIB, RIB and LPM exactly as they were before the call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    InvalidArg(InvalidArgError),
    NotFound(IpNetwork),
    Exists(IpNetwork),
    NotPermitted(NotPermittedError),
    NoSpace(NoSpaceError),
    ResolverFail(IpAddr),
    Internal(InternalError),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InvalidArgError {
    ZeroPrefixLength,
    FamilyMismatch,
    NoGrantorsSpecified,
    TooManyGrantors(usize),
    NoLanConfigured,
    ActionMismatch {
        prefix: IpNetwork,
        requested: &'static str,
        installed: &'static str,
    },
    GatewayNotOnLan { gateway: IpAddr, iface: Interface },
    UnusableGatewayAddress(IpAddr),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NotPermittedError {
    NeighborPrefixImmutable(IpNetwork),
    GatewayInsideOwnPrefix { prefix: IpNetwork, gateway: IpAddr },
    SecurityHole { prefix: IpNetwork, blocking: IpNetwork },
    PrefixCollidesWithLan(IpNetwork),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NoSpaceError {
    FibSlotsExhausted,
    NeighborTableFull(IpAddr),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InternalError {
    RibLpmDesync(IpNetwork),
    RollbackFailed(IpNetwork),
}

pub type Result<T> = std::result::Result<T, Error>;

// ===== impl Error =====

impl Error {
    // Emits a `tracing` event appropriate to the error's severity. Callers
    // invoke this once at the point an error is about to be returned to
    // the configuration surface, not at every propagation hop.
    pub fn log(&self) {
        match self {
            Error::InvalidArg(e) => {
                warn!(error = %e, "rejecting invalid request");
            }
            Error::NotFound(prefix) => {
                warn!(%prefix, "prefix not found");
            }
            Error::Exists(prefix) => {
                warn!(%prefix, "prefix already exists");
            }
            Error::NotPermitted(e) => {
                warn!(error = %e, "operation not permitted");
            }
            Error::NoSpace(e) => {
                warn!(error = %e, "out of space");
            }
            Error::ResolverFail(addr) => {
                warn!(%addr, "resolver subscription failed");
            }
            Error::Internal(e) => {
                error!(error = %e, "internal invariant violation");
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidArg(e) => write!(f, "invalid argument: {e}"),
            Error::NotFound(prefix) => write!(f, "prefix not found: {prefix}"),
            Error::Exists(prefix) => {
                write!(f, "prefix already exists: {prefix}")
            }
            Error::NotPermitted(e) => write!(f, "not permitted: {e}"),
            Error::NoSpace(e) => write!(f, "no space: {e}"),
            Error::ResolverFail(addr) => {
                write!(f, "resolver subscription failed for {addr}")
            }
            Error::Internal(e) => write!(f, "internal error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for InvalidArgError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidArgError::ZeroPrefixLength => {
                write!(f, "default routes (prefix length 0) are unsupported")
            }
            InvalidArgError::FamilyMismatch => {
                write!(f, "gateway/grantor address family doesn't match prefix")
            }
            InvalidArgError::NoGrantorsSpecified => {
                write!(f, "grantor action requires at least one grantor pair")
            }
            InvalidArgError::TooManyGrantors(n) => {
                write!(f, "grantor set of {n} pairs exceeds the 255 limit")
            }
            InvalidArgError::NoLanConfigured => {
                write!(f, "no LAN of that address family is configured on the target interface")
            }
            InvalidArgError::ActionMismatch {
                prefix,
                requested,
                installed,
            } => write!(
                f,
                "{prefix} is installed as {installed}, cannot re-add as {requested}"
            ),
            InvalidArgError::GatewayNotOnLan { gateway, iface } => write!(
                f,
                "gateway {gateway} does not resolve to the NEIGHBOR_{} entry",
                iface.name()
            ),
            InvalidArgError::UnusableGatewayAddress(addr) => {
                write!(f, "{addr} is not a usable gateway address")
            }
        }
    }
}

impl std::fmt::Display for NotPermittedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotPermittedError::NeighborPrefixImmutable(prefix) => {
                write!(f, "{prefix} is a neighbor prefix, immutable after boot")
            }
            NotPermittedError::GatewayInsideOwnPrefix { prefix, gateway } => {
                write!(f, "gateway {gateway} falls within its own prefix {prefix}")
            }
            NotPermittedError::SecurityHole { prefix, blocking } => write!(
                f,
                "{prefix} would open a security hole under protective prefix {blocking}"
            ),
            NotPermittedError::PrefixCollidesWithLan(prefix) => {
                write!(f, "{prefix} collides with a directly connected LAN")
            }
        }
    }
}

impl std::fmt::Display for NoSpaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoSpaceError::FibSlotsExhausted => {
                write!(f, "FIB slot array is full")
            }
            NoSpaceError::NeighborTableFull(addr) => {
                write!(f, "neighbor table has no free slot for {addr}")
            }
        }
    }
}

impl std::fmt::Display for InternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InternalError::RibLpmDesync(prefix) => {
                write!(f, "RIB and LPM disagree on {prefix}")
            }
            InternalError::RollbackFailed(prefix) => {
                write!(f, "failed to unwind a partial mutation of {prefix}")
            }
        }
    }
}
