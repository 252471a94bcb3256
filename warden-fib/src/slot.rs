//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;

use enum_as_inner::EnumAsInner;

use crate::grantor::GrantorSet;
use crate::l2cache::L2CacheHandle;
use crate::neigh::NeighborTable;

// Dense index into a family's FIB slot array.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct SlotId(pub u32);

// Which side of the appliance a gateway or neighbor table belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Interface {
    Front,
    Back,
}

impl Interface {
    pub fn name(&self) -> &'static str {
        match self {
            Interface::Front => "FRONT",
            Interface::Back => "BACK",
        }
    }
}

// Caller-supplied metadata carried alongside a route, independent of its
// forwarding action.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RouteProps {
    pub priority: u32,
}

// The action a FIB slot performs, together with the state that action
// needs. `Empty` is the state of a free slot awaiting allocation.
#[derive(Debug, EnumAsInner)]
pub enum SlotAction {
    Empty,
    Drop(RouteProps),
    Gateway {
        iface: Interface,
        l2: L2CacheHandle,
        props: RouteProps,
    },
    Grantor(GrantorSet),
    Neighbor(Arc<NeighborTable>),
}

impl SlotAction {
    pub fn name(&self) -> &'static str {
        match self {
            SlotAction::Empty => "EMPTY",
            SlotAction::Drop(_) => "DROP",
            SlotAction::Gateway { iface, .. } => match iface {
                Interface::Front => "GATEWAY_FRONT",
                Interface::Back => "GATEWAY_BACK",
            },
            SlotAction::Grantor(_) => "GRANTOR",
            SlotAction::Neighbor(table) => match table.iface {
                Interface::Front => "NEIGHBOR_FRONT",
                Interface::Back => "NEIGHBOR_BACK",
            },
        }
    }

    // A "protective" action is one that a more specific route must never
    // override (the "no security hole" invariant).
    pub fn is_protective(&self) -> bool {
        matches!(self, SlotAction::Drop(_) | SlotAction::Grantor(_))
    }
}

// One entry of the fixed-capacity FIB slot array.
#[derive(Debug)]
pub struct FibSlot {
    pub action: SlotAction,
}

impl FibSlot {
    pub fn empty() -> Self {
        FibSlot {
            action: SlotAction::Empty,
        }
    }
}
