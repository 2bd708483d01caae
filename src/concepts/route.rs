use educe::Educe;
use serde::{Deserialize, Serialize};

use crate::framework::RoutingSystem;

/// Confidence state of a route. `Inactive` is a soft withdrawal used to
/// suppress loops, not a delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteState {
    Inactive = 0,
    Active = 1,
}

/// A single candidate or selected route. Entries are copied freely between
/// the distance vectors and the forwarding table; no entry is ever shared.
#[derive(Educe)]
#[educe(Clone(bound()))]
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct RouteEntry<T: RoutingSystem + ?Sized> {
    /// the destination this entry routes towards
    pub dest: T::NodeAddress,
    /// the neighbour a packet is handed to next
    pub next_hop: T::NodeAddress,
    /// the interface the packet leaves through
    pub iface: T::InterfaceId,
    /// hop count towards the destination; the node's own address is fixed at 1
    pub hops: u32,
    pub state: RouteState,
    /// set while the entry is part of an unsent change set
    pub changed: bool,
}

impl<T: RoutingSystem + ?Sized> RouteEntry<T> {
    pub fn is_active(&self) -> bool {
        self.state == RouteState::Active
    }
}
