use std::collections::HashMap;
use std::time::Duration;

use educe::Educe;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::framework::{RoutingSystem, Timestamp};

/// A directly reachable node, kept alive by beacon receipt.
#[derive(Educe)]
#[educe(Clone(bound()))]
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Neighbour<T: RoutingSystem + ?Sized> {
    /// the routing network address
    pub addr: T::NodeAddress,
    /// the interface this neighbour was heard on
    pub iface: T::InterfaceId,
    /// logical time past which the neighbour is considered gone
    pub expires_at: Timestamp,
}

/// Liveness tracker for adjacent nodes. Expiry is the sole trigger for
/// link-failure-driven route invalidation; `purge_expired` reports each
/// lost neighbour exactly once.
#[serde_as]
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct NeighbourTracker<T: RoutingSystem + ?Sized> {
    #[serde_as(as = "Vec<(_, _)>")]
    entries: HashMap<T::NodeAddress, Neighbour<T>>,
}

impl<T: RoutingSystem + ?Sized> NeighbourTracker<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Inserts the neighbour or refreshes its expiry to `now + lifetime`.
    pub fn update(
        &mut self,
        addr: T::NodeAddress,
        iface: T::InterfaceId,
        now: Timestamp,
        lifetime: Duration,
    ) {
        let expires_at = now + lifetime.as_millis() as u64;
        self.entries.insert(
            addr.clone(),
            Neighbour {
                addr,
                iface,
                expires_at,
            },
        );
    }

    pub fn is_neighbour(&self, addr: &T::NodeAddress) -> bool {
        self.entries.contains_key(addr)
    }

    pub fn get(&self, addr: &T::NodeAddress) -> Option<&Neighbour<T>> {
        self.entries.get(addr)
    }

    pub fn neighbours(&self) -> impl Iterator<Item = &Neighbour<T>> {
        self.entries.values()
    }

    /// Owned snapshot of the live addresses; the caller usually mutates the
    /// route tables while walking it.
    pub fn addresses(&self) -> Vec<T::NodeAddress> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every neighbour whose expiry has passed and returns them,
    /// once per expiry event.
    pub fn purge_expired(&mut self, now: Timestamp) -> Vec<T::NodeAddress> {
        let mut lost = Vec::new();
        self.entries.retain(|addr, n| {
            if n.expires_at < now {
                lost.push(addr.clone());
                false
            } else {
                true
            }
        });
        lost
    }

    pub fn remove(&mut self, addr: &T::NodeAddress) -> Option<Neighbour<T>> {
        self.entries.remove(addr)
    }

    /// Removes every neighbour heard on `iface` (interface teardown).
    pub fn remove_via_interface(&mut self, iface: &T::InterfaceId) -> Vec<T::NodeAddress> {
        let mut removed = Vec::new();
        self.entries.retain(|addr, n| {
            if n.iface == *iface {
                removed.push(addr.clone());
                false
            } else {
                true
            }
        });
        removed
    }
}

impl<T: RoutingSystem + ?Sized> Default for NeighbourTracker<T> {
    fn default() -> Self {
        Self::new()
    }
}
