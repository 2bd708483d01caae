use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::concepts::route::{RouteEntry, RouteState};
use crate::framework::RoutingSystem;

/// A neighbour's last-advertised view: destination to candidate route.
pub type Vector<T> =
    HashMap<<T as RoutingSystem>::NodeAddress, RouteEntry<T>>;

/// The two tables of the protocol: the single authoritative forwarding table
/// consulted for every forwarding decision, and one owned vector per
/// neighbour holding that neighbour's advertised candidates. Vectors are
/// created lazily on the first advertisement and removed with the neighbour.
#[serde_as]
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct RouteTables<T: RoutingSystem + ?Sized> {
    #[serde_as(as = "Vec<(_, _)>")]
    pub forwarding: HashMap<T::NodeAddress, RouteEntry<T>>,
    #[serde_as(as = "Vec<(_, Vec<(_, _)>)>")]
    pub vectors: HashMap<T::NodeAddress, Vector<T>>,
}

impl<T: RoutingSystem + ?Sized> RouteTables<T> {
    pub fn new() -> Self {
        Self {
            forwarding: HashMap::new(),
            vectors: HashMap::new(),
        }
    }

    pub fn lookup(&self, dest: &T::NodeAddress) -> Option<&RouteEntry<T>> {
        self.forwarding.get(dest)
    }

    pub fn lookup_mut(&mut self, dest: &T::NodeAddress) -> Option<&mut RouteEntry<T>> {
        self.forwarding.get_mut(dest)
    }

    /// Adds a forwarding entry only if the destination is new.
    pub fn add_route(&mut self, entry: RouteEntry<T>) -> bool {
        if self.forwarding.contains_key(&entry.dest) {
            return false;
        }
        self.forwarding.insert(entry.dest.clone(), entry);
        true
    }

    /// Overwrites an existing forwarding entry; fails if the destination is
    /// unknown.
    pub fn update(&mut self, entry: RouteEntry<T>) -> bool {
        match self.forwarding.get_mut(&entry.dest) {
            Some(slot) => {
                *slot = entry;
                true
            }
            None => false,
        }
    }

    pub fn delete_route(&mut self, dest: &T::NodeAddress) -> bool {
        self.forwarding.remove(dest).is_some()
    }

    pub fn set_entry_state(&mut self, dest: &T::NodeAddress, state: RouteState) -> bool {
        match self.forwarding.get_mut(dest) {
            Some(entry) => {
                entry.state = state;
                true
            }
            None => false,
        }
    }

    pub fn vector(&self, neighbour: &T::NodeAddress) -> Option<&Vector<T>> {
        self.vectors.get(neighbour)
    }

    pub fn vector_mut(&mut self, neighbour: &T::NodeAddress) -> Option<&mut Vector<T>> {
        self.vectors.get_mut(neighbour)
    }

    /// The neighbour's vector, created empty on first use.
    pub fn vector_entry(&mut self, neighbour: &T::NodeAddress) -> &mut Vector<T> {
        self.vectors.entry(neighbour.clone()).or_default()
    }

    pub fn remove_vector(&mut self, neighbour: &T::NodeAddress) -> Option<Vector<T>> {
        self.vectors.remove(neighbour)
    }

    /// Hard-deletes every forwarding entry that leaves through `iface`,
    /// keeping the entry for `own` (the self route survives teardown).
    /// Returns the destinations that were removed.
    pub fn delete_routes_via_interface(
        &mut self,
        iface: &T::InterfaceId,
        own: &T::NodeAddress,
    ) -> Vec<T::NodeAddress> {
        let mut removed = Vec::new();
        self.forwarding.retain(|dest, entry| {
            if entry.iface == *iface && dest != own {
                removed.push(dest.clone());
                false
            } else {
                true
            }
        });
        removed
    }
}

impl<T: RoutingSystem + ?Sized> Default for RouteTables<T> {
    fn default() -> Self {
        Self::new()
    }
}
