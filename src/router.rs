use std::collections::HashMap;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_with::serde_as;

use crate::concepts::neighbour::NeighbourTracker;
use crate::concepts::packet::{
    ControlMessage, DataEvent, HelloHeader, OutboundPacket, SendTarget, UpdateHeader,
};
use crate::concepts::queue::{
    Confidence, ForwardingStatus, PacketQueue, PendingReplyQueue, QueueEntry,
};
use crate::concepts::route::{RouteEntry, RouteState};
use crate::concepts::tables::RouteTables;
use crate::feedback::RoutingWarning;
use crate::framework::{RoutingSystem, Timestamp};
use crate::util::{add_hop, past_threshold};

/// Hop count past which a route is treated as effectively unreachable.
pub const THRESHOLD: u32 = 16;

/// The per-node control plane: owns both route tables, the neighbour
/// tracker and the two bounded queues, and reconciles them on every control
/// message, neighbour loss and interface event. All mutation runs to
/// completion on the caller's (single) logical thread; the external
/// scheduler decides *when* the entry points run.
#[serde_as]
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Router<T: RoutingSystem + ?Sized> {
    /// the node's main address, also the destination of its self route
    pub address: T::NodeAddress,
    pub tables: RouteTables<T>,
    pub neighbours: NeighbourTracker<T>,
    /// registered interfaces, exactly one address each
    #[serde_as(as = "Vec<(_, _)>")]
    pub interfaces: HashMap<T::InterfaceId, T::NodeAddress>,
    pub queue: PacketQueue<T>,
    pub pending_replies: PendingReplyQueue<T>,
    /// encoded control messages awaiting the transport collaborator
    pub outbound: Vec<OutboundPacket<T>>,
    /// data-plane instructions awaiting the forwarding collaborator
    pub events: Vec<DataEvent<T>>,
    hello_enabled: bool,
}

impl<T: RoutingSystem> Router<T> {
    pub fn new(address: T::NodeAddress) -> Self {
        let params = T::config();
        Self {
            address,
            tables: RouteTables::new(),
            neighbours: NeighbourTracker::new(),
            interfaces: HashMap::new(),
            queue: PacketQueue::new(params.max_queue_len),
            pending_replies: PendingReplyQueue::new(
                params.max_pending_replies,
                params.pending_reply_timeout,
            ),
            outbound: Vec::new(),
            events: Vec::new(),
            hello_enabled: params.enable_hello,
        }
    }

    pub fn hello_enabled(&self) -> bool {
        self.hello_enabled
    }

    pub fn set_hello_enabled(&mut self, enabled: bool) {
        self.hello_enabled = enabled;
    }

    // region Interface

    /// Registers an interface and installs the hop-1 route for the address
    /// it carries. Address add/remove notifications map onto
    /// `interface_up`/`interface_down` since an interface carries exactly
    /// one address.
    pub fn interface_up(&mut self, iface: T::InterfaceId, addr: T::NodeAddress) {
        self.interfaces.insert(iface.clone(), addr.clone());
        if self.tables.lookup(&addr).is_none() {
            // owned destinations sit at hop 1, always active; the entry for
            // the main address additionally survives teardown
            self.tables.add_route(RouteEntry {
                dest: addr.clone(),
                next_hop: addr,
                iface,
                hops: 1,
                state: RouteState::Active,
                changed: false,
            });
        }
    }

    /// Tears an interface down: the neighbours heard on it, their vectors,
    /// the pending replies owed to them and every forwarding entry leaving
    /// through it (self route excepted) are removed. This is the only path
    /// that hard-deletes destinations; everywhere else loss of reachability
    /// is an INACTIVE transition.
    pub fn interface_down(&mut self, iface: &T::InterfaceId, now: Timestamp) {
        self.interfaces.remove(iface);
        for n in self.neighbours.remove_via_interface(iface) {
            self.pending_replies.drop_neighbour(&n);
            self.tables.remove_vector(&n);
        }
        let removed = self.tables.delete_routes_via_interface(iface, &self.address);
        for dst in &removed {
            for dropped in self.queue.drop_packets_for(dst) {
                self.events.push(DataEvent::Dropped {
                    packet: dropped.packet,
                    dest: dropped.dest,
                });
            }
        }
        // withdraw the torn-down destinations towards surviving neighbours
        for dst in &removed {
            let payload = ControlMessage::<T>::Update(UpdateHeader {
                origin: self.address.clone(),
                dest: dst.clone(),
                hops: add_hop(THRESHOLD),
                state: RouteState::Inactive,
            })
            .encode();
            for n in self.neighbours.addresses() {
                self.outbound.push(OutboundPacket {
                    target: SendTarget::Neighbour(n),
                    payload: payload.clone(),
                });
            }
        }
        let changes = self.compute_forwarding_table();
        self.propagate(&changes, now);
    }

    fn interface_for(&self, addr: &T::NodeAddress) -> Option<T::InterfaceId> {
        for (iface, a) in &self.interfaces {
            if a == addr {
                return Some(iface.clone());
            }
        }
        None
    }

    /// Whether `addr` is assigned to this node (main address or any
    /// interface address).
    pub fn is_own_address(&self, addr: &T::NodeAddress) -> bool {
        *addr == self.address || self.interfaces.values().any(|a| a == addr)
    }

    // endregion

    // region Control Input

    /// Entry point for the transport collaborator: one raw control datagram
    /// plus its sender and receiver addresses. Malformed input is dropped
    /// here and never propagates.
    pub fn handle_control(
        &mut self,
        sender: &T::NodeAddress,
        receiver: &T::NodeAddress,
        buf: &[u8],
        now: Timestamp,
    ) {
        let msg = match ControlMessage::<T>::decode(buf) {
            Ok(msg) => msg,
            Err(e) => {
                debug!("dropping control message from {}: {}", json!(sender), e);
                return;
            }
        };
        let Some(iface) = self.interface_for(receiver) else {
            debug!(
                "no interface with address {}, dropping message",
                json!(receiver)
            );
            return;
        };
        match msg {
            ControlMessage::Hello(hello) => self.handle_hello(hello, iface, now),
            ControlMessage::Update(update) => self.handle_update(update, iface, now),
        }
    }

    fn handle_hello(&mut self, hello: HelloHeader<T>, iface: T::InterfaceId, now: Timestamp) {
        if self.is_own_address(&hello.origin) {
            return;
        }
        // a beacon is only a liveness signal when it announces itself
        if hello.origin != hello.dest {
            debug!(
                "ignoring hello from {} for {}",
                json!(hello.origin),
                json!(hello.dest)
            );
            return;
        }
        self.neighbours.update(
            hello.origin.clone(),
            iface.clone(),
            now,
            T::config().neighbour_lifetime,
        );
        if !self.hello_enabled {
            return;
        }
        // seed the neighbour's vector with the 1-hop route to itself;
        // this is the only way direct routes enter the tables
        let origin = hello.origin;
        let seed = RouteEntry {
            dest: origin.clone(),
            next_hop: origin.clone(),
            iface,
            hops: 1,
            state: RouteState::Active,
            changed: false,
        };
        self.update_distance_vector_table(&origin, seed);
        let changes = self.compute_forwarding_table();
        self.propagate(&changes, now);
    }

    fn handle_update(&mut self, update: UpdateHeader<T>, iface: T::InterfaceId, now: Timestamp) {
        if self.is_own_address(&update.origin) || self.is_own_address(&update.dest) {
            // we can safely ignore a route to ourself, or our own echo
            return;
        }
        // any control traffic proves the neighbour is alive
        self.neighbours.update(
            update.origin.clone(),
            iface.clone(),
            now,
            T::config().neighbour_lifetime,
        );
        // a hop count at or past the ceiling is unreachable no matter what
        // state the sender claims
        let state = if update.hops >= THRESHOLD {
            RouteState::Inactive
        } else {
            update.state
        };
        let entry = RouteEntry {
            dest: update.dest.clone(),
            next_hop: update.origin.clone(),
            iface,
            hops: update.hops,
            state,
            changed: false,
        };
        self.update_distance_vector_table(&update.origin, entry);
        let changes = self.compute_forwarding_table();
        self.propagate(&changes, now);
    }

    // endregion

    // region Route Selection

    /// Total decision over (hop count, state) pairs. An ACTIVE route is
    /// never displaced by an INACTIVE one unless its own hop count has
    /// degraded past THRESHOLD, and an INACTIVE route is only promoted when
    /// it is cheap enough to be trustworthy. Ties keep the current route.
    pub fn is_better_route(current: &RouteEntry<T>, candidate: &RouteEntry<T>) -> bool {
        match (candidate.state, current.state) {
            (RouteState::Active, RouteState::Active) => candidate.hops < current.hops,
            (RouteState::Active, RouteState::Inactive) => candidate.hops < THRESHOLD,
            (RouteState::Inactive, RouteState::Active) => past_threshold(current.hops),
            (RouteState::Inactive, RouteState::Inactive) => candidate.hops < current.hops,
        }
    }

    /// When `route` is about to mark `route.dest` INACTIVE, purges the
    /// destinations that were being reached through `next_hop` from every
    /// other neighbour's vector, so stale advertisements of the failing path
    /// cannot re-enter circulation. Only the advertisement held by the
    /// forwarding table's own next hop survives (it is overwritten right
    /// after by the incoming route).
    fn remove_fake_routes(&mut self, next_hop: &T::NodeAddress, route: &RouteEntry<T>) {
        if route.state != RouteState::Inactive {
            return;
        }
        let withdraws_neighbour = *next_hop == route.dest && self.neighbours.is_neighbour(next_hop);
        let mut fake_dsts: Vec<T::NodeAddress> = Vec::new();
        for (curr_dst, curr) in &self.tables.forwarding {
            if !curr.is_active() || curr.next_hop != *next_hop {
                continue;
            }
            if *curr_dst == route.dest || (withdraws_neighbour && *curr_dst != route.dest) {
                fake_dsts.push(curr_dst.clone());
            }
        }
        if fake_dsts.is_empty() {
            return;
        }
        let keepers: Vec<(T::NodeAddress, T::NodeAddress)> = fake_dsts
            .iter()
            .filter_map(|d| self.tables.lookup(d).map(|e| (d.clone(), e.next_hop.clone())))
            .collect();
        for n in self.neighbours.addresses() {
            let Some(vector) = self.tables.vector_mut(&n) else {
                continue;
            };
            for (dst, keeper) in &keepers {
                if n != *keeper {
                    vector.remove(dst);
                }
            }
        }
    }

    /// Writes an advertised route into `next_hop`'s vector slot for its
    /// destination, overwriting unconditionally: advertisements are
    /// idempotent per (neighbour, destination) pair and hop counts are
    /// stored as received.
    pub fn update_distance_vector_table(&mut self, next_hop: &T::NodeAddress, route: RouteEntry<T>) {
        if self.tables.lookup(&route.dest).is_some() {
            self.remove_fake_routes(next_hop, &route);
        }
        self.tables
            .vector_entry(next_hop)
            .insert(route.dest.clone(), route);
    }

    /// Re-derives the forwarding entry for `dest` from `next_hop`'s current
    /// vector. A vanished vector means the route is presumed stale and the
    /// entry is marked INACTIVE in place.
    pub fn refresh_forwarding_table(&mut self, dest: &T::NodeAddress, next_hop: &T::NodeAddress) {
        match self.tables.vector(next_hop) {
            Some(vector) => {
                if let Some(candidate) = vector.get(dest) {
                    let candidate = candidate.clone();
                    self.tables.forwarding.insert(dest.clone(), candidate);
                }
            }
            None => {
                if !self.tables.set_entry_state(dest, RouteState::Inactive) {
                    warn!(
                        "{} ({})",
                        RoutingWarning::<T>::MissingForwardingEntry { dest: dest.clone() },
                        json!(dest)
                    );
                }
            }
        }
    }

    /// Recomputes the forwarding table from every live neighbour's vector
    /// and returns the destinations whose selected route changed. The
    /// node's own address is never part of the change set.
    pub fn compute_forwarding_table(&mut self) -> Vec<T::NodeAddress> {
        let mut changes: Vec<T::NodeAddress> = Vec::new();
        for n in self.neighbours.addresses() {
            let dests: Vec<T::NodeAddress> = match self.tables.vector(&n) {
                Some(vector) => vector.keys().cloned().collect(),
                None => {
                    // live neighbour with no advertisements yet
                    debug!("{}", RoutingWarning::<T>::MissingVector { neighbour: n });
                    continue;
                }
            };
            for dst in dests {
                let Some(candidate) = self.tables.vector(&n).and_then(|v| v.get(&dst)).cloned()
                else {
                    continue;
                };
                match self.tables.lookup(&dst).cloned() {
                    Some(old) => {
                        // re-derive a clean baseline from the selected next
                        // hop before comparing
                        let selected_hop = old.next_hop.clone();
                        self.refresh_forwarding_table(&dst, &selected_hop);
                        let Some(current) = self.tables.lookup(&dst).cloned() else {
                            warn!(
                                "{}",
                                RoutingWarning::<T>::MissingForwardingEntry { dest: dst.clone() }
                            );
                            continue;
                        };
                        if Self::is_better_route(&current, &candidate) {
                            let mut adopted = candidate;
                            adopted.changed = true;
                            self.tables.forwarding.insert(dst.clone(), adopted);
                            push_change(&mut changes, &dst);
                        } else if current.hops != old.hops || current.state != old.state {
                            // the refresh itself moved the entry
                            if let Some(entry) = self.tables.lookup_mut(&dst) {
                                entry.changed = true;
                            }
                            push_change(&mut changes, &dst);
                        }
                    }
                    None => {
                        let mut adopted = candidate;
                        adopted.changed = true;
                        self.tables.forwarding.insert(dst.clone(), adopted);
                        push_change(&mut changes, &dst);
                    }
                }
            }
        }
        changes.retain(|d| *d != self.address);
        changes
    }

    // endregion

    // region Propagation

    fn propagate(&mut self, changes: &[T::NodeAddress], now: Timestamp) {
        if changes.is_empty() {
            return;
        }
        self.send_updates_for(changes, now);
        self.flush_queue(changes);
        for dst in changes {
            if let Some(entry) = self.tables.lookup_mut(dst) {
                entry.changed = false;
            }
        }
    }

    /// Advertises the given destinations to the live neighbours. The update
    /// owed to a destination's own next hop is held in the pending reply
    /// queue for the grace period instead of being echoed straight back;
    /// duplicates coalesce there.
    fn send_updates_for(&mut self, dests: &[T::NodeAddress], now: Timestamp) {
        for dst in dests {
            let Some(entry) = self.tables.lookup(dst).cloned() else {
                warn!(
                    "{}",
                    RoutingWarning::<T>::MissingForwardingEntry { dest: dst.clone() }
                );
                continue;
            };
            let payload = ControlMessage::<T>::Update(UpdateHeader {
                origin: self.address.clone(),
                dest: dst.clone(),
                hops: add_hop(entry.hops),
                state: entry.state,
            })
            .encode();
            for n in self.neighbours.addresses() {
                if n == entry.next_hop {
                    self.pending_replies.enqueue(n, dst.clone(), now);
                } else {
                    self.outbound.push(OutboundPacket {
                        target: SendTarget::Neighbour(n),
                        payload: payload.clone(),
                    });
                }
            }
        }
    }

    /// Releases buffered packets for the changed destinations: confirmed
    /// service over ACTIVE routes, a single tentative attempt over INACTIVE
    /// ones.
    fn flush_queue(&mut self, changes: &[T::NodeAddress]) {
        for dst in changes {
            let Some(entry) = self.tables.lookup(dst).cloned() else {
                continue;
            };
            let confidence = if entry.is_active() {
                Confidence::Confirmed
            } else {
                Confidence::Tentative
            };
            while let Some(queued) = self.queue.dequeue(dst, confidence) {
                self.events.push(DataEvent::Forward {
                    packet: queued.packet,
                    dest: queued.dest,
                    next_hop: entry.next_hop.clone(),
                    iface: entry.iface.clone(),
                    confidence,
                });
            }
        }
    }

    // endregion

    // region Timers

    /// Emits one beacon per registered interface. The external scheduler
    /// owns the period, jitter and rescheduling on interface changes.
    pub fn on_hello_timer(&mut self) {
        if !self.hello_enabled {
            return;
        }
        for (iface, addr) in &self.interfaces {
            let payload = ControlMessage::<T>::Hello(HelloHeader {
                origin: addr.clone(),
                dest: addr.clone(),
            })
            .encode();
            self.outbound.push(OutboundPacket {
                target: SendTarget::Broadcast(iface.clone()),
                payload,
            });
        }
    }

    /// Steady-state advertisement of the whole forwarding table except the
    /// self entry (beacons cover it). This periodic re-advertisement is what
    /// repairs stale state; there are no retries anywhere in the core.
    pub fn on_update_timer(&mut self, now: Timestamp) {
        let dests: Vec<T::NodeAddress> = self
            .tables
            .forwarding
            .keys()
            .filter(|d| **d != self.address)
            .cloned()
            .collect();
        self.send_updates_for(&dests, now);
    }

    /// Expires silent neighbours; each expiry runs the link-failure path
    /// exactly once.
    pub fn check_neighbours(&mut self, now: Timestamp) {
        for lost in self.neighbours.purge_expired(now) {
            debug!("neighbour {} expired", json!(lost));
            self.handle_neighbour_loss(&lost, now);
        }
    }

    /// Releases deferred updates whose grace period has elapsed, with the
    /// table state as it stands now. A reply going to the route's (still)
    /// selected next hop is poisoned to INACTIVE: that neighbour is upstream
    /// for the destination, and echoing the route back ACTIVE is how stale
    /// paths re-enter circulation.
    pub fn purge_pending_replies(&mut self, now: Timestamp) {
        for expired in self.pending_replies.purge(now) {
            if !self.neighbours.is_neighbour(&expired.neighbour) {
                continue;
            }
            let Some(entry) = self.tables.lookup(&expired.dest) else {
                continue;
            };
            let state = if entry.next_hop == expired.neighbour {
                RouteState::Inactive
            } else {
                entry.state
            };
            let payload = ControlMessage::<T>::Update(UpdateHeader {
                origin: self.address.clone(),
                dest: expired.dest.clone(),
                hops: add_hop(entry.hops),
                state,
            })
            .encode();
            self.outbound.push(OutboundPacket {
                target: SendTarget::Neighbour(expired.neighbour),
                payload,
            });
        }
    }

    /// Link-layer failure notification from the device collaborator; runs
    /// the same invalidation path as a beacon expiry.
    pub fn notify_link_failure(&mut self, neighbour: &T::NodeAddress, now: Timestamp) {
        if self.neighbours.remove(neighbour).is_some() {
            self.handle_neighbour_loss(neighbour, now);
        }
    }

    fn handle_neighbour_loss(&mut self, lost: &T::NodeAddress, now: Timestamp) {
        self.pending_replies.drop_neighbour(lost);
        let dests: Vec<T::NodeAddress> = match self.tables.vector_mut(lost) {
            Some(vector) => {
                // poison everything this neighbour advertised
                for entry in vector.values_mut() {
                    entry.state = RouteState::Inactive;
                }
                vector.keys().cloned().collect()
            }
            None => Vec::new(),
        };
        let mut changes: Vec<T::NodeAddress> = Vec::new();
        for dst in dests {
            let routed_through = self
                .tables
                .lookup(&dst)
                .map(|e| e.next_hop == *lost)
                .unwrap_or(false);
            if routed_through {
                // pull the poisoned copy into the forwarding table
                self.refresh_forwarding_table(&dst, lost);
                if dst != self.address {
                    push_change(&mut changes, &dst);
                }
            }
        }
        // alternatives from surviving neighbours may take over
        for dst in self.compute_forwarding_table() {
            push_change(&mut changes, &dst);
        }
        self.tables.remove_vector(lost);
        self.propagate(&changes, now);
    }

    // endregion

    // region Data Plane

    /// The forwarding entry consulted for an outbound packet, if any.
    pub fn route_for(&self, dest: &T::NodeAddress) -> Option<&RouteEntry<T>> {
        self.tables.lookup(dest)
    }

    /// Buffers a packet that has no resolved route yet. `false` means the
    /// packet was already queued or had to be dropped; both are expected.
    pub fn buffer_packet(
        &mut self,
        id: T::PacketId,
        packet: T::PacketHandle,
        dest: T::NodeAddress,
    ) -> bool {
        self.queue.enqueue(QueueEntry {
            id,
            packet,
            dest,
            status: ForwardingStatus::NotForwarded,
        })
    }

    // endregion
}

fn push_change<A: PartialEq + Clone>(changes: &mut Vec<A>, dst: &A) {
    if !changes.iter().any(|c| c == dst) {
        changes.push(dst.clone());
    }
}
