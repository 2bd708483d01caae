use std::time::Duration;

use educe::Educe;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::framework::{RoutingSystem, Timestamp};

/// How far a buffered packet has been pushed out so far.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForwardingStatus {
    NotForwarded = 0,
    InactiveForwarded = 1,
    ActiveForwarded = 2,
}

/// Which tier of route a flush is allowed to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    /// the selected route is still INACTIVE; send speculatively
    Tentative,
    /// the selected route is ACTIVE
    Confirmed,
}

#[derive(Educe)]
#[educe(Clone(bound()))]
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct QueueEntry<T: RoutingSystem + ?Sized> {
    pub id: T::PacketId,
    pub packet: T::PacketHandle,
    pub dest: T::NodeAddress,
    pub status: ForwardingStatus,
}

/// A drop-front queue with binary state precedence rules, buffering data
/// packets the node has no route for yet. Serving an entry marks it rather
/// than removing it, so the drop policy can reclaim already-sent packets
/// before ones that were never attempted.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PacketQueue<T: RoutingSystem + ?Sized> {
    queue: Vec<QueueEntry<T>>,
    max_len: usize,
}

impl<T: RoutingSystem + ?Sized> PacketQueue<T> {
    pub fn new(max_len: usize) -> Self {
        Self {
            queue: Vec::new(),
            max_len,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn set_max_len(&mut self, max_len: usize) {
        self.max_len = max_len;
    }

    pub fn entries(&self) -> &[QueueEntry<T>] {
        &self.queue
    }

    pub fn contains(&self, dest: &T::NodeAddress) -> bool {
        self.queue.iter().any(|e| e.dest == *dest)
    }

    /// Pushes an entry unless one with the same packet identity and
    /// destination is already queued. A full queue evicts one entry by the
    /// precedence policy first. Returning `false` is an expected, silent
    /// drop, not an error.
    pub fn enqueue(&mut self, entry: QueueEntry<T>) -> bool {
        if self
            .queue
            .iter()
            .any(|e| e.id == entry.id && e.dest == entry.dest)
        {
            return false;
        }
        if self.queue.len() >= self.max_len {
            match self.drop_policy() {
                Some(victim) => {
                    debug!("queue full, dropping least-priority packet for {}", json!(victim.dest));
                }
                None => return false,
            }
        }
        self.queue.push(entry);
        true
    }

    /// Serves the earliest eligible entry for `dest` at the given confidence
    /// tier, marking it so the same tier never re-sends it. The entry stays
    /// queued until evicted or dropped.
    pub fn dequeue(
        &mut self,
        dest: &T::NodeAddress,
        confidence: Confidence,
    ) -> Option<QueueEntry<T>> {
        for entry in self.queue.iter_mut().filter(|e| e.dest == *dest) {
            match confidence {
                Confidence::Confirmed => {
                    if entry.status != ForwardingStatus::ActiveForwarded {
                        entry.status = ForwardingStatus::ActiveForwarded;
                        return Some(entry.clone());
                    }
                }
                Confidence::Tentative => {
                    if entry.status == ForwardingStatus::NotForwarded {
                        entry.status = ForwardingStatus::InactiveForwarded;
                        return Some(entry.clone());
                    }
                }
            }
        }
        None
    }

    /// Removes and returns every entry for `dest` (route teardown).
    pub fn drop_packets_for(&mut self, dest: &T::NodeAddress) -> Vec<QueueEntry<T>> {
        let mut dropped = Vec::new();
        self.queue.retain(|e| {
            if e.dest == *dest {
                dropped.push(e.clone());
                false
            } else {
                true
            }
        });
        dropped
    }

    /// Precedence-based eviction: the oldest ACTIVE_FORWARDED entry first,
    /// else the oldest INACTIVE_FORWARDED, else the oldest NOT_FORWARDED.
    fn drop_policy(&mut self) -> Option<QueueEntry<T>> {
        for status in [
            ForwardingStatus::ActiveForwarded,
            ForwardingStatus::InactiveForwarded,
            ForwardingStatus::NotForwarded,
        ] {
            if let Some(pos) = self.queue.iter().position(|e| e.status == status) {
                return Some(self.queue.remove(pos));
            }
        }
        None
    }
}

/// An update owed to a neighbour, held back for a grace period while that
/// neighbour's primary path is re-verified.
#[derive(Educe)]
#[educe(Clone(bound()))]
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PendingReplyEntry<T: RoutingSystem + ?Sized> {
    pub neighbour: T::NodeAddress,
    pub dest: T::NodeAddress,
    pub expires_at: Timestamp,
}

/// Bounded drop-front queue of deferred updates with a fixed timeout.
/// Duplicate (neighbour, destination) pairs coalesce, which is what damps
/// rapid update storms towards a single next hop.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PendingReplyQueue<T: RoutingSystem + ?Sized> {
    queue: Vec<PendingReplyEntry<T>>,
    max_len: usize,
    timeout_ms: u64,
}

impl<T: RoutingSystem + ?Sized> PendingReplyQueue<T> {
    pub fn new(max_len: usize, timeout: Duration) -> Self {
        Self {
            queue: Vec::new(),
            max_len,
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, neighbour: &T::NodeAddress, dest: &T::NodeAddress) -> bool {
        self.queue
            .iter()
            .any(|e| e.neighbour == *neighbour && e.dest == *dest)
    }

    /// Defers an update for `dest` owed to `neighbour`. Rejects duplicates;
    /// a full queue unconditionally drops its most aged entry.
    pub fn enqueue(
        &mut self,
        neighbour: T::NodeAddress,
        dest: T::NodeAddress,
        now: Timestamp,
    ) -> bool {
        if self.contains(&neighbour, &dest) {
            return false;
        }
        if self.queue.len() >= self.max_len && !self.queue.is_empty() {
            let aged = self.queue.remove(0);
            debug!("pending reply queue full, dropping deferred update to {}", json!(aged.neighbour));
        }
        self.queue.push(PendingReplyEntry {
            neighbour,
            dest,
            expires_at: now + self.timeout_ms,
        });
        true
    }

    /// Removes and returns the earliest entry for `neighbour`, if any.
    pub fn dequeue(&mut self, neighbour: &T::NodeAddress) -> Option<PendingReplyEntry<T>> {
        let pos = self.queue.iter().position(|e| e.neighbour == *neighbour)?;
        Some(self.queue.remove(pos))
    }

    /// Drops every entry owed to `neighbour` (the neighbour is gone).
    pub fn drop_neighbour(&mut self, neighbour: &T::NodeAddress) -> usize {
        let before = self.queue.len();
        self.queue.retain(|e| e.neighbour != *neighbour);
        before - self.queue.len()
    }

    /// Removes and returns every entry whose grace period has elapsed; each
    /// expired entry is reported exactly once.
    pub fn purge(&mut self, now: Timestamp) -> Vec<PendingReplyEntry<T>> {
        let mut expired = Vec::new();
        self.queue.retain(|e| {
            if e.expires_at < now {
                expired.push(e.clone());
                false
            } else {
                true
            }
        });
        expired
    }
}
