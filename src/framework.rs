use std::hash::Hash;
use std::net::Ipv4Addr;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Logical time in milliseconds, supplied by the external discrete-event
/// scheduler. The core never reads a wall clock.
pub type Timestamp = u64;

pub trait RoutingSystem {
    /// Address of the node on the routing network, MUST be globally unique
    type NodeAddress: NetAddress + Ord + PartialOrd;
    /// Identifies a physical interface of the node; an interface carries
    /// exactly one network address
    type InterfaceId: ProtoKey + ProtoData;
    /// An opaque data-plane packet, held by the queue while a route is pending
    type PacketHandle: ProtoData;
    /// Identity used to deduplicate buffered packets
    type PacketId: ProtoKey + ProtoData;
    fn config() -> ProtocolParams {
        Default::default()
    }
}

pub trait ProtoData: Clone + Serialize + DeserializeOwned + Sized {}
pub trait ProtoKey: Eq + PartialEq + Hash {}
impl<T: Eq + PartialEq + Hash> ProtoKey for T {}
impl<T: Clone + Serialize + DeserializeOwned + Sized> ProtoData for T {}

/// A routing address with the fixed four-octet representation the control
/// headers carry on the wire.
pub trait NetAddress: ProtoData + ProtoKey {
    fn to_octets(&self) -> [u8; 4];
    fn from_octets(octets: [u8; 4]) -> Self;
}

impl NetAddress for Ipv4Addr {
    fn to_octets(&self) -> [u8; 4] {
        u32::from(*self).to_be_bytes()
    }
    fn from_octets(octets: [u8; 4]) -> Self {
        Ipv4Addr::from(octets)
    }
}

/// Protocol Parameters
pub struct ProtocolParams {
    /// Interval between HELLO beacons while beaconing is enabled.
    pub hello_interval: Duration,
    /// How long a neighbour stays live past its last beacon.
    pub neighbour_lifetime: Duration,
    /// Capacity of the data packet queue.
    pub max_queue_len: usize,
    /// Capacity of the pending reply queue.
    pub max_pending_replies: usize,
    /// Grace period before a deferred update is released to a next hop.
    pub pending_reply_timeout: Duration,
    /// Whether this node emits beacons and seeds direct routes from them.
    pub enable_hello: bool,
}
impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            hello_interval: Duration::from_secs(1),
            neighbour_lifetime: Duration::from_secs(3),
            max_queue_len: 64,
            max_pending_replies: 64,
            pending_reply_timeout: Duration::from_secs(2),
            enable_hello: true,
        }
    }
}
