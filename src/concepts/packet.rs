use byteorder::{BigEndian, ByteOrder};
use educe::Educe;
use serde::{Deserialize, Serialize};

use crate::concepts::queue::Confidence;
use crate::concepts::route::RouteState;
use crate::feedback::WireError;
use crate::framework::{NetAddress, RoutingSystem};

/// Well-known port the control plane speaks on. Socket binding and datagram
/// delivery belong to the transport collaborator.
pub const CONTROL_PORT: u16 = 653;

/// One-byte message kind. Any other value on the wire is rejected and the
/// message dropped without further processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Hello = 1,
    Update = 2,
}

/// Liveness beacon. Only accepted as a liveness signal when the destination
/// equals the origin (a self-announcement).
///
/// ```text
/// |      0        |      1        |      2        |       3       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                Origin Neighbour Interface Address             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |              Destination Neighbour Interface Address          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Educe)]
#[educe(Clone(bound()))]
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct HelloHeader<T: RoutingSystem + ?Sized> {
    pub origin: T::NodeAddress,
    pub dest: T::NodeAddress,
}

/// Route advertisement.
///
/// ```text
/// |      0        |      1        |      2        |       3       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                      Originator Address                       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                      Destination Address                      |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           HopCount                            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                            State                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Educe)]
#[educe(Clone(bound()))]
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct UpdateHeader<T: RoutingSystem + ?Sized> {
    pub origin: T::NodeAddress,
    pub dest: T::NodeAddress,
    pub hops: u32,
    pub state: RouteState,
}

/// A decoded control message: the one-byte type header followed by a
/// fixed-layout payload, multi-byte fields in network byte order.
#[derive(Educe)]
#[educe(Clone(bound()))]
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub enum ControlMessage<T: RoutingSystem + ?Sized> {
    Hello(HelloHeader<T>),
    Update(UpdateHeader<T>),
}

const HELLO_LEN: usize = 8;
const UPDATE_LEN: usize = 16;

impl<T: RoutingSystem + ?Sized> ControlMessage<T> {
    pub fn kind(&self) -> MessageType {
        match self {
            ControlMessage::Hello(_) => MessageType::Hello,
            ControlMessage::Update(_) => MessageType::Update,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            ControlMessage::Hello(h) => {
                let mut buf = Vec::with_capacity(1 + HELLO_LEN);
                buf.push(MessageType::Hello as u8);
                buf.extend_from_slice(&h.origin.to_octets());
                buf.extend_from_slice(&h.dest.to_octets());
                buf
            }
            ControlMessage::Update(u) => {
                let mut buf = Vec::with_capacity(1 + UPDATE_LEN);
                buf.push(MessageType::Update as u8);
                buf.extend_from_slice(&u.origin.to_octets());
                buf.extend_from_slice(&u.dest.to_octets());
                let mut word = [0u8; 4];
                BigEndian::write_u32(&mut word, u.hops);
                buf.extend_from_slice(&word);
                BigEndian::write_u32(&mut word, u.state as u32);
                buf.extend_from_slice(&word);
                buf
            }
        }
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        let (&kind, payload) = buf.split_first().ok_or(WireError::Empty)?;
        match kind {
            t if t == MessageType::Hello as u8 => {
                if payload.len() != HELLO_LEN {
                    return Err(WireError::BadLength {
                        expected: HELLO_LEN,
                        actual: payload.len(),
                    });
                }
                Ok(ControlMessage::Hello(HelloHeader {
                    origin: read_addr::<T>(&payload[0..4]),
                    dest: read_addr::<T>(&payload[4..8]),
                }))
            }
            t if t == MessageType::Update as u8 => {
                if payload.len() != UPDATE_LEN {
                    return Err(WireError::BadLength {
                        expected: UPDATE_LEN,
                        actual: payload.len(),
                    });
                }
                let state = match BigEndian::read_u32(&payload[12..16]) {
                    0 => RouteState::Inactive,
                    1 => RouteState::Active,
                    other => return Err(WireError::InvalidState(other)),
                };
                Ok(ControlMessage::Update(UpdateHeader {
                    origin: read_addr::<T>(&payload[0..4]),
                    dest: read_addr::<T>(&payload[4..8]),
                    hops: BigEndian::read_u32(&payload[8..12]),
                    state,
                }))
            }
            other => Err(WireError::UnknownType(other)),
        }
    }
}

fn read_addr<T: RoutingSystem + ?Sized>(bytes: &[u8]) -> T::NodeAddress {
    let mut octets = [0u8; 4];
    octets.copy_from_slice(bytes);
    T::NodeAddress::from_octets(octets)
}

/// Where the transport collaborator should deliver an encoded message.
#[derive(Educe)]
#[educe(Clone(bound()))]
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub enum SendTarget<T: RoutingSystem + ?Sized> {
    /// unicast to a known neighbour
    Neighbour(T::NodeAddress),
    /// link-local broadcast out of one interface (beacons)
    Broadcast(T::InterfaceId),
}

/// A fully-formed control message awaiting the transport collaborator.
#[derive(Educe)]
#[educe(Clone(bound()))]
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct OutboundPacket<T: RoutingSystem + ?Sized> {
    pub target: SendTarget<T>,
    /// encoded type header + payload
    pub payload: Vec<u8>,
}

/// Data-plane instructions raised while reconciling routes, drained by the
/// forwarding collaborator after every call into the router.
#[derive(Educe)]
#[educe(Clone(bound()))]
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub enum DataEvent<T: RoutingSystem + ?Sized> {
    /// hand a buffered packet to the forwarding path
    Forward {
        packet: T::PacketHandle,
        dest: T::NodeAddress,
        next_hop: T::NodeAddress,
        iface: T::InterfaceId,
        confidence: Confidence,
    },
    /// a buffered packet was abandoned (interface teardown)
    Dropped {
        packet: T::PacketHandle,
        dest: T::NodeAddress,
    },
}
