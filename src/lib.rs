//! hopvec is an I/O-free control-plane core for a binary-state
//! distance-vector unicast routing protocol. It owns the route tables, the
//! neighbour liveness tracker and the bounded packet/reply queues; sockets,
//! devices and the discrete-event scheduler are injected collaborators that
//! feed [`router::Router`] raw control messages and logical time, and drain
//! its outbound packets and data-plane events.

pub mod concepts;
pub mod feedback;
pub mod framework;
pub mod router;
pub mod util;
