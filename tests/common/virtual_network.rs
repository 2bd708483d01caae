use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use hopvec::concepts::packet::SendTarget;
use hopvec::concepts::route::{RouteEntry, RouteState};
use hopvec::framework::{ProtocolParams, RoutingSystem, Timestamp};
use hopvec::router::Router;

pub const IFACE: u32 = 1;
pub const TICK_MS: Timestamp = 1000;

/// An in-memory mesh of routers. Datagrams emitted in one tick travel one
/// link and are delivered at the start of the next tick.
#[derive(Serialize, Deserialize)]
pub struct VirtualNet {
    pub routers: Vec<Router<VirtualNet>>,
    /// (sender, receiver, payload) datagrams in flight
    pub wires: Vec<(Ipv4Addr, Ipv4Addr, Vec<u8>)>,
    /// directed adjacency, kept symmetric by `create`/`cut_link`
    pub links: BTreeSet<(Ipv4Addr, Ipv4Addr)>,
    pub now: Timestamp,
}

impl RoutingSystem for VirtualNet {
    type NodeAddress = Ipv4Addr;
    type InterfaceId = u32;
    type PacketHandle = Vec<u8>;
    type PacketId = u64;
    fn config() -> ProtocolParams {
        Default::default()
    }
}

pub fn addr(n: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, n)
}

impl VirtualNet {
    pub fn create(nodes: &[u8], links: &[(u8, u8)]) -> VirtualNet {
        let routers = nodes
            .iter()
            .map(|&n| {
                let a = addr(n);
                let mut router = Router::new(a);
                router.interface_up(IFACE, a);
                router
            })
            .collect();
        let mut set = BTreeSet::new();
        for &(x, y) in links {
            set.insert((addr(x), addr(y)));
            set.insert((addr(y), addr(x)));
        }
        VirtualNet {
            routers,
            wires: Vec::new(),
            links: set,
            now: 0,
        }
    }

    pub fn cut_link(&mut self, x: u8, y: u8) {
        self.links.remove(&(addr(x), addr(y)));
        self.links.remove(&(addr(y), addr(x)));
    }

    pub fn node(&mut self, n: u8) -> &mut Router<VirtualNet> {
        let a = addr(n);
        self.routers
            .iter_mut()
            .find(|r| r.address == a)
            .unwrap_or_else(|| panic!("no node {a}"))
    }

    pub fn route(&self, n: u8, dst: Ipv4Addr) -> Option<&RouteEntry<VirtualNet>> {
        let a = addr(n);
        self.routers
            .iter()
            .find(|r| r.address == a)
            .unwrap_or_else(|| panic!("no node {a}"))
            .route_for(&dst)
    }

    pub fn next_hop(&self, n: u8, dst: u8) -> Ipv4Addr {
        self.route(n, addr(dst))
            .unwrap_or_else(|| panic!("no route from {n} to {dst}"))
            .next_hop
    }

    pub fn hops(&self, n: u8, dst: u8) -> u32 {
        self.route(n, addr(dst))
            .unwrap_or_else(|| panic!("no route from {n} to {dst}"))
            .hops
    }

    pub fn state(&self, n: u8, dst: u8) -> RouteState {
        self.route(n, addr(dst))
            .unwrap_or_else(|| panic!("no route from {n} to {dst}"))
            .state
    }

    /// Queues a raw datagram for next-tick delivery, as if `from` had sent it.
    pub fn inject(&mut self, from: u8, to: u8, payload: Vec<u8>) {
        self.wires.push((addr(from), addr(to), payload));
    }

    /// One protocol round: deliver what is in flight, run every node's
    /// timers, then collect the emitted datagrams.
    pub fn tick(&mut self) {
        self.now += TICK_MS;
        let now = self.now;
        let deliveries: Vec<_> = self.wires.drain(..).collect();
        for (sender, receiver, payload) in deliveries {
            if !self.links.contains(&(sender, receiver)) {
                continue;
            }
            if let Some(router) = self.routers.iter_mut().find(|r| r.address == receiver) {
                router.handle_control(&sender, &receiver, &payload, now);
            }
        }
        for router in &mut self.routers {
            router.on_hello_timer();
            router.on_update_timer(now);
            router.check_neighbours(now);
            router.purge_pending_replies(now);
        }
        self.collect();
    }

    pub fn tick_n(&mut self, times: u32) {
        for _ in 0..times {
            self.tick();
        }
    }

    fn collect(&mut self) {
        let links = self.links.clone();
        let mut sent = Vec::new();
        for router in &mut self.routers {
            let from = router.address;
            for pkt in router.outbound.drain(..) {
                match pkt.target {
                    // only IFACE is the shared medium; other interfaces are
                    // stub links with no listeners
                    SendTarget::Broadcast(iface) => {
                        if iface != IFACE {
                            continue;
                        }
                        for (a, b) in &links {
                            if *a == from {
                                sent.push((from, *b, pkt.payload.clone()));
                            }
                        }
                    }
                    SendTarget::Neighbour(n) => sent.push((from, n, pkt.payload)),
                }
            }
        }
        self.wires.extend(sent);
    }

    pub fn freeze(&self) -> String {
        serde_json::to_string(self).unwrap()
    }

    pub fn restore(state: &str) -> VirtualNet {
        serde_json::from_str(state).unwrap()
    }
}
