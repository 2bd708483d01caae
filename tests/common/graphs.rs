use crate::common::virtual_network::VirtualNet;

/// 1 - 2 - 3, the smallest topology with a relayed route.
pub fn vnet_chain() -> VirtualNet {
    VirtualNet::create(&[1, 2, 3], &[(1, 2), (2, 3)])
}

/// 1 - 2 - 3 - 4 with a 2 - 4 shortcut.
pub fn vnet_shortcut() -> VirtualNet {
    VirtualNet::create(&[1, 2, 3, 4], &[(1, 2), (2, 3), (3, 4), (2, 4)])
}
