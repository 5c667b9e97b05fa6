//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::packet::Options;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum InterfaceType {
    Broadcast,
    NonBroadcast,
    PointToMultipoint,
    PointToPoint,
}

// Interface attributes the adjacency engine depends on.
#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct InterfaceInfo {
    pub ifindex: u32,
    pub name: String,
    pub if_type: InterfaceType,
    pub mtu: u16,
    pub area_id: Ipv4Addr,
    // Options advertised on the interface. The E-bit is clear when the
    // attached area doesn't carry AS-external LSAs.
    pub options: Options,
    pub dr: Option<Ipv4Addr>,
    pub bdr: Option<Ipv4Addr>,
}

// Interface lookups, provided by the interface state machine.
pub trait InterfaceTable: Send + Sync {
    fn lookup(&self, ifindex: u32) -> Option<InterfaceInfo>;
}

// ===== impl InterfaceInfo =====

impl InterfaceInfo {
    // Checks whether a full adjacency should be formed with the given
    // neighbor (Section 10.4 of RFC 2328).
    pub fn need_adjacency(
        &self,
        router_id: Ipv4Addr,
        nbr_id: Ipv4Addr,
    ) -> bool {
        match self.if_type {
            InterfaceType::PointToPoint | InterfaceType::PointToMultipoint => {
                true
            }
            InterfaceType::Broadcast | InterfaceType::NonBroadcast => {
                [router_id, nbr_id]
                    .into_iter()
                    .any(|id| self.dr == Some(id) || self.bdr == Some(id))
            }
        }
    }

    pub fn is_dr(&self, router_id: Ipv4Addr) -> bool {
        self.dr == Some(router_id)
    }

    // Checks whether the attached area carries AS-external LSAs.
    pub fn external_routing(&self) -> bool {
        self.options.contains(Options::E)
    }
}

// ===== testing collaborators =====

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use std::collections::BTreeMap;
    use std::sync::RwLock;

    use super::*;

    // Interface table backed by a plain map.
    #[derive(Debug, Default)]
    pub struct StaticInterfaceTable(RwLock<BTreeMap<u32, InterfaceInfo>>);

    impl StaticInterfaceTable {
        pub fn insert(&self, iface: InterfaceInfo) {
            self.0.write().unwrap().insert(iface.ifindex, iface);
        }

        pub fn remove(&self, ifindex: u32) {
            self.0.write().unwrap().remove(&ifindex);
        }

        pub fn update<F>(&self, ifindex: u32, f: F)
        where
            F: FnOnce(&mut InterfaceInfo),
        {
            if let Some(iface) = self.0.write().unwrap().get_mut(&ifindex) {
                f(iface);
            }
        }
    }

    impl InterfaceTable for StaticInterfaceTable {
        fn lookup(&self, ifindex: u32) -> Option<InterfaceInfo> {
            self.0.read().unwrap().get(&ifindex).cloned()
        }
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use const_addrs::ip4;

    use super::*;

    fn iface(if_type: InterfaceType) -> InterfaceInfo {
        InterfaceInfo::new(
            1,
            "eth-rt2".to_owned(),
            if_type,
            1500,
            ip4!("0.0.0.0"),
            Options::E,
            Some(ip4!("3.3.3.3")),
            None,
        )
    }

    #[test]
    fn adjacency_eligibility() {
        let p2p = iface(InterfaceType::PointToPoint);
        assert!(p2p.need_adjacency(ip4!("1.1.1.1"), ip4!("2.2.2.2")));

        let bcast = iface(InterfaceType::Broadcast);
        assert!(!bcast.need_adjacency(ip4!("1.1.1.1"), ip4!("2.2.2.2")));
        assert!(bcast.need_adjacency(ip4!("1.1.1.1"), ip4!("3.3.3.3")));
        assert!(bcast.need_adjacency(ip4!("3.3.3.3"), ip4!("2.2.2.2")));
        assert!(bcast.is_dr(ip4!("3.3.3.3")));
    }
}
