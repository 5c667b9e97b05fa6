//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use holo_utils::{UnboundedReceiver, UnboundedSender};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::collections::NeighborKey;
use crate::debug::SeqNoMismatchReason;
use crate::neighbor::{NeighborRecord, nsm};

// Observable adjacency changes.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AdjacencyEvent {
    pub key: NeighborKey,
    pub router_id: Ipv4Addr,
    pub kind: AdjacencyEventKind,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum AdjacencyEventKind {
    StateChange {
        old_state: nsm::State,
        new_state: nsm::State,
    },
    SeqNoMismatch(SeqNoMismatchReason),
    BadLsReq,
}

// Asks the LSDB to re-originate the Network-LSA of an interface.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct NetworkLsaRequest {
    pub ifindex: u32,
    pub reason: NetworkLsaReason,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum NetworkLsaReason {
    AdjacencyFull,
    AdjacencyLost,
    ExchangeDone,
}

// Notifications for the interface state machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum InterfaceNotification {
    // A neighbor's inactivity timer expired. The interface reruns its DR/BDR
    // election.
    NeighborDead {
        ifindex: u32,
        key: NeighborKey,
        router_id: Ipv4Addr,
    },
}

#[derive(Clone, Debug)]
pub struct NotificationTx {
    pub adjacency: UnboundedSender<AdjacencyEvent>,
    pub network_lsa: UnboundedSender<NetworkLsaRequest>,
    pub interface: UnboundedSender<InterfaceNotification>,
}

#[derive(Debug)]
pub struct NotificationRx {
    pub adjacency: UnboundedReceiver<AdjacencyEvent>,
    pub network_lsa: UnboundedReceiver<NetworkLsaRequest>,
    pub interface: UnboundedReceiver<InterfaceNotification>,
}

// ===== impl NotificationTx =====

impl NotificationTx {
    pub(crate) fn state_change(
        &self,
        nbr: &NeighborRecord,
        old_state: nsm::State,
        new_state: nsm::State,
    ) {
        self.adjacency_event(
            nbr,
            AdjacencyEventKind::StateChange {
                old_state,
                new_state,
            },
        );
    }

    pub(crate) fn adjacency_event(
        &self,
        nbr: &NeighborRecord,
        kind: AdjacencyEventKind,
    ) {
        let _ = self.adjacency.send(AdjacencyEvent {
            key: nbr.key,
            router_id: nbr.router_id,
            kind,
        });
    }

    pub(crate) fn network_lsa(&self, ifindex: u32, reason: NetworkLsaReason) {
        let _ = self.network_lsa.send(NetworkLsaRequest { ifindex, reason });
    }

    pub(crate) fn neighbor_dead(&self, key: NeighborKey, router_id: Ipv4Addr) {
        let _ = self.interface.send(InterfaceNotification::NeighborDead {
            ifindex: key.ifindex,
            key,
            router_id,
        });
    }
}

// ===== global functions =====

pub fn channels() -> (NotificationTx, NotificationRx) {
    let (adjacencyp, adjacencyc) = mpsc::unbounded_channel();
    let (network_lsap, network_lsac) = mpsc::unbounded_channel();
    let (interfacep, interfacec) = mpsc::unbounded_channel();

    let tx = NotificationTx {
        adjacency: adjacencyp,
        network_lsa: network_lsap,
        interface: interfacep,
    };
    let rx = NotificationRx {
        adjacency: adjacencyc,
        network_lsa: network_lsac,
        interface: interfacec,
    };

    (tx, rx)
}
