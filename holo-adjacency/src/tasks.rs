//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;
use std::time::Duration;

use holo_utils::task::{IntervalTask, TimeoutTask};
use holo_utils::{UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

use crate::debug::Debug;
use crate::error::Error;
use crate::events;
use crate::instance::{InstanceCtx, RxChannelsRx};
use crate::neighbor::{NeighborRecord, nsm};
use crate::network;
use crate::query::NeighborQuery;

//
// Adjacency engine tasks diagram:
//
//                 hello_rx (1x) -> +--------------+
//                 start_rx (1x) -> |              |
//                dbdesc_rx (1x) -> |              |
//                 lsreq_rx (1x) -> |  rx_dispatch |
//                 lsupd_rx (1x) -> |     loop     |
//                 lsack_rx (1x) -> |              |
//      iface_down/nbr_down (2x) -> |              |
//    packet_rxmt_interval (Nx) -> |              |
//                                  +--------------+
//                                     |        |
//                            conf (1x)|        |(1x) packet
//                                     V        V
//   nsm_inactivity_timer (Nx) -> +---------+  +--------------+
//                                |  conf   |->| tx_dispatch  | -> transport
//                                |  actor  |  |     loop     |
//                                +---------+  +--------------+
//                                     |
//                                     V (ArcSwap) neighbor table
//                                +---------+
//    query_refresh_interval ->   |  query  |
//                                +---------+
//

// Adjacency engine inter-task message types.
pub mod messages {
    use std::net::Ipv4Addr;

    use bytes::Bytes;
    use serde::{Deserialize, Serialize};

    use crate::collections::{ListHandle, NeighborKey};
    use crate::neighbor::{NeighborPatch, nsm};
    use crate::packet::Packet;
    use crate::packet::lsa::LsaHdr;

    // Input messages (collaborator -> rx dispatch loop).
    pub mod input {
        use super::*;

        #[derive(Debug)]
        pub enum RxEventMsg {
            Hello(HelloMsg),
            NeighborStart(NeighborStartMsg),
            DbDesc(DbDescMsg),
            LsRequest(LsRequestMsg),
            LsUpdate(LsUpdateMsg),
            LsAck(LsAckMsg),
            InterfaceDown(InterfaceDownMsg),
            NeighborDown(NeighborDownMsg),
            RxmtInterval(RxmtIntervalMsg),
        }

        // Liveness and bidirectionality, as derived by the Hello protocol.
        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct HelloMsg {
            pub key: NeighborKey,
            pub router_id: Ipv4Addr,
            pub priority: u8,
            // Whether our router ID was listed in the Hello.
            pub two_way: bool,
            pub dead_interval: Option<u16>,
        }

        // Neighbor configured on an NBMA network.
        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct NeighborStartMsg {
            pub key: NeighborKey,
            pub router_id: Ipv4Addr,
            pub priority: u8,
        }

        // Received DBD packet body.
        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct DbDescMsg {
            pub key: NeighborKey,
            pub data: Bytes,
        }

        // Received LS Request packet body.
        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct LsRequestMsg {
            pub key: NeighborKey,
            pub data: Bytes,
        }

        // Headers of the LSAs carried by a received LS Update.
        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct LsUpdateMsg {
            pub key: NeighborKey,
            pub lsa_hdrs: Vec<LsaHdr>,
        }

        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct LsAckMsg {
            pub key: NeighborKey,
            pub lsa_hdrs: Vec<LsaHdr>,
        }

        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct InterfaceDownMsg {
            pub ifindex: u32,
        }

        // Lower-level protocols consider the neighbor unreachable.
        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct NeighborDownMsg {
            pub key: NeighborKey,
        }

        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct RxmtIntervalMsg {
            pub key: NeighborKey,
        }
    }

    // Messages consumed by the conf actor.
    pub mod conf {
        use holo_utils::Responder;
        use tokio::sync::oneshot;

        use super::*;

        #[derive(Debug)]
        pub enum ConfMsg {
            Add(NeighborAddMsg),
            Update(NeighborUpdateMsg),
            Delete(NeighborDeleteMsg),
        }

        #[derive(Debug)]
        pub struct NeighborAddMsg {
            pub key: NeighborKey,
            pub router_id: Ipv4Addr,
            pub priority: u8,
            pub dead_interval: u16,
            pub state: nsm::State,
            pub event: nsm::Event,
            pub adj_eligible: bool,
            pub ack: Option<Responder<()>>,
        }

        #[derive(Debug)]
        pub struct NeighborUpdateMsg {
            pub key: NeighborKey,
            pub patch: NeighborPatch,
            pub ack: Option<Responder<()>>,
        }

        #[derive(Debug)]
        pub struct NeighborDeleteMsg {
            pub key: NeighborKey,
            pub event: nsm::Event,
            // Lists the sender saw. The delete is dropped if the neighbor
            // has been recreated since.
            pub lists: Option<ListHandle>,
            pub ack: Option<Responder<()>>,
        }

        // ===== impl ConfMsg =====

        impl ConfMsg {
            // Attaches a responder notified once the message is applied.
            pub(crate) fn with_ack(
                mut self,
            ) -> (ConfMsg, oneshot::Receiver<()>) {
                let (ackp, ackc) = oneshot::channel();
                let ack = match &mut self {
                    ConfMsg::Add(msg) => &mut msg.ack,
                    ConfMsg::Update(msg) => &mut msg.ack,
                    ConfMsg::Delete(msg) => &mut msg.ack,
                };
                *ack = Some(ackp);
                (self, ackc)
            }

            pub(crate) fn take_ack(&mut self) -> Option<Responder<()>> {
                match self {
                    ConfMsg::Add(msg) => msg.ack.take(),
                    ConfMsg::Update(msg) => msg.ack.take(),
                    ConfMsg::Delete(msg) => msg.ack.take(),
                }
            }
        }
    }

    // Output messages (handlers -> tx dispatch loop).
    pub mod output {
        use super::*;

        #[derive(Clone, Debug, Deserialize, Serialize)]
        pub struct TxPacketMsg {
            pub ifindex: u32,
            pub dst: Ipv4Addr,
            pub packet: Packet,
        }
    }
}

use messages::conf::{ConfMsg, NeighborDeleteMsg};
use messages::input::{RxEventMsg, RxmtIntervalMsg};
use messages::output::TxPacketMsg;

// ===== adjacency engine tasks =====

// Neighbor inactivity timer.
pub(crate) fn nsm_inactivity_timer(
    ctx: &InstanceCtx,
    nbr: &NeighborRecord,
) -> TimeoutTask {
    let timeout = Duration::from_secs(nbr.dead_interval.into());
    let ctx = ctx.clone();
    let key = nbr.key;
    let router_id = nbr.router_id;
    let lists = nbr.lists;

    TimeoutTask::new(timeout, move || async move {
        Debug::InactivityTimerExpiry(router_id).log();

        if let Some(nbr_lists) = ctx.lists.get(lists) {
            nbr_lists.clear();
        }
        ctx.tx.notif.neighbor_dead(key, router_id);

        let msg = ConfMsg::Delete(NeighborDeleteMsg {
            key,
            event: nsm::Event::InactivityTimer,
            lists: Some(lists),
            ack: None,
        });
        if ctx.tx.conf.send(msg).is_err() {
            Error::ActorGone.log();
        }
    })
}

// Neighbor retransmission interval.
pub(crate) fn packet_rxmt_interval(
    ctx: &InstanceCtx,
    nbr: &NeighborRecord,
) -> IntervalTask {
    let rxmt_intervalp = ctx.tx.rxmt_interval.clone();
    let key = nbr.key;

    IntervalTask::new(ctx.config.rxmt_interval(), false, move || {
        let rxmt_intervalp = rxmt_intervalp.clone();
        async move {
            if rxmt_intervalp.send(RxmtIntervalMsg { key }).is_err() {
                Error::RxLoopGone.log();
            }
        }
    })
}

// Bulk query snapshot refresh.
pub(crate) fn query_refresh_interval(
    ctx: &InstanceCtx,
    query: &Arc<NeighborQuery>,
) -> IntervalTask {
    let query = query.clone();

    IntervalTask::new(ctx.config.query_refresh_interval(), true, move || {
        let query = query.clone();
        async move {
            let count = query.refresh();
            Debug::QueryRefresh(count).log();
        }
    })
}

// Receive dispatch loop.
//
// Messages are handled one at a time. Every update a handler produces is
// applied by the conf actor before the next message is looked at, so each
// handler sees the effects of the previous one.
pub(crate) async fn rx_dispatch_loop(
    ctx: InstanceCtx,
    mut rx: RxChannelsRx,
    mut rxmt_intervalc: UnboundedReceiver<RxmtIntervalMsg>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let msg = tokio::select! {
            biased;
            _ = stop.changed() => break,
            Some(msg) = rx.iface_down.recv() => RxEventMsg::InterfaceDown(msg),
            Some(msg) = rx.nbr_down.recv() => RxEventMsg::NeighborDown(msg),
            Some(msg) = rx.hello.recv() => RxEventMsg::Hello(msg),
            Some(msg) = rx.start.recv() => RxEventMsg::NeighborStart(msg),
            Some(msg) = rx.dbdesc.recv() => RxEventMsg::DbDesc(msg),
            Some(msg) = rx.lsreq.recv() => RxEventMsg::LsRequest(msg),
            Some(msg) = rx.lsupd.recv() => RxEventMsg::LsUpdate(msg),
            Some(msg) = rx.lsack.recv() => RxEventMsg::LsAck(msg),
            Some(msg) = rxmt_intervalc.recv() => RxEventMsg::RxmtInterval(msg),
            else => break,
        };

        if let Err(error) = dispatch_rx_event(&ctx, msg).await {
            error.log();
        }
    }
}

// Transmit dispatch loop.
pub(crate) async fn tx_dispatch_loop(
    ctx: InstanceCtx,
    mut packetc: UnboundedReceiver<TxPacketMsg>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            msg = packetc.recv() => match msg {
                Some(msg) => network::send_packet(&ctx, msg),
                None => break,
            },
        }
    }
}

// ===== helper functions =====

async fn dispatch_rx_event(
    ctx: &InstanceCtx,
    msg: RxEventMsg,
) -> Result<(), Error> {
    let table = ctx.table.load_full();
    let conf_msgs = events::process_rx_event(ctx, &table, msg)?;
    send_conf_msgs(&ctx.tx.conf, conf_msgs).await
}

async fn send_conf_msgs(
    confp: &UnboundedSender<ConfMsg>,
    conf_msgs: Vec<ConfMsg>,
) -> Result<(), Error> {
    for msg in conf_msgs {
        let (msg, ackc) = msg.with_ack();
        confp.send(msg).map_err(|_| Error::ActorGone)?;
        ackc.await.map_err(|_| Error::ActorGone)?;
    }
    Ok(())
}
