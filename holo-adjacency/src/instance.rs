//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;

use arc_swap::ArcSwap;
use holo_utils::task::{IntervalTask, Task};
use holo_utils::{UnboundedReceiver, UnboundedSender};
use tokio::sync::{mpsc, watch};
use tracing::{Instrument, debug_span};

use crate::actor::ConfActor;
use crate::collections::NeighborKey;
use crate::config::InstanceCfg;
use crate::debug::Debug;
use crate::interface::InterfaceTable;
use crate::lists::{ListStore, NeighborLists};
use crate::lsdb::Lsdb;
use crate::neighbor::{NeighborRecord, NeighborTable};
use crate::network::PacketTransport;
use crate::notification::NotificationTx;
use crate::query::NeighborQuery;
use crate::tasks;
use crate::tasks::messages::conf::ConfMsg;
use crate::tasks::messages::input::{
    DbDescMsg, HelloMsg, InterfaceDownMsg, LsAckMsg, LsRequestMsg,
    LsUpdateMsg, NeighborDownMsg, NeighborStartMsg, RxmtIntervalMsg,
};
use crate::tasks::messages::output::TxPacketMsg;

// Adjacency engine instance.
pub struct Instance;

// Shared context handed to every task.
#[derive(Clone)]
pub struct InstanceCtx {
    pub config: Arc<InstanceCfg>,
    pub interfaces: Arc<dyn InterfaceTable>,
    pub lsdb: Arc<dyn Lsdb>,
    pub transport: Arc<dyn PacketTransport>,
    // Neighbor table as last published by the conf actor.
    pub table: Arc<ArcSwap<NeighborTable>>,
    pub lists: Arc<ListStore>,
    pub tx: InstanceChannelsTx,
}

#[derive(Clone, Debug)]
pub struct InstanceChannelsTx {
    // Neighbor table mutations.
    pub conf: UnboundedSender<ConfMsg>,
    // Outbound packets.
    pub packet: UnboundedSender<TxPacketMsg>,
    // Packet retransmission interval.
    pub rxmt_interval: UnboundedSender<RxmtIntervalMsg>,
    pub notif: NotificationTx,
}

#[derive(Clone, Debug)]
pub struct RxChannelsTx {
    // Hello-derived neighbor events.
    pub hello: UnboundedSender<HelloMsg>,
    // NBMA neighbor start.
    pub start: UnboundedSender<NeighborStartMsg>,
    // Received packets.
    pub dbdesc: UnboundedSender<DbDescMsg>,
    pub lsreq: UnboundedSender<LsRequestMsg>,
    pub lsupd: UnboundedSender<LsUpdateMsg>,
    pub lsack: UnboundedSender<LsAckMsg>,
    // Interface and lower-layer failures.
    pub iface_down: UnboundedSender<InterfaceDownMsg>,
    pub nbr_down: UnboundedSender<NeighborDownMsg>,
}

#[derive(Debug)]
pub struct RxChannelsRx {
    pub hello: UnboundedReceiver<HelloMsg>,
    pub start: UnboundedReceiver<NeighborStartMsg>,
    pub dbdesc: UnboundedReceiver<DbDescMsg>,
    pub lsreq: UnboundedReceiver<LsRequestMsg>,
    pub lsupd: UnboundedReceiver<LsUpdateMsg>,
    pub lsack: UnboundedReceiver<LsAckMsg>,
    pub iface_down: UnboundedReceiver<InterfaceDownMsg>,
    pub nbr_down: UnboundedReceiver<NeighborDownMsg>,
}

// Handle to a running instance. Dropping it stops every task.
pub struct InstanceHandle {
    pub rx: RxChannelsTx,
    ctx: InstanceCtx,
    query: Arc<NeighborQuery>,
    stop: watch::Sender<bool>,
    _tasks: Vec<Task<()>>,
    _query_refresh: IntervalTask,
}

// ===== impl Instance =====

impl Instance {
    // Starts the conf actor, both dispatch loops and the query refresh
    // interval.
    //
    // Must be called from within a Tokio runtime.
    pub fn spawn(
        config: InstanceCfg,
        interfaces: Arc<dyn InterfaceTable>,
        lsdb: Arc<dyn Lsdb>,
        transport: Arc<dyn PacketTransport>,
        notif: NotificationTx,
    ) -> InstanceHandle {
        let span =
            debug_span!("adjacency-instance", router_id = %config.router_id);
        let _span_guard = span.enter();
        Debug::InstanceStart.log();

        let (confp, confc) = mpsc::unbounded_channel();
        let (packetp, packetc) = mpsc::unbounded_channel();
        let (rxmt_intervalp, rxmt_intervalc) = mpsc::unbounded_channel();
        let (rx_tx, rx_rx) = rx_channels();
        let (stop, stopc) = watch::channel(false);

        let ctx = InstanceCtx {
            config: Arc::new(config),
            interfaces,
            lsdb,
            transport,
            table: Default::default(),
            lists: Default::default(),
            tx: InstanceChannelsTx {
                conf: confp,
                packet: packetp,
                rxmt_interval: rxmt_intervalp,
                notif,
            },
        };
        let query = Arc::new(NeighborQuery::new(
            ctx.table.clone(),
            ctx.lists.clone(),
        ));

        let actor = ConfActor::new(ctx.clone());
        let tasks = vec![
            Task::spawn(actor.run(confc, stopc.clone()).in_current_span()),
            Task::spawn(
                tasks::rx_dispatch_loop(
                    ctx.clone(),
                    rx_rx,
                    rxmt_intervalc,
                    stopc.clone(),
                )
                .in_current_span(),
            ),
            Task::spawn(
                tasks::tx_dispatch_loop(ctx.clone(), packetc, stopc)
                    .in_current_span(),
            ),
        ];
        let query_refresh = tasks::query_refresh_interval(&ctx, &query);

        InstanceHandle {
            rx: rx_tx,
            ctx,
            query,
            stop,
            _tasks: tasks,
            _query_refresh: query_refresh,
        }
    }
}

// ===== impl InstanceHandle =====

impl InstanceHandle {
    // Signals every loop to exit.
    pub fn stop(&self) {
        Debug::InstanceStop.log();
        let _ = self.stop.send(true);
    }

    // Returns the current record of a neighbor.
    pub fn neighbor(&self, key: &NeighborKey) -> Option<NeighborRecord> {
        self.ctx.table.load().get(key).cloned()
    }

    // Returns the current records of all neighbors.
    pub fn neighbors(&self) -> Arc<NeighborTable> {
        self.ctx.table.load_full()
    }

    // Returns the LSA lists of a neighbor.
    pub fn neighbor_lists(
        &self,
        key: &NeighborKey,
    ) -> Option<Arc<NeighborLists>> {
        let table = self.ctx.table.load();
        let nbr = table.get(key)?;
        self.ctx.lists.get(nbr.lists)
    }

    pub fn query(&self) -> &NeighborQuery {
        &self.query
    }
}

// ===== helper functions =====

fn rx_channels() -> (RxChannelsTx, RxChannelsRx) {
    let (hellop, helloc) = mpsc::unbounded_channel();
    let (startp, startc) = mpsc::unbounded_channel();
    let (dbdescp, dbdescc) = mpsc::unbounded_channel();
    let (lsreqp, lsreqc) = mpsc::unbounded_channel();
    let (lsupdp, lsupdc) = mpsc::unbounded_channel();
    let (lsackp, lsackc) = mpsc::unbounded_channel();
    let (iface_downp, iface_downc) = mpsc::unbounded_channel();
    let (nbr_downp, nbr_downc) = mpsc::unbounded_channel();

    let tx = RxChannelsTx {
        hello: hellop,
        start: startp,
        dbdesc: dbdescp,
        lsreq: lsreqp,
        lsupd: lsupdp,
        lsack: lsackp,
        iface_down: iface_downp,
        nbr_down: nbr_downp,
    };
    let rx = RxChannelsRx {
        hello: helloc,
        start: startc,
        dbdesc: dbdescc,
        lsreq: lsreqc,
        lsupd: lsupdc,
        lsack: lsackc,
        iface_down: iface_downc,
        nbr_down: nbr_downc,
    };

    (tx, rx)
}

// ===== testing helpers =====
