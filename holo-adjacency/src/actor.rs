//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;

use chrono::Utc;
use holo_utils::UnboundedReceiver;
use tokio::sync::watch;

use crate::collections::{NeighborIndex, Neighbors};
use crate::debug::Debug;
use crate::error::Error;
use crate::instance::InstanceCtx;
use crate::neighbor::{NeighborRecord, nsm};
use crate::notification::NetworkLsaReason;
use crate::output;
use crate::tasks;
use crate::tasks::messages::conf::{
    ConfMsg, NeighborAddMsg, NeighborDeleteMsg, NeighborUpdateMsg,
};

// Owner of the neighbor table.
//
// Every table mutation goes through this actor, one message at a time. After
// each message the table is published again for lock-free readers.
pub(crate) struct ConfActor {
    ctx: InstanceCtx,
    neighbors: Neighbors,
}

// ===== impl ConfActor =====

impl ConfActor {
    pub(crate) fn new(ctx: InstanceCtx) -> ConfActor {
        ConfActor {
            ctx,
            neighbors: Default::default(),
        }
    }

    pub(crate) async fn run(
        mut self,
        mut confc: UnboundedReceiver<ConfMsg>,
        mut stop: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = stop.changed() => break,
                msg = confc.recv() => match msg {
                    Some(msg) => self.process_msg(msg),
                    None => break,
                },
            }
        }
    }

    pub(crate) fn process_msg(&mut self, mut msg: ConfMsg) {
        let ack = msg.take_ack();
        let result = match msg {
            ConfMsg::Add(msg) => self.process_nbr_add(msg),
            ConfMsg::Update(msg) => self.process_nbr_update(msg),
            ConfMsg::Delete(msg) => self.process_nbr_delete(msg),
        };
        if let Err(error) = result {
            error.log();
        }

        // Publish the new table before waking up the sender.
        self.ctx.table.store(Arc::new(self.neighbors.snapshot()));
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }

    fn process_nbr_add(&mut self, msg: NeighborAddMsg) -> Result<(), Error> {
        if self.neighbors.contains(&msg.key) {
            return Err(Error::NeighborExists(msg.key));
        }

        let mut record = NeighborRecord::new(
            msg.key,
            msg.router_id,
            msg.priority,
            msg.dead_interval,
            self.ctx.lists.allocate(),
        );
        record.adj_eligible = msg.adj_eligible;
        record.event(msg.event);
        match msg.state {
            nsm::State::ExStart => record.enter_exstart(true),
            state => record.state = state,
        }

        let (nbr_idx, nbr) = self.neighbors.insert(record);
        nbr.tasks.inactivity_timer =
            Some(tasks::nsm_inactivity_timer(&self.ctx, &nbr.record));

        self.fsm_state_change(nbr_idx, nsm::State::Down);
        Ok(())
    }

    fn process_nbr_update(
        &mut self,
        msg: NeighborUpdateMsg,
    ) -> Result<(), Error> {
        let (nbr_idx, nbr) = self.neighbors.get_mut_by_key(&msg.key)?;
        let old_state = nbr.record.state;
        let old_dead_interval = nbr.record.dead_interval;
        nbr.record.apply(&msg.patch);

        // Inactivity timer.
        if nbr.record.dead_interval != old_dead_interval {
            nbr.tasks.inactivity_timer =
                Some(tasks::nsm_inactivity_timer(&self.ctx, &nbr.record));
        } else if msg.patch.liveness
            && let Some(inactivity_timer) = &mut nbr.tasks.inactivity_timer
        {
            inactivity_timer.reset(None);
        }

        self.fsm_state_change(nbr_idx, old_state);
        Ok(())
    }

    fn process_nbr_delete(
        &mut self,
        msg: NeighborDeleteMsg,
    ) -> Result<(), Error> {
        let (nbr_idx, nbr) = self.neighbors.get_mut_by_key(&msg.key)?;

        // Ignore deletes aimed at a previous incarnation of the neighbor.
        if let Some(lists) = msg.lists
            && lists != nbr.record.lists
        {
            return Ok(());
        }

        nbr.tasks.inactivity_timer = None;
        let old_state = nbr.record.state;
        let lists = nbr.record.lists;
        nbr.record.event(msg.event);
        if let Some(nbr_lists) = self.ctx.lists.get(lists) {
            nbr.record.reset_adjacency(&nbr_lists);
        }
        nbr.record.state = nsm::State::Down;
        self.fsm_state_change(nbr_idx, old_state);

        self.ctx.lists.release(lists);
        self.neighbors.delete(nbr_idx);
        Ok(())
    }

    // Runs the actions tied to a state transition that has just been
    // applied to the table.
    fn fsm_state_change(
        &mut self,
        nbr_idx: NeighborIndex,
        old_state: nsm::State,
    ) {
        let ctx = &self.ctx;
        let nbr = &mut self.neighbors[nbr_idx];
        let new_state = nbr.record.state;
        if new_state == old_state {
            return;
        }

        Debug::NsmTransition(nbr.record.router_id, &old_state, &new_state)
            .log();
        nbr.record.event_count += 1;
        nbr.record.discontinuity_time = Utc::now();
        ctx.tx.notif.state_change(&nbr.record, old_state, new_state);

        // Packet retransmission interval.
        if new_state < nsm::State::ExStart {
            nbr.tasks.rxmt_interval = None;
        } else if old_state < nsm::State::ExStart {
            nbr.tasks.rxmt_interval =
                Some(tasks::packet_rxmt_interval(ctx, &nbr.record));
        }

        let Some(iface) = ctx.interfaces.lookup(nbr.record.key.ifindex) else {
            Error::InterfaceNotFound(nbr.record.key.ifindex).log();
            return;
        };

        // Send the initial DBD of a new negotiation.
        if new_state == nsm::State::ExStart
            && nbr.record.last_sent_dbdesc.is_none()
            && let Some(lists) = ctx.lists.get(nbr.record.lists)
        {
            output::send_dbdesc(ctx, &mut nbr.record, &lists, &iface);
        }

        // Ask for a new network-LSA when acting as DR and the set of fully
        // adjacent neighbors changes.
        if iface.is_dr(ctx.config.router_id) {
            let reason = if new_state == nsm::State::Full {
                Some(NetworkLsaReason::AdjacencyFull)
            } else if old_state == nsm::State::Full {
                Some(NetworkLsaReason::AdjacencyLost)
            } else {
                None
            };
            if let Some(reason) = reason {
                ctx.tx.notif.network_lsa(iface.ifindex, reason);
            }
        }
    }
}

// ===== unit tests =====
