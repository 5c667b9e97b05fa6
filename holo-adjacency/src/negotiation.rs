//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use crate::debug::Debug;
use crate::error::Error;
use crate::exchange;
use crate::instance::InstanceCtx;
use crate::interface::InterfaceInfo;
use crate::lists::{self, NeighborLists};
use crate::neighbor::{NeighborRecord, nsm};
use crate::output;
use crate::packet::{DbDesc, DbDescFlags};

// Outcome of comparing a received DBD against the ExStart rules.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Negotiation {
    // The neighbor is master.
    Slave,
    // The neighbor acknowledged our initial DBD as slave.
    Master,
    // The neighbor has the higher router ID but didn't claim mastership.
    Defer,
    // Keep sending our own initial DBD.
    Retry,
}

// ===== global functions =====

// Decides the master/slave relationship from a DBD received in ExStart
// (Section 10.6 of RFC 2328).
pub(crate) fn negotiate(
    ctx: &InstanceCtx,
    nbr: &NeighborRecord,
    dbdesc: &DbDesc,
) -> Negotiation {
    let peer_is_higher = nbr.router_id > ctx.config.router_id;
    let dd_flags = dbdesc.dd_flags;

    // Initial DBD from a neighbor with a higher router ID, or one already
    // past the initial exchange still claiming mastership.
    if peer_is_higher
        && ((dd_flags
            .contains(DbDescFlags::I | DbDescFlags::M | DbDescFlags::MS)
            && dbdesc.lsa_hdrs.is_empty())
            || dd_flags.contains(DbDescFlags::MS))
    {
        return Negotiation::Slave;
    }

    // Our own initial DBD, acknowledged by a neighbor with a lower router ID.
    if !peer_is_higher
        && !dd_flags.intersects(DbDescFlags::I | DbDescFlags::MS)
        && dbdesc.dd_seq_no == nbr.dd_seq_no
    {
        return Negotiation::Master;
    }

    if peer_is_higher {
        Negotiation::Defer
    } else {
        Negotiation::Retry
    }
}

// Processes a DBD received in the Init or ExStart states.
pub(crate) fn process_exstart(
    ctx: &InstanceCtx,
    nbr: &mut NeighborRecord,
    lists: &NeighborLists,
    iface: &InterfaceInfo,
    dbdesc: DbDesc,
) -> Result<(), Error> {
    let adj_eligible =
        iface.need_adjacency(ctx.config.router_id, nbr.router_id);
    nbr.adj_eligible = adj_eligible;

    if nbr.state == nsm::State::Init {
        nbr.event(nsm::Event::TwoWayRcvd);
        if !adj_eligible {
            nbr.state = nsm::State::TwoWay;
            return Ok(());
        }
        nbr.enter_exstart(false);
    } else if !adj_eligible {
        nbr.event(nsm::Event::AdjOk);
        nbr.reset_adjacency(lists);
        nbr.state = nsm::State::TwoWay;
        return Ok(());
    }

    match negotiate(ctx, nbr, &dbdesc) {
        Negotiation::Slave => {
            nbr.is_master = false;
            nbr.dd_seq_no = dbdesc.dd_seq_no;
        }
        Negotiation::Master => {
            nbr.is_master = true;
        }
        Negotiation::Defer => {
            // Stop claiming mastership and wait for the neighbor's initial
            // DBD.
            nbr.is_master = false;
            nbr.dd_seq_no = dbdesc.dd_seq_no;
            Debug::NegotiationDeferred(nbr.router_id, nbr.dd_seq_no).log();
            output::send_dbdesc(ctx, nbr, lists, iface);
            return Ok(());
        }
        Negotiation::Retry => {
            if !output::rxmt_dbdesc(ctx, nbr) {
                output::send_dbdesc(ctx, nbr, lists, iface);
            }
            return Ok(());
        }
    }

    negotiation_done(ctx, nbr, lists, iface, dbdesc);
    Ok(())
}

// ===== helper functions =====

fn negotiation_done(
    ctx: &InstanceCtx,
    nbr: &mut NeighborRecord,
    lists: &NeighborLists,
    iface: &InterfaceInfo,
    dbdesc: DbDesc,
) {
    Debug::NegotiationDone(nbr.router_id, nbr.is_master, nbr.dd_seq_no).log();
    nbr.event(nsm::Event::NegotiationDone);
    nbr.options = Some(dbdesc.options);
    nbr.state = nsm::State::Exchange;

    // A negotiation starts from an empty request list.
    lists.clear();
    lists::build_summary_list(
        lists,
        nbr,
        iface,
        &ctx.config,
        ctx.lsdb.as_ref(),
    );

    exchange::process_accepted(ctx, nbr, lists, iface, &dbdesc);
}

// ===== unit tests =====
