//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use crate::error::Error;
use crate::instance::InstanceCtx;
use crate::interface::InterfaceInfo;
use crate::lists::{self, NeighborLists};
use crate::neighbor::{NeighborRecord, nsm};
use crate::packet::lsa::LsaHdr;
use crate::packet::{DbDesc, LsRequest, LsUpdate, Packet};
use crate::tasks::messages::output::TxPacketMsg;

// ===== global functions =====

// Sends the next DBD packet to the neighbor and records it as the last sent
// one.
//
// In ExStart the packet is empty. Otherwise it carries as many headers from
// the Database summary list as fit, and the M-bit is cleared once the list
// runs dry.
pub(crate) fn send_dbdesc(
    ctx: &InstanceCtx,
    nbr: &mut NeighborRecord,
    lists: &NeighborLists,
    iface: &InterfaceInfo,
) {
    let mut lsa_hdrs = vec![];
    if nbr.state != nsm::State::ExStart {
        lsa_hdrs = lists.summary_pop(DbDesc::max_lsa_hdrs(iface.mtu));
        if lists.summary_len() == 0 {
            nbr.dd_more = false;
        }
    }

    let dbdesc = DbDesc::new(
        iface.mtu,
        iface.options,
        nbr.dd_flags(),
        nbr.dd_seq_no,
        lsa_hdrs,
    );
    nbr.last_sent_dbdesc = Some(dbdesc.clone());
    send(ctx, nbr, Packet::DbDesc(dbdesc));
}

// Resends the last DBD packet verbatim.
//
// Returns false if there's nothing to resend.
pub(crate) fn rxmt_dbdesc(ctx: &InstanceCtx, nbr: &NeighborRecord) -> bool {
    match &nbr.last_sent_dbdesc {
        Some(dbdesc) => {
            send(ctx, nbr, Packet::DbDesc(dbdesc.clone()));
            true
        }
        None => false,
    }
}

// Sends the next batch of LS Requests.
pub(crate) fn send_lsreq(
    ctx: &InstanceCtx,
    nbr: &NeighborRecord,
    lists: &NeighborLists,
    iface: &InterfaceInfo,
) {
    let entries =
        lists::next_request_batch(lists, LsRequest::max_entries(iface.mtu));
    if !entries.is_empty() {
        send(ctx, nbr, Packet::LsRequest(LsRequest::new(entries)));
    }
}

// Resends the LS Requests that are still unanswered.
pub(crate) fn rxmt_lsreq(
    ctx: &InstanceCtx,
    nbr: &NeighborRecord,
    lists: &NeighborLists,
) {
    let entries = lists::pending_requests(lists);
    if !entries.is_empty() {
        send(ctx, nbr, Packet::LsRequest(LsRequest::new(entries)));
    }
}

// Sends an LS Update and keeps its LSAs on the retransmission list until
// they're acknowledged.
pub(crate) fn send_lsupd(
    ctx: &InstanceCtx,
    nbr: &NeighborRecord,
    lists: &NeighborLists,
    lsa_hdrs: Vec<LsaHdr>,
) {
    lists::rxmt_add(lists, &lsa_hdrs);
    rxmt_lsupd(ctx, nbr, lsa_hdrs);
}

pub(crate) fn rxmt_lsupd(
    ctx: &InstanceCtx,
    nbr: &NeighborRecord,
    lsa_hdrs: Vec<LsaHdr>,
) {
    if !lsa_hdrs.is_empty() {
        send(ctx, nbr, Packet::LsUpdate(LsUpdate::new(lsa_hdrs)));
    }
}

// ===== helper functions =====

fn send(ctx: &InstanceCtx, nbr: &NeighborRecord, packet: Packet) {
    let msg = TxPacketMsg {
        ifindex: nbr.key.ifindex,
        dst: nbr.key.src,
        packet,
    };
    if ctx.tx.packet.send(msg).is_err() {
        Error::TxLoopGone.log();
    }
}

// ===== unit tests =====
