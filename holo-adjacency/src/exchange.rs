//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use crate::debug::{Debug, SeqNoMismatchReason};
use crate::error::Error;
use crate::instance::InstanceCtx;
use crate::interface::InterfaceInfo;
use crate::lists::{self, NeighborLists};
use crate::negotiation;
use crate::neighbor::{LastDbDesc, NeighborRecord, nsm};
use crate::notification::{AdjacencyEventKind, NetworkLsaReason};
use crate::output;
use crate::packet::lsa::LsaTypeCode;
use crate::packet::{DbDesc, DbDescFlags};

// Verdict on a DBD received after the master/slave negotiation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Validation {
    Accept,
    Duplicate,
    Discard(SeqNoMismatchReason),
}

// ===== global functions =====

// Sequence number the next DBD from the neighbor must carry.
pub(crate) fn expected_seq_no(nbr: &NeighborRecord) -> u32 {
    if nbr.is_master {
        nbr.dd_seq_no
    } else {
        nbr.dd_seq_no.wrapping_add(1)
    }
}

// Checks whether the DBD repeats the last one accepted from the neighbor.
pub(crate) fn duplicate_check(nbr: &NeighborRecord, dbdesc: &DbDesc) -> bool {
    dbdesc.dd_seq_no == expected_seq_no(nbr).wrapping_sub(1)
        && nbr
            .last_rcvd_dbdesc
            .as_ref()
            .is_some_and(|last_rcvd| last_rcvd.matches(dbdesc))
}

// Looks for inconsistencies that require restarting the negotiation.
pub(crate) fn discard_check(
    nbr: &NeighborRecord,
    dbdesc: &DbDesc,
) -> Option<SeqNoMismatchReason> {
    // The MS-bit must describe the neighbor's role, never ours.
    if dbdesc.dd_flags.contains(DbDescFlags::MS) == nbr.is_master
        || dbdesc.dd_flags.contains(DbDescFlags::I)
    {
        return Some(SeqNoMismatchReason::InconsistentFlags);
    }

    if let Some(last_rcvd) = &nbr.last_rcvd_dbdesc
        && last_rcvd.options != dbdesc.options
    {
        return Some(SeqNoMismatchReason::InconsistentOptions);
    }

    if dbdesc.dd_seq_no != expected_seq_no(nbr) {
        return Some(SeqNoMismatchReason::InconsistentSeqNo);
    }

    None
}

pub(crate) fn validate(nbr: &NeighborRecord, dbdesc: &DbDesc) -> Validation {
    if duplicate_check(nbr, dbdesc) {
        return Validation::Duplicate;
    }
    match discard_check(nbr, dbdesc) {
        Some(reason) => Validation::Discard(reason),
        None => Validation::Accept,
    }
}

// Processes a received DBD according to the neighbor's state.
pub(crate) fn process_packet_dbdesc(
    ctx: &InstanceCtx,
    nbr: &mut NeighborRecord,
    lists: &NeighborLists,
    iface: &InterfaceInfo,
    dbdesc: DbDesc,
) -> Result<(), Error> {
    match nbr.state {
        nsm::State::Down | nsm::State::TwoWay => {
            Debug::PacketRxIgnore(nbr.router_id, &nbr.state).log();
            Ok(())
        }
        nsm::State::Attempt => {
            Err(Error::DbDescReject(nbr.router_id, nbr.state))
        }
        nsm::State::Init | nsm::State::ExStart => {
            negotiation::process_exstart(ctx, nbr, lists, iface, dbdesc)
        }
        nsm::State::Exchange => {
            match validate(nbr, &dbdesc) {
                Validation::Duplicate => {
                    Debug::DbDescDuplicate(nbr.router_id, dbdesc.dd_seq_no)
                        .log();
                    // The master ignores duplicates; the slave repeats its
                    // last reply.
                    if !nbr.is_master {
                        output::rxmt_dbdesc(ctx, nbr);
                    }
                }
                Validation::Discard(reason) => {
                    let event = nsm::Event::SeqNoMismatch(reason);
                    restart_adjacency(ctx, nbr, lists, event);
                }
                Validation::Accept => {
                    process_accepted(ctx, nbr, lists, iface, &dbdesc);
                }
            }
            Ok(())
        }
        nsm::State::Loading | nsm::State::Full => {
            if duplicate_check(nbr, &dbdesc) {
                Debug::DbDescDuplicate(nbr.router_id, dbdesc.dd_seq_no).log();
                if !nbr.is_master {
                    output::rxmt_dbdesc(ctx, nbr);
                }
                loading_done_check(ctx, nbr, lists, iface);
            } else {
                let reason = discard_check(nbr, &dbdesc)
                    .unwrap_or(SeqNoMismatchReason::UnexpectedDbDesc);
                let event = nsm::Event::SeqNoMismatch(reason);
                restart_adjacency(ctx, nbr, lists, event);
            }
            Ok(())
        }
    }
}

// Processes the contents of an accepted DBD and answers it.
pub(crate) fn process_accepted(
    ctx: &InstanceCtx,
    nbr: &mut NeighborRecord,
    lists: &NeighborLists,
    iface: &InterfaceInfo,
    dbdesc: &DbDesc,
) {
    // Nothing is touched unless every header is acceptable.
    let invalid_lsa_type = dbdesc.lsa_hdrs.iter().any(|lsa_hdr| {
        match lsa_hdr.lsa_type.type_code() {
            Some(LsaTypeCode::AsExternal) => !iface.external_routing(),
            Some(_) => false,
            None => true,
        }
    });
    if invalid_lsa_type {
        let reason = SeqNoMismatchReason::InvalidLsaType;
        restart_adjacency(ctx, nbr, lists, nsm::Event::SeqNoMismatch(reason));
        return;
    }

    lists::prune_summary_list(lists, &dbdesc.lsa_hdrs);
    lists::build_request_list(
        lists,
        nbr,
        iface,
        ctx.lsdb.as_ref(),
        &dbdesc.lsa_hdrs,
    );

    // Start requesting LSAs right away.
    if lists.has_queued_requests() && !lists.has_pending_requests() {
        output::send_lsreq(ctx, nbr, lists, iface);
    }

    nbr.last_rcvd_dbdesc = Some(LastDbDesc::from(dbdesc));
    let peer_more = dbdesc.dd_flags.contains(DbDescFlags::M);

    if nbr.is_master {
        nbr.dd_seq_no = nbr.dd_seq_no.wrapping_add(1);

        if !nbr.dd_more && !peer_more {
            exchange_done(ctx, nbr, lists, iface);
        } else if nbr.last_event != Some(nsm::Event::ExchangeDone)
            || peer_more
        {
            output::send_dbdesc(ctx, nbr, lists, iface);
        }
    } else {
        nbr.dd_seq_no = dbdesc.dd_seq_no;
        output::send_dbdesc(ctx, nbr, lists, iface);

        if !nbr.dd_more && !peer_more {
            exchange_done(ctx, nbr, lists, iface);
        }
    }
}

// Restarts the adjacency from ExStart with a fresh sequence number.
//
// The conf actor sends the new initial DBD once the change is applied.
pub(crate) fn restart_adjacency(
    ctx: &InstanceCtx,
    nbr: &mut NeighborRecord,
    lists: &NeighborLists,
    event: nsm::Event,
) {
    nbr.event(event);
    nbr.reset_adjacency(lists);
    nbr.enter_exstart(false);

    match event {
        nsm::Event::SeqNoMismatch(reason) => {
            let kind = AdjacencyEventKind::SeqNoMismatch(reason);
            ctx.tx.notif.adjacency_event(nbr, kind);
        }
        nsm::Event::BadLsReq => {
            ctx.tx.notif.adjacency_event(nbr, AdjacencyEventKind::BadLsReq);
        }
        _ => (),
    }
}

// Moves to Loading, or straight to Full if nothing remains to be requested.
pub(crate) fn exchange_done(
    ctx: &InstanceCtx,
    nbr: &mut NeighborRecord,
    lists: &NeighborLists,
    iface: &InterfaceInfo,
) {
    nbr.event(nsm::Event::ExchangeDone);
    if lists::check_full_reached(lists) {
        nbr.state = nsm::State::Full;
    } else {
        nbr.state = nsm::State::Loading;
        if !lists.has_pending_requests() {
            output::send_lsreq(ctx, nbr, lists, iface);
        }
    }

    if !nbr.is_master {
        ctx.tx
            .notif
            .network_lsa(iface.ifindex, NetworkLsaReason::ExchangeDone);
    }
}

// Declares the neighbor Full once its request list is empty, or asks for
// the next batch of LSAs.
pub(crate) fn loading_done_check(
    ctx: &InstanceCtx,
    nbr: &mut NeighborRecord,
    lists: &NeighborLists,
    iface: &InterfaceInfo,
) {
    if nbr.state != nsm::State::Loading {
        return;
    }

    if lists::check_full_reached(lists) {
        nbr.event(nsm::Event::LoadingDone);
        nbr.state = nsm::State::Full;
    } else if !lists.has_pending_requests() {
        output::send_lsreq(ctx, nbr, lists, iface);
    }
}

// ===== unit tests =====
