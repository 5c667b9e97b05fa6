//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;

use crate::collections::NeighborKey;
use crate::debug::Debug;
use crate::error::Error;
use crate::exchange;
use crate::instance::InstanceCtx;
use crate::interface::InterfaceInfo;
use crate::lists::{self, NeighborLists};
use crate::neighbor::{NeighborPatch, NeighborRecord, NeighborTable, nsm};
use crate::output;
use crate::packet::{DbDesc, LsRequest, PacketType};
use crate::tasks::messages::conf::{
    ConfMsg, NeighborAddMsg, NeighborDeleteMsg, NeighborUpdateMsg,
};
use crate::tasks::messages::input::{
    DbDescMsg, HelloMsg, InterfaceDownMsg, LsAckMsg, LsRequestMsg,
    LsUpdateMsg, NeighborDownMsg, NeighborStartMsg, RxEventMsg,
    RxmtIntervalMsg,
};

// ===== global functions =====

// Processes an event from the receive dispatch loop.
//
// Handlers work on a copy of the neighbor record taken from `table` and
// return the table changes for the conf actor to apply.
pub(crate) fn process_rx_event(
    ctx: &InstanceCtx,
    table: &NeighborTable,
    msg: RxEventMsg,
) -> Result<Vec<ConfMsg>, Error> {
    match msg {
        RxEventMsg::Hello(msg) => process_hello(ctx, table, msg),
        RxEventMsg::NeighborStart(msg) => process_nbr_start(ctx, table, msg),
        RxEventMsg::DbDesc(msg) => process_dbdesc(ctx, table, msg),
        RxEventMsg::LsRequest(msg) => process_lsreq(ctx, table, msg),
        RxEventMsg::LsUpdate(msg) => process_lsupd(ctx, table, msg),
        RxEventMsg::LsAck(msg) => process_lsack(ctx, table, msg),
        RxEventMsg::InterfaceDown(msg) => process_iface_down(ctx, table, msg),
        RxEventMsg::NeighborDown(msg) => process_nbr_down(ctx, table, msg),
        RxEventMsg::RxmtInterval(msg) => {
            process_rxmt_interval(ctx, table, msg)
        }
    }
}

// ===== Hello events =====

fn process_hello(
    ctx: &InstanceCtx,
    table: &NeighborTable,
    msg: HelloMsg,
) -> Result<Vec<ConfMsg>, Error> {
    let Some(old) = table.get(&msg.key) else {
        return process_hello_new_nbr(ctx, msg);
    };

    let mut nbr = old.clone();
    nbr.priority = msg.priority;
    if let Some(dead_interval) = msg.dead_interval {
        nbr.dead_interval = dead_interval;
    }
    if nbr.state < nsm::State::Init {
        nbr.event(nsm::Event::HelloRcvd);
        nbr.state = nsm::State::Init;
    }

    // Only liveness is recorded if the interface is gone.
    match ctx.interfaces.lookup(msg.key.ifindex) {
        Some(iface) => {
            let lists = nbr_lists(ctx, &nbr)?;
            let two_way = msg.two_way;
            process_hello_adjacency(ctx, &mut nbr, &lists, &iface, two_way);
        }
        None => Error::InterfaceNotFound(msg.key.ifindex).log(),
    }

    Ok(update_msg(old, &nbr, true))
}

fn process_hello_new_nbr(
    ctx: &InstanceCtx,
    msg: HelloMsg,
) -> Result<Vec<ConfMsg>, Error> {
    let iface = ctx
        .interfaces
        .lookup(msg.key.ifindex)
        .ok_or(Error::InterfaceNotFound(msg.key.ifindex))?;
    let adj_eligible =
        iface.need_adjacency(ctx.config.router_id, msg.router_id);

    let (state, event) = match (msg.two_way, adj_eligible) {
        (false, _) => (nsm::State::Init, nsm::Event::HelloRcvd),
        (true, true) => (nsm::State::ExStart, nsm::Event::TwoWayRcvd),
        (true, false) => (nsm::State::TwoWay, nsm::Event::TwoWayRcvd),
    };

    Ok(vec![ConfMsg::Add(NeighborAddMsg {
        key: msg.key,
        router_id: msg.router_id,
        priority: msg.priority,
        dead_interval: msg.dead_interval.unwrap_or(ctx.config.dead_interval),
        state,
        event,
        adj_eligible,
        ack: None,
    })])
}

// Reacts to bidirectionality and eligibility changes (Section 10.3 of RFC
// 2328).
fn process_hello_adjacency(
    ctx: &InstanceCtx,
    nbr: &mut NeighborRecord,
    lists: &NeighborLists,
    iface: &InterfaceInfo,
    two_way: bool,
) {
    let adj_eligible =
        iface.need_adjacency(ctx.config.router_id, nbr.router_id);
    nbr.adj_eligible = adj_eligible;

    if !two_way {
        if nbr.state >= nsm::State::TwoWay {
            nbr.event(nsm::Event::OneWayRcvd);
            nbr.reset_adjacency(lists);
            nbr.state = nsm::State::Init;
        }
        return;
    }

    match nbr.state {
        nsm::State::Init => {
            nbr.event(nsm::Event::TwoWayRcvd);
            if adj_eligible {
                nbr.enter_exstart(false);
            } else {
                nbr.state = nsm::State::TwoWay;
            }
        }
        nsm::State::TwoWay if adj_eligible => {
            nbr.event(nsm::Event::AdjOk);
            nbr.enter_exstart(false);
        }
        state if state >= nsm::State::ExStart && !adj_eligible => {
            nbr.event(nsm::Event::AdjOk);
            nbr.reset_adjacency(lists);
            nbr.state = nsm::State::TwoWay;
        }
        _ => (),
    }
}

fn process_nbr_start(
    ctx: &InstanceCtx,
    table: &NeighborTable,
    msg: NeighborStartMsg,
) -> Result<Vec<ConfMsg>, Error> {
    if table.contains_key(&msg.key) {
        return Ok(vec![]);
    }

    Ok(vec![ConfMsg::Add(NeighborAddMsg {
        key: msg.key,
        router_id: msg.router_id,
        priority: msg.priority,
        dead_interval: ctx.config.dead_interval,
        state: nsm::State::Attempt,
        event: nsm::Event::Start,
        adj_eligible: false,
        ack: None,
    })])
}

// ===== received packets =====

fn process_dbdesc(
    ctx: &InstanceCtx,
    table: &NeighborTable,
    msg: DbDescMsg,
) -> Result<Vec<ConfMsg>, Error> {
    Debug::PacketRx(&msg.key, PacketType::DbDesc).log();

    let (old, lists, iface) = lookup(ctx, table, &msg.key)?;
    let dbdesc = DbDesc::decode(&msg.data)
        .map_err(|error| Error::PacketDecodeError(msg.key, error))?;

    // MTU mismatch check.
    if !ctx.config.mtu_ignore && dbdesc.mtu > iface.mtu {
        return Err(Error::MtuMismatch(old.router_id, dbdesc.mtu, iface.mtu));
    }

    let mut nbr = old.clone();
    exchange::process_packet_dbdesc(ctx, &mut nbr, &lists, &iface, dbdesc)?;

    Ok(update_msg(old, &nbr, false))
}

fn process_lsreq(
    ctx: &InstanceCtx,
    table: &NeighborTable,
    msg: LsRequestMsg,
) -> Result<Vec<ConfMsg>, Error> {
    Debug::PacketRx(&msg.key, PacketType::LsRequest).log();

    let (old, lists, iface) = lookup(ctx, table, &msg.key)?;
    let lsreq = LsRequest::decode(&msg.data)
        .map_err(|error| Error::PacketDecodeError(msg.key, error))?;
    if old.state < nsm::State::Exchange {
        Debug::PacketRxIgnore(old.router_id, &old.state).log();
        return Ok(vec![]);
    }

    let mut nbr = old.clone();
    let mut lsa_hdrs = Vec::with_capacity(lsreq.entries.len());
    for lsa_key in &lsreq.entries {
        match ctx.lsdb.get(iface.area_id, lsa_key) {
            Some(lsa_hdr) => lsa_hdrs.push(lsa_hdr),
            None => {
                exchange::restart_adjacency(
                    ctx,
                    &mut nbr,
                    &lists,
                    nsm::Event::BadLsReq,
                );
                return Ok(update_msg(old, &nbr, false));
            }
        }
    }
    output::send_lsupd(ctx, &nbr, &lists, lsa_hdrs);

    Ok(update_msg(old, &nbr, false))
}

fn process_lsupd(
    ctx: &InstanceCtx,
    table: &NeighborTable,
    msg: LsUpdateMsg,
) -> Result<Vec<ConfMsg>, Error> {
    Debug::PacketRx(&msg.key, PacketType::LsUpdate).log();

    let (old, lists, iface) = lookup(ctx, table, &msg.key)?;
    if old.state < nsm::State::Exchange {
        Debug::PacketRxIgnore(old.router_id, &old.state).log();
        return Ok(vec![]);
    }

    let mut nbr = old.clone();
    let satisfied = lists::satisfy_requests(&lists, &msg.lsa_hdrs);
    // Receiving the instance we sent counts as an acknowledgment.
    lists::rxmt_ack(&lists, &msg.lsa_hdrs);

    if satisfied > 0 && !lists.has_pending_requests() {
        match nbr.state {
            nsm::State::Exchange => {
                output::send_lsreq(ctx, &nbr, &lists, &iface);
            }
            _ => {
                exchange::loading_done_check(ctx, &mut nbr, &lists, &iface);
            }
        }
    }

    Ok(update_msg(old, &nbr, false))
}

fn process_lsack(
    ctx: &InstanceCtx,
    table: &NeighborTable,
    msg: LsAckMsg,
) -> Result<Vec<ConfMsg>, Error> {
    Debug::PacketRx(&msg.key, PacketType::LsAck).log();

    let (old, lists, _) = lookup(ctx, table, &msg.key)?;
    if old.state < nsm::State::Exchange {
        Debug::PacketRxIgnore(old.router_id, &old.state).log();
        return Ok(vec![]);
    }
    lists::rxmt_ack(&lists, &msg.lsa_hdrs);

    Ok(vec![])
}

// ===== failures =====

fn process_iface_down(
    ctx: &InstanceCtx,
    table: &NeighborTable,
    msg: InterfaceDownMsg,
) -> Result<Vec<ConfMsg>, Error> {
    let conf_msgs = table
        .values()
        .filter(|nbr| nbr.key.ifindex == msg.ifindex)
        .map(|nbr| {
            if let Some(lists) = ctx.lists.get(nbr.lists) {
                lists.clear();
            }
            delete_msg(nbr, nsm::Event::Kill)
        })
        .collect();

    Ok(conf_msgs)
}

fn process_nbr_down(
    ctx: &InstanceCtx,
    table: &NeighborTable,
    msg: NeighborDownMsg,
) -> Result<Vec<ConfMsg>, Error> {
    let nbr = table
        .get(&msg.key)
        .ok_or(Error::NeighborNotFound(msg.key))?;
    if let Some(lists) = ctx.lists.get(nbr.lists) {
        lists.clear();
    }

    Ok(vec![delete_msg(nbr, nsm::Event::LinkDown)])
}

// ===== retransmissions =====

fn process_rxmt_interval(
    ctx: &InstanceCtx,
    table: &NeighborTable,
    msg: RxmtIntervalMsg,
) -> Result<Vec<ConfMsg>, Error> {
    // The neighbor may be gone by the time the tick is processed.
    let Some(nbr) = table.get(&msg.key) else {
        return Ok(vec![]);
    };
    let lists = nbr_lists(ctx, nbr)?;

    match nbr.state {
        nsm::State::ExStart => {
            output::rxmt_dbdesc(ctx, nbr);
        }
        nsm::State::Exchange if nbr.is_master => {
            output::rxmt_dbdesc(ctx, nbr);
        }
        _ => (),
    }

    if nbr.state >= nsm::State::Exchange {
        output::rxmt_lsreq(ctx, nbr, &lists);
        let lsa_hdrs =
            lists::rxmt_expired(&lists, ctx.config.rxmt_interval());
        output::rxmt_lsupd(ctx, nbr, lsa_hdrs);
    }

    Ok(vec![])
}

// ===== helper functions =====

fn lookup<'a>(
    ctx: &InstanceCtx,
    table: &'a NeighborTable,
    key: &NeighborKey,
) -> Result<(&'a NeighborRecord, Arc<NeighborLists>, InterfaceInfo), Error> {
    let nbr = table.get(key).ok_or(Error::NeighborNotFound(*key))?;
    let lists = nbr_lists(ctx, nbr)?;
    let iface = ctx
        .interfaces
        .lookup(key.ifindex)
        .ok_or(Error::InterfaceNotFound(key.ifindex))?;
    Ok((nbr, lists, iface))
}

fn nbr_lists(
    ctx: &InstanceCtx,
    nbr: &NeighborRecord,
) -> Result<Arc<NeighborLists>, Error> {
    ctx.lists
        .get(nbr.lists)
        .ok_or(Error::ListHandleStale(nbr.key))
}

fn update_msg(
    old: &NeighborRecord,
    new: &NeighborRecord,
    liveness: bool,
) -> Vec<ConfMsg> {
    let mut patch = NeighborPatch::diff(old, new);
    patch.liveness = liveness;
    if patch.is_empty() {
        return vec![];
    }

    vec![ConfMsg::Update(NeighborUpdateMsg {
        key: new.key,
        patch,
        ack: None,
    })]
}

fn delete_msg(nbr: &NeighborRecord, event: nsm::Event) -> ConfMsg {
    ConfMsg::Delete(NeighborDeleteMsg {
        key: nbr.key,
        event,
        lists: Some(nbr.lists),
        ack: None,
    })
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use bytes::Bytes;
    use const_addrs::ip4;

    use super::*;
    use crate::instance::testing::{AREA, IFINDEX, TestEnv};
    use crate::interface::InterfaceType;
    use crate::packet::lsa::{LSA_INIT_SEQ_NO, LsaHdr, LsaTypeCode};
    use crate::packet::{DbDescFlags, Options, Packet};

    fn hello(key: NeighborKey, router_id: Ipv4Addr, two_way: bool) -> HelloMsg {
        HelloMsg {
            key,
            router_id,
            priority: 1,
            two_way,
            dead_interval: None,
        }
    }

    fn router_lsa(adv_rtr: Ipv4Addr) -> LsaHdr {
        LsaHdr::new(
            1,
            Options::E,
            LsaTypeCode::Router.into(),
            adv_rtr,
            adv_rtr,
            LSA_INIT_SEQ_NO,
            0x1234,
            36,
        )
    }

    fn update_patch(conf_msgs: &[ConfMsg]) -> &NeighborPatch {
        match &conf_msgs[0] {
            ConfMsg::Update(msg) => &msg.patch,
            msg => panic!("unexpected message: {msg:?}"),
        }
    }

    #[test]
    fn first_hello_adds_neighbor() {
        let env = TestEnv::new(ip4!("1.1.1.1"));
        let key = NeighborKey::new(IFINDEX, ip4!("10.0.1.2"));

        let table = NeighborTable::default();
        let msg = hello(key, ip4!("2.2.2.2"), true);
        let msgs = process_hello(&env.ctx, &table, msg).unwrap();
        match &msgs[..] {
            [ConfMsg::Add(msg)] => {
                assert_eq!(msg.state, nsm::State::ExStart);
                assert_eq!(msg.dead_interval, 40);
                assert!(msg.adj_eligible);
            }
            msgs => panic!("unexpected messages: {msgs:?}"),
        }

        let msg = hello(key, ip4!("2.2.2.2"), false);
        let msgs = process_hello(&env.ctx, &table, msg).unwrap();
        assert!(matches!(
            &msgs[..],
            [ConfMsg::Add(msg)] if msg.state == nsm::State::Init
        ));
    }

    #[test]
    fn broadcast_dr_other_stops_at_two_way() {
        let env = TestEnv::new(ip4!("1.1.1.1"));
        env.interfaces.update(IFINDEX, |iface| {
            iface.if_type = InterfaceType::Broadcast;
            iface.dr = Some(ip4!("3.3.3.3"));
            iface.bdr = Some(ip4!("4.4.4.4"));
        });
        let mut nbr = env.neighbor(ip4!("10.0.1.2"), ip4!("2.2.2.2"));
        nbr.state = nsm::State::Init;
        env.publish(&[&nbr]);

        let table = env.ctx.table.load_full();
        let msg = hello(nbr.key, nbr.router_id, true);
        let msgs = process_hello(&env.ctx, &table, msg).unwrap();
        let patch = update_patch(&msgs);
        assert_eq!(patch.state, Some(nsm::State::TwoWay));
        assert_eq!(patch.adj_eligible, Some(false));
        assert!(patch.liveness);

        // The neighbor becomes BDR: AdjOk moves it to ExStart.
        env.interfaces
            .update(IFINDEX, |iface| iface.bdr = Some(ip4!("2.2.2.2")));
        nbr.apply(patch);
        env.publish(&[&nbr]);
        let table = env.ctx.table.load_full();
        let msg = hello(nbr.key, nbr.router_id, true);
        let msgs = process_hello(&env.ctx, &table, msg).unwrap();
        let patch = update_patch(&msgs);
        assert_eq!(patch.state, Some(nsm::State::ExStart));
        assert_eq!(patch.last_event, Some(nsm::Event::AdjOk));
    }

    #[test]
    fn one_way_hello_resets_adjacency() {
        let env = TestEnv::new(ip4!("1.1.1.1"));
        let mut nbr = env.neighbor(ip4!("10.0.1.2"), ip4!("2.2.2.2"));
        nbr.state = nsm::State::Loading;
        let lists = env.lists(&nbr);
        lists::rxmt_add(&lists, &[router_lsa(ip4!("1.1.1.1"))]);
        env.publish(&[&nbr]);

        let table = env.ctx.table.load_full();
        let msg = hello(nbr.key, nbr.router_id, false);
        let msgs = process_hello(&env.ctx, &table, msg).unwrap();
        let patch = update_patch(&msgs);
        assert_eq!(patch.state, Some(nsm::State::Init));
        assert_eq!(patch.last_event, Some(nsm::Event::OneWayRcvd));
        assert!(lists.is_empty());
    }

    #[test]
    fn repeated_hello_only_refreshes_liveness() {
        let env = TestEnv::new(ip4!("1.1.1.1"));
        let mut nbr = env.neighbor(ip4!("10.0.1.2"), ip4!("2.2.2.2"));
        nbr.state = nsm::State::Full;
        env.publish(&[&nbr]);

        let table = env.ctx.table.load_full();
        let msg = hello(nbr.key, nbr.router_id, true);
        let msgs = process_hello(&env.ctx, &table, msg).unwrap();
        let expected = NeighborPatch {
            liveness: true,
            ..Default::default()
        };
        assert_eq!(update_patch(&msgs), &expected);
    }

    #[test]
    fn short_dbdesc_is_rejected() {
        let mut env = TestEnv::new(ip4!("1.1.1.1"));
        let mut nbr = env.neighbor(ip4!("10.0.1.2"), ip4!("2.2.2.2"));
        nbr.enter_exstart(false);
        env.publish(&[&nbr]);

        let table = env.ctx.table.load_full();
        let msg = DbDescMsg {
            key: nbr.key,
            data: Bytes::from_static(&[0x05, 0xdc, 0x02]),
        };
        let result = process_dbdesc(&env.ctx, &table, msg);
        assert!(matches!(result, Err(Error::PacketDecodeError(..))));
        assert!(env.sent_packets().is_empty());
    }

    #[test]
    fn dbdesc_mtu_mismatch() {
        let env = TestEnv::new(ip4!("1.1.1.1"));
        let mut nbr = env.neighbor(ip4!("10.0.1.2"), ip4!("2.2.2.2"));
        nbr.enter_exstart(false);
        env.publish(&[&nbr]);

        let table = env.ctx.table.load_full();
        let dbdesc =
            DbDesc::new(9000, Options::E, DbDescFlags::all(), 1, vec![]);
        let msg = DbDescMsg {
            key: nbr.key,
            data: dbdesc.encode(),
        };
        let result = process_dbdesc(&env.ctx, &table, msg);
        assert!(matches!(result, Err(Error::MtuMismatch(_, 9000, 1500))));
    }

    #[test]
    fn lsreq_for_missing_lsa_restarts() {
        let mut env = TestEnv::new(ip4!("1.1.1.1"));
        let present = router_lsa(ip4!("1.1.1.1"));
        env.lsdb.insert(AREA, present);
        let mut nbr = env.neighbor(ip4!("10.0.1.2"), ip4!("2.2.2.2"));
        nbr.state = nsm::State::Full;
        env.publish(&[&nbr]);
        let table = env.ctx.table.load_full();

        // Known LSA: sent back and kept for retransmission.
        let msg = LsRequestMsg {
            key: nbr.key,
            data: LsRequest::new(vec![present.key()]).encode(),
        };
        let msgs = process_lsreq(&env.ctx, &table, msg).unwrap();
        assert!(msgs.is_empty());
        let sent = env.sent_packets();
        assert!(matches!(
            &sent[0].packet,
            Packet::LsUpdate(lsupd) if lsupd.lsa_hdrs == vec![present]
        ));
        assert_eq!(env.lists(&nbr).rxmt_len(), 1);

        // Unknown LSA.
        let missing = router_lsa(ip4!("8.8.8.8"));
        let msg = LsRequestMsg {
            key: nbr.key,
            data: LsRequest::new(vec![missing.key()]).encode(),
        };
        let msgs = process_lsreq(&env.ctx, &table, msg).unwrap();
        let patch = update_patch(&msgs);
        assert_eq!(patch.state, Some(nsm::State::ExStart));
        assert_eq!(patch.last_event, Some(nsm::Event::BadLsReq));
        assert!(env.lists(&nbr).is_empty());
    }

    #[test]
    fn lsupd_completes_loading() {
        let mut env = TestEnv::new(ip4!("1.1.1.1"));
        let mut nbr = env.neighbor(ip4!("10.0.1.2"), ip4!("2.2.2.2"));
        nbr.state = nsm::State::Loading;
        let lists = env.lists(&nbr);
        let iface = env.iface();
        let wanted = [router_lsa(ip4!("7.7.7.7")), router_lsa(ip4!("8.8.8.8"))];
        let lsdb = env.lsdb.as_ref();
        lists::build_request_list(&lists, &nbr, &iface, lsdb, &wanted);
        lists::next_request_batch(&lists, 1);
        env.publish(&[&nbr]);
        let table = env.ctx.table.load_full();

        // First answer: the next batch is requested.
        let msg = LsUpdateMsg {
            key: nbr.key,
            lsa_hdrs: vec![wanted[0]],
        };
        let msgs = process_lsupd(&env.ctx, &table, msg).unwrap();
        assert!(msgs.is_empty());
        let sent = env.sent_packets();
        assert!(matches!(
            &sent[0].packet,
            Packet::LsRequest(lsreq) if lsreq.entries == vec![wanted[1].key()]
        ));

        // Second answer: nothing left to request.
        let msg = LsUpdateMsg {
            key: nbr.key,
            lsa_hdrs: vec![wanted[1]],
        };
        let msgs = process_lsupd(&env.ctx, &table, msg).unwrap();
        let patch = update_patch(&msgs);
        assert_eq!(patch.state, Some(nsm::State::Full));
        assert_eq!(patch.last_event, Some(nsm::Event::LoadingDone));
    }

    #[test]
    fn lsack_clears_rxmt_entry() {
        let env = TestEnv::new(ip4!("1.1.1.1"));
        let mut nbr = env.neighbor(ip4!("10.0.1.2"), ip4!("2.2.2.2"));
        nbr.state = nsm::State::Full;
        let lists = env.lists(&nbr);
        let lsa_hdr = router_lsa(ip4!("1.1.1.1"));
        lists::rxmt_add(&lists, &[lsa_hdr]);
        env.publish(&[&nbr]);

        let table = env.ctx.table.load_full();
        let msg = LsAckMsg {
            key: nbr.key,
            lsa_hdrs: vec![lsa_hdr],
        };
        process_lsack(&env.ctx, &table, msg).unwrap();
        assert_eq!(lists.rxmt_len(), 0);
    }

    #[test]
    fn iface_down_kills_attached_neighbors() {
        let env = TestEnv::new(ip4!("1.1.1.1"));
        let nbr1 = env.neighbor(ip4!("10.0.1.2"), ip4!("2.2.2.2"));
        let nbr2 = env.neighbor(ip4!("10.0.1.3"), ip4!("3.3.3.3"));
        let mut other = env.neighbor(ip4!("10.0.2.2"), ip4!("4.4.4.4"));
        other.key.ifindex = 2;
        env.publish(&[&nbr1, &nbr2, &other]);

        let table = env.ctx.table.load_full();
        let msg = InterfaceDownMsg { ifindex: IFINDEX };
        let msgs = process_iface_down(&env.ctx, &table, msg).unwrap();
        let keys = msgs
            .iter()
            .map(|msg| match msg {
                ConfMsg::Delete(msg) => {
                    assert_eq!(msg.event, nsm::Event::Kill);
                    msg.key
                }
                msg => panic!("unexpected message: {msg:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(keys, vec![nbr1.key, nbr2.key]);
    }

    #[test]
    fn rxmt_tick_resends_in_exstart() {
        let mut env = TestEnv::new(ip4!("1.1.1.1"));
        let mut nbr = env.neighbor(ip4!("10.0.1.2"), ip4!("2.2.2.2"));
        nbr.enter_exstart(false);
        let lists = env.lists(&nbr);
        output::send_dbdesc(&env.ctx, &mut nbr, &lists, &env.iface());
        let first = env.sent_packets();
        env.publish(&[&nbr]);

        let table = env.ctx.table.load_full();
        let msg = RxmtIntervalMsg { key: nbr.key };
        process_rxmt_interval(&env.ctx, &table, msg).unwrap();
        let sent = env.sent_packets();
        assert_eq!(sent[0].packet, first[0].packet);
    }
}
