//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use holo_utils::task::{IntervalTask, TimeoutTask};
#[cfg(not(feature = "deterministic"))]
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::collections::{ListHandle, NeighborKey};
use crate::debug::Debug;
use crate::lists::NeighborLists;
use crate::packet::{DbDesc, DbDescFlags, Options};

// Read-only view of the neighbor table, as published by the conf actor.
pub type NeighborTable = BTreeMap<NeighborKey, NeighborRecord>;

// Neighbor state, as known to the rest of the system.
//
// The conf actor is the only writer. Everybody else works on a cloned copy
// and hands the differences back as a `NeighborPatch`.
#[derive(Clone, Debug, PartialEq)]
pub struct NeighborRecord {
    pub key: NeighborKey,
    pub router_id: Ipv4Addr,
    pub priority: u8,
    pub state: nsm::State,
    pub last_event: Option<nsm::Event>,
    // Whether the interface wants a full adjacency with this neighbor
    // (e.g. one of the two is DR/BDR on a broadcast segment).
    pub adj_eligible: bool,
    pub options: Option<Options>,
    pub is_master: bool,
    // Set while we still have LSA headers to describe.
    pub dd_more: bool,
    pub dd_seq_no: u32,
    pub last_rcvd_dbdesc: Option<LastDbDesc>,
    pub last_sent_dbdesc: Option<DbDesc>,
    pub dead_interval: u16,
    pub lists: ListHandle,
    pub inactivity_time: DateTime<Utc>,
    pub event_count: u32,
    pub discontinuity_time: DateTime<Utc>,
}

// Sparse set of changes to apply to a neighbor record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NeighborPatch {
    pub state: Option<nsm::State>,
    pub last_event: Option<nsm::Event>,
    pub priority: Option<u8>,
    pub adj_eligible: Option<bool>,
    pub options: Option<Option<Options>>,
    pub is_master: Option<bool>,
    pub dd_more: Option<bool>,
    pub dd_seq_no: Option<u32>,
    pub last_rcvd_dbdesc: Option<Option<LastDbDesc>>,
    pub last_sent_dbdesc: Option<Option<DbDesc>>,
    pub dead_interval: Option<u16>,
    // A Hello was heard from the neighbor.
    pub liveness: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LastDbDesc {
    pub options: Options,
    pub dd_flags: DbDescFlags,
    pub dd_seq_no: u32,
}

// Neighbor entry owned by the conf actor.
#[derive(Debug)]
pub struct Neighbor {
    pub record: NeighborRecord,
    pub tasks: NeighborTasks,
}

#[derive(Debug, Default)]
pub struct NeighborTasks {
    pub inactivity_timer: Option<TimeoutTask>,
    pub rxmt_interval: Option<IntervalTask>,
}

// OSPF neighbor state machine.
pub mod nsm {
    use serde::{Deserialize, Serialize};

    use crate::debug::SeqNoMismatchReason;

    #[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
    #[derive(Deserialize, Serialize)]
    pub enum State {
        #[default]
        Down,
        Attempt,
        Init,
        TwoWay,
        ExStart,
        Exchange,
        Loading,
        Full,
    }

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    pub enum Event {
        HelloRcvd,
        Start,
        TwoWayRcvd,
        NegotiationDone,
        ExchangeDone,
        BadLsReq,
        LoadingDone,
        AdjOk,
        SeqNoMismatch(SeqNoMismatchReason),
        OneWayRcvd,
        Kill,
        InactivityTimer,
        LinkDown,
    }
}

// ===== impl NeighborRecord =====

impl NeighborRecord {
    pub(crate) fn new(
        key: NeighborKey,
        router_id: Ipv4Addr,
        priority: u8,
        dead_interval: u16,
        lists: ListHandle,
    ) -> NeighborRecord {
        let now = Utc::now();
        NeighborRecord {
            key,
            router_id,
            priority,
            state: nsm::State::Down,
            last_event: None,
            adj_eligible: false,
            options: None,
            is_master: false,
            dd_more: false,
            dd_seq_no: initial_dd_seq_no(router_id),
            last_rcvd_dbdesc: None,
            last_sent_dbdesc: None,
            dead_interval,
            lists,
            inactivity_time: now,
            event_count: 0,
            discontinuity_time: now,
        }
    }

    // Records an NSM event on the working copy.
    pub(crate) fn event(&mut self, event: nsm::Event) {
        Debug::NsmEvent(self.router_id, &self.state, &event).log();
        self.last_event = Some(event);
    }

    // Prepares the record for a new master/slave negotiation.
    //
    // A fresh DD sequence number is picked unless `keep_seq_no` is set.
    pub(crate) fn enter_exstart(&mut self, keep_seq_no: bool) {
        if !keep_seq_no {
            self.dd_seq_no = fresh_dd_seq_no(self.dd_seq_no);
        }
        self.state = nsm::State::ExStart;
        self.is_master = true;
        self.dd_more = true;
        self.options = None;
        self.last_rcvd_dbdesc = None;
        self.last_sent_dbdesc = None;
    }

    // Tears down any database exchange in progress.
    pub(crate) fn reset_adjacency(&mut self, lists: &NeighborLists) {
        lists.clear();
        self.dd_more = false;
        self.options = None;
        self.last_rcvd_dbdesc = None;
        self.last_sent_dbdesc = None;
    }

    // Flags to put in the next DBD sent to this neighbor.
    pub(crate) fn dd_flags(&self) -> DbDescFlags {
        let mut dd_flags = DbDescFlags::empty();
        if self.state == nsm::State::ExStart {
            dd_flags.insert(DbDescFlags::I);
        }
        if self.dd_more {
            dd_flags.insert(DbDescFlags::M);
        }
        if self.is_master {
            dd_flags.insert(DbDescFlags::MS);
        }
        dd_flags
    }

    pub(crate) fn apply(&mut self, patch: &NeighborPatch) {
        if let Some(state) = patch.state {
            self.state = state;
        }
        if let Some(last_event) = patch.last_event {
            self.last_event = Some(last_event);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(adj_eligible) = patch.adj_eligible {
            self.adj_eligible = adj_eligible;
        }
        if let Some(options) = patch.options {
            self.options = options;
        }
        if let Some(is_master) = patch.is_master {
            self.is_master = is_master;
        }
        if let Some(dd_more) = patch.dd_more {
            self.dd_more = dd_more;
        }
        if let Some(dd_seq_no) = patch.dd_seq_no {
            self.dd_seq_no = dd_seq_no;
        }
        if let Some(last_rcvd_dbdesc) = patch.last_rcvd_dbdesc {
            self.last_rcvd_dbdesc = last_rcvd_dbdesc;
        }
        if let Some(last_sent_dbdesc) = &patch.last_sent_dbdesc {
            self.last_sent_dbdesc = last_sent_dbdesc.clone();
        }
        if let Some(dead_interval) = patch.dead_interval {
            self.dead_interval = dead_interval;
        }
        if patch.liveness {
            self.inactivity_time = Utc::now();
        }
    }
}

// ===== impl NeighborPatch =====

impl NeighborPatch {
    // Computes the patch that turns `old` into `new`.
    pub(crate) fn diff(
        old: &NeighborRecord,
        new: &NeighborRecord,
    ) -> NeighborPatch {
        NeighborPatch {
            state: changed(&old.state, &new.state),
            last_event: new
                .last_event
                .filter(|_| old.last_event != new.last_event),
            priority: changed(&old.priority, &new.priority),
            adj_eligible: changed(&old.adj_eligible, &new.adj_eligible),
            options: changed(&old.options, &new.options),
            is_master: changed(&old.is_master, &new.is_master),
            dd_more: changed(&old.dd_more, &new.dd_more),
            dd_seq_no: changed(&old.dd_seq_no, &new.dd_seq_no),
            last_rcvd_dbdesc: changed(
                &old.last_rcvd_dbdesc,
                &new.last_rcvd_dbdesc,
            ),
            last_sent_dbdesc: changed(
                &old.last_sent_dbdesc,
                &new.last_sent_dbdesc,
            ),
            dead_interval: changed(&old.dead_interval, &new.dead_interval),
            liveness: false,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        *self == NeighborPatch::default()
    }
}

// ===== impl LastDbDesc =====

impl LastDbDesc {
    // Checks whether `dbdesc` repeats the last DBD received.
    pub(crate) fn matches(&self, dbdesc: &DbDesc) -> bool {
        self.options == dbdesc.options
            && self.dd_flags == dbdesc.dd_flags
            && self.dd_seq_no == dbdesc.dd_seq_no
    }
}

impl From<&DbDesc> for LastDbDesc {
    fn from(dbdesc: &DbDesc) -> LastDbDesc {
        LastDbDesc {
            options: dbdesc.options,
            dd_flags: dbdesc.dd_flags,
            dd_seq_no: dbdesc.dd_seq_no,
        }
    }
}

// ===== impl Neighbor =====

impl Neighbor {
    pub(crate) fn new(record: NeighborRecord) -> Neighbor {
        Debug::NeighborCreate(&record.key, record.router_id).log();

        Neighbor {
            record,
            tasks: Default::default(),
        }
    }
}

impl Drop for Neighbor {
    fn drop(&mut self) {
        Debug::NeighborDelete(self.record.router_id).log();
    }
}

// ===== helper functions =====

fn changed<T: Clone + PartialEq>(old: &T, new: &T) -> Option<T> {
    (old != new).then(|| new.clone())
}

// Picks the DD sequence number of a newly created neighbor.
fn initial_dd_seq_no(router_id: Ipv4Addr) -> u32 {
    #[cfg(not(feature = "deterministic"))]
    {
        let _ = router_id;
        rand::rng().next_u32()
    }
    #[cfg(feature = "deterministic")]
    {
        router_id.into()
    }
}

// Picks a new DD sequence number for a restarted negotiation.
//
// The value is derived from the wall clock, so it moves away from anything
// the neighbor may still hold from the previous attempt.
pub(crate) fn fresh_dd_seq_no(prev: u32) -> u32 {
    #[cfg(not(feature = "deterministic"))]
    {
        let now = Utc::now();
        let seq_no = (now.timestamp() as u32).rotate_left(16)
            ^ now.timestamp_subsec_nanos();
        if seq_no == prev {
            seq_no.wrapping_add(1)
        } else {
            seq_no
        }
    }
    #[cfg(feature = "deterministic")]
    {
        prev.wrapping_add(1)
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use const_addrs::ip4;

    use super::*;
    use crate::lists::ListStore;

    fn record() -> NeighborRecord {
        let store = ListStore::default();
        NeighborRecord::new(
            NeighborKey::new(2, ip4!("10.0.1.2")),
            ip4!("2.2.2.2"),
            1,
            40,
            store.allocate(),
        )
    }

    #[test]
    fn patch_round_trip() {
        let old = record();
        let mut new = old.clone();
        new.enter_exstart(true);
        new.event(nsm::Event::TwoWayRcvd);

        let patch = NeighborPatch::diff(&old, &new);
        assert_eq!(patch.state, Some(nsm::State::ExStart));
        assert_eq!(patch.is_master, Some(true));
        assert_eq!(patch.dd_seq_no, None);

        let mut applied = old.clone();
        applied.apply(&patch);
        assert_eq!(applied, new);
    }

    #[test]
    fn unchanged_record_yields_empty_patch() {
        let old = record();
        assert!(NeighborPatch::diff(&old, &old.clone()).is_empty());
    }

    #[test]
    fn fresh_seq_no_differs() {
        let old = record();
        assert_ne!(fresh_dd_seq_no(old.dd_seq_no), old.dd_seq_no);
    }

    #[test]
    fn dd_flags_follow_role_and_state() {
        let mut nbr = record();
        nbr.enter_exstart(true);
        assert_eq!(nbr.dd_flags(), DbDescFlags::all());

        nbr.state = nsm::State::Exchange;
        nbr.is_master = false;
        nbr.dd_more = false;
        assert_eq!(nbr.dd_flags(), DbDescFlags::empty());
    }
}
