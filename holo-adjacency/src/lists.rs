//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;

use crate::collections::{Arena, ListHandle};
use crate::config::InstanceCfg;
use crate::debug::Debug;
use crate::interface::InterfaceInfo;
use crate::lsdb::Lsdb;
use crate::neighbor::NeighborRecord;
use crate::packet::lsa::{LsaHdr, LsaKey, LsaTypeCode, lsa_compare};

// Per-neighbor LSA lists.
//
// Each list sits behind its own lock so that timers and the dispatch loops
// can work on different lists of the same neighbor concurrently.
#[derive(Debug, Default)]
pub struct NeighborLists {
    // LSA headers still to be described in DBD packets.
    db_summary: Mutex<BTreeMap<LsaKey, LsaHdr>>,
    // LSAs the neighbor has more recent copies of.
    ls_request: Mutex<RequestList>,
    // LSAs sent to the neighbor and not acknowledged yet.
    ls_rxmt: Mutex<BTreeMap<LsaKey, RxmtEntry>>,
}

#[derive(Debug, Default)]
pub struct RequestList {
    // Entries not yet included in an LS Request packet.
    pub queued: BTreeMap<LsaKey, LsaHdr>,
    // Entries included in the last LS Request packet.
    pub pending: BTreeMap<LsaKey, LsaHdr>,
}

#[derive(Clone, Copy, Debug)]
pub struct RxmtEntry {
    pub lsa_hdr: LsaHdr,
    pub last_sent: Instant,
}

// Storage for the LSA lists of all neighbors.
#[derive(Debug, Default)]
pub struct ListStore(RwLock<Arena<Arc<NeighborLists>>>);

// ===== impl NeighborLists =====

impl NeighborLists {
    pub fn summary_len(&self) -> usize {
        lock(&self.db_summary).len()
    }

    pub fn request_len(&self) -> usize {
        let ls_request = lock(&self.ls_request);
        ls_request.queued.len() + ls_request.pending.len()
    }

    pub fn rxmt_len(&self) -> usize {
        lock(&self.ls_rxmt).len()
    }

    pub fn is_empty(&self) -> bool {
        self.summary_len() == 0
            && self.request_len() == 0
            && self.rxmt_len() == 0
    }

    pub(crate) fn clear(&self) {
        lock(&self.db_summary).clear();
        let mut ls_request = lock(&self.ls_request);
        ls_request.queued.clear();
        ls_request.pending.clear();
        drop(ls_request);
        lock(&self.ls_rxmt).clear();
    }

    // Removes up to `max` headers from the front of the summary list.
    pub(crate) fn summary_pop(&self, max: usize) -> Vec<LsaHdr> {
        let mut db_summary = lock(&self.db_summary);
        let mut lsa_hdrs =
            Vec::with_capacity(std::cmp::min(max, db_summary.len()));
        while lsa_hdrs.len() < max {
            let Some((_, lsa_hdr)) = db_summary.pop_first() else {
                break;
            };
            lsa_hdrs.push(lsa_hdr);
        }
        lsa_hdrs
    }

    pub(crate) fn has_queued_requests(&self) -> bool {
        !lock(&self.ls_request).queued.is_empty()
    }

    pub(crate) fn has_pending_requests(&self) -> bool {
        !lock(&self.ls_request).pending.is_empty()
    }
}

// ===== impl ListStore =====

impl ListStore {
    // Creates empty lists for a new neighbor.
    pub fn allocate(&self) -> ListHandle {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(Default::default())
    }

    // Frees the lists of a deleted neighbor. The handle becomes stale.
    pub fn release(&self, handle: ListHandle) {
        let lists = self
            .0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(handle);
        if let Some(lists) = lists {
            lists.clear();
        }
    }

    pub fn get(&self, handle: ListHandle) -> Option<Arc<NeighborLists>> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(handle)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.0.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ===== global functions =====

// Fills the Database summary list from the LSDB (Section 10.3 of RFC 2328).
//
// The new list replaces the previous one in a single step. MaxAge LSAs go to
// the retransmission list instead.
pub(crate) fn build_summary_list(
    lists: &NeighborLists,
    nbr: &NeighborRecord,
    iface: &InterfaceInfo,
    config: &InstanceCfg,
    lsdb: &dyn Lsdb,
) -> usize {
    let mut db_summary = BTreeMap::new();
    let mut maxage = vec![];

    for lsa_type in [
        LsaTypeCode::Router,
        LsaTypeCode::Network,
        LsaTypeCode::SummaryNetwork,
        LsaTypeCode::SummaryRouter,
        LsaTypeCode::AsExternal,
    ] {
        if lsa_type == LsaTypeCode::AsExternal
            && (!config.as_boundary_router || !iface.external_routing())
        {
            continue;
        }

        for lsa_hdr in lsdb.lsa_hdrs(iface.area_id, lsa_type) {
            // Self-originated summaries are only described by ABRs.
            if matches!(
                lsa_type,
                LsaTypeCode::SummaryNetwork | LsaTypeCode::SummaryRouter
            ) && lsa_hdr.adv_rtr == config.router_id
                && !config.area_border_router
            {
                continue;
            }

            if lsa_hdr.is_maxage() {
                maxage.push(lsa_hdr);
            } else {
                db_summary.insert(lsa_hdr.key(), lsa_hdr);
            }
        }
    }

    let count = db_summary.len();
    *lock(&lists.db_summary) = db_summary;
    if !maxage.is_empty() {
        rxmt_add(lists, &maxage);
    }
    Debug::SummaryListBuild(nbr.router_id, count).log();

    count
}

// Drops from the summary list the LSAs the neighbor already described with
// an identical or more recent instance (RFC 5243).
pub(crate) fn prune_summary_list(lists: &NeighborLists, lsa_hdrs: &[LsaHdr]) {
    let mut db_summary = lock(&lists.db_summary);
    for lsa_hdr in lsa_hdrs {
        if let Some(summary_hdr) = db_summary.get(&lsa_hdr.key())
            && lsa_compare(summary_hdr, lsa_hdr) != Ordering::Greater
        {
            db_summary.remove(&lsa_hdr.key());
        }
    }
}

// Queues requests for the LSAs whose advertised instance is more recent than
// our database copy.
//
// Returns the number of entries added.
pub(crate) fn build_request_list(
    lists: &NeighborLists,
    nbr: &NeighborRecord,
    iface: &InterfaceInfo,
    lsdb: &dyn Lsdb,
    lsa_hdrs: &[LsaHdr],
) -> usize {
    let mut ls_request = lock(&lists.ls_request);
    let mut added = 0;
    for lsa_hdr in lsa_hdrs
        .iter()
        .filter(|lsa_hdr| lsdb.is_newer(iface.area_id, lsa_hdr))
    {
        let lsa_key = lsa_hdr.key();
        // Keep whichever instance is the most recent.
        if let Some(pending) = ls_request.pending.get(&lsa_key)
            && lsa_compare(pending, lsa_hdr) != Ordering::Less
        {
            continue;
        }
        match ls_request.queued.get(&lsa_key) {
            Some(queued) if lsa_compare(queued, lsa_hdr) != Ordering::Less => {
                continue;
            }
            Some(_) => (),
            None => added += 1,
        }
        ls_request.queued.insert(lsa_key, *lsa_hdr);
    }
    drop(ls_request);

    if added > 0 {
        Debug::RequestListUpdate(nbr.router_id, added).log();
    }
    added
}

// Checks whether nothing remains to be requested from the neighbor.
pub(crate) fn check_full_reached(lists: &NeighborLists) -> bool {
    lists.request_len() == 0
}

// Moves up to `max` queued requests to the pending set and returns the keys
// to be sent.
pub(crate) fn next_request_batch(
    lists: &NeighborLists,
    max: usize,
) -> Vec<LsaKey> {
    let mut ls_request = lock(&lists.ls_request);
    while ls_request.pending.len() < max {
        let Some((lsa_key, lsa_hdr)) = ls_request.queued.pop_first() else {
            break;
        };
        ls_request.pending.insert(lsa_key, lsa_hdr);
    }
    ls_request.pending.keys().copied().collect()
}

// Returns the keys of the requests that were sent and remain unanswered.
pub(crate) fn pending_requests(lists: &NeighborLists) -> Vec<LsaKey> {
    lock(&lists.ls_request).pending.keys().copied().collect()
}

// Removes the requests satisfied by the received LSAs.
//
// Returns the number of entries removed.
pub(crate) fn satisfy_requests(
    lists: &NeighborLists,
    lsa_hdrs: &[LsaHdr],
) -> usize {
    let ls_request = &mut *lock(&lists.ls_request);
    let mut removed = 0;
    for lsa_hdr in lsa_hdrs {
        let lsa_key = lsa_hdr.key();
        for list in [&mut ls_request.pending, &mut ls_request.queued] {
            if let Some(requested) = list.get(&lsa_key)
                && lsa_compare(lsa_hdr, requested) != Ordering::Less
            {
                list.remove(&lsa_key);
                removed += 1;
            }
        }
    }
    removed
}

pub(crate) fn rxmt_add(lists: &NeighborLists, lsa_hdrs: &[LsaHdr]) {
    let last_sent = Instant::now();
    let mut ls_rxmt = lock(&lists.ls_rxmt);
    for lsa_hdr in lsa_hdrs {
        ls_rxmt.insert(
            lsa_hdr.key(),
            RxmtEntry {
                lsa_hdr: *lsa_hdr,
                last_sent,
            },
        );
    }
}

// Removes the retransmission entries acknowledged by `lsa_hdrs`, explicitly
// or by the neighbor sending back the same instance.
//
// Returns the number of entries removed.
pub(crate) fn rxmt_ack(lists: &NeighborLists, lsa_hdrs: &[LsaHdr]) -> usize {
    let mut ls_rxmt = lock(&lists.ls_rxmt);
    let mut removed = 0;
    for lsa_hdr in lsa_hdrs {
        let lsa_key = lsa_hdr.key();
        if let Some(entry) = ls_rxmt.get(&lsa_key)
            && lsa_compare(&entry.lsa_hdr, lsa_hdr) == Ordering::Equal
        {
            ls_rxmt.remove(&lsa_key);
            removed += 1;
        }
    }
    removed
}

// Returns the retransmission entries last sent at least `interval` ago, and
// marks them as sent now.
pub(crate) fn rxmt_expired(
    lists: &NeighborLists,
    interval: Duration,
) -> Vec<LsaHdr> {
    let now = Instant::now();
    lock(&lists.ls_rxmt)
        .values_mut()
        .filter(|entry| {
            now.saturating_duration_since(entry.last_sent) >= interval
        })
        .map(|entry| {
            entry.last_sent = now;
            entry.lsa_hdr
        })
        .collect()
}

// ===== helper functions =====

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use const_addrs::ip4;

    use super::*;
    use crate::collections::NeighborKey;
    use crate::interface::InterfaceType;
    use crate::lsdb::testing::MemoryLsdb;
    use crate::packet::Options;
    use crate::packet::lsa::{LSA_INIT_SEQ_NO, LSA_MAX_AGE};

    const AREA: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

    fn hdr(lsa_type: LsaTypeCode, adv_rtr: Ipv4Addr, seq_no: u32) -> LsaHdr {
        LsaHdr::new(
            1,
            Options::E,
            lsa_type.into(),
            adv_rtr,
            adv_rtr,
            seq_no,
            0x1234,
            36,
        )
    }

    fn iface() -> InterfaceInfo {
        InterfaceInfo::new(
            1,
            "eth-rt2".to_owned(),
            InterfaceType::PointToPoint,
            1500,
            AREA,
            Options::E,
            None,
            None,
        )
    }

    fn setup(config: &InstanceCfg) -> (ListStore, NeighborRecord, MemoryLsdb) {
        let store = ListStore::default();
        let nbr = NeighborRecord::new(
            NeighborKey::new(1, ip4!("10.0.1.2")),
            ip4!("2.2.2.2"),
            1,
            40,
            store.allocate(),
        );
        let lsdb = MemoryLsdb::default();
        let local = config.router_id;
        let other = ip4!("3.3.3.3");
        lsdb.insert(AREA, hdr(LsaTypeCode::AsExternal, other, LSA_INIT_SEQ_NO));
        lsdb.insert(AREA, hdr(LsaTypeCode::SummaryNetwork, local, LSA_INIT_SEQ_NO));
        lsdb.insert(AREA, hdr(LsaTypeCode::SummaryRouter, other, LSA_INIT_SEQ_NO));
        lsdb.insert(AREA, hdr(LsaTypeCode::Network, other, LSA_INIT_SEQ_NO));
        lsdb.insert(AREA, hdr(LsaTypeCode::Router, other, LSA_INIT_SEQ_NO));
        lsdb.insert(AREA, hdr(LsaTypeCode::Router, local, LSA_INIT_SEQ_NO));
        (store, nbr, lsdb)
    }

    #[test]
    fn summary_list_order_and_filters() {
        let config = InstanceCfg {
            router_id: ip4!("1.1.1.1"),
            ..Default::default()
        };
        let (store, nbr, lsdb) = setup(&config);
        let lists = store.get(nbr.lists).unwrap();

        let count = build_summary_list(&lists, &nbr, &iface(), &config, &lsdb);
        assert_eq!(count, 4);

        // Neither ABR nor ASBR: the self-originated summary and the external
        // are left out.
        let types = lists
            .summary_pop(10)
            .iter()
            .map(|lsa_hdr| lsa_hdr.lsa_type.type_code().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(
            types,
            vec![
                LsaTypeCode::Router,
                LsaTypeCode::Router,
                LsaTypeCode::Network,
                LsaTypeCode::SummaryRouter,
            ]
        );
        assert_eq!(lists.summary_len(), 0);
    }

    #[test]
    fn summary_list_for_abr_asbr() {
        let config = InstanceCfg {
            router_id: ip4!("1.1.1.1"),
            area_border_router: true,
            as_boundary_router: true,
            ..Default::default()
        };
        let (store, nbr, lsdb) = setup(&config);
        let lists = store.get(nbr.lists).unwrap();

        let count = build_summary_list(&lists, &nbr, &iface(), &config, &lsdb);
        assert_eq!(count, 6);
        let types = lists
            .summary_pop(10)
            .iter()
            .map(|lsa_hdr| lsa_hdr.lsa_type.type_code().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(
            types,
            vec![
                LsaTypeCode::Router,
                LsaTypeCode::Router,
                LsaTypeCode::Network,
                LsaTypeCode::SummaryNetwork,
                LsaTypeCode::SummaryRouter,
                LsaTypeCode::AsExternal,
            ]
        );
    }

    #[test]
    fn summary_list_maxage_goes_to_rxmt() {
        let config = InstanceCfg::default();
        let store = ListStore::default();
        let nbr = NeighborRecord::new(
            NeighborKey::new(1, ip4!("10.0.1.2")),
            ip4!("2.2.2.2"),
            1,
            40,
            store.allocate(),
        );
        let lists = store.get(nbr.lists).unwrap();
        let lsdb = MemoryLsdb::default();
        let mut maxage = hdr(LsaTypeCode::Router, ip4!("4.4.4.4"), LSA_INIT_SEQ_NO);
        maxage.age = LSA_MAX_AGE;
        lsdb.insert(AREA, maxage);

        assert_eq!(build_summary_list(&lists, &nbr, &iface(), &config, &lsdb), 0);
        assert_eq!(lists.rxmt_len(), 1);
    }

    #[test]
    fn request_list_only_takes_newer() {
        let config = InstanceCfg::default();
        let (store, nbr, lsdb) = setup(&config);
        let lists = store.get(nbr.lists).unwrap();
        let other = ip4!("3.3.3.3");

        let rcvd = [
            // Same instance as ours.
            hdr(LsaTypeCode::Router, other, LSA_INIT_SEQ_NO),
            // Newer.
            hdr(LsaTypeCode::Network, other, LSA_INIT_SEQ_NO + 1),
            // Unknown to us.
            hdr(LsaTypeCode::Router, ip4!("5.5.5.5"), LSA_INIT_SEQ_NO),
        ];
        let added = build_request_list(&lists, &nbr, &iface(), &lsdb, &rcvd);
        assert_eq!(added, 2);
        assert!(!check_full_reached(&lists));

        // Re-advertising the same headers doesn't grow the list.
        let added = build_request_list(&lists, &nbr, &iface(), &lsdb, &rcvd);
        assert_eq!(added, 0);
        assert_eq!(lists.request_len(), 2);
    }

    #[test]
    fn request_batches_and_satisfaction() {
        let config = InstanceCfg::default();
        let (store, nbr, lsdb) = setup(&config);
        let lists = store.get(nbr.lists).unwrap();
        let rcvd = (1..=3)
            .map(|i| hdr(LsaTypeCode::Router, Ipv4Addr::new(9, 9, 9, i), LSA_INIT_SEQ_NO))
            .collect::<Vec<_>>();
        build_request_list(&lists, &nbr, &iface(), &lsdb, &rcvd);

        let batch = next_request_batch(&lists, 2);
        assert_eq!(batch, vec![rcvd[0].key(), rcvd[1].key()]);
        assert!(lists.has_queued_requests());
        assert_eq!(pending_requests(&lists), batch);

        // An older instance doesn't satisfy the request.
        let mut older = rcvd[0];
        older.seq_no -= 1;
        assert_eq!(satisfy_requests(&lists, &[older]), 0);

        assert_eq!(satisfy_requests(&lists, &rcvd[0..2]), 2);
        assert!(!lists.has_pending_requests());
        assert_eq!(next_request_batch(&lists, 2), vec![rcvd[2].key()]);
        assert_eq!(satisfy_requests(&lists, &rcvd[2..]), 1);
        assert!(check_full_reached(&lists));
    }

    #[test]
    fn prune_drops_described_lsas() {
        let config = InstanceCfg::default();
        let (store, nbr, lsdb) = setup(&config);
        let lists = store.get(nbr.lists).unwrap();
        build_summary_list(&lists, &nbr, &iface(), &config, &lsdb);
        let before = lists.summary_len();

        let other = ip4!("3.3.3.3");
        let older = hdr(LsaTypeCode::Router, other, LSA_INIT_SEQ_NO - 1);
        prune_summary_list(&lists, &[older]);
        assert_eq!(lists.summary_len(), before);

        let same = hdr(LsaTypeCode::Router, other, LSA_INIT_SEQ_NO);
        prune_summary_list(&lists, &[same]);
        assert_eq!(lists.summary_len(), before - 1);
    }

    #[test]
    fn rxmt_ack_and_expiry() {
        let store = ListStore::default();
        let lists = store.get(store.allocate()).unwrap();
        let lsa_hdr = hdr(LsaTypeCode::Router, ip4!("3.3.3.3"), LSA_INIT_SEQ_NO);
        rxmt_add(&lists, &[lsa_hdr]);

        assert_eq!(rxmt_expired(&lists, Duration::ZERO), vec![lsa_hdr]);
        assert!(rxmt_expired(&lists, Duration::from_secs(5)).is_empty());

        let mut newer = lsa_hdr;
        newer.seq_no += 1;
        assert_eq!(rxmt_ack(&lists, &[newer]), 0);
        assert_eq!(rxmt_ack(&lists, &[lsa_hdr]), 1);
        assert!(lists.is_empty());
    }

    #[test]
    fn released_handle_goes_stale() {
        let store = ListStore::default();
        let handle = store.allocate();
        store.release(handle);
        let reused = store.allocate();
        assert!(store.get(handle).is_none());
        assert!(store.get(reused).is_some());
        assert_eq!(store.len(), 1);
    }
}
