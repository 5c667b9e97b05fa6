//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collections::NeighborKey;
use crate::lists::ListStore;
use crate::neighbor::{NeighborRecord, NeighborTable, nsm};

// Paged access to the neighbor table for management clients.
//
// Pages are cut from a list of neighbor keys that is refreshed periodically,
// so indexes stay stable between refreshes. Neighbors created after the last
// refresh aren't visible yet, and deleted ones are skipped.
#[derive(Debug)]
pub struct NeighborQuery {
    keys: ArcSwap<Vec<NeighborKey>>,
    table: Arc<ArcSwap<NeighborTable>>,
    lists: Arc<ListStore>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct QueryPage {
    // Where the next page starts, if anything is left.
    pub next_index: Option<usize>,
    pub count: usize,
    pub neighbors: Vec<NeighborSummary>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct NeighborSummary {
    pub key: NeighborKey,
    pub router_id: Ipv4Addr,
    pub priority: u8,
    pub state: nsm::State,
    pub is_master: bool,
    pub dd_seq_no: u32,
    pub last_event: Option<nsm::Event>,
    pub summary_list_len: usize,
    pub request_list_len: usize,
    pub rxmt_list_len: usize,
    pub event_count: u32,
    pub discontinuity_time: DateTime<Utc>,
    pub inactivity_time: DateTime<Utc>,
}

// ===== impl NeighborQuery =====

impl NeighborQuery {
    pub(crate) fn new(
        table: Arc<ArcSwap<NeighborTable>>,
        lists: Arc<ListStore>,
    ) -> NeighborQuery {
        NeighborQuery {
            keys: Default::default(),
            table,
            lists,
        }
    }

    // Takes a new snapshot of the neighbor keys. Returns the number of
    // neighbors in it.
    pub(crate) fn refresh(&self) -> usize {
        let keys = self.table.load().keys().copied().collect::<Vec<_>>();
        let count = keys.len();
        self.keys.store(Arc::new(keys));
        count
    }

    // Returns up to `count` neighbors starting at position `start` of the
    // last snapshot.
    pub fn get_range(&self, start: usize, count: usize) -> QueryPage {
        let keys = self.keys.load();
        let table = self.table.load();
        let end = std::cmp::min(start.saturating_add(count), keys.len());

        let neighbors = keys
            .get(start..end)
            .into_iter()
            .flatten()
            .filter_map(|key| table.get(key))
            .map(|nbr| self.summary(nbr))
            .collect::<Vec<_>>();

        QueryPage {
            next_index: (end < keys.len()).then_some(end),
            count: neighbors.len(),
            neighbors,
        }
    }

    fn summary(&self, nbr: &NeighborRecord) -> NeighborSummary {
        let (summary_list_len, request_list_len, rxmt_list_len) =
            match self.lists.get(nbr.lists) {
                Some(lists) => {
                    (lists.summary_len(), lists.request_len(), lists.rxmt_len())
                }
                None => (0, 0, 0),
            };

        NeighborSummary {
            key: nbr.key,
            router_id: nbr.router_id,
            priority: nbr.priority,
            state: nbr.state,
            is_master: nbr.is_master,
            dd_seq_no: nbr.dd_seq_no,
            last_event: nbr.last_event,
            summary_list_len,
            request_list_len,
            rxmt_list_len,
            event_count: nbr.event_count,
            discontinuity_time: nbr.discontinuity_time,
            inactivity_time: nbr.inactivity_time,
        }
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use const_addrs::ip4;

    use super::*;
    use crate::instance::testing::TestEnv;

    fn router_ids(page: &QueryPage) -> Vec<Ipv4Addr> {
        page.neighbors.iter().map(|nbr| nbr.router_id).collect()
    }

    #[test]
    fn paging_over_snapshot() {
        let env = TestEnv::new(ip4!("1.1.1.1"));
        let nbr1 = env.neighbor(ip4!("10.0.1.2"), ip4!("2.2.2.2"));
        let nbr2 = env.neighbor(ip4!("10.0.1.3"), ip4!("3.3.3.3"));
        let nbr3 = env.neighbor(ip4!("10.0.1.4"), ip4!("4.4.4.4"));
        env.publish(&[&nbr1, &nbr2, &nbr3]);

        let query =
            NeighborQuery::new(env.ctx.table.clone(), env.ctx.lists.clone());

        // Nothing is visible before the first refresh.
        assert_eq!(query.get_range(0, 10).count, 0);
        assert_eq!(query.refresh(), 3);

        let page = query.get_range(0, 2);
        assert_eq!(page.next_index, Some(2));
        assert_eq!(page.count, 2);
        assert_eq!(router_ids(&page), vec![ip4!("2.2.2.2"), ip4!("3.3.3.3")]);

        let page = query.get_range(2, 2);
        assert_eq!(page.next_index, None);
        assert_eq!(router_ids(&page), vec![ip4!("4.4.4.4")]);

        let page = query.get_range(7, 2);
        assert_eq!(page.next_index, None);
        assert!(page.neighbors.is_empty());
    }

    #[test]
    fn deleted_neighbors_are_skipped() {
        let env = TestEnv::new(ip4!("1.1.1.1"));
        let nbr1 = env.neighbor(ip4!("10.0.1.2"), ip4!("2.2.2.2"));
        let nbr2 = env.neighbor(ip4!("10.0.1.3"), ip4!("3.3.3.3"));
        env.publish(&[&nbr1, &nbr2]);
        let query =
            NeighborQuery::new(env.ctx.table.clone(), env.ctx.lists.clone());
        query.refresh();

        env.publish(&[&nbr2]);
        let page = query.get_range(0, 2);
        assert_eq!(page.count, 1);
        assert_eq!(router_ids(&page), vec![ip4!("3.3.3.3")]);
        assert_eq!(page.next_index, None);
    }
}
