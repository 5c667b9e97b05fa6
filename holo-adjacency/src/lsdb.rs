//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::net::Ipv4Addr;

use crate::packet::lsa::{LsaHdr, LsaKey, LsaTypeCode, lsa_compare};

// Read access to the link-state database.
//
// Area-scoped LSAs are looked up in the given area; AS-scoped LSAs ignore
// it.
pub trait Lsdb: Send + Sync {
    // Returns the header of the database copy of an LSA.
    fn get(&self, area_id: Ipv4Addr, lsa_key: &LsaKey) -> Option<LsaHdr>;

    // Returns the headers of all LSAs of the given type.
    fn lsa_hdrs(&self, area_id: Ipv4Addr, lsa_type: LsaTypeCode) -> Vec<LsaHdr>;

    // Checks whether `lsa_hdr` describes a more recent instance than the
    // database copy, if any.
    fn is_newer(&self, area_id: Ipv4Addr, lsa_hdr: &LsaHdr) -> bool {
        match self.get(area_id, &lsa_hdr.key()) {
            Some(db_hdr) => lsa_compare(lsa_hdr, &db_hdr) == Ordering::Greater,
            None => true,
        }
    }
}

// ===== testing collaborators =====

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use std::collections::BTreeMap;
    use std::sync::RwLock;

    use super::*;
    use crate::packet::lsa::LsaType;

    // In-memory LSDB holding LSA headers only.
    #[derive(Debug, Default)]
    pub struct MemoryLsdb {
        areas: RwLock<BTreeMap<Ipv4Addr, BTreeMap<LsaKey, LsaHdr>>>,
        as_scope: RwLock<BTreeMap<LsaKey, LsaHdr>>,
    }

    impl MemoryLsdb {
        pub fn insert(&self, area_id: Ipv4Addr, lsa_hdr: LsaHdr) {
            if lsa_hdr.lsa_type.is_as_scoped() {
                self.as_scope.write().unwrap().insert(lsa_hdr.key(), lsa_hdr);
            } else {
                self.areas
                    .write()
                    .unwrap()
                    .entry(area_id)
                    .or_default()
                    .insert(lsa_hdr.key(), lsa_hdr);
            }
        }
    }

    impl Lsdb for MemoryLsdb {
        fn get(&self, area_id: Ipv4Addr, lsa_key: &LsaKey) -> Option<LsaHdr> {
            if lsa_key.lsa_type.is_as_scoped() {
                self.as_scope.read().unwrap().get(lsa_key).copied()
            } else {
                self.areas
                    .read()
                    .unwrap()
                    .get(&area_id)
                    .and_then(|lsdb| lsdb.get(lsa_key).copied())
            }
        }

        fn lsa_hdrs(
            &self,
            area_id: Ipv4Addr,
            lsa_type: LsaTypeCode,
        ) -> Vec<LsaHdr> {
            let lsa_type = LsaType::from(lsa_type);
            if lsa_type.is_as_scoped() {
                let as_scope = self.as_scope.read().unwrap();
                return as_scope.values().copied().collect();
            }
            self.areas
                .read()
                .unwrap()
                .get(&area_id)
                .map(|lsdb| {
                    lsdb.values()
                        .filter(|lsa_hdr| lsa_hdr.lsa_type == lsa_type)
                        .copied()
                        .collect()
                })
                .unwrap_or_default()
        }
    }
}
