//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use derive_new::new;
use generational_arena::Index;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::neighbor::{Neighbor, NeighborRecord, NeighborTable};

pub type NeighborIndex = Index;
// Handle to the LSA lists of a neighbor. A handle outlives neither the
// neighbor nor its lists: once released, lookups through it fail even if the
// arena slot gets reused.
pub type ListHandle = Index;

// Identifies a neighbor by its source address on a given interface.
#[derive(Clone, Copy, Debug, Eq, Hash, new, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct NeighborKey {
    pub ifindex: u32,
    pub src: Ipv4Addr,
}

#[derive(Debug)]
pub struct Arena<T>(generational_arena::Arena<T>);

#[derive(Debug, Default)]
pub struct Neighbors {
    arena: Arena<Neighbor>,
    key_tree: BTreeMap<NeighborKey, NeighborIndex>,
}

// ===== impl NeighborKey =====

impl std::fmt::Display for NeighborKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%{}", self.src, self.ifindex)
    }
}

// ===== impl Arena =====

impl<T> Arena<T> {
    pub(crate) fn insert(&mut self, value: T) -> Index {
        self.0.insert(value)
    }

    pub(crate) fn remove(&mut self, index: Index) -> Option<T> {
        self.0.remove(index)
    }

    pub(crate) fn get(&self, index: Index) -> Option<&T> {
        self.0.get(index)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Arena<T> {
        Arena(Default::default())
    }
}

impl<T> std::ops::Index<Index> for Arena<T> {
    type Output = T;

    fn index(&self, index: Index) -> &Self::Output {
        &self.0[index]
    }
}

impl<T> std::ops::IndexMut<Index> for Arena<T> {
    fn index_mut(&mut self, index: Index) -> &mut Self::Output {
        &mut self.0[index]
    }
}

// ===== impl Neighbors =====

impl Neighbors {
    pub(crate) fn insert(
        &mut self,
        record: NeighborRecord,
    ) -> (NeighborIndex, &mut Neighbor) {
        let key = record.key;
        let nbr_idx = self.arena.insert(Neighbor::new(record));
        self.key_tree.insert(key, nbr_idx);
        (nbr_idx, &mut self.arena[nbr_idx])
    }

    pub(crate) fn delete(&mut self, nbr_idx: NeighborIndex) {
        if let Some(nbr) = self.arena.remove(nbr_idx) {
            self.key_tree.remove(&nbr.record.key);
        }
    }

    pub(crate) fn contains(&self, key: &NeighborKey) -> bool {
        self.key_tree.contains_key(key)
    }

    // Returns a mutable reference to the neighbor corresponding to the given
    // key.
    pub(crate) fn get_mut_by_key(
        &mut self,
        key: &NeighborKey,
    ) -> Result<(NeighborIndex, &mut Neighbor), Error> {
        let nbr_idx = self
            .key_tree
            .get(key)
            .copied()
            .ok_or(Error::NeighborNotFound(*key))?;
        Ok((nbr_idx, &mut self.arena[nbr_idx]))
    }

    // Returns an iterator visiting all neighbors in key order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Neighbor> + '_ {
        self.key_tree.values().map(|nbr_idx| &self.arena[*nbr_idx])
    }

    // Builds the read-only view published to the other tasks.
    pub(crate) fn snapshot(&self) -> NeighborTable {
        self.iter()
            .map(|nbr| (nbr.record.key, nbr.record.clone()))
            .collect()
    }
}

impl std::ops::Index<NeighborIndex> for Neighbors {
    type Output = Neighbor;

    fn index(&self, index: NeighborIndex) -> &Self::Output {
        &self.arena[index]
    }
}

impl std::ops::IndexMut<NeighborIndex> for Neighbors {
    fn index_mut(&mut self, index: NeighborIndex) -> &mut Self::Output {
        &mut self.arena[index]
    }
}
