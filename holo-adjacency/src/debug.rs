//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::collections::NeighborKey;
use crate::neighbor::nsm;
use crate::packet::{Packet, PacketType};

// Adjacency engine debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    // Instance
    InstanceStart,
    InstanceStop,
    QueryRefresh(usize),
    // Neighbors
    NeighborCreate(&'a NeighborKey, Ipv4Addr),
    NeighborDelete(Ipv4Addr),
    NsmEvent(Ipv4Addr, &'a nsm::State, &'a nsm::Event),
    NsmTransition(Ipv4Addr, &'a nsm::State, &'a nsm::State),
    InactivityTimerExpiry(Ipv4Addr),
    // Database exchange
    NegotiationDone(Ipv4Addr, bool, u32),
    NegotiationDeferred(Ipv4Addr, u32),
    DbDescDuplicate(Ipv4Addr, u32),
    SummaryListBuild(Ipv4Addr, usize),
    RequestListUpdate(Ipv4Addr, usize),
    // Network
    PacketRx(&'a NeighborKey, PacketType),
    PacketRxIgnore(Ipv4Addr, &'a nsm::State),
    PacketTx(u32, &'a Ipv4Addr, &'a Packet),
}

// Reason why a SeqNoMismatch event was generated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum SeqNoMismatchReason {
    InconsistentFlags,
    InconsistentOptions,
    InconsistentSeqNo,
    UnexpectedDbDesc,
    InvalidLsaType,
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::InstanceStart | Debug::InstanceStop => {
                // Parent span(s): adjacency-instance
                debug!("{}", self);
            }
            Debug::QueryRefresh(count) => {
                // Parent span(s): adjacency-instance
                debug!(%count, "{}", self);
            }
            Debug::NeighborCreate(key, router_id) => {
                // Parent span(s): adjacency-instance
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!(%key, "{}", self);
                })
            }
            Debug::NeighborDelete(router_id)
            | Debug::InactivityTimerExpiry(router_id) => {
                // Parent span(s): adjacency-instance
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!("{}", self);
                })
            }
            Debug::NsmEvent(router_id, state, event) => {
                // Parent span(s): adjacency-instance
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug_span!("fsm").in_scope(|| {
                        debug!(?state, ?event, "{}", self);
                    })
                })
            }
            Debug::NsmTransition(router_id, old_state, new_state) => {
                // Parent span(s): adjacency-instance
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug_span!("fsm").in_scope(|| {
                        debug!(?old_state, ?new_state, "{}", self);
                    })
                })
            }
            Debug::NegotiationDone(router_id, master, dd_seq_no) => {
                // Parent span(s): adjacency-instance
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!(%master, %dd_seq_no, "{}", self);
                })
            }
            Debug::NegotiationDeferred(router_id, dd_seq_no)
            | Debug::DbDescDuplicate(router_id, dd_seq_no) => {
                // Parent span(s): adjacency-instance
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!(%dd_seq_no, "{}", self);
                })
            }
            Debug::SummaryListBuild(router_id, count)
            | Debug::RequestListUpdate(router_id, count) => {
                // Parent span(s): adjacency-instance
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!(%count, "{}", self);
                })
            }
            Debug::PacketRx(key, pkt_type) => {
                // Parent span(s): adjacency-instance
                debug_span!("network").in_scope(|| {
                    debug_span!("input").in_scope(|| {
                        debug!(%key, ?pkt_type, "{}", self);
                    })
                })
            }
            Debug::PacketRxIgnore(router_id, state) => {
                // Parent span(s): adjacency-instance
                debug_span!("neighbor", %router_id).in_scope(|| {
                    debug!(?state, "{}", self);
                })
            }
            Debug::PacketTx(ifindex, addr, packet) => {
                // Parent span(s): adjacency-instance:network:output
                let data = serde_json::to_string(&packet).unwrap_or_default();
                debug!(%ifindex, %addr, %data, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::InstanceStart => {
                write!(f, "starting instance")
            }
            Debug::InstanceStop => {
                write!(f, "stopping instance")
            }
            Debug::QueryRefresh(..) => {
                write!(f, "neighbor query snapshot refreshed")
            }
            Debug::NeighborCreate(..) => {
                write!(f, "neighbor created")
            }
            Debug::NeighborDelete(..) => {
                write!(f, "neighbor deleted")
            }
            Debug::NsmEvent(..) => {
                write!(f, "event")
            }
            Debug::NsmTransition(..) => {
                write!(f, "state transition")
            }
            Debug::InactivityTimerExpiry(..) => {
                write!(f, "inactivity timer expired")
            }
            Debug::NegotiationDone(..) => {
                write!(f, "master/slave negotiation done")
            }
            Debug::NegotiationDeferred(..) => {
                write!(f, "deferring to neighbor with higher router-id")
            }
            Debug::DbDescDuplicate(..) => {
                write!(f, "duplicate database description")
            }
            Debug::SummaryListBuild(..) => {
                write!(f, "database summary list built")
            }
            Debug::RequestListUpdate(..) => {
                write!(f, "link state request list updated")
            }
            Debug::PacketRx(..) => {
                write!(f, "packet")
            }
            Debug::PacketRxIgnore(..) => {
                write!(f, "ignoring packet")
            }
            Debug::PacketTx(..) => {
                write!(f, "packet")
            }
        }
    }
}

// ===== impl SeqNoMismatchReason =====

impl std::fmt::Display for SeqNoMismatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeqNoMismatchReason::InconsistentFlags => {
                write!(f, "inconsistent flags")
            }
            SeqNoMismatchReason::InconsistentOptions => {
                write!(f, "inconsistent options")
            }
            SeqNoMismatchReason::InconsistentSeqNo => {
                write!(f, "inconsistent sequence number")
            }
            SeqNoMismatchReason::UnexpectedDbDesc => {
                write!(f, "unexpected database description packet")
            }
            SeqNoMismatchReason::InvalidLsaType => {
                write!(f, "invalid LSA type")
            }
        }
    }
}
