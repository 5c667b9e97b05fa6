//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use tracing::{error, warn};

use crate::collections::NeighborKey;
use crate::neighbor::nsm;
use crate::packet::error::DecodeError;

// Adjacency engine errors.
#[derive(Debug)]
pub enum Error {
    // I/O errors
    SendError(u32, std::io::Error),
    // Inter-task communication
    NeighborNotFound(NeighborKey),
    NeighborExists(NeighborKey),
    InterfaceNotFound(u32),
    ListHandleStale(NeighborKey),
    ActorGone,
    RxLoopGone,
    TxLoopGone,
    // Packet input
    PacketDecodeError(NeighborKey, DecodeError),
    DbDescReject(Ipv4Addr, nsm::State),
    MtuMismatch(Ipv4Addr, u16, u16),
    // Configuration
    ConfigParseError(String, toml::de::Error),
    ConfigInvalid(String, &'static str),
}

// ===== impl Error =====

impl Error {
    pub(crate) fn log(&self) {
        match self {
            Error::SendError(ifindex, error) => {
                warn!(%ifindex, error = %with_source(error), "{}", self);
            }
            Error::NeighborNotFound(key)
            | Error::NeighborExists(key)
            | Error::ListHandleStale(key) => {
                warn!(%key, "{}", self);
            }
            Error::InterfaceNotFound(ifindex) => {
                warn!(%ifindex, "{}", self);
            }
            Error::ActorGone | Error::RxLoopGone | Error::TxLoopGone => {
                error!("{}", self);
            }
            Error::PacketDecodeError(key, error) => {
                warn!(%key, %error, "{}", self);
            }
            Error::DbDescReject(router_id, state) => {
                warn!(%router_id, ?state, "{}", self);
            }
            Error::MtuMismatch(router_id, received, local) => {
                warn!(%router_id, %received, %local, "{}", self);
            }
            Error::ConfigParseError(path, error) => {
                error!(%path, error = %with_source(error), "{}", self);
            }
            Error::ConfigInvalid(path, field) => {
                error!(%path, %field, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::SendError(..) => {
                write!(f, "failed to send packet")
            }
            Error::NeighborNotFound(..) => {
                write!(f, "neighbor not found")
            }
            Error::NeighborExists(..) => {
                write!(f, "neighbor already exists")
            }
            Error::InterfaceNotFound(..) => {
                write!(f, "interface not found")
            }
            Error::ListHandleStale(..) => {
                write!(f, "neighbor LSA lists not found")
            }
            Error::ActorGone => {
                write!(f, "neighbor conf actor is gone")
            }
            Error::RxLoopGone => {
                write!(f, "receive dispatch loop is gone")
            }
            Error::TxLoopGone => {
                write!(f, "transmit dispatch loop is gone")
            }
            Error::PacketDecodeError(..) => {
                write!(f, "failed to decode packet")
            }
            Error::DbDescReject(..) => {
                write!(f, "database description packet rejected")
            }
            Error::MtuMismatch(..) => {
                write!(f, "MTU mismatch")
            }
            Error::ConfigParseError(..) => {
                write!(f, "failed to parse configuration file")
            }
            Error::ConfigInvalid(..) => {
                write!(f, "interval must be greater than zero")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::SendError(_, error) => Some(error),
            Error::PacketDecodeError(_, error) => Some(error),
            Error::ConfigParseError(_, error) => Some(error),
            _ => None,
        }
    }
}

// ===== global functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
