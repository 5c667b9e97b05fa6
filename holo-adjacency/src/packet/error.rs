//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::{Deserialize, Serialize};

// Type aliases.
pub type DecodeResult<T> = Result<T, DecodeError>;

// Packet body decode errors.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum DecodeError {
    InvalidLength(u16),
    InvalidLsaHdrLength(u16),
}

// ===== impl DecodeError =====

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::InvalidLength(length) => {
                write!(f, "invalid packet length: {length}")
            }
            DecodeError::InvalidLsaHdrLength(length) => {
                write!(f, "trailing LSA header bytes: {length}")
            }
        }
    }
}

impl std::error::Error for DecodeError {}
