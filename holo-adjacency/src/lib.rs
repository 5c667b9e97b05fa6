//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![cfg_attr(
    feature = "testing",
    allow(dead_code, unused_variables, unused_imports)
)]

pub mod actor;
pub mod collections;
pub mod config;
pub mod debug;
pub mod error;
pub mod events;
pub mod exchange;
pub mod instance;
pub mod interface;
pub mod lists;
pub mod lsdb;
pub mod negotiation;
pub mod neighbor;
pub mod network;
pub mod notification;
pub mod output;
pub mod packet;
pub mod query;
pub mod tasks;
