//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod error;
pub mod lsa;

use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::packet::error::{DecodeError, DecodeResult};
use crate::packet::lsa::{LsaHdr, LsaKey};

// Bytes consumed below the packet body: IPv4 header plus OSPF packet header.
pub const IPV4_HDR_LENGTH: u16 = 20;
pub const PACKET_HDR_LENGTH: u16 = 24;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct Options: u8 {
        const E = 0x02;
        const MC = 0x04;
        const NP = 0x08;
        const DC = 0x20;
        const O = 0x40;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct DbDescFlags: u8 {
        const MS = 0x01;
        const M = 0x02;
        const I = 0x04;
    }
}

// Packet types handled by the adjacency engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PacketType {
    Hello = 1,
    DbDesc = 2,
    LsRequest = 3,
    LsUpdate = 4,
    LsAck = 5,
}

// Outbound packet intents. Headers, authentication and the LSA bodies of
// updates are filled in by the packet transport.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Packet {
    DbDesc(DbDesc),
    LsRequest(LsRequest),
    LsUpdate(LsUpdate),
}

//
// Database Description packet.
//
// Encoding format (packet body):
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |         Interface MTU         |    Options    |0|0|0|0|0|I|M|MS
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                     DD sequence number                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// +-                                                             -+
// |                                                               |
// +-                      An LSA Header                          -+
// |                                                               |
// +-                                                             -+
// |                                                               |
// +-                                                             -+
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                              ...                              |
//
#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct DbDesc {
    pub mtu: u16,
    pub options: Options,
    pub dd_flags: DbDescFlags,
    pub dd_seq_no: u32,
    pub lsa_hdrs: Vec<LsaHdr>,
}

//
// Link State Request packet.
//
// Encoding format (packet body):
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                          LS type                              |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                       Link State ID                           |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                     Advertising Router                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                              ...                              |
//
#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsRequest {
    pub entries: Vec<LsaKey>,
}

// Link State Update intent. Only the headers of the LSAs to be sent are
// known here; the transport pulls their bodies from the LSDB.
#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsUpdate {
    pub lsa_hdrs: Vec<LsaHdr>,
}

// ===== impl Packet =====

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::DbDesc(_) => PacketType::DbDesc,
            Packet::LsRequest(_) => PacketType::LsRequest,
            Packet::LsUpdate(_) => PacketType::LsUpdate,
        }
    }
}

// ===== impl DbDesc =====

impl DbDesc {
    pub const BASE_LENGTH: u16 = 8;

    // Decodes a DBD packet body.
    //
    // Nothing is returned unless the whole body parses.
    pub fn decode(data: &[u8]) -> DecodeResult<Self> {
        let mut buf = Bytes::copy_from_slice(data);
        if buf.remaining() < Self::BASE_LENGTH as usize {
            return Err(DecodeError::InvalidLength(buf.remaining() as u16));
        }

        let mtu = buf.get_u16();
        let options = Options::from_bits_retain(buf.get_u8());
        let dd_flags = DbDescFlags::from_bits_truncate(buf.get_u8());
        let dd_seq_no = buf.get_u32();

        let trailing = buf.remaining() % LsaHdr::LENGTH as usize;
        if trailing != 0 {
            return Err(DecodeError::InvalidLsaHdrLength(trailing as u16));
        }
        let mut lsa_hdrs = vec![];
        while buf.remaining() > 0 {
            lsa_hdrs.push(LsaHdr::decode(&mut buf)?);
        }

        Ok(DbDesc {
            mtu,
            options,
            dd_flags,
            dd_seq_no,
            lsa_hdrs,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(
            Self::BASE_LENGTH as usize
                + self.lsa_hdrs.len() * LsaHdr::LENGTH as usize,
        );
        buf.put_u16(self.mtu);
        buf.put_u8(self.options.bits());
        buf.put_u8(self.dd_flags.bits());
        buf.put_u32(self.dd_seq_no);
        for lsa_hdr in &self.lsa_hdrs {
            lsa_hdr.encode(&mut buf);
        }
        buf.freeze()
    }

    // Maximum number of LSA headers that fit in a single DBD packet.
    pub fn max_lsa_hdrs(mtu: u16) -> usize {
        let room = mtu
            .saturating_sub(IPV4_HDR_LENGTH)
            .saturating_sub(PACKET_HDR_LENGTH)
            .saturating_sub(Self::BASE_LENGTH);
        std::cmp::max(1, (room / LsaHdr::LENGTH) as usize)
    }
}

// ===== impl LsRequest =====

impl LsRequest {
    pub fn decode(data: &[u8]) -> DecodeResult<Self> {
        let mut buf = Bytes::copy_from_slice(data);
        if buf.remaining() % LsaKey::LENGTH as usize != 0 {
            return Err(DecodeError::InvalidLength(buf.remaining() as u16));
        }

        let mut entries = vec![];
        while buf.remaining() > 0 {
            entries.push(LsaKey::decode(&mut buf));
        }

        Ok(LsRequest { entries })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(
            self.entries.len() * LsaKey::LENGTH as usize,
        );
        for entry in &self.entries {
            entry.encode(&mut buf);
        }
        buf.freeze()
    }

    // Maximum number of entries that fit in a single LS Request packet.
    pub fn max_entries(mtu: u16) -> usize {
        let room = mtu
            .saturating_sub(IPV4_HDR_LENGTH)
            .saturating_sub(PACKET_HDR_LENGTH);
        std::cmp::max(1, (room / LsaKey::LENGTH) as usize)
    }
}

// ===== unit tests =====
