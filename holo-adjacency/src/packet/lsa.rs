//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use derive_new::new;
use holo_utils::bytes::{BytesExt, BytesMutExt};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::packet::Options;
use crate::packet::error::{DecodeError, DecodeResult};

pub const LSA_MAX_AGE: u16 = 3600;
pub const LSA_MAX_AGE_DIFF: u16 = 900;
pub const LSA_INIT_SEQ_NO: u32 = 0x80000001;

// LSA type.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[serde(transparent)]
pub struct LsaType(pub u8);

// LSA types that can take part in a database exchange.
#[derive(Clone, Copy, Debug, Eq, FromPrimitive, Hash, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum LsaTypeCode {
    Router = 1,
    Network = 2,
    SummaryNetwork = 3,
    SummaryRouter = 4,
    AsExternal = 5,
}

// Uniquely identifies an LSA within its flooding scope.
//
// The field order matters: database summaries are walked in LSA type order.
#[derive(Clone, Copy, Debug, Eq, Hash, new, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct LsaKey {
    pub lsa_type: LsaType,
    pub adv_rtr: Ipv4Addr,
    pub lsa_id: Ipv4Addr,
}

//
// LSA header.
//
// Encoding format:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |            LS age             |    Options    |    LS type    |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                        Link State ID                          |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                     Advertising Router                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                     LS sequence number                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |         LS checksum           |             length            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LsaHdr {
    pub age: u16,
    pub options: Options,
    pub lsa_type: LsaType,
    pub lsa_id: Ipv4Addr,
    pub adv_rtr: Ipv4Addr,
    pub seq_no: u32,
    pub cksum: u16,
    pub length: u16,
}

// ===== impl LsaType =====

impl LsaType {
    pub fn type_code(&self) -> Option<LsaTypeCode> {
        LsaTypeCode::from_u8(self.0)
    }

    pub fn is_as_scoped(&self) -> bool {
        self.type_code() == Some(LsaTypeCode::AsExternal)
    }
}

impl std::fmt::Display for LsaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<LsaTypeCode> for LsaType {
    fn from(code: LsaTypeCode) -> LsaType {
        LsaType(code as u8)
    }
}

// ===== impl LsaKey =====

impl LsaKey {
    pub const LENGTH: u16 = 12;

    pub(crate) fn decode(buf: &mut Bytes) -> LsaKey {
        // The LS type is carried in a full 32-bit word.
        let lsa_type = LsaType(buf.get_u32() as u8);
        let lsa_id = buf.get_ipv4();
        let adv_rtr = buf.get_ipv4();
        LsaKey::new(lsa_type, adv_rtr, lsa_id)
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.lsa_type.0.into());
        buf.put_ipv4(&self.lsa_id);
        buf.put_ipv4(&self.adv_rtr);
    }
}

impl std::fmt::Display for LsaKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "type {} id {} adv-rtr {}",
            self.lsa_type, self.lsa_id, self.adv_rtr
        )
    }
}

// ===== impl LsaHdr =====

impl LsaHdr {
    pub const LENGTH: u16 = 20;

    pub fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        if buf.remaining() < Self::LENGTH as usize {
            return Err(DecodeError::InvalidLsaHdrLength(
                buf.remaining() as u16,
            ));
        }

        let age = buf.get_u16();
        let options = Options::from_bits_retain(buf.get_u8());
        let lsa_type = LsaType(buf.get_u8());
        let lsa_id = buf.get_ipv4();
        let adv_rtr = buf.get_ipv4();
        let seq_no = buf.get_u32();
        let cksum = buf.get_u16();
        let length = buf.get_u16();

        Ok(LsaHdr {
            age,
            options,
            lsa_type,
            lsa_id,
            adv_rtr,
            seq_no,
            cksum,
            length,
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.age);
        buf.put_u8(self.options.bits());
        buf.put_u8(self.lsa_type.0);
        buf.put_ipv4(&self.lsa_id);
        buf.put_ipv4(&self.adv_rtr);
        buf.put_u32(self.seq_no);
        buf.put_u16(self.cksum);
        buf.put_u16(self.length);
    }

    pub fn key(&self) -> LsaKey {
        LsaKey::new(self.lsa_type, self.adv_rtr, self.lsa_id)
    }

    pub fn is_maxage(&self) -> bool {
        self.age >= LSA_MAX_AGE
    }
}

// ===== global functions =====

// Compares which LSA is more recent according to the rules specified in
// Section 13.1 of RFC 2328.
//
// Returns:
// - Ordering::Greater when `a` is more recent
// - Ordering::Less when `b` is more recent
// - Ordering::Equal when the two LSAs are considered to be identical
pub fn lsa_compare(a: &LsaHdr, b: &LsaHdr) -> Ordering {
    // Sequence numbers are signed.
    let cmp = (a.seq_no as i32).cmp(&(b.seq_no as i32));
    if cmp != Ordering::Equal {
        return cmp;
    }

    let cmp = a.cksum.cmp(&b.cksum);
    if cmp != Ordering::Equal {
        return cmp;
    }

    match (a.is_maxage(), b.is_maxage()) {
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => (),
    }

    if a.age.abs_diff(b.age) > LSA_MAX_AGE_DIFF {
        // Younger wins.
        return b.age.cmp(&a.age);
    }

    Ordering::Equal
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use const_addrs::ip4;

    use super::*;

    fn hdr(age: u16, seq_no: u32, cksum: u16) -> LsaHdr {
        LsaHdr::new(
            age,
            Options::E,
            LsaTypeCode::Router.into(),
            ip4!("1.1.1.1"),
            ip4!("1.1.1.1"),
            seq_no,
            cksum,
            36,
        )
    }

    #[test]
    fn compare_sequence_numbers_as_signed() {
        let a = hdr(10, LSA_INIT_SEQ_NO, 0x1000);
        let b = hdr(10, LSA_INIT_SEQ_NO + 1, 0x1000);
        assert_eq!(lsa_compare(&a, &b), Ordering::Less);
        assert_eq!(lsa_compare(&b, &a), Ordering::Greater);

        // 0x80000001 is the smallest valid sequence number.
        let c = hdr(10, 0x00000001, 0x1000);
        assert_eq!(lsa_compare(&c, &a), Ordering::Greater);
    }

    #[test]
    fn compare_checksum_then_maxage_then_age() {
        let a = hdr(10, LSA_INIT_SEQ_NO, 0x1000);
        let b = hdr(10, LSA_INIT_SEQ_NO, 0x2000);
        assert_eq!(lsa_compare(&a, &b), Ordering::Less);

        let maxage = hdr(LSA_MAX_AGE, LSA_INIT_SEQ_NO, 0x1000);
        assert_eq!(lsa_compare(&maxage, &a), Ordering::Greater);

        let old = hdr(10 + LSA_MAX_AGE_DIFF + 1, LSA_INIT_SEQ_NO, 0x1000);
        assert_eq!(lsa_compare(&a, &old), Ordering::Greater);

        let close = hdr(10 + LSA_MAX_AGE_DIFF, LSA_INIT_SEQ_NO, 0x1000);
        assert_eq!(lsa_compare(&a, &close), Ordering::Equal);
    }

    #[test]
    fn keys_sort_by_type_first() {
        let external = LsaKey::new(
            LsaTypeCode::AsExternal.into(),
            ip4!("1.1.1.1"),
            ip4!("10.0.0.0"),
        );
        let router = LsaKey::new(
            LsaTypeCode::Router.into(),
            ip4!("9.9.9.9"),
            ip4!("9.9.9.9"),
        );
        assert!(router < external);
    }
}
