//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use bytes::Bytes;
use tracing::debug_span;

use crate::debug::Debug;
use crate::error::Error;
use crate::instance::InstanceCtx;
use crate::interface::InterfaceInfo;
use crate::packet::{DbDesc, LsRequest, LsUpdate, Packet};
use crate::tasks::messages::output::TxPacketMsg;

// Packet encoding and delivery, provided by the network layer.
//
// The build methods are expected to add the OSPF header, the authentication
// trailer and, for LS Updates, the full LSA bodies.
pub trait PacketTransport: Send + Sync {
    fn build_dbdesc(&self, iface: &InterfaceInfo, dbdesc: &DbDesc) -> Bytes;

    fn build_lsreq(&self, iface: &InterfaceInfo, lsreq: &LsRequest) -> Bytes;

    fn build_lsupd(&self, iface: &InterfaceInfo, lsupd: &LsUpdate) -> Bytes;

    fn send(
        &self,
        ifindex: u32,
        dst: Ipv4Addr,
        data: Bytes,
    ) -> std::io::Result<()>;
}

// ===== global functions =====

pub(crate) fn send_packet(ctx: &InstanceCtx, msg: TxPacketMsg) {
    let Some(iface) = ctx.interfaces.lookup(msg.ifindex) else {
        Error::InterfaceNotFound(msg.ifindex).log();
        return;
    };

    debug_span!("network").in_scope(|| {
        debug_span!("output").in_scope(|| {
            Debug::PacketTx(msg.ifindex, &msg.dst, &msg.packet).log();
        })
    });

    let data = match &msg.packet {
        Packet::DbDesc(dbdesc) => ctx.transport.build_dbdesc(&iface, dbdesc),
        Packet::LsRequest(lsreq) => ctx.transport.build_lsreq(&iface, lsreq),
        Packet::LsUpdate(lsupd) => ctx.transport.build_lsupd(&iface, lsupd),
    };
    if let Err(error) = ctx.transport.send(msg.ifindex, msg.dst, data) {
        Error::SendError(msg.ifindex, error).log();
    }
}

// ===== testing collaborators =====

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use bytes::{Buf, BufMut, BytesMut};
    use holo_utils::{UnboundedReceiver, UnboundedSender};
    use tokio::sync::mpsc;

    use super::*;
    use crate::packet::PacketType;
    use crate::packet::lsa::LsaHdr;

    // Transport that hands every packet to a channel instead of a socket.
    //
    // Packets are framed as the packet type followed by the packet body.
    #[derive(Debug)]
    pub struct ChannelTransport {
        sentp: UnboundedSender<SentPacket>,
    }

    #[derive(Clone, Debug)]
    pub struct SentPacket {
        pub ifindex: u32,
        pub dst: Ipv4Addr,
        pub data: Bytes,
    }

    impl ChannelTransport {
        pub fn new() -> (ChannelTransport, UnboundedReceiver<SentPacket>) {
            let (sentp, sentc) = mpsc::unbounded_channel();
            (ChannelTransport { sentp }, sentc)
        }
    }

    impl PacketTransport for ChannelTransport {
        fn build_dbdesc(
            &self,
            _iface: &InterfaceInfo,
            dbdesc: &DbDesc,
        ) -> Bytes {
            frame(PacketType::DbDesc, &dbdesc.encode())
        }

        fn build_lsreq(
            &self,
            _iface: &InterfaceInfo,
            lsreq: &LsRequest,
        ) -> Bytes {
            frame(PacketType::LsRequest, &lsreq.encode())
        }

        fn build_lsupd(
            &self,
            _iface: &InterfaceInfo,
            lsupd: &LsUpdate,
        ) -> Bytes {
            let mut body = BytesMut::new();
            for lsa_hdr in &lsupd.lsa_hdrs {
                lsa_hdr.encode(&mut body);
            }
            frame(PacketType::LsUpdate, &body)
        }

        fn send(
            &self,
            ifindex: u32,
            dst: Ipv4Addr,
            data: Bytes,
        ) -> std::io::Result<()> {
            self.sentp
                .send(SentPacket { ifindex, dst, data })
                .map_err(|_| {
                    std::io::Error::from(std::io::ErrorKind::BrokenPipe)
                })
        }
    }

    impl SentPacket {
        // Decodes the packet back into its intent.
        pub fn decode(&self) -> Option<Packet> {
            let (&pkt_type, body) = self.data.split_first()?;
            match pkt_type {
                2 => DbDesc::decode(body).ok().map(Packet::DbDesc),
                3 => LsRequest::decode(body).ok().map(Packet::LsRequest),
                4 => {
                    let mut buf = Bytes::copy_from_slice(body);
                    let mut lsa_hdrs = vec![];
                    while buf.has_remaining() {
                        lsa_hdrs.push(LsaHdr::decode(&mut buf).ok()?);
                    }
                    Some(Packet::LsUpdate(LsUpdate::new(lsa_hdrs)))
                }
                _ => None,
            }
        }
    }

    fn frame(pkt_type: PacketType, body: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + body.len());
        buf.put_u8(pkt_type as u8);
        buf.put_slice(body);
        buf.freeze()
    }
}
