//! An in-memory switch: a scripted byte stream fed to the controller and a
//! decoder for whatever the controller wrote back.

#![allow(dead_code)]

use std::io::{self, Cursor, Read, Write};

use ofp_qos::ofp_header::OfpHeader;
use ofp_qos::ofp_message::OfpMessage;
use ofp_qos::openflow0x04::message::Message;
use ofp_qos::openflow0x04::{Capabilities, PacketIn, PacketInReason, Payload, SwitchFeatures};
use ofp_qos::packet::MacAddr;

pub const MAC_A: MacAddr = MacAddr::new(0, 0, 0, 0, 0, 0x0a);
pub const MAC_B: MacAddr = MacAddr::new(0, 0, 0, 0, 0, 0x0b);

pub struct Duplex {
    input: Cursor<Vec<u8>>,
    pub output: Vec<u8>,
}

impl Duplex {
    pub fn new(input: Vec<u8>) -> Duplex {
        Duplex {
            input: Cursor::new(input),
            output: vec![],
        }
    }
}

impl Read for Duplex {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for Duplex {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Messages a switch sends, in order.
pub struct SwitchScript {
    bytes: Vec<u8>,
    xid: u32,
}

impl SwitchScript {
    /// Hello followed by the features reply for `dpid`.
    pub fn handshake(dpid: u64) -> SwitchScript {
        let mut script = SwitchScript {
            bytes: vec![],
            xid: 0,
        };
        script.push(Message::Hello);
        script.push(Message::FeaturesReply(SwitchFeatures {
            datapath_id: dpid,
            num_buffers: 256,
            num_tables: 254,
            auxiliary_id: 0,
            supported_capabilities: Capabilities::default(),
        }));
        script
    }

    pub fn push(&mut self, msg: Message) -> &mut SwitchScript {
        self.xid += 1;
        self.bytes.extend(Message::marshal(self.xid, msg).unwrap());
        self
    }

    pub fn packet_in(&mut self, port: u32, frame: Vec<u8>) -> &mut SwitchScript {
        self.packet_in_payload(port, Payload::NotBuffered(frame))
    }

    pub fn packet_in_payload(&mut self, port: u32, payload: Payload) -> &mut SwitchScript {
        self.push(Message::PacketIn(PacketIn {
            total_len: payload.data().len() as u16,
            input_payload: payload,
            port,
            reason: PacketInReason::NoMatch,
            table_id: 0,
            cookie: 0,
        }))
    }

    pub fn into_stream(self) -> Duplex {
        Duplex::new(self.bytes)
    }
}

/// Decode everything the controller wrote.
pub fn sent_messages(output: &[u8]) -> Vec<Message> {
    let mut msgs = vec![];
    let mut rest = output;
    while !rest.is_empty() {
        let mut hdr = [0; 8];
        hdr.copy_from_slice(&rest[..8]);
        let header = OfpHeader::parse(hdr).unwrap();
        let (_, msg) = Message::parse(&header, &rest[8..header.length()]).unwrap();
        msgs.push(msg);
        rest = &rest[header.length()..];
    }
    msgs
}

pub fn ethernet(src: MacAddr, dst: MacAddr, typ: u16, body: &[u8]) -> Vec<u8> {
    let mut frame = vec![];
    frame.extend_from_slice(&dst.octets());
    frame.extend_from_slice(&src.octets());
    frame.extend_from_slice(&typ.to_be_bytes());
    frame.extend_from_slice(body);
    frame
}

pub fn ipv4(src: MacAddr, dst: MacAddr, src_ip: [u8; 4], dst_ip: [u8; 4]) -> Vec<u8> {
    let mut hdr = vec![0x45, 0x00, 0x00, 0x1c, 0x00, 0x01, 0x00, 0x00, 64, 17, 0x00, 0x00];
    hdr.extend_from_slice(&src_ip);
    hdr.extend_from_slice(&dst_ip);
    hdr.extend_from_slice(&[0x30, 0x39, 0x00, 0x35, 0x00, 0x08, 0x00, 0x00]);
    ethernet(src, dst, 0x0800, &hdr)
}

pub fn arp_reply(src: MacAddr, dst: MacAddr, spa: [u8; 4], tpa: [u8; 4]) -> Vec<u8> {
    let mut body = vec![0x00, 0x01, 0x08, 0x00, 6, 4, 0x00, 0x02];
    body.extend_from_slice(&src.octets());
    body.extend_from_slice(&spa);
    body.extend_from_slice(&dst.octets());
    body.extend_from_slice(&tpa);
    ethernet(src, dst, 0x0806, &body)
}
