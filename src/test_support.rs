//! Frame builders and a recording session shared by the unit tests.

use crate::error::{Error, Result};
use crate::ofp_controller::SwitchSession;
use crate::openflow0x04::{FlowMod, PacketOut};
use crate::packet::{MacAddr, ETH_TYP_ARP, ETH_TYP_IP};

pub const MAC_A: MacAddr = MacAddr::new(0, 0, 0, 0, 0, 0x10);
pub const MAC_B: MacAddr = MacAddr::new(0, 0, 0, 0, 0, 0x20);

pub fn ethernet(src: MacAddr, dst: MacAddr, typ: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(64);
    frame.extend_from_slice(&dst.octets());
    frame.extend_from_slice(&src.octets());
    frame.extend_from_slice(&typ.to_be_bytes());
    frame
}

/// An ICMP echo carried in a minimal IPv4 header.
pub fn ipv4_frame(src: MacAddr, dst: MacAddr, src_ip: [u8; 4], dst_ip: [u8; 4]) -> Vec<u8> {
    let mut frame = ethernet(src, dst, ETH_TYP_IP);
    frame.extend_from_slice(&[0x45, 0x00]);
    frame.extend_from_slice(&28u16.to_be_bytes());
    frame.extend_from_slice(&[0x12, 0x34, 0x40, 0x00, 64, 0x01, 0x00, 0x00]);
    frame.extend_from_slice(&src_ip);
    frame.extend_from_slice(&dst_ip);
    frame.extend_from_slice(&[8, 0, 0, 0, 0, 1, 0, 1]);
    frame
}

pub fn arp_request(src: MacAddr, spa: [u8; 4], tpa: [u8; 4]) -> Vec<u8> {
    let mut frame = ethernet(src, MacAddr::BROADCAST, ETH_TYP_ARP);
    frame.extend_from_slice(&[0x00, 0x01, 0x08, 0x00, 6, 4, 0x00, 0x01]);
    frame.extend_from_slice(&src.octets());
    frame.extend_from_slice(&spa);
    frame.extend_from_slice(&[0; 6]);
    frame.extend_from_slice(&tpa);
    frame
}

/// Keeps every message instead of writing it. With `fail` set, every send
/// fails as if the connection had dropped.
#[derive(Debug, Default)]
pub struct RecordingSession {
    pub flow_mods: Vec<FlowMod>,
    pub packet_outs: Vec<PacketOut>,
    pub fail: bool,
}

impl RecordingSession {
    fn check(&self) -> Result<()> {
        if self.fail {
            return Err(Error::Io(std::io::ErrorKind::BrokenPipe.into()));
        }
        Ok(())
    }
}

impl SwitchSession for RecordingSession {
    fn send_flow_mod(&mut self, flow_mod: FlowMod) -> Result<()> {
        self.check()?;
        self.flow_mods.push(flow_mod);
        Ok(())
    }

    fn send_packet_out(&mut self, packet_out: PacketOut) -> Result<()> {
        self.check()?;
        self.packet_outs.push(packet_out);
        Ok(())
    }
}
