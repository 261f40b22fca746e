use std::fmt;
use std::io::{BufRead, Cursor, Read};
use std::net::Ipv4Addr;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// A 48-bit ethernet hardware address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);

    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> MacAddr {
        MacAddr([a, b, c, d, e, f])
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Group addresses have the least significant bit of the first octet set.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    fn read(bytes: &mut Cursor<&[u8]>) -> std::io::Result<MacAddr> {
        let mut arr = [0; 6];
        bytes.read_exact(&mut arr)?;
        Ok(MacAddr(arr))
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(addr: [u8; 6]) -> MacAddr {
        MacAddr(addr)
    }
}

/// The low 48 bits of `addr`, most significant octet first.
impl From<u64> for MacAddr {
    fn from(addr: u64) -> MacAddr {
        let be = addr.to_be_bytes();
        MacAddr([be[2], be[3], be[4], be[5], be[6], be[7]])
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// IPv4 header of a packet. Transport payloads are not decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ip {
    pub tos: u8,
    pub ident: u16,
    pub ttl: u8,
    pub proto: u8,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

const IP_MIN_HEADER: usize = 20;

impl Ip {
    fn parse(buf: &[u8]) -> Option<Ip> {
        if buf.len() < IP_MIN_HEADER {
            return None;
        }
        let mut bytes = Cursor::new(buf);
        let vhl = bytes.read_u8().ok()?;
        if (vhl >> 4) != 4 {
            return None;
        }
        let ihl = (vhl & 0x0f) as usize * 4;
        if ihl < IP_MIN_HEADER || ihl > buf.len() {
            return None;
        }
        let tos = bytes.read_u8().ok()?;
        bytes.consume(2);
        let ident = bytes.read_u16::<BigEndian>().ok()?;
        bytes.consume(2);
        let ttl = bytes.read_u8().ok()?;
        let proto = bytes.read_u8().ok()?;
        bytes.consume(2);
        let src = Ipv4Addr::from(bytes.read_u32::<BigEndian>().ok()?);
        let dst = Ipv4Addr::from(bytes.read_u32::<BigEndian>().ok()?);
        Some(Ip {
            tos,
            ident,
            ttl,
            proto,
            src,
            dst,
        })
    }
}

/// Address resolution protocol (ARP) packet payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arp {
    Query(MacAddr, Ipv4Addr, Ipv4Addr),
    Reply(MacAddr, Ipv4Addr, MacAddr, Ipv4Addr),
}

const ARP_LEN: usize = 28;

impl Arp {
    fn parse(buf: &[u8]) -> Option<Arp> {
        if buf.len() < ARP_LEN {
            return None;
        }
        let mut bytes = Cursor::new(buf);
        bytes.consume(6);
        let oper = bytes.read_u16::<BigEndian>().ok()?;
        let sha = MacAddr::read(&mut bytes).ok()?;
        let spa = Ipv4Addr::from(bytes.read_u32::<BigEndian>().ok()?);
        let tha = MacAddr::read(&mut bytes).ok()?;
        let tpa = Ipv4Addr::from(bytes.read_u32::<BigEndian>().ok()?);
        match oper {
            0x0001 => Some(Arp::Query(sha, spa, tpa)),
            0x0002 => Some(Arp::Reply(sha, spa, tha, tpa)),
            _ => None,
        }
    }
}

/// Represents a packet at the network protocol level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nw {
    Ip(Ip),
    Arp(Arp),
    /// Any other ethertype, or a known one whose header did not parse.
    Unparsable(u16, Vec<u8>),
}

pub const ETH_TYP_IP: u16 = 0x0800;
pub const ETH_TYP_ARP: u16 = 0x0806;
pub const ETH_TYP_VLAN: u16 = 0x8100;

const ETH_HEADER: usize = 14;
const VLAN_TAG: usize = 4;

/// Represents a packet at the ethernet protocol level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub dl_src: MacAddr,
    pub dl_dst: MacAddr,
    pub dl_vlan: Option<u16>,
    pub dl_vlan_dei: bool,
    pub dl_vlan_pcp: u8,
    /// Ethertype of the network layer, after any 802.1Q tag.
    pub dl_typ: u16,
    pub nw: Nw,
}

impl Packet {
    /// Decode the link-layer header and, for ARP and IPv4, the network header.
    ///
    /// Only a frame too short to carry an ethernet header is an error. A
    /// network header that does not decode is kept as `Nw::Unparsable`.
    pub fn parse(buf: &[u8]) -> Result<Packet> {
        if buf.len() < ETH_HEADER {
            return Err(Error::TruncatedFrame(buf.len()));
        }
        let mut bytes = Cursor::new(buf);
        let dst = MacAddr::read(&mut bytes)?;
        let src = MacAddr::read(&mut bytes)?;
        let typ = bytes.read_u16::<BigEndian>()?;
        let (tag, dei, pcp, typ) = match typ {
            ETH_TYP_VLAN => {
                if buf.len() < ETH_HEADER + VLAN_TAG {
                    return Err(Error::TruncatedFrame(buf.len()));
                }
                let tag_and_pcp = bytes.read_u16::<BigEndian>()?;
                let tag = tag_and_pcp & 0xfff;
                let dei = (tag_and_pcp & 0x1000) > 0;
                let pcp = tag_and_pcp >> 13;
                let typ = bytes.read_u16::<BigEndian>()?;
                (Some(tag), dei, pcp as u8, typ)
            }
            _ => (None, false, 0x0, typ),
        };
        let rest = &buf[bytes.position() as usize..];
        let nw = match typ {
            ETH_TYP_IP => Ip::parse(rest).map(Nw::Ip),
            ETH_TYP_ARP => Arp::parse(rest).map(Nw::Arp),
            _ => None,
        }
        .unwrap_or_else(|| Nw::Unparsable(typ, rest.to_vec()));
        Ok(Packet {
            dl_src: src,
            dl_dst: dst,
            dl_vlan: tag,
            dl_vlan_dei: dei,
            dl_vlan_pcp: pcp,
            dl_typ: typ,
            nw,
        })
    }

    pub fn is_arp(&self) -> bool {
        self.dl_typ == ETH_TYP_ARP
    }

    /// The IPv4 header, if the frame carries a decodable one.
    pub fn ipv4(&self) -> Option<&Ip> {
        match self.nw {
            Nw::Ip(ref ip) => Some(ip),
            _ => None,
        }
    }
}
