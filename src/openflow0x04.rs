use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{Error, Result};
use crate::packet::MacAddr;

/// Wire version of OpenFlow 1.3.
pub const OFP_VERSION: u8 = 0x04;

/// `buffer_id` value meaning the packet is not buffered on the switch.
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;

/// `max_len` value asking the switch to send the whole packet to the controller.
pub const OFPCML_NO_BUFFER: u16 = 0xffff;

/// Port numbers as used by OpenFlow 1.3.
pub type PortNo = u32;

/// OpenFlow 1.3 message type codes, used by headers to identify meaning of the rest of a message.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MsgCode {
    Hello,
    Error,
    EchoReq,
    EchoResp,
    Experimenter,
    FeaturesReq,
    FeaturesResp,
    GetConfigReq,
    GetConfigResp,
    SetConfig,
    PacketIn,
    FlowRemoved,
    PortStatus,
    PacketOut,
    FlowMod,
    GroupMod,
    PortMod,
    TableMod,
    MultipartReq,
    MultipartResp,
    BarrierReq,
    BarrierResp,
    QueueGetConfigReq,
    QueueGetConfigResp,
    RoleReq,
    RoleResp,
    GetAsyncReq,
    GetAsyncResp,
    SetAsync,
    MeterMod,
}

impl TryFrom<u8> for MsgCode {
    type Error = crate::error::Error;

    fn try_from(t: u8) -> Result<MsgCode> {
        let code = match t {
            0 => MsgCode::Hello,
            1 => MsgCode::Error,
            2 => MsgCode::EchoReq,
            3 => MsgCode::EchoResp,
            4 => MsgCode::Experimenter,
            5 => MsgCode::FeaturesReq,
            6 => MsgCode::FeaturesResp,
            7 => MsgCode::GetConfigReq,
            8 => MsgCode::GetConfigResp,
            9 => MsgCode::SetConfig,
            10 => MsgCode::PacketIn,
            11 => MsgCode::FlowRemoved,
            12 => MsgCode::PortStatus,
            13 => MsgCode::PacketOut,
            14 => MsgCode::FlowMod,
            15 => MsgCode::GroupMod,
            16 => MsgCode::PortMod,
            17 => MsgCode::TableMod,
            18 => MsgCode::MultipartReq,
            19 => MsgCode::MultipartResp,
            20 => MsgCode::BarrierReq,
            21 => MsgCode::BarrierResp,
            22 => MsgCode::QueueGetConfigReq,
            23 => MsgCode::QueueGetConfigResp,
            24 => MsgCode::RoleReq,
            25 => MsgCode::RoleResp,
            26 => MsgCode::GetAsyncReq,
            27 => MsgCode::GetAsyncResp,
            28 => MsgCode::SetAsync,
            29 => MsgCode::MeterMod,
            t => return Err(crate::error::Error::UnknownMessageType(t)),
        };
        Ok(code)
    }
}

/// Common API for message types implementing OpenFlow Message Codes (see `MsgCode` enum).
pub trait MessageType: Sized {
    /// Return the byte-size of a message body.
    fn size_of(msg: &Self) -> usize;
    /// Parse a body buffer into a message.
    fn parse(buf: &[u8]) -> Result<Self>;
    /// Marshal a message body into a `u8` buffer.
    fn marshal(msg: Self, bytes: &mut Vec<u8>);
}

/// Big-endian appends onto a message buffer.
trait PutBytes {
    fn put_u8(&mut self, v: u8);
    fn put_u16(&mut self, v: u16);
    fn put_u32(&mut self, v: u32);
    fn put_u64(&mut self, v: u64);
    fn put_zeros(&mut self, n: usize);
}

impl PutBytes for Vec<u8> {
    fn put_u8(&mut self, v: u8) {
        self.push(v);
    }

    fn put_u16(&mut self, v: u16) {
        self.extend_from_slice(&v.to_be_bytes());
    }

    fn put_u32(&mut self, v: u32) {
        self.extend_from_slice(&v.to_be_bytes());
    }

    fn put_u64(&mut self, v: u64) {
        self.extend_from_slice(&v.to_be_bytes());
    }

    fn put_zeros(&mut self, n: usize) {
        self.resize(self.len() + n, 0);
    }
}

/// Split the next `n` bytes off the cursor, or fail without moving it.
fn take<'a>(bytes: &mut Cursor<&'a [u8]>, n: usize, what: &'static str) -> Result<&'a [u8]> {
    let buf: &'a [u8] = *bytes.get_ref();
    let start = bytes.position() as usize;
    let end = start
        .checked_add(n)
        .filter(|&end| end <= buf.len())
        .ok_or_else(|| {
            Error::malformed(what,
                             format!("needs {} bytes at offset {}, have {}", n, start, buf.len()))
        })?;
    bytes.set_position(end as u64);
    Ok(&buf[start..end])
}

fn rest<'a>(bytes: &Cursor<&'a [u8]>) -> &'a [u8] {
    let buf: &'a [u8] = *bytes.get_ref();
    &buf[(bytes.position() as usize).min(buf.len())..]
}

fn require(buf: &[u8], len: usize, what: &'static str) -> Result<()> {
    if buf.len() < len {
        Err(Error::malformed(what,
                             format!("body of {} bytes, expected at least {}", buf.len(), len)))
    } else {
        Ok(())
    }
}

/// Test whether bit `bit` of `x` is set.
fn test_bit(bit: u32, x: u32) -> bool {
    (x >> bit) & 1 == 1
}

/// Round `len` up to the next multiple of 8, as OpenFlow 1.3 structures are aligned.
fn pad8(len: usize) -> usize {
    (len + 7) / 8 * 8
}

const OFPMT_OXM: u16 = 1;
const OFPXMC_OPENFLOW_BASIC: u16 = 0x8000;

#[repr(u8)]
enum OxmField {
    InPort = 0,
    EthDst = 3,
    EthSrc = 4,
}

fn oxm_header(field: OxmField, len: u8) -> u32 {
    ((OFPXMC_OPENFLOW_BASIC as u32) << 16) | ((field as u32) << 9) | len as u32
}

/// Fields to match against flows. Unset fields are wildcarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pattern {
    pub in_port: Option<PortNo>,
    pub eth_src: Option<MacAddr>,
    pub eth_dst: Option<MacAddr>,
}

impl Pattern {
    /// A pattern wildcarding every field.
    pub fn match_all() -> Pattern {
        Pattern::default()
    }

    /// Length of the `ofp_match` structure before padding.
    fn unpadded_len(&self) -> usize {
        4 + self.in_port.map_or(0, |_| 8) + self.eth_dst.map_or(0, |_| 10) +
        self.eth_src.map_or(0, |_| 10)
    }

    fn size_of(&self) -> usize {
        pad8(self.unpadded_len())
    }

    fn marshal(p: &Pattern, bytes: &mut Vec<u8>) {
        let len = p.unpadded_len();
        bytes.put_u16(OFPMT_OXM);
        bytes.put_u16(len as u16);
        if let Some(port) = p.in_port {
            bytes.put_u32(oxm_header(OxmField::InPort, 4));
            bytes.put_u32(port);
        }
        if let Some(mac) = p.eth_dst {
            bytes.put_u32(oxm_header(OxmField::EthDst, 6));
            bytes.extend_from_slice(&mac.octets());
        }
        if let Some(mac) = p.eth_src {
            bytes.put_u32(oxm_header(OxmField::EthSrc, 6));
            bytes.extend_from_slice(&mac.octets());
        }
        bytes.put_zeros(pad8(len) - len);
    }

    /// Parse an `ofp_match`, consuming its padding. OXM fields other than the
    /// ones `Pattern` models are skipped.
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Pattern> {
        let hdr = take(bytes, 4, "match")?;
        let typ = u16::from_be_bytes([hdr[0], hdr[1]]);
        let len = u16::from_be_bytes([hdr[2], hdr[3]]) as usize;
        if typ != OFPMT_OXM {
            return Err(Error::malformed("match", format!("unsupported match type {}", typ)));
        }
        if len < 4 {
            return Err(Error::malformed("match", format!("length {} below header size", len)));
        }
        let mut fields = Cursor::new(take(bytes, len - 4, "match")?);
        take(bytes, pad8(len) - len, "match padding")?;

        let mut pattern = Pattern::match_all();
        while (fields.position() as usize) < fields.get_ref().len() {
            let h = fields.read_u32::<BigEndian>()?;
            let class = (h >> 16) as u16;
            let field = ((h >> 9) & 0x7f) as u8;
            let has_mask = (h >> 8) & 1 == 1;
            let value = take(&mut fields, (h & 0xff) as usize, "oxm field")?;
            if class != OFPXMC_OPENFLOW_BASIC || has_mask {
                continue;
            }
            match field {
                f if f == OxmField::InPort as u8 && value.len() == 4 => {
                    pattern.in_port =
                        Some(u32::from_be_bytes([value[0], value[1], value[2], value[3]]));
                }
                f if f == OxmField::EthDst as u8 && value.len() == 6 => {
                    pattern.eth_dst = Some(MacAddr([value[0], value[1], value[2],
                                                    value[3], value[4], value[5]]));
                }
                f if f == OxmField::EthSrc as u8 && value.len() == 6 => {
                    pattern.eth_src = Some(MacAddr([value[0], value[1], value[2],
                                                    value[3], value[4], value[5]]));
                }
                _ => (),
            }
        }
        Ok(pattern)
    }
}

/// Port behavior.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PseudoPort {
    PhysicalPort(PortNo),
    InPort,
    Table,
    Normal,
    Flood,
    AllPorts,
    /// Send to the controller, carrying at most this many bytes of the packet.
    Controller(u16),
    Local,
}

#[repr(u32)]
enum OfpPort {
    OFPPMax = 0xffff_ff00,
    OFPPInPort = 0xffff_fff8,
    OFPPTable = 0xffff_fff9,
    OFPPNormal = 0xffff_fffa,
    OFPPFlood = 0xffff_fffb,
    OFPPAll = 0xffff_fffc,
    OFPPController = 0xffff_fffd,
    OFPPLocal = 0xffff_fffe,
    OFPPAny = 0xffff_ffff,
}

impl PseudoPort {
    fn of_int(p: PortNo) -> Result<Option<PseudoPort>> {
        if (OfpPort::OFPPAny as u32) == p {
            Ok(None)
        } else {
            PseudoPort::make(p, 0).map(Some)
        }
    }

    fn make(p: PortNo, len: u16) -> Result<PseudoPort> {
        let port = match p {
            p if p == (OfpPort::OFPPInPort as u32) => PseudoPort::InPort,
            p if p == (OfpPort::OFPPTable as u32) => PseudoPort::Table,
            p if p == (OfpPort::OFPPNormal as u32) => PseudoPort::Normal,
            p if p == (OfpPort::OFPPFlood as u32) => PseudoPort::Flood,
            p if p == (OfpPort::OFPPAll as u32) => PseudoPort::AllPorts,
            p if p == (OfpPort::OFPPController as u32) => PseudoPort::Controller(len),
            p if p == (OfpPort::OFPPLocal as u32) => PseudoPort::Local,
            p if p <= (OfpPort::OFPPMax as u32) => PseudoPort::PhysicalPort(p),
            p => return Err(Error::malformed("port", format!("unsupported port number {:#x}", p))),
        };
        Ok(port)
    }

    fn to_int(pp: PseudoPort) -> PortNo {
        match pp {
            PseudoPort::PhysicalPort(p) => p,
            PseudoPort::InPort => OfpPort::OFPPInPort as u32,
            PseudoPort::Table => OfpPort::OFPPTable as u32,
            PseudoPort::Normal => OfpPort::OFPPNormal as u32,
            PseudoPort::Flood => OfpPort::OFPPFlood as u32,
            PseudoPort::AllPorts => OfpPort::OFPPAll as u32,
            PseudoPort::Controller(_) => OfpPort::OFPPController as u32,
            PseudoPort::Local => OfpPort::OFPPLocal as u32,
        }
    }
}

/// Actions associated with flows and packets.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    Output(PseudoPort),
    /// Place the packet on the given queue of the port it is output to.
    SetQueue(u32),
}

#[repr(u16)]
enum OfpActionType {
    OFPATOutput = 0,
    OFPATSetQueue = 21,
}

impl Action {
    fn type_code(a: &Action) -> OfpActionType {
        match *a {
            Action::Output(_) => OfpActionType::OFPATOutput,
            Action::SetQueue(_) => OfpActionType::OFPATSetQueue,
        }
    }

    fn size_of(a: &Action) -> usize {
        match *a {
            Action::Output(_) => 16,
            Action::SetQueue(_) => 8,
        }
    }

    fn size_of_sequence(actions: &[Action]) -> usize {
        actions.iter().map(Action::size_of).sum()
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Action> {
        let hdr = take(bytes, 4, "action")?;
        let code = u16::from_be_bytes([hdr[0], hdr[1]]);
        let len = u16::from_be_bytes([hdr[2], hdr[3]]) as usize;
        if len < 8 {
            return Err(Error::malformed("action", format!("length {} below minimum", len)));
        }
        let mut body = Cursor::new(take(bytes, len - 4, "action")?);
        let action = match code {
            t if t == (OfpActionType::OFPATOutput as u16) => {
                let port_code = body.read_u32::<BigEndian>()?;
                let max_len = body.read_u16::<BigEndian>()?;
                Action::Output(PseudoPort::make(port_code, max_len)?)
            }
            t if t == (OfpActionType::OFPATSetQueue as u16) => {
                Action::SetQueue(body.read_u32::<BigEndian>()?)
            }
            t => return Err(Error::malformed("action", format!("unsupported action type {}", t))),
        };
        Ok(action)
    }

    fn parse_sequence(buf: &[u8]) -> Result<Vec<Action>> {
        let mut bytes = Cursor::new(buf);
        let mut actions = vec![];
        while (bytes.position() as usize) < buf.len() {
            actions.push(Action::parse(&mut bytes)?);
        }
        Ok(actions)
    }

    fn move_controller_last(acts: Vec<Action>) -> Vec<Action> {
        let (mut to_ctrl, mut not_to_ctrl): (Vec<Action>, Vec<Action>) = acts
            .into_iter()
            .partition(|act| matches!(*act, Action::Output(PseudoPort::Controller(_))));
        not_to_ctrl.append(&mut to_ctrl);
        not_to_ctrl
    }

    fn marshal(act: Action, bytes: &mut Vec<u8>) {
        bytes.put_u16(Action::type_code(&act) as u16);
        bytes.put_u16(Action::size_of(&act) as u16);
        match act {
            Action::Output(pp) => {
                bytes.put_u32(PseudoPort::to_int(pp));
                bytes.put_u16(match pp {
                    PseudoPort::Controller(w) => w,
                    _ => 0,
                });
                bytes.put_zeros(6);
            }
            Action::SetQueue(queue_id) => bytes.put_u32(queue_id),
        }
    }
}

const OFPIT_APPLY_ACTIONS: u16 = 4;

/// How long before a flow entry expires.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Timeout {
    Permanent,
    ExpiresAfter(u16),
}

impl Timeout {
    pub fn of_int(tm: u16) -> Timeout {
        match tm {
            0 => Timeout::Permanent,
            d => Timeout::ExpiresAfter(d),
        }
    }

    pub fn to_int(tm: Timeout) -> u16 {
        match tm {
            Timeout::Permanent => 0,
            Timeout::ExpiresAfter(d) => d,
        }
    }
}

/// Capabilities supported by the datapath.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub flow_stats: bool,
    pub table_stats: bool,
    pub port_stats: bool,
    pub group_stats: bool,
    pub ip_reasm: bool,
    pub queue_stats: bool,
    pub port_blocked: bool,
}

impl Capabilities {
    fn of_int(d: u32) -> Capabilities {
        Capabilities {
            flow_stats: test_bit(0, d),
            table_stats: test_bit(1, d),
            port_stats: test_bit(2, d),
            group_stats: test_bit(3, d),
            ip_reasm: test_bit(5, d),
            queue_stats: test_bit(6, d),
            port_blocked: test_bit(8, d),
        }
    }

    fn to_int(c: &Capabilities) -> u32 {
        let bits = [
            (c.flow_stats, 0),
            (c.table_stats, 1),
            (c.port_stats, 2),
            (c.group_stats, 3),
            (c.ip_reasm, 5),
            (c.queue_stats, 6),
            (c.port_blocked, 8),
        ];
        let mut d = 0u32;
        for &(set, bit) in bits.iter() {
            if set {
                d |= 1 << bit;
            }
        }
        d
    }
}

/// Switch features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchFeatures {
    pub datapath_id: u64,
    pub num_buffers: u32,
    pub num_tables: u8,
    pub auxiliary_id: u8,
    pub supported_capabilities: Capabilities,
}

const SWITCH_FEATURES_LEN: usize = 24;

impl MessageType for SwitchFeatures {
    fn size_of(_: &SwitchFeatures) -> usize {
        SWITCH_FEATURES_LEN
    }

    fn parse(buf: &[u8]) -> Result<SwitchFeatures> {
        require(buf, SWITCH_FEATURES_LEN, "features reply")?;
        let mut bytes = Cursor::new(buf);
        let datapath_id = bytes.read_u64::<BigEndian>()?;
        let num_buffers = bytes.read_u32::<BigEndian>()?;
        let num_tables = bytes.read_u8()?;
        let auxiliary_id = bytes.read_u8()?;
        take(&mut bytes, 2, "features reply")?;
        let supported_capabilities = Capabilities::of_int(bytes.read_u32::<BigEndian>()?);
        Ok(SwitchFeatures {
            datapath_id,
            num_buffers,
            num_tables,
            auxiliary_id,
            supported_capabilities,
        })
    }

    fn marshal(sf: SwitchFeatures, bytes: &mut Vec<u8>) {
        bytes.put_u64(sf.datapath_id);
        bytes.put_u32(sf.num_buffers);
        bytes.put_u8(sf.num_tables);
        bytes.put_u8(sf.auxiliary_id);
        bytes.put_zeros(2);
        bytes.put_u32(Capabilities::to_int(&sf.supported_capabilities));
        bytes.put_u32(0);
    }
}

/// Type of modification to perform on a flow table.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FlowModCmd {
    AddFlow,
    ModFlow,
    ModStrictFlow,
    DeleteFlow,
    DeleteStrictFlow,
}

impl FlowModCmd {
    fn of_int(c: u8) -> Result<FlowModCmd> {
        match c {
            0 => Ok(FlowModCmd::AddFlow),
            1 => Ok(FlowModCmd::ModFlow),
            2 => Ok(FlowModCmd::ModStrictFlow),
            3 => Ok(FlowModCmd::DeleteFlow),
            4 => Ok(FlowModCmd::DeleteStrictFlow),
            c => Err(Error::malformed("flow mod", format!("unknown command {}", c))),
        }
    }
}

/// Represents modifications to a flow table from the controller.
///
/// The actions are carried in a single apply-actions instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMod {
    pub command: FlowModCmd,
    pub table_id: u8,
    pub pattern: Pattern,
    pub priority: u16,
    pub actions: Vec<Action>,
    pub cookie: u64,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub notify_when_removed: bool,
    pub apply_to_packet: Option<u32>,
    pub out_port: Option<PseudoPort>,
    pub check_overlap: bool,
}

const FLOW_MOD_LEN: usize = 40;
const OFPG_ANY: u32 = 0xffff_ffff;

impl FlowMod {
    fn flags_to_int(check_overlap: bool, notify_when_removed: bool) -> u16 {
        (if check_overlap { 1 << 1 } else { 0 }) | (if notify_when_removed { 1 << 0 } else { 0 })
    }

    fn check_overlap_of_flags(flags: u16) -> bool {
        2 & flags != 0
    }

    fn notify_when_removed_of_flags(flags: u16) -> bool {
        1 & flags != 0
    }

    fn instructions_size(actions: &[Action]) -> usize {
        if actions.is_empty() {
            0
        } else {
            8 + Action::size_of_sequence(actions)
        }
    }
}

impl MessageType for FlowMod {
    fn size_of(msg: &FlowMod) -> usize {
        FLOW_MOD_LEN + msg.pattern.size_of() + FlowMod::instructions_size(&msg.actions)
    }

    fn parse(buf: &[u8]) -> Result<FlowMod> {
        require(buf, FLOW_MOD_LEN, "flow mod")?;
        let mut bytes = Cursor::new(buf);
        let cookie = bytes.read_u64::<BigEndian>()?;
        let _cookie_mask = bytes.read_u64::<BigEndian>()?;
        let table_id = bytes.read_u8()?;
        let command = FlowModCmd::of_int(bytes.read_u8()?)?;
        let idle = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        let hard = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        let prio = bytes.read_u16::<BigEndian>()?;
        let buffer_id = bytes.read_u32::<BigEndian>()?;
        let out_port = PseudoPort::of_int(bytes.read_u32::<BigEndian>()?)?;
        let _out_group = bytes.read_u32::<BigEndian>()?;
        let flags = bytes.read_u16::<BigEndian>()?;
        take(&mut bytes, 2, "flow mod")?;
        let pattern = Pattern::parse(&mut bytes)?;

        let mut actions = vec![];
        while (bytes.position() as usize) < buf.len() {
            let hdr = take(&mut bytes, 4, "instruction")?;
            let typ = u16::from_be_bytes([hdr[0], hdr[1]]);
            let len = u16::from_be_bytes([hdr[2], hdr[3]]) as usize;
            if len < 8 {
                return Err(Error::malformed("instruction",
                                            format!("length {} below minimum", len)));
            }
            let body = take(&mut bytes, len - 4, "instruction")?;
            if typ != OFPIT_APPLY_ACTIONS {
                return Err(Error::malformed("instruction",
                                            format!("unsupported instruction type {}", typ)));
            }
            actions.extend(Action::parse_sequence(&body[4..])?);
        }

        Ok(FlowMod {
            command,
            table_id,
            pattern,
            priority: prio,
            actions,
            cookie,
            idle_timeout: idle,
            hard_timeout: hard,
            notify_when_removed: FlowMod::notify_when_removed_of_flags(flags),
            apply_to_packet: match buffer_id {
                OFP_NO_BUFFER => None,
                n => Some(n),
            },
            out_port,
            check_overlap: FlowMod::check_overlap_of_flags(flags),
        })
    }

    fn marshal(fm: FlowMod, bytes: &mut Vec<u8>) {
        bytes.put_u64(fm.cookie);
        bytes.put_u64(0);
        bytes.put_u8(fm.table_id);
        bytes.put_u8(fm.command as u8);
        bytes.put_u16(Timeout::to_int(fm.idle_timeout));
        bytes.put_u16(Timeout::to_int(fm.hard_timeout));
        bytes.put_u16(fm.priority);
        bytes.put_u32(fm.apply_to_packet.unwrap_or(OFP_NO_BUFFER));
        bytes.put_u32(match fm.out_port {
            None => OfpPort::OFPPAny as u32,
            Some(x) => PseudoPort::to_int(x),
        });
        bytes.put_u32(OFPG_ANY);
        bytes.put_u16(FlowMod::flags_to_int(fm.check_overlap, fm.notify_when_removed));
        bytes.put_zeros(2);
        Pattern::marshal(&fm.pattern, bytes);
        if !fm.actions.is_empty() {
            bytes.put_u16(OFPIT_APPLY_ACTIONS);
            bytes.put_u16(FlowMod::instructions_size(&fm.actions) as u16);
            bytes.put_zeros(4);
            for act in Action::move_controller_last(fm.actions) {
                Action::marshal(act, bytes)
            }
        }
    }
}

/// The data associated with a packet received by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Buffered(u32, Vec<u8>),
    NotBuffered(Vec<u8>),
}

impl Payload {
    pub fn size_of(payload: &Payload) -> usize {
        payload.data().len()
    }

    /// The packet bytes carried in the message, possibly truncated by the switch.
    pub fn data(&self) -> &[u8] {
        match *self {
            Payload::Buffered(_, ref buf) | Payload::NotBuffered(ref buf) => buf,
        }
    }

    pub fn buffer_id(&self) -> Option<u32> {
        match *self {
            Payload::Buffered(id, _) => Some(id),
            Payload::NotBuffered(_) => None,
        }
    }
}

/// The reason a packet arrives at the controller.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PacketInReason {
    NoMatch,
    Action,
    InvalidTtl,
}

impl PacketInReason {
    fn of_int(r: u8) -> Result<PacketInReason> {
        match r {
            0 => Ok(PacketInReason::NoMatch),
            1 => Ok(PacketInReason::Action),
            2 => Ok(PacketInReason::InvalidTtl),
            r => Err(Error::malformed("packet in", format!("unknown reason {}", r))),
        }
    }
}

/// Represents packets received by the datapath and sent to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    pub input_payload: Payload,
    pub total_len: u16,
    /// Ingress port, taken from the `IN_PORT` field of the message's match.
    pub port: PortNo,
    pub reason: PacketInReason,
    pub table_id: u8,
    pub cookie: u64,
}

const PACKET_IN_LEN: usize = 16;

impl PacketIn {
    fn pattern(pi: &PacketIn) -> Pattern {
        Pattern {
            in_port: Some(pi.port),
            ..Pattern::match_all()
        }
    }
}

impl MessageType for PacketIn {
    fn size_of(pi: &PacketIn) -> usize {
        PACKET_IN_LEN + PacketIn::pattern(pi).size_of() + 2 + Payload::size_of(&pi.input_payload)
    }

    fn parse(buf: &[u8]) -> Result<PacketIn> {
        require(buf, PACKET_IN_LEN, "packet in")?;
        let mut bytes = Cursor::new(buf);
        let buf_id = match bytes.read_u32::<BigEndian>()? {
            OFP_NO_BUFFER => None,
            n => Some(n),
        };
        let total_len = bytes.read_u16::<BigEndian>()?;
        let reason = PacketInReason::of_int(bytes.read_u8()?)?;
        let table_id = bytes.read_u8()?;
        let cookie = bytes.read_u64::<BigEndian>()?;
        let pattern = Pattern::parse(&mut bytes)?;
        let port = pattern
            .in_port
            .ok_or_else(|| Error::malformed("packet in", "match carries no in_port"))?;
        take(&mut bytes, 2, "packet in")?;
        let pk = rest(&bytes).to_vec();
        let payload = match buf_id {
            None => Payload::NotBuffered(pk),
            Some(n) => Payload::Buffered(n, pk),
        };
        Ok(PacketIn {
            input_payload: payload,
            total_len,
            port,
            reason,
            table_id,
            cookie,
        })
    }

    fn marshal(pi: PacketIn, bytes: &mut Vec<u8>) {
        bytes.put_u32(pi.input_payload.buffer_id().unwrap_or(OFP_NO_BUFFER));
        bytes.put_u16(pi.total_len);
        bytes.put_u8(pi.reason as u8);
        bytes.put_u8(pi.table_id);
        bytes.put_u64(pi.cookie);
        Pattern::marshal(&PacketIn::pattern(&pi), bytes);
        bytes.put_zeros(2);
        bytes.extend_from_slice(pi.input_payload.data());
    }
}

/// Send a packet out of the datapath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketOut {
    /// A buffered payload is referenced by id only; its bytes are not sent back.
    pub output_payload: Payload,
    pub port_id: Option<PortNo>,
    pub apply_actions: Vec<Action>,
}

const PACKET_OUT_LEN: usize = 16;

impl MessageType for PacketOut {
    fn size_of(po: &PacketOut) -> usize {
        let data = match po.output_payload {
            Payload::Buffered(..) => 0,
            Payload::NotBuffered(ref buf) => buf.len(),
        };
        PACKET_OUT_LEN + Action::size_of_sequence(&po.apply_actions) + data
    }

    fn parse(buf: &[u8]) -> Result<PacketOut> {
        require(buf, PACKET_OUT_LEN, "packet out")?;
        let mut bytes = Cursor::new(buf);
        let buffer_id = bytes.read_u32::<BigEndian>()?;
        let in_port = bytes.read_u32::<BigEndian>()?;
        let actions_len = bytes.read_u16::<BigEndian>()? as usize;
        take(&mut bytes, 6, "packet out")?;
        let action_bytes = take(&mut bytes, actions_len, "packet out actions")?;
        let apply_actions = Action::parse_sequence(action_bytes)?;
        let data = rest(&bytes).to_vec();
        Ok(PacketOut {
            output_payload: match buffer_id {
                OFP_NO_BUFFER => Payload::NotBuffered(data),
                n => Payload::Buffered(n, data),
            },
            port_id: match in_port {
                p if p == (OfpPort::OFPPController as u32) => None,
                p => Some(p),
            },
            apply_actions,
        })
    }

    fn marshal(po: PacketOut, bytes: &mut Vec<u8>) {
        bytes.put_u32(po.output_payload.buffer_id().unwrap_or(OFP_NO_BUFFER));
        bytes.put_u32(po.port_id.unwrap_or(OfpPort::OFPPController as u32));
        bytes.put_u16(Action::size_of_sequence(&po.apply_actions) as u16);
        bytes.put_zeros(6);
        for act in po.apply_actions {
            Action::marshal(act, bytes);
        }
        if let Payload::NotBuffered(data) = po.output_payload {
            bytes.extend_from_slice(&data);
        }
    }
}

/// An error reported by the switch, usually about a message the controller sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMsg {
    pub typ: u16,
    pub code: u16,
    /// At least 64 bytes of the offending request.
    pub data: Vec<u8>,
}

impl MessageType for ErrorMsg {
    fn size_of(err: &ErrorMsg) -> usize {
        4 + err.data.len()
    }

    fn parse(buf: &[u8]) -> Result<ErrorMsg> {
        require(buf, 4, "error")?;
        let mut bytes = Cursor::new(buf);
        let typ = bytes.read_u16::<BigEndian>()?;
        let code = bytes.read_u16::<BigEndian>()?;
        Ok(ErrorMsg {
            typ,
            code,
            data: rest(&bytes).to_vec(),
        })
    }

    fn marshal(err: ErrorMsg, bytes: &mut Vec<u8>) {
        bytes.put_u16(err.typ);
        bytes.put_u16(err.code);
        bytes.extend_from_slice(&err.data);
    }
}

/// Encapsulates handling of messages implementing `MessageType` trait.
pub mod message {
    use super::*;
    use crate::ofp_header::OfpHeader;
    use crate::ofp_message::OfpMessage;

    /// Abstractions of OpenFlow messages mapping to message codes.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Message {
        Hello,
        Error(ErrorMsg),
        EchoRequest(Vec<u8>),
        EchoReply(Vec<u8>),
        FeaturesReq,
        FeaturesReply(SwitchFeatures),
        FlowMod(FlowMod),
        PacketIn(PacketIn),
        PacketOut(PacketOut),
        /// A message of a known type the controller does not interpret.
        Unhandled(MsgCode, Vec<u8>),
    }

    impl Message {
        /// Map `Message` to associated OpenFlow message type code `MsgCode`.
        fn msg_code_of_message(msg: &Message) -> MsgCode {
            match *msg {
                Message::Hello => MsgCode::Hello,
                Message::Error(_) => MsgCode::Error,
                Message::EchoRequest(_) => MsgCode::EchoReq,
                Message::EchoReply(_) => MsgCode::EchoResp,
                Message::FeaturesReq => MsgCode::FeaturesReq,
                Message::FeaturesReply(_) => MsgCode::FeaturesResp,
                Message::FlowMod(_) => MsgCode::FlowMod,
                Message::PacketIn(_) => MsgCode::PacketIn,
                Message::PacketOut(_) => MsgCode::PacketOut,
                Message::Unhandled(code, _) => code,
            }
        }

        /// Marshal the OpenFlow message `msg`.
        fn marshal_body(msg: Message, bytes: &mut Vec<u8>) {
            match msg {
                Message::Hello | Message::FeaturesReq => (),
                Message::Error(err) => ErrorMsg::marshal(err, bytes),
                Message::EchoRequest(buf) |
                Message::EchoReply(buf) |
                Message::Unhandled(_, buf) => {
                    bytes.extend_from_slice(&buf)
                }
                Message::FeaturesReply(features) => SwitchFeatures::marshal(features, bytes),
                Message::FlowMod(flow_mod) => FlowMod::marshal(flow_mod, bytes),
                Message::PacketIn(packet_in) => PacketIn::marshal(packet_in, bytes),
                Message::PacketOut(packet_out) => PacketOut::marshal(packet_out, bytes),
            }
        }
    }

    impl OfpMessage for Message {
        /// Return the byte-size of a `Message`.
        fn size_of(msg: &Message) -> usize {
            OfpHeader::size() +
            match *msg {
                Message::Hello | Message::FeaturesReq => 0,
                Message::Error(ref err) => ErrorMsg::size_of(err),
                Message::EchoRequest(ref buf) |
                Message::EchoReply(ref buf) |
                Message::Unhandled(_, ref buf) => buf.len(),
                Message::FeaturesReply(ref features) => SwitchFeatures::size_of(features),
                Message::FlowMod(ref flow_mod) => FlowMod::size_of(flow_mod),
                Message::PacketIn(ref packet_in) => PacketIn::size_of(packet_in),
                Message::PacketOut(ref packet_out) => PacketOut::size_of(packet_out),
            }
        }

        /// Create an `OfpHeader` for the given `xid` and `msg`. Fails if the message
        /// does not fit the 16-bit length field.
        fn header_of(xid: u32, msg: &Message) -> Result<OfpHeader> {
            let sizeof_buf = Self::size_of(msg);
            let length = u16::try_from(sizeof_buf).map_err(|_| Error::MessageTooLarge(sizeof_buf))?;
            Ok(OfpHeader::new(OFP_VERSION, Self::msg_code_of_message(msg) as u8, length, xid))
        }

        /// Returns a `u8` buffer containing a marshaled OpenFlow header and the message `msg`.
        fn marshal(xid: u32, msg: Message) -> Result<Vec<u8>> {
            let hdr = Self::header_of(xid, &msg)?;
            let mut bytes = Vec::with_capacity(hdr.length());
            OfpHeader::marshal(&mut bytes, hdr);
            Message::marshal_body(msg, &mut bytes);
            Ok(bytes)
        }

        /// Returns a pair `(u32, Message)` of the transaction id and OpenFlow message parsed from
        /// the given OpenFlow header `header`, and buffer `buf`.
        fn parse(header: &OfpHeader, buf: &[u8]) -> Result<(u32, Message)> {
            let msg = match header.type_code()? {
                MsgCode::Hello => Message::Hello,
                MsgCode::Error => Message::Error(ErrorMsg::parse(buf)?),
                MsgCode::EchoReq => Message::EchoRequest(buf.to_vec()),
                MsgCode::EchoResp => Message::EchoReply(buf.to_vec()),
                MsgCode::FeaturesReq => Message::FeaturesReq,
                MsgCode::FeaturesResp => Message::FeaturesReply(SwitchFeatures::parse(buf)?),
                MsgCode::FlowMod => Message::FlowMod(FlowMod::parse(buf)?),
                MsgCode::PacketIn => Message::PacketIn(PacketIn::parse(buf)?),
                MsgCode::PacketOut => Message::PacketOut(PacketOut::parse(buf)?),
                code => Message::Unhandled(code, buf.to_vec()),
            };
            Ok((header.xid(), msg))
        }
    }

    /// Return a `FlowMod` adding a flow parameterized by the given `priority`, `pattern`,
    /// and `actions`.
    pub fn add_flow(prio: u16, pattern: Pattern, actions: Vec<Action>) -> FlowMod {
        FlowMod {
            command: FlowModCmd::AddFlow,
            table_id: 0,
            pattern,
            priority: prio,
            actions,
            cookie: 0,
            idle_timeout: Timeout::Permanent,
            hard_timeout: Timeout::Permanent,
            notify_when_removed: false,
            out_port: None,
            apply_to_packet: None,
            check_overlap: false,
        }
    }
}
