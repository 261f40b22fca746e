//! Switch connections.
//!
//! Each accepted connection is served by one worker running
//! [`handle_client_connected`]. The worker performs the OpenFlow 1.3 hello and
//! features handshake, turns the switch's messages into [`Event`]s, and hands
//! them one at a time to an [`OfpController`], so the events of a single switch
//! are always handled in arrival order. Workers for different switches run
//! independently.

use std::io::{ErrorKind, Read, Write};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ofp_header::OfpHeader;
use crate::ofp_message::OfpMessage;
use crate::openflow0x04::message::Message;
use crate::openflow0x04::{FlowMod, MsgCode, PacketIn, PacketOut, SwitchFeatures, OFP_VERSION};

/// Datapath id of a connected switch.
pub type SwitchId = u64;

/// Something that happened on one switch connection.
#[derive(Debug)]
pub enum Event {
    Connected(SwitchId),
    /// The features handshake finished; the switch is ready for flow programming.
    HandshakeComplete(SwitchId, SwitchFeatures),
    PacketIn(SwitchId, PacketIn),
    Disconnected(SwitchId),
}

impl Event {
    pub fn switch_id(&self) -> SwitchId {
        match *self {
            Event::Connected(sw) |
            Event::HandshakeComplete(sw, _) |
            Event::PacketIn(sw, _) |
            Event::Disconnected(sw) => sw,
        }
    }

    pub fn name(&self) -> &'static str {
        match *self {
            Event::Connected(_) => "connected",
            Event::HandshakeComplete(..) => "handshake-complete",
            Event::PacketIn(..) => "packet-in",
            Event::Disconnected(_) => "disconnected",
        }
    }
}

/// Lifecycle of one switch as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    Disconnected,
    Configuring(SwitchId),
    Active(SwitchId),
}

impl SwitchState {
    pub fn switch_id(&self) -> Option<SwitchId> {
        match *self {
            SwitchState::Disconnected => None,
            SwitchState::Configuring(sw) | SwitchState::Active(sw) => Some(sw),
        }
    }
}

/// Outbound half of a switch connection.
pub trait SwitchSession {
    /// Send a flow table modification. Fire-and-forget.
    fn send_flow_mod(&mut self, flow_mod: FlowMod) -> Result<()>;
    /// Send a single packet out of the switch.
    fn send_packet_out(&mut self, packet_out: PacketOut) -> Result<()>;
}

/// OpenFlow Controller
///
/// Application logic driven by the events of each switch connection.
pub trait OfpController: Send + Sync {
    /// Handle the next event of one switch. `state` belongs to that switch's
    /// worker and is only ever touched from it.
    fn dispatch(&self,
                state: &mut SwitchState,
                event: Event,
                session: &mut dyn SwitchSession)
                -> Result<()>;
}

/// An OpenFlow 1.3 connection to a switch over any byte stream.
pub struct OfpSession<S> {
    stream: S,
    next_xid: u32,
}

impl<S: Read + Write> OfpSession<S> {
    pub fn new(stream: S) -> OfpSession<S> {
        OfpSession {
            stream,
            next_xid: 1,
        }
    }

    /// Send a message with the given transaction id.
    pub fn send_message(&mut self, xid: u32, msg: Message) -> Result<()> {
        let bytes = Message::marshal(xid, msg)?;
        self.stream.write_all(&bytes)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Send a controller-initiated message under a fresh transaction id.
    pub fn send(&mut self, msg: Message) -> Result<()> {
        let xid = self.next_xid;
        self.next_xid = self.next_xid.wrapping_add(1);
        self.send_message(xid, msg)
    }

    /// Read the next raw message. Returns `None` once the switch closes the stream.
    pub fn recv(&mut self) -> Result<Option<(OfpHeader, Vec<u8>)>> {
        let mut buf = [0u8; 8];
        match self.stream.read_exact(&mut buf) {
            Ok(()) => (),
            Err(ref e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let header = OfpHeader::parse(buf)?;
        let mut body = vec![0; header.body_length()];
        self.stream.read_exact(&mut body)?;
        Ok(Some((header, body)))
    }
}

impl<S: Read + Write> SwitchSession for OfpSession<S> {
    fn send_flow_mod(&mut self, flow_mod: FlowMod) -> Result<()> {
        self.send(Message::FlowMod(flow_mod))
    }

    fn send_packet_out(&mut self, packet_out: PacketOut) -> Result<()> {
        self.send(Message::PacketOut(packet_out))
    }
}

/// Serve one switch connection until it closes.
///
/// However the connection ends, a switch that completed the features exchange
/// is reported as `Disconnected` so its learned state is dropped.
pub fn handle_client_connected<C, S>(controller: &C, stream: S) -> Result<()>
    where C: OfpController + ?Sized,
          S: Read + Write
{
    let mut session = OfpSession::new(stream);
    let mut state = SwitchState::Disconnected;
    let result = session
        .send(Message::Hello)
        .and_then(|_| serve(controller, &mut session, &mut state));
    if let Some(sw) = state.switch_id() {
        if let Err(e) = controller.dispatch(&mut state, Event::Disconnected(sw), &mut session) {
            warn!(switch = sw, error = %e, "disconnect handling failed");
        }
    }
    result
}

fn check_version(header: &OfpHeader, code: MsgCode) -> Result<()> {
    let ok = match code {
        // The hello carries the highest version the switch supports.
        MsgCode::Hello => header.version() >= OFP_VERSION,
        _ => header.version() == OFP_VERSION,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::UnsupportedVersion(header.version()))
    }
}

fn serve<C, S>(controller: &C, session: &mut OfpSession<S>, state: &mut SwitchState) -> Result<()>
    where C: OfpController + ?Sized,
          S: Read + Write
{
    while let Some((header, body)) = session.recv()? {
        let code = match header.type_code() {
            Ok(code) => code,
            Err(e) => {
                warn!(typ = header.raw_type(), error = %e, "skipping message");
                continue;
            }
        };
        check_version(&header, code)?;
        let (xid, msg) = match Message::parse(&header, &body) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(?code, error = %e, "dropping undecodable message");
                continue;
            }
        };
        match msg {
            Message::Hello => {
                debug!(version = header.version(), "hello received, requesting features");
                session.send(Message::FeaturesReq)?;
            }
            Message::EchoRequest(buf) => session.send_message(xid, Message::EchoReply(buf))?,
            Message::EchoReply(_) => (),
            Message::FeaturesReply(features) => {
                let sw = features.datapath_id;
                info!(switch = sw,
                      buffers = features.num_buffers,
                      tables = features.num_tables,
                      "features received");
                controller.dispatch(state, Event::Connected(sw), session)?;
                controller.dispatch(state, Event::HandshakeComplete(sw, features), session)?;
            }
            Message::PacketIn(pkt) => {
                match state.switch_id() {
                    Some(sw) => controller.dispatch(state, Event::PacketIn(sw, pkt), session)?,
                    None => warn!(in_port = pkt.port, "packet-in before features reply, dropping"),
                }
            }
            Message::Error(err) => {
                warn!(switch = ?state.switch_id(),
                      typ = err.typ,
                      code = err.code,
                      "switch reported error")
            }
            _ => debug!(?code, "ignoring message"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// A stream replaying `input` and capturing everything written.
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct Recorder {
        events: parking_lot::Mutex<Vec<(&'static str, SwitchId)>>,
    }

    impl OfpController for Recorder {
        fn dispatch(&self,
                    state: &mut SwitchState,
                    event: Event,
                    _: &mut dyn SwitchSession)
                    -> Result<()> {
            *state = match event {
                Event::Connected(sw) => SwitchState::Configuring(sw),
                Event::HandshakeComplete(sw, _) | Event::PacketIn(sw, _) => SwitchState::Active(sw),
                Event::Disconnected(_) => SwitchState::Disconnected,
            };
            self.events.lock().push((event.name(), event.switch_id()));
            Ok(())
        }
    }

    fn recorder() -> Recorder {
        Recorder { events: parking_lot::Mutex::new(vec![]) }
    }

    fn raw(version: u8, code: MsgCode, xid: u32, body: &[u8]) -> Vec<u8> {
        let mut bytes = vec![];
        OfpHeader::marshal(&mut bytes,
                           OfpHeader::new(version, code as u8, (8 + body.len()) as u16, xid));
        bytes.extend_from_slice(body);
        bytes
    }

    fn features(dpid: u64) -> Vec<u8> {
        let mut body = dpid.to_be_bytes().to_vec();
        body.extend_from_slice(&[0; 16]);
        raw(OFP_VERSION, MsgCode::FeaturesResp, 2, &body)
    }

    fn replies(output: &[u8]) -> Vec<(u8, MsgCode, u32)> {
        let mut out = vec![];
        let mut rest = output;
        while !rest.is_empty() {
            let mut hdr = [0; 8];
            hdr.copy_from_slice(&rest[..8]);
            let h = OfpHeader::parse(hdr).unwrap();
            out.push((h.version(), h.type_code().unwrap(), h.xid()));
            rest = &rest[h.length()..];
        }
        out
    }

    fn run(input: Vec<u8>, controller: &Recorder) -> (Result<()>, Vec<u8>) {
        let mut duplex = Duplex {
            input: Cursor::new(input),
            output: vec![],
        };
        let result = handle_client_connected(controller, &mut duplex);
        (result, duplex.output)
    }

    #[test]
    fn handshake_produces_ordered_events() {
        let mut input = raw(OFP_VERSION, MsgCode::Hello, 1, &[]);
        input.extend(features(0x2a));
        let ctl = recorder();
        let (result, output) = run(input, &ctl);
        result.unwrap();
        assert_eq!(*ctl.events.lock(),
                   vec![("connected", 0x2a), ("handshake-complete", 0x2a), ("disconnected", 0x2a)]);
        let sent = replies(&output);
        assert_eq!(sent[0].0, OFP_VERSION);
        assert_eq!(sent[0].1, MsgCode::Hello);
        assert_eq!(sent[1].1, MsgCode::FeaturesReq);
    }

    #[test]
    fn newer_hello_is_accepted() {
        let mut input = raw(0x06, MsgCode::Hello, 1, &[0, 1, 0, 8, 0, 0, 0, 0x58]);
        input.extend(features(1));
        let ctl = recorder();
        run(input, &ctl).0.unwrap();
        assert_eq!(ctl.events.lock().len(), 3);
    }

    #[test]
    fn old_switch_is_rejected() {
        let ctl = recorder();
        let (result, _) = run(raw(0x01, MsgCode::Hello, 1, &[]), &ctl);
        assert!(matches!(result, Err(Error::UnsupportedVersion(0x01))));
        assert!(ctl.events.lock().is_empty());
    }

    #[test]
    fn echo_reply_reuses_xid() {
        let mut input = raw(OFP_VERSION, MsgCode::Hello, 1, &[]);
        input.extend(raw(OFP_VERSION, MsgCode::EchoReq, 0x77, b"ping"));
        let (result, output) = run(input, &recorder());
        result.unwrap();
        let sent = replies(&output);
        assert_eq!(sent[2], (OFP_VERSION, MsgCode::EchoResp, 0x77));
        assert_eq!(&output[output.len() - 4..], b"ping");
    }

    #[test]
    fn undecodable_and_unknown_messages_are_skipped() {
        let mut input = raw(OFP_VERSION, MsgCode::Hello, 1, &[]);
        input.extend(raw(OFP_VERSION, MsgCode::FeaturesResp, 2, &[0; 3]));
        let mut unknown = raw(OFP_VERSION, MsgCode::Hello, 3, &[1, 2]);
        unknown[1] = 99;
        input.extend(unknown);
        input.extend(raw(OFP_VERSION, MsgCode::BarrierResp, 4, &[]));
        input.extend(features(5));
        let ctl = recorder();
        run(input, &ctl).0.unwrap();
        assert_eq!(ctl.events.lock()[0], ("connected", 5));
    }

    #[test]
    fn packet_in_before_features_is_dropped() {
        let mut input = raw(OFP_VERSION, MsgCode::Hello, 1, &[]);
        let mut pkt_in = vec![0xff; 4];
        pkt_in.extend_from_slice(&[0, 14, 0, 0]);
        pkt_in.extend_from_slice(&[0; 8]);
        pkt_in.extend_from_slice(&[0, 1, 0, 12, 0x80, 0, 0, 4, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0]);
        input.extend(raw(OFP_VERSION, MsgCode::PacketIn, 2, &pkt_in));
        let ctl = recorder();
        run(input, &ctl).0.unwrap();
        assert!(ctl.events.lock().is_empty());
    }
}
