use tracing::{debug, info, warn};

use crate::classifier::{classify, TrafficClass};
use crate::config::QosPolicy;
use crate::error::Result;
use crate::forwarding::ForwardingEngine;
use crate::installer::FlowInstaller;
use crate::mac_table::MacLearningTable;
use crate::ofp_controller::{Event, OfpController, SwitchId, SwitchSession, SwitchState};
use crate::openflow0x04::{Action, PacketIn, PseudoPort};
use crate::packet::Packet;

/// L2 learning switch with a priority-host exception.
///
/// Packets reach the controller through the table-miss rule installed at
/// handshake. For each one the switch learns the source location, classifies
/// the packet, and either installs a rule toward a known destination or floods
/// it. Traffic to or from a priority host is placed on a dedicated queue and
/// gets a higher rule priority. ARP is always flooded and never installed.
///
/// One instance is shared by all switch workers; only the learning table is
/// mutable and it is partitioned per switch.
pub struct QosSwitch {
    hosts: MacLearningTable,
    engine: ForwardingEngine,
    installer: FlowInstaller,
    policy: QosPolicy,
}

impl QosSwitch {
    pub fn new(policy: QosPolicy) -> QosSwitch {
        QosSwitch {
            hosts: MacLearningTable::new(),
            engine: ForwardingEngine::new(&policy),
            installer: FlowInstaller::new(&policy),
            policy,
        }
    }

    pub fn mac_table(&self) -> &MacLearningTable {
        &self.hosts
    }

    pub fn policy(&self) -> &QosPolicy {
        &self.policy
    }

    fn packet_in(&self,
                 sw: SwitchId,
                 pkt: PacketIn,
                 session: &mut dyn SwitchSession)
                 -> Result<()> {
        let in_port = pkt.port;
        let frame = match Packet::parse(pkt.input_payload.data()) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(switch = sw, in_port, error = %e, "unparsable frame, flooding");
                let actions = vec![Action::Output(PseudoPort::Flood)];
                return self.installer.forward(session, in_port, actions, pkt.input_payload);
            }
        };

        if let Some(prev) = self.hosts.observe(sw, frame.dl_src, in_port) {
            if prev != in_port {
                debug!(switch = sw, host = %frame.dl_src, from = prev, to = in_port, "host moved");
            }
        }

        let class = classify(&frame, &self.policy.priority_hosts);
        if class == TrafficClass::Priority {
            if let Some(ip) = frame.ipv4() {
                info!(switch = sw, src = %ip.src, dst = %ip.dst, "priority traffic");
            }
        }

        let decision = self.engine.decide(&self.hosts, sw, class, frame.dl_dst);
        self.installer
            .apply(session, in_port, frame.dl_src, frame.dl_dst, decision, pkt.input_payload)
            .map(|_| ())
    }
}

impl OfpController for QosSwitch {
    fn dispatch(&self,
                state: &mut SwitchState,
                event: Event,
                session: &mut dyn SwitchSession)
                -> Result<()> {
        match (*state, event) {
            (SwitchState::Disconnected, Event::Connected(sw)) => {
                let sessions = self.hosts.attach(sw);
                info!(switch = sw, sessions, "switch connected");
                *state = SwitchState::Configuring(sw);
            }
            (SwitchState::Configuring(cur), Event::HandshakeComplete(sw, _)) if cur == sw => {
                self.installer.install_table_miss(session)?;
                info!(switch = sw, "table-miss rule installed, switch active");
                *state = SwitchState::Active(sw);
            }
            (SwitchState::Active(cur), Event::PacketIn(sw, pkt)) if cur == sw => {
                self.packet_in(sw, pkt, session)?;
            }
            (current, Event::Disconnected(sw)) if current.switch_id() == Some(sw) => {
                let forgotten = self.hosts.release(sw);
                info!(switch = sw, forgotten, "switch disconnected");
                *state = SwitchState::Disconnected;
            }
            (current, event) => {
                warn!(state = ?current, event = event.name(), switch = event.switch_id(),
                      "event out of order, ignoring");
            }
        }
        Ok(())
    }
}
