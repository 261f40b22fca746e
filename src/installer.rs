use tracing::debug;

use crate::config::QosPolicy;
use crate::error::Result;
use crate::forwarding::Decision;
use crate::ofp_controller::SwitchSession;
use crate::openflow0x04::message::add_flow;
use crate::openflow0x04::{Action, Pattern, Payload, PacketOut, PortNo, PseudoPort, Timeout,
                          OFPCML_NO_BUFFER};
use crate::packet::MacAddr;

/// Programs flow rules and one-shot forwards into a switch.
///
/// Every call produces exactly one outbound message and nothing is awaited.
/// Installed rules are not tracked: a repeated install for the same match
/// replaces the rule in the switch.
#[derive(Debug, Clone)]
pub struct FlowInstaller {
    idle_timeout: Timeout,
    hard_timeout: Timeout,
}

impl FlowInstaller {
    pub fn new(policy: &QosPolicy) -> FlowInstaller {
        FlowInstaller {
            idle_timeout: Timeout::of_int(policy.idle_timeout),
            hard_timeout: Timeout::of_int(policy.hard_timeout),
        }
    }

    /// Install the permanent priority-0 rule sending every unmatched packet,
    /// unbuffered, to the controller.
    pub fn install_table_miss(&self, session: &mut dyn SwitchSession) -> Result<()> {
        let actions = vec![Action::Output(PseudoPort::Controller(OFPCML_NO_BUFFER))];
        session.send_flow_mod(add_flow(0, Pattern::match_all(), actions))
    }

    /// Install a learned rule. A `buffer_id` makes the switch apply the new rule
    /// to the packet it is holding.
    pub fn install(&self,
                   session: &mut dyn SwitchSession,
                   pattern: Pattern,
                   priority: u16,
                   actions: Vec<Action>,
                   buffer_id: Option<u32>)
                   -> Result<()> {
        let mut flow_mod = add_flow(priority, pattern, actions);
        flow_mod.idle_timeout = self.idle_timeout;
        flow_mod.hard_timeout = self.hard_timeout;
        flow_mod.apply_to_packet = buffer_id;
        session.send_flow_mod(flow_mod)
    }

    /// Forward a single packet without touching the flow table.
    pub fn forward(&self,
                   session: &mut dyn SwitchSession,
                   in_port: PortNo,
                   actions: Vec<Action>,
                   payload: Payload)
                   -> Result<()> {
        session.send_packet_out(PacketOut {
            output_payload: payload,
            port_id: Some(in_port),
            apply_actions: actions,
        })
    }

    /// Carry out a forwarding decision for the packet that produced it.
    ///
    /// Returns whether a rule was installed. When the switch buffered the
    /// packet, the rule itself releases it; otherwise the packet is sent out
    /// explicitly after the rule.
    pub fn apply(&self,
                 session: &mut dyn SwitchSession,
                 in_port: PortNo,
                 src: MacAddr,
                 dst: MacAddr,
                 decision: Decision,
                 payload: Payload)
                 -> Result<bool> {
        if !decision.installs_rule() {
            debug!(in_port, %dst, class = ?decision.class, "flooding");
            self.forward(session, in_port, decision.actions, payload)?;
            return Ok(false);
        }

        let pattern = Pattern {
            in_port: Some(in_port),
            eth_src: Some(src),
            eth_dst: Some(dst),
        };
        debug!(in_port, %src, %dst, out_port = ?decision.out_port, priority = decision.priority,
               "installing rule");
        match payload {
            Payload::Buffered(id, _) => {
                self.install(session, pattern, decision.priority, decision.actions, Some(id))?;
            }
            unbuffered @ Payload::NotBuffered(_) => {
                self.install(session, pattern, decision.priority, decision.actions.clone(), None)?;
                self.forward(session, in_port, decision.actions, unbuffered)?;
            }
        }
        Ok(true)
    }
}
