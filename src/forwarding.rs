use crate::classifier::TrafficClass;
use crate::config::QosPolicy;
use crate::mac_table::MacLearningTable;
use crate::ofp_controller::SwitchId;
use crate::openflow0x04::{Action, PseudoPort};
use crate::packet::MacAddr;

/// What to do with one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub class: TrafficClass,
    pub out_port: PseudoPort,
    pub actions: Vec<Action>,
    pub priority: u16,
}

impl Decision {
    /// Only a known destination is worth a rule. Flooding stays reactive so the
    /// switch keeps asking until the destination has been learned.
    pub fn installs_rule(&self) -> bool {
        self.class != TrafficClass::BroadcastControl && self.out_port != PseudoPort::Flood
    }
}

/// Turns a traffic class and a learned location into actions and a flow priority.
#[derive(Debug, Clone)]
pub struct ForwardingEngine {
    normal_priority: u16,
    high_priority: u16,
    priority_queue: u32,
}

impl ForwardingEngine {
    pub fn new(policy: &QosPolicy) -> ForwardingEngine {
        ForwardingEngine {
            normal_priority: policy.normal_priority,
            high_priority: policy.high_priority,
            priority_queue: policy.priority_queue,
        }
    }

    pub fn decide(&self,
                  hosts: &MacLearningTable,
                  sw: SwitchId,
                  class: TrafficClass,
                  dst: MacAddr)
                  -> Decision {
        let out_port = match class {
            TrafficClass::BroadcastControl => PseudoPort::Flood,
            _ => hosts.lookup(sw, dst).map_or(PseudoPort::Flood, PseudoPort::PhysicalPort),
        };
        let (actions, priority) = match class {
            TrafficClass::Priority => {
                (vec![Action::SetQueue(self.priority_queue), Action::Output(out_port)],
                 self.high_priority)
            }
            TrafficClass::BroadcastControl | TrafficClass::Normal => {
                (vec![Action::Output(out_port)], self.normal_priority)
            }
        };
        Decision {
            class,
            out_port,
            actions,
            priority,
        }
    }
}
