use std::net::Ipv4Addr;

use crate::packet::Packet;

/// Traffic class of a single packet. Exactly one class applies; the variants
/// are listed from dominant to weakest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficClass {
    /// Address resolution traffic, which always floods.
    BroadcastControl,
    /// IPv4 traffic to or from a priority host.
    Priority,
    Normal,
}

/// Classify a decoded frame against the configured priority hosts.
///
/// ARP is recognised by ethertype alone, even when its body is unparsable.
/// Anything without a decodable IPv4 header is `Normal`.
pub fn classify(pkt: &Packet, priority_hosts: &[Ipv4Addr]) -> TrafficClass {
    if pkt.is_arp() {
        return TrafficClass::BroadcastControl;
    }
    match pkt.ipv4() {
        Some(ip) if priority_hosts.contains(&ip.src) || priority_hosts.contains(&ip.dst) => {
            TrafficClass::Priority
        }
        _ => TrafficClass::Normal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{ETH_TYP_ARP, ETH_TYP_IP};
    use crate::test_support::{arp_request, ethernet, ipv4_frame, MAC_A, MAC_B};

    const PRIORITY_HOST: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 10);

    fn class_of(frame: &[u8], hosts: &[Ipv4Addr]) -> TrafficClass {
        classify(&Packet::parse(frame).unwrap(), hosts)
    }

    #[test]
    fn arp_is_broadcast_control() {
        let frame = arp_request(MAC_A, [10, 0, 0, 10], [10, 0, 0, 20]);
        assert_eq!(class_of(&frame, &[PRIORITY_HOST]), TrafficClass::BroadcastControl);
    }

    #[test]
    fn arp_with_truncated_body_is_still_broadcast_control() {
        let frame = ethernet(MAC_A, MAC_B, ETH_TYP_ARP);
        assert_eq!(class_of(&frame, &[]), TrafficClass::BroadcastControl);
    }

    #[test]
    fn priority_host_as_either_endpoint() {
        let from = ipv4_frame(MAC_A, MAC_B, [10, 0, 0, 10], [10, 0, 0, 101]);
        let to = ipv4_frame(MAC_B, MAC_A, [10, 0, 0, 101], [10, 0, 0, 10]);
        assert_eq!(class_of(&from, &[PRIORITY_HOST]), TrafficClass::Priority);
        assert_eq!(class_of(&to, &[PRIORITY_HOST]), TrafficClass::Priority);
    }

    #[test]
    fn other_ipv4_traffic_is_normal() {
        let frame = ipv4_frame(MAC_A, MAC_B, [10, 0, 0, 20], [10, 0, 0, 30]);
        assert_eq!(class_of(&frame, &[PRIORITY_HOST]), TrafficClass::Normal);
    }

    #[test]
    fn empty_priority_set_makes_everything_normal() {
        let frame = ipv4_frame(MAC_A, MAC_B, [10, 0, 0, 10], [10, 0, 0, 30]);
        assert_eq!(class_of(&frame, &[]), TrafficClass::Normal);
    }

    #[test]
    fn non_ip_and_broken_ip_are_normal() {
        let ipv6 = ethernet(MAC_A, MAC_B, 0x86dd);
        assert_eq!(class_of(&ipv6, &[PRIORITY_HOST]), TrafficClass::Normal);
        let mut stub = ethernet(MAC_A, MAC_B, ETH_TYP_IP);
        stub.push(0x45);
        assert_eq!(class_of(&stub, &[PRIORITY_HOST]), TrafficClass::Normal);
    }
}
