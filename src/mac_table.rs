use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::ofp_controller::SwitchId;
use crate::openflow0x04::PortNo;
use crate::packet::MacAddr;

/// Hosts learned on one switch, shared by every live session of that switch.
#[derive(Debug, Default)]
struct Partition {
    sessions: usize,
    hosts: HashMap<MacAddr, PortNo>,
}

type SharedPartition = Arc<Mutex<Partition>>;

/// Where each host was last seen, per switch.
///
/// The table is partitioned by datapath id. The outer lock is only taken for
/// writing when a switch's partition is created or dropped, so workers serving
/// different switches contend on nothing but that brief lookup. Entries never
/// age out; a host that moves is overwritten the next time it sends.
///
/// A switch may reconnect before its previous connection has been torn down.
/// Each session therefore [`attach`](Self::attach)es to the partition and
/// [`release`](Self::release)s it, and the partition is dropped only when its
/// last session goes away.
#[derive(Debug, Default)]
pub struct MacLearningTable {
    switches: RwLock<HashMap<SwitchId, SharedPartition>>,
}

impl MacLearningTable {
    pub fn new() -> MacLearningTable {
        MacLearningTable::default()
    }

    fn partition(&self, sw: SwitchId) -> Option<SharedPartition> {
        self.switches.read().get(&sw).cloned()
    }

    fn partition_or_insert(&self, sw: SwitchId) -> SharedPartition {
        if let Some(p) = self.partition(sw) {
            return p;
        }
        self.switches.write().entry(sw).or_default().clone()
    }

    /// Register a new session for `sw`. Returns the number of live sessions.
    pub fn attach(&self, sw: SwitchId) -> usize {
        let mut switches = self.switches.write();
        let mut partition = switches.entry(sw).or_default().lock();
        partition.sessions += 1;
        partition.sessions
    }

    /// End one session of `sw`. When no session is left, everything learned on
    /// the switch is dropped and the number of discarded entries returned;
    /// otherwise nothing is discarded and the result is 0.
    pub fn release(&self, sw: SwitchId) -> usize {
        let mut switches = self.switches.write();
        let discarded = match switches.get(&sw) {
            Some(p) => {
                let mut partition = p.lock();
                partition.sessions = partition.sessions.saturating_sub(1);
                if partition.sessions > 0 {
                    return 0;
                }
                partition.hosts.len()
            }
            None => return 0,
        };
        switches.remove(&sw);
        discarded
    }

    /// Record that `mac` was seen on `port` of switch `sw`, returning the port it
    /// was previously learned on.
    pub fn observe(&self, sw: SwitchId, mac: MacAddr, port: PortNo) -> Option<PortNo> {
        self.partition_or_insert(sw).lock().hosts.insert(mac, port)
    }

    pub fn lookup(&self, sw: SwitchId, mac: MacAddr) -> Option<PortNo> {
        self.partition(sw)?.lock().hosts.get(&mac).copied()
    }

    /// Number of hosts learned on `sw`.
    pub fn known_hosts(&self, sw: SwitchId) -> usize {
        self.partition(sw).as_deref().map_or(0, |p| p.lock().hosts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MAC_A, MAC_B};
    use std::thread;

    #[test]
    fn distinct_macs_do_not_interfere() {
        let table = MacLearningTable::new();
        table.observe(1, MAC_A, 1);
        table.observe(1, MAC_B, 2);
        assert_eq!(table.lookup(1, MAC_A), Some(1));
        assert_eq!(table.lookup(1, MAC_B), Some(2));
        assert_eq!(table.known_hosts(1), 2);
    }

    #[test]
    fn last_writer_wins() {
        let table = MacLearningTable::new();
        assert_eq!(table.observe(1, MAC_A, 1), None);
        assert_eq!(table.observe(1, MAC_A, 4), Some(1));
        assert_eq!(table.lookup(1, MAC_A), Some(4));
        assert_eq!(table.known_hosts(1), 1);
    }

    #[test]
    fn switches_are_partitioned() {
        let table = MacLearningTable::new();
        table.observe(1, MAC_A, 1);
        table.observe(2, MAC_A, 7);
        assert_eq!(table.lookup(1, MAC_A), Some(1));
        assert_eq!(table.lookup(2, MAC_A), Some(7));
        assert_eq!(table.lookup(3, MAC_A), None);
    }

    #[test]
    fn releasing_a_switch_leaves_others() {
        let table = MacLearningTable::new();
        table.attach(1);
        table.attach(2);
        table.observe(1, MAC_A, 1);
        table.observe(1, MAC_B, 2);
        table.observe(2, MAC_A, 3);
        assert_eq!(table.release(1), 2);
        assert_eq!(table.lookup(1, MAC_A), None);
        assert_eq!(table.lookup(2, MAC_A), Some(3));
        assert_eq!(table.release(1), 0);
    }

    #[test]
    fn partition_outlives_all_but_its_last_session() {
        let table = MacLearningTable::new();
        assert_eq!(table.attach(5), 1);
        assert_eq!(table.attach(5), 2);
        table.observe(5, MAC_A, 3);

        assert_eq!(table.release(5), 0);
        assert_eq!(table.lookup(5, MAC_A), Some(3));

        assert_eq!(table.release(5), 1);
        assert_eq!(table.lookup(5, MAC_A), None);
        assert_eq!(table.known_hosts(5), 0);
    }

    #[test]
    fn unattached_partition_is_dropped_on_release() {
        let table = MacLearningTable::new();
        table.observe(1, MAC_A, 1);
        assert_eq!(table.release(1), 1);
        assert_eq!(table.lookup(1, MAC_A), None);
    }

    #[test]
    fn concurrent_switch_workers() {
        let table = Arc::new(MacLearningTable::new());
        let workers: Vec<_> = (1..=8u64)
            .map(|sw| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    for port in 1..=100u32 {
                        let mac = MacAddr::from(u64::from(port));
                        table.observe(sw, mac, port);
                        assert_eq!(table.lookup(sw, mac), Some(port));
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        for sw in 1..=8u64 {
            assert_eq!(table.known_hosts(sw), 100);
        }
    }
}
