//! [MODULE C] Flow table (spec.md §3, §4.C).
//!
//! The teacher's connection tracker (`core/src/conntrack/mod.rs`) maps a `ConnId` to a `Conn`
//! with a `hashlink::LinkedHashMap` so it can evict by insertion/access order on its own. Here
//! the ordering concern is spec.md's artifact cache instead (§4.D), so the flow table itself
//! is the "ordinary mapping from flow key to owning flow record" the Redesign Flags in spec.md
//! §9 call for — no chaining, no raw pointers, just `std::collections::HashMap`.

use std::collections::HashMap;
use std::fs::File;
use std::net::Ipv4Addr;

use crate::clock::LogicalClock;

/// An immutable, directional four-tuple (spec.md §3).
///
/// `(A, B)` and `(B, A)` hash and compare distinctly: the flow key carries no normalization of
/// source vs. destination, unlike the teacher's `ConnId` (`core/src/conntrack/conn_id.rs`),
/// which deliberately collapses direction. Each direction of a TCP connection is its own flow
/// here and gets its own artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
}

impl FlowKey {
    pub fn new(src_addr: Ipv4Addr, dst_addr: Ipv4Addr, src_port: u16, dst_port: u16) -> Self {
        FlowKey {
            src_addr,
            dst_addr,
            src_port,
            dst_port,
        }
    }
}

impl std::fmt::Display for FlowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.src_addr, self.src_port, self.dst_addr, self.dst_port
        )
    }
}

/// An open artifact plus the writer's idea of the current file position (spec.md §3: "an
/// optional open output artifact plus the current write position").
pub struct OpenHandle {
    pub file: File,
    pub pos: u64,
}

/// Persistent per-flow state, created on the first payload-bearing segment and retained for
/// the lifetime of the run (spec.md §3).
pub struct FlowRecord {
    pub key: FlowKey,
    /// Sequence number of the first payload byte observed for this flow; anchors every
    /// subsequent offset computation.
    pub isn: u32,
    pub handle: Option<OpenHandle>,
    /// Whether the artifact was created earlier in this run — controls create-vs-reopen mode
    /// on the next open.
    pub existed: bool,
    /// Sticky: once set, no further bytes for this flow are ever written (spec.md §4.E step
    /// 10, §8 "FINISHED is sticky").
    pub finished: bool,
    pub last_access: u64,
}

impl FlowRecord {
    fn new(key: FlowKey, isn: u32, last_access: u64) -> Self {
        FlowRecord {
            key,
            isn,
            handle: None,
            existed: false,
            finished: false,
            last_access,
        }
    }
}

/// Maps flow keys to their persistent records. Never shrinks during a run (spec.md §3: "A flow
/// record is never destroyed during a run; the flow table grows monotonically").
#[derive(Default)]
pub struct FlowTable {
    records: HashMap<FlowKey, FlowRecord>,
}

impl FlowTable {
    pub fn new() -> Self {
        FlowTable {
            records: HashMap::new(),
        }
    }

    /// Looks up `key`, bumping its logical-clock access time on a hit (spec.md §4.C `find`).
    pub fn find_mut(&mut self, key: &FlowKey, clock: &mut LogicalClock) -> Option<&mut FlowRecord> {
        if let Some(record) = self.records.get_mut(key) {
            record.last_access = clock.tick();
            Some(record)
        } else {
            None
        }
    }

    /// Finds `key`'s record, creating it with `isn` set to the first-seen sequence number if
    /// absent (spec.md §4.C `create`, §4.E step 1: "the *first observed payload* sequence
    /// becomes the ISN").
    pub fn find_or_create(&mut self, key: FlowKey, isn: u32, clock: &mut LogicalClock) -> &mut FlowRecord {
        if self.records.contains_key(&key) {
            let record = self.records.get_mut(&key).expect("just checked");
            record.last_access = clock.tick();
            record
        } else {
            self.records.insert(key, FlowRecord::new(key, isn, clock.tick()));
            self.records.get_mut(&key).expect("just inserted")
        }
    }

    pub fn get_mut(&mut self, key: &FlowKey) -> Option<&mut FlowRecord> {
        self.records.get_mut(key)
    }

    pub fn get(&self, key: &FlowKey) -> Option<&FlowRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(port: u16) -> FlowKey {
        FlowKey::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2), port, 80)
    }

    #[test]
    fn create_ticks_the_clock_exactly_once() {
        let mut table = FlowTable::new();
        let mut clock = LogicalClock::new();
        let record = table.find_or_create(key(1), 1000, &mut clock);
        assert_eq!(record.last_access, 1);
        assert_eq!(record.isn, 1000);
    }

    #[test]
    fn repeated_create_calls_are_idempotent_lookups() {
        let mut table = FlowTable::new();
        let mut clock = LogicalClock::new();
        table.find_or_create(key(1), 1000, &mut clock);
        let record = table.find_or_create(key(1), 9999, &mut clock);
        // ISN sticks to the first-observed sequence; later calls never overwrite it.
        assert_eq!(record.isn, 1000);
        assert_eq!(record.last_access, 2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn forward_and_reverse_directions_are_distinct_keys() {
        let forward = FlowKey::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2), 4000, 80);
        let reverse = FlowKey::new(Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 1), 80, 4000);
        assert_ne!(forward, reverse);
    }
}
