//! [MODULE D] Artifact cache — the heart of the system (spec.md §4.D).
//!
//! Bounds the number of simultaneously open artifacts to `M` and evicts with a round-robin
//! cursor that gets turned into approximate LRU by a periodic full sort, exactly as spec.md
//! describes it. There is no existing teacher subsystem that does this precise thing — the
//! teacher's connection table (`core/src/conntrack/mod.rs` + `timerwheel.rs`) bounds its table
//! by a hard connection cap and evicts by *inactivity timeout*, not by a fixed-size
//! open-resource pool — so this module is grounded on spec.md §4.D itself, built in the
//! teacher's error-handling idiom (`anyhow`/`thiserror`, explicit `Result`, `log::` on every
//! state transition that spec.md §7 calls out).

use std::fs::{File, OpenOptions};
use std::io;

use crate::error::OpenError;
use crate::filename;
use crate::flow::{FlowKey, FlowTable, OpenHandle};

/// Reserved descriptors: stdin, stdout, stderr, the capture handle, and one slack slot for the
/// open-before-close discipline in `ArtifactCache::open` (spec.md §4.D).
pub const RESERVED_DESCRIPTORS: usize = 5;

/// A fixed-capacity pool of open artifacts, sized to `M` slots.
pub struct ArtifactCache {
    /// Each slot holds the key of the flow currently occupying it, or `None` if empty.
    slots: Vec<Option<FlowKey>>,
    /// Round-robin cursor; advances one slot per open.
    cursor: usize,
}

impl ArtifactCache {
    /// Creates a cache with `capacity` slots (`M` in spec.md §4.D).
    pub fn new(capacity: usize) -> Self {
        ArtifactCache {
            slots: vec![None; capacity],
            cursor: 0,
        }
    }

    /// Current value of `M`: monotone non-increasing after startup (spec.md §4.D).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Opens (or re-opens) the artifact for `key`, installing it into a cache slot.
    ///
    /// Preconditions (enforced by the writer, spec.md §4.E step 5): `key`'s record has
    /// `handle == None` and `finished == false`.
    pub fn open(&mut self, table: &mut FlowTable, key: FlowKey) -> Result<(), OpenError> {
        loop {
            let existed = table
                .get_mut(&key)
                .map(|r| r.existed)
                .unwrap_or(false);
            match open_artifact_file(&key, existed) {
                Ok(file) => {
                    if let Some(record) = table.get_mut(&key) {
                        record.handle = Some(OpenHandle { file, pos: 0 });
                    }
                    break;
                }
                Err(io_err) => match OpenError::classify(io_err) {
                    OpenError::TooManyOpenFiles => {
                        log::debug!("open {} hit EMFILE/ENFILE, contracting cache", key);
                        self.contract(table)?;
                        continue;
                    }
                    other => {
                        log::error!("unrecoverable open failure for {}: {}", key, other);
                        if let Some(record) = table.get_mut(&key) {
                            record.finished = true;
                        }
                        return Err(other);
                    }
                },
            }
        }

        // Advance the cursor; on wraparound, turn round-robin into approximate LRU by sorting
        // the whole slot array by last_access.
        self.cursor += 1;
        if self.cursor >= self.slots.len() {
            self.sort_by_last_access(table);
            self.cursor = 0;
        }

        if let Some(evicted) = self.slots[self.cursor] {
            if evicted != key {
                log::debug!("cache slot {} evicts {} for {}", self.cursor, evicted, key);
                close_handle(table, &evicted);
            }
        }

        self.slots[self.cursor] = Some(key);
        if let Some(record) = table.get_mut(&key) {
            record.existed = true;
        }
        Ok(())
    }

    /// Closes `key`'s artifact (if open) and frees its cache slot. Used by the writer when a
    /// flow reaches its byte cap and becomes FINISHED (spec.md §4.E step 10).
    pub fn close(&mut self, table: &mut FlowTable, key: &FlowKey) {
        for slot in self.slots.iter_mut() {
            if slot.as_ref() == Some(key) {
                *slot = None;
                break;
            }
        }
        close_handle(table, key);
    }

    /// The contract procedure (spec.md §4.D): invoked when the OS refuses an open even though
    /// we believed we had capacity. Permanently lowers `M` by one.
    fn contract(&mut self, table: &mut FlowTable) -> Result<(), OpenError> {
        if self.slots.is_empty() {
            return Err(OpenError::NoSlotsLeft);
        }
        self.sort_by_last_access(table);
        if let Some(oldest) = self.slots[0].take() {
            log::warn!("contracting artifact cache, closing {}", oldest);
            close_handle(table, &oldest);
        }
        self.slots.remove(0);
        self.cursor = 0;
        if self.slots.is_empty() {
            return Err(OpenError::NoSlotsLeft);
        }
        Ok(())
    }

    fn sort_by_last_access(&mut self, table: &FlowTable) {
        self.slots.sort_by_key(|slot| match slot {
            Some(key) => table.get(key).map(|r| r.last_access).unwrap_or(0),
            None => 0,
        });
    }
}

fn close_handle(table: &mut FlowTable, key: &FlowKey) {
    if let Some(record) = table.get_mut(key) {
        if let Some(handle) = record.handle.take() {
            drop(handle.file);
        }
    }
}

fn open_artifact_file(key: &FlowKey, existed: bool) -> io::Result<File> {
    let name = filename::format(key);
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(!existed)
        .open(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::LogicalClock;
    use serial_test::serial;
    use std::net::Ipv4Addr;

    fn key(port: u16) -> FlowKey {
        FlowKey::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2), port, 80)
    }

    #[test]
    #[serial]
    fn open_then_close_frees_the_slot() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let mut table = FlowTable::new();
        let mut clock = LogicalClock::new();
        let mut cache = ArtifactCache::new(4);

        let k = key(1);
        table.find_or_create(k, 1000, &mut clock);
        cache.open(&mut table, k).unwrap();
        assert_eq!(cache.open_count(), 1);

        cache.close(&mut table, &k);
        assert_eq!(cache.open_count(), 0);
        assert!(table.get(&k).unwrap().handle.is_none());
    }

    #[test]
    #[serial]
    fn capacity_bounds_simultaneous_opens() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let mut table = FlowTable::new();
        let mut clock = LogicalClock::new();
        let mut cache = ArtifactCache::new(2);

        for port in [1, 2, 3, 4] {
            let k = key(port);
            table.find_or_create(k, 1000, &mut clock);
            cache.open(&mut table, k).unwrap();
            assert!(cache.open_count() <= 2);
        }
        assert_eq!(cache.capacity(), 2);
    }
}
