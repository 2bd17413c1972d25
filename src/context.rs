//! Ties the per-run state together (spec.md §9 Redesign Flags: "Global singletons ... → one
//! explicit `Context` value constructed at startup and threaded through; no process-wide
//! mutable state").
//!
//! Replaces the original's `debug_level`, `bytes_per_flow`, `console_only`, and static flow
//! table / cache / clock with fields on one struct, owned by `main` and passed by mutable
//! reference down into the capture loop.

use pcap::Linktype;

use crate::clock::LogicalClock;
use crate::flow::FlowTable;
use crate::packet;
use crate::writer::{ArtifactWriter, ConsoleWriter};

pub enum Mode {
    Artifact(ArtifactWriter),
    Console(ConsoleWriter),
}

pub struct Context {
    pub table: FlowTable,
    pub clock: LogicalClock,
    pub mode: Mode,
}

impl Context {
    pub fn new(mode: Mode) -> Self {
        Context {
            table: FlowTable::new(),
            clock: LogicalClock::new(),
            mode,
        }
    }

    /// Runs one captured frame through the dissector and, on success, the active writer.
    /// Everything the dissector rejects is a per-packet drop (spec.md §7 band 3): logged, but
    /// never fatal.
    pub fn handle_packet(&mut self, linktype: Linktype, captured: &[u8], original_len: usize) {
        if captured.len() < original_len {
            log::trace!(
                "short capture: {} of {} original bytes",
                captured.len(),
                original_len
            );
        }

        match packet::dissect(linktype, captured) {
            Ok(seg) => match &mut self.mode {
                Mode::Console(writer) => writer.handle(&seg),
                Mode::Artifact(writer) => {
                    let _ = writer.handle(&mut self.table, &mut self.clock, seg);
                }
            },
            Err(err) => {
                log::log!(err.level(), "dropping packet: {}", err);
            }
        }
    }
}
