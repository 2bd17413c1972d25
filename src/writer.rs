//! [MODULE E] Writer (spec.md §4.E).
//!
//! No in-memory reassembly buffer: every segment is seeked-and-written directly into its
//! flow's artifact at `seq - isn`. Grounded in the teacher's "no surprises" error-handling
//! style — transient I/O failures are logged and the flow stays live, matching
//! `core/src/conntrack/mod.rs`'s `log::error!`-then-continue pattern rather than propagating
//! through `?` and killing the run.

use std::io::{Seek, SeekFrom, Write};

use crate::cache::ArtifactCache;
use crate::clock::LogicalClock;
use crate::flow::{FlowKey, FlowTable};
use crate::packet;

/// Pre-ISN wrap guard width (spec.md §4.E step 3, §9 Open Questions).
///
/// A 64 KiB window below zero is what the original uses. spec.md §9 notes this is too narrow
/// for high-bandwidth captures with TCP window scaling, where legitimately-reordered segments
/// more than 64 KiB before the first-seen sequence would be misread as valid and placed at
/// huge offsets. flowtap widens it to 2 GiB (half the sequence space) — the largest width that
/// still unambiguously distinguishes "slightly before the ISN" from "a full wrap ahead" per
/// spec.md §9's suggested alternative, at the cost of tolerating reordering no real TCP stack
/// would produce this early in a stream. See DESIGN.md for the decision record.
const PRE_ISN_WRAP_GUARD: u32 = 0x8000_0000;

/// What happens to a payload-bearing segment once it's been dissected.
pub enum Outcome {
    Written { bytes: usize },
    Dropped(&'static str),
}

/// Seek-and-write artifact writer, bounded by the artifact cache (spec.md §4.D/§4.E).
pub struct ArtifactWriter {
    cache: ArtifactCache,
    byte_cap: Option<u64>,
    strip_non_printable: bool,
}

impl ArtifactWriter {
    pub fn new(cache: ArtifactCache, byte_cap: Option<u64>, strip_non_printable: bool) -> Self {
        ArtifactWriter {
            cache,
            byte_cap,
            strip_non_printable,
        }
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Handles one TCP/IPv4 segment (spec.md §4.E steps 1-10).
    pub fn handle(&mut self, table: &mut FlowTable, clock: &mut LogicalClock, seg: packet::Segment<'_>) -> Outcome {
        let key = FlowKey::new(seg.src_addr, seg.dst_addr, seg.src_port, seg.dst_port);
        let record = table.find_or_create(key, seg.seq, clock);

        if record.finished {
            return Outcome::Dropped("finished");
        }

        let raw_offset = seg.seq.wrapping_sub(record.isn);
        if raw_offset >= PRE_ISN_WRAP_GUARD {
            log::debug!(
                "{}: dropping pre-ISN wrap-suspect segment at offset {:#x}",
                key,
                raw_offset
            );
            return Outcome::Dropped("pre_isn_wrap");
        }
        let offset = raw_offset as u64;

        let mut length = seg.payload.len() as u64;
        if let Some(cap) = self.byte_cap {
            if offset > cap {
                log::debug!("{}: dropping segment beyond byte cap ({} > {})", key, offset, cap);
                return Outcome::Dropped("beyond_cap");
            }
        }

        if record.handle.is_none() {
            if let Err(err) = self.cache.open(table, key) {
                log::error!("{}: open failed, flow finished: {}", key, err);
                return Outcome::Dropped("open_failed");
            }
        }

        let payload: std::borrow::Cow<'_, [u8]> = if self.strip_non_printable {
            std::borrow::Cow::Owned(packet::filter_non_printable(seg.payload))
        } else {
            std::borrow::Cow::Borrowed(seg.payload)
        };

        let record = table.get_mut(&key).expect("just created or opened");

        let mut will_finish = false;
        if let Some(cap) = self.byte_cap {
            if offset + length > cap {
                length = cap - offset;
                will_finish = true;
            }
        }

        let written = {
            let handle = record.handle.as_mut().expect("opened above");
            if offset != handle.pos {
                if let Err(err) = handle.file.seek(SeekFrom::Start(offset)) {
                    log::error!("{}: seek to {} failed: {}", key, offset, err);
                    return Outcome::Dropped("seek_failed");
                }
            }
            let slice = &payload[..length as usize];
            match handle.file.write(slice) {
                Ok(n) => {
                    if n < slice.len() {
                        log::warn!(
                            "{}: partial write, {} of {} bytes",
                            key,
                            n,
                            slice.len()
                        );
                    }
                    if let Err(err) = handle.file.flush() {
                        log::warn!("{}: flush failed: {}", key, err);
                    }
                    handle.pos = offset + n as u64;
                    n
                }
                Err(err) => {
                    // Transient write error: log, but don't mark the flow finished (spec.md §7
                    // band 4).
                    log::warn!("{}: write failed: {}", key, err);
                    0
                }
            }
        };

        if will_finish {
            record.finished = true;
            self.cache.close(table, &key);
        }

        Outcome::Written { bytes: written }
    }
}

/// Console-mode writer (spec.md §4.E "Console mode"): no cache, no offsets, no per-flow cap.
/// Prints `flow_name: <payload>\n` for every accepted TCP segment.
pub struct ConsoleWriter {
    strip_non_printable: bool,
}

impl ConsoleWriter {
    pub fn new(strip_non_printable: bool) -> Self {
        ConsoleWriter { strip_non_printable }
    }

    pub fn handle(&self, seg: &packet::Segment<'_>) {
        let key = FlowKey::new(seg.src_addr, seg.dst_addr, seg.src_port, seg.dst_port);
        let name = crate::filename::format(&key);
        let payload: std::borrow::Cow<'_, [u8]> = if self.strip_non_printable {
            std::borrow::Cow::Owned(packet::filter_non_printable(seg.payload))
        } else {
            std::borrow::Cow::Borrowed(seg.payload)
        };
        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "{}: ", name);
        let _ = stdout.write_all(&payload);
        let _ = writeln!(stdout);
    }
}
