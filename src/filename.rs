//! Artifact filename formatting (spec.md §6).
//!
//! The original keeps a small static ring of formatted name buffers so several names can be
//! live in one log line at once without stomping each other — a single-thread-only trick with
//! no semantic content (spec.md §9 Redesign Flags). flowtap just returns an owned `String`;
//! the caller holds it as long as it needs to.

use crate::flow::FlowKey;

/// Formats `AAA.AAA.AAA.AAA.PPPPP-BBB.BBB.BBB.BBB.QQQQQ`: dotted octets zero-padded to three
/// digits, ports zero-padded to five digits, ASCII-deterministic and free of any separator
/// other than `.` and `-`.
pub fn format(key: &FlowKey) -> String {
    let [a0, a1, a2, a3] = key.src_addr.octets();
    let [b0, b1, b2, b3] = key.dst_addr.octets();
    format!(
        "{:03}.{:03}.{:03}.{:03}.{:05}-{:03}.{:03}.{:03}.{:03}.{:05}",
        a0, a1, a2, a3, key.src_port, b0, b1, b2, b3, key.dst_port
    )
}
