//! Passive TCP stream reconstructor.
//!
//! Demultiplexes TCP flows from a live interface or a recorded trace and places each flow's
//! payload bytes directly into a per-flow artifact file at their byte offset in the stream.
//! There is no in-memory reassembly buffer: every segment is seeked to `seq - isn` and written
//! in place. Out-of-order segments land out of order in the same file and simply fill in the
//! gaps they were missing; duplicate and overlapping segments overwrite rather than append.
//!
//! No fragment reassembly, checksum verification, retransmission dedup, TCP state tracking,
//! bidirectional merging, or application-layer parsing — this is a byte placement tool, not a
//! protocol analyzer.

pub mod cache;
pub mod capture;
pub mod clock;
pub mod cli;
pub mod context;
pub mod error;
pub mod filename;
pub mod flow;
pub mod packet;
pub mod writer;
