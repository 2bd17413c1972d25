//! Typed, recoverable failures internal to the core.
//!
//! Setup-time failures that the process cannot run without (capture open, filter compile,
//! descriptor-limit queries) are surfaced as `anyhow::Error` and handled at the top of `main`;
//! these are the failures the core itself needs to branch on.

use thiserror::Error;

/// Reasons a packet is dropped before it reaches the writer.
///
/// Every variant corresponds to a row in spec.md §7 band 3 ("per-packet drop"). None of these
/// are fatal; the caller logs and moves on to the next frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DissectError {
    #[error("captured length shorter than link header")]
    TruncatedLinkHeader,
    #[error("unsupported or unrecognized link-layer payload")]
    NotIp,
    #[error("captured length shorter than minimum IPv4 header")]
    TruncatedIpHeader,
    #[error("not an IPv4 datagram")]
    NotIpv4,
    #[error("not a TCP segment")]
    NotTcp,
    #[error("IPv4 header length exceeds total length")]
    BadIpHeaderLen,
    #[error("IPv4 fragment with non-zero offset")]
    Fragment,
    #[error("captured length shorter than minimum TCP header")]
    TruncatedTcpHeader,
    #[error("TCP header length exceeds segment length")]
    BadTcpHeaderLen,
    #[error("segment carries no payload (pure ACK)")]
    NoPayload,
}

impl DissectError {
    /// Log level for this drop reason (spec.md §7 band 3: "logged at verbosity ≥2 or ≥6
    /// depending on kind"). Routine, expected-in-normal-traffic drops (non-IP/non-TCP chatter,
    /// fragments, pure ACKs) log at `trace`; malformed or truncated headers, which point at a
    /// capture problem rather than ordinary traffic shape, log at `debug`.
    pub fn level(&self) -> log::Level {
        match self {
            DissectError::NotIp
            | DissectError::NotIpv4
            | DissectError::NotTcp
            | DissectError::Fragment
            | DissectError::NoPayload => log::Level::Trace,
            DissectError::TruncatedLinkHeader
            | DissectError::TruncatedIpHeader
            | DissectError::BadIpHeaderLen
            | DissectError::TruncatedTcpHeader
            | DissectError::BadTcpHeaderLen => log::Level::Debug,
        }
    }
}

/// Reasons the writer drops an otherwise well-formed payload-bearing segment.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDrop {
    #[error("flow already finished")]
    Finished,
    #[error("offset within pre-ISN wrap-guard window")]
    PreIsnWrap,
    #[error("offset beyond per-flow byte cap")]
    BeyondCap,
}

/// Failure opening (or re-opening) a flow's artifact.
#[derive(Error, Debug)]
pub enum OpenError {
    #[error("too many open files")]
    TooManyOpenFiles,
    #[error("artifact cache has no slots left after contraction")]
    NoSlotsLeft,
    #[error("unrecoverable open failure: {0}")]
    Unrecoverable(#[source] std::io::Error),
}

impl OpenError {
    /// Classifies a raw `io::Error` from `OpenOptions::open`.
    ///
    /// Spec.md §4.D calls out "either of the two standard errnos" for too-many-open-files:
    /// `EMFILE` (this process is at its descriptor limit) and `ENFILE` (the whole system is).
    pub fn classify(err: std::io::Error) -> Self {
        use nix::errno::Errno;
        match err.raw_os_error().map(Errno::from_i32) {
            Some(Errno::EMFILE) | Some(Errno::ENFILE) => OpenError::TooManyOpenFiles,
            _ => OpenError::Unrecoverable(err),
        }
    }
}
