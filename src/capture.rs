//! [MODULE F] Capture driver (spec.md §4.F).
//!
//! Owns either a live interface or an offline trace handle, installs the BPF filter, and
//! drives the single-threaded, callback-style packet loop: each frame runs the full
//! dissect → flow-table → cache → write chain to completion before the next one is read, just
//! like the teacher's `core/src/runtime/offline.rs` loop
//! (`while let Ok(frame) = cap.next() { ... }`), generalized here to also cover a live handle
//! instead of only a recorded trace — the teacher keeps those as separate `OnlineRuntime` /
//! `OfflineRuntime` types built on an entirely different (DPDK poll-mode) transport for the
//! online case. flowtap uses `pcap` for both, as the teacher's own smaller example binaries do
//! (e.g. `examples/ip_anon`, `ssh_standalone`).

use pcap::{Capture, Linktype};

use crate::context::Context;

pub enum Source {
    Live(Capture<pcap::Active>),
    Offline(Capture<pcap::Offline>),
}

impl Source {
    pub fn open_live(iface: &str, promiscuous: bool) -> anyhow::Result<Self> {
        let cap = Capture::from_device(iface)?
            .promisc(promiscuous)
            .snaplen(65535)
            .timeout(1000)
            .open()?;
        Ok(Source::Live(cap))
    }

    pub fn open_offline(path: &str) -> anyhow::Result<Self> {
        let cap = Capture::from_file(path)?;
        Ok(Source::Offline(cap))
    }

    pub fn datalink(&self) -> Linktype {
        match self {
            Source::Live(c) => c.get_datalink(),
            Source::Offline(c) => c.get_datalink(),
        }
    }

    /// Installs `(ip) and (<user filter>)`, or just `ip` with no user filter (spec.md §4.F).
    ///
    /// Some drivers suppress all traffic on certain null/loopback-only interfaces when any
    /// filter at all is installed (the original's `NEED_PPHACK` special case); `pcap`'s
    /// uniform datalink handling means flowtap does not need a device-specific workaround here
    /// (see DESIGN.md), so the filter is always installed.
    pub fn install_filter(&mut self, user_filter: Option<&str>) -> anyhow::Result<()> {
        let program = match user_filter {
            Some(expr) if !expr.is_empty() => format!("(ip) and ({})", expr),
            _ => "ip".to_string(),
        };
        match self {
            Source::Live(c) => c.filter(&program, true)?,
            Source::Offline(c) => c.filter(&program, true)?,
        }
        Ok(())
    }

    fn next(&mut self) -> Result<(&[u8], usize), pcap::Error> {
        match self {
            Source::Live(c) => c.next().map(|p| (p.data, p.header.len as usize)),
            Source::Offline(c) => c.next().map(|p| (p.data, p.header.len as usize)),
        }
    }
}

/// Drives the capture loop until the source is exhausted (offline) or the cancellation flag
/// is set (live, via the signal handler installed by the process surface).
pub fn run(source: &mut Source, ctx: &mut Context, running: &std::sync::atomic::AtomicBool) {
    let linktype = source.datalink();
    loop {
        if !running.load(std::sync::atomic::Ordering::Relaxed) {
            log::info!("capture loop stopping on signal");
            break;
        }
        match source.next() {
            Ok((data, original_len)) => {
                ctx.handle_packet(linktype, data, original_len);
            }
            Err(pcap::Error::TimeoutExpired) => continue,
            Err(pcap::Error::NoMorePackets) => {
                log::info!("offline trace exhausted");
                break;
            }
            Err(err) => {
                log::warn!("capture read error: {}", err);
                break;
            }
        }
    }
}

/// Validates the datalink type once at start-up (spec.md §4.A: "Unknown datalink type is a
/// fatal startup error").
pub fn require_supported_linktype(linktype: Linktype) -> anyhow::Result<()> {
    if crate::packet::link::is_supported(linktype) {
        Ok(())
    } else {
        anyhow::bail!("unsupported datalink type: {:?}", linktype)
    }
}
