//! [MODULE G] process surface, argument half (spec.md §6).
//!
//! Built with `clap`'s derive API, the way the teacher's own standalone example binaries
//! parse arguments (`examples/ip_anon/src/main.rs`: `#[derive(Parser)]` + `Args::parse()`) —
//! the teacher crate itself (`core/src/config.rs`) is driven by a TOML file instead, because
//! it targets a multi-core DPDK runtime with far more knobs than a getopts-style flag set can
//! carry; flowtap's surface is exactly spec.md §6's flat flag list, so a flag parser is the
//! right fit, not a config file. `-h`/`--help` and its exit-0 behavior come for free from
//! clap; flowtap does not re-implement it.

use clap::Parser;

#[derive(Parser, Debug)]
#[clap(name = "flowtap", about = "Passive TCP stream reconstructor")]
pub struct Cli {
    /// Per-flow byte cap (0 = unlimited).
    #[clap(short = 'b', value_name = "N")]
    pub byte_cap: Option<u64>,

    /// Console-only mode; implies -s.
    #[clap(short = 'c')]
    pub console: bool,

    /// Debug verbosity (>= 0; default 1).
    #[clap(short = 'd', value_name = "LEVEL", default_value = "1")]
    pub debug: u8,

    /// Cap on descriptors to use (>= reserved + 2).
    #[clap(short = 'f', value_name = "N")]
    pub max_descriptors: Option<usize>,

    /// Interface to capture from.
    #[clap(short = 'i', value_name = "IFACE")]
    pub interface: Option<String>,

    /// Disable promiscuous mode.
    #[clap(short = 'p')]
    pub no_promisc: bool,

    /// Read from trace file instead of live interface.
    #[clap(short = 'r', value_name = "FILE")]
    pub read_file: Option<String>,

    /// Replace non-printable bytes (not CR/LF) with `.`.
    #[clap(short = 's')]
    pub strip_non_printable: bool,

    /// Verbose (debug level 10).
    #[clap(short = 'v')]
    pub verbose: bool,

    /// BPF expression, wrapped as `(ip) and (<expr>)`.
    #[clap(value_name = "filter")]
    pub filter: Vec<String>,
}

impl Cli {
    /// Effective debug level: `-v` always wins over `-d` (spec.md §6).
    pub fn debug_level(&self) -> u8 {
        if self.verbose {
            10
        } else {
            self.debug
        }
    }

    /// Implied `-s`: console mode always strips non-printable bytes (spec.md §6: "`-c` ...
    /// implies `-s`").
    pub fn effective_strip_non_printable(&self) -> bool {
        self.console || self.strip_non_printable
    }

    /// The user's BPF expression, if any, joined back into a single string.
    pub fn filter_expr(&self) -> Option<String> {
        if self.filter.is_empty() {
            None
        } else {
            Some(self.filter.join(" "))
        }
    }
}
