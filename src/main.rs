//! [MODULE G] Process surface (spec.md §6): argument parsing, start-up sequencing, and exit
//! codes. Wires every other module together the way the teacher's `OnlineRuntime::new`
//! (`core/src/runtime/online.rs`) sequences its own start-up — signal handler installed early,
//! fatal setup failures bubbled with `?`/`.expect()` rather than handled inline — generalized
//! here from a DPDK port/mempool sequence to a `pcap` capture handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use flowtap::cache::{ArtifactCache, RESERVED_DESCRIPTORS};
use flowtap::capture::{self, Source};
use flowtap::cli::Cli;
use flowtap::context::{Context, Mode};
use flowtap::writer::{ArtifactWriter, ConsoleWriter};

fn main() {
    // `Cli::parse()` would call `clap::Error::exit()` directly, which exits 2 on a usage
    // error; spec.md §6 wants exit 1 for an argument error (0 is reserved for `-h`/`--help`),
    // so the error is printed and translated to our own exit code by hand.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = match err.kind {
                clap::ErrorKind::DisplayHelp | clap::ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    };
    init_logging(cli.debug_level());

    if let Err(err) = run(cli) {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
}

fn init_logging(debug_level: u8) {
    let filter = match debug_level {
        0 => log::LevelFilter::Off,
        1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3..=4 => log::LevelFilter::Info,
        5..=9 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(filter).init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let running_for_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_for_handler.store(false, Ordering::Relaxed);
    })?;

    let mut source = match (&cli.interface, &cli.read_file) {
        (_, Some(path)) => Source::open_offline(path)?,
        (Some(iface), None) => Source::open_live(iface, !cli.no_promisc)?,
        (None, None) => anyhow::bail!("one of -i <iface> or -r <file> is required"),
    };

    // Drop privileges immediately once the capture handle is open, before any further setup
    // (datalink lookup, filter compile) runs with no further need for elevated rights.
    drop_privileges()?;

    let linktype = source.datalink();
    capture::require_supported_linktype(linktype)?;
    source.install_filter(cli.filter_expr().as_deref())?;

    let mode = if cli.console {
        Mode::Console(ConsoleWriter::new(cli.effective_strip_non_printable()))
    } else {
        let capacity = resolve_descriptor_capacity(cli.max_descriptors)?;
        log::info!("artifact cache capacity: {} descriptors", capacity);
        let cache = ArtifactCache::new(capacity);
        // spec.md §6: "-b N: Per-flow byte cap (0 = unlimited)" — an explicit `-b 0` must not
        // be passed through as a real cap of zero bytes.
        let byte_cap = cli.byte_cap.filter(|&cap| cap != 0);
        Mode::Artifact(ArtifactWriter::new(
            cache,
            byte_cap,
            cli.effective_strip_non_printable(),
        ))
    };

    let mut ctx = Context::new(mode);
    capture::run(&mut source, &mut ctx, &running);
    Ok(())
}

/// Resolves `M`, the artifact cache's starting capacity (spec.md §4.D, §6 `-f`).
///
/// Raises the process's open-file-descriptor soft limit to its hard limit first (so a run
/// isn't starved by an inherited shell default), then reserves descriptors for everything
/// that isn't an artifact, the way the original sizes its file-descriptor table against
/// `getrlimit(RLIMIT_NOFILE)` at start-up. `RESERVED_DESCRIPTORS` (5) already covers stdin,
/// stdout, stderr, the capture handle, and the cache's own open-before-close slack slot —
/// spec.md §4.D's "a value of 5 is appropriate" — so it is the only reservation subtracted
/// here.
fn resolve_descriptor_capacity(requested: Option<usize>) -> anyhow::Result<usize> {
    use nix::sys::resource::{Resource, getrlimit, setrlimit};

    let (soft, hard) = getrlimit(Resource::RLIMIT_NOFILE)?;
    if soft < hard {
        if let Err(err) = setrlimit(Resource::RLIMIT_NOFILE, hard, hard) {
            log::warn!("could not raise RLIMIT_NOFILE to {}: {}", hard, err);
        }
    }
    let ceiling = std::cmp::max(soft, hard) as usize;

    let available = ceiling.saturating_sub(RESERVED_DESCRIPTORS);
    let capacity = match requested {
        Some(n) => std::cmp::min(n, available),
        None => available,
    };

    if capacity < 2 {
        anyhow::bail!(
            "descriptor budget too small: need at least 2 artifact slots, have {}",
            capacity
        );
    }
    Ok(capacity)
}

/// Drops root privileges right after the capture handle is opened: real and effective uid are
/// set equal to the real uid, exactly as the original's `main()` does immediately after
/// `pcap_open_live`/`pcap_open_offline` ("we don't need them any more"). A no-op under a
/// non-setuid binary, where real and effective uid already match.
fn drop_privileges() -> anyhow::Result<()> {
    use nix::unistd::{getuid, setuid};

    setuid(getuid())?;
    Ok(())
}
