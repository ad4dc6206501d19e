//! Flush strategy testing ground.
//!
//! Has a number of scenarios and a `main` for invoking these by number. Each
//! scenario builds a candidate set, runs the strategy over it and logs the
//! resulting flush order. Handy for eyeballing threshold changes without a
//! live node.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::info;

use indexnode::config::IndexNodeConf;
use indexnode::flush::memory_flush::{Config, MemoryFlush};
use indexnode::flush::{
    DiskGain, FlushContext, FlushHandler, FlushStrategy, FlushTarget, MemoryGain, TlsStats,
    TlsStatsMap,
};
use utils::logging;
use utils::serial::SerialNum;

const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * MB;

struct SimHandler {
    name: String,
}

impl FlushHandler for SimHandler {
    fn name(&self) -> &str {
        &self.name
    }
}

struct SimTarget {
    name: String,
    memory_gain: MemoryGain,
    disk_gain: DiskGain,
    flushed_serial: SerialNum,
    last_flush_time: Option<SystemTime>,
    urgent: bool,
}

impl SimTarget {
    fn new(name: &str) -> SimTarget {
        SimTarget {
            name: name.to_string(),
            memory_gain: MemoryGain::default(),
            disk_gain: DiskGain::default(),
            flushed_serial: SerialNum(0),
            last_flush_time: None,
            urgent: false,
        }
    }

    fn memory(mut self, before: u64, after: u64) -> SimTarget {
        self.memory_gain = MemoryGain::new(before, after);
        self
    }

    fn disk(mut self, before: u64, after: u64) -> SimTarget {
        self.disk_gain = DiskGain::new(before, after);
        self
    }

    fn flushed(mut self, serial: u64, ago: Duration, now: SystemTime) -> SimTarget {
        self.flushed_serial = SerialNum(serial);
        self.last_flush_time = Some(now - ago);
        self
    }

    fn urgent(mut self) -> SimTarget {
        self.urgent = true;
        self
    }
}

impl FlushTarget for SimTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn approx_memory_gain(&self) -> MemoryGain {
        self.memory_gain
    }

    fn approx_disk_gain(&self) -> DiskGain {
        self.disk_gain
    }

    fn flushed_serial(&self) -> SerialNum {
        self.flushed_serial
    }

    fn last_flush_time(&self) -> Option<SystemTime> {
        self.last_flush_time
    }

    fn need_urgent_flush(&self) -> bool {
        self.urgent
    }
}

/// Collects the candidate set for one scenario.
struct ScenarioBuilder {
    handler: Arc<SimHandler>,
    contexts: Vec<FlushContext>,
    tls_stats: TlsStatsMap,
}

impl ScenarioBuilder {
    fn new(handler: &str) -> ScenarioBuilder {
        ScenarioBuilder {
            handler: Arc::new(SimHandler {
                name: handler.to_string(),
            }),
            contexts: Vec::new(),
            tls_stats: TlsStatsMap::default(),
        }
    }

    fn tls(&mut self, bytes: u64, first_serial: u64, last_serial: u64) {
        self.tls_stats.insert(
            self.handler.name(),
            TlsStats::new(bytes, SerialNum(first_serial), SerialNum(last_serial)),
        );
    }

    fn target(&mut self, target: SimTarget, last_serial: u64) {
        self.contexts.push(FlushContext::new(
            self.handler.clone(),
            Arc::new(target),
            SerialNum(last_serial),
        ));
    }
}

fn report(title: &str, ranked: &[FlushContext]) {
    if ranked.is_empty() {
        info!("{title}: nothing to flush");
        return;
    }
    for (pos, ctx) in ranked.iter().enumerate() {
        info!(
            "{title}: {}. {} (flushed serial {} of {})",
            pos + 1,
            ctx.name(),
            ctx.target().flushed_serial(),
            ctx.last_serial()
        );
    }
}

// A sub-database whose attribute vectors and memory index piled up unflushed
// changes; the per-target threshold singles out the memory index.
fn memory_pressure(base: Config) -> anyhow::Result<()> {
    let now = SystemTime::now();
    let mut scenario = ScenarioBuilder::new("docs");
    scenario.target(SimTarget::new("memoryindex").memory(900 * MB, 100 * MB), 120);
    scenario.target(SimTarget::new("attribute.rank").memory(200 * MB, 150 * MB), 120);
    scenario.target(SimTarget::new("documentstore").memory(50 * MB, 40 * MB), 120);

    let flush = MemoryFlush::new(Config {
        max_memory_gain: 512 * MB,
        ..base
    })?;
    report(
        "memory pressure",
        &flush.flush_targets(&scenario.contexts, &scenario.tls_stats, now),
    );
    Ok(())
}

// A document store that accumulated removed documents on disk; rewriting it
// would reclaim more than the bloat factor allows.
fn disk_bloat(base: Config) -> anyhow::Result<()> {
    let now = SystemTime::now();
    let mut scenario = ScenarioBuilder::new("docs");
    scenario.target(SimTarget::new("documentstore").disk(10 * GB, 6 * GB), 300);
    scenario.target(SimTarget::new("attribute.price").disk(2 * GB, 1900 * MB), 300);

    let flush = MemoryFlush::new(Config {
        disk_bloat_factor: 0.25,
        ..base
    })?;
    report(
        "disk bloat",
        &flush.flush_targets(&scenario.contexts, &scenario.tls_stats, now),
    );
    Ok(())
}

// Nothing is under resource pressure, but two targets have not been flushed
// for longer than the age limit.
fn stale_age(base: Config) -> anyhow::Result<()> {
    let now = SystemTime::now();
    let mut scenario = ScenarioBuilder::new("docs");
    scenario.target(
        SimTarget::new("attribute.rank").flushed(80, Duration::from_secs(3 * 60 * 60), now),
        200,
    );
    scenario.target(
        SimTarget::new("attribute.price").flushed(150, Duration::from_secs(30 * 60), now),
        200,
    );
    scenario.target(
        SimTarget::new("documentstore").flushed(40, Duration::from_secs(7 * 60 * 60), now),
        200,
    );

    let flush = MemoryFlush::new(Config {
        max_time_gain: Duration::from_secs(60 * 60),
        ..base
    })?;
    report(
        "stale age",
        &flush.flush_targets(&scenario.contexts, &scenario.tls_stats, now),
    );
    Ok(())
}

// The transaction log outgrew its size limit; the targets that retire the most
// replay bytes come first.
fn tls_backlog(base: Config) -> anyhow::Result<()> {
    let now = SystemTime::now();
    let mut scenario = ScenarioBuilder::new("docs");
    scenario.tls(8 * GB, 1_000, 90_000);
    scenario.target(
        SimTarget::new("memoryindex").flushed(85_000, Duration::from_secs(120), now),
        90_000,
    );
    scenario.target(
        SimTarget::new("attribute.rank").flushed(10_000, Duration::from_secs(600), now),
        90_000,
    );
    scenario.target(
        SimTarget::new("documentstore").flushed(55_000, Duration::from_secs(300), now),
        90_000,
    );

    let flush = MemoryFlush::new(Config {
        max_global_tls_size: 4 * GB,
        ..base
    })?;
    report(
        "tls backlog",
        &flush.flush_targets(&scenario.contexts, &scenario.tls_stats, now),
    );
    Ok(())
}

// A freshly started idle node; no trigger is satisfied and the decision is
// to flush nothing.
fn calm(base: Config) -> anyhow::Result<()> {
    let now = SystemTime::now();
    let mut scenario = ScenarioBuilder::new("docs");
    scenario.target(SimTarget::new("memoryindex").memory(10 * MB, 2 * MB), 10);
    scenario.target(SimTarget::new("documentstore").disk(GB, GB), 10);

    let flush = MemoryFlush::new(base)?;
    report(
        "calm",
        &flush.flush_targets(&scenario.contexts, &scenario.tls_stats, now),
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let conf = IndexNodeConf::load(Path::new("indexnode.toml"))?;
    logging::init(conf.log_format);
    let base = conf.flush.merge_defaults();

    let args: Vec<String> = std::env::args().collect();
    let scenario = if args.len() < 2 { "1" } else { &args[1] };

    match scenario {
        "1" => memory_pressure(base),
        "2" => disk_bloat(base),
        "3" => stale_age(base),
        "4" => tls_backlog(base),
        "5" => calm(base),
        other => {
            eprintln!("invalid scenario {}", other);
            std::process::exit(1);
        }
    }
}
