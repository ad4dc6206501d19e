//! Resource-pressure flush strategy.
//!
//! `MemoryFlush` watches four independent pressure signals across the
//! candidate set: memory that flushing would free, disk bloat that a rewrite
//! would reclaim, time since the last flush, and the size of the transaction
//! logs that would have to be replayed after a crash. The strongest
//! triggered signal decides both whether anything is flushed at all and the
//! order the targets are flushed in.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::{Duration, SystemTime};

use anyhow::ensure;
use tracing::debug;

use super::context::FlushContext;
use super::target::DiskGain;
use super::tls_stats::TlsStatsMap;
use super::FlushStrategy;

/// Floor for the disk size used in bloat ratios, so that a nearly empty disk
/// does not make tiny absolute gains look like huge relative ones.
const MIN_DISK_SIZE: u64 = 100 * 1_000_000;

/// Thresholds for the pressure signals. Byte values are absolute sizes; the
/// bloat factors are ratios of reclaimable bytes to current disk footprint.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Flush when the summed memory gain over all candidates reaches this.
    pub global_max_memory: u64,
    /// Flush when the summed transaction log size over the referenced
    /// handlers exceeds this.
    pub max_global_tls_size: u64,
    /// Flush when the aggregate disk bloat ratio exceeds this.
    pub global_disk_bloat_factor: f64,
    /// Flush when a single target's memory gain reaches this.
    pub max_memory_gain: u64,
    /// Flush when a single target's disk bloat ratio exceeds this.
    pub disk_bloat_factor: f64,
    /// Flush when a target has not been flushed for this long.
    pub max_time_gain: Duration,
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.disk_bloat_factor.is_finite() && self.disk_bloat_factor >= 0.0,
            "disk_bloat_factor must be finite and non-negative, got {}",
            self.disk_bloat_factor
        );
        ensure!(
            self.global_disk_bloat_factor.is_finite() && self.global_disk_bloat_factor >= 0.0,
            "global_disk_bloat_factor must be finite and non-negative, got {}",
            self.global_disk_bloat_factor
        );
        Ok(())
    }
}

/// The pressure signals, weakest to strongest. When several of them trigger
/// in one pass, the strongest one decides the sort order.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, strum_macros::Display)]
#[strum(serialize_all = "UPPERCASE")]
enum OrderType {
    Default,
    MaxAge,
    DiskBloat,
    TlsSize,
    Memory,
    Urgent,
}

/// Resource-pressure driven implementation of [`FlushStrategy`].
pub struct MemoryFlush {
    config: Config,
    /// Stand-in last flush time for targets that have never been flushed.
    /// Normally the node start time; tests pin it.
    start_time: SystemTime,
}

impl MemoryFlush {
    pub fn new(config: Config) -> anyhow::Result<MemoryFlush> {
        MemoryFlush::with_start_time(config, SystemTime::now())
    }

    /// Like [`MemoryFlush::new`], with an explicit reference instant for
    /// never-flushed targets.
    pub fn with_start_time(config: Config, start_time: SystemTime) -> anyhow::Result<MemoryFlush> {
        config.validate()?;
        Ok(MemoryFlush { config, start_time })
    }

    fn age(&self, last_flush_time: Option<SystemTime>, now: SystemTime) -> Duration {
        let last = last_flush_time.unwrap_or(self.start_time);
        now.duration_since(last).unwrap_or(Duration::ZERO)
    }
}

impl FlushStrategy for MemoryFlush {
    fn flush_targets(
        &self,
        candidates: &[FlushContext],
        tls_stats: &TlsStatsMap,
        now: SystemTime,
    ) -> Vec<FlushContext> {
        let config = &self.config;
        let mut order = OrderType::Default;
        let mut total_memory: i64 = 0;
        let mut total_disk = DiskGain::default();
        let mut total_tls_size: u64 = 0;
        let mut visited_handlers: HashSet<&str> = HashSet::new();

        for ctx in candidates {
            let target = ctx.target();
            let memory_gain = target.approx_memory_gain();
            let disk_gain = target.approx_disk_gain();
            total_memory += memory_gain.gain();
            total_disk += disk_gain;

            // Each handler's log is shared by all its targets; count it once.
            let handler_name = ctx.handler().name();
            if visited_handlers.insert(handler_name) {
                total_tls_size += tls_stats.get(handler_name).bytes();
                if total_tls_size > config.max_global_tls_size {
                    order = order.max(OrderType::TlsSize);
                }
            }

            if memory_gain.gain() >= config.max_memory_gain as i64 {
                order = order.max(OrderType::Memory);
            } else if disk_gain.gain() > 0 && bloat_factor(disk_gain) > config.disk_bloat_factor {
                order = order.max(OrderType::DiskBloat);
            } else if self.age(target.last_flush_time(), now) >= config.max_time_gain {
                order = order.max(OrderType::MaxAge);
            }
            if target.need_urgent_flush() {
                order = OrderType::Urgent;
            }
        }
        if total_memory >= config.global_max_memory as i64 {
            order = order.max(OrderType::Memory);
        }
        if total_disk.gain() > 0 && bloat_factor(total_disk) > config.global_disk_bloat_factor {
            order = order.max(OrderType::DiskBloat);
        }

        if order == OrderType::Default {
            debug!(candidates = candidates.len(), "no flush trigger satisfied");
            return Vec::new();
        }

        let mut ranked = candidates.to_vec();
        ranked.sort_by(|lhs, rhs| compare_targets(order, tls_stats, lhs, rhs));
        debug!(
            %order,
            "flush targets selected: [{}]",
            ranked
                .iter()
                .map(|ctx| ctx.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        ranked
    }
}

/// Ratio of reclaimable bytes to current disk footprint, with the footprint
/// floored at [`MIN_DISK_SIZE`].
fn bloat_factor(gain: DiskGain) -> f64 {
    gain.gain() as f64 / gain.before().max(MIN_DISK_SIZE) as f64
}

/// The comparator belonging to `order`. Descending by the signal, with
/// shrinking (negative) gains comparing as zero; ties fall back to target
/// name and then handler name so that equal inputs always produce identical
/// output.
fn compare_targets(
    order: OrderType,
    tls_stats: &TlsStatsMap,
    lhs: &FlushContext,
    rhs: &FlushContext,
) -> Ordering {
    let by_signal = match order {
        OrderType::Memory => {
            let lhs_gain = lhs.target().approx_memory_gain().gain().max(0);
            let rhs_gain = rhs.target().approx_memory_gain().gain().max(0);
            rhs_gain.cmp(&lhs_gain)
        }
        OrderType::DiskBloat => {
            let lhs_gain = lhs.target().approx_disk_gain().gain().max(0);
            let rhs_gain = rhs.target().approx_disk_gain().gain().max(0);
            rhs_gain.cmp(&lhs_gain)
        }
        OrderType::TlsSize => {
            let lhs_bytes = tls_stats
                .get(lhs.handler().name())
                .replay_bytes_from(lhs.target().flushed_serial());
            let rhs_bytes = tls_stats
                .get(rhs.handler().name())
                .replay_bytes_from(rhs.target().flushed_serial());
            rhs_bytes.cmp(&lhs_bytes)
        }
        OrderType::MaxAge => {
            // A target that has never been flushed is older than any that has.
            match (lhs.target().last_flush_time(), rhs.target().last_flush_time()) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(lhs_time), Some(rhs_time)) => lhs_time.cmp(&rhs_time),
            }
        }
        OrderType::Urgent => {
            let lhs_urgent = lhs.target().need_urgent_flush();
            let rhs_urgent = rhs.target().need_urgent_flush();
            rhs_urgent.cmp(&lhs_urgent)
        }
        OrderType::Default => unreachable!("no comparator is defined for {order}"),
    };
    by_signal
        .then_with(|| lhs.target().name().cmp(rhs.target().name()))
        .then_with(|| lhs.handler().name().cmp(rhs.handler().name()))
}
