//! Flush target selection.
//!
//! Each document sub-database is represented by a flush handler that owns a
//! transaction log stream and a set of flush targets. A flush target is an
//! in-memory component that can persist some portion of its state to disk,
//! freeing memory, reclaiming disk space, advancing the durable serial
//! number, or cutting the replay time after a restart. The flush engine
//! periodically collects one context per (handler, target) pair and asks the
//! configured strategy which of them to flush next. See flush/*.rs for the
//! individual pieces.
//!
//! The strategies only rank candidates. Executing the flushes, and the
//! bookkeeping around them, is the engine's business.

use std::time::SystemTime;

pub mod context;
pub mod handler;
pub mod memory_flush;
pub mod target;
pub mod tls_stats;

pub use context::FlushContext;
pub use handler::FlushHandler;
pub use memory_flush::MemoryFlush;
pub use target::{DiskGain, FlushTarget, MemoryGain};
pub use tls_stats::{TlsStats, TlsStatsMap};

/// Decides which flush targets to flush, and in what order.
///
/// A strategy is pure over its inputs: `candidates` and `tls_stats` must be
/// one consistent snapshot, `now` is the injected clock reading, and
/// identical inputs produce identical output. Strategies hold only immutable
/// configuration, so one instance can be shared between threads.
pub trait FlushStrategy: Send + Sync {
    /// Rank `candidates` and return the ones worth flushing, most deserving
    /// first. An empty list means nothing needs flushing right now.
    fn flush_targets(
        &self,
        candidates: &[FlushContext],
        tls_stats: &TlsStatsMap,
        now: SystemTime,
    ) -> Vec<FlushContext>;
}
