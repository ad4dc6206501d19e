use std::collections::HashMap;

use utils::serial::SerialNum;

/// Transaction log statistics for one handler's log stream.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TlsStats {
    bytes: u64,
    first_serial: SerialNum,
    last_serial: SerialNum,
}

impl TlsStats {
    pub fn new(bytes: u64, first_serial: SerialNum, last_serial: SerialNum) -> TlsStats {
        TlsStats {
            bytes,
            first_serial,
            last_serial,
        }
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn first_serial(&self) -> SerialNum {
        self.first_serial
    }

    pub fn last_serial(&self) -> SerialNum {
        self.last_serial
    }

    /// Estimated log bytes that must be replayed after a restart when
    /// `flushed` is the highest serial a component has persisted.
    ///
    /// The log does not track per-record sizes, so the estimate assumes the
    /// average record size holds across the `[first_serial, last_serial]`
    /// range the log currently covers.
    pub fn replay_bytes_from(&self, flushed: SerialNum) -> u64 {
        if flushed < self.first_serial {
            return self.bytes;
        }
        if flushed >= self.last_serial {
            return 0;
        }
        let records = self.last_serial.0 - self.first_serial.0 + 1;
        let needed = self.last_serial.0 - flushed.0;
        let bytes_per_record = self.bytes as f64 / records as f64;
        (bytes_per_record * needed as f64) as u64
    }
}

/// Per-handler transaction log statistics, keyed by handler name.
///
/// One snapshot is taken per selection pass. A handler absent from the
/// snapshot reads as an empty log.
#[derive(Clone, Debug, Default)]
pub struct TlsStatsMap {
    stats: HashMap<String, TlsStats>,
}

impl TlsStatsMap {
    pub fn insert(&mut self, handler: &str, stats: TlsStats) {
        self.stats.insert(handler.to_string(), stats);
    }

    pub fn get(&self, handler: &str) -> TlsStats {
        self.stats.get(handler).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_estimate_is_proportional_to_the_serial_gap() {
        let stats = TlsStats::new(20_000, SerialNum(1001), SerialNum(2000));
        // flushed before the log start: the whole log must be replayed
        assert_eq!(stats.replay_bytes_from(SerialNum(1000)), 20_000);
        // flushed at (or past) the log end: nothing to replay
        assert_eq!(stats.replay_bytes_from(SerialNum(2000)), 0);
        assert_eq!(stats.replay_bytes_from(SerialNum(2500)), 0);
        // 100 of 1000 records outstanding
        assert_eq!(stats.replay_bytes_from(SerialNum(1900)), 2_000);
    }

    #[test]
    fn replay_estimate_survives_serials_past_32_bits() {
        let u32_max = u32::MAX as u64;
        let stats = TlsStats::new(u32_max, SerialNum(10), SerialNum(u32_max + 10));
        let close = stats.replay_bytes_from(SerialNum(u32_max + 5));
        let far = stats.replay_bytes_from(SerialNum(u32_max - 5));
        assert!(far > close);
    }

    #[test]
    fn stats_report_their_log_window() {
        let stats = TlsStats::new(512, SerialNum(3), SerialNum(9));
        assert_eq!(stats.bytes(), 512);
        assert_eq!(stats.first_serial(), SerialNum(3));
        assert_eq!(stats.last_serial(), SerialNum(9));
    }

    #[test]
    fn unknown_handler_reads_as_empty_log() {
        let mut map = TlsStatsMap::default();
        map.insert("docs", TlsStats::new(512, SerialNum(1), SerialNum(8)));
        assert_eq!(map.get("docs").bytes(), 512);
        assert_eq!(map.get("mail"), TlsStats::default());
    }
}
