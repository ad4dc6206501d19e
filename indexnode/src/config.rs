//! Reading the node configuration file.
//!
//! The file is TOML with a small set of top-level keys; unknown keys are
//! rejected so that a typo does not silently fall back to a default.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::info;

use utils::logging::LogFormat;

use crate::flush::memory_flush;

/// Compiled-in flush strategy defaults, used for the knobs the
/// configuration file leaves unset.
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_GLOBAL_MAX_MEMORY: u64 = 4 * 1024 * 1024 * 1024;
    pub const DEFAULT_MAX_GLOBAL_TLS_SIZE: u64 = 16 * 1024 * 1024 * 1024;
    pub const DEFAULT_GLOBAL_DISK_BLOAT_FACTOR: f64 = 0.2;
    pub const DEFAULT_MAX_MEMORY_GAIN: u64 = 1024 * 1024 * 1024;
    pub const DEFAULT_DISK_BLOAT_FACTOR: f64 = 0.2;
    pub const DEFAULT_MAX_TIME_GAIN: Duration = Duration::from_secs(24 * 60 * 60);
}

/// Flush strategy settings as they appear in the configuration file. Every
/// knob is optional; [`FlushConfOpt::merge_defaults`] produces the effective
/// [`memory_flush::Config`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlushConfOpt {
    pub global_max_memory: Option<u64>,
    pub max_global_tls_size: Option<u64>,
    pub global_disk_bloat_factor: Option<f64>,
    pub max_memory_gain: Option<u64>,
    pub disk_bloat_factor: Option<f64>,
    pub max_time_gain: Option<Duration>,
}

impl FlushConfOpt {
    pub fn merge_defaults(&self) -> memory_flush::Config {
        memory_flush::Config {
            global_max_memory: self
                .global_max_memory
                .unwrap_or(defaults::DEFAULT_GLOBAL_MAX_MEMORY),
            max_global_tls_size: self
                .max_global_tls_size
                .unwrap_or(defaults::DEFAULT_MAX_GLOBAL_TLS_SIZE),
            global_disk_bloat_factor: self
                .global_disk_bloat_factor
                .unwrap_or(defaults::DEFAULT_GLOBAL_DISK_BLOAT_FACTOR),
            max_memory_gain: self
                .max_memory_gain
                .unwrap_or(defaults::DEFAULT_MAX_MEMORY_GAIN),
            disk_bloat_factor: self
                .disk_bloat_factor
                .unwrap_or(defaults::DEFAULT_DISK_BLOAT_FACTOR),
            max_time_gain: self
                .max_time_gain
                .unwrap_or(defaults::DEFAULT_MAX_TIME_GAIN),
        }
    }
}

/// Node configuration as read from the configuration file.
#[derive(Clone, Debug)]
pub struct IndexNodeConf {
    pub log_format: LogFormat,
    pub flush: FlushConfOpt,
}

impl Default for IndexNodeConf {
    fn default() -> IndexNodeConf {
        IndexNodeConf {
            log_format: LogFormat::Plain,
            flush: FlushConfOpt::default(),
        }
    }
}

impl IndexNodeConf {
    /// Locate and load the configuration file. A missing file means
    /// defaults.
    pub fn load(path: &Path) -> anyhow::Result<IndexNodeConf> {
        if !path.exists() {
            info!("config file {} not found, using defaults", path.display());
            return Ok(IndexNodeConf::default());
        }

        let config = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to load config from path '{}'", path.display()))?;

        IndexNodeConf::parse(&config)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    pub fn parse(config: &str) -> anyhow::Result<IndexNodeConf> {
        let toml = config
            .parse::<toml_edit::Document>()
            .context("Failed to parse config as toml")?;

        let mut conf = IndexNodeConf::default();
        for (key, item) in toml.iter() {
            match key {
                "log_format" => {
                    conf.log_format = LogFormat::from_config(&parse_toml_string(key, item)?)?
                }
                "flush" => conf.flush = parse_flush_section(item)?,
                _ => bail!("config file has unrecognized indexnode option '{key}'"),
            }
        }

        Ok(conf)
    }
}

fn parse_flush_section(item: &toml_edit::Item) -> anyhow::Result<FlushConfOpt> {
    let table = item
        .as_table_like()
        .context("configure option flush is not a table")?;

    let mut conf = FlushConfOpt::default();
    for (key, item) in table.iter() {
        match key {
            "global_max_memory" => conf.global_max_memory = Some(parse_toml_u64(key, item)?),
            "max_global_tls_size" => conf.max_global_tls_size = Some(parse_toml_u64(key, item)?),
            "global_disk_bloat_factor" => {
                conf.global_disk_bloat_factor = Some(parse_toml_f64(key, item)?)
            }
            "max_memory_gain" => conf.max_memory_gain = Some(parse_toml_u64(key, item)?),
            "disk_bloat_factor" => conf.disk_bloat_factor = Some(parse_toml_f64(key, item)?),
            "max_time_gain" => conf.max_time_gain = Some(parse_toml_duration(key, item)?),
            _ => bail!("config file has unrecognized flush option '{key}'"),
        }
    }

    Ok(conf)
}

fn parse_toml_string(name: &str, item: &toml_edit::Item) -> anyhow::Result<String> {
    let s = item
        .as_str()
        .with_context(|| format!("configure option {name} is not a string"))?;
    Ok(s.to_string())
}

fn parse_toml_u64(name: &str, item: &toml_edit::Item) -> anyhow::Result<u64> {
    // A toml integer is an i64, so the ranges do not quite match.
    let i = item
        .as_integer()
        .with_context(|| format!("configure option {name} is not an integer"))?;
    if i < 0 {
        bail!("configure option {name} cannot be negative");
    }
    Ok(i as u64)
}

fn parse_toml_f64(name: &str, item: &toml_edit::Item) -> anyhow::Result<f64> {
    item.as_float()
        .with_context(|| format!("configure option {name} is not a float"))
}

fn parse_toml_duration(name: &str, item: &toml_edit::Item) -> anyhow::Result<Duration> {
    let s = item
        .as_str()
        .with_context(|| format!("configure option {name} is not a string"))?;
    humantime::parse_duration(s)
        .with_context(|| format!("configure option {name} is not a duration"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let conf = IndexNodeConf::parse(
            r#"
log_format = "json"

[flush]
global_max_memory = 1073741824
max_global_tls_size = 2147483648
global_disk_bloat_factor = 0.3
max_memory_gain = 134217728
disk_bloat_factor = 0.25
max_time_gain = "2h"
"#,
        )
        .unwrap();

        assert_eq!(conf.log_format, LogFormat::Json);
        let flush = conf.flush.merge_defaults();
        assert_eq!(flush.global_max_memory, 1073741824);
        assert_eq!(flush.max_global_tls_size, 2147483648);
        assert_eq!(flush.global_disk_bloat_factor, 0.3);
        assert_eq!(flush.max_memory_gain, 134217728);
        assert_eq!(flush.disk_bloat_factor, 0.25);
        assert_eq!(flush.max_time_gain, Duration::from_secs(2 * 60 * 60));
    }

    #[test]
    fn defaults_fill_unset_options() {
        let conf = IndexNodeConf::parse("[flush]\nmax_memory_gain = 42\n").unwrap();
        let flush = conf.flush.merge_defaults();
        assert_eq!(flush.max_memory_gain, 42);
        assert_eq!(flush.global_max_memory, defaults::DEFAULT_GLOBAL_MAX_MEMORY);
        assert_eq!(flush.max_time_gain, defaults::DEFAULT_MAX_TIME_GAIN);
    }

    #[test]
    fn unknown_options_are_rejected() {
        assert!(IndexNodeConf::parse("checkpoint_distance = 10\n").is_err());
        assert!(IndexNodeConf::parse("[flush]\nbloat = 0.5\n").is_err());
    }

    #[test]
    fn negative_sizes_are_rejected() {
        assert!(IndexNodeConf::parse("[flush]\nmax_memory_gain = -1\n").is_err());
    }
}
