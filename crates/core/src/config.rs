//! Run configuration: everything the CLI can set, grouped the way the
//! teacher's `config.rs` groups `general`/`system`/cache sections, reduced
//! to this crate's scope (no pipeline, no branch predictor, no multi-hart).

use serde::{Deserialize, Serialize};

/// Top-level configuration, deserialisable from the JSON a user passes with
/// `--config`. Every field has a default, so a partial (or absent) file is
/// fine.
///
/// ```
/// # use rvima_core::config::Config;
/// let json = r#"{"general": {"time_divisor": 4}}"#;
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.general.time_divisor, 4);
/// assert_eq!(config.cache.ways, 4); // untouched sections keep their defaults
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub system: SystemConfig,
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self { general: GeneralConfig::default(), system: SystemConfig::default(), cache: CacheConfig::default() }
    }
}

/// Timing and instruction-budget knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Guest microseconds advance by `wall_clock_delta_us / time_divisor`
    /// each main-loop iteration, resolving the time-compression Open
    /// Question (`DESIGN.md`). Matches the literal `/6` in
    /// `examples/original_source/main/uc-rv32ima.c`.
    pub time_divisor: u64,
    /// Instructions retired per `Hart::step` call before control returns
    /// to the platform loop.
    pub max_instructions_per_step: u32,
    /// Milliseconds slept when the hart is in WFI with no interrupt
    /// pending.
    pub wfi_sleep_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { time_divisor: 6, max_instructions_per_step: 1024, wfi_sleep_ms: 10 }
    }
}

/// Guest address-space layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub ram_size: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self { ram_size: 8 * 1024 * 1024 }
    }
}

/// Cache geometry. All three fields must be powers of two
/// (`LineCache::new` panics otherwise); `line_bytes` must additionally be
/// at least 4.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub sets: usize,
    pub ways: usize,
    pub line_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { sets: 256, ways: 4, line_bytes: 64 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.general.time_divisor, 6);
        assert_eq!(config.system.ram_size, 8 * 1024 * 1024);
        assert_eq!(config.cache.sets, 256);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config: Config = serde_json::from_str(r#"{"cache": {"ways": 8}}"#).unwrap();
        assert_eq!(config.cache.ways, 8);
        assert_eq!(config.cache.sets, 256);
    }
}
