//! Run statistics, printed at exit. Reduced from the teacher's
//! `stats.rs` (which covers a whole pipeline's worth of counters) down to
//! the cache and instruction counters this crate actually has.

use tracing::info;

#[derive(Debug, Clone, Copy, Default)]
pub struct SimStats {
    pub instructions_retired: u64,
    pub traps_taken: u64,
    pub cache_hits: u64,
    pub cache_accesses: u64,
}

impl SimStats {
    #[must_use]
    pub fn cache_hit_rate(&self) -> f64 {
        if self.cache_accesses == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.cache_accesses as f64
        }
    }

    /// Logs a human-readable summary at `info` level, mirroring the
    /// teacher's `print_sections` idiom but through `tracing` rather than
    /// `println!`.
    pub fn print_sections(&self) {
        info!(
            instructions_retired = self.instructions_retired,
            traps_taken = self.traps_taken,
            "run summary"
        );
        info!(
            cache_hits = self.cache_hits,
            cache_accesses = self.cache_accesses,
            hit_rate = format!("{:.2}%", self.cache_hit_rate() * 100.0),
            "cache summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_is_zero_with_no_accesses() {
        let stats = SimStats::default();
        assert_eq!(stats.cache_hit_rate(), 0.0);
    }

    #[test]
    fn hit_rate_divides_hits_by_accesses() {
        let stats = SimStats { cache_hits: 3, cache_accesses: 4, ..SimStats::default() };
        assert!((stats.cache_hit_rate() - 0.75).abs() < f64::EPSILON);
    }
}
