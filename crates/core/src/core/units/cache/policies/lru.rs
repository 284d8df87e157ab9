//! Strict LRU: each set keeps a most-recently-used-ordered permutation of
//! its way indices, so the victim (the last entry) is always a strict total
//! order, never a tie.

use super::ReplacementPolicy;

#[derive(Debug, Clone)]
pub struct LruPolicy {
    /// `usage[set]`, index 0 = most-recently-used, last = next victim.
    usage: Vec<Vec<usize>>,
}

impl LruPolicy {
    #[must_use]
    pub fn new(sets: usize, ways: usize) -> Self {
        Self {
            usage: (0..sets).map(|_| (0..ways).collect()).collect(),
        }
    }
}

impl ReplacementPolicy for LruPolicy {
    fn touch(&mut self, set: usize, way: usize) {
        let order = &mut self.usage[set];
        if let Some(pos) = order.iter().position(|&w| w == way) {
            order.remove(pos);
        }
        order.insert(0, way);
    }

    fn victim(&self, set: usize) -> usize {
        self.usage[set][self.usage[set].len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn victim_is_least_recently_used() {
        let mut p = LruPolicy::new(1, 4);
        p.touch(0, 0);
        p.touch(0, 1);
        p.touch(0, 2);
        p.touch(0, 3);
        assert_eq!(p.victim(0), 0);
        p.touch(0, 0);
        assert_eq!(p.victim(0), 1);
    }
}
