//! Collector
//!
//! A generational reclaimer driven explicitly by the host. Every read stamps
//! the node with the current generation; [`Collector::advance`] moves to the
//! next generation, after which any node whose stamp is older than
//! `generation - 1 - capacity` has expired.
//!
//! With capacity 0 this yields a one-cycle grace period:
//!
//! ```text
//! get(k)     generation 0, stamp 0
//! collect()  generation 1, threshold 0   stamp 0 kept
//! collect()  generation 2, threshold 1   stamp 0 disposed
//! ```
//!
//! The sweep itself lives in the runtime, which owns both the store and the
//! disposers; this type only answers "which generation is it" and "has this
//! stamp expired".

use crate::config::Capacities;

/// Generation counter plus grace-period sizing.
#[derive(Debug, Clone, Default)]
pub struct Collector {
    generation: u64,
    capacities: Capacities,
}

impl Collector {
    pub fn new(capacities: Capacities) -> Self {
        Self {
            generation: 0,
            capacities,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn capacities(&self) -> &Capacities {
        &self.capacities
    }

    /// Move to the next generation and return it.
    pub fn advance(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Whether a node at `path` last read in `last_accessed` should be reclaimed.
    pub fn is_expired(&self, path: &str, last_accessed: u64) -> bool {
        let grace = self.capacities.count_for(path).saturating_add(1);
        last_accessed < self.generation.saturating_sub(grace)
    }
}

/// Outcome of one collection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    /// Generation the pass advanced to.
    pub generation: u64,

    /// Nodes removed from the store.
    pub disposed: usize,

    /// Removed nodes whose disposer reported an error.
    pub failed: usize,

    /// Nodes left in the store.
    pub retained: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_gives_one_cycle_grace() {
        let mut collector = Collector::default();
        let stamp = collector.generation();

        collector.advance();
        assert!(!collector.is_expired("/a", stamp));

        collector.advance();
        assert!(collector.is_expired("/a", stamp));
    }

    #[test]
    fn capacity_extends_grace() {
        let mut collector = Collector::new(Capacities::new(2));
        let stamp = collector.generation();

        for _ in 0..3 {
            collector.advance();
            assert!(!collector.is_expired("/a", stamp));
        }
        collector.advance();
        assert!(collector.is_expired("/a", stamp));
    }

    #[test]
    fn per_path_capacity_applies() {
        let mut collector = Collector::new(Capacities::new(0).with_path("/slow", 5));
        collector.advance();
        collector.advance();
        assert!(collector.is_expired("/fast", 0));
        assert!(!collector.is_expired("/slow", 0));
    }

    #[test]
    fn recent_stamps_never_expire() {
        let mut collector = Collector::default();
        for _ in 0..10 {
            collector.advance();
        }
        let current = collector.generation();
        assert!(!collector.is_expired("/a", current));
        assert!(!collector.is_expired("/a", current - 1));
        assert!(collector.is_expired("/a", current - 2));
    }
}
