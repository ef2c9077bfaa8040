//! Collector configuration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Grace-period sizing for the collector.
///
/// A node survives `1 + count` full collections without being read before it
/// is disposed. `paths` overrides `count` for individual resource paths.
///
/// ```rust
/// use resource_graph::Capacities;
///
/// let capacities = Capacities::from_json(r#"{ "count": 2, "paths": { "/mesh": 0 } }"#).unwrap();
/// assert_eq!(capacities.count_for("/mesh"), 0);
/// assert_eq!(capacities.count_for("/light"), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capacities {
    /// Extra generations an unread node is kept for.
    pub count: u64,

    /// Per-path overrides of `count`.
    pub paths: IndexMap<String, u64>,
}

impl Capacities {
    pub fn new(count: u64) -> Self {
        Self {
            count,
            paths: IndexMap::new(),
        }
    }

    /// Override the capacity of one path.
    pub fn with_path(mut self, path: impl Into<String>, count: u64) -> Self {
        self.paths.insert(path.into(), count);
        self
    }

    /// Capacity that applies to `path`.
    pub fn count_for(&self, path: &str) -> u64 {
        self.paths.get(path).copied().unwrap_or(self.count)
    }

    /// Parse capacities from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_default_to_zero() {
        let capacities = Capacities::from_json("{}").unwrap();
        assert_eq!(capacities, Capacities::default());
        assert_eq!(capacities.count_for("/anything"), 0);
    }

    #[test]
    fn path_overrides_win() {
        let capacities = Capacities::new(3).with_path("/terrain", 10);
        assert_eq!(capacities.count_for("/terrain"), 10);
        assert_eq!(capacities.count_for("/lighting"), 3);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(Capacities::from_json(r#"{ "count": "many" }"#).is_err());
    }
}
