//! Request-scoped feature gates.
//!
//! Gates are read once per request (or per flush, for the framing gate)
//! through the [`FeatureGates`] port. The in-memory implementation keeps
//! process-wide read-mostly state behind a lock, so tests and the server
//! can flip gates without global mutable singletons.

use std::collections::HashSet;

use parking_lot::RwLock;

/// Toggleable behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// The managed subscription API. Off: subscription endpoints answer
    /// 501 Not Implemented.
    HighLevelApi,
    /// Verify that `owning_application` exists before creating a
    /// subscription.
    CheckOwningApplication,
    /// Frame batches directly onto the byte sink instead of building an
    /// intermediate string. Both paths produce byte-identical output.
    SendBatchViaOutputStream,
}

/// Per-request feature lookup.
pub trait FeatureGates: Send + Sync {
    /// Returns whether the feature is currently enabled.
    fn is_enabled(&self, feature: Feature) -> bool;
}

/// In-memory gate set.
///
/// `HighLevelApi` and `SendBatchViaOutputStream` are on by default;
/// `CheckOwningApplication` is off.
#[derive(Debug)]
pub struct InMemoryFeatureGates {
    enabled: RwLock<HashSet<Feature>>,
}

impl InMemoryFeatureGates {
    /// Creates a gate set with the defaults.
    #[must_use]
    pub fn new() -> Self {
        let mut enabled = HashSet::new();
        enabled.insert(Feature::HighLevelApi);
        enabled.insert(Feature::SendBatchViaOutputStream);
        Self {
            enabled: RwLock::new(enabled),
        }
    }

    /// Creates a gate set with every feature off.
    #[must_use]
    pub fn all_off() -> Self {
        Self {
            enabled: RwLock::new(HashSet::new()),
        }
    }

    /// Enables a feature.
    pub fn enable(&self, feature: Feature) {
        self.enabled.write().insert(feature);
    }

    /// Disables a feature.
    pub fn disable(&self, feature: Feature) {
        self.enabled.write().remove(&feature);
    }
}

impl Default for InMemoryFeatureGates {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureGates for InMemoryFeatureGates {
    fn is_enabled(&self, feature: Feature) -> bool {
        self.enabled.read().contains(&feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let gates = InMemoryFeatureGates::new();
        assert!(gates.is_enabled(Feature::HighLevelApi));
        assert!(gates.is_enabled(Feature::SendBatchViaOutputStream));
        assert!(!gates.is_enabled(Feature::CheckOwningApplication));
    }

    #[test]
    fn test_enable_disable() {
        let gates = InMemoryFeatureGates::all_off();
        assert!(!gates.is_enabled(Feature::HighLevelApi));

        gates.enable(Feature::HighLevelApi);
        assert!(gates.is_enabled(Feature::HighLevelApi));

        gates.disable(Feature::HighLevelApi);
        assert!(!gates.is_enabled(Feature::HighLevelApi));
    }
}
