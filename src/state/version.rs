//! Version record and update decision structures

use serde::{Deserialize, Serialize};

/// A released application version: the unit of comparison for staleness.
///
/// Two records are equal only if both fields match. Build numbers are assumed
/// monotonically non-decreasing across real releases; a build going backward
/// is neither detected nor rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Human-readable version string, e.g. "2.1.0"
    pub version: String,
    /// Monotonically non-decreasing build number
    pub build: u32,
}

impl VersionRecord {
    /// Create a new version record
    pub fn new(version: impl Into<String>, build: u32) -> Self {
        Self {
            version: version.into(),
            build,
        }
    }
}

/// The outcome of a version check - derived on every check, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateDecision {
    /// The persisted record is missing or below the minimum supported build;
    /// the session must be invalidated without offering a choice.
    pub is_force_update: bool,
    /// A newer version exists and an optional update should be offered.
    /// Not evaluated when `is_force_update` is set.
    pub is_update_available: bool,
}

impl UpdateDecision {
    /// Decision for a session below the minimum supported build
    pub fn force() -> Self {
        Self {
            is_force_update: true,
            is_update_available: false,
        }
    }

    /// Decision for a supported session, with or without a pending update
    pub fn available(is_update_available: bool) -> Self {
        Self {
            is_force_update: false,
            is_update_available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_equal_only_when_both_fields_match() {
        let a = VersionRecord::new("2.1.0", 210);
        assert_eq!(a, VersionRecord::new("2.1.0", 210));
        assert_ne!(a, VersionRecord::new("2.1.0", 211));
        assert_ne!(a, VersionRecord::new("2.1.1", 210));
    }

    #[test]
    fn test_record_serializes_with_plain_field_names() {
        let json = serde_json::to_value(VersionRecord::new("2.1.0", 210)).unwrap();
        assert_eq!(json["version"], "2.1.0");
        assert_eq!(json["build"], 210);
    }
}
