//! Priority-ordered set of platform profiles.

use std::path::Path;

use crate::error::{PlatformError, Result};
use crate::loader::load_profiles_from_dir;
use crate::profile::PlatformProfile;

/// Profiles sorted by descending priority, ties in load order.
///
/// Names are unique: when two profiles share a name the one loaded last
/// wins and takes the later load position.
#[derive(Debug, Clone, Default)]
pub struct PlatformRegistry {
    profiles: Vec<PlatformProfile>,
}

impl PlatformRegistry {
    /// Build a registry from profiles in load order.
    pub fn from_profiles(profiles: impl IntoIterator<Item = PlatformProfile>) -> Self {
        let mut loaded: Vec<PlatformProfile> = Vec::new();
        for profile in profiles {
            loaded.retain(|p| p.name != profile.name);
            loaded.push(profile);
        }

        // Stable sort keeps load order among equal priorities.
        loaded.sort_by(|a, b| b.priority.cmp(&a.priority));

        Self { profiles: loaded }
    }

    /// Load every profile file found in `dir`.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let registry = Self::from_profiles(load_profiles_from_dir(dir.as_ref())?);
        if registry.is_empty() {
            return Err(PlatformError::NoProfiles(dir.as_ref().display().to_string()));
        }
        Ok(registry)
    }

    /// Look up a profile by name.
    pub fn get(&self, name: &str) -> Option<&PlatformProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// The most preferred profile.
    pub fn highest_priority(&self) -> Option<&PlatformProfile> {
        self.profiles.first()
    }

    /// Iterate in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &PlatformProfile> {
        self.profiles.iter()
    }

    /// Profile names in priority order.
    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::fixtures::profile;

    #[test]
    fn test_sorted_by_priority_desc() {
        let registry = PlatformRegistry::from_profiles(vec![
            profile("low", 1),
            profile("high", 10),
            profile("mid", 5),
        ]);
        assert_eq!(registry.names(), vec!["high", "mid", "low"]);
        assert_eq!(registry.highest_priority().unwrap().name, "high");
    }

    #[test]
    fn test_ties_keep_load_order() {
        let registry = PlatformRegistry::from_profiles(vec![
            profile("first", 5),
            profile("second", 5),
            profile("third", 5),
        ]);
        assert_eq!(registry.names(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_duplicate_name_last_loaded_wins() {
        let mut replacement = profile("dup", 5);
        replacement.bucket = "replacement".to_string();

        let registry = PlatformRegistry::from_profiles(vec![
            profile("dup", 5),
            profile("other", 5),
            replacement,
        ]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["other", "dup"]);
        assert_eq!(registry.get("dup").unwrap().bucket, "replacement");
    }

    #[test]
    fn test_load_dir_empty_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PlatformRegistry::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, PlatformError::NoProfiles(_)));
    }
}
