//! Identity, lifecycle and policy types for load actions.

use serde::{Deserialize, Serialize};

use super::Location;

/// Unique identifier of one load action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(uuid::Uuid);

impl ActionId {
    /// Generates a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a load action. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionState {
    /// Created, not yet picked up by a worker.
    #[default]
    New,
    /// Executing the pipeline.
    Running,
    /// Result delivered.
    Delivered,
    /// Error delivered.
    Errored,
    /// Cancelled before delivery.
    Cancelled,
}

impl ActionState {
    /// Returns true for `Delivered`, `Errored` and `Cancelled`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Errored | Self::Cancelled)
    }

    /// Returns true while the action may still deliver.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::New | Self::Running)
    }
}

impl std::fmt::Display for ActionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Running => write!(f, "running"),
            Self::Delivered => write!(f, "delivered"),
            Self::Errored => write!(f, "errored"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Phase boundaries where a running action checks for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    /// Before or while waiting on the pause gate.
    Gate,
    /// After the memory cache lookup.
    MemoryLookup,
    /// After the storage cache lookup.
    StorageLookup,
    /// After the loader returned.
    Load,
    /// After the transformation ran.
    Transform,
    /// At the delivery transition itself.
    Deliver,
}

bitflags::bitflags! {
    /// Which cache tiers a request may read from or write to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CacheMode: u8 {
        /// Look up the memory cache.
        const READ_MEMORY = 1 << 0;
        /// Store fresh results in the memory cache.
        const WRITE_MEMORY = 1 << 1;
        /// Look up the storage cache.
        const READ_STORAGE = 1 << 2;
        /// Store fresh results in the storage cache.
        const WRITE_STORAGE = 1 << 3;
        /// Memory cache only.
        const MEMORY = Self::READ_MEMORY.bits() | Self::WRITE_MEMORY.bits();
        /// Storage cache only.
        const STORAGE = Self::READ_STORAGE.bits() | Self::WRITE_STORAGE.bits();
    }
}

impl Default for CacheMode {
    fn default() -> Self {
        Self::all()
    }
}

/// Rule deciding which fresh results are written to the storage cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoragePolicy {
    /// Remote data, or anything resized or transformed.
    #[default]
    RemoteOrModified,
    /// Every cacheable result.
    Always,
    /// Remote data only.
    RemoteOnly,
    /// Nothing.
    Never,
}

impl StoragePolicy {
    /// Returns true if a result with this location and history should be stored.
    #[must_use]
    pub const fn should_store(self, location: Location, modified: bool) -> bool {
        let remote = matches!(location, Location::Remote);
        match self {
            Self::RemoteOrModified => remote || modified,
            Self::Always => true,
            Self::RemoteOnly => remote,
            Self::Never => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(StoragePolicy::RemoteOrModified, Location::Remote, false => true)]
    #[test_case(StoragePolicy::RemoteOrModified, Location::Local, false => false)]
    #[test_case(StoragePolicy::RemoteOrModified, Location::Local, true => true)]
    #[test_case(StoragePolicy::RemoteOnly, Location::Local, true => false)]
    #[test_case(StoragePolicy::Always, Location::Local, false => true)]
    #[test_case(StoragePolicy::Never, Location::Remote, true => false)]
    fn test_storage_policy(policy: StoragePolicy, location: Location, modified: bool) -> bool {
        policy.should_store(location, modified)
    }

    #[test]
    fn test_state_classification() {
        assert!(ActionState::New.is_pending());
        assert!(ActionState::Running.is_pending());
        assert!(ActionState::Cancelled.is_terminal());
        assert!(!ActionState::Delivered.is_pending());
    }

    #[test]
    fn test_cache_mode_default_is_all() {
        let mode = CacheMode::default();
        assert!(mode.contains(CacheMode::MEMORY | CacheMode::STORAGE));
    }
}
