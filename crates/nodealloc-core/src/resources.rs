//! Resource profiles — the capacity vector shared by hosts, nodes and requests.
//!
//! A [`ResourceProfile`] carries four numeric dimensions plus two class
//! dimensions (disk speed and storage type). The class dimensions have a
//! wildcard value `Any` which is compatible with every other value.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Disk speed class of a host or a requested node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskSpeed {
    Fast,
    Slow,
    #[default]
    Any,
}

impl DiskSpeed {
    /// Compares two disk speeds by preference: fast before slow.
    ///
    /// `Any` ranks as `Slow`.
    pub fn compare(a: DiskSpeed, b: DiskSpeed) -> Ordering {
        let rank = |s: DiskSpeed| match s {
            DiskSpeed::Fast => 0,
            DiskSpeed::Slow | DiskSpeed::Any => 1,
        };
        rank(a).cmp(&rank(b))
    }

    pub fn compatible_with(self, other: DiskSpeed) -> bool {
        self == DiskSpeed::Any || other == DiskSpeed::Any || self == other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiskSpeed::Fast => "fast",
            DiskSpeed::Slow => "slow",
            DiskSpeed::Any => "any",
        }
    }
}

/// Storage type class of a host or a requested node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    Local,
    Remote,
    #[default]
    Any,
}

impl StorageType {
    /// Compares two storage types by preference: local before remote.
    ///
    /// `Any` ranks as `Remote`.
    pub fn compare(a: StorageType, b: StorageType) -> Ordering {
        let rank = |s: StorageType| match s {
            StorageType::Local => 0,
            StorageType::Remote | StorageType::Any => 1,
        };
        rank(a).cmp(&rank(b))
    }

    pub fn compatible_with(self, other: StorageType) -> bool {
        self == StorageType::Any || other == StorageType::Any || self == other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Local => "local",
            StorageType::Remote => "remote",
            StorageType::Any => "any",
        }
    }
}

/// Capacity vector of a host, node or resource request. Immutable value type.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceProfile {
    pub vcpu: f64,
    pub memory_gb: f64,
    pub disk_gb: f64,
    #[serde(default)]
    pub bandwidth_gbps: f64,
    #[serde(default)]
    pub disk_speed: DiskSpeed,
    #[serde(default)]
    pub storage_type: StorageType,
}

impl ResourceProfile {
    /// The zero vector with wildcard classes.
    pub const ZERO: ResourceProfile = ResourceProfile {
        vcpu: 0.0,
        memory_gb: 0.0,
        disk_gb: 0.0,
        bandwidth_gbps: 0.0,
        disk_speed: DiskSpeed::Any,
        storage_type: StorageType::Any,
    };

    pub fn new(vcpu: f64, memory_gb: f64, disk_gb: f64) -> Self {
        Self {
            vcpu,
            memory_gb,
            disk_gb,
            ..Self::ZERO
        }
    }

    pub fn with_bandwidth(mut self, bandwidth_gbps: f64) -> Self {
        self.bandwidth_gbps = bandwidth_gbps;
        self
    }

    pub fn with_disk_speed(mut self, disk_speed: DiskSpeed) -> Self {
        self.disk_speed = disk_speed;
        self
    }

    pub fn with_storage_type(mut self, storage_type: StorageType) -> Self {
        self.storage_type = storage_type;
        self
    }

    /// Returns a copy with both class dimensions reset to `Any`.
    pub fn just_numbers(&self) -> Self {
        Self {
            disk_speed: DiskSpeed::Any,
            storage_type: StorageType::Any,
            ..*self
        }
    }

    /// Elementwise subtraction. Class dimensions are kept from `self`.
    ///
    /// Results may be negative; callers that need free capacity should
    /// check [`ResourceProfile::satisfies`] first.
    pub fn subtract(&self, other: &ResourceProfile) -> Self {
        Self {
            vcpu: self.vcpu - other.vcpu,
            memory_gb: self.memory_gb - other.memory_gb,
            disk_gb: self.disk_gb - other.disk_gb,
            bandwidth_gbps: self.bandwidth_gbps - other.bandwidth_gbps,
            ..*self
        }
    }

    /// Elementwise addition. Class dimensions are kept from `self`.
    pub fn add(&self, other: &ResourceProfile) -> Self {
        Self {
            vcpu: self.vcpu + other.vcpu,
            memory_gb: self.memory_gb + other.memory_gb,
            disk_gb: self.disk_gb + other.disk_gb,
            bandwidth_gbps: self.bandwidth_gbps + other.bandwidth_gbps,
            ..*self
        }
    }

    /// True if every number is at least `other`'s and the class dimensions
    /// are compatible.
    pub fn satisfies(&self, other: &ResourceProfile) -> bool {
        self.vcpu >= other.vcpu
            && self.memory_gb >= other.memory_gb
            && self.disk_gb >= other.disk_gb
            && self.bandwidth_gbps >= other.bandwidth_gbps
            && self.disk_speed.compatible_with(other.disk_speed)
            && self.storage_type.compatible_with(other.storage_type)
    }

    /// True if both profiles have equal numbers and compatible classes.
    pub fn compatible_with(&self, other: &ResourceProfile) -> bool {
        self.vcpu == other.vcpu
            && self.memory_gb == other.memory_gb
            && self.disk_gb == other.disk_gb
            && self.bandwidth_gbps == other.bandwidth_gbps
            && self.disk_speed.compatible_with(other.disk_speed)
            && self.storage_type.compatible_with(other.storage_type)
    }

    /// Total order over the numeric dimensions, used only for deterministic tie-breaking.
    pub fn total_cmp(&self, other: &ResourceProfile) -> Ordering {
        self.vcpu
            .total_cmp(&other.vcpu)
            .then_with(|| self.memory_gb.total_cmp(&other.memory_gb))
            .then_with(|| self.disk_gb.total_cmp(&other.disk_gb))
            .then_with(|| self.bandwidth_gbps.total_cmp(&other.bandwidth_gbps))
    }
}

impl fmt::Display for ResourceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[vcpu: {:.1}, memory: {:.1} Gb, disk: {:.1} Gb, bandwidth: {:.1} Gbps, disk speed: {}, storage type: {}]",
            self.vcpu,
            self.memory_gb,
            self.disk_gb,
            self.bandwidth_gbps,
            self.disk_speed.as_str(),
            self.storage_type.as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_disk_is_preferred_and_any_ranks_as_slow() {
        assert_eq!(DiskSpeed::compare(DiskSpeed::Fast, DiskSpeed::Slow), Ordering::Less);
        assert_eq!(DiskSpeed::compare(DiskSpeed::Slow, DiskSpeed::Fast), Ordering::Greater);
        assert_eq!(DiskSpeed::compare(DiskSpeed::Any, DiskSpeed::Slow), Ordering::Equal);
        assert_eq!(DiskSpeed::compare(DiskSpeed::Fast, DiskSpeed::Any), Ordering::Less);
    }

    #[test]
    fn local_storage_is_preferred_and_any_ranks_as_remote() {
        assert_eq!(StorageType::compare(StorageType::Local, StorageType::Remote), Ordering::Less);
        assert_eq!(StorageType::compare(StorageType::Any, StorageType::Remote), Ordering::Equal);
        assert_eq!(StorageType::compare(StorageType::Any, StorageType::Local), Ordering::Greater);
    }

    #[test]
    fn any_is_compatible_in_both_directions() {
        assert!(DiskSpeed::Any.compatible_with(DiskSpeed::Fast));
        assert!(DiskSpeed::Slow.compatible_with(DiskSpeed::Any));
        assert!(!DiskSpeed::Slow.compatible_with(DiskSpeed::Fast));
        assert!(StorageType::Remote.compatible_with(StorageType::Any));
        assert!(!StorageType::Remote.compatible_with(StorageType::Local));
    }

    #[test]
    fn subtract_keeps_classes_of_left_operand() {
        let host = ResourceProfile::new(8.0, 16.0, 100.0).with_disk_speed(DiskSpeed::Fast);
        let free = host.subtract(&ResourceProfile::new(2.0, 4.0, 10.0));
        assert_eq!(free.vcpu, 6.0);
        assert_eq!(free.memory_gb, 12.0);
        assert_eq!(free.disk_gb, 90.0);
        assert_eq!(free.disk_speed, DiskSpeed::Fast);
    }

    #[test]
    fn satisfies_checks_numbers_and_classes() {
        let free = ResourceProfile::new(4.0, 8.0, 50.0).with_storage_type(StorageType::Local);
        assert!(free.satisfies(&ResourceProfile::new(4.0, 8.0, 50.0)));
        assert!(!free.satisfies(&ResourceProfile::new(4.5, 8.0, 50.0)));
        let remote = ResourceProfile::new(1.0, 1.0, 1.0).with_storage_type(StorageType::Remote);
        assert!(!free.satisfies(&remote));
    }

    #[test]
    fn just_numbers_resets_classes() {
        let p = ResourceProfile::new(1.0, 2.0, 3.0)
            .with_disk_speed(DiskSpeed::Slow)
            .with_storage_type(StorageType::Remote)
            .just_numbers();
        assert_eq!(p.disk_speed, DiskSpeed::Any);
        assert_eq!(p.storage_type, StorageType::Any);
        assert_eq!(p.disk_gb, 3.0);
    }

    #[test]
    fn display_lists_every_dimension() {
        let p = ResourceProfile::new(2.0, 4.0, 10.0).with_disk_speed(DiskSpeed::Fast);
        assert_eq!(
            p.to_string(),
            "[vcpu: 2.0, memory: 4.0 Gb, disk: 10.0 Gb, bandwidth: 0.0 Gbps, disk speed: fast, storage type: any]"
        );
    }
}
