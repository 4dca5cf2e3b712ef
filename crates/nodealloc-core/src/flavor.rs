//! Flavors: named, priced resource-profile templates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resources::ResourceProfile;

/// A named resource profile with a comparable cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flavor {
    pub name: String,
    pub resources: ResourceProfile,
    /// Relative cost, lower is cheaper.
    pub cost: i64,
}

impl Flavor {
    pub fn new(name: &str, resources: ResourceProfile, cost: i64) -> Self {
        Self {
            name: name.to_string(),
            resources,
            cost,
        }
    }

    /// A flavor built directly from a profile. Anonymous flavors cost nothing.
    pub fn anonymous(resources: ResourceProfile) -> Self {
        Self {
            name: format!(
                "{}-{}-{}",
                resources.vcpu, resources.memory_gb, resources.disk_gb
            ),
            resources,
            cost: 0,
        }
    }
}

/// Catalog of the flavors known to the cluster, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct FlavorCatalog {
    flavors: BTreeMap<String, Flavor>,
}

impl FlavorCatalog {
    pub fn new(flavors: impl IntoIterator<Item = Flavor>) -> Self {
        Self {
            flavors: flavors.into_iter().map(|f| (f.name.clone(), f)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Flavor> {
        self.flavors.get(name)
    }

    /// Returns the cheapest named flavor whose resources are compatible with
    /// `resources`, or an anonymous flavor if none is.
    pub fn flavor_for(&self, resources: &ResourceProfile) -> Flavor {
        self.flavors
            .values()
            .filter(|f| f.resources.compatible_with(resources))
            .min_by_key(|f| f.cost)
            .cloned()
            .unwrap_or_else(|| Flavor::anonymous(*resources))
    }

    pub fn len(&self) -> usize {
        self.flavors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flavors.is_empty()
    }
}
