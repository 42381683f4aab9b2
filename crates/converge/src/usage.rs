//! Resource usage accounting over observed host groups

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::HostGroup;

/// Hardware behind one flavor name
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlavorSpec {
    pub cpu: u32,
    pub memory_gib: f64,
}

/// Flavor lookup table, built from configuration and passed explicitly
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlavorCatalog {
    flavors: BTreeMap<String, FlavorSpec>,
}

impl FlavorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, spec: FlavorSpec) {
        self.flavors.insert(name.into(), spec);
    }

    pub fn with(mut self, name: impl Into<String>, spec: FlavorSpec) -> Self {
        self.insert(name, spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FlavorSpec> {
        self.flavors.get(name)
    }

    pub fn len(&self) -> usize {
        self.flavors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flavors.is_empty()
    }
}

/// Totals across observed instances
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Usage {
    pub instances: usize,
    pub cpu: u64,
    pub memory_gib: f64,
    /// Sum over every attached volume, root volumes included
    pub volume_gib: u64,
    /// Instances whose flavor is missing from the catalog, by flavor
    pub unknown_flavors: BTreeMap<String, usize>,
}

impl Usage {
    /// Sum usage over observed groups
    ///
    /// Instances with an unknown flavor still count towards `instances`
    /// and volumes, but not towards CPU or memory.
    pub fn from_groups(groups: &[HostGroup], catalog: &FlavorCatalog) -> Self {
        let mut usage = Self::default();
        for group in groups {
            let instances = group.observed.len();
            usage.instances += instances;

            match catalog.get(&group.flavor) {
                Some(spec) => {
                    usage.cpu += u64::from(spec.cpu) * instances as u64;
                    usage.memory_gib += spec.memory_gib * instances as f64;
                }
                None if instances > 0 => {
                    *usage
                        .unknown_flavors
                        .entry(group.flavor.clone())
                        .or_default() += instances;
                }
                None => {}
            }

            usage.volume_gib += group
                .disks
                .iter()
                .map(|d| u64::from(d.capacity) * d.volume_ids.len() as u64)
                .sum::<u64>();
        }
        usage
    }

    pub fn has_unknown_flavors(&self) -> bool {
        !self.unknown_flavors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiskSpec, InstanceMetadata, InstanceStatus};

    fn instances(count: usize) -> Vec<InstanceMetadata> {
        (0..count)
            .map(|n| InstanceMetadata {
                id: format!("i-{n}"),
                addresses: Vec::new(),
                status: InstanceStatus::Running,
                disk_ids: Vec::new(),
                labels: Default::default(),
            })
            .collect()
    }

    fn catalog() -> FlavorCatalog {
        FlavorCatalog::new().with(
            "small",
            FlavorSpec {
                cpu: 2,
                memory_gib: 4.0,
            },
        )
    }

    #[test]
    fn test_usage_sums_known_flavors() {
        let disk = DiskSpec::new("/dev/sdb", 10)
            .with_volume_ids(vec!["vol-1".into(), "vol-2".into(), "vol-3".into()]);
        let group = HostGroup::new(0, 3)
            .with_flavor("small")
            .with_disks(vec![disk])
            .with_observed(instances(3));

        let usage = Usage::from_groups(&[group], &catalog());
        assert_eq!(usage.instances, 3);
        assert_eq!(usage.cpu, 6);
        assert!((usage.memory_gib - 12.0).abs() < f64::EPSILON);
        assert_eq!(usage.volume_gib, 30);
        assert!(!usage.has_unknown_flavors());
    }

    #[test]
    fn test_unknown_flavor_counted_separately() {
        let group = HostGroup::new(1, 2)
            .with_flavor("huge")
            .with_observed(instances(2));

        let usage = Usage::from_groups(&[group], &catalog());
        assert_eq!(usage.instances, 2);
        assert_eq!(usage.cpu, 0);
        assert_eq!(usage.unknown_flavors.get("huge"), Some(&2));
    }

    #[test]
    fn test_catalog_deserializes_as_map() {
        let catalog = catalog_fixture();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("large").map(|f| f.cpu), Some(8));
    }

    fn catalog_fixture() -> FlavorCatalog {
        serde_json::from_str(
            r#"{
                "small": { "cpu": 2, "memory_gib": 4 },
                "large": { "cpu": 8, "memory_gib": 32 }
            }"#,
        )
        .unwrap()
    }
}
