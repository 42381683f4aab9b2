//! Core types for host and disk reconciliation

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use crate::error::{Error, Result};

/// Role tag carried by control-plane hosts
pub const ROLE_MASTER: &str = "master";

/// Role tag carried by worker hosts
pub const ROLE_NODE: &str = "node";

/// Opaque identity of the desired-state object that owns provider resources
///
/// Every resource the engine creates is tagged with `id`; anything missing
/// that tag is invisible to reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerContext {
    /// Stable identifier, typically a UUID bound to the desired-state object
    pub id: String,
    /// Human-readable name used for resource labels
    #[serde(default)]
    pub name: String,
}

impl OwnerContext {
    /// Create an owner context
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Name used as a prefix for provider-side resource names
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Lifecycle phase of a desired topology
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Not yet converged
    #[default]
    Pending,
    /// Converged at least once
    Running,
    /// Being torn down by the deletion path; reconciliation is a no-op
    Terminating,
}

/// Provider-reported instance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Pending,
    Running,
    Stopping,
    Stopped,
    Terminated,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an address is reachable from outside the provider network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Public,
    Private,
}

/// A typed instance address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddress {
    pub kind: AddressKind,
    pub address: IpAddr,
}

/// Observed state of one provider instance
///
/// Populated by the driver; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMetadata {
    /// Provider instance id
    pub id: String,
    #[serde(default)]
    pub addresses: Vec<IpAddress>,
    pub status: InstanceStatus,
    /// Volumes attached to this instance
    #[serde(default)]
    pub disk_ids: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl InstanceMetadata {
    /// First address of the given kind
    pub fn address(&self, kind: AddressKind) -> Option<IpAddr> {
        self.addresses
            .iter()
            .find(|a| a.kind == kind)
            .map(|a| a.address)
    }
}

/// Role of a disk within a host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskKind {
    /// Boot volume, created and destroyed together with its instance
    Root,
    /// Additional block storage
    #[default]
    Data,
}

/// One disk of a host group's disk template
///
/// Two specs describe the same disk iff their `device` matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSpec {
    /// Attachment path, the diff key
    pub device: String,
    /// Size in GiB
    pub capacity: u32,
    /// Vendor storage class
    #[serde(default)]
    pub volume_type: String,
    #[serde(default)]
    pub kind: DiskKind,
    /// Provider volume ids backing this device across the group's instances
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_ids: Vec<String>,
}

impl DiskSpec {
    /// Create a data disk spec
    pub fn new(device: impl Into<String>, capacity: u32) -> Self {
        Self {
            device: device.into(),
            capacity,
            volume_type: String::new(),
            kind: DiskKind::Data,
            volume_ids: Vec::new(),
        }
    }

    pub fn with_volume_type(mut self, volume_type: impl Into<String>) -> Self {
        self.volume_type = volume_type.into();
        self
    }

    pub fn with_kind(mut self, kind: DiskKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_volume_ids(mut self, ids: Vec<String>) -> Self {
        self.volume_ids = ids;
        self
    }

    pub fn is_root(&self) -> bool {
        self.kind == DiskKind::Root
    }

    /// Whether capacity or storage class differ from `other`
    pub fn differs_from(&self, other: &DiskSpec) -> bool {
        self.capacity != other.capacity || self.volume_type != other.volume_type
    }
}

/// A set of identically-configured instances sharing one index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostGroup {
    /// Stable diff key; assigned from list position when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    pub count: usize,
    #[serde(default)]
    pub flavor: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub disks: Vec<DiskSpec>,
    /// Instances reported by the driver; never set by callers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub observed: Vec<InstanceMetadata>,
}

impl HostGroup {
    /// Create a group with the given index and count
    pub fn new(index: usize, count: usize) -> Self {
        Self {
            index: Some(index),
            count,
            ..Default::default()
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_flavor(mut self, flavor: impl Into<String>) -> Self {
        self.flavor = flavor.into();
        self
    }

    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = arch.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_disks(mut self, disks: Vec<DiskSpec>) -> Self {
        self.disks = disks;
        self
    }

    /// The group's index, or 0 when it has not been assigned yet
    ///
    /// Topologies pass through [`Topology::assign_indices`] before any diff,
    /// so inside the engine every group has an explicit index.
    pub fn key(&self) -> usize {
        self.index.unwrap_or_default()
    }

    pub fn is_master(&self) -> bool {
        self.roles.contains(ROLE_MASTER)
    }

    /// Instance ids from the observed list
    pub fn instance_ids(&self) -> Vec<&str> {
        self.observed.iter().map(|i| i.id.as_str()).collect()
    }

    /// Copy of this group restricted to the given observed instances
    pub fn with_observed(&self, observed: Vec<InstanceMetadata>) -> Self {
        Self {
            count: observed.len(),
            observed,
            ..self.clone()
        }
    }

    /// Copy of this group's spec asking for `count` instances
    pub fn with_count(&self, count: usize) -> Self {
        Self {
            count,
            observed: Vec::new(),
            ..self.clone()
        }
    }
}

/// Sort host groups by index ascending
pub fn sort_by_index(groups: &mut [HostGroup]) {
    groups.sort_by_key(HostGroup::key);
}

/// Find the group with a given index
pub fn find_by_index(groups: &[HostGroup], index: usize) -> Option<&HostGroup> {
    groups.iter().find(|g| g.key() == index)
}

/// A desired-state object: the owner plus its declared host groups
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub phase: Phase,
    pub owner: OwnerContext,
    #[serde(default)]
    pub hosts: Vec<HostGroup>,
}

impl Topology {
    pub fn new(owner: OwnerContext, hosts: Vec<HostGroup>) -> Self {
        Self {
            phase: Phase::Pending,
            owner,
            hosts,
        }
    }

    pub fn is_terminating(&self) -> bool {
        self.phase == Phase::Terminating
    }

    /// Give every group without an index its list position
    ///
    /// Returns `true` if any index was assigned. Indices that are already
    /// set are never touched, so running this twice is a no-op.
    pub fn assign_indices(&mut self) -> bool {
        let mut changed = false;
        for (position, group) in self.hosts.iter_mut().enumerate() {
            if group.index.is_none() {
                group.index = Some(position);
                changed = true;
            }
        }
        changed
    }

    /// Check that indices are unique across declared groups
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for group in &self.hosts {
            if !seen.insert(group.key()) {
                return Err(Error::DuplicateIndex { index: group.key() });
            }
        }
        Ok(())
    }

    /// Total declared instance count
    pub fn desired_instances(&self) -> usize {
        self.hosts.iter().map(|g| g.count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_indices_uses_position() {
        let mut topology = Topology::new(
            OwnerContext::new("uid", "demo"),
            vec![HostGroup::default(), HostGroup::default(), HostGroup::default()],
        );

        assert!(topology.assign_indices());
        let indices: Vec<_> = topology.hosts.iter().map(|g| g.index).collect();
        assert_eq!(indices, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn test_assign_indices_is_noop_when_indexed() {
        let mut topology = Topology::new(
            OwnerContext::new("uid", "demo"),
            vec![HostGroup::new(3, 1), HostGroup::new(7, 2)],
        );
        let before = topology.clone();

        assert!(!topology.assign_indices());
        assert_eq!(topology, before);
    }

    #[test]
    fn test_assign_indices_keeps_explicit_zero() {
        let mut topology = Topology::new(
            OwnerContext::new("uid", "demo"),
            vec![HostGroup::new(5, 1), HostGroup::new(0, 1)],
        );

        topology.assign_indices();
        assert_eq!(topology.hosts[1].index, Some(0));
    }

    #[test]
    fn test_validate_rejects_duplicate_index() {
        let topology = Topology::new(
            OwnerContext::new("uid", "demo"),
            vec![HostGroup::new(1, 1), HostGroup::new(1, 2)],
        );

        assert!(matches!(
            topology.validate(),
            Err(Error::DuplicateIndex { index: 1 })
        ));
    }

    #[test]
    fn test_disk_differs_on_capacity_or_type() {
        let base = DiskSpec::new("/dev/sdb", 10).with_volume_type("gp3");
        assert!(!base.differs_from(&base.clone()));
        assert!(base.differs_from(&DiskSpec::new("/dev/sdb", 20).with_volume_type("gp3")));
        assert!(base.differs_from(&DiskSpec::new("/dev/sdb", 10).with_volume_type("io2")));
    }

    #[test]
    fn test_topology_deserializes() {
        let topology = fixture();
        assert_eq!(topology.hosts.len(), 2);
        assert!(topology.hosts[0].is_master());
        assert_eq!(topology.hosts[0].disks[0].kind, DiskKind::Root);
        assert_eq!(topology.hosts[1].index, None);
    }

    fn fixture() -> Topology {
        serde_json::from_str(
            r#"{
                "owner": { "id": "0b5c", "name": "demo" },
                "phase": "running",
                "hosts": [
                    {
                        "index": 0,
                        "roles": ["master"],
                        "count": 1,
                        "flavor": "t3.medium",
                        "image": "ami-1",
                        "disks": [{ "device": "/dev/sda", "capacity": 40, "kind": "root" }]
                    },
                    { "roles": ["node"], "count": 2, "flavor": "t3.large", "image": "ami-1" }
                ]
            }"#,
        )
        .unwrap()
    }
}
