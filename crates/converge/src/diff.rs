//! Diff computation for host groups and disks
//!
//! Host groups are matched by index. Disks are matched by device with a
//! sorted two-pointer merge, so each device is classified exactly once.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{Error, Result};
use crate::types::{DiskSpec, HostGroup};

/// One volume operation produced by the disk diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskAction {
    /// Same device, different capacity or storage class
    Modify { current: DiskSpec, desired: DiskSpec },
    /// Device observed but no longer declared
    Delete { disk: DiskSpec },
    /// Device declared but not observed
    Create { disk: DiskSpec },
}

impl DiskAction {
    pub fn device(&self) -> &str {
        match self {
            Self::Modify { desired, .. } => &desired.device,
            Self::Delete { disk } | Self::Create { disk } => &disk.device,
        }
    }

    pub fn is_addition(&self) -> bool {
        matches!(self, Self::Create { .. })
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }

    pub fn is_modification(&self) -> bool {
        matches!(self, Self::Modify { .. })
    }
}

impl fmt::Display for DiskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modify { current, desired } => write!(
                f,
                "~ {} {}GiB/{} -> {}GiB/{}",
                desired.device,
                current.capacity,
                display_type(&current.volume_type),
                desired.capacity,
                display_type(&desired.volume_type)
            ),
            Self::Delete { disk } => write!(f, "- {} {}GiB", disk.device, disk.capacity),
            Self::Create { disk } => write!(
                f,
                "+ {} {}GiB/{}",
                disk.device,
                disk.capacity,
                display_type(&disk.volume_type)
            ),
        }
    }
}

fn display_type(volume_type: &str) -> &str {
    if volume_type.is_empty() {
        "default"
    } else {
        volume_type
    }
}

/// Reject disk lists where one device appears twice
pub fn check_unique_devices(index: usize, disks: &[DiskSpec]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for disk in disks {
        if !seen.insert(disk.device.as_str()) {
            return Err(Error::DuplicateDevice {
                index,
                device: disk.device.clone(),
            });
        }
    }
    Ok(())
}

/// Diff observed disks against desired disks for the group at `index`
///
/// Both lists are sorted by device and merged with two pointers. Root disks
/// belong to their instance, so they are only ever modified here: a root
/// disk on one side only is skipped rather than created or deleted.
pub fn diff_disks(
    index: usize,
    current: &[DiskSpec],
    desired: &[DiskSpec],
) -> Result<Vec<DiskAction>> {
    check_unique_devices(index, current)?;
    check_unique_devices(index, desired)?;

    let mut cur: Vec<&DiskSpec> = current.iter().collect();
    let mut des: Vec<&DiskSpec> = desired.iter().collect();
    cur.sort_by(|a, b| a.device.cmp(&b.device));
    des.sort_by(|a, b| a.device.cmp(&b.device));

    let mut actions = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < cur.len() && j < des.len() {
        let (c, d) = (cur[i], des[j]);
        match c.device.cmp(&d.device) {
            std::cmp::Ordering::Equal => {
                if c.differs_from(d) {
                    actions.push(DiskAction::Modify {
                        current: c.clone(),
                        desired: d.clone(),
                    });
                }
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => {
                push_delete(&mut actions, index, c);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                push_create(&mut actions, index, d);
                j += 1;
            }
        }
    }
    for c in &cur[i..] {
        push_delete(&mut actions, index, c);
    }
    for d in &des[j..] {
        push_create(&mut actions, index, d);
    }

    Ok(actions)
}

fn push_delete(actions: &mut Vec<DiskAction>, index: usize, disk: &DiskSpec) {
    if disk.is_root() {
        log::debug!("group {}: keeping undeclared root disk {}", index, disk.device);
        return;
    }
    actions.push(DiskAction::Delete { disk: disk.clone() });
}

fn push_create(actions: &mut Vec<DiskAction>, index: usize, disk: &DiskSpec) {
    if disk.is_root() {
        log::debug!(
            "group {}: root disk {} is provisioned with the instance",
            index,
            disk.device
        );
        return;
    }
    actions.push(DiskAction::Create { disk: disk.clone() });
}

/// A desired group, an observed group, or both, sharing one index
#[derive(Debug, Clone, Copy)]
pub struct GroupPair<'a> {
    pub index: usize,
    pub desired: Option<&'a HostGroup>,
    pub current: Option<&'a HostGroup>,
}

impl GroupPair<'_> {
    /// Observed but no longer declared
    pub fn is_orphan(&self) -> bool {
        self.desired.is_none()
    }
}

/// Match desired and observed groups by index
///
/// Pairs for declared groups come first, in desired order, followed by
/// observed groups with no declared counterpart in index order.
pub fn pair_groups<'a>(
    desired: &'a [HostGroup],
    observed: &'a [HostGroup],
) -> Vec<GroupPair<'a>> {
    let by_index: BTreeMap<usize, &HostGroup> = observed.iter().map(|g| (g.key(), g)).collect();

    let mut pairs: Vec<GroupPair<'a>> = desired
        .iter()
        .map(|d| GroupPair {
            index: d.key(),
            desired: Some(d),
            current: by_index.get(&d.key()).copied(),
        })
        .collect();

    let declared: BTreeSet<usize> = desired.iter().map(HostGroup::key).collect();
    pairs.extend(
        by_index
            .into_iter()
            .filter(|(index, _)| !declared.contains(index))
            .map(|(index, current)| GroupPair {
                index,
                desired: None,
                current: Some(current),
            }),
    );
    pairs
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskDiffSummary {
    pub additions: usize,
    pub removals: usize,
    pub modifications: usize,
}

impl DiskDiffSummary {
    pub fn from_actions(actions: &[DiskAction]) -> Self {
        let mut summary = Self::default();
        for action in actions {
            match action {
                DiskAction::Create { .. } => summary.additions += 1,
                DiskAction::Delete { .. } => summary.removals += 1,
                DiskAction::Modify { .. } => summary.modifications += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }
}
