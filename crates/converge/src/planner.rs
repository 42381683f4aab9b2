//! Execution planner - decides what each host group needs
//!
//! The engine and the dry-run display share [`plan_group`], so a printed
//! plan is exactly what `apply` would start doing.

use std::fmt;

use crate::diff::{DiskAction, pair_groups};
use crate::error::{Error, Result};
use crate::types::HostGroup;

/// One step of a host group's convergence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupAction {
    /// Nothing observed: create the whole group
    Create { count: usize },
    /// Image changed: delete every instance, then create the group again
    Rebuild {
        from_image: String,
        to_image: String,
        count: usize,
    },
    /// Too many instances: delete these
    Trim { victims: Vec<String> },
    /// Too few instances: create this many more
    Grow { count: usize },
    /// Flavor changed: resize in place
    Resize {
        from_flavor: String,
        to_flavor: String,
    },
    /// Volume operations, in ascending device order
    Disks(Vec<DiskAction>),
    /// Observed but no longer declared: delete every instance
    Remove { instances: usize },
    /// Input cannot be applied; no provider call is made
    Reject { reason: String },
}

impl GroupAction {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Reject { .. })
    }
}

impl fmt::Display for GroupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { count } => write!(f, "create {count} instance(s)"),
            Self::Rebuild {
                from_image,
                to_image,
                count,
            } => write!(
                f,
                "rebuild on image {to_image} (was {from_image}), {count} instance(s)"
            ),
            Self::Trim { victims } => {
                write!(f, "delete {} instance(s): {}", victims.len(), victims.join(", "))
            }
            Self::Grow { count } => write!(f, "create {count} more instance(s)"),
            Self::Resize {
                from_flavor,
                to_flavor,
            } => write!(f, "resize {from_flavor} -> {to_flavor}"),
            Self::Disks(actions) => {
                let parts: Vec<String> = actions.iter().map(ToString::to_string).collect();
                write!(f, "disks: {}", parts.join("; "))
            }
            Self::Remove { instances } => {
                write!(f, "remove group ({instances} instance(s))")
            }
            Self::Reject { reason } => write!(f, "rejected: {reason}"),
        }
    }
}

/// Planned steps for one host group index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPlan {
    pub index: usize,
    pub actions: Vec<GroupAction>,
}

impl GroupPlan {
    pub fn is_noop(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Plans for every declared and observed index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub groups: Vec<GroupPlan>,
}

impl Plan {
    /// Plan convergence without touching the provider
    ///
    /// Groups whose input is invalid get a single [`GroupAction::Reject`]
    /// instead of failing the whole plan.
    pub fn build(desired: &[HostGroup], observed: &[HostGroup]) -> Self {
        let groups = pair_groups(desired, observed)
            .into_iter()
            .map(|pair| match pair.desired {
                Some(d) => plan_group(d, pair.current, desired).unwrap_or_else(|e| GroupPlan {
                    index: pair.index,
                    actions: vec![GroupAction::Reject {
                        reason: e.to_string(),
                    }],
                }),
                None => plan_removal(pair.index, pair.current),
            })
            .collect();
        Self { groups }
    }

    /// Groups that need at least one step
    pub fn changed(&self) -> impl Iterator<Item = &GroupPlan> {
        self.groups.iter().filter(|g| !g.is_noop())
    }

    pub fn total_actions(&self) -> usize {
        self.groups.iter().map(|g| g.actions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_actions() == 0
    }

    pub fn has_rejections(&self) -> bool {
        self.groups
            .iter()
            .flat_map(|g| &g.actions)
            .any(|a| !a.is_mutation())
    }
}

/// Plan convergence of `desired` against `observed`
pub fn plan(desired: &[HostGroup], observed: &[HostGroup]) -> Plan {
    Plan::build(desired, observed)
}

/// Whether scaling `group` to zero would leave the topology without masters
fn is_lone_master_at_zero(group: &HostGroup, all_desired: &[HostGroup]) -> bool {
    group.is_master()
        && group.count == 0
        && all_desired
            .iter()
            .filter(|g| g.is_master())
            .all(|g| g.count == 0)
}

/// Plan a declared group against its observed counterpart
///
/// Fails with [`Error::LoneMaster`] when the group is the only master group
/// and declares zero instances, and with [`Error::DuplicateDevice`] on
/// repeated disk devices. Both are raised before any provider call.
pub fn plan_group(
    desired: &HostGroup,
    current: Option<&HostGroup>,
    all_desired: &[HostGroup],
) -> Result<GroupPlan> {
    let index = desired.key();
    if is_lone_master_at_zero(desired, all_desired) {
        return Err(Error::LoneMaster { index });
    }
    crate::diff::check_unique_devices(index, &desired.disks)?;

    let mut actions = Vec::new();

    let Some(current) = current else {
        if desired.count > 0 {
            actions.push(GroupAction::Create {
                count: desired.count,
            });
        }
        return Ok(GroupPlan { index, actions });
    };

    if current.image != desired.image {
        actions.push(GroupAction::Rebuild {
            from_image: current.image.clone(),
            to_image: desired.image.clone(),
            count: desired.count,
        });
        return Ok(GroupPlan { index, actions });
    }

    if desired.count < current.count {
        let excess = current.count - desired.count;
        let victims = current
            .observed
            .iter()
            .rev()
            .take(excess)
            .map(|i| i.id.clone())
            .collect();
        actions.push(GroupAction::Trim { victims });
        if desired.count == 0 {
            return Ok(GroupPlan { index, actions });
        }
    } else if desired.count > current.count {
        actions.push(GroupAction::Grow {
            count: desired.count - current.count,
        });
    }

    if !desired.flavor.is_empty() && current.flavor != desired.flavor {
        actions.push(GroupAction::Resize {
            from_flavor: current.flavor.clone(),
            to_flavor: desired.flavor.clone(),
        });
    }

    let disks = crate::diff::diff_disks(index, &current.disks, &desired.disks)?;
    if !disks.is_empty() {
        actions.push(GroupAction::Disks(disks));
    }

    Ok(GroupPlan { index, actions })
}

/// Plan deletion of an observed group that is no longer declared
pub fn plan_removal(index: usize, current: Option<&HostGroup>) -> GroupPlan {
    let actions = current
        .map(|c| {
            vec![GroupAction::Remove {
                instances: c.count,
            }]
        })
        .unwrap_or_default();
    GroupPlan { index, actions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DiskSpec, InstanceMetadata, InstanceStatus};

    fn observed(index: usize, count: usize) -> HostGroup {
        let instances = (0..count)
            .map(|n| InstanceMetadata {
                id: format!("i-{index}-{n}"),
                addresses: Vec::new(),
                status: InstanceStatus::Running,
                disk_ids: Vec::new(),
                labels: Default::default(),
            })
            .collect();
        HostGroup::new(index, count)
            .with_image("img-1")
            .with_flavor("small")
            .with_observed(instances)
    }

    fn desired(index: usize, count: usize) -> HostGroup {
        HostGroup::new(index, count)
            .with_image("img-1")
            .with_flavor("small")
    }

    #[test]
    fn test_absent_group_is_created() {
        let des = desired(0, 1).with_roles(["master"]);
        let plan = plan_group(&des, None, std::slice::from_ref(&des)).unwrap();
        assert_eq!(plan.actions, vec![GroupAction::Create { count: 1 }]);
    }

    #[test]
    fn test_converged_group_is_noop() {
        let des = desired(0, 2);
        let cur = observed(0, 2);
        let plan = plan_group(&des, Some(&cur), &[des.clone()]).unwrap();
        assert!(plan.is_noop());
    }

    #[test]
    fn test_trim_picks_newest_instances() {
        let des = desired(1, 2);
        let cur = observed(1, 3);
        let plan = plan_group(&des, Some(&cur), &[des.clone()]).unwrap();
        assert_eq!(
            plan.actions,
            vec![GroupAction::Trim {
                victims: vec!["i-1-2".to_string()]
            }]
        );
    }

    #[test]
    fn test_image_change_rebuilds_only() {
        let des = desired(0, 3).with_image("img-2").with_flavor("large");
        let cur = observed(0, 1);
        let plan = plan_group(&des, Some(&cur), &[des.clone()]).unwrap();
        assert_eq!(plan.actions.len(), 1);
        assert!(matches!(plan.actions[0], GroupAction::Rebuild { count: 3, .. }));
    }

    #[test]
    fn test_grow_then_resize_then_disks() {
        let des = desired(0, 3)
            .with_flavor("large")
            .with_disks(vec![DiskSpec::new("/dev/sdb", 10)]);
        let cur = observed(0, 1);
        let plan = plan_group(&des, Some(&cur), &[des.clone()]).unwrap();

        assert_eq!(plan.actions.len(), 3);
        assert_eq!(plan.actions[0], GroupAction::Grow { count: 2 });
        assert!(matches!(plan.actions[1], GroupAction::Resize { .. }));
        assert!(matches!(plan.actions[2], GroupAction::Disks(ref d) if d.len() == 1));
    }

    #[test]
    fn test_trim_to_zero_skips_disks() {
        let des = desired(1, 0).with_disks(vec![DiskSpec::new("/dev/sdb", 10)]);
        let cur = observed(1, 2);
        let plan = plan_group(&des, Some(&cur), &[des.clone()]).unwrap();
        assert_eq!(plan.actions.len(), 1);
        assert!(matches!(plan.actions[0], GroupAction::Trim { ref victims } if victims.len() == 2));
    }

    #[test]
    fn test_lone_master_at_zero_is_rejected() {
        let des = desired(0, 0).with_roles(["master"]);
        let cur = observed(0, 1);
        let err = plan_group(&des, Some(&cur), &[des.clone()]).unwrap_err();
        assert!(matches!(err, Error::LoneMaster { index: 0 }));
    }

    #[test]
    fn test_zero_master_allowed_when_another_master_remains() {
        let old = desired(0, 0).with_roles(["master"]);
        let new = desired(1, 3).with_roles(["master"]);
        let cur = observed(0, 1);
        let plan = plan_group(&old, Some(&cur), &[old.clone(), new]).unwrap();
        assert!(matches!(plan.actions[0], GroupAction::Trim { .. }));
    }

    #[test]
    fn test_plan_build_marks_orphans_and_rejections() {
        let desired_groups = vec![desired(0, 0).with_roles(["master"]), desired(1, 2)];
        let observed_groups = vec![observed(1, 2), observed(2, 1)];

        let plan = Plan::build(&desired_groups, &observed_groups);
        assert_eq!(plan.groups.len(), 3);
        assert!(matches!(plan.groups[0].actions[0], GroupAction::Reject { .. }));
        assert!(plan.groups[1].is_noop());
        assert_eq!(
            plan.groups[2].actions,
            vec![GroupAction::Remove { instances: 1 }]
        );
        assert!(plan.has_rejections());
        assert_eq!(plan.changed().count(), 2);
    }
}
