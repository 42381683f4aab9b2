//! Ownership tags written onto provider resources
//!
//! Tags are the only link between observed resources and the desired
//! topology: there is no local mapping table. They are written once at
//! creation and never changed.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{DiskSpec, HostGroup, OwnerContext};

pub const OWNER_TAG: &str = "hostfleet.io/owner";
pub const OWNER_NAME_TAG: &str = "hostfleet.io/owner-name";
pub const INDEX_TAG: &str = "hostfleet.io/index";
pub const ROLE_TAG_PREFIX: &str = "hostfleet.io/role.";
pub const ROOT_VOLUME_TAG: &str = "hostfleet.io/root-volume";
pub const TRUE_VALUE: &str = "true";

/// Key/value tags as stored on a provider resource
pub type Tags = BTreeMap<String, String>;

/// Ownership recovered from a resource's tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    pub index: usize,
    pub roles: BTreeSet<String>,
}

/// Tags for an instance of `group` owned by `owner`
pub fn instance_tags(owner: &OwnerContext, group: &HostGroup) -> Tags {
    let mut tags = Tags::new();
    tags.insert(OWNER_TAG.to_string(), owner.id.clone());
    tags.insert(OWNER_NAME_TAG.to_string(), owner.label().to_string());
    tags.insert(INDEX_TAG.to_string(), group.key().to_string());
    for role in &group.roles {
        tags.insert(format!("{ROLE_TAG_PREFIX}{role}"), TRUE_VALUE.to_string());
    }
    tags
}

/// Tags for a volume attached to an instance carrying `instance`'s tags
pub fn volume_tags(instance: &Tags, disk: &DiskSpec) -> Tags {
    let mut tags = instance.clone();
    if disk.is_root() {
        tags.insert(ROOT_VOLUME_TAG.to_string(), TRUE_VALUE.to_string());
    }
    tags
}

/// Whether the tags claim the resource for `owner`
pub fn is_owned_by(owner: &OwnerContext, tags: &Tags) -> bool {
    tags.get(OWNER_TAG).is_some_and(|id| *id == owner.id)
}

/// Recover index and roles from tags owned by `owner`
///
/// Returns `None` when the owner tag is missing or foreign, or the index tag
/// is absent or malformed; such resources are neither adopted nor deleted.
pub fn parse_instance_tags(owner: &OwnerContext, tags: &Tags) -> Option<Ownership> {
    if !is_owned_by(owner, tags) {
        return None;
    }
    let index = tags.get(INDEX_TAG)?.parse().ok()?;
    let roles = tags
        .iter()
        .filter(|(_, value)| value.as_str() == TRUE_VALUE)
        .filter_map(|(key, _)| key.strip_prefix(ROLE_TAG_PREFIX))
        .map(str::to_string)
        .collect();
    Some(Ownership { index, roles })
}
