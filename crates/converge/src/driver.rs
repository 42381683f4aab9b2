//! Provider driver contract
//!
//! A driver is implemented once per cloud vendor. The engine only talks to
//! providers through this trait, so vendor SDK details stay out of the diff.

use crate::error::DriverResult;
use crate::types::{DiskSpec, HostGroup, InstanceStatus, OwnerContext};

/// Instance, volume and key pair lifecycle for one cloud provider
///
/// Every call is a blocking network request. Calls may be retried by the
/// engine, so implementations must tolerate being invoked again after a
/// partial success.
pub trait Driver: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Provision `group.count` instances from the group's flavor, arch and
    /// image, tagged with `owner`, the group index and its roles.
    fn create_instances(&self, group: &HostGroup, owner: &OwnerContext) -> DriverResult<()>;

    /// Terminate every instance listed in `group.observed`, releasing their
    /// volumes.
    fn delete_instances(&self, group: &HostGroup) -> DriverResult<()>;

    /// Resize the instances in `current.observed` to match `desired`.
    ///
    /// Providers that cannot resize live must stop, modify and start.
    fn modify_instances(&self, current: &HostGroup, desired: &HostGroup) -> DriverResult<()>;

    /// List instances tagged with `owner` in the given status, grouped back
    /// into host groups by their index tag with `disks` and `observed` filled.
    fn get_instances(
        &self,
        owner: &OwnerContext,
        status: InstanceStatus,
    ) -> DriverResult<Vec<HostGroup>>;

    /// Create `disks` and attach them to every instance in `group.observed`.
    fn create_volumes(&self, group: &HostGroup, disks: &[DiskSpec]) -> DriverResult<()>;

    /// Detach and delete the given volumes.
    fn delete_volume(&self, volume_ids: &[String]) -> DriverResult<()>;

    /// Resize and/or change the storage class of the volumes in
    /// `current.volume_ids`.
    ///
    /// Must return an error for changes the provider cannot apply while the
    /// volume is attached (such as shrinking) instead of ignoring them.
    fn modify_volume(&self, current: &DiskSpec, desired: &DiskSpec) -> DriverResult<()>;

    /// Ensure an SSH key pair exists for `owner`.
    ///
    /// Returns the private key material when a key was created, `None` when
    /// one already existed.
    fn create_key_pair(&self, owner: &OwnerContext) -> DriverResult<Option<String>>;

    /// Delete the key pair of `owner`, if any.
    fn delete_key_pair(&self, owner: &OwnerContext) -> DriverResult<()>;
}

impl<D: Driver + ?Sized> Driver for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn create_instances(&self, group: &HostGroup, owner: &OwnerContext) -> DriverResult<()> {
        (**self).create_instances(group, owner)
    }

    fn delete_instances(&self, group: &HostGroup) -> DriverResult<()> {
        (**self).delete_instances(group)
    }

    fn modify_instances(&self, current: &HostGroup, desired: &HostGroup) -> DriverResult<()> {
        (**self).modify_instances(current, desired)
    }

    fn get_instances(
        &self,
        owner: &OwnerContext,
        status: InstanceStatus,
    ) -> DriverResult<Vec<HostGroup>> {
        (**self).get_instances(owner, status)
    }

    fn create_volumes(&self, group: &HostGroup, disks: &[DiskSpec]) -> DriverResult<()> {
        (**self).create_volumes(group, disks)
    }

    fn delete_volume(&self, volume_ids: &[String]) -> DriverResult<()> {
        (**self).delete_volume(volume_ids)
    }

    fn modify_volume(&self, current: &DiskSpec, desired: &DiskSpec) -> DriverResult<()> {
        (**self).modify_volume(current, desired)
    }

    fn create_key_pair(&self, owner: &OwnerContext) -> DriverResult<Option<String>> {
        (**self).create_key_pair(owner)
    }

    fn delete_key_pair(&self, owner: &OwnerContext) -> DriverResult<()> {
        (**self).delete_key_pair(owner)
    }
}
