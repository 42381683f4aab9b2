//! Call-recording driver wrapper
//!
//! Wraps any [`Driver`], remembers every call in order, and can make the
//! next calls of an operation fail with a transient error.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::driver::Driver;
use crate::error::{DriverError, DriverResult};
use crate::types::{DiskSpec, HostGroup, InstanceStatus, OwnerContext};

/// Driver operations, for failure injection and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    CreateInstances,
    DeleteInstances,
    ModifyInstances,
    GetInstances,
    CreateVolumes,
    DeleteVolume,
    ModifyVolume,
    CreateKeyPair,
    DeleteKeyPair,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateInstances => "create_instances",
            Self::DeleteInstances => "delete_instances",
            Self::ModifyInstances => "modify_instances",
            Self::GetInstances => "get_instances",
            Self::CreateVolumes => "create_volumes",
            Self::DeleteVolume => "delete_volume",
            Self::ModifyVolume => "modify_volume",
            Self::CreateKeyPair => "create_key_pair",
            Self::DeleteKeyPair => "delete_key_pair",
        };
        f.write_str(name)
    }
}

/// One recorded driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    CreateInstances {
        index: usize,
        count: usize,
    },
    DeleteInstances {
        index: usize,
        instances: Vec<String>,
    },
    ModifyInstances {
        index: usize,
        flavor: String,
    },
    GetInstances {
        status: InstanceStatus,
    },
    CreateVolumes {
        index: usize,
        devices: Vec<String>,
    },
    DeleteVolume {
        volume_ids: Vec<String>,
    },
    ModifyVolume {
        device: String,
        capacity: u32,
    },
    /// `created` is false when the key pair already existed
    CreateKeyPair {
        created: bool,
    },
    DeleteKeyPair,
}

impl DriverCall {
    pub fn operation(&self) -> Operation {
        match self {
            Self::CreateInstances { .. } => Operation::CreateInstances,
            Self::DeleteInstances { .. } => Operation::DeleteInstances,
            Self::ModifyInstances { .. } => Operation::ModifyInstances,
            Self::GetInstances { .. } => Operation::GetInstances,
            Self::CreateVolumes { .. } => Operation::CreateVolumes,
            Self::DeleteVolume { .. } => Operation::DeleteVolume,
            Self::ModifyVolume { .. } => Operation::ModifyVolume,
            Self::CreateKeyPair { .. } => Operation::CreateKeyPair,
            Self::DeleteKeyPair => Operation::DeleteKeyPair,
        }
    }

    /// Host group index the call targeted, when it names one
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::CreateInstances { index, .. }
            | Self::DeleteInstances { index, .. }
            | Self::ModifyInstances { index, .. }
            | Self::CreateVolumes { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Whether the call changed provider state
    pub fn is_mutation(&self) -> bool {
        match self {
            Self::GetInstances { .. } => false,
            Self::CreateKeyPair { created } => *created,
            _ => true,
        }
    }
}

/// Driver wrapper that records calls and injects failures
pub struct RecordingDriver<D> {
    inner: D,
    calls: Mutex<Vec<DriverCall>>,
    failures: Mutex<BTreeMap<Operation, u32>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<D: Driver> RecordingDriver<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(BTreeMap::new()),
        }
    }

    /// The wrapped driver, for setting up state without recording
    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<DriverCall> {
        lock(&self.calls).clone()
    }

    /// Calls that changed provider state
    pub fn mutations(&self) -> Vec<DriverCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    /// Calls that targeted the host group at `index`
    pub fn calls_for(&self, index: usize) -> Vec<DriverCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.index() == Some(index))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.calls).clear();
    }

    /// Make the next `times` calls of `operation` fail without reaching
    /// the wrapped driver
    pub fn fail_next(&self, operation: Operation, times: u32) {
        lock(&self.failures).insert(operation, times);
    }

    fn injected(&self, operation: Operation) -> DriverResult<()> {
        let mut failures = lock(&self.failures);
        match failures.get_mut(&operation) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(DriverError::transient(format!("injected {operation} failure")))
            }
            _ => Ok(()),
        }
    }

    fn record(&self, call: DriverCall) {
        lock(&self.calls).push(call);
    }
}

impl<D: Driver> Driver for RecordingDriver<D> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn create_instances(&self, group: &HostGroup, owner: &OwnerContext) -> DriverResult<()> {
        self.record(DriverCall::CreateInstances {
            index: group.key(),
            count: group.count,
        });
        self.injected(Operation::CreateInstances)?;
        self.inner.create_instances(group, owner)
    }

    fn delete_instances(&self, group: &HostGroup) -> DriverResult<()> {
        self.record(DriverCall::DeleteInstances {
            index: group.key(),
            instances: group.instance_ids().into_iter().map(String::from).collect(),
        });
        self.injected(Operation::DeleteInstances)?;
        self.inner.delete_instances(group)
    }

    fn modify_instances(&self, current: &HostGroup, desired: &HostGroup) -> DriverResult<()> {
        self.record(DriverCall::ModifyInstances {
            index: current.key(),
            flavor: desired.flavor.clone(),
        });
        self.injected(Operation::ModifyInstances)?;
        self.inner.modify_instances(current, desired)
    }

    fn get_instances(
        &self,
        owner: &OwnerContext,
        status: InstanceStatus,
    ) -> DriverResult<Vec<HostGroup>> {
        self.record(DriverCall::GetInstances { status });
        self.injected(Operation::GetInstances)?;
        self.inner.get_instances(owner, status)
    }

    fn create_volumes(&self, group: &HostGroup, disks: &[DiskSpec]) -> DriverResult<()> {
        self.record(DriverCall::CreateVolumes {
            index: group.key(),
            devices: disks.iter().map(|d| d.device.clone()).collect(),
        });
        self.injected(Operation::CreateVolumes)?;
        self.inner.create_volumes(group, disks)
    }

    fn delete_volume(&self, volume_ids: &[String]) -> DriverResult<()> {
        self.record(DriverCall::DeleteVolume {
            volume_ids: volume_ids.to_vec(),
        });
        self.injected(Operation::DeleteVolume)?;
        self.inner.delete_volume(volume_ids)
    }

    fn modify_volume(&self, current: &DiskSpec, desired: &DiskSpec) -> DriverResult<()> {
        self.record(DriverCall::ModifyVolume {
            device: desired.device.clone(),
            capacity: desired.capacity,
        });
        self.injected(Operation::ModifyVolume)?;
        self.inner.modify_volume(current, desired)
    }

    fn create_key_pair(&self, owner: &OwnerContext) -> DriverResult<Option<String>> {
        let result = self
            .injected(Operation::CreateKeyPair)
            .and_then(|()| self.inner.create_key_pair(owner));
        self.record(DriverCall::CreateKeyPair {
            created: matches!(result, Ok(Some(_))),
        });
        result
    }

    fn delete_key_pair(&self, owner: &OwnerContext) -> DriverResult<()> {
        self.record(DriverCall::DeleteKeyPair);
        self.injected(Operation::DeleteKeyPair)?;
        self.inner.delete_key_pair(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedDriver;

    fn owner() -> OwnerContext {
        OwnerContext::new("1679091c", "demo")
    }

    #[test]
    fn test_records_calls_in_order() {
        let driver = RecordingDriver::new(SimulatedDriver::in_memory());
        let group = HostGroup::new(1, 2).with_image("img-1");

        driver.create_key_pair(&owner()).unwrap();
        driver.create_instances(&group, &owner()).unwrap();
        driver
            .get_instances(&owner(), InstanceStatus::Running)
            .unwrap();

        assert_eq!(
            driver.calls(),
            vec![
                DriverCall::CreateKeyPair { created: true },
                DriverCall::CreateInstances { index: 1, count: 2 },
                DriverCall::GetInstances {
                    status: InstanceStatus::Running
                },
            ]
        );
        assert_eq!(driver.mutations().len(), 2);
        assert_eq!(driver.calls_for(1).len(), 1);
    }

    #[test]
    fn test_existing_key_pair_is_not_a_mutation() {
        let driver = RecordingDriver::new(SimulatedDriver::in_memory());
        driver.create_key_pair(&owner()).unwrap();
        driver.clear();

        driver.create_key_pair(&owner()).unwrap();
        assert!(driver.mutations().is_empty());
    }

    #[test]
    fn test_injected_failures_run_out() {
        let driver = RecordingDriver::new(SimulatedDriver::in_memory());
        let group = HostGroup::new(0, 1).with_image("img-1");
        driver.fail_next(Operation::CreateInstances, 2);

        assert!(driver.create_instances(&group, &owner()).unwrap_err().is_retryable());
        assert!(driver.create_instances(&group, &owner()).is_err());
        assert!(driver.create_instances(&group, &owner()).is_ok());
        assert_eq!(driver.inner().snapshot().instances.len(), 1);
    }
}
