//! Reconciliation engine - converges provider state to a topology
//!
//! Each host group index is an independent task on a rayon pool. Tasks are
//! never cancelled: when one fails, its siblings still run to completion
//! and the first error in index order is returned.

use std::slice;
use std::thread;
use std::time::Duration;

use rayon::prelude::*;

use crate::context::{NoProgress, ProgressCallback};
use crate::diff::{DiskAction, GroupPair, diff_disks, pair_groups};
use crate::driver::Driver;
use crate::error::{DriverError, Error, Result};
use crate::planner::{GroupAction, GroupPlan, plan_group, plan_removal};
use crate::retry::{RetryPolicy, with_retry};
use crate::types::{DiskSpec, HostGroup, InstanceStatus, OwnerContext, Topology, sort_by_index};

/// Options for a reconciliation pass
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOptions {
    /// Worker threads for host-group tasks
    pub jobs: usize,
    /// Retry policy for instance and volume create/delete calls
    pub retry: RetryPolicy,
    /// Pause after each volume modification
    pub volume_settle: Duration,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            jobs: 8,
            retry: RetryPolicy::default(),
            volume_settle: Duration::from_secs(5),
        }
    }
}

/// Result of [`Reconciler::reconcile_instance`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The topology declares no host groups
    Empty,
    /// The topology is being torn down elsewhere
    Terminating,
    /// Every group converged
    Converged {
        /// Fresh observed state, sorted by index
        observed: Vec<HostGroup>,
        /// Key material, only when the key pair was created by this pass
        private_key: Option<String>,
    },
}

impl Outcome {
    /// Observed groups after convergence, empty when nothing ran
    pub fn observed(&self) -> &[HostGroup] {
        match self {
            Self::Converged { observed, .. } => observed,
            Self::Empty | Self::Terminating => &[],
        }
    }
}

/// Converges provider resources to a desired topology
pub struct Reconciler<'p> {
    options: ApplyOptions,
    progress: &'p dyn ProgressCallback,
}

impl Reconciler<'static> {
    pub fn new(options: ApplyOptions) -> Self {
        Self {
            options,
            progress: &NoProgress,
        }
    }
}

impl Default for Reconciler<'static> {
    fn default() -> Self {
        Self::new(ApplyOptions::default())
    }
}

impl Reconciler<'_> {
    /// Report per-group progress to `progress`
    pub fn with_progress<'q>(self, progress: &'q dyn ProgressCallback) -> Reconciler<'q> {
        Reconciler {
            options: self.options,
            progress,
        }
    }

    pub fn options(&self) -> &ApplyOptions {
        &self.options
    }

    /// Run one full reconciliation pass for `topology`
    ///
    /// Missing indices are written back into `topology.hosts` so the caller
    /// can persist them. Any error aborts the pass; the caller re-invokes
    /// and already-converged groups are no-ops the next time.
    pub fn reconcile_instance(
        &self,
        topology: &mut Topology,
        driver: &dyn Driver,
    ) -> Result<Outcome> {
        if topology.hosts.is_empty() {
            log::debug!("{}: no host groups declared", topology.owner.label());
            return Ok(Outcome::Empty);
        }
        if topology.is_terminating() {
            log::info!("{}: terminating, skipping reconcile", topology.owner.label());
            return Ok(Outcome::Terminating);
        }

        if topology.assign_indices() {
            log::debug!("{}: assigned missing host group indices", topology.owner.label());
        }
        topology.validate()?;

        let owner = &topology.owner;
        let current = fetch_observed(driver, owner)?;
        let mut desired = topology.hosts.clone();
        sort_by_index(&mut desired);

        log::info!(
            "{}: reconciling {} host group(s) on {}",
            owner.label(),
            desired.len(),
            driver.name()
        );
        let private_key = self.reconcile_hosts(&current, &desired, owner, driver)?;

        let observed = fetch_observed(driver, owner)?;
        Ok(Outcome::Converged {
            observed,
            private_key,
        })
    }

    /// Converge every host group, one task per index
    ///
    /// Both slices must be sorted by index. The key pair is ensured once
    /// before any group task starts. If the pass then fails, a key pair
    /// created here is handed back inside [`Error::Incomplete`], since
    /// instances from sibling groups may already use it.
    pub fn reconcile_hosts(
        &self,
        current: &[HostGroup],
        desired: &[HostGroup],
        owner: &OwnerContext,
        driver: &dyn Driver,
    ) -> Result<Option<String>> {
        let private_key = driver
            .create_key_pair(owner)
            .map_err(|source| Error::Provider {
                operation: "create key pair",
                source,
            })?;
        if private_key.is_some() {
            log::info!("{}: created key pair", owner.label());
        }

        let pairs = pair_groups(desired, current);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs.max(1))
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()))?;

        let results: Vec<(usize, Result<()>)> = pool.install(|| {
            pairs
                .par_iter()
                .map(|pair| {
                    let result = self.reconcile_pair(pair, desired, owner, driver);
                    self.progress.on_group_complete(pair.index, &result);
                    (pair.index, result)
                })
                .collect()
        });

        let mut first_error = None;
        for (index, result) in results {
            if let Err(e) = result {
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    log::error!("host group {index}: {e}");
                }
            }
        }

        match (first_error, private_key) {
            (None, private_key) => Ok(private_key),
            (Some(e), None) => Err(e),
            (Some(e), Some(private_key)) => {
                log::warn!(
                    "{}: pass failed after creating a key pair, returning it with the error",
                    owner.label()
                );
                Err(Error::Incomplete {
                    error: Box::new(e),
                    private_key,
                })
            }
        }
    }

    fn reconcile_pair(
        &self,
        pair: &GroupPair<'_>,
        all_desired: &[HostGroup],
        owner: &OwnerContext,
        driver: &dyn Driver,
    ) -> Result<()> {
        let Some(desired) = pair.desired else {
            let plan = plan_removal(pair.index, pair.current);
            self.progress.on_group_start(&plan);
            return match pair.current {
                Some(current) if !plan.is_noop() => {
                    self.delete_instances(pair.index, current, driver)
                }
                _ => Ok(()),
            };
        };

        let plan = plan_group(desired, pair.current, all_desired)?;
        self.progress.on_group_start(&plan);
        if plan.is_noop() {
            log::debug!("host group {}: up to date", plan.index);
            return Ok(());
        }
        self.converge_group(&plan, desired, pair.current, owner, driver)
    }

    fn converge_group(
        &self,
        plan: &GroupPlan,
        desired: &HostGroup,
        current: Option<&HostGroup>,
        owner: &OwnerContext,
        driver: &dyn Driver,
    ) -> Result<()> {
        let index = plan.index;
        let mut survivors: Option<HostGroup> = None;

        for action in &plan.actions {
            match (action, current) {
                (GroupAction::Create { .. }, _) => {
                    self.create_instances(index, desired, owner, driver)?;
                }
                (GroupAction::Grow { count }, _) => {
                    self.create_instances(index, &desired.with_count(*count), owner, driver)?;
                }
                (
                    GroupAction::Rebuild {
                        from_image,
                        to_image,
                        count,
                    },
                    Some(current),
                ) => {
                    log::info!("host group {index}: image {from_image} -> {to_image}, rebuilding");
                    self.delete_instances(index, current, driver)?;
                    if *count > 0 {
                        self.create_instances(index, desired, owner, driver)?;
                    }
                }
                (GroupAction::Trim { victims }, Some(current)) => {
                    let (doomed, kept): (Vec<_>, Vec<_>) = current
                        .observed
                        .iter()
                        .cloned()
                        .partition(|i| victims.contains(&i.id));
                    self.delete_instances(index, &current.with_observed(doomed), driver)?;
                    survivors = Some(current.with_observed(kept));
                }
                (
                    GroupAction::Resize {
                        from_flavor,
                        to_flavor,
                    },
                    Some(current),
                ) => {
                    let live = survivors.as_ref().unwrap_or(current);
                    log::info!(
                        "host group {index}: resizing {} instance(s) {from_flavor} -> {to_flavor}",
                        live.observed.len()
                    );
                    driver
                        .modify_instances(live, desired)
                        .map_err(driver_error(index, "modify instances"))?;
                }
                (GroupAction::Disks(_), Some(current)) => {
                    // trimmed groups carry stale volume ids
                    let fresh;
                    let group = if survivors.is_some() {
                        match refetch_group(index, owner, driver)? {
                            Some(group) => {
                                fresh = group;
                                &fresh
                            }
                            None => {
                                log::warn!("host group {index}: gone after trim, skipping disks");
                                continue;
                            }
                        }
                    } else {
                        current
                    };
                    self.reconcile_disks(group, &desired.disks, driver)?;
                }
                (GroupAction::Remove { .. }, Some(current)) => {
                    self.delete_instances(index, current, driver)?;
                }
                (GroupAction::Reject { reason }, _) => {
                    log::warn!("host group {index}: {reason}");
                }
                (action, None) => {
                    log::warn!("host group {index}: nothing observed, skipping '{action}'");
                }
            }
        }
        Ok(())
    }

    /// Apply the disk diff for one observed group
    ///
    /// Returns the number of provider calls issued. Every modification is
    /// followed by the configured settle pause.
    pub fn reconcile_disks(
        &self,
        current: &HostGroup,
        desired: &[DiskSpec],
        driver: &dyn Driver,
    ) -> Result<usize> {
        let index = current.key();
        let actions = diff_disks(index, &current.disks, desired)?;
        let mut calls = 0;

        for action in &actions {
            match action {
                DiskAction::Modify {
                    current: from,
                    desired: to,
                } => {
                    log::info!("host group {index}: modifying volume {action}");
                    driver
                        .modify_volume(from, to)
                        .map_err(driver_error(index, "modify volume"))?;
                    calls += 1;
                    self.settle(index, &to.device);
                }
                DiskAction::Delete { disk } => {
                    if disk.volume_ids.is_empty() {
                        log::debug!("host group {index}: {} has no volumes to delete", disk.device);
                        continue;
                    }
                    log::info!(
                        "host group {index}: deleting {} ({})",
                        disk.device,
                        disk.volume_ids.join(", ")
                    );
                    with_retry(&self.options.retry, || driver.delete_volume(&disk.volume_ids))
                        .map_err(driver_error(index, "delete volume"))?;
                    calls += 1;
                }
                DiskAction::Create { disk } => {
                    log::info!(
                        "host group {index}: creating {} ({} GiB)",
                        disk.device,
                        disk.capacity
                    );
                    with_retry(&self.options.retry, || {
                        driver.create_volumes(current, slice::from_ref(disk))
                    })
                    .map_err(driver_error(index, "create volumes"))?;
                    calls += 1;
                }
            }
        }
        Ok(calls)
    }

    fn settle(&self, index: usize, device: &str) {
        let pause = self.options.volume_settle;
        if pause.is_zero() {
            return;
        }
        log::warn!("host group {index}: waiting {pause:?} for {device} to settle");
        thread::sleep(pause);
    }

    fn create_instances(
        &self,
        index: usize,
        group: &HostGroup,
        owner: &OwnerContext,
        driver: &dyn Driver,
    ) -> Result<()> {
        log::info!("host group {index}: creating {} instance(s)", group.count);
        with_retry(&self.options.retry, || driver.create_instances(group, owner))
            .map_err(driver_error(index, "create instances"))
    }

    fn delete_instances(&self, index: usize, group: &HostGroup, driver: &dyn Driver) -> Result<()> {
        log::info!(
            "host group {index}: deleting {} instance(s): {}",
            group.observed.len(),
            group.instance_ids().join(", ")
        );
        with_retry(&self.options.retry, || driver.delete_instances(group))
            .map_err(driver_error(index, "delete instances"))
    }
}

/// Fetch running instances for `owner`, sorted by index
///
/// A not-found answer from the provider means nothing exists yet.
pub fn fetch_observed(driver: &dyn Driver, owner: &OwnerContext) -> Result<Vec<HostGroup>> {
    let mut groups = match driver.get_instances(owner, InstanceStatus::Running) {
        Ok(groups) => groups,
        Err(e) if e.is_not_found() => {
            log::debug!("{}: no instances ({e})", owner.label());
            Vec::new()
        }
        Err(source) => {
            return Err(Error::Provider {
                operation: "get instances",
                source,
            });
        }
    };
    sort_by_index(&mut groups);
    Ok(groups)
}

fn refetch_group(
    index: usize,
    owner: &OwnerContext,
    driver: &dyn Driver,
) -> Result<Option<HostGroup>> {
    Ok(fetch_observed(driver, owner)?
        .into_iter()
        .find(|g| g.key() == index))
}

fn driver_error(index: usize, operation: &'static str) -> impl FnOnce(DriverError) -> Error {
    move |source| Error::Driver {
        operation,
        index,
        source,
    }
}
