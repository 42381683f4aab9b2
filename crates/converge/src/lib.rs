//! # Converge
//!
//! Reconciles cloud compute instances and their block volumes against a
//! declared topology.
//!
//! ## Core Concepts
//!
//! - **HostGroup**: identically-configured instances sharing one index
//! - **Driver**: the per-vendor instance, volume and key pair lifecycle
//! - **Planner**: decides the steps each host group needs
//! - **Reconciler**: runs those steps, one task per host group
//!
//! Ownership lives only in provider tags; nothing is stored locally, so
//! every pass starts from freshly observed state and re-running is safe.
//!
//! ## Example
//!
//! ```ignore
//! use converge::{
//!     ApplyOptions, HostGroup, OwnerContext, Reconciler, SimulatedDriver, Topology,
//! };
//!
//! let mut topology = Topology::new(
//!     OwnerContext::new("0b5c7a", "demo"),
//!     vec![HostGroup::new(0, 1).with_roles(["master"]).with_image("img-1")],
//! );
//! let driver = SimulatedDriver::in_memory();
//!
//! let outcome = Reconciler::new(ApplyOptions::default())
//!     .reconcile_instance(&mut topology, &driver)?;
//! println!("{} group(s) running", outcome.observed().len());
//! ```

pub mod context;
pub mod diff;
pub mod driver;
pub mod error;
pub mod executor;
pub mod planner;
pub mod recording;
pub mod registry;
pub mod retry;
pub mod simulated;
pub mod tags;
pub mod types;
pub mod usage;

pub use context::{NoProgress, ProgressCallback};
pub use diff::{DiskAction, DiskDiffSummary, GroupPair, diff_disks, pair_groups};
pub use driver::Driver;
pub use error::{DriverError, DriverResult, Error, ErrorCategory, Result};
pub use executor::{ApplyOptions, Outcome, Reconciler, fetch_observed};
pub use planner::{GroupAction, GroupPlan, Plan, plan, plan_group};
pub use recording::{DriverCall, Operation, RecordingDriver};
pub use registry::{ProviderKind, ProviderSettings, Registry};
pub use retry::{RetryPolicy, retry, with_retry};
pub use simulated::{CloudState, SimulatedDriver};
pub use types::{
    AddressKind, DiskKind, DiskSpec, HostGroup, InstanceMetadata, InstanceStatus, IpAddress,
    OwnerContext, Phase, Topology, find_by_index, sort_by_index,
};
pub use usage::{FlavorCatalog, FlavorSpec, Usage};
