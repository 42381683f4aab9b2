//! Progress reporting hooks
//!
//! The engine reports per-group progress through this trait so it can be
//! used without depending on a terminal UI.

use crate::error::Result;
use crate::planner::GroupPlan;

/// Progress callback for reconciliation passes
///
/// Host groups are reconciled on a worker pool, so callbacks arrive from
/// several threads at once and in no particular order.
pub trait ProgressCallback: Sync {
    /// Called before any provider call for a host group
    fn on_group_start(&self, plan: &GroupPlan);

    /// Called when a host group task finishes
    fn on_group_complete(&self, index: usize, result: &Result<()>);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_group_start(&self, _plan: &GroupPlan) {}
    fn on_group_complete(&self, _index: usize, _result: &Result<()>) {}
}
