use anyhow::Result;
use converge::{Plan, fetch_observed, sort_by_index};

use super::{Session, display_name};
use crate::Context;
use crate::cli::TopologyArgs;
use crate::ui;

/// Print what `apply` would change
pub fn run(ctx: &Context, args: &TopologyArgs) -> Result<()> {
    let mut session = Session::open(ctx, args)?;
    let plan = build(&mut session)?;

    if !ctx.quiet {
        ui::header(&format!(
            "Plan for {} ({})",
            display_name(&args.topology),
            session.provider
        ));
    }
    ui::display_plan(&plan);

    if ctx.verbose > 0 {
        for group in plan.groups.iter().filter(|g| g.is_noop()) {
            ui::dim(&format!("host group {} is up to date", group.index));
        }
    }

    if plan.has_rejections() {
        anyhow::bail!("Some host groups cannot be applied as declared");
    }
    Ok(())
}

/// Compute the plan for the session's topology
///
/// Missing indices are assigned on the in-memory copy only; `apply` is the
/// command that writes them back.
pub fn build(session: &mut Session) -> Result<Plan> {
    let topology = &mut session.topology;
    topology.assign_indices();
    topology.validate()?;

    let observed = fetch_observed(session.driver.as_ref(), &topology.owner)?;
    let mut desired = topology.hosts.clone();
    sort_by_index(&mut desired);

    Ok(Plan::build(&desired, &observed))
}
