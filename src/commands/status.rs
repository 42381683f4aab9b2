use anyhow::Result;
use converge::{Usage, fetch_observed};

use super::{Session, display_name};
use crate::Context;
use crate::cli::TopologyArgs;
use crate::paths;
use crate::topology;
use crate::ui;

/// Show observed instances, disks and usage for a topology
pub fn run(ctx: &Context, args: &TopologyArgs) -> Result<()> {
    let session = Session::open(ctx, args)?;
    let owner = &session.topology.owner;
    let observed = fetch_observed(session.driver.as_ref(), owner)?;

    ui::header(&format!("Status of {}", display_name(&args.topology)));
    ui::kv("owner", &format!("{} ({})", owner.label(), owner.id));
    ui::kv("provider", session.provider.as_str());
    ui::kv(
        "declared",
        &format!(
            "{} group(s), {} instance(s)",
            session.topology.hosts.len(),
            session.topology.desired_instances()
        ),
    );

    if let Some(status) = topology::read_status(&paths::status_file(&args.topology))? {
        ui::kv(
            "last apply",
            &status.observed_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
    }

    ui::display_groups(&observed);

    let usage = Usage::from_groups(&observed, &session.config.flavors);
    ui::display_usage(&usage);

    if !ctx.quiet && session.config.flavors.is_empty() && usage.instances > 0 {
        ui::dim("Add [flavors.<name>] entries to the config to count vCPU and memory");
    }
    println!();
    Ok(())
}
