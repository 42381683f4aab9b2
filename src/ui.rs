use colored::{ColoredString, Colorize};
use converge::{AddressKind, DiskAction, GroupAction, HostGroup, Plan, Usage};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Plan Display
// ============================================================================

fn action_symbol(action: &GroupAction) -> ColoredString {
    match action {
        GroupAction::Create { .. } | GroupAction::Grow { .. } => "+".green(),
        GroupAction::Trim { .. } | GroupAction::Remove { .. } => "-".red(),
        GroupAction::Rebuild { .. } | GroupAction::Resize { .. } | GroupAction::Disks(_) => {
            "~".yellow()
        }
        GroupAction::Reject { .. } => "!".red().bold(),
    }
}

fn disk_symbol(action: &DiskAction) -> ColoredString {
    if action.is_addition() {
        "+".green()
    } else if action.is_removal() {
        "-".red()
    } else {
        "~".yellow()
    }
}

/// Print a plan grouped by host group index
pub fn display_plan(plan: &Plan) {
    if plan.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Reconciliation Plan".bold()
    );
    println!("│");

    for group in plan.changed() {
        println!("│ {}", format!("host group {}", group.index).bold());
        for action in &group.actions {
            match action {
                GroupAction::Disks(disks) => {
                    println!("│   {} disks", action_symbol(action));
                    for disk in disks {
                        println!("│       {} {}", disk_symbol(disk), disk.to_string().dimmed());
                    }
                }
                _ => println!("│   {} {}", action_symbol(action), action),
            }
        }
        println!("│");
    }

    let rejected = plan
        .groups
        .iter()
        .flat_map(|g| &g.actions)
        .filter(|a| !a.is_mutation())
        .count();

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} change(s) across {} group(s), {} rejected",
        plan.total_actions().saturating_sub(rejected).to_string().bold(),
        plan.changed().count().to_string().green(),
        rejected.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

// ============================================================================
// Observed State Display
// ============================================================================

/// Print observed host groups with their instances and disks
pub fn display_groups(groups: &[HostGroup]) {
    if groups.is_empty() {
        dim("No instances found");
        return;
    }

    for group in groups {
        let roles: Vec<&str> = group.roles.iter().map(String::as_str).collect();
        section(&format!(
            "host group {} [{}]",
            group.key(),
            if roles.is_empty() {
                "-".to_string()
            } else {
                roles.join(", ")
            }
        ));
        kv("flavor", &group.flavor);
        kv("image", &group.image);
        kv("instances", &group.observed.len().to_string());

        for instance in &group.observed {
            let private = instance
                .address(AddressKind::Private)
                .map_or_else(|| "-".to_string(), |a| a.to_string());
            let public = instance
                .address(AddressKind::Public)
                .map_or_else(|| "-".to_string(), |a| a.to_string());
            println!(
                "    {} {:<14} {:<10} {:<16} {}",
                "•".cyan(),
                instance.id,
                instance.status.to_string().green(),
                private,
                public.dimmed()
            );
        }

        for disk in &group.disks {
            let volume_type = if disk.volume_type.is_empty() {
                String::new()
            } else {
                format!(" {}", disk.volume_type)
            };
            dim(&format!(
                "{} {} GiB{} ({}, {} volume(s))",
                disk.device,
                disk.capacity,
                volume_type,
                if disk.is_root() { "root" } else { "data" },
                disk.volume_ids.len()
            ));
        }
    }
}

/// Print a resource usage summary
pub fn display_usage(usage: &Usage) {
    section("Usage");
    kv("instances", &usage.instances.to_string());
    kv("vCPU", &usage.cpu.to_string());
    kv("memory", &format_gib(usage.memory_gib));
    kv("volumes", &format!("{} GiB", usage.volume_gib));

    for (flavor, count) in &usage.unknown_flavors {
        let name = if flavor.is_empty() { "(none)" } else { flavor };
        warn(&format!(
            "flavor {name} is not in the catalog, {count} instance(s) not counted"
        ));
    }
}

/// Format a GiB amount, dropping a zero fraction
pub fn format_gib(gib: f64) -> String {
    if gib.fract() == 0.0 {
        format!("{gib:.0} GiB")
    } else {
        format!("{gib:.1} GiB")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_gib() {
        assert_eq!(format_gib(0.0), "0 GiB");
        assert_eq!(format_gib(16.0), "16 GiB");
        assert_eq!(format_gib(0.5), "0.5 GiB");
        assert_eq!(format_gib(12.3), "12.3 GiB");
    }

    #[test]
    fn test_action_symbols() {
        colored::control::set_override(false);
        assert_eq!(action_symbol(&GroupAction::Create { count: 1 }).to_string(), "+");
        assert_eq!(
            action_symbol(&GroupAction::Remove { instances: 2 }).to_string(),
            "-"
        );
        assert_eq!(
            action_symbol(&GroupAction::Resize {
                from_flavor: "a".into(),
                to_flavor: "b".into()
            })
            .to_string(),
            "~"
        );
    }
}
