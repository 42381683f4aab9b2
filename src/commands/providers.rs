use anyhow::Result;
use colored::Colorize;
use converge::{ProviderKind, Registry};

use crate::Context;
use crate::config::Config;
use crate::ui;

/// List provider kinds and whether a driver is registered
pub fn run(ctx: &Context) -> Result<()> {
    let config = Config::load(ctx.config_path.as_deref())?;
    let registry = Registry::with_builtin();

    ui::header("Providers");
    for kind in ProviderKind::ALL {
        let available = if registry.is_registered(kind) {
            "available".green()
        } else {
            "no driver".dimmed()
        };
        let marker = if kind == config.provider {
            " (configured)".cyan().to_string()
        } else {
            String::new()
        };
        println!("  {:<8} {}{}", kind.as_str().bold(), available, marker);
    }

    if !registry.is_registered(config.provider) {
        println!();
        ui::warn(&format!(
            "The configured provider '{}' has no driver; apply and status will fail",
            config.provider
        ));
    }
    Ok(())
}
