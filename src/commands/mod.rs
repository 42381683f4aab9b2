pub mod apply;
pub mod plan;
pub mod providers;
pub mod status;

use anyhow::{Context as AnyhowContext, Result};
use converge::{Driver, ProviderKind, Registry, Topology};
use std::path::Path;

use crate::Context;
use crate::cli::TopologyArgs;
use crate::config::Config;
use crate::topology;

/// Loaded config, topology and the driver they select
pub struct Session {
    pub config: Config,
    pub provider: ProviderKind,
    pub driver: Box<dyn Driver>,
    pub topology: Topology,
}

impl Session {
    /// Load config and topology, then build the driver
    ///
    /// `--provider` on the command line wins over the config file.
    pub fn open(ctx: &Context, args: &TopologyArgs) -> Result<Self> {
        let config = Config::load(ctx.config_path.as_deref())?;
        let topology = topology::load(&args.topology)?;
        let provider = args.provider.unwrap_or(config.provider);
        let driver = open_driver(&config, provider)?;

        log::info!(
            "{}: using {} provider",
            topology.owner.label(),
            driver.name()
        );

        Ok(Self {
            config,
            provider,
            driver,
            topology,
        })
    }
}

fn open_driver(config: &Config, provider: ProviderKind) -> Result<Box<dyn Driver>> {
    let settings = config.provider_settings()?;
    Registry::with_builtin()
        .create(provider, &settings)
        .with_context(|| format!("Could not set up the {provider} provider"))
}

/// Topology file name for display
fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
