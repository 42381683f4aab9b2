use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use converge::ProviderKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hostfleet")]
#[command(version)]
#[command(about = "Converge cloud instances and volumes to a declared topology", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to ~/.config/hostfleet/config.toml)
    #[arg(short, long, global = true, env = "HOSTFLEET_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change, without touching the provider
    Plan(TopologyArgs),

    /// Converge provider resources to the topology
    Apply(ApplyArgs),

    /// Show observed instances, disks and resource usage
    Status(TopologyArgs),

    /// List provider kinds and whether a driver is available
    Providers,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct TopologyArgs {
    /// Topology file (TOML)
    pub topology: PathBuf,

    /// Provider to use instead of the configured one
    #[arg(short, long)]
    pub provider: Option<ProviderKind>,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub target: TopologyArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of host groups reconciled in parallel
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::parse_from([
            "hostfleet", "-vv", "apply", "fleet.toml", "--yes", "-j", "2", "-p", "local",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Apply(args) => {
                assert!(args.yes);
                assert_eq!(args.jobs, Some(2));
                assert_eq!(args.target.topology, PathBuf::from("fleet.toml"));
                assert_eq!(args.target.provider, Some(ProviderKind::Local));
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_unknown_provider_rejected() {
        assert!(Cli::try_parse_from(["hostfleet", "plan", "fleet.toml", "-p", "gcp"]).is_err());
    }
}
