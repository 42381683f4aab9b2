use anyhow::{Context as AnyhowContext, Result};
use converge::{Outcome, Reconciler};
use dialoguer::Confirm;
use std::fs;
use std::path::{Path, PathBuf};

use super::{Session, display_name};
use crate::Context;
use crate::cli::ApplyArgs;
use crate::paths;
use crate::progress::{self, GroupProgress};
use crate::topology::{self, StatusFile};
use crate::ui;

/// Converge the provider to the topology file
pub fn run(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let path = args.target.topology.as_path();
    let mut session = Session::open(ctx, &args.target)?;
    let missing_indices = session.topology.hosts.iter().any(|g| g.index.is_none());

    if session.topology.is_terminating() {
        ui::warn(&format!(
            "{} is terminating, nothing to apply",
            display_name(path)
        ));
        return Ok(());
    }

    let pb = progress::spinner("Fetching observed state...");
    let plan = match super::plan::build(&mut session) {
        Ok(plan) => {
            progress::finish_success(&pb, "Observed state fetched");
            plan
        }
        Err(e) => {
            progress::finish_error(&pb, "Could not compute plan");
            return Err(e);
        }
    };

    if !ctx.quiet {
        ui::header(&format!("Apply {} ({})", display_name(path), session.provider));
    }
    ui::display_plan(&plan);

    if plan.has_rejections() {
        anyhow::bail!("Some host groups cannot be applied as declared, nothing was changed");
    }

    if plan.is_empty() {
        if missing_indices {
            save_indices(path, &session)?;
        }
        return Ok(());
    }

    if !args.yes && !confirm_proceed()? {
        ui::info("Aborted");
        return Ok(());
    }

    let options = session.config.apply_options(args.jobs);
    log::debug!(
        "apply options: jobs={}, retries={}, settle={:?}",
        options.jobs,
        options.retry.max_attempts,
        options.volume_settle
    );

    let group_progress = GroupProgress::new(plan.groups.len());
    let reconciler = Reconciler::new(options).with_progress(&group_progress);
    let result = reconciler.reconcile_instance(&mut session.topology, session.driver.as_ref());
    group_progress.finish();

    if missing_indices {
        save_indices(path, &session)?;
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            if let Some(key) = e.private_key() {
                save_private_key(path, key)?;
            }
            match e.category() {
                Some(category) => ui::error(&format!("{e} ({})", category.advice())),
                None => ui::error(&e.to_string()),
            }
            return Err(e).context("Apply failed, re-run to resume from the observed state");
        }
    };

    match outcome {
        Outcome::Empty => ui::info("No host groups declared"),
        Outcome::Terminating => ui::warn("Topology is terminating, nothing applied"),
        Outcome::Converged {
            observed,
            private_key,
        } => {
            if let Some(key) = private_key {
                save_private_key(path, &key)?;
            }

            let status_path = paths::status_file(path);
            let instances: usize = observed.iter().map(|g| g.observed.len()).sum();
            let owner = session.topology.owner.clone();
            let status = StatusFile::new(owner, session.provider, observed);
            topology::write_status(&status_path, &status)?;

            println!();
            ui::success(&format!(
                "Converged {} host group(s), {} instance(s)",
                status.hosts.len(),
                instances
            ));
            ui::dim(&format!("Status written to {}", status_path.display()));
        }
    }

    Ok(())
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

fn save_indices(path: &Path, session: &Session) -> Result<()> {
    topology::save(path, &session.topology)?;
    log::info!("wrote assigned host group indices to {}", path.display());
    Ok(())
}

/// Save a newly created private key next to the topology file
fn save_private_key(topology: &Path, key: &str) -> Result<PathBuf> {
    let key_path = paths::key_file(topology);
    write_private_key(&key_path, key)?;
    ui::info(&format!(
        "New key pair, private key saved to {}",
        key_path.display()
    ));
    Ok(key_path)
}

fn write_private_key(path: &Path, key: &str) -> Result<()> {
    fs::write(path, key).with_context(|| format!("Could not write {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Could not restrict permissions on {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_key_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.key");
        write_private_key(&path, "-----BEGIN KEY-----").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "-----BEGIN KEY-----");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_key_from_failed_pass_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let topology = dir.path().join("fleet.toml");
        let err = converge::Error::Incomplete {
            error: Box::new(converge::Error::LoneMaster { index: 0 }),
            private_key: "-----BEGIN KEY-----".to_string(),
        };

        let key_path = save_private_key(&topology, err.private_key().unwrap()).unwrap();
        assert_eq!(key_path, dir.path().join("fleet.key"));
        assert_eq!(fs::read_to_string(&key_path).unwrap(), "-----BEGIN KEY-----");
    }
}
