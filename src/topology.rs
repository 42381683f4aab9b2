//! Topology and status files

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use converge::{HostGroup, OwnerContext, ProviderKind, Topology};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Observed state persisted after `apply`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusFile {
    pub owner: OwnerContext,
    pub provider: ProviderKind,
    pub observed_at: DateTime<Utc>,
    pub hosts: Vec<HostGroup>,
}

impl StatusFile {
    pub fn new(owner: OwnerContext, provider: ProviderKind, hosts: Vec<HostGroup>) -> Self {
        Self {
            owner,
            provider,
            observed_at: Utc::now(),
            hosts,
        }
    }
}

/// Read a topology file
pub fn load(path: &Path) -> Result<Topology> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    let topology: Topology = toml::from_str(&content)
        .with_context(|| format!("Invalid topology in {}", path.display()))?;
    if topology.owner.id.trim().is_empty() {
        anyhow::bail!("{}: owner.id must not be empty", path.display());
    }
    Ok(topology)
}

/// Write a topology file back, e.g. after indices were assigned
pub fn save(path: &Path, topology: &Topology) -> Result<()> {
    let content = toml::to_string_pretty(topology).context("Failed to serialize topology")?;
    fs::write(path, content).with_context(|| format!("Could not write {}", path.display()))
}

pub fn write_status(path: &Path, status: &StatusFile) -> Result<()> {
    let content = serde_json::to_string_pretty(status)?;
    fs::write(path, content).with_context(|| format!("Could not write {}", path.display()))
}

/// Read a status file, `None` if it does not exist
pub fn read_status(path: &Path) -> Result<Option<StatusFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
    let status = serde_json::from_str(&content)
        .with_context(|| format!("Invalid status file {}", path.display()))?;
    Ok(Some(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge::{DiskKind, Phase};

    const SAMPLE: &str = r#"
phase = "running"

[owner]
id = "6512bd43"
name = "staging"

[[hosts]]
roles = ["master"]
count = 1
flavor = "small"
image = "img-1"

[[hosts.disks]]
device = "/dev/sda"
capacity = 40
kind = "root"

[[hosts]]
index = 3
roles = ["node"]
count = 2
flavor = "large"
image = "img-1"

[[hosts.disks]]
device = "/dev/sdb"
capacity = 100
volume_type = "ssd"
"#;

    #[test]
    fn test_load_topology() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staging.toml");
        fs::write(&path, SAMPLE).unwrap();

        let topology = load(&path).unwrap();
        assert_eq!(topology.phase, Phase::Running);
        assert_eq!(topology.owner.label(), "staging");
        assert_eq!(topology.hosts.len(), 2);
        assert_eq!(topology.hosts[0].index, None);
        assert_eq!(topology.hosts[0].disks[0].kind, DiskKind::Root);
        assert_eq!(topology.hosts[1].index, Some(3));
        assert_eq!(topology.hosts[1].disks[0].volume_type, "ssd");
    }

    #[test]
    fn test_saved_indices_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staging.toml");
        fs::write(&path, SAMPLE).unwrap();

        let mut topology = load(&path).unwrap();
        assert!(topology.assign_indices());
        save(&path, &topology).unwrap();

        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded, topology);
        assert_eq!(reloaded.hosts[0].index, Some(0));
    }

    #[test]
    fn test_empty_owner_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[owner]\nid = \"\"\n").unwrap();
        assert!(load(&path).is_err());
    }

    #[test]
    fn test_status_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staging.status.json");
        assert!(read_status(&path).unwrap().is_none());

        let status = StatusFile::new(
            OwnerContext::new("6512bd43", "staging"),
            ProviderKind::Memory,
            vec![HostGroup::new(0, 1).with_image("img-1")],
        );
        write_status(&path, &status).unwrap();
        assert_eq!(read_status(&path).unwrap(), Some(status));
    }
}
