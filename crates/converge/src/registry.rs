//! Driver registry
//!
//! Maps each [`ProviderKind`] to a constructor. Callers pick a kind from
//! configuration and the registry builds the driver; vendors without a
//! registered constructor fail with [`Error::ProviderNotRegistered`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::simulated::SimulatedDriver;

/// Known provider kinds
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Simulated provider held in process
    #[default]
    Memory,
    /// Simulated provider persisted to a state file
    Local,
    Aws,
    Aliyun,
}

impl ProviderKind {
    pub const ALL: [Self; 4] = [Self::Memory, Self::Local, Self::Aws, Self::Aliyun];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Local => "local",
            Self::Aws => "aws",
            Self::Aliyun => "aliyun",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::UnknownProvider(s.to_string()))
    }
}

/// Settings handed to driver constructors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    /// State file for file-backed providers
    pub state_path: Option<PathBuf>,
}

/// Builds a driver from settings
pub type Constructor = Box<dyn Fn(&ProviderSettings) -> Result<Box<dyn Driver>> + Send + Sync>;

/// Provider kind to constructor map
#[derive(Default)]
pub struct Registry {
    constructors: BTreeMap<ProviderKind, Constructor>,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the simulated `memory` and `local` providers
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(ProviderKind::Memory, |_| {
            Ok(Box::new(SimulatedDriver::in_memory()) as Box<dyn Driver>)
        });
        registry.register(ProviderKind::Local, |settings| {
            let path = settings
                .state_path
                .as_ref()
                .ok_or_else(|| Error::ProviderSetup {
                    provider: ProviderKind::Local,
                    message: "state_path is not set".to_string(),
                })?;
            let driver = SimulatedDriver::open(path).map_err(|e| Error::ProviderSetup {
                provider: ProviderKind::Local,
                message: e.to_string(),
            })?;
            Ok(Box::new(driver) as Box<dyn Driver>)
        });
        registry
    }

    /// Register or replace the constructor for `kind`
    pub fn register<F>(&mut self, kind: ProviderKind, constructor: F)
    where
        F: Fn(&ProviderSettings) -> Result<Box<dyn Driver>> + Send + Sync + 'static,
    {
        self.constructors.insert(kind, Box::new(constructor));
    }

    pub fn is_registered(&self, kind: ProviderKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    /// Registered kinds in declaration order
    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.constructors.keys().copied().collect()
    }

    /// Build the driver for `kind`
    pub fn create(
        &self,
        kind: ProviderKind,
        settings: &ProviderSettings,
    ) -> Result<Box<dyn Driver>> {
        let constructor = self
            .constructors
            .get(&kind)
            .ok_or(Error::ProviderNotRegistered(kind))?;
        log::debug!("creating {kind} driver");
        constructor(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_kind() {
        assert_eq!("aws".parse::<ProviderKind>().unwrap(), ProviderKind::Aws);
        assert_eq!(" Local ".parse::<ProviderKind>().unwrap(), ProviderKind::Local);
        assert!(matches!(
            "gcp".parse::<ProviderKind>(),
            Err(Error::UnknownProvider(name)) if name == "gcp"
        ));
    }

    #[test]
    fn test_builtin_memory_driver() {
        let registry = Registry::with_builtin();
        let driver = registry
            .create(ProviderKind::Memory, &ProviderSettings::default())
            .unwrap();
        assert_eq!(driver.name(), "memory");
    }

    #[test]
    fn test_local_requires_state_path() {
        let registry = Registry::with_builtin();
        let err = registry
            .create(ProviderKind::Local, &ProviderSettings::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::ProviderSetup {
                provider: ProviderKind::Local,
                ..
            }
        ));

        let dir = tempfile::tempdir().unwrap();
        let settings = ProviderSettings {
            state_path: Some(dir.path().join("state.json")),
        };
        assert_eq!(
            registry.create(ProviderKind::Local, &settings).unwrap().name(),
            "local"
        );
    }

    #[test]
    fn test_unregistered_vendor() {
        let registry = Registry::with_builtin();
        assert!(!registry.is_registered(ProviderKind::Aws));
        assert!(matches!(
            registry
                .create(ProviderKind::Aliyun, &ProviderSettings::default())
                .err(),
            Some(Error::ProviderNotRegistered(ProviderKind::Aliyun))
        ));
    }

    #[test]
    fn test_register_custom_constructor() {
        let mut registry = Registry::new();
        registry.register(ProviderKind::Aws, |_| {
            Ok(Box::new(SimulatedDriver::in_memory()) as Box<dyn Driver>)
        });
        assert_eq!(registry.kinds(), vec![ProviderKind::Aws]);
        assert!(
            registry
                .create(ProviderKind::Aws, &ProviderSettings::default())
                .is_ok()
        );
    }
}
