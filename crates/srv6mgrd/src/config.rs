//! Agent configuration: per-VRF import/export policy.

use serde::Deserialize;
use srv6_types::{Ipv6Prefix, RouteTarget, VrfId};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Errors loading or validating the agent configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config: {message}")]
    Invalid { message: String },
}

/// Export policy for one VRF: tag advertisements with `route_target` and
/// carve SIDs for exported prefixes out of `locator`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportPolicy {
    pub route_target: RouteTarget,
    pub locator: Ipv6Prefix,
}

/// Policy for one routing domain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VrfPolicy {
    /// Domain key used for scheduling and logging.
    pub name: String,
    pub vrf_id: VrfId,
    /// Route target whose routes this VRF imports.
    #[serde(default)]
    pub import: Option<RouteTarget>,
    #[serde(default)]
    pub export: Option<ExportPolicy>,
}

/// Top-level agent configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default)]
    pub vrfs: Vec<VrfPolicy>,
}

impl AgentConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        let mut locators: Vec<(&str, Ipv6Prefix)> = Vec::new();

        for vrf in &self.vrfs {
            if !names.insert(vrf.name.as_str()) {
                return Err(ConfigError::Invalid {
                    message: format!("duplicate VRF name '{}'", vrf.name),
                });
            }
            if !ids.insert(vrf.vrf_id) {
                return Err(ConfigError::Invalid {
                    message: format!("duplicate VRF id {}", vrf.vrf_id),
                });
            }
            if vrf.import.is_none() && vrf.export.is_none() {
                return Err(ConfigError::Invalid {
                    message: format!("VRF '{}' has neither import nor export policy", vrf.name),
                });
            }
            if let Some(export) = &vrf.export {
                for (name, locator) in &locators {
                    if locator.overlaps(&export.locator) {
                        return Err(ConfigError::Invalid {
                            message: format!(
                                "locator {} of VRF '{}' overlaps locator of VRF '{}'",
                                export.locator, vrf.name, name
                            ),
                        });
                    }
                }
                locators.push((&vrf.name, export.locator));
            }
        }
        Ok(())
    }
}
