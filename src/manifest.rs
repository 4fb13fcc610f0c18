use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::plugin::ToolRegistry;

/// Plugin manifest, embedded at compile time.
const MANIFEST_TOML: &str = include_str!("../manifest.toml");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: String,
    pub author: String,
    pub label: String,
    pub description: String,
    /// Data handling statement shown to users of the host.
    pub privacy: String,
    pub tools: Vec<String>,
}

impl Manifest {
    /// The embedded manifest.
    pub fn load() -> Result<Manifest> {
        Self::parse(MANIFEST_TOML)
    }

    pub fn parse(content: &str) -> Result<Manifest> {
        toml::from_str(content).context("Failed to parse plugin manifest")
    }

    /// Fail when the manifest and the registry disagree on the tool list.
    pub fn verify(&self, registry: &ToolRegistry) -> Result<()> {
        let registered = registry.names();
        for tool in &self.tools {
            if !registered.contains(&tool.as_str()) {
                bail!("Manifest lists tool '{}' which is not registered", tool);
            }
        }
        for name in registered {
            if !self.tools.iter().any(|t| t == name) {
                bail!("Tool '{}' is registered but missing from the manifest", name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_manifest_matches_registry() {
        let manifest = Manifest::load().unwrap();
        assert_eq!(manifest.name, "sqlkit");
        assert_eq!(manifest.tools.len(), 6);
        manifest.verify(&ToolRegistry::with_defaults()).unwrap();
    }

    #[test]
    fn test_verify_detects_mismatch() {
        let mut manifest = Manifest::load().unwrap();
        manifest.tools.pop();
        assert!(manifest.verify(&ToolRegistry::with_defaults()).is_err());
        manifest.tools.push("teleport".into());
        assert!(manifest.verify(&ToolRegistry::with_defaults()).is_err());
    }

    #[test]
    fn test_parse_error() {
        assert!(Manifest::parse("name = ").is_err());
    }
}
