use anyhow::{bail, Result};

/// Environment variable selecting the execution mode.
pub const INSTALL_METHOD_VAR: &str = "INSTALL_METHOD";

/// How the plugin process is driven by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstallMethod {
    /// Serve requests until stdin closes.
    #[default]
    Local,
    /// Answer exactly one request, then exit.
    Serverless,
}

impl InstallMethod {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "local" => Ok(InstallMethod::Local),
            "serverless" => Ok(InstallMethod::Serverless),
            other => bail!(
                "Unsupported {} '{}': expected 'local' or 'serverless'",
                INSTALL_METHOD_VAR,
                other
            ),
        }
    }
}

/// Runtime configuration read from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    pub install_method: InstallMethod,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let install_method = match std::env::var(INSTALL_METHOD_VAR) {
            Ok(value) => InstallMethod::parse(&value)?,
            Err(std::env::VarError::NotPresent) => InstallMethod::default(),
            Err(e) => bail!("Invalid {}: {}", INSTALL_METHOD_VAR, e),
        };
        Ok(Config { install_method })
    }
}
