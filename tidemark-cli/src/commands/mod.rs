//! Command handlers -- one module per subcommand

pub mod config;
pub mod cookie;
pub mod errors;
pub mod hash;

use std::io::Read;
use std::path::Path;

use tidemark_core::config::TidemarkConfig;
use tracing::debug;

use crate::error::CliError;

/// Load the configuration file if it exists, otherwise fall back to defaults.
///
/// Environment overrides apply in both cases.
pub(crate) async fn load_config_or_default(path: &Path) -> Result<TidemarkConfig, CliError> {
    if path.exists() {
        return Ok(TidemarkConfig::load(path).await?);
    }
    debug!(path = %path.display(), "config file not found, using defaults");
    let mut config = TidemarkConfig::default();
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Resolve a positional input argument, reading stdin when it is `-`.
pub(crate) fn read_input(input: &str) -> Result<String, CliError> {
    if input != "-" {
        return Ok(input.to_owned());
    }
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf.trim_end().to_owned())
}
