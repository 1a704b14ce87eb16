use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{
    AdvisorFailurePolicy, AdvisorKind, AdvisorSettings, AdvisorSource, AlmSettings,
    BacktestSettings, Config, DataSettings, DebtSettings, PoolSettings, VaultSettings,
};

/// Loads the run configuration from a TOML file.
///
/// Values can be overridden from the environment with the `VAULTSIM` prefix and
/// `__` as the section separator, e.g. `VAULTSIM_DEBT__TARGET_COLLATERAL_RATIO=1.8`.
/// The result is validated before it is returned.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path.as_ref()))
        .add_source(
            config::Environment::with_prefix("VAULTSIM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    tracing::debug!(path = %path.as_ref().display(), "Configuration loaded");
    Ok(config)
}
