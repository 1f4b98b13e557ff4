use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix of environment overrides, e.g. `REELPIPE_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "REELPIPE_";

/// Nested keys are separated by a double underscore so that field names
/// such as `keep_sources` survive the split.
const ENV_SEPARATOR: &str = "__";

fn env_overrides() -> Env {
    // REELPIPE_CONFIG names the file itself
    Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR).ignore(&["config"])
}

fn extract(figment: Figment) -> Result<Config, ConfigError> {
    figment
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load the service configuration from a TOML file, then apply
/// `REELPIPE_*` environment overrides.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    extract(Figment::new().merge(Toml::file(path)).merge(env_overrides()))
}

/// Parse configuration from TOML text only. Environment overrides are not
/// applied, so results do not depend on the calling process.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    extract(Figment::new().merge(Toml::string(toml_str)))
}
