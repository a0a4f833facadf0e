use serde::de::DeserializeOwned;

use crate::environment::Environment;

/// Directory containing configuration files, relative to the working
/// directory of the service.
const CONFIGURATION_DIR: &str = "configuration";

/// Base configuration file loaded for every environment.
const BASE_CONFIG_FILE: &str = "base.yaml";

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between the prefix and the first key segment.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
///
/// Example: `APP_ENGINE__ADDRESS` sets the `engine.address` field.
const ENV_SEPARATOR: &str = "__";

/// Separator for list elements in environment variables.
const LIST_SEPARATOR: &str = ",";

/// Trait naming the keys that must be parsed as lists when a configuration
/// type is loaded from environment variables.
pub trait Config {
    /// Keys that should be split on [`LIST_SEPARATOR`] during loading.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Loads hierarchical configuration from YAML files and environment variables.
///
/// Sources are applied in order:
/// 1. `configuration/base.yaml`
/// 2. `configuration/{environment}.yaml`
/// 3. `APP`-prefixed environment variables, with `__` separating nested keys.
///
/// # Panics
/// Panics if the current directory cannot be determined or if
/// `APP_ENVIRONMENT` cannot be parsed.
pub fn load_config<T>() -> Result<T, config::ConfigError>
where
    T: Config + DeserializeOwned,
{
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join(CONFIGURATION_DIR);

    // Detect the running environment, defaulting to prod if unspecified.
    let environment = Environment::load().expect("Failed to parse APP_ENVIRONMENT.");

    let environment_filename = format!("{environment}.yaml");

    let mut environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    // List-valued keys need explicit parsing with the list separator, since
    // environment variables are flat strings.
    if !<T as Config>::LIST_PARSE_KEYS.is_empty() {
        environment_source = environment_source
            .try_parsing(true)
            .list_separator(LIST_SEPARATOR);

        for key in <T as Config>::LIST_PARSE_KEYS {
            environment_source = environment_source.with_list_parse_key(key);
        }
    }

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join(BASE_CONFIG_FILE),
        ))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        .add_source(environment_source)
        .build()?;

    settings.try_deserialize::<T>()
}
