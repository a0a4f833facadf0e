use std::fmt;
use std::io::Error;

/// Environment variable holding the environment identifier.
const APP_ENVIRONMENT_ENV_NAME: &str = "APP_ENVIRONMENT";

const PROD_ENV_NAME: &str = "prod";
const STAGING_ENV_NAME: &str = "staging";
const DEV_ENV_NAME: &str = "dev";

/// Runtime environment of a lakesync service.
///
/// Drives which configuration file is layered on top of the base file and
/// how tracing output is formatted.
#[derive(Debug, Clone)]
pub enum Environment {
    Prod,
    Staging,
    Dev,
}

impl Environment {
    /// Loads the environment from `APP_ENVIRONMENT`, defaulting to prod when
    /// the variable is not set.
    pub fn load() -> Result<Environment, Error> {
        std::env::var(APP_ENVIRONMENT_ENV_NAME)
            .unwrap_or_else(|_| PROD_ENV_NAME.into())
            .try_into()
    }

    /// Sets `APP_ENVIRONMENT` to this environment's identifier.
    pub fn set(&self) {
        std::env::set_var(APP_ENVIRONMENT_ENV_NAME, self.to_string())
    }

    /// Returns whether this is a production-like environment.
    ///
    /// Staging runs with production settings everywhere except the cluster
    /// it points at, so it counts as prod here.
    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod | Self::Staging)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Environment::Prod => write!(f, "{PROD_ENV_NAME}"),
            Environment::Staging => write!(f, "{STAGING_ENV_NAME}"),
            Environment::Dev => write!(f, "{DEV_ENV_NAME}"),
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = Error;

    /// Parses an environment identifier, case-insensitively.
    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            PROD_ENV_NAME => Ok(Self::Prod),
            STAGING_ENV_NAME => Ok(Self::Staging),
            DEV_ENV_NAME => Ok(Self::Dev),
            other => Err(Error::other(format!(
                "{other} is not a supported environment. Use either `{PROD_ENV_NAME}`/`{STAGING_ENV_NAME}`/`{DEV_ENV_NAME}`.",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parses_case_insensitively() {
        let env: Environment = "STAGING".to_string().try_into().unwrap();
        assert!(env.is_prod());
        assert_eq!(env.to_string(), "staging");
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let result: Result<Environment, _> = "qa".to_string().try_into();
        assert!(result.is_err());
    }

    #[test]
    fn dev_is_not_prod() {
        let env: Environment = "dev".to_string().try_into().unwrap();
        assert!(!env.is_prod());
    }
}
