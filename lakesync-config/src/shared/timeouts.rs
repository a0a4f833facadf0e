use serde::{Deserialize, Serialize};

/// Per-operation activity timeout overrides.
///
/// Each value is either a plain non-negative integer (whole seconds) or a
/// duration expression such as `90s`, `15m` or `2h`. Unset or unparsable
/// values fall back to the operation's hardcoded default at resolution time;
/// a misconfigured timeout must never prevent the worker from starting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutsConfig {
    /// Activity timeout overrides.
    #[serde(default)]
    pub activity: ActivityTimeouts,
}

/// Raw timeout overrides keyed by activity operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ActivityTimeouts {
    /// Override for catalog discovery activities.
    pub discover: Option<String>,
    /// Override for connection test activities.
    pub test: Option<String>,
    /// Override for data synchronization activities.
    pub sync: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_section_defaults_to_no_overrides() {
        let timeouts: TimeoutsConfig = serde_json::from_str("{}").unwrap();

        assert!(timeouts.activity.discover.is_none());
        assert!(timeouts.activity.test.is_none());
        assert!(timeouts.activity.sync.is_none());
    }

    #[test]
    fn overrides_deserialize_as_raw_strings() {
        let timeouts: TimeoutsConfig =
            serde_json::from_str(r#"{"activity": {"sync": "2h", "test": "120"}}"#).unwrap();

        assert_eq!(timeouts.activity.sync.as_deref(), Some("2h"));
        assert_eq!(timeouts.activity.test.as_deref(), Some("120"));
        assert!(timeouts.activity.discover.is_none());
    }
}
