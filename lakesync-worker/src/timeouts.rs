use std::fmt;
use std::time::Duration;

use lakesync_config::shared::TimeoutsConfig;

/// Default timeout for catalog discovery activities.
const DEFAULT_DISCOVER_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Default timeout for connection test activities.
const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default timeout for data synchronization activities.
///
/// Syncs of large sources can legitimately run for weeks.
const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(700 * 60 * 60);

/// Default timeout for operations without a dedicated policy.
const DEFAULT_GENERIC_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// The activity operations this worker executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    DiscoverCatalog,
    TestConnection,
    RunSync,
}

impl Operation {
    /// Returns the operation name used in configuration keys and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::DiscoverCatalog => "discover",
            Operation::TestConnection => "test",
            Operation::RunSync => "sync",
        }
    }

    /// Parses an operation from its wire name.
    pub fn parse(name: &str) -> Option<Operation> {
        match name {
            "discover" => Some(Operation::DiscoverCatalog),
            "test" => Some(Operation::TestConnection),
            "sync" => Some(Operation::RunSync),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves the timeout governing an activity of the given operation.
///
/// The override for the operation is read from `timeouts`. A raw value that
/// parses as a plain non-negative integer is interpreted as whole seconds;
/// otherwise it is parsed as a duration expression such as `15m` or `2h`.
/// Absent, empty, or unparsable values fall back to the operation's default,
/// and operation names without a dedicated policy fall back to a generic
/// 30 minute default. Resolution never fails: a misconfigured timeout must
/// degrade to a safe default rather than block worker startup.
pub fn activity_timeout(operation: &str, timeouts: &TimeoutsConfig) -> Duration {
    match operation {
        "discover" => resolve(timeouts.activity.discover.as_deref(), DEFAULT_DISCOVER_TIMEOUT),
        "test" => resolve(timeouts.activity.test.as_deref(), DEFAULT_TEST_TIMEOUT),
        "sync" => resolve(timeouts.activity.sync.as_deref(), DEFAULT_SYNC_TIMEOUT),
        _ => DEFAULT_GENERIC_TIMEOUT,
    }
}

/// Parses a raw timeout value with fallback to `default`.
fn resolve(raw: Option<&str>, default: Duration) -> Duration {
    let raw = match raw {
        Some(raw) if !raw.trim().is_empty() => raw.trim(),
        _ => return default,
    };

    if let Ok(seconds) = raw.parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(duration) = humantime::parse_duration(raw) {
        return duration;
    }

    default
}
