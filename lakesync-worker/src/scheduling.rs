use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::warn;

use lakesync_config::shared::RawJobMapping;

/// Maximum length of a label key name segment and of a label value.
const MAX_LABEL_SEGMENT_LEN: usize = 63;

/// Maximum length of a label key prefix (a DNS-1123 subdomain).
const MAX_LABEL_PREFIX_LEN: usize = 253;

/// Grammar for a label key name segment and for a label value: alphanumeric
/// at both ends, with `-`, `_` and `.` allowed in between.
static LABEL_SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9._-]*[A-Za-z0-9])?$").unwrap());

/// Grammar for a label key prefix: a lowercase DNS-1123 subdomain.
static LABEL_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)*$").unwrap()
});

/// Why a job entry or label pair was dropped during sanitization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    #[error("job id is not an integer")]
    MalformedJobId,
    #[error("job id must be positive")]
    NonPositiveJobId,
    #[error("null label mapping")]
    NullLabelSet,
    #[error("empty label key")]
    EmptyLabelKey,
    #[error("empty label value for key '{key}'")]
    EmptyLabelValue { key: String },
    #[error("invalid label key '{key}': {detail}")]
    InvalidLabelKey { key: String, detail: String },
    #[error("invalid label value '{value}' for key '{key}'")]
    InvalidLabelValue { key: String, value: String },
}

/// A discarded job entry or label pair, kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// The raw job id key the rejection belongs to.
    pub job: String,
    /// The offending label pair, when the rejection concerns a single pair
    /// rather than the whole entry.
    pub pair: Option<(String, String)>,
    pub reason: RejectionReason,
}

/// Node-affinity routing table containing only validated entries.
///
/// Every job id is positive and every label pair satisfies the Kubernetes
/// label grammars. Built once at worker construction and immutable afterward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizedJobMapping(BTreeMap<u64, BTreeMap<String, String>>);

impl SanitizedJobMapping {
    /// Returns the node labels workloads of `job_id` must be scheduled onto,
    /// or `None` when the job has no routing entry.
    pub fn labels_for(&self, job_id: u64) -> Option<&BTreeMap<String, String>> {
        self.0.get(&job_id)
    }

    /// Iterates over all routing entries in job-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&u64, &BTreeMap<String, String>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of sanitizing a raw job mapping: the surviving routing table plus a
/// report of everything that was dropped.
///
/// Invalid entries are reported instead of propagated as errors so that one
/// bad entry can never prevent worker startup.
#[derive(Debug, Clone)]
pub struct SanitizeOutcome {
    pub routing: SanitizedJobMapping,
    pub rejections: Vec<Rejection>,
}

impl SanitizeOutcome {
    /// Emits one warning per dropped entry or pair.
    pub fn log_rejections(&self) {
        for rejection in &self.rejections {
            match &rejection.pair {
                Some((key, value)) => warn!(
                    job = %rejection.job,
                    key = %key,
                    value = %value,
                    "dropping invalid label pair: {}",
                    rejection.reason
                ),
                None => warn!(
                    job = %rejection.job,
                    "dropping job mapping entry: {}",
                    rejection.reason
                ),
            }
        }
    }
}

/// Validates the raw node-affinity mapping from configuration and produces
/// the routing table the worker schedules against.
///
/// Entries with a malformed or non-positive job id and entries mapped to null
/// are dropped whole. Within an entry, each label pair is trimmed and checked
/// against the Kubernetes label grammars; a failing pair is dropped on its
/// own while the remaining pairs survive. Surviving pairs are stored in their
/// trimmed form. A job whose pairs are all rejected stays in the table with
/// an empty label set, which constrains its workloads to no node in
/// particular.
pub fn sanitize_job_mapping(raw: &RawJobMapping) -> SanitizeOutcome {
    let mut routing = BTreeMap::new();
    let mut rejections = Vec::new();

    for (raw_job_id, node_labels) in raw {
        let job_id = match raw_job_id.trim().parse::<i64>() {
            Ok(id) if id > 0 => id as u64,
            Ok(_) => {
                rejections.push(Rejection {
                    job: raw_job_id.clone(),
                    pair: None,
                    reason: RejectionReason::NonPositiveJobId,
                });
                continue;
            }
            Err(_) => {
                rejections.push(Rejection {
                    job: raw_job_id.clone(),
                    pair: None,
                    reason: RejectionReason::MalformedJobId,
                });
                continue;
            }
        };

        let node_labels = match node_labels {
            Some(node_labels) => node_labels,
            None => {
                rejections.push(Rejection {
                    job: raw_job_id.clone(),
                    pair: None,
                    reason: RejectionReason::NullLabelSet,
                });
                continue;
            }
        };

        let mut valid_labels = BTreeMap::new();
        for (key, value) in node_labels {
            let trimmed_key = key.trim();
            let trimmed_value = value.trim();

            match validate_label_pair(trimmed_key, trimmed_value) {
                Ok(()) => {
                    valid_labels.insert(trimmed_key.to_string(), trimmed_value.to_string());
                }
                Err(reason) => {
                    rejections.push(Rejection {
                        job: raw_job_id.clone(),
                        pair: Some((key.clone(), value.clone())),
                        reason,
                    });
                }
            }
        }

        routing.insert(job_id, valid_labels);
    }

    SanitizeOutcome {
        routing: SanitizedJobMapping(routing),
        rejections,
    }
}

/// Validates a single trimmed label pair against the Kubernetes grammars.
fn validate_label_pair(key: &str, value: &str) -> Result<(), RejectionReason> {
    if key.is_empty() {
        return Err(RejectionReason::EmptyLabelKey);
    }

    if value.is_empty() {
        return Err(RejectionReason::EmptyLabelValue {
            key: key.to_string(),
        });
    }

    if let Err(detail) = validate_qualified_name(key) {
        return Err(RejectionReason::InvalidLabelKey {
            key: key.to_string(),
            detail,
        });
    }

    if !is_valid_label_value(value) {
        return Err(RejectionReason::InvalidLabelValue {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    Ok(())
}

/// Checks a label key against the Kubernetes qualified-name grammar: an
/// optional DNS-1123 subdomain prefix followed by `/` and a name segment.
fn validate_qualified_name(key: &str) -> Result<(), String> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        if prefix.is_empty() {
            return Err("prefix part must be non-empty".to_string());
        }
        if prefix.len() > MAX_LABEL_PREFIX_LEN {
            return Err(format!(
                "prefix part must be no more than {MAX_LABEL_PREFIX_LEN} characters"
            ));
        }
        if !LABEL_PREFIX_RE.is_match(prefix) {
            return Err("prefix part must be a lowercase DNS-1123 subdomain".to_string());
        }
    }

    if name.is_empty() {
        return Err("name part must be non-empty".to_string());
    }
    if name.contains('/') {
        return Err("name part must not contain '/'".to_string());
    }
    if name.len() > MAX_LABEL_SEGMENT_LEN {
        return Err(format!(
            "name part must be no more than {MAX_LABEL_SEGMENT_LEN} characters"
        ));
    }
    if !LABEL_SEGMENT_RE.is_match(name) {
        return Err(
            "name part must consist of alphanumeric characters, '-', '_' or '.', and must start \
             and end with an alphanumeric character"
                .to_string(),
        );
    }

    Ok(())
}

/// Checks a label value against the Kubernetes label-value grammar.
fn is_valid_label_value(value: &str) -> bool {
    value.len() <= MAX_LABEL_SEGMENT_LEN && LABEL_SEGMENT_RE.is_match(value)
}
