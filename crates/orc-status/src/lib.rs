//! Canonical status vocabulary.
//!
//! One place owns the mapping from whatever a model, a webhook, or a
//! stale client sends us down to the five statuses the rest of the
//! system is allowed to reason about. Every ingress (task creation,
//! DB write, JSON response, SSE frame) runs through [`normalize`] or
//! [`normalize_payload`] before it reaches anything else.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The five statuses a task can be in. Transitions are monotone:
/// `Queued -> Running -> {Done, Error, Canceled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Queued,
    Running,
    Done,
    Error,
    Canceled,
}

impl Status {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
            Self::Canceled => "canceled",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Canceled)
    }

    /// Rank used to enforce monotonic transitions. Terminal states are
    /// all rank 2 — moving between them is not allowed once set, only
    /// the worker's single terminal write is permitted.
    const fn rank(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            Self::Done | Self::Error | Self::Canceled => 2,
        }
    }

    /// Whether `self -> next` is a legal monotone transition.
    pub fn can_transition_to(&self, next: Status) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_str(s).as_str() {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "done" => Ok(Self::Done),
            "error" => Ok(Self::Error),
            "canceled" => Ok(Self::Canceled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for Status {
    type Error = UnknownStatus;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Synonym -> canonical mapping, applied before parsing into [`Status`].
fn normalize_str(raw: &str) -> String {
    let v = raw.trim().to_lowercase();
    match v.as_str() {
        "succeeded" | "success" | "completed" | "complete" => "done".to_string(),
        "failed" | "failure" | "fail" | "timeout" => "error".to_string(),
        "cancelled" => "canceled".to_string(),
        other => other.to_string(),
    }
}

/// Normalize a free-form status string into its canonical form. Unlike
/// [`Status::from_str`] this never fails — an unrecognized value is
/// passed through lowercased/trimmed so callers that only display the
/// value (rather than branch on it) still see something sane.
///
/// Idempotent: `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(raw: &str) -> String {
    normalize_str(raw)
}

/// Recursively rewrite any `"status": "<value>"` field inside a JSON
/// value to its canonical form. Used to canonicalize outbound payloads
/// (SSE frames, HTTP responses) regardless of nesting depth.
///
/// `timeout` is special-cased per §4.3: it canonicalizes to `error` and
/// also stamps `"note": "timeout"` onto the same object, so a subscriber
/// can tell a timed-out run apart from any other error.
pub fn normalize_payload(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(status) = map.get("status").and_then(|v| v.as_str()) {
                let was_timeout = status.trim().eq_ignore_ascii_case("timeout");
                let canon = normalize_str(status);
                map.insert("status".to_string(), serde_json::Value::String(canon));
                if was_timeout {
                    map.insert("note".to_string(), serde_json::Value::String("timeout".to_string()));
                }
            }
            for (_, v) in map.iter_mut() {
                normalize_payload(v);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items.iter_mut() {
                normalize_payload(item);
            }
        }
        _ => {}
    }
}

/// How the persistence layer reacts to a non-canonical status value
/// arriving at a write site. Configured via `STATUS_GUARD_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardMode {
    /// Reject the write outright.
    Error,
    /// Log and let the raw value through unchanged.
    Warn,
    /// Silently rewrite to the canonical value before writing.
    #[default]
    Fix,
    /// Guard disabled entirely.
    Off,
}

impl FromStr for GuardMode {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "fix" => Ok(Self::Fix),
            "off" => Ok(Self::Off),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("status guard rejected non-canonical status {0:?}")]
    Rejected(String),
}

/// Apply the configured guard to a status string about to be written to
/// the relational store. Returns the value that should actually be
/// persisted, or an error if `mode == Error` and the value isn't
/// already canonical.
pub fn guard_write(mode: GuardMode, raw: &str) -> Result<String, GuardError> {
    let canon = normalize_str(raw);
    let is_canonical = matches!(
        canon.as_str(),
        "queued" | "running" | "done" | "error" | "canceled"
    );
    match mode {
        GuardMode::Off => Ok(raw.to_string()),
        GuardMode::Fix => Ok(canon),
        GuardMode::Warn => {
            if !is_canonical || canon != raw {
                tracing::warn!(raw, canon = %canon, "non-canonical status write");
            }
            Ok(raw.to_string())
        }
        GuardMode::Error => {
            if canon != raw || !is_canonical {
                Err(GuardError::Rejected(raw.to_string()))
            } else {
                Ok(raw.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synonyms_map_to_canonical() {
        assert_eq!(normalize("succeeded"), "done");
        assert_eq!(normalize("SUCCESS"), "done");
        assert_eq!(normalize("Completed"), "done");
        assert_eq!(normalize("failed"), "error");
        assert_eq!(normalize("FAIL"), "error");
        assert_eq!(normalize("cancelled"), "canceled");
        assert_eq!(normalize("queued"), "queued");
        assert_eq!(normalize("timeout"), "error");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["succeeded", "FAILED", "cancelled", "done", "bogus"] {
            let once = normalize(raw);
            let twice = normalize(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!("bogus".parse::<Status>().is_err());
        assert_eq!("succeeded".parse::<Status>().unwrap(), Status::Done);
    }

    #[test]
    fn monotonic_transitions() {
        assert!(Status::Queued.can_transition_to(Status::Running));
        assert!(Status::Running.can_transition_to(Status::Done));
        assert!(!Status::Done.can_transition_to(Status::Running));
        assert!(!Status::Error.can_transition_to(Status::Done));
        assert!(Status::Queued.can_transition_to(Status::Queued));
    }

    #[test]
    fn payload_rewrite_is_recursive() {
        let mut v = serde_json::json!({
            "status": "succeeded",
            "nested": {"status": "failed"},
            "list": [{"status": "cancelled"}, {"other": 1}]
        });
        normalize_payload(&mut v);
        assert_eq!(v["status"], "done");
        assert_eq!(v["nested"]["status"], "error");
        assert_eq!(v["list"][0]["status"], "canceled");
    }

    #[test]
    fn timeout_status_maps_to_error_with_note() {
        let mut v = serde_json::json!({"status": "timeout"});
        normalize_payload(&mut v);
        assert_eq!(v["status"], "error");
        assert_eq!(v["note"], "timeout");
    }

    #[test]
    fn guard_modes_behave() {
        assert_eq!(guard_write(GuardMode::Fix, "succeeded").unwrap(), "done");
        assert_eq!(guard_write(GuardMode::Off, "succeeded").unwrap(), "succeeded");
        assert_eq!(guard_write(GuardMode::Warn, "succeeded").unwrap(), "succeeded");
        assert!(guard_write(GuardMode::Error, "succeeded").is_err());
        assert!(guard_write(GuardMode::Error, "done").is_ok());
    }
}
