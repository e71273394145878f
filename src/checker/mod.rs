pub mod mock;
pub mod simulated;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Reason attached to outcomes synthesized for a failed check invocation.
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";

/// One trimmed, non-blank line of batch input. Opaque to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchRecord(String);

impl BatchRecord {
    /// Trims the line. Returns `None` for blank input.
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Final status of a checked record. There is deliberately no "checking"
/// variant: an item still in flight shows up as the snapshot's current record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Approved,
    Declined,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Approved => write!(f, "approved"),
            Status::Declined => write!(f, "declined"),
        }
    }
}

/// What a checker decides about one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub status: Status,
    pub message: String,
    /// Set iff `status` is `Declined`.
    pub reason: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl Verdict {
    pub fn approved(message: impl Into<String>) -> Self {
        Self {
            status: Status::Approved,
            message: message.into(),
            reason: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn declined(message: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            status: Status::Declined,
            message: message.into(),
            reason: Some(reason.into()),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The recorded result of checking one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub record: BatchRecord,
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub completed_at: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Outcome {
    /// Complete a verdict with the record it belongs to and its timing.
    pub fn from_verdict(record: BatchRecord, verdict: Verdict, elapsed: Duration) -> Self {
        // A declined verdict without a reason still needs one.
        let reason = match verdict.status {
            Status::Approved => None,
            Status::Declined => Some(verdict.reason.unwrap_or_else(|| verdict.message.clone())),
        };
        Self {
            record,
            status: verdict.status,
            message: verdict.message,
            reason,
            completed_at: Utc::now(),
            elapsed,
            metadata: verdict.metadata,
        }
    }

    /// The outcome recorded when the check invocation itself failed.
    pub fn check_failed(record: BatchRecord, detail: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            record,
            status: Status::Declined,
            message: detail.into(),
            reason: Some(NETWORK_ERROR.to_string()),
            completed_at: Utc::now(),
            elapsed,
            metadata: BTreeMap::new(),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == Status::Approved
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.is_approved() { "✓" } else { "✗" };
        write!(
            f,
            "{mark} {} [{}] {} ({:.2}s)",
            self.record,
            self.status,
            self.message,
            self.elapsed.as_secs_f64()
        )
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Checks one record at a time. Could be a simulation, a remote call, or a test script.
///
/// Errors mean the check itself could not be carried out. A business-level
/// rejection is an `Ok` verdict with `Status::Declined`.
#[async_trait]
pub trait ItemChecker: Send + Sync {
    async fn check(&self, record: &BatchRecord) -> Result<Verdict>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(s: &str) -> BatchRecord {
        BatchRecord::parse(s).unwrap()
    }

    #[test]
    fn parse_trims_whitespace() {
        assert_eq!(record("  abc \t").as_str(), "abc");
    }

    #[test]
    fn parse_rejects_blank() {
        assert!(BatchRecord::parse("").is_none());
        assert!(BatchRecord::parse("   \t ").is_none());
    }

    #[test]
    fn approved_outcome_has_no_reason() {
        let outcome = Outcome::from_verdict(
            record("a"),
            Verdict::approved("ok"),
            Duration::from_millis(5),
        );
        assert!(outcome.is_approved());
        assert!(outcome.reason.is_none());
    }

    #[test]
    fn approved_verdict_with_stray_reason_drops_it() {
        let verdict = Verdict {
            reason: Some("leftover".to_string()),
            ..Verdict::approved("ok")
        };
        let outcome = Outcome::from_verdict(record("a"), verdict, Duration::ZERO);
        assert!(outcome.reason.is_none());
    }

    #[test]
    fn declined_verdict_without_reason_falls_back_to_message() {
        let verdict = Verdict {
            reason: None,
            ..Verdict::declined("POLICY_REJECTED", "x")
        };
        let outcome = Outcome::from_verdict(record("a"), verdict, Duration::ZERO);
        assert_eq!(outcome.reason.as_deref(), Some("POLICY_REJECTED"));
    }

    #[test]
    fn check_failed_uses_reserved_reason() {
        let outcome = Outcome::check_failed(record("b"), "connection reset", Duration::ZERO);
        assert_eq!(outcome.status, Status::Declined);
        assert_eq!(outcome.reason.as_deref(), Some(NETWORK_ERROR));
        assert_eq!(outcome.message, "connection reset");
    }

    #[test]
    fn outcome_serializes_elapsed_as_millis() {
        let outcome = Outcome::from_verdict(
            record("a"),
            Verdict::approved("ok").with_metadata("length", "1"),
            Duration::from_millis(1500),
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["record"], "a");
        assert_eq!(json["status"], "approved");
        assert_eq!(json["elapsed"], 1500);
        assert_eq!(json["metadata"]["length"], "1");
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn display_marks_status() {
        let ok = Outcome::from_verdict(record("a"), Verdict::approved("fine"), Duration::ZERO);
        let bad = Outcome::check_failed(record("b"), "boom", Duration::ZERO);
        assert!(ok.to_string().starts_with("✓ a [approved] fine"));
        assert!(bad.to_string().starts_with("✗ b [declined] boom"));
    }
}
