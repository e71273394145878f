//! A stand-in checker that fakes latency and picks outcomes at random.

use anyhow::{Result, bail};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngExt;
use sha2::{Digest, Sha256};
use std::time::Duration;

use super::{BatchRecord, ItemChecker, Verdict};
use crate::consts::{DEFAULT_APPROVAL_RATE, DEFAULT_CHECK_DELAY};

const APPROVED_MESSAGES: &[&str] = &["accepted", "verified", "record matches reference"];

const DECLINE_REASONS: &[&str] = &[
    "MALFORMED_RECORD",
    "UNKNOWN_REFERENCE",
    "POLICY_REJECTED",
    "DUPLICATE_ENTRY",
    "EXPIRED",
    "GENERIC_DECLINE",
];

pub struct SimulatedConfig {
    /// Fixed part of the simulated latency.
    pub delay: Duration,
    /// Upper bound of extra random latency added to `delay`.
    pub jitter: Duration,
    /// Probability in `[0, 1]` that a record is approved.
    pub approval_rate: f64,
    /// Probability in `[0, 1]` that the check itself fails.
    pub failure_rate: f64,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_CHECK_DELAY,
            jitter: Duration::ZERO,
            approval_rate: DEFAULT_APPROVAL_RATE,
            failure_rate: 0.0,
        }
    }
}

enum Roll {
    Fail,
    Approve(&'static str),
    Decline(&'static str),
}

pub struct SimulatedChecker {
    config: SimulatedConfig,
}

impl SimulatedChecker {
    pub fn new(config: SimulatedConfig) -> Self {
        Self { config }
    }

    fn latency(&self) -> Duration {
        let jitter_ms = self.config.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.config.delay;
        }
        let extra = rand::rng().random_range(0..=jitter_ms);
        self.config.delay + Duration::from_millis(extra)
    }

    // ThreadRng is not Send, so every roll happens outside the await.
    fn roll(&self) -> Roll {
        let mut rng = rand::rng();
        if rng.random_bool(self.config.failure_rate.clamp(0.0, 1.0)) {
            return Roll::Fail;
        }
        if rng.random_bool(self.config.approval_rate.clamp(0.0, 1.0)) {
            Roll::Approve(APPROVED_MESSAGES[rng.random_range(0..APPROVED_MESSAGES.len())])
        } else {
            Roll::Decline(DECLINE_REASONS[rng.random_range(0..DECLINE_REASONS.len())])
        }
    }
}

impl Default for SimulatedChecker {
    fn default() -> Self {
        Self::new(SimulatedConfig::default())
    }
}

/// Short, stable identifier for a record.
pub fn fingerprint(record: &BatchRecord) -> String {
    let hash = Sha256::digest(record.as_str().as_bytes());
    URL_SAFE_NO_PAD.encode(&hash[..9])
}

#[async_trait]
impl ItemChecker for SimulatedChecker {
    async fn check(&self, record: &BatchRecord) -> Result<Verdict> {
        tokio::time::sleep(self.latency()).await;

        let verdict = match self.roll() {
            Roll::Fail => bail!("simulated upstream unavailable"),
            Roll::Approve(message) => Verdict::approved(message),
            Roll::Decline(reason) => Verdict::declined(reason, reason),
        };

        Ok(verdict
            .with_metadata("fingerprint", fingerprint(record))
            .with_metadata("length", record.as_str().chars().count().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::Status;

    fn instant(approval_rate: f64, failure_rate: f64) -> SimulatedChecker {
        SimulatedChecker::new(SimulatedConfig {
            delay: Duration::ZERO,
            jitter: Duration::ZERO,
            approval_rate,
            failure_rate,
        })
    }

    fn record(s: &str) -> BatchRecord {
        BatchRecord::parse(s).unwrap()
    }

    #[tokio::test]
    async fn always_approves_at_full_rate() {
        let checker = instant(1.0, 0.0);
        for _ in 0..20 {
            let verdict = checker.check(&record("x")).await.unwrap();
            assert_eq!(verdict.status, Status::Approved);
            assert!(verdict.reason.is_none());
            assert!(APPROVED_MESSAGES.contains(&verdict.message.as_str()));
        }
    }

    #[tokio::test]
    async fn always_declines_at_zero_rate() {
        let checker = instant(0.0, 0.0);
        for _ in 0..20 {
            let verdict = checker.check(&record("x")).await.unwrap();
            assert_eq!(verdict.status, Status::Declined);
            let reason = verdict.reason.unwrap();
            assert!(DECLINE_REASONS.contains(&reason.as_str()));
        }
    }

    #[tokio::test]
    async fn full_failure_rate_errors() {
        let checker = instant(1.0, 1.0);
        assert!(checker.check(&record("x")).await.is_err());
    }

    #[tokio::test]
    async fn out_of_range_rates_are_clamped() {
        let checker = instant(7.5, -3.0);
        let verdict = checker.check(&record("x")).await.unwrap();
        assert_eq!(verdict.status, Status::Approved);
    }

    #[tokio::test]
    async fn attaches_metadata() {
        let checker = instant(1.0, 0.0);
        let verdict = checker.check(&record("héllo")).await.unwrap();
        assert_eq!(verdict.metadata["length"], "5");
        assert_eq!(verdict.metadata["fingerprint"], fingerprint(&record("héllo")));
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = fingerprint(&record("abc"));
        assert_eq!(a, fingerprint(&record("abc")));
        assert_ne!(a, fingerprint(&record("abd")));
        assert_eq!(a.len(), 12);
    }

    #[test]
    fn latency_stays_within_jitter_bound() {
        let checker = SimulatedChecker::new(SimulatedConfig {
            delay: Duration::from_millis(10),
            jitter: Duration::from_millis(5),
            ..SimulatedConfig::default()
        });
        for _ in 0..50 {
            let l = checker.latency();
            assert!(l >= Duration::from_millis(10) && l <= Duration::from_millis(15));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_for_configured_delay() {
        let checker = SimulatedChecker::new(SimulatedConfig {
            delay: Duration::from_secs(2),
            approval_rate: 1.0,
            ..SimulatedConfig::default()
        });
        let start = tokio::time::Instant::now();
        checker.check(&record("x")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
