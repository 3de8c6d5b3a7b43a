//! Idempotent Dispatch Wrapper
//!
//! Runs a listener's work at most once per (event id, handler id) by claiming
//! a ledger entry before the work and recording the outcome after it.
//!
//! ```text
//! (no entry) --claim--> RETRYING --ok--> SUCCESS
//!                          |
//!                          +--err--> FAILED
//! RETRYING (in flight)  --> bounded backoff, re-check, LedgerRaceTimeout
//! RETRYING (lease gone) --> FAILED, then as below
//! SUCCESS               --> AlreadyProcessed, work not called
//! FAILED                --> raise, or take over under the retry policy
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::{FailedPolicy, IdempotencySettings};
use crate::domain::events::{DomainEvent, EventEnvelope, EventMetadata};
use crate::domain::{
    ClaimOutcome, ClaimRequest, IdempotencyLedger, LedgerKey, ProcessingStatus,
};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Upper bound on handler id length (ledger column width).
pub const MAX_HANDLER_ID_LENGTH: usize = 128;

/// Denormalized event details stored on the ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub event_type: String,
    pub event_version: u32,
    pub correlation_id: Option<String>,
}

impl VersionInfo {
    pub fn of(metadata: &EventMetadata) -> Self {
        Self {
            event_type: metadata.event_type().as_str().to_string(),
            event_version: metadata.version(),
            correlation_id: metadata.correlation_id().map(str::to_string),
        }
    }
}

/// Result of a wrapped call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdempotentOutcome<T> {
    /// The work ran in this call.
    Executed(T),
    /// A previous delivery already completed; the work was not called.
    AlreadyProcessed,
}

impl<T> IdempotentOutcome<T> {
    pub fn was_executed(&self) -> bool {
        matches!(self, IdempotentOutcome::Executed(_))
    }
}

/// Idempotency errors
#[derive(Debug, thiserror::Error)]
pub enum IdempotencyError {
    #[error("Handler {handler_id} failed for event {event_id}: {message}")]
    HandlerFailure {
        event_id: Uuid,
        handler_id: String,
        message: String,
    },

    #[error(
        "Gave up waiting on in-flight handler {handler_id} for event {event_id} \
         after {attempts} attempts ({waited_ms} ms)"
    )]
    LedgerRaceTimeout {
        event_id: Uuid,
        handler_id: String,
        attempts: u32,
        waited_ms: u64,
    },

    #[error("Handler {handler_id} previously failed for event {event_id}: {message}")]
    PreviouslyFailed {
        event_id: Uuid,
        handler_id: String,
        retry_count: u32,
        message: String,
    },

    #[error("Handler {handler_id} exhausted retries for event {event_id} ({retry_count} failures)")]
    RetriesExhausted {
        event_id: Uuid,
        handler_id: String,
        retry_count: u32,
    },

    #[error("Invalid handler id: {0:?}")]
    InvalidHandlerId(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] AppError),
}

impl IdempotencyError {
    /// Whether redelivering the same event later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IdempotencyError::HandlerFailure { .. }
                | IdempotencyError::LedgerRaceTimeout { .. }
                | IdempotencyError::Ledger(_)
        )
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            IdempotencyError::HandlerFailure { .. } => "handler_failure",
            IdempotencyError::LedgerRaceTimeout { .. } => "race_timeout",
            IdempotencyError::PreviouslyFailed { .. } => "previously_failed",
            IdempotencyError::RetriesExhausted { .. } => "retries_exhausted",
            IdempotencyError::InvalidHandlerId(_) => "invalid_handler_id",
            IdempotencyError::Ledger(_) => "ledger",
        }
    }
}

/// Parse an event id, replacing missing or malformed ones with a fresh id.
///
/// The replacement is logged and counted so the anomaly stays visible.
pub fn normalize_event_id(raw: &str) -> Uuid {
    match Uuid::parse_str(raw.trim()) {
        Ok(id) if !id.is_nil() => id,
        _ => {
            let fresh = Uuid::now_v7();
            warn!(
                raw_event_id = %raw,
                event_id = %fresh,
                "Malformed event id, generated a fresh one"
            );
            metrics::record_event_id_replacement();
            fresh
        }
    }
}

fn validate_handler_id(handler_id: &str) -> Result<(), IdempotencyError> {
    if handler_id.trim().is_empty() || handler_id.len() > MAX_HANDLER_ID_LENGTH {
        return Err(IdempotencyError::InvalidHandlerId(handler_id.to_string()));
    }
    Ok(())
}

/// Bounded exponential backoff with jitter for the in-flight branch.
struct Backoff<'a> {
    settings: &'a IdempotencySettings,
    attempts: u32,
    started: Instant,
}

impl<'a> Backoff<'a> {
    fn new(settings: &'a IdempotencySettings) -> Self {
        Self {
            settings,
            attempts: 0,
            started: Instant::now(),
        }
    }

    fn waited_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Delay before the next re-check, `None` once the budget is spent.
    fn next_delay(&mut self) -> Option<Duration> {
        let waited = self.waited_ms();
        if self.attempts >= self.settings.max_wait_attempts || waited >= self.settings.max_wait_ms {
            return None;
        }
        self.attempts += 1;

        let exp = self
            .settings
            .initial_backoff_ms
            .saturating_mul(1u64 << (self.attempts - 1).min(20));
        let ceiling = exp.min(self.settings.max_backoff_ms);
        let jittered = rand::rng().random_range(ceiling / 2..=ceiling);
        let remaining = self.settings.max_wait_ms - waited;

        Some(Duration::from_millis(jittered.min(remaining).max(1)))
    }
}

/// Idempotency service wrapping listener work with the ledger protocol.
pub struct IdempotencyService {
    ledger: Arc<dyn IdempotencyLedger>,
    settings: IdempotencySettings,
}

impl IdempotencyService {
    pub fn new(ledger: Arc<dyn IdempotencyLedger>, settings: IdempotencySettings) -> Self {
        Self { ledger, settings }
    }

    pub fn ledger(&self) -> &Arc<dyn IdempotencyLedger> {
        &self.ledger
    }

    pub fn settings(&self) -> &IdempotencySettings {
        &self.settings
    }

    /// Run `work` for one delivery of `envelope` to `handler_id`.
    pub async fn run_for<E, T, F, Fut>(
        &self,
        envelope: &EventEnvelope<E>,
        handler_id: &str,
        work: F,
    ) -> Result<IdempotentOutcome<T>, IdempotencyError>
    where
        E: DomainEvent,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send,
        T: Send,
    {
        let version = VersionInfo::of(envelope.metadata());
        self.with_idempotency(&envelope.event_id().to_string(), handler_id, &version, work)
            .await
    }

    /// Execute `work` at most once per (event id, handler id).
    ///
    /// Returns `AlreadyProcessed` without calling `work` when an earlier
    /// delivery reached `SUCCESS`. A failure of `work` is recorded as
    /// `FAILED` and returned as [`IdempotencyError::HandlerFailure`].
    #[instrument(
        skip(self, version, work),
        fields(event_type = %version.event_type, correlation_id = ?version.correlation_id)
    )]
    pub async fn with_idempotency<T, F, Fut>(
        &self,
        event_id: &str,
        handler_id: &str,
        version: &VersionInfo,
        work: F,
    ) -> Result<IdempotentOutcome<T>, IdempotencyError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = anyhow::Result<T>> + Send,
        T: Send,
    {
        validate_handler_id(handler_id)?;
        let event_id = normalize_event_id(event_id);
        let key = LedgerKey::new(event_id, handler_id);

        let claim_token = match self.acquire(&key, version).await? {
            Some(token) => token,
            None => {
                debug!(%event_id, handler_id, "Already processed, skipping");
                metrics::record_handler_outcome(handler_id, "skipped");
                return Ok(IdempotentOutcome::AlreadyProcessed);
            }
        };

        let started = Instant::now();
        let result = work().await;
        metrics::record_handler_duration(handler_id, started.elapsed().as_secs_f64());

        match result {
            Ok(value) => {
                if !self.ledger.mark_success(&key, claim_token).await? {
                    warn!(%event_id, handler_id, "Claim was taken over before completion");
                }
                metrics::record_handler_outcome(handler_id, "executed");
                debug!(%event_id, handler_id, "Handler succeeded");
                Ok(IdempotentOutcome::Executed(value))
            }
            Err(err) => {
                let message = format!("{:#}", err);
                if !self
                    .ledger
                    .mark_failed(&key, claim_token, &message)
                    .await?
                {
                    warn!(%event_id, handler_id, "Claim was taken over before failure was recorded");
                }
                metrics::record_handler_outcome(handler_id, "failed");
                warn!(%event_id, handler_id, error = %message, "Handler failed");
                Err(IdempotencyError::HandlerFailure {
                    event_id,
                    handler_id: handler_id.to_string(),
                    message,
                })
            }
        }
    }

    /// Obtain the claim token for `key`, or `None` when it already succeeded.
    async fn acquire(
        &self,
        key: &LedgerKey,
        version: &VersionInfo,
    ) -> Result<Option<Uuid>, IdempotencyError> {
        let mut backoff = Backoff::new(&self.settings);

        loop {
            let entry = self.ledger.lookup(key).await?;

            let Some(entry) = entry else {
                let request = ClaimRequest {
                    key: key.clone(),
                    event_type: version.event_type.clone(),
                    event_version: version.event_version,
                    correlation_id: version.correlation_id.clone(),
                    lease_expires_at: Utc::now() + self.settings.lease(),
                };
                match self.ledger.claim(&request).await? {
                    ClaimOutcome::Claimed(token) => return Ok(Some(token)),
                    ClaimOutcome::AlreadyExists => {
                        debug!(%key, "Lost claim race, re-checking");
                        continue;
                    }
                }
            };

            match entry.status {
                ProcessingStatus::Success => return Ok(None),

                ProcessingStatus::Failed => match self.settings.failed_policy {
                    FailedPolicy::Raise => {
                        return Err(IdempotencyError::PreviouslyFailed {
                            event_id: key.event_id,
                            handler_id: key.handler_id.clone(),
                            retry_count: entry.retry_count,
                            message: entry.error_message.unwrap_or_default(),
                        });
                    }
                    FailedPolicy::Retry => {
                        let max_retries = self.settings.max_retries;
                        if entry.retry_count > max_retries {
                            return Err(IdempotencyError::RetriesExhausted {
                                event_id: key.event_id,
                                handler_id: key.handler_id.clone(),
                                retry_count: entry.retry_count,
                            });
                        }
                        let lease = Utc::now() + self.settings.lease();
                        if let Some(token) = self
                            .ledger
                            .reclaim(key, max_retries, lease)
                            .await?
                        {
                            info!(
                                %key,
                                retry_count = entry.retry_count,
                                "Retrying previously failed handler"
                            );
                            return Ok(Some(token));
                        }
                        self.wait(&mut backoff, key).await?;
                    }
                },

                // the abandoned attempt is a failure; the next pass applies the policy
                ProcessingStatus::Retrying if entry.lease_expired(Utc::now()) => {
                    if self.ledger.expire(key, Utc::now()).await? {
                        metrics::record_reaped(1);
                        warn!(%key, "Claim lease expired, marked as failed");
                    }
                }

                ProcessingStatus::Retrying => self.wait(&mut backoff, key).await?,
            }
        }
    }

    async fn wait(&self, backoff: &mut Backoff<'_>, key: &LedgerKey) -> Result<(), IdempotencyError> {
        match backoff.next_delay() {
            Some(delay) => {
                metrics::record_race_wait(&key.handler_id);
                debug!(
                    %key,
                    attempt = backoff.attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Handler in flight elsewhere, backing off"
                );
                tokio::time::sleep(delay).await;
                Ok(())
            }
            None => {
                metrics::record_race_timeout(&key.handler_id);
                warn!(
                    %key,
                    attempts = backoff.attempts,
                    waited_ms = backoff.waited_ms(),
                    "Wait budget exhausted on in-flight handler"
                );
                Err(IdempotencyError::LedgerRaceTimeout {
                    event_id: key.event_id,
                    handler_id: key.handler_id.clone(),
                    attempts: backoff.attempts,
                    waited_ms: backoff.waited_ms(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MockIdempotencyLedger, LEASE_EXPIRED_MESSAGE};
    use crate::infrastructure::memory::InMemoryLedger;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn version() -> VersionInfo {
        VersionInfo {
            event_type: "user.blocked".into(),
            event_version: 2,
            correlation_id: Some("req-1".into()),
        }
    }

    fn fast_settings() -> IdempotencySettings {
        IdempotencySettings {
            max_wait_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
            max_wait_ms: 50,
            ..IdempotencySettings::default()
        }
    }

    fn service_with(settings: IdempotencySettings) -> (IdempotencyService, Arc<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::new());
        (IdempotencyService::new(ledger.clone(), settings), ledger)
    }

    #[tokio::test]
    async fn test_second_call_skips_work() {
        let (service, ledger) = service_with(fast_settings());
        let event_id = Uuid::now_v7().to_string();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            service
                .with_idempotency(&event_id, "h1", &version(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
                .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let key = LedgerKey::new(Uuid::parse_str(&event_id).unwrap(), "h1");
        let entry = ledger.lookup(&key).await.unwrap().unwrap();
        assert_eq!(entry.status, ProcessingStatus::Success);
        assert_eq!(entry.event_type, "user.blocked");
        assert_eq!(entry.correlation_id.as_deref(), Some("req-1"));
    }

    #[tokio::test]
    async fn test_failure_is_recorded_then_raised() {
        let (service, ledger) = service_with(fast_settings());
        let event_id = Uuid::now_v7();

        let err = service
            .with_idempotency(&event_id.to_string(), "h1", &version(), || async {
                Err::<(), _>(anyhow::anyhow!("boom"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IdempotencyError::HandlerFailure { ref message, .. } if message == "boom"));
        assert!(err.is_retryable());

        let entry = ledger
            .lookup(&LedgerKey::new(event_id, "h1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, ProcessingStatus::Failed);
        assert_eq!(entry.retry_count, 1);
        assert_eq!(entry.error_message.as_deref(), Some("boom"));

        let err = service
            .with_idempotency(&event_id.to_string(), "h1", &version(), || async { Ok(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, IdempotencyError::PreviouslyFailed { retry_count: 1, .. }));
    }

    #[tokio::test]
    async fn test_retry_policy_reruns_until_bound() {
        let settings = IdempotencySettings {
            failed_policy: FailedPolicy::Retry,
            max_retries: 1,
            ..fast_settings()
        };
        let (service, _) = service_with(settings);
        let event_id = Uuid::now_v7().to_string();
        let fail = || async { Err::<(), _>(anyhow::anyhow!("down")) };

        // first attempt + one retry
        for _ in 0..2 {
            let err = service
                .with_idempotency(&event_id, "h1", &version(), fail)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "handler_failure");
        }

        let err = service
            .with_idempotency(&event_id, "h1", &version(), fail)
            .await
            .unwrap_err();
        assert!(matches!(err, IdempotencyError::RetriesExhausted { retry_count: 2, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_retry_policy_success_after_failure() {
        let settings = IdempotencySettings {
            failed_policy: FailedPolicy::Retry,
            ..fast_settings()
        };
        let (service, _) = service_with(settings);
        let event_id = Uuid::now_v7().to_string();

        let _ = service
            .with_idempotency(&event_id, "h1", &version(), || async {
                Err::<(), _>(anyhow::anyhow!("flaky"))
            })
            .await;

        let outcome = service
            .with_idempotency(&event_id, "h1", &version(), || async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(outcome, IdempotentOutcome::Executed(7));
    }

    #[tokio::test]
    async fn test_in_flight_claim_times_out() {
        let (service, ledger) = service_with(fast_settings());
        let event_id = Uuid::now_v7();
        let request = ClaimRequest {
            key: LedgerKey::new(event_id, "h1"),
            event_type: "user.blocked".into(),
            event_version: 2,
            correlation_id: None,
            lease_expires_at: Utc::now() + chrono::Duration::minutes(5),
        };
        ledger.claim(&request).await.unwrap();

        let calls = AtomicUsize::new(0);
        let err = service
            .with_idempotency(&event_id.to_string(), "h1", &version(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, IdempotencyError::LedgerRaceTimeout { attempts: 3, .. }));
        assert!(err.is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    /// Leaves a `RETRYING` entry whose owner went away a second ago.
    async fn abandoned_claim(ledger: &InMemoryLedger, event_id: Uuid) -> (LedgerKey, Uuid) {
        let request = ClaimRequest {
            key: LedgerKey::new(event_id, "h1"),
            event_type: "user.blocked".into(),
            event_version: 2,
            correlation_id: None,
            lease_expires_at: Utc::now() - chrono::Duration::seconds(1),
        };
        match ledger.claim(&request).await.unwrap() {
            ClaimOutcome::Claimed(token) => (request.key, token),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_lease_is_raised_as_failure() {
        let settings = IdempotencySettings {
            max_retries: 0,
            ..fast_settings()
        };
        let (service, ledger) = service_with(settings);
        let event_id = Uuid::now_v7();
        let (key, stale) = abandoned_claim(&ledger, event_id).await;
        let calls = AtomicUsize::new(0);

        let err = service
            .with_idempotency(&event_id.to_string(), "h1", &version(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IdempotencyError::PreviouslyFailed { retry_count: 1, ref message, .. }
                if message == LEASE_EXPIRED_MESSAGE
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let entry = ledger.lookup(&key).await.unwrap().unwrap();
        assert_eq!(entry.status, ProcessingStatus::Failed);
        assert_eq!(entry.retry_count, 1);
        // the crashed owner can no longer overwrite the result
        assert!(!ledger.mark_success(&key, stale).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_lease_matches_reaped_claim() {
        let (service, ledger) = service_with(fast_settings());
        let reaped_id = Uuid::now_v7();
        let redelivered_id = Uuid::now_v7();
        abandoned_claim(&ledger, reaped_id).await;
        abandoned_claim(&ledger, redelivered_id).await;
        ledger.expire(&LedgerKey::new(reaped_id, "h1"), Utc::now()).await.unwrap();

        for event_id in [reaped_id, redelivered_id] {
            let err = service
                .with_idempotency(&event_id.to_string(), "h1", &version(), || async { Ok(()) })
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "previously_failed");
        }
    }

    #[tokio::test]
    async fn test_expired_lease_is_retried_under_retry_policy() {
        let settings = IdempotencySettings {
            failed_policy: FailedPolicy::Retry,
            max_retries: 1,
            ..fast_settings()
        };
        let (service, ledger) = service_with(settings);
        let event_id = Uuid::now_v7();
        let (key, stale) = abandoned_claim(&ledger, event_id).await;

        let outcome = service
            .with_idempotency(&event_id.to_string(), "h1", &version(), || async { Ok(()) })
            .await
            .unwrap();
        assert!(outcome.was_executed());

        assert!(!ledger.mark_failed(&key, stale, "late").await.unwrap());
        let entry = ledger.lookup(&key).await.unwrap().unwrap();
        assert_eq!(entry.status, ProcessingStatus::Success);
        assert_eq!(entry.retry_count, 1);
    }

    #[tokio::test]
    async fn test_expired_lease_counts_against_retry_bound() {
        let settings = IdempotencySettings {
            failed_policy: FailedPolicy::Retry,
            max_retries: 0,
            ..fast_settings()
        };
        let (service, ledger) = service_with(settings);
        let event_id = Uuid::now_v7();
        abandoned_claim(&ledger, event_id).await;
        let calls = AtomicUsize::new(0);

        let err = service
            .with_idempotency(&event_id.to_string(), "h1", &version(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, IdempotencyError::RetriesExhausted { retry_count: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_execute_once() {
        let settings = IdempotencySettings {
            max_wait_attempts: 50,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            max_wait_ms: 2_000,
            ..IdempotencySettings::default()
        };
        let (service, ledger) = service_with(settings);
        let service = Arc::new(service);
        let event_id = Uuid::now_v7().to_string();
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let service = service.clone();
                let calls = calls.clone();
                let event_id = event_id.clone();
                tokio::spawn(async move {
                    service
                        .with_idempotency(&event_id, "h1", &version(), || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            Ok(())
                        })
                        .await
                })
            })
            .collect();

        let mut executed = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().was_executed() {
                executed += 1;
            }
        }

        assert_eq!(executed, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ledger.count_with_status(ProcessingStatus::Success), 1);
    }

    #[tokio::test]
    async fn test_malformed_event_id_gets_fresh_key() {
        let (service, ledger) = service_with(fast_settings());

        let outcome = service
            .with_idempotency("not-a-uuid", "h1", &version(), || async { Ok(()) })
            .await
            .unwrap();

        assert!(outcome.was_executed());
        assert_eq!(ledger.count_with_status(ProcessingStatus::Success), 1);
    }

    #[tokio::test]
    async fn test_blank_handler_id_is_rejected() {
        let (service, _) = service_with(fast_settings());

        let err = service
            .with_idempotency(&Uuid::now_v7().to_string(), " ", &version(), || async {
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, IdempotencyError::InvalidHandlerId(_)));
    }

    #[tokio::test]
    async fn test_ledger_errors_surface_without_running_work() {
        let mut ledger = MockIdempotencyLedger::new();
        ledger
            .expect_lookup()
            .returning(|_| Err(AppError::Internal("connection reset".into())));
        let service = IdempotencyService::new(Arc::new(ledger), fast_settings());
        let calls = AtomicUsize::new(0);

        let err = service
            .with_idempotency(&Uuid::now_v7().to_string(), "h1", &version(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, IdempotencyError::Ledger(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_normalize_keeps_valid_ids() {
        let id = Uuid::now_v7();
        assert_eq!(normalize_event_id(&id.to_string()), id);
        assert_ne!(normalize_event_id(&Uuid::nil().to_string()), Uuid::nil());
    }
}
