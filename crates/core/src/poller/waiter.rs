//! Polling loop.

use std::fmt::Display;
use std::future::Future;

use tracing::{debug, warn};

use super::cancel::CancelToken;
use super::types::{PollOutcome, PollSettings, WaitError};
use crate::metrics::POLLS_TOTAL;

/// Poll `poll` until it confirms, fails permanently, exhausts its attempts,
/// or `cancel` is set.
///
/// - `Confirmed` and `PermanentFailure` end the wait immediately.
/// - Each `Pending` outcome counts as one attempt; after
///   `settings.max_attempts` of them the wait times out.
/// - A poll that returns `Err` counts as a consecutive error. Reaching the
///   same cap in a row ends the wait as [`WaitError::Unreachable`]. Any
///   successful poll resets the error count.
/// - Every non-final poll is followed by exactly one sleep of
///   `settings.interval_ms`. Cancellation interrupts the sleep and is checked
///   before every poll, so a cancelled wait never polls again.
pub async fn wait_until<T, E, F, Fut>(
    label: &str,
    settings: PollSettings,
    cancel: &CancelToken,
    mut poll: F,
) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollOutcome<T>, E>>,
    E: Display,
{
    let mut attempts: u32 = 0;
    let mut errors: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            debug!(label, attempts, "wait cancelled");
            POLLS_TOTAL.with_label_values(&[label, "cancelled"]).inc();
            return Err(WaitError::Cancelled);
        }

        match poll().await {
            Ok(PollOutcome::Confirmed(value)) => {
                debug!(label, attempts, "confirmed");
                POLLS_TOTAL.with_label_values(&[label, "confirmed"]).inc();
                return Ok(value);
            }
            Ok(PollOutcome::PermanentFailure(reason)) => {
                warn!(label, attempts, "permanent failure: {}", reason);
                POLLS_TOTAL.with_label_values(&[label, "failed"]).inc();
                return Err(WaitError::Failed(reason));
            }
            Ok(PollOutcome::Pending) => {
                POLLS_TOTAL.with_label_values(&[label, "pending"]).inc();
                errors = 0;
                attempts += 1;
                debug!(label, attempts, max = settings.max_attempts, "still pending");
                if attempts >= settings.max_attempts {
                    warn!(label, attempts, "gave up waiting");
                    return Err(WaitError::TimedOut { attempts });
                }
            }
            Err(e) => {
                POLLS_TOTAL.with_label_values(&[label, "error"]).inc();
                errors += 1;
                warn!(label, errors, "poll error: {}", e);
                if errors >= settings.max_attempts {
                    return Err(WaitError::Unreachable {
                        errors,
                        last_error: e.to_string(),
                    });
                }
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(settings.interval()) => {}
            _ = cancel.cancelled() => {
                debug!(label, attempts, "wait cancelled during sleep");
                POLLS_TOTAL.with_label_values(&[label, "cancelled"]).inc();
                return Err(WaitError::Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    const SETTINGS: PollSettings = PollSettings::new(1_000, 5);

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_after_k_pending() {
        let calls = counter();
        let cancel = CancelToken::new();
        let started = Instant::now();

        let c = Arc::clone(&calls);
        let result = wait_until("test", SETTINGS, &cancel, move || {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= 3 {
                    Ok::<_, String>(PollOutcome::Pending)
                } else {
                    Ok(PollOutcome::Confirmed(n))
                }
            }
        })
        .await;

        assert_eq!(result, Ok(4));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(3 * 1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_on_first_poll_does_not_sleep() {
        let cancel = CancelToken::new();
        let started = Instant::now();

        let result = wait_until("test", SETTINGS, &cancel, || async {
            Ok::<_, String>(PollOutcome::Confirmed("url"))
        })
        .await;

        assert_eq!(result, Ok("url"));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_exactly_max_attempts() {
        let calls = counter();
        let cancel = CancelToken::new();

        let c = Arc::clone(&calls);
        let result: Result<(), _> = wait_until("test", SETTINGS, &cancel, move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(PollOutcome::Pending) }
        })
        .await;

        assert_eq!(result, Err(WaitError::TimedOut { attempts: 5 }));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_stops_immediately() {
        let calls = counter();
        let cancel = CancelToken::new();

        let c = Arc::clone(&calls);
        let result: Result<(), _> = wait_until("test", SETTINGS, &cancel, move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(PollOutcome::PermanentFailure("rejected".to_string())) }
        })
        .await;

        assert_eq!(result, Err(WaitError::Failed("rejected".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_third_poll_prevents_fifth() {
        let calls = counter();
        let cancel = CancelToken::new();

        let c = Arc::clone(&calls);
        let token = cancel.clone();
        let result: Result<(), _> = wait_until("test", PollSettings::new(1_000, 100), &cancel, move || {
            let n = c.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 3 {
                token.cancel();
            }
            async { Ok::<_, String>(PollOutcome::Pending) }
        })
        .await;

        assert_eq!(result, Err(WaitError::Cancelled));
        assert!(calls.load(Ordering::SeqCst) < 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_sleep() {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let started = Instant::now();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            token.cancel();
        });

        let result: Result<(), _> = wait_until("test", PollSettings::new(10_000, 100), &cancel, || async {
            Ok::<_, String>(PollOutcome::Pending)
        })
        .await;

        assert_eq!(result, Err(WaitError::Cancelled));
        assert!(started.elapsed() < Duration::from_millis(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_errors_reach_cap() {
        let calls = counter();
        let cancel = CancelToken::new();

        let c = Arc::clone(&calls);
        let result: Result<(), _> = wait_until("test", PollSettings::new(100, 3), &cancel, move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<PollOutcome<()>, _>("no data".to_string()) }
        })
        .await;

        assert_eq!(
            result,
            Err(WaitError::Unreachable {
                errors: 3,
                last_error: "no data".to_string()
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_reset_by_pending_outcome() {
        let calls = counter();
        let cancel = CancelToken::new();

        // error, error, pending, error, error, confirmed: never three errors in a row
        let c = Arc::clone(&calls);
        let result = wait_until("test", PollSettings::new(100, 3), &cancel, move || {
            let n = c.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                match n {
                    3 => Ok(PollOutcome::Pending),
                    6 => Ok(PollOutcome::Confirmed(())),
                    _ => Err("flaky".to_string()),
                }
            }
        })
        .await;

        assert_eq!(result, Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_already_cancelled_never_polls() {
        let calls = counter();
        let cancel = CancelToken::new();
        cancel.cancel();

        let c = Arc::clone(&calls);
        let result: Result<(), _> = wait_until("test", SETTINGS, &cancel, move || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, String>(PollOutcome::Pending) }
        })
        .await;

        assert_eq!(result, Err(WaitError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
