use guestflow_core::resilience::RetryPolicy;
use guestflow_core::state_machine::SessionState;
use guestflow_core::{ErrorKind, PipelineError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn step_error() -> PipelineError {
    PipelineError::AutomationStep {
        record_id: "row_2".to_string(),
        from: SessionState::FormReady,
        to: SessionState::Submitted,
        reason: "submit button missing".to_string(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_operation_runs_max_attempts_with_linear_backoff() {
    for max_attempts in 1..=5u32 {
        let policy = RetryPolicy::new(max_attempts, Duration::from_millis(2_000));
        let calls = &AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let outcome = policy
            .execute("always_fails", move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(step_error())
            })
            .await;

        // 2s × (1 + 2 + … + (n-1))
        let expected = Duration::from_millis(2_000 * u64::from(max_attempts * (max_attempts - 1) / 2));
        assert_eq!(calls.load(Ordering::SeqCst), max_attempts);
        assert_eq!(outcome.attempts, max_attempts);
        assert_eq!(outcome.total_wait, expected);
        assert_eq!(policy.worst_case_wait(), expected);
        let elapsed = started.elapsed();
        assert!(elapsed >= expected && elapsed < expected + Duration::from_millis(50));
        assert_eq!(outcome.result.unwrap_err().kind(), ErrorKind::AutomationStep);
    }
}

#[tokio::test(start_paused = true)]
async fn test_timeouts_are_retried_but_persistence_is_not() {
    let policy = RetryPolicy::new(3, Duration::from_millis(100));

    let timeouts = AtomicU32::new(0);
    let result = policy
        .run("confirmation", |attempt| {
            timeouts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(PipelineError::Timeout {
                        operation: "confirmation".to_string(),
                        timeout: Duration::from_secs(30),
                    })
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
    assert_eq!(result.unwrap(), 3);
    assert_eq!(timeouts.load(Ordering::SeqCst), 3);

    let writes = &AtomicU32::new(0);
    let outcome = policy
        .execute("status_write", move |_| async move {
            writes.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(PipelineError::persistence("update_status", "quota exceeded"))
        })
        .await;
    assert_eq!(writes.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.total_wait, Duration::ZERO);
}
