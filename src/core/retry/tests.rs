use crate::core::retry::{with_retries, RetryPolicy};
use crate::core::types::{Extraction, Price};
use crate::ScraperError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

fn policy(max_attempts: usize) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(10))
}

/// Fails `failures` times, then returns `value`.
async fn flaky(calls: &AtomicUsize, failures: usize, value: &str) -> Extraction<String> {
    let call = calls.fetch_add(1, Ordering::SeqCst);
    if call < failures {
        Extraction::Absent
    } else {
        Extraction::Found(value.to_string())
    }
}

#[tokio::test]
async fn test_succeeds_on_third_attempt() {
    let calls = AtomicUsize::new(0);
    let result = with_retries(&policy(3), || flaky(&calls, 2, "8718468778")).await;

    assert_eq!(result.into_option(), Some("8718468778".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let calls = AtomicUsize::new(0);
    let result = with_retries(&policy(2), || flaky(&calls, 2, "8718468778")).await;

    assert!(matches!(result, Extraction::Absent));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_returns_immediately_on_first_success() {
    let calls = AtomicUsize::new(0);
    let start = Instant::now();
    let result = with_retries(
        &RetryPolicy::new(3, Duration::from_secs(5)),
        || flaky(&calls, 0, "12345678"),
    )
    .await;

    assert!(result.is_found());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_no_delay_after_final_attempt() {
    let calls = AtomicUsize::new(0);
    let start = Instant::now();
    let _ = with_retries(
        &RetryPolicy::new(2, Duration::from_millis(200)),
        || flaky(&calls, 10, "unused"),
    )
    .await;

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(400));
}

#[tokio::test]
async fn test_blank_string_counts_as_failure() {
    let calls = AtomicUsize::new(0);
    let result = with_retries(&policy(3), || {
        let call = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if call == 0 {
                Extraction::Found("   ".to_string())
            } else {
                Extraction::Found("87654321".to_string())
            }
        }
    })
    .await;

    assert_eq!(result.into_option(), Some("87654321".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_zero_price_counts_as_failure() {
    let calls = AtomicUsize::new(0);
    let result = with_retries(&policy(2), || {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Extraction::Found(Price::new(0.0)) }
    })
    .await;

    assert!(matches!(result, Extraction::Absent));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_last_failure_is_reported() {
    let result: Extraction<String> = with_retries(&policy(2), || async {
        Extraction::Failed(ScraperError::ExtractionError("boom".to_string()))
    })
    .await;

    assert!(matches!(result, Extraction::Failed(ScraperError::ExtractionError(_))));
}
