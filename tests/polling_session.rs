//! Polling session scenarios on simulated time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use storefront_console::{ClientError, PollControl, PollingSession, SessionState};
use tokio::time::sleep;

fn counter() -> Arc<AtomicUsize> { Arc::new(AtomicUsize::new(0)) }

fn counting(calls: &Arc<AtomicUsize>) -> impl Fn() -> std::future::Ready<Result<PollControl, ClientError>> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Ok(PollControl::Continue))
    }
}

#[tokio::test(start_paused = true)]
async fn test_first_call_after_one_period() {
    let session = PollingSession::new("order-1");
    let calls = counter();
    session.start(Duration::from_millis(100), counting(&calls));

    sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    sleep(Duration::from_millis(300)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(session.state(), SessionState::Running);
}

#[tokio::test(start_paused = true)]
async fn test_restart_replaces_timer() {
    let session = PollingSession::new("order-1");
    let first = counter();
    let second = counter();
    session.start(Duration::from_millis(100), counting(&first));
    session.start(Duration::from_millis(100), counting(&second));

    sleep(Duration::from_millis(350)).await;
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_stop_prevents_further_calls() {
    let session = PollingSession::new("order-1");
    let calls = counter();
    session.start(Duration::from_millis(100), counting(&calls));

    sleep(Duration::from_millis(150)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    session.stop();
    assert_eq!(session.state(), SessionState::Idle);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_drop_stops_polling() {
    let calls = counter();
    {
        let session = PollingSession::new("dropped");
        session.start(Duration::from_millis(100), counting(&calls));
    }
    sleep(Duration::from_secs(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_error_keeps_polling_and_later_success_applies() {
    let session = PollingSession::new("order-1");
    let calls = counter();
    let latest = Arc::new(Mutex::new(None::<usize>));

    let (c, l) = (Arc::clone(&calls), Arc::clone(&latest));
    session.start(Duration::from_millis(100), move || {
        let n = c.fetch_add(1, Ordering::SeqCst);
        let l = Arc::clone(&l);
        async move {
            if n == 0 {
                return Err(ClientError::Transport("connection reset".into()));
            }
            *l.lock().unwrap() = Some(n);
            Ok(PollControl::Continue)
        }
    });

    sleep(Duration::from_millis(150)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*latest.lock().unwrap(), None);
    assert_eq!(session.state(), SessionState::Running);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(*latest.lock().unwrap(), Some(1));
    assert_eq!(session.state(), SessionState::Running);
}

#[tokio::test(start_paused = true)]
async fn test_settle_moves_to_idle() {
    let session = PollingSession::new("order-1");
    let calls = counter();
    let c = Arc::clone(&calls);
    session.start(Duration::from_millis(100), move || {
        let n = c.fetch_add(1, Ordering::SeqCst);
        async move { Ok(if n >= 1 { PollControl::Settle } else { PollControl::Continue }) }
    });

    sleep(Duration::from_millis(1_000)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_now_fires_immediately_while_running() {
    let session = PollingSession::new("order-1");
    let calls = counter();
    assert!(!session.refresh_now());

    session.start(Duration::from_secs(15), counting(&calls));
    assert!(session.refresh_now());
    sleep(Duration::from_millis(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(session.state(), SessionState::Running);

    session.stop();
    assert!(!session.refresh_now());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_now_settle_stops_session() {
    let session = PollingSession::new("order-1");
    session.start(Duration::from_secs(15), || async { Ok(PollControl::Settle) });
    assert!(session.refresh_now());
    sleep(Duration::from_millis(1)).await;
    assert_eq!(session.state(), SessionState::Idle);
}
