//! Order views driven by an in-memory backend.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use storefront_console::domain::workflow::{default_note, DEFAULT_CANCEL_NOTE};
use storefront_console::{
    ClientError, NoticeLevel, Notices, Order, OrderAction, OrderBackend, OrderListWatch, OrderQuery, OrderStatusEvent,
    OrderStatus, OrderWatch, Page, PollControl, PollingSession, SessionState, StatusCode, TrackingNumber, TransitionRequest,
};
use tokio::time::sleep;

fn order(id: i64, codes: &[i32]) -> Order {
    Order { id, status: codes.iter().map(|c| OrderStatusEvent::new(*c, format!("status {c}"))).collect(), ..Default::default() }
}

fn ids(orders: &[Order]) -> Vec<i64> { orders.iter().map(|o| o.id).collect() }

#[derive(Default)]
struct FakeBackend {
    order: Mutex<Order>,
    scripted: Mutex<VecDeque<(Duration, Result<Order, ClientError>)>>,
    first_pages: Mutex<VecDeque<(Duration, Result<Page<Order>, ClientError>)>>,
    pages: Mutex<HashMap<u32, Page<Order>>>,
    requests: Mutex<Vec<(String, TransitionRequest)>>,
    list_calls: Mutex<usize>,
    queries: Mutex<Vec<OrderQuery>>,
}

impl FakeBackend {
    fn with_order(order: Order) -> Arc<Self> {
        let fake = Self::default();
        *fake.order.lock().unwrap() = order;
        Arc::new(fake)
    }

    fn script(&self, delay_ms: u64, result: Result<Order, ClientError>) {
        self.scripted.lock().unwrap().push_back((Duration::from_millis(delay_ms), result));
    }

    fn first_page(&self, delay_ms: u64, result: Result<Page<Order>, ClientError>) {
        self.first_pages.lock().unwrap().push_back((Duration::from_millis(delay_ms), result));
    }

    fn push_status(&self, code: i32) {
        self.order.lock().unwrap().status.push(OrderStatusEvent::new(code, "backend"));
    }
}

#[async_trait]
impl OrderBackend for FakeBackend {
    async fn fetch_order(&self, _id: i64) -> Result<Order, ClientError> {
        let next = self.scripted.lock().unwrap().pop_front();
        match next {
            Some((delay, result)) => {
                sleep(delay).await;
                result
            }
            None => Ok(self.order.lock().unwrap().clone()),
        }
    }

    async fn fetch_orders(&self, query: &OrderQuery) -> Result<Page<Order>, ClientError> {
        *self.list_calls.lock().unwrap() += 1;
        self.queries.lock().unwrap().push(query.clone());
        if query.page == 0 {
            let next = self.first_pages.lock().unwrap().pop_front();
            if let Some((delay, result)) = next {
                sleep(delay).await;
                return result;
            }
        }
        Ok(self.pages.lock().unwrap().get(&query.page).cloned().unwrap_or_else(|| Page::of(Vec::new(), true)))
    }

    async fn apply_action(&self, _id: i64, action: OrderAction, request: &TransitionRequest) -> Result<(), ClientError> {
        self.requests.lock().unwrap().push((action.as_str().to_string(), request.clone()));
        self.push_status(action.target().code());
        Ok(())
    }

    async fn cancel_order(&self, _id: i64, request: &TransitionRequest) -> Result<(), ClientError> {
        self.requests.lock().unwrap().push(("cancel".to_string(), request.clone()));
        self.push_status(8);
        Ok(())
    }
}

fn current(watch: &OrderWatch) -> Option<i32> { watch.order().and_then(|o| o.current_code()).map(StatusCode::value) }

// =============================================================================
// OrderWatch
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_out_of_order_response_is_discarded() {
    let fake = FakeBackend::with_order(order(1, &[1]));
    fake.script(200, Ok(order(1, &[1])));
    fake.script(10, Ok(order(1, &[1, 3])));
    let watch = OrderWatch::new(1, fake.clone(), Notices::default());

    let late = watch.clone();
    let (slow, fast) = tokio::join!(late.refresh(), async {
        sleep(Duration::from_millis(1)).await;
        watch.refresh().await
    });
    assert!(slow.is_ok());
    assert!(fast.is_ok());
    assert_eq!(current(&watch), Some(3));
    assert_eq!(watch.snapshot().applied_seq, 2);
}

#[tokio::test]
async fn test_failed_fetch_keeps_last_good_order() {
    let fake = FakeBackend::with_order(order(1, &[1, 3]));
    let notices = Notices::default();
    let mut rx = notices.subscribe();
    let watch = OrderWatch::new(1, fake.clone(), notices);

    assert_eq!(watch.refresh().await.unwrap(), PollControl::Continue);
    fake.script(0, Err(ClientError::Transport("connection refused".into())));
    let err = watch.refresh().await.unwrap_err();
    assert_eq!(err, ClientError::Transport("connection refused".into()));

    assert_eq!(current(&watch), Some(3));
    assert!(watch.snapshot().last_error.is_some());
    let notice = rx.recv().await.unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.message.contains("#1"));

    watch.refresh().await.unwrap();
    assert!(watch.snapshot().last_error.is_none());
}

#[tokio::test]
async fn test_refresh_settles_on_final_status() {
    let watch = OrderWatch::new(1, FakeBackend::with_order(order(1, &[1, 3, 4, 5, 6, 7])), Notices::default());
    assert_eq!(watch.refresh().await.unwrap(), PollControl::Settle);

    let watch = OrderWatch::new(2, FakeBackend::with_order(order(2, &[1, 8])), Notices::default());
    assert_eq!(watch.refresh().await.unwrap(), PollControl::Settle);

    let watch = OrderWatch::new(3, FakeBackend::with_order(order(3, &[])), Notices::default());
    assert_eq!(watch.refresh().await.unwrap(), PollControl::Continue);
}

#[tokio::test(start_paused = true)]
async fn test_attached_session_stops_once_order_completes() {
    let fake = FakeBackend::with_order(order(1, &[1, 3, 4, 5, 6]));
    let watch = OrderWatch::new(1, fake.clone(), Notices::default());
    let session = PollingSession::new("order-1");
    watch.attach(&session, Duration::from_millis(100));

    sleep(Duration::from_millis(150)).await;
    assert_eq!(current(&watch), Some(6));
    assert_eq!(session.state(), SessionState::Running);

    fake.push_status(7);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(current(&watch), Some(7));
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_focus_refreshes_between_ticks() {
    let fake = FakeBackend::with_order(order(1, &[1]));
    let watch = OrderWatch::new(1, fake.clone(), Notices::default());
    let session = PollingSession::new("order-1");
    assert!(!watch.focus(&session));

    watch.attach(&session, Duration::from_secs(15));
    fake.push_status(3);
    assert!(watch.focus(&session));
    sleep(Duration::from_millis(1)).await;
    assert_eq!(current(&watch), Some(3));
}

#[tokio::test]
async fn test_apply_only_offered_action() {
    let fake = FakeBackend::with_order(order(9, &[1, 3, 4]));
    let watch = OrderWatch::new(9, fake.clone(), Notices::default());

    let not_loaded = watch.apply(OrderAction::Ship, TransitionRequest::new("x")).await;
    assert!(matches!(not_loaded, Err(ClientError::InvalidRequest(_))));

    watch.refresh().await.unwrap();
    let wrong = watch.apply(OrderAction::Confirm, TransitionRequest::new("x")).await;
    assert!(matches!(wrong, Err(ClientError::InvalidRequest(_))));
    let no_tracking = watch.apply(OrderAction::Ship, TransitionRequest::new("x")).await;
    assert!(matches!(no_tracking, Err(ClientError::InvalidRequest(_))));
    assert!(fake.requests.lock().unwrap().is_empty());

    let tracking = TrackingNumber::new("GHN123456789").unwrap();
    watch.apply(OrderAction::Ship, TransitionRequest::shipping("", &tracking)).await.unwrap();

    let requests = fake.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "ship");
    assert_eq!(requests[0].1.note, default_note(OrderAction::Ship));
    assert_eq!(requests[0].1.tracking_number.as_deref(), Some("GHN123456789"));
    assert_eq!(current(&watch), Some(5));
    assert_eq!(watch.order().unwrap().next_action(), Some(OrderAction::Deliver));
}

#[tokio::test]
async fn test_cancel_gated_by_status() {
    let fake = FakeBackend::with_order(order(4, &[1, 3, 4, 5]));
    let watch = OrderWatch::new(4, fake.clone(), Notices::default());
    watch.refresh().await.unwrap();
    assert!(matches!(watch.cancel(TransitionRequest::new("")).await, Err(ClientError::InvalidRequest(_))));

    let fake = FakeBackend::with_order(order(5, &[1]));
    let notices = Notices::default();
    let mut rx = notices.subscribe();
    let watch = OrderWatch::new(5, fake.clone(), notices);
    watch.refresh().await.unwrap();
    watch.cancel(TransitionRequest::new("  ").with_detail("customer request")).await.unwrap();

    let requests = fake.requests.lock().unwrap().clone();
    assert_eq!(requests[0].0, "cancel");
    assert_eq!(requests[0].1.note, DEFAULT_CANCEL_NOTE);
    assert_eq!(requests[0].1.detail.as_deref(), Some("customer request"));
    assert_eq!(current(&watch), Some(8));
    assert!(watch.order().unwrap().is_final());
    assert_eq!(rx.recv().await.unwrap().level, NoticeLevel::Success);
}

// =============================================================================
// OrderListWatch
// =============================================================================

fn paged_fake() -> Arc<FakeBackend> {
    let fake = FakeBackend::default();
    {
        let mut pages = fake.pages.lock().unwrap();
        pages.insert(0, Page::of(vec![order(50, &[1]), order(40, &[1])], false));
        pages.insert(1, Page::of(vec![order(40, &[1]), order(30, &[1]), order(20, &[1])], false));
    }
    Arc::new(fake)
}

#[tokio::test]
async fn test_list_load_more_until_end() {
    let fake = paged_fake();
    let list = OrderListWatch::new(None, fake.clone(), Notices::default());

    list.refresh().await.unwrap();
    let view = list.snapshot();
    assert_eq!(ids(&view.orders), vec![50, 40]);
    assert_eq!(view.next_page, 1);
    assert!(!view.is_end);

    assert_eq!(list.load_more().await.unwrap(), 2);
    assert_eq!(ids(&list.orders()), vec![50, 40, 30, 20]);

    assert_eq!(list.load_more().await.unwrap(), 0);
    assert!(list.snapshot().is_end);

    let calls = *fake.list_calls.lock().unwrap();
    assert_eq!(list.load_more().await.unwrap(), 0);
    assert_eq!(*fake.list_calls.lock().unwrap(), calls);
}

#[tokio::test]
async fn test_list_refresh_keeps_extra_pages() {
    let fake = paged_fake();
    let list = OrderListWatch::new(None, fake.clone(), Notices::default());
    list.refresh().await.unwrap();
    list.load_more().await.unwrap();

    fake.first_page(0, Ok(Page::of(vec![order(60, &[1]), order(50, &[3])], false)));
    assert_eq!(list.refresh().await.unwrap(), PollControl::Continue);
    let orders = list.orders();
    assert_eq!(ids(&orders), vec![60, 50, 40, 30, 20]);
    assert_eq!(orders[1].current_code(), Some(StatusCode::new(3)));
    assert_eq!(list.snapshot().next_page, 2);
}

#[tokio::test]
async fn test_list_refresh_failure_keeps_orders() {
    let fake = paged_fake();
    let notices = Notices::default();
    let mut rx = notices.subscribe();
    let list = OrderListWatch::new(None, fake.clone(), notices);
    list.refresh().await.unwrap();

    fake.first_page(0, Err(ClientError::Rejected { status: 500, message: "boom".into() }));
    assert!(list.refresh().await.is_err());
    assert_eq!(ids(&list.orders()), vec![50, 40]);
    assert!(list.snapshot().last_error.is_some());
    assert_eq!(rx.recv().await.unwrap().level, NoticeLevel::Warning);
}

#[tokio::test]
async fn test_list_short_page_replaces() {
    let fake = paged_fake();
    let list = OrderListWatch::new(None, fake.clone(), Notices::default());
    list.refresh().await.unwrap();

    fake.first_page(0, Ok(Page::of(vec![order(70, &[1]), order(50, &[1])], true)));
    list.refresh().await.unwrap();
    let view = list.snapshot();
    assert_eq!(ids(&view.orders), vec![70, 50]);
    assert!(view.is_end);
}

#[tokio::test(start_paused = true)]
async fn test_stale_list_failure_does_not_mark_fresh_list() {
    let fake = paged_fake();
    let list = OrderListWatch::new(None, fake.clone(), Notices::default());
    fake.first_page(200, Err(ClientError::Transport("timed out".into())));
    fake.first_page(10, Ok(Page::of(vec![order(80, &[1])], true)));

    let late = list.clone();
    let (slow, fast) = tokio::join!(late.refresh(), async {
        sleep(Duration::from_millis(1)).await;
        list.refresh().await
    });
    assert!(slow.is_err());
    assert!(fast.is_ok());

    let view = list.snapshot();
    assert_eq!(ids(&view.orders), vec![80]);
    assert_eq!(view.applied_seq, 2);
    assert!(view.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_attached_list_keeps_polling_and_merges() {
    let fake = paged_fake();
    let list = OrderListWatch::new(None, fake.clone(), Notices::default());
    list.refresh().await.unwrap();
    list.load_more().await.unwrap();

    let session = PollingSession::new("orders");
    list.attach(&session, Duration::from_millis(20_000));
    fake.first_page(0, Ok(Page::of(vec![order(90, &[1]), order(50, &[1])], false)));

    sleep(Duration::from_millis(20_500)).await;
    assert_eq!(ids(&list.orders()), vec![90, 50, 40, 30, 20]);
    assert_eq!(session.state(), SessionState::Running);

    let calls = *fake.list_calls.lock().unwrap();
    sleep(Duration::from_millis(40_000)).await;
    assert_eq!(*fake.list_calls.lock().unwrap(), calls + 2);
    assert_eq!(session.state(), SessionState::Running);

    fake.first_page(0, Ok(Page::of(vec![order(95, &[1])], false)));
    assert!(list.focus(&session));
    sleep(Duration::from_millis(1)).await;
    assert_eq!(list.orders()[0].id, 95);
    assert_eq!(session.state(), SessionState::Running);
}

#[tokio::test]
async fn test_paged_list_sends_page_size() {
    let fake = paged_fake();
    let list = OrderListWatch::paged(Some(OrderStatus::Confirmed), 2, fake.clone(), Notices::default());
    list.refresh().await.unwrap();
    list.load_more().await.unwrap();

    let queries = fake.queries.lock().unwrap().clone();
    assert_eq!(queries.len(), 2);
    assert!(queries.iter().all(|q| q.size == Some(2) && q.status == Some(OrderStatus::Confirmed)));
    assert_eq!(queries[1].page, 1);
}
