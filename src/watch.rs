//! Views that keep an order (or a page of orders) fresh.
//!
//! Each fetch is stamped with a sequence number when it is issued. A response
//! is applied only if it is newer than the one already applied, so a slow
//! timer fetch cannot overwrite the result of a later focus refresh. Failed
//! fetches never touch the last known-good data.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::client::{OrderBackend, OrderQuery};
use crate::domain::aggregates::Order;
use crate::domain::events::{OrderAction, TransitionRequest};
use crate::domain::value_objects::OrderStatus;
use crate::domain::workflow::{default_note, DEFAULT_CANCEL_NOTE};
use crate::polling::{PollControl, PollingSession};
use crate::{ClientError, Notices, Result};

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> { m.lock().unwrap_or_else(PoisonError::into_inner) }

// =============================================================================
// Single order
// =============================================================================

#[derive(Clone, Debug, Default)]
pub struct OrderView {
    pub order: Option<Order>,
    pub applied_seq: u64,
    pub last_error: Option<ClientError>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

struct OrderInner {
    id: i64,
    backend: Arc<dyn OrderBackend>,
    notices: Notices,
    issued: AtomicU64,
    view: Mutex<OrderView>,
}

/// Live view of one order. Clones share the same state.
#[derive(Clone)]
pub struct OrderWatch {
    inner: Arc<OrderInner>,
}

impl OrderWatch {
    pub fn new(id: i64, backend: Arc<dyn OrderBackend>, notices: Notices) -> Self {
        Self {
            inner: Arc::new(OrderInner { id, backend, notices, issued: AtomicU64::new(0), view: Mutex::new(OrderView::default()) }),
        }
    }

    pub fn id(&self) -> i64 { self.inner.id }
    pub fn snapshot(&self) -> OrderView { guard(&self.inner.view).clone() }
    pub fn order(&self) -> Option<Order> { guard(&self.inner.view).order.clone() }

    fn control(view: &OrderView) -> PollControl {
        match &view.order {
            Some(order) if order.is_final() => PollControl::Settle,
            _ => PollControl::Continue,
        }
    }

    /// Fetches the order once. Settles when the applied order is final.
    pub async fn refresh(&self) -> Result<PollControl> {
        let seq = self.inner.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let id = self.inner.id;
        let fetched = self.inner.backend.fetch_order(id).await;

        let mut view = guard(&self.inner.view);
        match fetched {
            Ok(order) => {
                if seq <= view.applied_seq {
                    debug!(order_id = id, seq, applied = view.applied_seq, "discarding stale response");
                    return Ok(Self::control(&view));
                }
                if let Some(code) = order.current_code() {
                    let changed = view.order.as_ref().and_then(Order::current_code) != Some(code);
                    if changed { info!(order_id = id, status = %code, "order status"); }
                }
                view.applied_seq = seq;
                view.order = Some(order);
                view.last_error = None;
                view.refreshed_at = Some(Utc::now());
                Ok(Self::control(&view))
            }
            Err(e) => {
                if seq > view.applied_seq {
                    view.last_error = Some(e.clone());
                }
                drop(view);
                self.inner.notices.error(format!("Could not load order #{id}: {e}"));
                Err(e)
            }
        }
    }

    /// Starts polling this order on `session`, replacing whatever it polled before.
    pub fn attach(&self, session: &PollingSession, period: Duration) {
        let watch = self.clone();
        session.start(period, move || {
            let watch = watch.clone();
            async move { watch.refresh().await }
        });
    }

    /// Window regained focus.
    pub fn focus(&self, session: &PollingSession) -> bool { session.refresh_now() }

    /// Requests the forward transition currently offered, then re-reads the order.
    ///
    /// A blank note is replaced by the action's default note. Shipping needs a
    /// tracking number in `detail`.
    pub async fn apply(&self, action: OrderAction, request: TransitionRequest) -> Result<()> {
        let id = self.inner.id;
        let order = self.order().ok_or_else(|| ClientError::InvalidRequest(format!("order #{id} is not loaded")))?;
        if order.next_action() != Some(action) {
            let status = order.current_code().map(|c| c.to_string()).unwrap_or_else(|| "no status".into());
            return Err(ClientError::InvalidRequest(format!("{action} is not offered for order #{id} ({status})")));
        }
        if action == OrderAction::Ship && request.detail.as_deref().map_or(true, |d| d.trim().is_empty()) {
            return Err(ClientError::InvalidRequest("a tracking number is required to ship".into()));
        }

        let mut request = request;
        if request.note.trim().is_empty() {
            request.note = default_note(action).to_string();
        }
        if let Err(e) = self.inner.backend.apply_action(id, action, &request).await {
            self.inner.notices.error(format!("Order #{id}: {action} failed: {e}"));
            return Err(e);
        }
        self.inner.notices.success(format!("Order #{id}: {action} done, now {}", action.target().config().label));
        self.refresh().await.ok();
        Ok(())
    }

    pub async fn cancel(&self, request: TransitionRequest) -> Result<()> {
        let id = self.inner.id;
        let order = self.order().ok_or_else(|| ClientError::InvalidRequest(format!("order #{id} is not loaded")))?;
        if !order.can_cancel() {
            return Err(ClientError::InvalidRequest(format!("order #{id} can no longer be cancelled")));
        }

        let mut request = request;
        if request.note.trim().is_empty() {
            request.note = DEFAULT_CANCEL_NOTE.to_string();
        }
        if let Err(e) = self.inner.backend.cancel_order(id, &request).await {
            self.inner.notices.error(format!("Order #{id}: cancel failed: {e}"));
            return Err(e);
        }
        self.inner.notices.success(format!("Order #{id} cancelled"));
        self.refresh().await.ok();
        Ok(())
    }
}

// =============================================================================
// Order list
// =============================================================================

#[derive(Clone, Debug, Default)]
pub struct ListView {
    pub orders: Vec<Order>,
    pub next_page: u32,
    pub is_end: bool,
    pub applied_seq: u64,
    pub last_error: Option<ClientError>,
}

struct ListInner {
    status: Option<OrderStatus>,
    page_size: Option<u32>,
    backend: Arc<dyn OrderBackend>,
    notices: Notices,
    issued: AtomicU64,
    view: Mutex<ListView>,
}

/// Infinite-scroll list of orders, optionally filtered by status. Never settles.
#[derive(Clone)]
pub struct OrderListWatch {
    inner: Arc<ListInner>,
}

impl OrderListWatch {
    pub fn new(status: Option<OrderStatus>, backend: Arc<dyn OrderBackend>, notices: Notices) -> Self {
        Self::build(status, None, backend, notices)
    }

    /// Like [`OrderListWatch::new`], asking the backend for `page_size` orders per page.
    pub fn paged(status: Option<OrderStatus>, page_size: u32, backend: Arc<dyn OrderBackend>, notices: Notices) -> Self {
        Self::build(status, Some(page_size), backend, notices)
    }

    fn build(status: Option<OrderStatus>, page_size: Option<u32>, backend: Arc<dyn OrderBackend>, notices: Notices) -> Self {
        let inner = ListInner {
            status,
            page_size,
            backend,
            notices,
            issued: AtomicU64::new(0),
            view: Mutex::new(ListView::default()),
        };
        Self { inner: Arc::new(inner) }
    }

    fn query(&self, page: u32) -> OrderQuery {
        OrderQuery { status: self.inner.status, page, size: self.inner.page_size }
    }

    pub fn status(&self) -> Option<OrderStatus> { self.inner.status }
    pub fn snapshot(&self) -> ListView { guard(&self.inner.view).clone() }
    pub fn orders(&self) -> Vec<Order> { guard(&self.inner.view).orders.clone() }

    /// Re-reads the first page.
    ///
    /// When more than one page is loaded, the fresh page goes first and the
    /// previously loaded orders missing from it are kept behind it.
    pub async fn refresh(&self) -> Result<PollControl> {
        let seq = self.inner.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let fetched = self.inner.backend.fetch_orders(&self.query(0)).await;

        let mut view = guard(&self.inner.view);
        match fetched {
            Ok(page) => {
                if seq <= view.applied_seq {
                    debug!(seq, applied = view.applied_seq, "discarding stale list response");
                    return Ok(PollControl::Continue);
                }
                let is_last = page.is_last();
                let fresh = page.content;
                if view.orders.len() > fresh.len() {
                    let ids: HashSet<i64> = fresh.iter().map(|o| o.id).collect();
                    let kept = std::mem::take(&mut view.orders).into_iter().filter(|o| !ids.contains(&o.id));
                    view.orders = fresh.into_iter().chain(kept).collect();
                } else {
                    view.orders = fresh;
                    view.next_page = 1;
                    view.is_end = is_last;
                }
                view.applied_seq = seq;
                view.last_error = None;
                debug!(count = view.orders.len(), "order list refreshed");
                Ok(PollControl::Continue)
            }
            Err(e) => {
                if seq > view.applied_seq {
                    view.last_error = Some(e.clone());
                }
                drop(view);
                self.inner.notices.warning(format!("Could not refresh orders: {e}"));
                Err(e)
            }
        }
    }

    /// Appends the next page. Returns how many orders were added.
    pub async fn load_more(&self) -> Result<usize> {
        let page_no = {
            let view = guard(&self.inner.view);
            if view.is_end { return Ok(0); }
            view.next_page
        };
        let page = match self.inner.backend.fetch_orders(&self.query(page_no)).await {
            Ok(page) => page,
            Err(e) => {
                self.inner.notices.warning(format!("Could not load more orders: {e}"));
                return Err(e);
            }
        };

        let mut view = guard(&self.inner.view);
        if view.next_page != page_no {
            debug!(page = page_no, "list was reset while loading, dropping page");
            return Ok(0);
        }
        let is_last = page.is_last() || page.content.is_empty();
        let mut seen: HashSet<i64> = view.orders.iter().map(|o| o.id).collect();
        let before = view.orders.len();
        for order in page.content {
            if seen.insert(order.id) {
                view.orders.push(order);
            }
        }
        view.next_page = page_no + 1;
        view.is_end = is_last;
        Ok(view.orders.len() - before)
    }

    pub fn attach(&self, session: &PollingSession, period: Duration) {
        let watch = self.clone();
        session.start(period, move || {
            let watch = watch.clone();
            async move { watch.refresh().await }
        });
    }

    pub fn focus(&self, session: &PollingSession) -> bool { session.refresh_now() }
}
