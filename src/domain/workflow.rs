//! Workflow guard: which admin action is offered next, and when an order is settled.
//!
//! All functions are pure lookups keyed by the current status code. Transitions
//! themselves happen server-side; the client re-fetches the order afterwards.

use crate::domain::aggregates::Order;
use crate::domain::events::{OrderAction, OrderStatusEvent};
use crate::domain::value_objects::{OrderStatus, StatusCode};

/// Last recorded status event, if the order has any history at all.
pub fn current_status(order: &Order) -> Option<&OrderStatusEvent> { order.status.last() }

/// Completed (7) and cancelled (8) orders never move again.
pub fn is_final(code: impl Into<StatusCode>) -> bool { code.into().is_final() }

/// Cancellation is offered until the order is handed to the shipper.
pub fn can_cancel(code: impl Into<StatusCode>) -> bool { code.into().can_cancel() }

/// Forward action offered for a status.
///
/// `None` means no admin action is currently offered. Paid orders (2) land
/// here too: the backend exposes no forward action for them.
pub fn next_action(code: impl Into<StatusCode>) -> Option<OrderAction> {
    match code.into().status()? {
        OrderStatus::PendingPayment => Some(OrderAction::Confirm),
        OrderStatus::Confirmed => Some(OrderAction::Prepare),
        OrderStatus::Preparing => Some(OrderAction::Ship),
        OrderStatus::Shipping => Some(OrderAction::Deliver),
        OrderStatus::Delivered => Some(OrderAction::Complete),
        OrderStatus::Paid | OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Returned => None,
    }
}

pub fn next_step_hint(code: impl Into<StatusCode>) -> &'static str {
    match code.into().value() {
        1 => "Review the order details and confirm",
        3 => "Ask the warehouse to start preparing the items",
        4 => "Pack the order, hand it to the shipper and enter the tracking number",
        5 => "Wait for the shipper to deliver and collect COD",
        6 => "Mark the order completed (or wait for auto-completion after 3 days)",
        _ => "Process the order",
    }
}

/// Note sent when the operator leaves it blank.
pub fn default_note(action: OrderAction) -> &'static str {
    match action {
        OrderAction::Confirm => "Order confirmed by admin",
        OrderAction::Prepare => "Warehouse is preparing the order",
        OrderAction::Ship => "Order handed over to the shipper",
        OrderAction::Deliver => "Order delivered",
        OrderAction::Complete => "Order completed",
    }
}

pub const DEFAULT_CANCEL_NOTE: &str = "Order cancelled";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressState { Process, Finish, Error }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressStep {
    pub status: StatusCode,
    pub title: &'static str,
    pub description: Option<String>,
}

/// Step tracker shown on the order page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    pub steps: Vec<ProgressStep>,
    pub current: usize,
    pub state: ProgressState,
}

const LADDER: [(i32, &str); 6] = [
    (1, "Awaiting confirmation"),
    (3, "Confirmed"),
    (4, "Preparing"),
    (5, "Shipping"),
    (6, "Delivered"),
    (7, "Completed"),
];

/// The paid step (2) is folded into "awaiting confirmation"; cancelled orders
/// collapse to a single error step carrying the cancel note.
pub fn progress(order: &Order) -> Option<Progress> {
    let current = current_status(order)?;
    if current.status == StatusCode::from(OrderStatus::Cancelled) {
        let step = ProgressStep { status: current.status, title: "Order cancelled", description: Some(current.note.clone()) };
        return Some(Progress { steps: vec![step], current: 0, state: ProgressState::Error });
    }
    let code = current.status.value();
    let at = LADDER.iter().rposition(|(id, _)| code >= *id).unwrap_or(0);
    let steps = LADDER
        .iter()
        .enumerate()
        .map(|(i, (id, title))| ProgressStep {
            status: StatusCode::new(*id),
            title: *title,
            description: (i == at).then(|| "you are here".to_string()),
        })
        .collect();
    let state = if code == OrderStatus::Completed.code() { ProgressState::Finish } else { ProgressState::Process };
    Some(Progress { steps, current: at, state })
}
