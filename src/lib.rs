//! Storefront order console
//!
//! Client side of a storefront whose order engine lives behind a REST backend.
//!
//! ## Features
//! - Order status registry and workflow guard (next admin action, cancellability, terminal states)
//! - Cancellable polling sessions that stop themselves once an order settles
//! - Order and order-list views that keep the last known-good data across failures
//! - Payment gateway status watch
//! - Typed HTTP client with an explicit auth context

pub mod auth;
pub mod client;
pub mod config;
pub mod domain;
pub mod payment;
pub mod polling;
pub mod watch;

pub use auth::AuthContext;
pub use client::{ApiClient, OrderBackend, OrderQuery};
pub use config::Config;
pub use domain::aggregates::Order;
pub use domain::events::{OrderAction, OrderStatusEvent, TransitionRequest};
pub use domain::value_objects::{lookup, OrderStatus, StatusCode, StatusConfig, TrackingNumber};
pub use domain::workflow::{can_cancel, current_status, is_final, next_action};
pub use polling::{PollControl, PollingSession, SessionState};
pub use watch::{OrderListWatch, OrderWatch};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

// =============================================================================
// Core Types
// =============================================================================

/// Paging envelope returned by list endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    pub total_pages: Option<u32>,
    pub total_elements: Option<u64>,
    pub number: Option<u32>,
    pub size: Option<u32>,
    pub last: Option<bool>,
}

impl<T> Page<T> {
    pub fn of(content: Vec<T>, last: bool) -> Self {
        Self { content, total_pages: None, total_elements: None, number: None, size: None, last: Some(last) }
    }

    /// Without an explicit `last` flag, an empty page ends the listing.
    pub fn is_last(&self) -> bool { self.last.unwrap_or(self.content.is_empty()) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel { Info, Success, Warning, Error }

/// User-visible, non-fatal notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Notification bus handed explicitly to every view.
#[derive(Clone, Debug)]
pub struct Notices {
    tx: broadcast::Sender<Notice>,
}

impl Default for Notices {
    fn default() -> Self { Self::new(64) }
}

impl Notices {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> { self.tx.subscribe() }

    pub fn publish(&self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NoticeLevel::Error => tracing::error!(%message, "notice"),
            NoticeLevel::Warning => tracing::warn!(%message, "notice"),
            NoticeLevel::Info | NoticeLevel::Success => tracing::info!(%message, "notice"),
        }
        // No subscribers is fine: notices are best-effort.
        let _ = self.tx.send(Notice { level, message });
    }

    pub fn success(&self, message: impl Into<String>) { self.publish(NoticeLevel::Success, message) }
    pub fn warning(&self, message: impl Into<String>) { self.publish(NoticeLevel::Warning, message) }
    pub fn error(&self, message: impl Into<String>) { self.publish(NoticeLevel::Error, message) }
}

// =============================================================================
// Error Types
// =============================================================================

/// Broad failure classes; every one of them is recoverable by retrying.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind { Transport, Rejected, Malformed, Invalid }

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rejected by server ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Unauthorized | Self::Forbidden(_) | Self::NotFound(_) | Self::Rejected { .. } => ErrorKind::Rejected,
            Self::Malformed(_) => ErrorKind::Malformed,
            Self::InvalidRequest(_) => ErrorKind::Invalid,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
