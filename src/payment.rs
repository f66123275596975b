//! Payment gateway status of a purchase, polled until it leaves "processing".

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::ApiClient;
use crate::polling::{PollControl, PollingSession};
use crate::{Notices, Result};

/// Gateway response as relayed by the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub return_code: i32,
    #[serde(default)]
    pub return_message: String,
    #[serde(default)]
    pub sub_return_code: Option<i32>,
    #[serde(default)]
    pub sub_return_message: Option<String>,
    #[serde(default)]
    pub app_trans_id: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentOutcome { Processing, Succeeded, Failed }

impl PaymentStatus {
    pub fn outcome(&self) -> PaymentOutcome {
        match self.return_code {
            1 => PaymentOutcome::Succeeded,
            3 => PaymentOutcome::Processing,
            _ => PaymentOutcome::Failed,
        }
    }
}

#[async_trait]
pub trait PaymentBackend: Send + Sync {
    async fn payment_status(&self, app_trans_id: &str) -> Result<PaymentStatus>;
}

#[async_trait]
impl PaymentBackend for ApiClient {
    async fn payment_status(&self, app_trans_id: &str) -> Result<PaymentStatus> {
        self.get_json("/purchase/zalopay/status", &[("app_trans_id", app_trans_id.to_string())]).await
    }
}

struct PaymentInner {
    app_trans_id: String,
    backend: Arc<dyn PaymentBackend>,
    notices: Notices,
    last: Mutex<Option<PaymentStatus>>,
}

/// Polls one gateway transaction. Clones share state.
#[derive(Clone)]
pub struct PaymentWatch {
    inner: Arc<PaymentInner>,
}

impl PaymentWatch {
    pub fn new(app_trans_id: impl Into<String>, backend: Arc<dyn PaymentBackend>, notices: Notices) -> Self {
        Self { inner: Arc::new(PaymentInner { app_trans_id: app_trans_id.into(), backend, notices, last: Mutex::new(None) }) }
    }

    pub fn last(&self) -> Option<PaymentStatus> { self.inner.last.lock().unwrap_or_else(PoisonError::into_inner).clone() }

    /// Fetches the status once; settles as soon as the gateway reports anything but processing.
    pub async fn refresh(&self) -> Result<PollControl> {
        let id = &self.inner.app_trans_id;
        let status = match self.inner.backend.payment_status(id).await {
            Ok(status) => status,
            Err(e) => {
                self.inner.notices.error(format!("Could not check payment {id}: {e}"));
                return Err(e);
            }
        };
        let outcome = status.outcome();
        let previous = self.inner.last.lock().unwrap_or_else(PoisonError::into_inner).replace(status.clone());
        let first_settle = previous.map_or(true, |p| p.outcome() == PaymentOutcome::Processing);

        match outcome {
            PaymentOutcome::Processing => {
                info!(app_trans_id = %id, "payment still processing");
                Ok(PollControl::Continue)
            }
            PaymentOutcome::Succeeded => {
                if first_settle { self.inner.notices.success(format!("Payment {id} succeeded")); }
                Ok(PollControl::Settle)
            }
            PaymentOutcome::Failed => {
                if first_settle {
                    self.inner.notices.error(format!("Payment {id} failed: {}", status.return_message));
                }
                Ok(PollControl::Settle)
            }
        }
    }

    pub fn attach(&self, session: &PollingSession, period: Duration) {
        let watch = self.clone();
        session.start(period, move || {
            let watch = watch.clone();
            async move { watch.refresh().await }
        });
    }
}
