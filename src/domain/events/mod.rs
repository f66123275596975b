//! Status events recorded by the backend and the transition requests that append them

use crate::domain::value_objects::{OrderStatus, StatusCode, TrackingNumber};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use validator::Validate;

/// One entry of an order's status history. Immutable once recorded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusEvent {
    pub status: StatusCode,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(rename = "updateAt", alias = "updatedAt", default, deserialize_with = "de_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrderStatusEvent {
    pub fn new(status: impl Into<StatusCode>, note: impl Into<String>) -> Self {
        Self { status: status.into(), note: note.into(), detail: None, updated_at: None }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self { self.detail = Some(detail.into()); self }
    pub fn at(mut self, ts: DateTime<Utc>) -> Self { self.updated_at = Some(ts); self }

    /// `HH:MM:SS dd/mm/YYYY` in the storefront's display zone, empty when unknown.
    pub fn display_time(&self) -> String { self.updated_at.map(format_local).unwrap_or_default() }
}

/// Renders a timestamp in Asia/Ho_Chi_Minh (GMT+7).
pub fn format_local(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&chrono_tz::Asia::Ho_Chi_Minh).format("%H:%M:%S %d/%m/%Y").to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp { Millis(i64), Fractional(f64), Text(String) }

/// Accepts epoch millis, RFC 3339, and offset-less ISO/MySQL strings (read as UTC).
/// Unparseable values become `None` rather than failing the whole order.
fn de_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<RawTimestamp>::deserialize(d)?;
    let parsed = match raw {
        None => None,
        Some(RawTimestamp::Millis(ms)) => DateTime::from_timestamp_millis(ms),
        Some(RawTimestamp::Fractional(ms)) => DateTime::from_timestamp_millis(ms as i64),
        Some(RawTimestamp::Text(s)) => parse_timestamp(&s),
    };
    Ok(parsed)
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() { return None; }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) { return Some(dt.with_timezone(&Utc)); }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") { return Some(dt.with_timezone(&Utc)); }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) { return Some(naive.and_utc()); }
    }
    tracing::warn!(value = s, "unparseable status timestamp");
    None
}

/// Forward transitions an admin can request. Cancellation has its own endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OrderAction { Confirm, Prepare, Ship, Deliver, Complete }

impl OrderAction {
    pub const ALL: [OrderAction; 5] = [Self::Confirm, Self::Prepare, Self::Ship, Self::Deliver, Self::Complete];

    /// Path segment of `POST /order/{id}/status/{action}`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Prepare => "prepare",
            Self::Ship => "ship",
            Self::Deliver => "deliver",
            Self::Complete => "complete",
        }
    }

    /// Status the backend appends on success.
    pub fn target(self) -> OrderStatus {
        match self {
            Self::Confirm => OrderStatus::Confirmed,
            Self::Prepare => OrderStatus::Preparing,
            Self::Ship => OrderStatus::Shipping,
            Self::Deliver => OrderStatus::Delivered,
            Self::Complete => OrderStatus::Completed,
        }
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl std::str::FromStr for OrderAction {
    type Err = UnknownAction;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|a| a.as_str().eq_ignore_ascii_case(s.trim())).ok_or_else(|| UnknownAction(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct UnknownAction(pub String);
impl std::error::Error for UnknownAction {}
impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Unknown order action: {}", self.0) }
}

/// Body of a transition or cancel request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    #[validate(length(max = 500))]
    pub note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 255))]
    pub detail: Option<String>,
    /// The ship endpoint reads the tracking number from this field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
}

impl TransitionRequest {
    pub fn new(note: impl Into<String>) -> Self { Self { note: note.into(), ..Default::default() } }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self { self.detail = Some(detail.into()); self }

    pub fn shipping(note: impl Into<String>, tracking: &TrackingNumber) -> Self {
        Self { note: note.into(), detail: Some(tracking.to_string()), tracking_number: Some(tracking.to_string()) }
    }
}
