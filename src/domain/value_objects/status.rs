//! Order status codes and the static status registry

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw status code as it travels on the wire.
///
/// Codes outside 1..=9 are kept verbatim so they can still be rendered with
/// the registry fallback instead of failing deserialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(i32);

impl StatusCode {
    pub const fn new(code: i32) -> Self { Self(code) }
    pub const fn value(self) -> i32 { self.0 }
    pub fn status(self) -> Option<OrderStatus> { OrderStatus::from_code(self.0) }

    /// Registry entry for this code, or the `Unknown` fallback.
    pub fn config(self) -> &'static StatusConfig { lookup(self) }

    /// Completed or cancelled. Returned orders are not treated as final here.
    pub fn is_final(self) -> bool {
        matches!(self.status(), Some(OrderStatus::Completed | OrderStatus::Cancelled))
    }

    /// Anything before shipping can still be cancelled.
    pub fn can_cancel(self) -> bool { self.0 < OrderStatus::Shipping.code() }
}

impl From<i32> for StatusCode {
    fn from(code: i32) -> Self { Self(code) }
}

impl From<OrderStatus> for StatusCode {
    fn from(status: OrderStatus) -> Self { Self(status.code()) }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cfg = self.config();
        write!(f, "{} {}", cfg.icon, cfg.label)
    }
}

/// The order lifecycle ladder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    Confirmed,
    Preparing,
    Shipping,
    Delivered,
    Completed,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 9] = [
        Self::PendingPayment, Self::Paid, Self::Confirmed, Self::Preparing, Self::Shipping,
        Self::Delivered, Self::Completed, Self::Cancelled, Self::Returned,
    ];

    pub const fn code(self) -> i32 {
        match self {
            Self::PendingPayment => 1,
            Self::Paid => 2,
            Self::Confirmed => 3,
            Self::Preparing => 4,
            Self::Shipping => 5,
            Self::Delivered => 6,
            Self::Completed => 7,
            Self::Cancelled => 8,
            Self::Returned => 9,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Backend enum name; also accepted when parsing.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingPayment => "PENDING_PAYMENT",
            Self::Paid => "PAID",
            Self::Confirmed => "CONFIRMED",
            Self::Preparing => "PREPARING",
            Self::Shipping => "SHIPPING",
            Self::Delivered => "DELIVERED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Returned => "RETURNED",
        }
    }

    pub fn config(self) -> &'static StatusConfig { lookup(self.into()) }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { StatusCode::from(*self).fmt(f) }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatus;

    /// Accepts either the numeric code or the backend enum name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i32>() {
            return Self::from_code(code).ok_or_else(|| UnknownStatus(s.to_string()));
        }
        Self::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct UnknownStatus(pub String);
impl std::error::Error for UnknownStatus {}
impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Unknown order status: {}", self.0) }
}

/// Display attributes for one status code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusConfig {
    pub id: i32,
    pub label: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
}

static REGISTRY: [StatusConfig; 9] = [
    StatusConfig { id: 1, label: "Chờ xác nhận", color: "orange", icon: "⏳" },
    StatusConfig { id: 2, label: "Đã thanh toán", color: "lime", icon: "💰" },
    StatusConfig { id: 3, label: "Đã xác nhận", color: "blue", icon: "✅" },
    StatusConfig { id: 4, label: "Đang chuẩn bị", color: "yellow", icon: "📦" },
    StatusConfig { id: 5, label: "Đang giao hàng", color: "purple", icon: "🚚" },
    StatusConfig { id: 6, label: "Đã giao hàng", color: "cyan", icon: "✅" },
    StatusConfig { id: 7, label: "Hoàn tất", color: "green", icon: "🎉" },
    StatusConfig { id: 8, label: "Đã hủy", color: "red", icon: "❌" },
    StatusConfig { id: 9, label: "Đã trả hàng", color: "pink", icon: "↩️" },
];

static UNKNOWN: StatusConfig = StatusConfig { id: 0, label: "Unknown", color: "default", icon: "❓" };

/// Registry lookup. Never fails: unknown codes map to the `Unknown` entry.
pub fn lookup(code: StatusCode) -> &'static StatusConfig {
    REGISTRY.iter().find(|c| c.id == code.value()).unwrap_or(&UNKNOWN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_codes() {
        for status in OrderStatus::ALL {
            assert_eq!(lookup(status.into()).id, status.code());
        }
        let shipping = lookup(StatusCode::new(5));
        assert_eq!(shipping.label, "Đang giao hàng");
        assert_eq!(shipping.color, "purple");
        assert_eq!(shipping.icon, "🚚");
    }

    #[test]
    fn test_lookup_fallback() {
        for code in [0, 10, -1, 42] {
            let cfg = lookup(StatusCode::new(code));
            assert_eq!((cfg.label, cfg.color, cfg.icon), ("Unknown", "default", "❓"));
        }
        assert_eq!(StatusCode::new(99).to_string(), "❓ Unknown");
    }

    #[test]
    fn test_display_tag() {
        assert_eq!(OrderStatus::Completed.to_string(), "🎉 Hoàn tất");
    }

    #[test]
    fn test_parse_status() {
        assert_eq!("4".parse::<OrderStatus>().unwrap(), OrderStatus::Preparing);
        assert_eq!("shipping".parse::<OrderStatus>().unwrap(), OrderStatus::Shipping);
        assert!("11".parse::<OrderStatus>().is_err());
        assert!("LOST".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_final_and_cancellable() {
        assert!(StatusCode::new(7).is_final());
        assert!(StatusCode::new(8).is_final());
        assert!(!StatusCode::new(9).is_final());
        assert!(StatusCode::new(4).can_cancel());
        assert!(!StatusCode::new(5).can_cancel());
    }
}
