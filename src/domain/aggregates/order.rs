//! Order Aggregate
//!
//! Read model of a backend order. The status history is append-only from the
//! client's side: it is only ever replaced wholesale by a fresh fetch.

use crate::domain::events::OrderStatusEvent;
use crate::domain::value_objects::{Money, OrderStatus, StatusCode, TrackingNumber};
use crate::domain::workflow::{self, Progress};
use crate::domain::events::OrderAction;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    #[serde(default)]
    pub order_lines: Vec<OrderLine>,
    #[serde(default)]
    pub total: Money,
    /// Chronological; the last entry is the current status.
    #[serde(default)]
    pub status: Vec<OrderStatusEvent>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub payment: Option<Payment>,
    #[serde(default)]
    pub shipping_method: Option<ShippingMethod>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine { #[serde(default)] pub qty: u32, #[serde(default)] pub total: Money, pub product_item: Option<ProductItem> }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductItem { pub product: Option<Product>, #[serde(default)] pub options: Vec<ProductOption> }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Product { #[serde(default)] pub name: String, pub picture: Option<String> }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductOption { #[serde(default)] pub value: String }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address { pub city: Option<String>, pub region: Option<String>, pub address_line1: Option<String>, pub address_line2: Option<String> }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment { #[serde(rename = "type")] pub kind: Option<PaymentType> }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentType { #[serde(default)] pub name: String }

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingMethod { #[serde(default)] pub name: String, #[serde(default)] pub price: Money }

/// Tracking details taken from the shipping status event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shipment { pub detail: String, pub tracking: Option<TrackingNumber> }

impl OrderLine {
    pub fn product_name(&self) -> &str {
        self.product_item.as_ref().and_then(|i| i.product.as_ref()).map(|p| p.name.as_str()).unwrap_or("")
    }

    pub fn options_label(&self) -> String {
        self.product_item.as_ref().map(|i| i.options.iter().map(|o| o.value.as_str()).collect::<Vec<_>>().join(", ")).unwrap_or_default()
    }
}

impl Order {
    pub fn current_status(&self) -> Option<&OrderStatusEvent> { workflow::current_status(self) }
    pub fn current_code(&self) -> Option<StatusCode> { self.current_status().map(|e| e.status) }

    /// An order without history is not final: it still needs polling.
    pub fn is_final(&self) -> bool { self.current_code().map(workflow::is_final).unwrap_or(false) }
    pub fn can_cancel(&self) -> bool { self.current_code().map(workflow::can_cancel).unwrap_or(false) }
    pub fn next_action(&self) -> Option<OrderAction> { self.current_code().and_then(workflow::next_action) }
    pub fn progress(&self) -> Option<Progress> { workflow::progress(self) }

    pub fn shipment(&self) -> Option<Shipment> {
        let shipping = StatusCode::from(OrderStatus::Shipping);
        let event = self.status.iter().find(|e| e.status == shipping)?;
        let detail = event.detail.as_deref().map(str::trim).filter(|d| !d.is_empty())?;
        Some(Shipment { detail: detail.to_string(), tracking: TrackingNumber::new(detail).ok() })
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.payment.as_ref().and_then(|p| p.kind.as_ref()).map(|k| k.name.as_str())
    }
}
