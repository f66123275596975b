//! Aggregates module
pub mod order;

pub use order::{Address, Order, OrderLine, Payment, PaymentType, Product, ProductItem, ProductOption, Shipment, ShippingMethod};
