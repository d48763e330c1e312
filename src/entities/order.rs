//! Orders: an immutable snapshot of a cart plus payment and delivery state

use crate::core::error::{Result, ShopError};
use crate::entities::cart::CartItem;
use crate::impl_entity;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
}

/// A cart line frozen at order time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product: Uuid,
    #[serde(default)]
    pub color: Option<String>,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl From<&CartItem> for OrderItem {
    fn from(item: &CartItem) -> Self {
        Self {
            product: item.product,
            color: item.color.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl_entity!(
    Order, "order", "orders",
    unique = ["payment_reference"],
    {
        pub owner: Uuid,
        pub items: Vec<OrderItem>,
        #[serde(default)]
        pub shipping_address: Option<ShippingAddress>,
        #[serde(default)]
        pub tax_price: Decimal,
        #[serde(default)]
        pub shipping_price: Decimal,
        pub total_order_price: Decimal,
        #[serde(default)]
        pub payment_method: PaymentMethod,
        #[serde(default)]
        pub is_paid: bool,
        #[serde(default)]
        pub paid_at: Option<DateTime<Utc>>,
        #[serde(default)]
        pub is_delivered: bool,
        #[serde(default)]
        pub delivered_at: Option<DateTime<Utc>>,
        /// Gateway session id of a card order
        #[serde(default)]
        pub payment_reference: Option<String>,
    }
);

impl Order {
    /// Mark the order paid.
    ///
    /// Cash orders are paid on delivery, so they must be delivered first.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.payment_method == PaymentMethod::Cash && !self.is_delivered {
            return Err(ShopError::InvalidState(
                "cash orders must be delivered before they are marked paid".into(),
            ));
        }
        self.is_paid = true;
        self.paid_at = Some(now);
        Ok(())
    }

    pub fn mark_delivered(&mut self, now: DateTime<Utc>) {
        self.is_delivered = true;
        self.delivered_at = Some(now);
    }
}
