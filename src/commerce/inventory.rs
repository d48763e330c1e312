//! Stock counters adjusted when orders are placed

use crate::core::error::Result;
use crate::entities::order::OrderItem;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happens when an order asks for more units than are available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockPolicy {
    /// Reserve all lines or none; shortfalls fail with `OutOfStock`
    #[default]
    Reject,
    /// Adjust unconditionally; availability may go negative
    Tolerate,
}

/// Units of one product leaving stock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockAdjustment {
    pub product: Uuid,
    pub quantity: i64,
}

impl StockAdjustment {
    /// One adjustment per product, summing lines that differ only by color
    pub fn from_items(items: &[OrderItem]) -> Vec<Self> {
        let mut adjustments: Vec<Self> = Vec::new();
        for item in items {
            let quantity = i64::from(item.quantity);
            match adjustments.iter_mut().find(|a| a.product == item.product) {
                Some(existing) => existing.quantity += quantity,
                None => adjustments.push(Self {
                    product: item.product,
                    quantity,
                }),
            }
        }
        adjustments
    }
}

/// Atomic stock counter updates
///
/// `apply` decrements `available_quantity` and increments `units_sold` for
/// every adjustment. Under [`StockPolicy::Reject`] the batch is applied only
/// if every product exists and has enough units.
#[async_trait]
pub trait StockLedger: Send + Sync {
    async fn apply(&self, adjustments: &[StockAdjustment], policy: StockPolicy) -> Result<()>;

    /// Undo a successful `apply`
    async fn release(&self, adjustments: &[StockAdjustment]) -> Result<()>;
}
