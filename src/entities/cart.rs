//! Shopping cart and its totals

use crate::core::error::{Result, ShopError};
use crate::entities::catalog::Product;
use crate::impl_entity;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Round a money amount to two decimals, halves away from zero
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// One line of a cart; `(product, color)` is unique within a cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub product: Uuid,
    #[serde(default)]
    pub color: Option<String>,
    /// Price captured when the product was added
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

impl_entity!(
    /// A user's shopping cart
    Cart, "cart", "carts",
    unique = ["owner"],
    {
        pub owner: Uuid,
        #[serde(default)]
        pub items: Vec<CartItem>,
        #[serde(default)]
        pub total_price: Decimal,
        /// Valid only until the next item mutation
        #[serde(default)]
        pub total_price_after_discount: Option<Decimal>,
    },
    {
        fn normalize(&mut self) {
            if self.items_total() != self.total_price {
                self.recalculate();
            }
        }
    }
);

impl Cart {
    pub fn for_owner(owner: Uuid) -> Self {
        Self {
            owner,
            ..Default::default()
        }
    }

    fn items_total(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Recompute the total and drop any discounted total.
    ///
    /// Every item mutation ends here.
    pub fn recalculate(&mut self) {
        self.total_price = self.items_total();
        self.total_price_after_discount = None;
    }

    /// Add one unit of `product` in `color`, priced at its current price
    pub fn add_product(&mut self, product: &Product, color: Option<String>) -> Result<&CartItem> {
        let index = match self
            .items
            .iter()
            .position(|item| item.product == product.id && item.color == color)
        {
            Some(index) => {
                let item = &mut self.items[index];
                let Some(quantity) = item.quantity.checked_add(1) else {
                    return Err(ShopError::Validation(format!(
                        "quantity of cart item {} is at its maximum",
                        item.id
                    )));
                };
                item.quantity = quantity;
                index
            }
            None => {
                self.items.push(CartItem {
                    id: Uuid::new_v4(),
                    product: product.id,
                    color,
                    unit_price: product.price,
                    quantity: 1,
                });
                self.items.len() - 1
            }
        };
        self.recalculate();
        Ok(&self.items[index])
    }

    /// Overwrite the quantity of a line item
    pub fn set_quantity(&mut self, item_id: Uuid, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(ShopError::Validation("quantity must be at least 1".into()));
        }
        let item = self.item_mut(item_id)?;
        item.quantity = quantity;
        self.recalculate();
        Ok(())
    }

    /// Remove a line item; removing an absent item is a no-op
    pub fn remove_item(&mut self, item_id: Uuid) {
        self.items.retain(|item| item.id != item_id);
        self.recalculate();
    }

    pub fn item(&self, item_id: Uuid) -> Result<&CartItem> {
        self.items
            .iter()
            .find(|item| item.id == item_id)
            .ok_or_else(|| ShopError::not_found("cart item", item_id))
    }

    fn item_mut(&mut self, item_id: Uuid) -> Result<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| item.id == item_id)
            .ok_or_else(|| ShopError::not_found("cart item", item_id))
    }

    /// Units of `product` across all colors
    pub fn quantity_of(&self, product: Uuid) -> i64 {
        self.items
            .iter()
            .filter(|item| item.product == product)
            .map(|item| i64::from(item.quantity))
            .sum()
    }

    /// Number of line items
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply a percentage discount to the current total
    pub fn apply_discount(&mut self, percent: Decimal) -> Decimal {
        let discounted = round2(self.total_price * (Decimal::ONE - percent / Decimal::ONE_HUNDRED));
        self.total_price_after_discount = Some(discounted);
        discounted
    }

    /// The discounted total when a coupon is applied, else the total
    pub fn effective_total(&self) -> Decimal {
        self.total_price_after_discount.unwrap_or(self.total_price)
    }
}
