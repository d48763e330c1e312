//! Cart operations for the logged-in user

use crate::commerce::inventory::StockPolicy;
use crate::core::query::Filter;
use crate::core::{DataService, Result, ShopError};
use crate::entities::{Cart, Coupon, Product};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Attempts made when a cart write loses an optimistic-concurrency race
pub const MAX_CART_ATTEMPTS: usize = 5;

/// Cart service
///
/// Every mutation reads the cart, applies the change and writes it back with
/// a version check. A lost race is retried from a fresh read.
#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn DataService<Cart>>,
    products: Arc<dyn DataService<Product>>,
    coupons: Arc<dyn DataService<Coupon>>,
    stock_policy: StockPolicy,
}

impl CartService {
    pub fn new(
        carts: Arc<dyn DataService<Cart>>,
        products: Arc<dyn DataService<Product>>,
        coupons: Arc<dyn DataService<Coupon>>,
        stock_policy: StockPolicy,
    ) -> Self {
        Self {
            carts,
            products,
            coupons,
            stock_policy,
        }
    }

    async fn find_cart(&self, owner: Uuid) -> Result<Option<Cart>> {
        self.carts.find_one(&Filter::by("owner", owner.to_string())).await
    }

    /// Read-modify-write with retry on version conflicts
    async fn mutate<F>(&self, owner: Uuid, create_if_missing: bool, mut change: F) -> Result<Cart>
    where
        F: FnMut(&mut Cart) -> Result<()> + Send,
    {
        for attempt in 1..=MAX_CART_ATTEMPTS {
            let written = match self.find_cart(owner).await? {
                Some(mut cart) => {
                    change(&mut cart)?;
                    self.carts.replace_versioned(cart).await
                }
                None if create_if_missing => {
                    let mut cart = Cart::for_owner(owner);
                    change(&mut cart)?;
                    self.carts.create(cart).await
                }
                None => return Err(ShopError::not_found("cart", owner)),
            };

            match written {
                Err(ShopError::Conflict { .. } | ShopError::AlreadyExists { .. })
                    if attempt < MAX_CART_ATTEMPTS =>
                {
                    tracing::debug!(owner = %owner, attempt, "cart write raced, retrying");
                }
                other => return other,
            }
        }
        Err(ShopError::Internal("cart retry loop exhausted".into()))
    }

    fn check_stock(&self, product: &Product, wanted: i64) -> Result<()> {
        if self.stock_policy == StockPolicy::Reject && wanted > product.available_quantity {
            return Err(ShopError::OutOfStock {
                product: product.id,
                requested: wanted,
                available: product.available_quantity,
            });
        }
        Ok(())
    }

    /// Add one unit of a product, creating the cart on first use
    pub async fn add_item(
        &self,
        owner: Uuid,
        product_id: Uuid,
        color: Option<String>,
    ) -> Result<Cart> {
        let product = self.products.get(&product_id).await?;

        let cart = self
            .mutate(owner, true, |cart| {
                self.check_stock(&product, cart.quantity_of(product.id) + 1)?;
                cart.add_product(&product, color.clone())?;
                Ok(())
            })
            .await?;

        tracing::info!(
            owner = %owner,
            product = %product_id,
            items = cart.item_count(),
            "product added to cart"
        );
        Ok(cart)
    }

    /// Overwrite the quantity of one line item
    pub async fn update_item_quantity(
        &self,
        owner: Uuid,
        item_id: Uuid,
        quantity: u32,
    ) -> Result<Cart> {
        let cart = self
            .find_cart(owner)
            .await?
            .ok_or_else(|| ShopError::not_found("cart", owner))?;
        let product_id = cart.item(item_id)?.product;

        let product = match self.stock_policy {
            StockPolicy::Reject => self.products.find_by_id(&product_id).await?,
            StockPolicy::Tolerate => None,
        };

        self.mutate(owner, false, |cart| {
            if let Some(product) = &product {
                let current = i64::from(cart.item(item_id)?.quantity);
                let wanted = cart.quantity_of(product.id) - current + i64::from(quantity);
                self.check_stock(product, wanted)?;
            }
            cart.set_quantity(item_id, quantity)
        })
        .await
    }

    pub async fn remove_item(&self, owner: Uuid, item_id: Uuid) -> Result<Cart> {
        self.mutate(owner, false, |cart| {
            cart.remove_item(item_id);
            Ok(())
        })
        .await
    }

    /// Delete the user's cart; a missing cart is not an error
    pub async fn clear_cart(&self, owner: Uuid) -> Result<()> {
        let removed = self
            .carts
            .delete_matching(&Filter::by("owner", owner.to_string()))
            .await?;
        tracing::debug!(owner = %owner, removed, "cart cleared");
        Ok(())
    }

    pub async fn get_cart(&self, owner: Uuid) -> Result<Cart> {
        self.find_cart(owner)
            .await?
            .ok_or_else(|| ShopError::not_found("cart", owner))
    }

    /// Price the cart with a coupon that is valid now
    pub async fn apply_coupon(&self, owner: Uuid, code: &str) -> Result<Cart> {
        let now = Utc::now();
        let coupon = self
            .coupons
            .find_one(&Filter::by("name", code))
            .await?
            .filter(|c| c.is_valid_at(now))
            .ok_or_else(|| ShopError::InvalidOrExpired("Invalid or expired coupon".into()))?;

        let cart = self
            .mutate(owner, false, |cart| {
                if cart.is_empty() {
                    return Err(ShopError::InvalidOrExpired("Your cart is empty".into()));
                }
                cart.apply_discount(coupon.discount);
                Ok(())
            })
            .await?;

        tracing::info!(owner = %owner, coupon = %coupon.name, "coupon applied");
        Ok(cart)
    }
}
