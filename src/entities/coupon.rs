//! Discount coupons

use crate::core::error::{Result, ShopError};
use crate::impl_entity;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

impl_entity!(
    /// A named, time-bounded percentage discount
    Coupon, "coupon", "coupons",
    unique = ["name"],
    {
        /// The code customers redeem
        pub name: String,
        /// Percentage between 0 and 100
        pub discount: Decimal,
        pub expires_at: DateTime<Utc>,
    },
    {
        fn check(&self) -> Result<()> {
            if !self.has_valid_discount() {
                return Err(ShopError::Validation("discount must be between 0 and 100".into()));
            }
            Ok(())
        }
    }
);

impl Coupon {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn has_valid_discount(&self) -> bool {
        self.discount >= Decimal::ZERO && self.discount <= Decimal::ONE_HUNDRED
    }
}
