//! Catalog documents: products, categories, sub-categories, brands and reviews

use crate::core::entity::slugify;
use crate::core::error::{Result, ShopError};
use crate::impl_entity;
use rust_decimal::Decimal;
use uuid::Uuid;

impl_entity!(
    /// A sellable product
    Product, "product", "products",
    kind = Product,
    {
        pub title: String,
        #[serde(default)]
        pub slug: String,
        #[serde(default)]
        pub description: String,
        /// Units on hand; may go negative under the tolerant stock policy
        #[serde(default)]
        pub available_quantity: i64,
        #[serde(default)]
        pub units_sold: i64,
        pub price: Decimal,
        #[serde(default)]
        pub price_after_discount: Option<Decimal>,
        #[serde(default)]
        pub colors: Vec<String>,
        #[serde(default)]
        pub image_cover: Option<String>,
        #[serde(default)]
        pub images: Vec<String>,
        pub category: Uuid,
        #[serde(default)]
        pub sub_categories: Vec<Uuid>,
        #[serde(default)]
        pub brand: Option<Uuid>,
        #[serde(default)]
        pub ratings_average: Option<f64>,
        #[serde(default)]
        pub ratings_quantity: u32,
    },
    {
        fn normalize(&mut self) {
            self.slug = slugify(&self.title);
        }

        fn image_urls(&self) -> Vec<String> {
            self.image_cover
                .iter()
                .chain(self.images.iter())
                .cloned()
                .collect()
        }
    }
);

impl_entity!(
    Category, "category", "categories",
    unique = ["name"],
    {
        pub name: String,
        #[serde(default)]
        pub slug: String,
        #[serde(default)]
        pub image: Option<String>,
    },
    {
        fn normalize(&mut self) {
            self.slug = slugify(&self.name);
        }

        fn image_urls(&self) -> Vec<String> {
            self.image.iter().cloned().collect()
        }
    }
);

impl_entity!(
    SubCategory, "subcategory", "subcategories",
    unique = ["name"],
    {
        pub name: String,
        #[serde(default)]
        pub slug: String,
        /// Parent category
        pub category: Uuid,
    },
    {
        fn normalize(&mut self) {
            self.slug = slugify(&self.name);
        }
    }
);

impl_entity!(
    Brand, "brand", "brands",
    unique = ["name"],
    {
        pub name: String,
        #[serde(default)]
        pub slug: String,
        #[serde(default)]
        pub image: Option<String>,
    },
    {
        fn normalize(&mut self) {
            self.slug = slugify(&self.name);
        }

        fn image_urls(&self) -> Vec<String> {
            self.image.iter().cloned().collect()
        }
    }
);

impl_entity!(
    /// A user's rating of a product
    Review, "review", "reviews",
    {
        #[serde(default)]
        pub title: Option<String>,
        pub ratings: f64,
        pub user: Uuid,
        pub product: Uuid,
    },
    {
        fn check(&self) -> Result<()> {
            if !self.has_valid_ratings() {
                return Err(ShopError::Validation("ratings must be between 1 and 5".into()));
            }
            Ok(())
        }
    }
);

impl Review {
    /// Ratings must lie between 1 and 5
    pub fn has_valid_ratings(&self) -> bool {
        (1.0..=5.0).contains(&self.ratings)
    }
}
