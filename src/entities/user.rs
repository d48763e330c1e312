//! Users, their saved addresses and wishlist

use crate::core::entity::slugify;
use crate::core::error::{Result, ShopError};
use crate::impl_entity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub use crate::core::auth::Role;

fn default_active() -> bool {
    true
}

impl_entity!(
    User, "user", "users",
    unique = ["email"],
    {
        pub name: String,
        #[serde(default)]
        pub slug: String,
        pub email: String,
        #[serde(default)]
        pub phone: Option<String>,
        #[serde(default)]
        pub image: Option<String>,
        #[serde(default)]
        pub role: Role,
        #[serde(default = "default_active")]
        pub active: bool,
        #[serde(default)]
        pub suspended: bool,
        #[serde(default)]
        pub wishlist: Vec<Uuid>,
        #[serde(default)]
        pub addresses: Vec<Address>,
    },
    {
        fn normalize(&mut self) {
            self.slug = slugify(&self.name);
            self.email = self.email.trim().to_lowercase();
        }

        fn image_urls(&self) -> Vec<String> {
            self.image.iter().cloned().collect()
        }
    }
);

impl User {
    /// An active user with no addresses or wishlist
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            role,
            active: true,
            ..Default::default()
        }
    }

    /// Add to the wishlist; returns false if already present
    pub fn add_to_wishlist(&mut self, product: Uuid) -> bool {
        if self.wishlist.contains(&product) {
            return false;
        }
        self.wishlist.push(product);
        true
    }

    pub fn remove_from_wishlist(&mut self, product: Uuid) -> bool {
        let before = self.wishlist.len();
        self.wishlist.retain(|p| *p != product);
        self.wishlist.len() != before
    }

    pub fn address(&self, id: Uuid) -> Result<&Address> {
        self.addresses
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| ShopError::not_found("address", id))
    }

    pub fn address_mut(&mut self, id: Uuid) -> Result<&mut Address> {
        self.addresses
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| ShopError::not_found("address", id))
    }
}

/// A saved shipping address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: Uuid,
    #[serde(default)]
    pub alias: Option<String>,
    pub details: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub city: String,
    #[serde(default)]
    pub postal_code: Option<String>,
}

/// Request body for a new address
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAddress {
    pub alias: Option<String>,
    #[validate(length(min = 1, message = "details are required"))]
    pub details: String,
    pub phone: Option<String>,
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,
    pub postal_code: Option<String>,
}

impl From<NewAddress> for Address {
    fn from(new: NewAddress) -> Self {
        Self {
            id: Uuid::new_v4(),
            alias: new.alias,
            details: new.details,
            phone: new.phone,
            city: new.city,
            postal_code: new.postal_code,
        }
    }
}

/// Partial update of an address; absent fields are kept
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AddressPatch {
    pub alias: Option<String>,
    #[validate(length(min = 1))]
    pub details: Option<String>,
    pub phone: Option<String>,
    #[validate(length(min = 1))]
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

impl Address {
    pub fn apply(&mut self, patch: AddressPatch) {
        if let Some(alias) = patch.alias {
            self.alias = Some(alias);
        }
        if let Some(details) = patch.details {
            self.details = details;
        }
        if let Some(phone) = patch.phone {
            self.phone = Some(phone);
        }
        if let Some(city) = patch.city {
            self.city = city;
        }
        if let Some(postal_code) = patch.postal_code {
            self.postal_code = Some(postal_code);
        }
    }
}
