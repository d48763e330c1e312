//! Self-service account operations and user administration

use crate::core::{DataService, Result, ShopError};
use crate::entities::{Address, AddressPatch, NewAddress, Product, User};
use crate::integrations::email::{Email, EmailSender};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

const MAX_USER_ATTEMPTS: usize = 5;

/// Fields a user may change on their own profile
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn DataService<User>>,
    products: Arc<dyn DataService<Product>>,
    mailer: Arc<dyn EmailSender>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn DataService<User>>,
        products: Arc<dyn DataService<Product>>,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            users,
            products,
            mailer,
        }
    }

    async fn mutate<F>(&self, user_id: Uuid, mut change: F) -> Result<User>
    where
        F: FnMut(&mut User) -> Result<()> + Send,
    {
        for attempt in 1..=MAX_USER_ATTEMPTS {
            let mut user = self.users.get(&user_id).await?;
            change(&mut user)?;
            match self.users.replace_versioned(user).await {
                Err(ShopError::Conflict { .. }) if attempt < MAX_USER_ATTEMPTS => {
                    tracing::debug!(user = %user_id, attempt, "user write raced, retrying");
                }
                other => return other,
            }
        }
        Err(ShopError::Internal("user retry loop exhausted".into()))
    }

    // -- profile --------------------------------------------------------------

    pub async fn get_me(&self, user_id: Uuid) -> Result<User> {
        self.users.get(&user_id).await
    }

    pub async fn update_me(&self, user_id: Uuid, update: ProfileUpdate) -> Result<User> {
        update.validate()?;
        self.mutate(user_id, |user| {
            if let Some(name) = &update.name {
                user.name = name.clone();
            }
            if let Some(email) = &update.email {
                user.email = email.clone();
            }
            if let Some(phone) = &update.phone {
                user.phone = Some(phone.clone());
            }
            Ok(())
        })
        .await
    }

    pub async fn deactivate_me(&self, user_id: Uuid) -> Result<()> {
        self.mutate(user_id, |user| {
            user.active = false;
            Ok(())
        })
        .await?;
        tracing::info!(user = %user_id, "account deactivated");
        Ok(())
    }

    // -- addresses ------------------------------------------------------------

    pub async fn add_address(&self, user_id: Uuid, address: NewAddress) -> Result<Vec<Address>> {
        address.validate()?;
        let user = self
            .mutate(user_id, |user| {
                user.addresses.push(address.clone().into());
                Ok(())
            })
            .await?;
        Ok(user.addresses)
    }

    /// Remove an address; removing an unknown id is a no-op
    pub async fn remove_address(&self, user_id: Uuid, address_id: Uuid) -> Result<Vec<Address>> {
        let user = self
            .mutate(user_id, |user| {
                user.addresses.retain(|a| a.id != address_id);
                Ok(())
            })
            .await?;
        Ok(user.addresses)
    }

    pub async fn list_addresses(&self, user_id: Uuid) -> Result<Vec<Address>> {
        Ok(self.users.get(&user_id).await?.addresses)
    }

    pub async fn get_address(&self, user_id: Uuid, address_id: Uuid) -> Result<Address> {
        self.users.get(&user_id).await?.address(address_id).cloned()
    }

    pub async fn update_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
        patch: AddressPatch,
    ) -> Result<Address> {
        patch.validate()?;
        let user = self
            .mutate(user_id, |user| {
                user.address_mut(address_id)?.apply(patch.clone());
                Ok(())
            })
            .await?;
        user.address(address_id).cloned()
    }

    // -- wishlist -------------------------------------------------------------

    pub async fn add_to_wishlist(&self, user_id: Uuid, product_id: Uuid) -> Result<Vec<Uuid>> {
        self.products.get(&product_id).await?;
        let user = self
            .mutate(user_id, |user| {
                user.add_to_wishlist(product_id);
                Ok(())
            })
            .await?;
        Ok(user.wishlist)
    }

    pub async fn remove_from_wishlist(&self, user_id: Uuid, product_id: Uuid) -> Result<Vec<Uuid>> {
        let user = self
            .mutate(user_id, |user| {
                user.remove_from_wishlist(product_id);
                Ok(())
            })
            .await?;
        Ok(user.wishlist)
    }

    /// Wishlisted products that still exist, in wishlist order
    pub async fn list_wishlist(&self, user_id: Uuid) -> Result<Vec<Product>> {
        let user = self.users.get(&user_id).await?;
        let lookups = user.wishlist.iter().map(|id| self.products.find_by_id(id));
        let products = futures::future::try_join_all(lookups).await?;
        Ok(products.into_iter().flatten().collect())
    }

    // -- administration -------------------------------------------------------

    /// Suspend a user and tell them by email.
    ///
    /// The flag is stored before the email is sent; a delivery failure is
    /// returned but does not undo the suspension.
    pub async fn suspend_user(&self, user_id: Uuid) -> Result<User> {
        self.set_suspended(user_id, true).await
    }

    pub async fn unsuspend_user(&self, user_id: Uuid) -> Result<User> {
        self.set_suspended(user_id, false).await
    }

    async fn set_suspended(&self, user_id: Uuid, suspended: bool) -> Result<User> {
        let user = self
            .mutate(user_id, |user| {
                user.suspended = suspended;
                Ok(())
            })
            .await?;
        tracing::info!(user = %user.id, suspended, "user suspension changed");

        let email = if suspended {
            Email {
                to: user.email.clone(),
                subject: "Your account has been suspended".into(),
                body: format!(
                    "Hi {},\n\nYour account has been suspended. Contact support for details.",
                    user.name
                ),
            }
        } else {
            Email {
                to: user.email.clone(),
                subject: "Your account has been reactivated".into(),
                body: format!("Hi {},\n\nYour account is active again.", user.name),
            }
        };

        if let Err(err) = self.mailer.send(email).await {
            tracing::error!(user = %user.id, error = %err, "suspension email failed");
            return Err(err);
        }
        Ok(user)
    }
}
