//! Image storage pipeline
//!
//! Uploaded images are stored under `<root>/<folder>/<public id>` where the
//! public id is `<Model>-<uuid>-<unix millis>`. Stored URLs end with the
//! public id, so the storage key of an image can be recovered from its URL.

use crate::core::error::{Result, ShopError};
use async_trait::async_trait;
use chrono::Utc;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Most gallery images a product can carry
pub const MAX_GALLERY_IMAGES: usize = 3;

/// Object storage for images
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store `bytes` under `key`, returning the public URL
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<String>;

    /// Remove the object stored under `key`
    async fn destroy(&self, key: &str) -> Result<()>;
}

/// Image store keeping objects in a map
pub struct InMemoryImageStore {
    base_url: String,
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryImageStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .read()
            .map(|objects| objects.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryImageStore {
    fn default() -> Self {
        Self::new("https://images.invalid")
    }
}

fn lock_error(err: &dyn std::fmt::Display) -> ShopError {
    ShopError::upstream("image store", format!("Failed to acquire write lock: {}", err))
}

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
        self.objects
            .write()
            .map_err(|e| lock_error(&e))?
            .insert(key.to_string(), bytes);
        Ok(format!("{}/{}.png", self.base_url, key))
    }

    async fn destroy(&self, key: &str) -> Result<()> {
        self.objects
            .write()
            .map_err(|e| lock_error(&e))?
            .remove(key);
        Ok(())
    }
}

/// URLs produced by a product image upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductImages {
    pub cover: Option<String>,
    pub images: Vec<String>,
}

/// Naming and fan-out on top of an [`ImageStore`]
#[derive(Clone)]
pub struct ImagePipeline {
    store: Arc<dyn ImageStore>,
    root_folder: String,
}

/// "product" -> "Product"
fn model_name(singular: &str) -> String {
    let mut chars = singular.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl ImagePipeline {
    pub fn new(store: Arc<dyn ImageStore>, root_folder: impl Into<String>) -> Self {
        Self {
            store,
            root_folder: root_folder.into(),
        }
    }

    /// Fresh public id for an image of `model`
    pub fn public_id(model: &str) -> String {
        format!(
            "{}-{}-{}",
            model_name(model),
            Uuid::new_v4(),
            Utc::now().timestamp_millis()
        )
    }

    fn key(&self, folder: &str, public_id: &str) -> String {
        format!("{}/{}/{}", self.root_folder, folder, public_id)
    }

    /// Storage key of a stored image, recovered from its URL
    pub fn key_from_url(&self, folder: &str, url: &str) -> Result<String> {
        let last = url.rsplit('/').next().unwrap_or_default();
        let public_id = last.split('.').next().unwrap_or_default();
        if public_id.is_empty() {
            return Err(ShopError::Validation(format!("invalid image url '{}'", url)));
        }
        Ok(self.key(folder, public_id))
    }

    async fn upload(&self, folder: &str, public_id: String, bytes: Vec<u8>) -> Result<String> {
        if bytes.is_empty() {
            return Err(ShopError::Validation("image is empty".into()));
        }
        let key = self.key(folder, &public_id);
        let url = self.store.upload(&key, bytes).await?;
        tracing::debug!(key = %key, "image stored");
        Ok(url)
    }

    /// Store one image for an entity of `model`
    pub async fn store(&self, model: &str, folder: &str, bytes: Vec<u8>) -> Result<String> {
        self.upload(folder, Self::public_id(model), bytes).await
    }

    /// Delete `previous` (if any), then store the new image
    pub async fn replace(
        &self,
        model: &str,
        folder: &str,
        previous: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<String> {
        if let Some(url) = previous {
            self.delete(folder, url).await?;
        }
        self.store(model, folder, bytes).await
    }

    pub async fn delete(&self, folder: &str, url: &str) -> Result<()> {
        let key = self.key_from_url(folder, url)?;
        self.store.destroy(&key).await?;
        tracing::debug!(key = %key, "image deleted");
        Ok(())
    }

    /// Delete every image, concurrently
    pub async fn delete_all(&self, folder: &str, urls: &[String]) -> Result<()> {
        try_join_all(urls.iter().map(|url| self.delete(folder, url))).await?;
        Ok(())
    }

    /// Upload a product cover and up to three gallery images concurrently.
    ///
    /// Completes when every upload has finished; the first failure fails the
    /// whole call without removing images already stored.
    pub async fn store_product_images(
        &self,
        model: &str,
        folder: &str,
        cover: Option<Vec<u8>>,
        gallery: Vec<Vec<u8>>,
    ) -> Result<ProductImages> {
        if gallery.len() > MAX_GALLERY_IMAGES {
            return Err(ShopError::Validation(format!(
                "at most {} gallery images are allowed",
                MAX_GALLERY_IMAGES
            )));
        }

        let base = Self::public_id(model);
        let cover_upload = async {
            match cover {
                Some(bytes) => {
                    let public_id = format!("{}-cover", base);
                    self.upload(folder, public_id, bytes).await.map(Some)
                }
                None => Ok(None),
            }
        };
        let gallery_uploads = try_join_all(gallery.into_iter().enumerate().map(|(index, bytes)| {
            self.upload(folder, format!("{}-{}", base, index + 1), bytes)
        }));

        let (cover, images) = futures::try_join!(cover_upload, gallery_uploads)?;
        Ok(ProductImages { cover, images })
    }
}
