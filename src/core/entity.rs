//! Entity trait defining the core abstraction for all stored documents

use crate::core::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// How keyword search is applied to an entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// Keyword matches `title` or `description`
    Product,
    /// Keyword matches `name`
    Named,
}

impl EntityKind {
    /// Fields the keyword is matched against
    pub fn search_fields(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Product => &["title", "description"],
            EntityKind::Named => &["name"],
        }
    }
}

/// Base trait for every persisted document.
///
/// All entities have:
/// - id: Unique identifier
/// - created_at / updated_at: timestamps managed by the store
/// - version: internal revision, bumped on every write and used for
///   optimistic concurrency
///
/// Implementations are generated with [`impl_entity!`](crate::impl_entity).
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// The plural resource name used in URLs and collection names (e.g., "products")
    fn resource_name() -> &'static str;

    /// The singular resource name (e.g., "product")
    fn resource_name_singular() -> &'static str;

    /// Search behaviour for keyword queries
    fn kind() -> EntityKind {
        EntityKind::Named
    }

    /// Fields whose values must be unique across the collection
    fn unique_fields() -> &'static [&'static str] {
        &[]
    }

    /// Image folder used by the image pipeline for this entity type
    fn image_folder() -> &'static str {
        Self::resource_name()
    }

    fn id(&self) -> Uuid;

    fn created_at(&self) -> DateTime<Utc>;

    fn updated_at(&self) -> DateTime<Utc>;

    fn version(&self) -> u64;

    /// Bump `updated_at` and `version` before a write
    fn touch(&mut self);

    /// Derive computed fields (slugs, totals) before the document is stored
    fn normalize(&mut self) {}

    /// Reject field values the type cannot hold (ratings out of range, ...)
    fn check(&self) -> Result<()> {
        Ok(())
    }

    /// URLs of stored images owned by this document
    fn image_urls(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Turn a display name into a URL slug ("Men's T-Shirts" -> "men-s-t-shirts")
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}
