//! Storage capability trait shared by every entity type

use crate::core::entity::Entity;
use crate::core::error::{Result, ShopError};
use crate::core::query::{self, Filter, Pagination, QueryDefaults, QueryParams, QuerySpec};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Fields a client patch may never overwrite
pub const PROTECTED_FIELDS: [&str; 4] = ["id", "created_at", "updated_at", "version"];

/// Service trait for managing stored entities
///
/// Implementations provide document operations for a specific entity type.
/// The shop is agnostic to the underlying storage mechanism.
///
/// Writes go through [`replace_versioned`](Self::replace_versioned): the
/// entity carries the version it was read at, and the write fails with
/// [`ShopError::Conflict`] if the stored version moved in between.
#[async_trait]
pub trait DataService<T: Entity>: Send + Sync {
    /// Insert a new entity, enforcing unique fields
    async fn create(&self, entity: T) -> Result<T>;

    /// Get an entity by ID
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<T>>;

    /// First entity matching an equality/range filter
    async fn find_one(&self, filter: &Filter) -> Result<Option<T>>;

    /// Run a shaped query and return projected documents
    async fn find(&self, spec: &QuerySpec) -> Result<Vec<Value>>;

    /// Every entity matching a filter, unprojected
    async fn find_all(&self, filter: &Filter) -> Result<Vec<T>>;

    /// Number of documents matching the filter and keyword search of `spec`
    async fn count_matching(&self, spec: &QuerySpec) -> Result<u64>;

    /// Compare-and-swap write of a whole entity
    async fn replace_versioned(&self, entity: T) -> Result<T>;

    /// Delete by ID, returning the removed entity
    async fn find_by_id_and_delete(&self, id: &Uuid) -> Result<Option<T>>;

    /// Delete every entity matching a filter
    async fn delete_matching(&self, filter: &Filter) -> Result<u64>;

    /// Get an entity by ID or fail with NotFound
    async fn get(&self, id: &Uuid) -> Result<T> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| ShopError::not_found(T::resource_name_singular(), id))
    }

    /// Merge a JSON patch into the stored entity.
    ///
    /// Top-level keys replace the stored values; protected fields are
    /// ignored. The merged document must still deserialize into `T`.
    async fn find_by_id_and_update(&self, id: &Uuid, patch: Value) -> Result<T> {
        let Value::Object(patch) = patch else {
            return Err(ShopError::Validation("update body must be a JSON object".into()));
        };

        let current = self.get(id).await?;
        let mut document = serde_json::to_value(&current).map_err(|e| {
            ShopError::Internal(format!("failed to encode {}: {}", T::resource_name_singular(), e))
        })?;

        if let Value::Object(fields) = &mut document {
            for (key, value) in patch {
                if !PROTECTED_FIELDS.contains(&key.as_str()) {
                    fields.insert(key, value);
                }
            }
        }

        let updated: T = serde_json::from_value(document)?;
        self.replace_versioned(updated).await
    }
}

/// One page of a list query
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub results: usize,
    pub pagination: Pagination,
    pub data: Vec<Value>,
}

/// Shape a list query and compute its pagination descriptor.
///
/// Runs filter, search, projection and sort, counts the documents matching
/// the filter and search, then paginates.
pub async fn build<T: Entity>(
    service: &dyn DataService<T>,
    base: Filter,
    params: &QueryParams,
    defaults: &QueryDefaults,
) -> Result<(QuerySpec, Pagination)> {
    let spec = query::prepare(base, params, T::kind())?;
    let total = service.count_matching(&spec).await?;
    Ok(query::paginate(spec, params, defaults, total))
}

/// [`build`] followed by the read itself
pub async fn find_page<T: Entity>(
    service: &dyn DataService<T>,
    base: Filter,
    params: &QueryParams,
    defaults: &QueryDefaults,
) -> Result<Page> {
    let (spec, pagination) = build(service, base, params, defaults).await?;
    let data = service.find(&spec).await?;
    Ok(Page {
        results: data.len(),
        pagination,
        data,
    })
}
