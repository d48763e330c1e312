//! In-memory implementation of DataService for testing and development

use crate::commerce::inventory::{StockAdjustment, StockLedger, StockPolicy};
use crate::core::query::{self, Filter, QuerySpec};
use crate::core::{DataService, Entity, Result, ShopError};
use crate::entities::Product;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// In-memory data service implementation
///
/// Useful for testing and development. Uses RwLock for thread-safe access;
/// queries are evaluated against the JSON form of each entity.
#[derive(Clone)]
pub struct InMemoryDataService<T> {
    entities: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Entity> InMemoryDataService<T> {
    /// Create a new in-memory data service
    pub fn new() -> Self {
        Self {
            entities: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<T: Entity> Default for InMemoryDataService<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn to_document<T: Entity>(entity: &T) -> Result<Value> {
    serde_json::to_value(entity).map_err(|e| {
        ShopError::Internal(format!(
            "failed to encode {}: {}",
            T::resource_name_singular(),
            e
        ))
    })
}

/// Reject `candidate` if another entity holds the same value in a unique field
fn check_unique<T: Entity>(entities: &HashMap<Uuid, T>, candidate: &T) -> Result<()> {
    if T::unique_fields().is_empty() {
        return Ok(());
    }

    let document = to_document(candidate)?;
    for field in T::unique_fields() {
        let Some(value) = query::lookup(&document, field).filter(|v| !v.is_null()) else {
            continue;
        };
        for other in entities.values().filter(|e| e.id() != candidate.id()) {
            if query::lookup(&to_document(other)?, field) == Some(value) {
                return Err(ShopError::AlreadyExists {
                    entity_type: T::resource_name_singular().to_string(),
                    field: field.to_string(),
                    value: value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()),
                });
            }
        }
    }
    Ok(())
}

#[async_trait]
impl<T: Entity> DataService<T> for InMemoryDataService<T> {
    async fn create(&self, mut entity: T) -> Result<T> {
        let mut entities = self
            .entities
            .write()
            .map_err(|e| ShopError::storage(format!("Failed to acquire write lock: {}", e)))?;

        if entities.contains_key(&entity.id()) {
            return Err(ShopError::AlreadyExists {
                entity_type: T::resource_name_singular().to_string(),
                field: "id".into(),
                value: entity.id().to_string(),
            });
        }

        entity.normalize();
        entity.check()?;
        check_unique(&entities, &entity)?;
        entities.insert(entity.id(), entity.clone());

        Ok(entity)
    }

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<T>> {
        let entities = self
            .entities
            .read()
            .map_err(|e| ShopError::storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(entities.get(id).cloned())
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<T>> {
        let entities = self
            .entities
            .read()
            .map_err(|e| ShopError::storage(format!("Failed to acquire read lock: {}", e)))?;

        for entity in entities.values() {
            if filter.matches(&to_document(entity)?) {
                return Ok(Some(entity.clone()));
            }
        }
        Ok(None)
    }

    async fn find(&self, spec: &QuerySpec) -> Result<Vec<Value>> {
        let mut documents = {
            let entities = self
                .entities
                .read()
                .map_err(|e| ShopError::storage(format!("Failed to acquire read lock: {}", e)))?;

            let mut documents = Vec::new();
            for entity in entities.values() {
                let document = to_document(entity)?;
                if spec.matches(&document) {
                    documents.push(document);
                }
            }
            documents
        };

        documents.sort_by(|a, b| {
            query::compare_documents(a, b, &spec.sort)
                .then_with(|| a["id"].as_str().cmp(&b["id"].as_str()))
        });

        let skip = usize::try_from(spec.skip).unwrap_or(usize::MAX);
        let limit = spec
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(documents
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|d| spec.projection.apply(d))
            .collect())
    }

    async fn find_all(&self, filter: &Filter) -> Result<Vec<T>> {
        let entities = self
            .entities
            .read()
            .map_err(|e| ShopError::storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut matching = Vec::new();
        for entity in entities.values() {
            if filter.matches(&to_document(entity)?) {
                matching.push(entity.clone());
            }
        }
        matching.sort_by_key(|e| e.created_at());
        Ok(matching)
    }

    async fn count_matching(&self, spec: &QuerySpec) -> Result<u64> {
        let entities = self
            .entities
            .read()
            .map_err(|e| ShopError::storage(format!("Failed to acquire read lock: {}", e)))?;

        let mut count = 0;
        for entity in entities.values() {
            if spec.matches(&to_document(entity)?) {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn replace_versioned(&self, mut entity: T) -> Result<T> {
        let mut entities = self
            .entities
            .write()
            .map_err(|e| ShopError::storage(format!("Failed to acquire write lock: {}", e)))?;

        let stored = entities
            .get(&entity.id())
            .ok_or_else(|| ShopError::not_found(T::resource_name_singular(), entity.id()))?;

        if stored.version() != entity.version() {
            return Err(ShopError::Conflict {
                entity_type: T::resource_name_singular().to_string(),
                id: entity.id(),
            });
        }

        entity.normalize();
        entity.check()?;
        check_unique(&entities, &entity)?;
        entity.touch();
        entities.insert(entity.id(), entity.clone());

        Ok(entity)
    }

    async fn find_by_id_and_delete(&self, id: &Uuid) -> Result<Option<T>> {
        let mut entities = self
            .entities
            .write()
            .map_err(|e| ShopError::storage(format!("Failed to acquire write lock: {}", e)))?;

        Ok(entities.remove(id))
    }

    async fn delete_matching(&self, filter: &Filter) -> Result<u64> {
        let mut entities = self
            .entities
            .write()
            .map_err(|e| ShopError::storage(format!("Failed to acquire write lock: {}", e)))?;

        let mut doomed = Vec::new();
        for (id, entity) in entities.iter() {
            if filter.matches(&to_document(entity)?) {
                doomed.push(*id);
            }
        }
        for id in &doomed {
            entities.remove(id);
        }
        Ok(doomed.len() as u64)
    }
}

#[async_trait]
impl StockLedger for InMemoryDataService<Product> {
    async fn apply(&self, adjustments: &[StockAdjustment], policy: StockPolicy) -> Result<()> {
        let mut products = self
            .entities
            .write()
            .map_err(|e| ShopError::storage(format!("Failed to acquire write lock: {}", e)))?;

        if policy == StockPolicy::Reject {
            for adjustment in adjustments {
                let product = products
                    .get(&adjustment.product)
                    .ok_or_else(|| ShopError::not_found("product", adjustment.product))?;
                if product.available_quantity < adjustment.quantity {
                    return Err(ShopError::OutOfStock {
                        product: adjustment.product,
                        requested: adjustment.quantity,
                        available: product.available_quantity,
                    });
                }
            }
        }

        for adjustment in adjustments {
            match products.get_mut(&adjustment.product) {
                Some(product) => {
                    product.available_quantity -= adjustment.quantity;
                    product.units_sold += adjustment.quantity;
                    product.touch();
                }
                None => tracing::warn!(
                    product = %adjustment.product,
                    "stock adjustment skipped for missing product"
                ),
            }
        }
        Ok(())
    }

    async fn release(&self, adjustments: &[StockAdjustment]) -> Result<()> {
        let mut products = self
            .entities
            .write()
            .map_err(|e| ShopError::storage(format!("Failed to acquire write lock: {}", e)))?;

        for adjustment in adjustments {
            if let Some(product) = products.get_mut(&adjustment.product) {
                product.available_quantity += adjustment.quantity;
                product.units_sold -= adjustment.quantity;
                product.touch();
            }
        }
        Ok(())
    }
}
