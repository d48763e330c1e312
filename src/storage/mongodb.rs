//! MongoDB storage backend using the official MongoDB async driver.
//!
//! # Feature flag
//!
//! This module is gated behind the `mongodb_backend` feature flag:
//! ```toml
//! [dependencies]
//! shop-rs = { version = "0.1", features = ["mongodb_backend"] }
//! ```
//!
//! # Storage model
//!
//! Each `MongoDataService<T>` operates on a collection named after
//! `T::resource_name()` (e.g. "products", "carts"). Unique entity fields get
//! unique indexes through [`MongoDataService::ensure_indexes`].
//!
//! # Serialization strategy
//!
//! Entities are serialized via `serde_json::Value` as an intermediate format,
//! then converted to BSON documents. UUIDs and timestamps are stored as
//! strings and money as doubles. The `id` field is mapped to MongoDB's `_id`.
//!
//! # Concurrency
//!
//! `replace_versioned` only replaces a document whose stored `version`
//! equals the caller's; stock adjustments are conditional `$inc` updates.

use crate::commerce::inventory::{StockAdjustment, StockLedger, StockPolicy};
use crate::core::query::{
    Clause, CompareOp, Filter, Projection, QuerySpec, Search, SortKey, VERSION_FIELD,
};
use crate::core::{DataService, Entity, Result, ShopError};
use crate::entities::Product;
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel};
use serde_json::Value;
use uuid::Uuid;

const DUPLICATE_KEY: i32 = 11000;

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

fn storage_error(context: &str, err: impl std::fmt::Display) -> ShopError {
    ShopError::storage(format!("{}: {}", context, err))
}

/// Convert a serde_json::Value (expected to be an Object) into a BSON Document,
/// renaming `id` → `_id` for MongoDB convention.
fn json_to_document(json: Value) -> Result<Document> {
    let bson_val = mongodb::bson::to_bson(&json)
        .map_err(|e| storage_error("Failed to convert JSON to BSON", e))?;

    let mut doc = match bson_val {
        Bson::Document(d) => d,
        _ => return Err(ShopError::storage("Expected BSON document, got non-object")),
    };

    if let Some(id) = doc.remove("id") {
        doc.insert("_id", id);
    }

    Ok(doc)
}

/// Convert a BSON Document back into a serde_json::Value,
/// renaming `_id` → `id` for domain entity convention.
fn document_to_json(mut doc: Document) -> Value {
    if let Some(id) = doc.remove("_id") {
        doc.insert("id", id);
    }

    Bson::Document(doc).into_relaxed_extjson()
}

/// Convert a UUID to its BSON string representation for queries.
fn uuid_bson(id: &Uuid) -> Bson {
    Bson::String(id.to_string())
}

/// Field name as stored in MongoDB
fn stored_field(field: &str) -> &str {
    if field == "id" { "_id" } else { field }
}

/// BSON values a filter value may be stored as.
///
/// Query-string values arrive as strings while documents hold native
/// numbers and booleans, so a string also yields its typed variants.
fn bson_variants(value: &Value) -> Result<Vec<Bson>> {
    let Value::String(raw) = value else {
        let bson = mongodb::bson::to_bson(value)
            .map_err(|e| storage_error("Failed to convert filter value", e))?;
        return Ok(vec![bson]);
    };

    let mut variants = vec![Bson::String(raw.clone())];
    match raw.as_str() {
        "true" => variants.push(Bson::Boolean(true)),
        "false" => variants.push(Bson::Boolean(false)),
        _ => {
            if let Ok(i) = raw.parse::<i64>() {
                variants.push(Bson::Int64(i));
                variants.push(Bson::Double(i as f64));
            } else if let Ok(f) = raw.parse::<f64>()
                && f.is_finite()
            {
                variants.push(Bson::Double(f));
            }
        }
    }
    Ok(variants)
}

fn clause_document(clause: &Clause) -> Result<Document> {
    let field = stored_field(&clause.field);
    let mut variants = bson_variants(&clause.value)?;

    let document = match (clause.op, variants.len()) {
        (CompareOp::Eq, 1) => doc! { field: variants.remove(0) },
        (CompareOp::Eq, _) => doc! { field: { "$in": variants } },
        (op, 1) => doc! { field: { op.mongo_operator(): variants.remove(0) } },
        // Comparison operators only match within one BSON type, so try each
        (op, _) => {
            let alternatives: Vec<Document> = variants
                .into_iter()
                .map(|v| doc! { field: { op.mongo_operator(): v } })
                .collect();
            doc! { "$or": alternatives }
        }
    };
    Ok(document)
}

fn search_document(search: &Search) -> Document {
    let pattern = regex::escape(&search.keyword);
    let alternatives: Vec<Document> = search
        .fields
        .iter()
        .map(|field| doc! { field.as_str(): { "$regex": &pattern, "$options": "i" } })
        .collect();
    doc! { "$or": alternatives }
}

fn filter_document(filter: &Filter, search: Option<&Search>) -> Result<Document> {
    let mut parts = filter
        .clauses
        .iter()
        .map(clause_document)
        .collect::<Result<Vec<_>>>()?;
    if let Some(search) = search.filter(|s| !s.fields.is_empty()) {
        parts.push(search_document(search));
    }

    Ok(match parts.len() {
        0 => Document::new(),
        1 => parts.remove(0),
        _ => doc! { "$and": parts },
    })
}

fn projection_document(projection: &Projection) -> Document {
    match projection {
        Projection::Default => doc! { VERSION_FIELD: 0 },
        Projection::Only(fields) => {
            let mut projection = Document::new();
            for field in fields {
                projection.insert(stored_field(field), 1);
            }
            projection
        }
    }
}

fn sort_document(keys: &[SortKey]) -> Document {
    let mut sort = Document::new();
    for key in keys {
        sort.insert(stored_field(&key.field), if key.descending { -1 } else { 1 });
    }
    if !sort.contains_key("_id") {
        sort.insert("_id", 1);
    }
    sort
}

/// The driver's duplicate-key error, if `err` is one
fn duplicate_key_message(err: &mongodb::error::Error) -> Option<&str> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY => {
            Some(write.message.as_str())
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// MongoDataService<T>
// ---------------------------------------------------------------------------

/// Generic data storage service backed by MongoDB.
///
/// # Example
///
/// ```rust,ignore
/// use mongodb::Client;
/// use shop::storage::MongoDataService;
///
/// let client = Client::with_uri_str("mongodb://localhost:27017").await?;
/// let db = client.database("shop");
/// let products = MongoDataService::<Product>::new(db);
/// products.ensure_indexes().await?;
/// ```
#[derive(Clone, Debug)]
pub struct MongoDataService<T> {
    database: Database,
    _marker: std::marker::PhantomData<T>,
}

impl<T> MongoDataService<T> {
    /// Create a new `MongoDataService` with the given database handle.
    pub fn new(database: Database) -> Self {
        Self {
            database,
            _marker: std::marker::PhantomData,
        }
    }

    /// Get a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }
}

impl<T: Entity> MongoDataService<T> {
    fn collection(&self) -> mongodb::Collection<Document> {
        self.database.collection(T::resource_name())
    }

    /// Create a unique index per unique entity field.
    ///
    /// Indexes only cover documents holding a string in the field, so unset
    /// optional values never collide. Idempotent; safe to call on every
    /// startup.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let indexes: Vec<IndexModel> = T::unique_fields()
            .iter()
            .map(|field| {
                IndexModel::builder()
                    .keys(doc! { *field: 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .partial_filter_expression(doc! { *field: { "$type": "string" } })
                            .build(),
                    )
                    .build()
            })
            .collect();
        if indexes.is_empty() {
            return Ok(());
        }

        self.collection()
            .create_indexes(indexes)
            .await
            .map_err(|e| {
                storage_error(&format!("Failed to create indexes on {}", T::resource_name()), e)
            })?;
        Ok(())
    }

    fn entity_to_document(entity: &T) -> Result<Document> {
        let json = serde_json::to_value(entity)
            .map_err(|e| storage_error("Failed to serialize entity", e))?;
        json_to_document(json)
    }

    fn document_to_entity(doc: Document) -> Result<T> {
        serde_json::from_value(document_to_json(doc))
            .map_err(|e| storage_error("Failed to deserialize entity from document", e))
    }

    /// Map a write error, turning duplicate keys into `AlreadyExists`
    fn write_error(entity: &T, err: mongodb::error::Error) -> ShopError {
        let Some(message) = duplicate_key_message(&err) else {
            return storage_error("Failed to write entity", err);
        };

        let field = T::unique_fields()
            .iter()
            .find(|field| message.contains(&format!("{}_1", field)))
            .copied()
            .unwrap_or("id");
        let value = serde_json::to_value(entity)
            .ok()
            .and_then(|json| json.get(field).cloned())
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .unwrap_or_default();

        ShopError::AlreadyExists {
            entity_type: T::resource_name_singular().to_string(),
            field: field.to_string(),
            value,
        }
    }

    async fn collect(&self, cursor: mongodb::Cursor<Document>) -> Result<Vec<Document>> {
        cursor
            .try_collect()
            .await
            .map_err(|e| storage_error(&format!("Failed to read {}", T::resource_name()), e))
    }
}

#[async_trait]
impl<T: Entity> DataService<T> for MongoDataService<T> {
    async fn create(&self, mut entity: T) -> Result<T> {
        entity.normalize();
        entity.check()?;
        let doc = Self::entity_to_document(&entity)?;

        self.collection()
            .insert_one(doc)
            .await
            .map_err(|e| Self::write_error(&entity, e))?;

        tracing::debug!(collection = T::resource_name(), id = %entity.id(), "document inserted");
        Ok(entity)
    }

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<T>> {
        let doc = self
            .collection()
            .find_one(doc! { "_id": uuid_bson(id) })
            .await
            .map_err(|e| storage_error("Failed to get entity", e))?;

        doc.map(Self::document_to_entity).transpose()
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<T>> {
        let doc = self
            .collection()
            .find_one(filter_document(filter, None)?)
            .await
            .map_err(|e| storage_error("Failed to find entity", e))?;

        doc.map(Self::document_to_entity).transpose()
    }

    async fn find(&self, spec: &QuerySpec) -> Result<Vec<Value>> {
        let mut find = self
            .collection()
            .find(filter_document(&spec.filter, spec.search.as_ref())?)
            .sort(sort_document(&spec.sort))
            .projection(projection_document(&spec.projection))
            .skip(spec.skip);
        if let Some(limit) = spec.limit {
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let cursor = find.await.map_err(|e| storage_error("Failed to query entities", e))?;
        let docs = self.collect(cursor).await?;
        Ok(docs.into_iter().map(document_to_json).collect())
    }

    async fn find_all(&self, filter: &Filter) -> Result<Vec<T>> {
        let cursor = self
            .collection()
            .find(filter_document(filter, None)?)
            .sort(doc! { "created_at": 1, "_id": 1 })
            .await
            .map_err(|e| storage_error("Failed to list entities", e))?;

        self.collect(cursor)
            .await?
            .into_iter()
            .map(Self::document_to_entity)
            .collect()
    }

    async fn count_matching(&self, spec: &QuerySpec) -> Result<u64> {
        self.collection()
            .count_documents(filter_document(&spec.filter, spec.search.as_ref())?)
            .await
            .map_err(|e| storage_error("Failed to count entities", e))
    }

    /// Replace the stored document if its version still matches.
    ///
    /// Distinguishes a missing document (`NotFound`) from a stale version
    /// (`Conflict`) with a follow-up read.
    async fn replace_versioned(&self, mut entity: T) -> Result<T> {
        let id = entity.id();
        let expected = i64::try_from(entity.version())
            .map_err(|e| storage_error("Version out of range", e))?;

        entity.normalize();
        entity.check()?;
        entity.touch();
        let doc = Self::entity_to_document(&entity)?;

        let result = self
            .collection()
            .replace_one(doc! { "_id": uuid_bson(&id), VERSION_FIELD: expected }, doc)
            .await
            .map_err(|e| Self::write_error(&entity, e))?;

        if result.matched_count == 0 {
            return match self.find_by_id(&id).await? {
                None => Err(ShopError::not_found(T::resource_name_singular(), id)),
                Some(_) => Err(ShopError::Conflict {
                    entity_type: T::resource_name_singular().to_string(),
                    id,
                }),
            };
        }

        Ok(entity)
    }

    async fn find_by_id_and_delete(&self, id: &Uuid) -> Result<Option<T>> {
        let doc = self
            .collection()
            .find_one_and_delete(doc! { "_id": uuid_bson(id) })
            .await
            .map_err(|e| storage_error("Failed to delete entity", e))?;

        doc.map(Self::document_to_entity).transpose()
    }

    async fn delete_matching(&self, filter: &Filter) -> Result<u64> {
        let result = self
            .collection()
            .delete_many(filter_document(filter, None)?)
            .await
            .map_err(|e| storage_error("Failed to delete entities", e))?;

        Ok(result.deleted_count)
    }
}

// ---------------------------------------------------------------------------
// Stock ledger
// ---------------------------------------------------------------------------

impl MongoDataService<Product> {
    async fn increment(
        &self,
        adjustment: &StockAdjustment,
        sign: i64,
        require_stock: bool,
    ) -> Result<bool> {
        let mut filter = doc! { "_id": uuid_bson(&adjustment.product) };
        if require_stock {
            filter.insert("available_quantity", doc! { "$gte": adjustment.quantity });
        }
        let now = mongodb::bson::to_bson(&Utc::now())
            .map_err(|e| storage_error("Failed to encode timestamp", e))?;

        let result = self
            .collection()
            .update_one(
                filter,
                doc! {
                    "$inc": {
                        "available_quantity": -sign * adjustment.quantity,
                        "units_sold": sign * adjustment.quantity,
                        VERSION_FIELD: 1_i64,
                    },
                    "$set": { "updated_at": now },
                },
            )
            .await
            .map_err(|e| storage_error("Failed to adjust stock", e))?;

        Ok(result.matched_count > 0)
    }

    /// Why a conditional decrement did not match
    async fn shortfall(&self, adjustment: &StockAdjustment) -> Result<ShopError> {
        Ok(match self.find_by_id(&adjustment.product).await? {
            None => ShopError::not_found("product", adjustment.product),
            Some(product) => ShopError::OutOfStock {
                product: product.id,
                requested: adjustment.quantity,
                available: product.available_quantity,
            },
        })
    }
}

#[async_trait]
impl StockLedger for MongoDataService<Product> {
    /// Under `Reject`, lines are decremented one at a time and already
    /// applied lines are compensated when a later line falls short.
    async fn apply(&self, adjustments: &[StockAdjustment], policy: StockPolicy) -> Result<()> {
        for (index, adjustment) in adjustments.iter().enumerate() {
            match policy {
                StockPolicy::Tolerate => {
                    if !self.increment(adjustment, 1, false).await? {
                        tracing::warn!(
                            product = %adjustment.product,
                            "stock adjustment skipped for missing product"
                        );
                    }
                }
                StockPolicy::Reject => {
                    if !self.increment(adjustment, 1, true).await? {
                        let err = self.shortfall(adjustment).await?;
                        if let Err(release_err) = self.release(&adjustments[..index]).await {
                            tracing::error!(
                                error = %release_err,
                                "failed to compensate partial stock adjustment"
                            );
                        }
                        return Err(err);
                    }
                }
            }
        }
        Ok(())
    }

    async fn release(&self, adjustments: &[StockAdjustment]) -> Result<()> {
        for adjustment in adjustments {
            self.increment(adjustment, -1, false).await?;
        }
        Ok(())
    }
}
