//! Generic CRUD handlers over any [`Entity`]
//!
//! One [`CrudDescriptor`] per exposed entity binds these handlers to a
//! store, the entity's route policies and its routing options. The
//! [`EntityRegistry`] collects the descriptors of the whole API.

use crate::config::EntityPolicies;
use crate::core::auth::{Auth, AuthContext, Role};
use crate::core::query::{self, Filter, QueryDefaults, QueryParams};
use crate::core::service::{PROTECTED_FIELDS, Page, find_page};
use crate::core::{DataService, Entity, JsonBody, Result, ShopError};
use crate::integrations::ImagePipeline;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Nesting of an entity under a parent resource
#[derive(Debug, Clone, Copy)]
pub struct ParentScope {
    /// Plural of the parent resource (`categories`)
    pub plural: &'static str,
    /// Field of the child holding the parent id (`category`)
    pub field: &'static str,
}

/// Per-entity routing options
#[derive(Debug, Clone, Copy, Default)]
pub struct CrudOptions {
    /// Adds `GET|POST /{parent}/{id}/{plural}` scoped to the parent
    pub parent: Option<ParentScope>,
    /// Set to the caller's id on create; plain users may only change their own
    pub owner_field: Option<&'static str>,
    /// Adds `PUT /{plural}/{id}/image`, storing the URL in this field
    pub image_field: Option<&'static str>,
}

/// State shared by the CRUD handlers of one entity
pub struct CrudState<T: Entity> {
    pub service: Arc<dyn DataService<T>>,
    pub policies: Arc<EntityPolicies>,
    pub defaults: QueryDefaults,
    pub images: ImagePipeline,
    pub options: CrudOptions,
}

impl<T: Entity> Clone for CrudState<T> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            policies: self.policies.clone(),
            defaults: self.defaults,
            images: self.images.clone(),
            options: self.options,
        }
    }
}

impl<T: Entity> CrudState<T> {
    /// Build a new entity from a request body.
    ///
    /// Store-managed fields in the body are ignored; the parent and owner
    /// fields are filled from the route and the caller.
    fn new_entity(&self, body: Value, ctx: &AuthContext, parent: Option<Uuid>) -> Result<T> {
        let mut fields = into_object(body)?;
        for field in PROTECTED_FIELDS {
            fields.remove(field);
        }
        if let (Some(scope), Some(parent)) = (self.options.parent, parent) {
            fields.insert(scope.field.to_string(), json!(parent));
        }
        if let Some(owner) = self.options.owner_field {
            fields.insert(owner.to_string(), json!(ctx.require_user()?));
        }

        let now = json!(Utc::now());
        fields.insert("id".into(), json!(Uuid::new_v4()));
        fields.insert("created_at".into(), now.clone());
        fields.insert("updated_at".into(), now);
        fields.insert("version".into(), json!(0));

        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    /// Plain users may only change documents they own
    async fn check_owner(&self, ctx: &AuthContext, id: &Uuid) -> Result<T> {
        let entity = self.service.get(id).await?;
        let Some(owner_field) = self.options.owner_field else {
            return Ok(entity);
        };
        if ctx.role() != Some(Role::User) {
            return Ok(entity);
        }

        let user = ctx.require_user()?.to_string();
        let document = serde_json::to_value(&entity)?;
        if query::lookup(&document, owner_field).and_then(Value::as_str) != Some(user.as_str()) {
            return Err(ShopError::Forbidden(format!(
                "you can only change your own {}",
                T::resource_name_singular()
            )));
        }
        Ok(entity)
    }
}

fn into_object(body: Value) -> Result<Map<String, Value>> {
    match body {
        Value::Object(fields) => Ok(fields),
        _ => Err(ShopError::Validation("request body must be a JSON object".into())),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /{plural}`
pub async fn list_entities<T: Entity>(
    State(state): State<CrudState<T>>,
    Auth(ctx): Auth,
    Query(params): Query<QueryParams>,
) -> Result<Json<Page>> {
    state.policies.list.enforce(&ctx)?;
    let page = find_page(state.service.as_ref(), Filter::all(), &params, &state.defaults).await?;
    Ok(Json(page))
}

/// `GET /{parent}/{id}/{plural}`
pub async fn list_children<T: Entity>(
    State(state): State<CrudState<T>>,
    Auth(ctx): Auth,
    Path(parent_id): Path<Uuid>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Page>> {
    state.policies.list.enforce(&ctx)?;
    let base = match state.options.parent {
        Some(scope) => Filter::by(scope.field, parent_id.to_string()),
        None => Filter::all(),
    };
    let page = find_page(state.service.as_ref(), base, &params, &state.defaults).await?;
    Ok(Json(page))
}

/// `GET /{plural}/{id}`
pub async fn get_entity<T: Entity>(
    State(state): State<CrudState<T>>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
) -> Result<Json<T>> {
    state.policies.get.enforce(&ctx)?;
    Ok(Json(state.service.get(&id).await?))
}

/// `POST /{plural}`
pub async fn create_entity<T: Entity>(
    State(state): State<CrudState<T>>,
    Auth(ctx): Auth,
    JsonBody(body): JsonBody<Value>,
) -> Result<(StatusCode, Json<T>)> {
    state.policies.create.enforce(&ctx)?;
    let entity = state.new_entity(body, &ctx, None)?;
    let created = state.service.create(entity).await?;

    tracing::info!(entity = T::resource_name_singular(), id = %created.id(), "entity created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// `POST /{parent}/{id}/{plural}`
pub async fn create_child<T: Entity>(
    State(state): State<CrudState<T>>,
    Auth(ctx): Auth,
    Path(parent_id): Path<Uuid>,
    JsonBody(body): JsonBody<Value>,
) -> Result<(StatusCode, Json<T>)> {
    state.policies.create.enforce(&ctx)?;
    let entity = state.new_entity(body, &ctx, Some(parent_id))?;
    let created = state.service.create(entity).await?;

    tracing::info!(
        entity = T::resource_name_singular(),
        id = %created.id(),
        parent = %parent_id,
        "entity created"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

/// `PUT /{plural}/{id}`: merge the body's top-level fields into the document
pub async fn update_entity<T: Entity>(
    State(state): State<CrudState<T>>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<Value>,
) -> Result<Json<T>> {
    state.policies.update.enforce(&ctx)?;
    state.check_owner(&ctx, &id).await?;

    let mut patch = into_object(body)?;
    if let Some(owner) = state.options.owner_field {
        patch.remove(owner);
    }
    let updated = state.service.find_by_id_and_update(&id, Value::Object(patch)).await?;

    tracing::info!(entity = T::resource_name_singular(), id = %id, "entity updated");
    Ok(Json(updated))
}

/// `DELETE /{plural}/{id}`: stored images go first; failing to remove them
/// keeps the document
pub async fn delete_entity<T: Entity>(
    State(state): State<CrudState<T>>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.policies.delete.enforce(&ctx)?;
    let entity = state.check_owner(&ctx, &id).await?;

    state.images.delete_all(T::image_folder(), &entity.image_urls()).await?;
    state.service.find_by_id_and_delete(&id).await?;

    tracing::info!(entity = T::resource_name_singular(), id = %id, "entity deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /{plural}/{id}/image`: raw image bytes replace the current image
pub async fn upload_image<T: Entity>(
    State(state): State<CrudState<T>>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<T>> {
    state.policies.update.enforce(&ctx)?;
    let field = state
        .options
        .image_field
        .ok_or_else(|| ShopError::Internal(format!("{} has no image field", T::resource_name())))?;

    let entity = state.service.get(&id).await?;
    let previous = entity.image_urls().into_iter().next();
    let url = state
        .images
        .replace(T::resource_name_singular(), T::image_folder(), previous.as_deref(), body.to_vec())
        .await?;

    let updated = state.service.find_by_id_and_update(&id, json!({ field: url })).await?;
    Ok(Json(updated))
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Routes for one entity type
pub struct CrudDescriptor<T: Entity> {
    state: CrudState<T>,
}

impl<T: Entity> CrudDescriptor<T> {
    pub fn new(
        service: Arc<dyn DataService<T>>,
        policies: EntityPolicies,
        defaults: QueryDefaults,
        images: ImagePipeline,
    ) -> Self {
        Self {
            state: CrudState {
                service,
                policies: Arc::new(policies),
                defaults,
                images,
                options: CrudOptions::default(),
            },
        }
    }

    pub fn nested_under(mut self, plural: &'static str, field: &'static str) -> Self {
        self.state.options.parent = Some(ParentScope { plural, field });
        self
    }

    pub fn owned_by(mut self, field: &'static str) -> Self {
        self.state.options.owner_field = Some(field);
        self
    }

    pub fn with_image(mut self, field: &'static str) -> Self {
        self.state.options.image_field = Some(field);
        self
    }
}

/// Route surface of one exposed entity type
pub trait EntityDescriptor: Send + Sync {
    /// Collection segment the routes live under (`products`)
    fn collection(&self) -> &'static str;

    /// Parent collection the entity is also served under, if any
    fn parent(&self) -> Option<ParentScope>;

    fn build_routes(&self) -> Router;
}

impl<T: Entity> EntityDescriptor for CrudDescriptor<T> {
    fn collection(&self) -> &'static str {
        T::resource_name()
    }

    fn parent(&self) -> Option<ParentScope> {
        self.state.options.parent
    }

    fn build_routes(&self) -> Router {
        let plural = T::resource_name();
        let mut router = Router::new()
            .route(
                &format!("/{}", plural),
                get(list_entities::<T>).post(create_entity::<T>),
            )
            .route(
                &format!("/{}/{{id}}", plural),
                get(get_entity::<T>).put(update_entity::<T>).delete(delete_entity::<T>),
            );

        if let Some(parent) = self.state.options.parent {
            router = router.route(
                &format!("/{}/{{id}}/{}", parent.plural, plural),
                get(list_children::<T>).post(create_child::<T>),
            );
        }
        if self.state.options.image_field.is_some() {
            router = router.route(&format!("/{}/{{id}}/image", plural), put(upload_image::<T>));
        }

        router.with_state(self.state.clone())
    }
}

/// CRUD descriptors of the API, keyed by collection
///
/// A collection is served by one descriptor only; registering it again
/// replaces the earlier one, which keeps axum from seeing duplicate routes.
#[derive(Default)]
pub struct EntityRegistry {
    descriptors: BTreeMap<&'static str, Box<dyn EntityDescriptor>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: Box<dyn EntityDescriptor>) {
        let collection = descriptor.collection();
        if self.descriptors.insert(collection, descriptor).is_some() {
            tracing::debug!(collection, "crud descriptor replaced");
        }
    }

    /// Builder-style [`register`](Self::register)
    pub fn with<T: Entity>(mut self, descriptor: CrudDescriptor<T>) -> Self {
        self.register(Box::new(descriptor));
        self
    }

    /// Registered collections, sorted
    pub fn collections(&self) -> Vec<&'static str> {
        self.descriptors.keys().copied().collect()
    }

    /// `(parent, child)` pairs served as nested collections
    pub fn nested_collections(&self) -> Vec<(&'static str, &'static str)> {
        self.descriptors
            .values()
            .filter_map(|d| d.parent().map(|parent| (parent.plural, d.collection())))
            .collect()
    }

    pub fn build_routes(&self) -> Router {
        self.descriptors
            .values()
            .fold(Router::new(), |router, d| router.merge(d.build_routes()))
    }
}
