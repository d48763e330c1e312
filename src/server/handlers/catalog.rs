//! Product gallery upload

use crate::core::auth::Auth;
use crate::core::{Entity, Result, ShopError};
use crate::entities::Product;
use crate::server::host::ServerHost;
use axum::Json;
use axum::extract::{Multipart, Path, State};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use uuid::Uuid;

/// `PUT /products/{id}/images`
///
/// Multipart fields: `image_cover` (one file) and `images` (up to three).
/// Only the kinds of image present in the request are replaced.
pub async fn upload_product_images(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<Product>> {
    host.config.policies_for(Product::resource_name()).update.enforce(&ctx)?;

    let mut cover = None;
    let mut gallery = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ShopError::Validation(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| {
            ShopError::Validation(format!("invalid multipart field '{}': {}", name, e))
        })?;
        match name.as_str() {
            "image_cover" => cover = Some(bytes.to_vec()),
            "images" => gallery.push(bytes.to_vec()),
            other => tracing::debug!(field = %other, "unexpected upload field ignored"),
        }
    }
    if cover.is_none() && gallery.is_empty() {
        return Err(ShopError::Validation("no image uploaded".into()));
    }

    let product = host.stores.products.get(&id).await?;
    let folder = Product::image_folder();
    let uploaded = host
        .images
        .store_product_images(Product::resource_name_singular(), folder, cover, gallery)
        .await?;

    let mut patch = Map::new();
    let mut replaced = Vec::new();
    if let Some(url) = uploaded.cover {
        patch.insert("image_cover".into(), Value::String(url));
        replaced.extend(product.image_cover.clone());
    }
    if !uploaded.images.is_empty() {
        patch.insert("images".into(), json!(uploaded.images));
        replaced.extend(product.images.iter().cloned());
    }

    let updated = host
        .stores
        .products
        .find_by_id_and_update(&id, Value::Object(patch))
        .await?;

    if let Err(e) = host.images.delete_all(folder, &replaced).await {
        tracing::warn!(product = %id, error = %e, "failed to delete replaced product images");
    }
    Ok(Json(updated))
}
