//! Axum extractors that report failures as [`ShopError`]

use crate::core::error::ShopError;
use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON body deserialized into `T` and checked with `validator`
///
/// # Usage
///
/// ```rust,ignore
/// pub async fn add_address(
///     ValidatedJson(body): ValidatedJson<NewAddress>,
/// ) -> Result<Json<Vec<Address>>, ShopError> {
///     // body is already shape-checked
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ShopError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ShopError::Validation(e.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// JSON body without extra validation, rejections mapped to `Validation`
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ShopError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ShopError::Validation(e.body_text()))?;
        Ok(JsonBody(value))
    }
}
