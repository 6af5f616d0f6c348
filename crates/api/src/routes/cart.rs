//! Cart mutation and checkout endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::CheckoutOutcome;
use common::{CartId, Money, OwnerId};
use domain::{Cart, LineRequest};
use serde::{Deserialize, Serialize};
use store::{CartLine, CartRepository, ProductCatalog};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CartLinesRequest {
    pub user_id: OwnerId,
    pub products: Vec<LineRequest>,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub cart_id: CartId,
    pub user_id: OwnerId,
    pub products: Vec<CartLine>,
    pub total_cents: i64,
    pub total: String,
    pub version: i64,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        let total: Money = cart.total();
        let version = cart.version().as_i64();
        let record = cart.into_record();
        Self {
            cart_id: record.id,
            user_id: record.owner_id,
            products: record.lines,
            total_cents: total.cents(),
            total: total.to_string(),
            version,
        }
    }
}

// -- Handlers --

/// POST /cart/add-to-cart — add lines to the user's cart.
#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id))]
pub async fn add<C, R>(
    State(state): State<Arc<AppState<C, R>>>,
    Json(req): Json<CartLinesRequest>,
) -> Result<Json<CartResponse>, ApiError>
where
    C: ProductCatalog + 'static,
    R: CartRepository + 'static,
{
    let cart = state.cart_service.add_lines(req.user_id, req.products).await?;
    Ok(Json(cart.into()))
}

/// PATCH /cart/remove-from-cart — remove lines from the user's cart.
#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id))]
pub async fn remove<C, R>(
    State(state): State<Arc<AppState<C, R>>>,
    Json(req): Json<CartLinesRequest>,
) -> Result<Json<CartResponse>, ApiError>
where
    C: ProductCatalog + 'static,
    R: CartRepository + 'static,
{
    let cart = state
        .cart_service
        .remove_lines(req.user_id, req.products)
        .await?;
    Ok(Json(cart.into()))
}

/// GET /cart/{user_id} — get the user's cart.
#[tracing::instrument(skip(state))]
pub async fn get<C, R>(
    State(state): State<Arc<AppState<C, R>>>,
    Path(user_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError>
where
    C: ProductCatalog + 'static,
    R: CartRepository + 'static,
{
    let owner_id = parse_uuid(&user_id, "user_id").map(OwnerId::from_uuid)?;
    let cart = state
        .cart_service
        .get_cart(owner_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No cart for user {owner_id}")))?;
    Ok(Json(cart.into()))
}

/// POST /cart/checkout/{cart_id} — check out a cart.
///
/// Responds 200 with the receipt, or 409 listing the short lines.
#[tracing::instrument(skip(state))]
pub async fn checkout<C, R>(
    State(state): State<Arc<AppState<C, R>>>,
    Path(cart_id): Path<String>,
) -> Result<(StatusCode, Json<CheckoutOutcome>), ApiError>
where
    C: ProductCatalog + 'static,
    R: CartRepository + 'static,
{
    let cart_id = parse_uuid(&cart_id, "cart_id").map(CartId::from_uuid)?;
    let outcome = state.checkout.checkout(cart_id).await?;

    let status = if outcome.is_completed() {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };
    Ok((status, Json(outcome)))
}

fn parse_uuid(value: &str, field: &str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(value).map_err(|e| ApiError::BadRequest(format!("Invalid {field}: {e}")))
}
