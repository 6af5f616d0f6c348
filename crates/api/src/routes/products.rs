//! Catalog seeding and inspection endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Money, ProductId};
use serde::Deserialize;
use store::{CartRepository, Product, ProductCatalog};

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub stock: u32,
}

/// POST /products — insert or replace a product.
#[tracing::instrument(skip(state, req), fields(product_id = %req.id))]
pub async fn upsert<C, R>(
    State(state): State<Arc<AppState<C, R>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError>
where
    C: ProductCatalog + 'static,
    R: CartRepository + 'static,
{
    if req.id.trim().is_empty() {
        return Err(ApiError::BadRequest("Product id must not be empty".to_string()));
    }

    let product = Product::new(req.id, req.name, Money::from_cents(req.price_cents), req.stock);
    state.catalog.save(product.clone()).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products/{id} — get a product with its current stock.
#[tracing::instrument(skip(state))]
pub async fn get<C, R>(
    State(state): State<Arc<AppState<C, R>>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError>
where
    C: ProductCatalog + 'static,
    R: CartRepository + 'static,
{
    let product_id = ProductId::new(id);
    let product = state
        .catalog
        .find_by_id(&product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {product_id} not found")))?;
    Ok(Json(product))
}
