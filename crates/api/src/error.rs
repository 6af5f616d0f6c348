//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::CartError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Cart mutation error.
    Cart(CartError),
    /// Checkout error.
    Checkout(CheckoutError),
    /// Catalog or cart storage error.
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Cart(err) => (cart_status(&err), err.kind(), err.to_string()),
            ApiError::Checkout(err) => (checkout_status(&err), err.kind(), err.to_string()),
            ApiError::Store(err) => (store_status(&err), store_kind(&err), err.to_string()),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, kind, "request failed");
        }

        let body = serde_json::json!({ "error": message, "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

fn cart_status(err: &CartError) -> StatusCode {
    match err {
        CartError::InvalidQuantity { .. }
        | CartError::InsufficientStock { .. }
        | CartError::AmountOverflow { .. }
        | CartError::EmptyCart => StatusCode::BAD_REQUEST,
        CartError::ProductNotFound(_) | CartError::CartNotFound(_) | CartError::LineNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        CartError::ConcurrentModification { .. } => StatusCode::CONFLICT,
        CartError::StoreUnavailable(store_err) => store_status(store_err),
    }
}

fn checkout_status(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::CartNotFound(_) | CheckoutError::ProductNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        CheckoutError::StoreUnavailable(store_err) => store_status(store_err),
    }
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::ConcurrencyConflict { .. } | StoreError::DuplicateOwner(_) => {
            StatusCode::CONFLICT
        }
        StoreError::InvalidProduct { .. } => StatusCode::BAD_REQUEST,
        StoreError::Unavailable(_) | StoreError::Database(_) | StoreError::Migration(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

fn store_kind(err: &StoreError) -> &'static str {
    match err {
        StoreError::ConcurrencyConflict { .. } | StoreError::DuplicateOwner(_) => "conflict",
        StoreError::InvalidProduct { .. } => "invalid_product",
        _ => "store_unavailable",
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ApiError::Cart(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
