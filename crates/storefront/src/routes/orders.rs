//! Order route handlers: history, checkout, and cancellation.

use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use marketstall_core::{AddressId, OrderId, OrderItemId, OrderStatus, PaymentMethod};

use crate::error::{AppError, Result};
use crate::extract::{ValidJson, ValidPath};
use crate::middleware::RequireAuth;
use crate::models::order::{CreateOrderInput, OrderWithItems, ShippingAddress, ShippingSource};
use crate::services::orders::OrderService;
use crate::state::AppState;

// =============================================================================
// Request / Response Types
// =============================================================================

/// Body of `POST /api/orders`.
///
/// An inline `shipping_address` wins over `address_id`; with neither, the
/// user's default address is used.
#[derive(Debug, Default, Deserialize)]
pub struct CreateOrderRequest {
    pub payment_method: Option<String>,
    pub shipping_address: Option<ShippingAddress>,
    pub address_id: Option<AddressId>,
}

impl TryFrom<CreateOrderRequest> for CreateOrderInput {
    type Error = AppError;

    fn try_from(req: CreateOrderRequest) -> Result<Self> {
        let payment_method = match req.payment_method.as_deref().map(str::trim) {
            None | Some("") => PaymentMethod::default(),
            Some(method) => method.parse().map_err(AppError::Validation)?,
        };

        let shipping = match (req.shipping_address, req.address_id) {
            (Some(address), _) => ShippingSource::Provided(address),
            (None, Some(id)) => ShippingSource::Saved(id),
            (None, None) => ShippingSource::Default,
        };

        Ok(Self {
            payment_method,
            shipping,
        })
    }
}

/// Body of `POST /api/orders/{id}/cancel-item`.
#[derive(Debug, Deserialize)]
pub struct CancelItemRequest {
    pub item_id: Option<OrderItemId>,
}

/// Response to a whole-order cancellation.
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub status: OrderStatus,
}

/// Response to a single-line cancellation.
#[derive(Debug, Serialize)]
pub struct CancelItemResponse {
    pub status: &'static str,
    pub order_status: OrderStatus,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/orders
///
/// # Errors
///
/// Returns 401 when signed out.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<OrderWithItems>>> {
    let orders = OrderService::new(state.pool()).list(user.id).await?;
    Ok(Json(orders))
}

/// GET /api/orders/{id}
///
/// # Errors
///
/// Returns 404 if the order is not the user's.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidPath(order_id): ValidPath<OrderId>,
) -> Result<Json<OrderWithItems>> {
    let order = OrderService::new(state.pool()).get(user.id, order_id).await?;
    Ok(Json(order))
}

/// POST /api/orders
///
/// Checks out the user's cart; responds 201 with the order and its lines.
///
/// # Errors
///
/// Returns 400 for an empty cart, insufficient stock, or no usable shipping address.
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    body: Bytes,
) -> Result<(StatusCode, Json<OrderWithItems>)> {
    let input = CreateOrderInput::try_from(parse_create_body(&body)?)?;
    let order = OrderService::new(state.pool()).create(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// An empty checkout body means "all defaults".
fn parse_create_body(body: &[u8]) -> Result<CreateOrderRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CreateOrderRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::Validation(e.to_string()))
}

/// POST /api/orders/{id}/cancel
///
/// # Errors
///
/// Returns 404 if the order is not the user's, 400 if it cannot be canceled.
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidPath(order_id): ValidPath<OrderId>,
) -> Result<Json<CancelResponse>> {
    let order = OrderService::new(state.pool())
        .cancel(user.id, order_id)
        .await?;
    Ok(Json(CancelResponse {
        status: order.status,
    }))
}

/// POST /api/orders/{id}/cancel-item
///
/// # Errors
///
/// Returns 400 without an `item_id`, 404 if the order or line is unknown.
pub async fn cancel_item(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidPath(order_id): ValidPath<OrderId>,
    ValidJson(req): ValidJson<CancelItemRequest>,
) -> Result<Json<CancelItemResponse>> {
    let item_id = req
        .item_id
        .ok_or_else(|| AppError::Validation("Item ID is required".to_string()))?;
    let outcome = OrderService::new(state.pool())
        .cancel_item(user.id, order_id, item_id)
        .await?;
    Ok(Json(CancelItemResponse {
        status: "item canceled",
        order_status: outcome.order_status,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(body: serde_json::Value) -> Result<CreateOrderInput> {
        let req: CreateOrderRequest = serde_json::from_value(body).unwrap();
        CreateOrderInput::try_from(req)
    }

    #[test]
    fn test_empty_request_uses_defaults() {
        let input = parse(json!({})).unwrap();
        assert_eq!(input.payment_method, PaymentMethod::Card);
        assert_eq!(input.shipping, ShippingSource::Default);
    }

    #[test]
    fn test_inline_address_wins_over_saved() {
        let input = parse(json!({
            "payment_method": "bank_transfer",
            "address_id": 3,
            "shipping_address": {
                "name": "Ann Lee",
                "line1": "1 Main St",
                "city": "Springfield",
                "postal_code": "12345",
                "country": "US"
            }
        }))
        .unwrap();
        assert_eq!(input.payment_method, PaymentMethod::BankTransfer);
        assert!(matches!(input.shipping, ShippingSource::Provided(a) if a.city == "Springfield"));
    }

    #[test]
    fn test_saved_address_id() {
        let input = parse(json!({ "address_id": 3 })).unwrap();
        assert_eq!(input.shipping, ShippingSource::Saved(AddressId::new(3)));
    }

    #[test]
    fn test_empty_body_is_allowed() {
        let req = parse_create_body(b"").unwrap();
        assert!(req.payment_method.is_none());
        assert!(parse_create_body(b"{bad").is_err());
    }

    #[test]
    fn test_unknown_payment_method_is_rejected() {
        assert!(matches!(
            parse(json!({ "payment_method": "barter" })),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_cancel_item_response_shape() {
        let body = serde_json::to_value(CancelItemResponse {
            status: "item canceled",
            order_status: OrderStatus::Pending,
        })
        .unwrap();
        assert_eq!(body, json!({ "status": "item canceled", "order_status": "pending" }));
    }
}
