//! Cart route handlers.
//!
//! Most handlers act on the signed-in user's persisted cart. Request bodies
//! are validated into [`AddToCartInput`] / [`QuantityInput`] /
//! [`CartMergeRequest`] before the service is called.
//!
//! The `guest` handlers are for signed-out clients: they park a cart in the
//! session, which login and registration later fold into the persisted cart.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_sessions::Session;

use marketstall_core::cart::GuestCart;
use marketstall_core::{ProductId, Quantity, RawQuantity};

use crate::error::{AppError, Result};
use crate::extract::ValidJson;
use crate::middleware::{OptionalAuth, RequireAuth, guest_cart, park_guest_cart, session_token};
use crate::models::cart::{Cart, CartLine, QuantityUpdate};
use crate::services::cart::CartService;
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

/// Body of `POST /api/cart/add`.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: Option<ProductId>,
    pub quantity: Option<RawQuantity>,
}

/// Body of `POST /api/cart/remove`.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartRequest {
    pub product_id: Option<ProductId>,
}

/// Body of `POST /api/cart/update-quantity`.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub product_id: Option<ProductId>,
    pub quantity: Option<RawQuantity>,
}

/// Body of `POST /api/cart/merge`.
///
/// `items` is kept as raw JSON so a non-array can be reported as a 400
/// while malformed elements inside an array are skipped.
#[derive(Debug, Deserialize)]
pub struct CartMergeRequest {
    pub items: Option<Value>,
}

/// Validated add-to-cart input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddToCartInput {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

impl TryFrom<AddToCartRequest> for AddToCartInput {
    type Error = AppError;

    fn try_from(req: AddToCartRequest) -> Result<Self> {
        let product_id = require_product(req.product_id)?;
        let quantity = match req.quantity {
            Some(raw) => raw
                .positive()
                .map_err(|e| AppError::Validation(e.to_string()))?,
            None => Quantity::ONE,
        };
        Ok(Self {
            product_id,
            quantity,
        })
    }
}

/// Validated quantity update; `quantity` is `None` when the line should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantityInput {
    pub product_id: ProductId,
    pub quantity: Option<Quantity>,
}

impl TryFrom<UpdateQuantityRequest> for QuantityInput {
    type Error = AppError;

    fn try_from(req: UpdateQuantityRequest) -> Result<Self> {
        let (Some(product_id), Some(raw)) = (req.product_id, req.quantity) else {
            return Err(AppError::Validation(
                "product_id and quantity are required".to_string(),
            ));
        };
        let quantity = raw
            .non_negative()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        Ok(Self {
            product_id,
            quantity,
        })
    }
}

impl TryFrom<CartMergeRequest> for GuestCart {
    type Error = AppError;

    fn try_from(req: CartMergeRequest) -> Result<Self> {
        match req.items {
            Some(Value::Array(items)) => Ok(Self::new(items)),
            _ => Err(AppError::Validation("items must be a list".to_string())),
        }
    }
}

fn require_product(product_id: Option<ProductId>) -> Result<ProductId> {
    product_id.ok_or_else(|| AppError::Validation("product_id is required".to_string()))
}

/// Response for an update that removed the line.
#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub detail: &'static str,
}

/// The guest cart held in the session.
#[derive(Debug, Serialize)]
pub struct GuestCartResponse {
    /// Session token once the session has been saved.
    pub token: Option<String>,
    pub items: GuestCart,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/cart
///
/// # Errors
///
/// Returns 401 when signed out.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Cart>> {
    let cart = CartService::new(state.pool()).list(user.id).await?;
    Ok(Json(cart))
}

/// POST /api/cart/add
///
/// Adds to an existing line or creates one; responds 201 with the line.
///
/// # Errors
///
/// Returns 400 for a missing product id or bad quantity, 404 for an unknown product.
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidJson(req): ValidJson<AddToCartRequest>,
) -> Result<(StatusCode, Json<CartLine>)> {
    let input = AddToCartInput::try_from(req)?;
    let line = CartService::new(state.pool())
        .add(user.id, input.product_id, input.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(line)))
}

/// POST /api/cart/remove
///
/// # Errors
///
/// Returns 404 if the product is not in the cart.
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidJson(req): ValidJson<RemoveFromCartRequest>,
) -> Result<Json<DetailResponse>> {
    let product_id = require_product(req.product_id)?;
    CartService::new(state.pool())
        .remove(user.id, product_id)
        .await?;
    Ok(Json(DetailResponse {
        detail: "Item removed from cart.",
    }))
}

/// POST /api/cart/update-quantity
///
/// Sets (not increments) the quantity; zero removes the line.
///
/// # Errors
///
/// Returns 400 for missing fields or a negative quantity, 404 if the line is absent.
pub async fn update_quantity(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidJson(req): ValidJson<UpdateQuantityRequest>,
) -> Result<Json<Value>> {
    let input = QuantityInput::try_from(req)?;
    let outcome = CartService::new(state.pool())
        .update_quantity(user.id, input.product_id, input.quantity)
        .await?;

    let body = match outcome {
        QuantityUpdate::Updated(line) => serde_json::to_value(line)
            .map_err(|e| AppError::Internal(format!("serialize cart line: {e}")))?,
        QuantityUpdate::Removed => serde_json::json!({ "detail": "Item removed from cart." }),
    };
    Ok(Json(body))
}

/// POST /api/cart/merge
///
/// Folds a guest cart into the user's cart and returns the merged contents.
///
/// # Errors
///
/// Returns 400 if `items` is missing or not a list.
pub async fn merge(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidJson(req): ValidJson<CartMergeRequest>,
) -> Result<Json<Cart>> {
    let guest = GuestCart::try_from(req)?;
    let cart = CartService::new(state.pool())
        .merge(user.id, &guest)
        .await?;
    Ok(Json(cart))
}

/// POST /api/cart/clear
///
/// # Errors
///
/// Returns 500 if the delete fails.
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<DetailResponse>> {
    CartService::new(state.pool()).clear(user.id).await?;
    Ok(Json(DetailResponse {
        detail: "Cart cleared.",
    }))
}

/// GET /api/cart/guest
///
/// # Errors
///
/// Returns 500 if the session cannot be read.
pub async fn show_guest(session: Session) -> Result<Json<GuestCartResponse>> {
    let items = guest_cart(&session).await?.unwrap_or_default();
    Ok(Json(GuestCartResponse {
        token: session_token(&session),
        items,
    }))
}

/// PUT /api/cart/guest
///
/// Replaces the session's guest cart. Elements are kept as sent; they are
/// validated when merged at sign-in.
///
/// # Errors
///
/// Returns 400 if `items` is not a list or the caller is signed in.
pub async fn park_guest(
    session: Session,
    OptionalAuth(user): OptionalAuth,
    ValidJson(req): ValidJson<CartMergeRequest>,
) -> Result<Json<GuestCartResponse>> {
    if user.is_some() {
        return Err(AppError::Conflict(
            "Already signed in; use /api/cart/merge.".to_string(),
        ));
    }

    let items = GuestCart::try_from(req)?;
    park_guest_cart(&session, &items).await?;

    Ok(Json(GuestCartResponse {
        token: session_token(&session),
        items,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn add_request(body: Value) -> AddToCartRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_add_defaults_quantity_to_one() {
        let input = AddToCartInput::try_from(add_request(json!({ "product_id": 4 }))).unwrap();
        assert_eq!(input.product_id, ProductId::new(4));
        assert_eq!(input.quantity, Quantity::ONE);
    }

    #[test]
    fn test_add_accepts_integer_strings() {
        let input =
            AddToCartInput::try_from(add_request(json!({ "product_id": 4, "quantity": "3" })))
                .unwrap();
        assert_eq!(input.quantity.get(), 3);
    }

    #[test]
    fn test_add_rejects_bad_quantities() {
        for quantity in [json!(0), json!(-2), json!("abc"), json!(1.5), json!(true)] {
            let result =
                AddToCartInput::try_from(add_request(json!({ "product_id": 4, "quantity": quantity })));
            assert!(matches!(result, Err(AppError::Validation(_))));
        }
    }

    #[test]
    fn test_add_requires_product() {
        let result = AddToCartInput::try_from(add_request(json!({ "quantity": 2 })));
        assert!(matches!(
            result,
            Err(AppError::Validation(msg)) if msg == "product_id is required"
        ));
    }

    #[test]
    fn test_update_quantity_zero_means_remove() {
        let req: UpdateQuantityRequest =
            serde_json::from_value(json!({ "product_id": 1, "quantity": 0 })).unwrap();
        let input = QuantityInput::try_from(req).unwrap();
        assert_eq!(input.quantity, None);
    }

    #[test]
    fn test_update_quantity_validation() {
        let negative: UpdateQuantityRequest =
            serde_json::from_value(json!({ "product_id": 1, "quantity": -1 })).unwrap();
        assert!(QuantityInput::try_from(negative).is_err());

        let missing: UpdateQuantityRequest =
            serde_json::from_value(json!({ "product_id": 1 })).unwrap();
        assert!(QuantityInput::try_from(missing).is_err());
    }

    mod guest {
        use axum::{
            Router,
            body::{Body, to_bytes},
            http::{Request, header},
            routing::get,
        };
        use tower::ServiceExt;
        use tower_sessions::{MemoryStore, SessionManagerLayer};

        use super::*;

        fn app() -> Router {
            Router::new()
                .route("/guest", get(show_guest).put(park_guest))
                .layer(SessionManagerLayer::new(MemoryStore::default()))
        }

        async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
            let response = app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let cookie = response
                .headers()
                .get(header::SET_COOKIE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(';').next())
                .map(str::to_string);
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, cookie, serde_json::from_slice(&bytes).unwrap())
        }

        fn put(body: &'static str) -> Request<Body> {
            Request::put("/guest")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap()
        }

        #[tokio::test]
        async fn test_parked_cart_is_read_back_from_the_session() {
            let app = app();

            let (status, cookie, body) =
                send(&app, put(r#"{"items": [{"product": 3, "quantity": 2}]}"#)).await;
            assert_eq!(status, StatusCode::OK);
            assert!(body["token"].is_string());
            assert_eq!(body["items"], json!([{ "product": 3, "quantity": 2 }]));

            let request = Request::get("/guest")
                .header(header::COOKIE, cookie.unwrap())
                .body(Body::empty())
                .unwrap();
            let (status, _, body) = send(&app, request).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["items"][0]["quantity"], 2);
        }

        #[tokio::test]
        async fn test_fresh_session_has_empty_guest_cart() {
            let request = Request::get("/guest").body(Body::empty()).unwrap();
            let (status, _, body) = send(&app(), request).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["items"], json!([]));
            assert!(body["token"].is_null());
        }

        #[tokio::test]
        async fn test_park_rejects_non_list() {
            let (status, _, body) = send(&app(), put(r#"{"items": {"product": 3}}"#)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["detail"], "items must be a list");
        }
    }

    #[test]
    fn test_merge_requires_a_list() {
        let ok = CartMergeRequest {
            items: Some(json!([{ "product": 1, "quantity": 2 }, "junk"])),
        };
        assert_eq!(GuestCart::try_from(ok).unwrap().len(), 2);

        for items in [None, Some(json!({ "product": 1 })), Some(json!("nope"))] {
            assert!(GuestCart::try_from(CartMergeRequest { items }).is_err());
        }
    }
}
