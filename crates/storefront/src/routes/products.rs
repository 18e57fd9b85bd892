//! Catalog route handlers.

use axum::{Json, extract::State};

use crate::db::products;
use crate::error::Result;
use crate::models::product::Product;
use crate::state::AppState;

/// GET /api/products
///
/// Public; lists every product with its price and stock.
///
/// # Errors
///
/// Returns 500 if the query fails.
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let mut conn = state.pool().acquire().await?;
    let products = products::list(&mut conn).await?;
    Ok(Json(products))
}
