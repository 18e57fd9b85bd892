//! HTTP route handlers for the storefront JSON API.
//!
//! # Route Structure
//!
//! ```text
//! # Catalog
//! GET    /api/products                      - Product listing
//!
//! # Auth
//! POST   /api/auth/login                    - Login, merging a guest cart
//! POST   /api/auth/register                 - Register, merging a guest cart
//! POST   /api/auth/logout                   - Logout and discard the cart
//! GET    /api/auth/profile                  - Current user's profile
//! PATCH  /api/auth/profile                  - Update name / phone
//!
//! # Guest cart (signed out)
//! GET    /api/cart/guest                    - Cart parked in the session
//! PUT    /api/cart/guest                    - Park a cart for the next sign-in
//!
//! # Cart (requires auth)
//! GET    /api/cart                          - Cart contents
//! POST   /api/cart/add                      - Add or increment a line
//! POST   /api/cart/remove                   - Remove a line
//! POST   /api/cart/update-quantity          - Set a line's quantity (0 removes)
//! POST   /api/cart/merge                    - Merge a guest cart
//! POST   /api/cart/clear                    - Empty the cart
//!
//! # Orders (requires auth)
//! GET    /api/orders                        - Order history
//! POST   /api/orders                        - Checkout
//! GET    /api/orders/{id}                   - Order detail
//! POST   /api/orders/{id}/cancel            - Cancel an order
//! POST   /api/orders/{id}/cancel-item       - Cancel one line
//!
//! # Addresses (requires auth)
//! GET    /api/addresses                     - Address list
//! POST   /api/addresses                     - Create
//! GET    /api/addresses/{id}                - Detail
//! PUT    /api/addresses/{id}                - Replace
//! PATCH  /api/addresses/{id}                - Partial update
//! DELETE /api/addresses/{id}                - Delete
//! ```

pub mod addresses;
pub mod auth;
pub mod cart;
pub mod orders;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/logout", post(auth::logout))
        .route("/profile", get(auth::profile).patch(auth::update_profile))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/guest", get(cart::show_guest).put(cart::park_guest))
        .route("/add", post(cart::add))
        .route("/remove", post(cart::remove))
        .route("/update-quantity", post(cart::update_quantity))
        .route("/merge", post(cart::merge))
        .route("/clear", post(cart::clear))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/cancel-item", post(orders::cancel_item))
}

/// Create the address routes router.
pub fn address_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(addresses::index).post(addresses::create))
        .route(
            "/{id}",
            get(addresses::show)
                .put(addresses::replace)
                .patch(addresses::update)
                .delete(addresses::destroy),
        )
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new().route("/", get(products::index))
}

/// Create all `/api` routes.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .nest("/auth", auth_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .nest("/addresses", address_routes())
        .nest("/products", product_routes());

    Router::new().nest("/api", api)
}
