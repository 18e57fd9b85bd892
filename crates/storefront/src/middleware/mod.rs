//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Bearer bridge (`Authorization: Bearer` to session cookie)
//! 5. Session layer (tower-sessions with `PostgreSQL` store)

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::{
    OptionalAuth, RequireAuth, clear_current_user, guest_cart, park_guest_cart, session_token,
    set_current_user, take_guest_cart,
};
pub use request_id::request_id_middleware;
pub use session::{bearer_session_middleware, create_session_layer, create_session_store};
