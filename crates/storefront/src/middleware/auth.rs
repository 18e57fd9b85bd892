//! Authentication extractors and session helpers.
//!
//! The signed-in user lives in the session under [`keys::CURRENT_USER`].
//! Handlers take [`RequireAuth`] to get the acting user or a 401.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use marketstall_core::cart::GuestCart;

use crate::error::AppError;
use crate::models::session::{CurrentUser, keys};

/// Extractor that requires an authenticated user.
///
/// Rejects with a JSON 401 when no user is signed in.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ok(OptionalAuth(user)) = OptionalAuth::from_request_parts(parts, state).await;

        user.map(Self).ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided.".to_string())
        })
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is signed in.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentUser>(keys::CURRENT_USER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(user))
    }
}

/// Sign a user into the session.
///
/// Cycles the session id first so a pre-login id cannot be reused, drops any
/// parked guest cart (it has been merged by now), then saves immediately so
/// the returned token is already valid.
///
/// # Errors
///
/// Returns an error if the session cannot be modified or persisted.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(keys::CURRENT_USER, user).await?;
    session.remove_value(keys::GUEST_CART).await?;
    session.save().await
}

/// The session id, used as the client's bearer token.
#[must_use]
pub fn session_token(session: &Session) -> Option<String> {
    session.id().map(|id| id.to_string())
}

/// Read the guest cart parked in the session, leaving it in place.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn guest_cart(
    session: &Session,
) -> Result<Option<GuestCart>, tower_sessions::session::Error> {
    session.get::<GuestCart>(keys::GUEST_CART).await
}

/// Park a guest cart in the session, replacing any earlier one.
///
/// Saves immediately so a new session has an id to hand back as a token.
///
/// # Errors
///
/// Returns an error if the session cannot be modified or persisted.
pub async fn park_guest_cart(
    session: &Session,
    cart: &GuestCart,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(keys::GUEST_CART, cart).await?;
    session.save().await
}

/// Remove and return any guest cart parked in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be read or modified.
pub async fn take_guest_cart(
    session: &Session,
) -> Result<Option<GuestCart>, tower_sessions::session::Error> {
    session.remove::<GuestCart>(keys::GUEST_CART).await
}

/// Clear the current user and destroy the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<CurrentUser>(keys::CURRENT_USER).await?;
    session.flush().await
}
