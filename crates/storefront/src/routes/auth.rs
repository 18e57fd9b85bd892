//! Authentication route handlers.
//!
//! Login and registration fold the client's guest cart (from the request and
//! from any cart parked in the session) into the user's persisted cart, then
//! answer with the session token, the user, and the merged cart.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::warn;

use marketstall_core::cart::GuestCart;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::extract::ValidJson;
use crate::middleware::{
    OptionalAuth, RequireAuth, clear_current_user, guest_cart, session_token, set_current_user,
    take_guest_cart,
};
use crate::models::cart::Cart;
use crate::models::session::CurrentUser;
use crate::models::user::{ProfileUpdate, User};
use crate::services::auth::{AuthService, PendingSignIn, Registration, log_failure};
use crate::state::AppState;

// =============================================================================
// Request Types
// =============================================================================

/// Body of `POST /api/auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub guest_cart: Option<GuestCart>,
}

/// Body of `POST /api/auth/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub guest_cart: Option<GuestCart>,
}

/// Body of `PATCH /api/auth/profile`.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl From<ProfileRequest> for ProfileUpdate {
    fn from(req: ProfileRequest) -> Self {
        Self {
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// A user as returned to clients.
#[derive(Debug, Serialize)]
pub struct UserBody {
    #[serde(flatten)]
    pub user: User,
    pub display_name: String,
}

impl From<User> for UserBody {
    fn from(user: User) -> Self {
        Self {
            display_name: user.display_name(),
            user,
        }
    }
}

/// Response to a successful login or registration.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    /// Session token; send back as `Authorization: Bearer <token>` or via the cookie.
    pub token: String,
    pub user: UserBody,
    pub cart: Cart,
}

/// Plain `{"detail": ...}` acknowledgement.
#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub detail: &'static str,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/auth/login
///
/// # Errors
///
/// Returns 401 for a bad email or password.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let guest = collect_guest_cart(&session, req.guest_cart).await?;

    let pending = AuthService::new(state.pool())
        .login(&req.email, &req.password, &guest)
        .await
        .inspect_err(|e| log_failure("login", &req.email, e))?;

    Ok(Json(sign_in(&session, pending).await?))
}

/// POST /api/auth/register
///
/// Responds 201 with the new user already signed in.
///
/// # Errors
///
/// Returns 400 for invalid fields, 409 if the email is taken.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let guest = collect_guest_cart(&session, req.guest_cart).await?;
    let email = req.email.clone();

    let registration = Registration {
        email: req.email,
        password: req.password,
        password_confirm: req.password_confirm,
        first_name: req.first_name,
        last_name: req.last_name,
        phone: req.phone,
    };

    let pending = AuthService::new(state.pool())
        .register(registration, &guest)
        .await
        .inspect_err(|e| log_failure("register", &email, e))?;

    Ok((StatusCode::CREATED, Json(sign_in(&session, pending).await?)))
}

/// POST /api/auth/logout
///
/// Works signed out too: the parked guest cart is always dropped, and a
/// signed-in user's persisted cart is deleted.
///
/// # Errors
///
/// Returns 500 if the cart or session cannot be cleared.
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<DetailResponse>> {
    take_guest_cart(&session).await?;

    if let Some(user) = user {
        AuthService::new(state.pool()).discard_cart(user.id).await?;
    }

    clear_current_user(&session).await?;
    clear_sentry_user();

    Ok(Json(DetailResponse {
        detail: "Logged out and cart cleared.",
    }))
}

/// GET /api/auth/profile
///
/// # Errors
///
/// Returns 401 when signed out.
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<UserBody>> {
    let user = AuthService::new(state.pool()).get_user(user.id).await?;
    Ok(Json(user.into()))
}

/// PATCH /api/auth/profile
///
/// # Errors
///
/// Returns 400 if a field is too long.
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ValidJson(req): ValidJson<ProfileRequest>,
) -> Result<Json<UserBody>> {
    let user = AuthService::new(state.pool())
        .update_profile(user.id, req.into())
        .await?;
    Ok(Json(user.into()))
}

// =============================================================================
// Helpers
// =============================================================================

/// The request's guest cart followed by any cart parked in the session.
async fn collect_guest_cart(session: &Session, submitted: Option<GuestCart>) -> Result<GuestCart> {
    let mut guest = submitted.unwrap_or_default();
    if let Some(parked) = guest_cart(session).await? {
        guest.append(parked);
    }
    Ok(guest)
}

/// Write the session, then commit the sign-in transaction.
///
/// A failed session write drops the transaction; a failed commit flushes
/// the session so no token outlives a rolled-back sign-in.
async fn sign_in(session: &Session, pending: PendingSignIn) -> Result<AuthResponse> {
    let current = CurrentUser {
        id: pending.user.id,
        email: pending.user.email.clone(),
    };
    set_current_user(session, &current).await?;

    let (user, cart) = match pending.commit().await {
        Ok(committed) => committed,
        Err(e) => {
            if let Err(flush_err) = session.flush().await {
                warn!(error = %flush_err, "Failed to flush session after rollback");
            }
            return Err(e.into());
        }
    };

    let token = session_token(session)
        .ok_or_else(|| AppError::Internal("session has no id after save".to_string()))?;

    set_sentry_user(&user.id, Some(user.email.as_str()));

    Ok(AuthResponse {
        token,
        user: user.into(),
        cart,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use marketstall_core::{Email, UserId};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_user_body_includes_display_name() {
        let now = Utc::now();
        let body = UserBody::from(User {
            id: UserId::new(9),
            email: Email::parse("ann@example.com").unwrap(),
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
            phone: None,
            created_at: now,
            updated_at: now,
        });

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["id"], 9);
        assert_eq!(value["email"], "ann@example.com");
        assert_eq!(value["display_name"], "Ann Lee");
    }

    #[test]
    fn test_register_request_defaults() {
        let req: RegisterRequest = serde_json::from_value(json!({
            "email": "a@b.co",
            "password": "hunter2hunter2"
        }))
        .unwrap();
        assert!(req.first_name.is_empty());
        assert!(req.password_confirm.is_none());
        assert!(req.guest_cart.is_none());
    }

    #[test]
    fn test_login_request_accepts_guest_cart() {
        let req: LoginRequest = serde_json::from_value(json!({
            "email": "a@b.co",
            "password": "secret-password",
            "guest_cart": [{ "product": 1, "quantity": 2 }, { "product": { "id": 2 } }]
        }))
        .unwrap();
        assert_eq!(req.guest_cart.unwrap().len(), 2);
    }

    #[test]
    fn test_guest_cart_must_be_a_list() {
        let result: std::result::Result<LoginRequest, _> = serde_json::from_value(json!({
            "email": "a@b.co",
            "password": "secret-password",
            "guest_cart": { "product": 1 }
        }));
        assert!(result.is_err());
    }
}
