//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions. The session id
//! is the opaque token handed to API clients at login and registration.

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "marketstall_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session store backed by the application pool.
///
/// Its tables are created by `PostgresStore::migrate`, which the CLI
/// `migrate` command runs alongside the schema migrations.
#[must_use]
pub fn create_session_store(pool: &PgPool) -> PostgresStore {
    PostgresStore::new(pool.clone())
}

/// Create the session layer with `PostgreSQL` store.
///
/// # Arguments
///
/// * `pool` - `PostgreSQL` connection pool
/// * `config` - Storefront configuration (for the cookie `Secure` flag)
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &StorefrontConfig,
) -> SessionManagerLayer<PostgresStore> {
    SessionManagerLayer::new(create_session_store(pool))
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Let API clients present the session token as `Authorization: Bearer <token>`.
///
/// Requests that already carry the session cookie are left alone. Must sit
/// outside the session layer so the injected cookie is seen by it.
pub async fn bearer_session_middleware(mut request: Request, next: Next) -> Response {
    if let Some(cookie) = bearer_as_cookie(request.headers()) {
        request.headers_mut().append(header::COOKIE, cookie);
    }
    next.run(request).await
}

/// Build a session cookie header from a bearer token, if one applies.
fn bearer_as_cookie(headers: &HeaderMap) -> Option<HeaderValue> {
    let cookie_prefix = format!("{SESSION_COOKIE_NAME}=");
    let has_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .any(|pair| pair.trim_start().starts_with(&cookie_prefix));
    if has_cookie {
        return None;
    }

    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = auth
        .strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("Token "))?
        .trim();
    if token.is_empty()
        || !token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return None;
    }

    HeaderValue::from_str(&format!("{cookie_prefix}{token}")).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn headers(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_bearer_token_becomes_cookie() {
        let cookie = bearer_as_cookie(&headers(&[(header::AUTHORIZATION, "Bearer abc_DEF-123")]));
        assert_eq!(cookie.unwrap(), "marketstall_session=abc_DEF-123");

        let cookie = bearer_as_cookie(&headers(&[(header::AUTHORIZATION, "Token xyz")]));
        assert_eq!(cookie.unwrap(), "marketstall_session=xyz");
    }

    #[test]
    fn test_existing_cookie_wins() {
        let map = headers(&[
            (header::COOKIE, "theme=dark; marketstall_session=real"),
            (header::AUTHORIZATION, "Bearer other"),
        ]);
        assert!(bearer_as_cookie(&map).is_none());
    }

    #[test]
    fn test_malformed_authorization_is_ignored() {
        assert!(bearer_as_cookie(&headers(&[(header::AUTHORIZATION, "Basic dXNlcg==")])).is_none());
        assert!(bearer_as_cookie(&headers(&[(header::AUTHORIZATION, "Bearer a;b")])).is_none());
        assert!(bearer_as_cookie(&headers(&[(header::AUTHORIZATION, "Bearer ")])).is_none());
        assert!(bearer_as_cookie(&HeaderMap::new()).is_none());
    }
}
