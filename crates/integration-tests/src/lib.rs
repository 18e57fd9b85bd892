//! Shared fixtures for the Marketstall integration tests.
//!
//! # Running Tests
//!
//! ```bash
//! export MARKETSTALL_TEST_DATABASE_URL=postgres://localhost/marketstall_test
//! cargo test -p marketstall-integration-tests -- --ignored
//! ```
//!
//! Every test creates its own users and products (unique emails and names),
//! so tests can share one database and run in parallel.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use uuid::Uuid;

use marketstall_core::cart::GuestCart;
use marketstall_core::{ProductId, UserId};
use marketstall_storefront::config::{SentryConfig, StorefrontConfig};
use marketstall_storefront::db::{self, MIGRATOR, products};
use marketstall_storefront::middleware::create_session_store;
use marketstall_storefront::models::product::{NewProduct, Product};
use marketstall_storefront::services::auth::{AuthService, Registration};
use marketstall_storefront::state::AppState;

/// Password given to every fixture user.
pub const TEST_PASSWORD: &str = "correct-horse-battery";

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// Test database URL from `MARKETSTALL_TEST_DATABASE_URL`.
///
/// # Panics
///
/// Panics if the variable is not set.
#[must_use]
pub fn database_url() -> String {
    std::env::var("MARKETSTALL_TEST_DATABASE_URL")
        .expect("MARKETSTALL_TEST_DATABASE_URL must be set for integration tests")
}

/// Connect to the test database, applying migrations once per process.
///
/// # Panics
///
/// Panics if the database is unreachable or a migration fails.
pub async fn test_pool() -> PgPool {
    let pool = db::create_pool(&SecretString::from(database_url()))
        .await
        .expect("Failed to connect to test database");

    MIGRATED
        .get_or_init(|| async {
            MIGRATOR.run(&pool).await.expect("Failed to run migrations");
            create_session_store(&pool)
                .migrate()
                .await
                .expect("Failed to create session table");
        })
        .await;

    pool
}

/// A unique email for a fixture user.
#[must_use]
pub fn unique_email() -> String {
    format!("test-{}@example.com", Uuid::new_v4().simple())
}

/// Register a user with an empty guest cart and return its id.
///
/// # Panics
///
/// Panics if registration fails.
pub async fn create_user(pool: &PgPool) -> (UserId, String) {
    let email = unique_email();
    let pending = AuthService::new(pool)
        .register(
            Registration {
                email: email.clone(),
                password: TEST_PASSWORD.to_string(),
                password_confirm: None,
                first_name: "Test".to_string(),
                last_name: "Shopper".to_string(),
                phone: None,
            },
            &GuestCart::default(),
        )
        .await
        .expect("Failed to register fixture user");
    let (user, _) = pending.commit().await.expect("Failed to commit registration");
    (user.id, email)
}

/// Create a product with the given price and stock.
///
/// # Panics
///
/// Panics if the insert fails or the price does not parse.
pub async fn create_product(pool: &PgPool, price: &str, stock: i32) -> Product {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    products::create(
        &mut conn,
        &NewProduct {
            name: format!("Product {}", Uuid::new_v4().simple()),
            price: Decimal::from_str(price).expect("Invalid price"),
            stock,
        },
    )
    .await
    .expect("Failed to create fixture product")
}

/// Current stock of a product.
///
/// # Panics
///
/// Panics if the product does not exist.
pub async fn stock_of(pool: &PgPool, id: ProductId) -> i32 {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    products::get(&mut conn, id)
        .await
        .expect("Failed to load product")
        .expect("Product missing")
        .stock
}

/// Serve the full application on an ephemeral port and return its base URL.
///
/// # Panics
///
/// Panics if the listener cannot be bound.
pub async fn spawn_app(pool: PgPool) -> String {
    let config = StorefrontConfig {
        database_url: SecretString::from(database_url()),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        base_url: "http://localhost".to_string(),
        sentry: SentryConfig::default(),
    };

    let listener = tokio::net::TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");

    let app = marketstall_storefront::app(AppState::new(config, pool));
    tokio::spawn(async move { axum::serve(listener, app).await });

    format!("http://{addr}")
}
