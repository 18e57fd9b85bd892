//! Authentication service.
//!
//! Password login and registration. Both accept the guest cart the client
//! held while signed out and fold it into the persisted cart in the same
//! transaction that authenticates or creates the user.
//!
//! Sign-in returns a [`PendingSignIn`] holding that open transaction. The
//! caller writes the session and only then commits, so a failed session write
//! leaves neither a merged cart nor a half-created account behind.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, instrument, warn};

use marketstall_core::cart::GuestCart;
use marketstall_core::{Email, UserId};

use crate::db::{RepositoryError, cart, users};
use crate::models::cart::Cart;
use crate::models::user::{NewUser, ProfileUpdate, User};
use crate::services::cart::merge_guest_cart;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum length of a name or phone field.
const MAX_PROFILE_FIELD_LENGTH: usize = 150;

/// Registration form after JSON decoding.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub password_confirm: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

/// An authenticated user whose sign-in transaction is still open.
///
/// Dropping it rolls the transaction back.
pub struct PendingSignIn {
    tx: Transaction<'static, Postgres>,
    /// The signed-in user.
    pub user: User,
    /// The user's cart after merging the guest cart.
    pub cart: Cart,
}

impl PendingSignIn {
    /// Commit the sign-in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the commit fails.
    pub async fn commit(self) -> Result<(User, Cart), AuthError> {
        self.tx.commit().await?;
        Ok((self.user, self.cart))
    }
}

/// Authentication service.
///
/// Handles user registration, login, logout, and profile management.
pub struct AuthService<'a> {
    pool: &'a PgPool,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new user and merge their guest cart.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` or `PasswordMismatch` if the password is unacceptable.
    /// Returns `AuthError::InvalidProfile` if a name or phone is too long.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip(self, registration, guest_cart), fields(email = %registration.email))]
    pub async fn register(
        &self,
        registration: Registration,
        guest_cart: &GuestCart,
    ) -> Result<PendingSignIn, AuthError> {
        let email = Email::parse(&registration.email)?;
        validate_password(&registration.password)?;
        if registration
            .password_confirm
            .as_ref()
            .is_some_and(|confirm| *confirm != registration.password)
        {
            return Err(AuthError::PasswordMismatch);
        }

        let new_user = NewUser {
            email,
            first_name: profile_field("first_name", &registration.first_name)?,
            last_name: profile_field("last_name", &registration.last_name)?,
            phone: registration
                .phone
                .as_deref()
                .map(|p| profile_field("phone", p))
                .transpose()?
                .filter(|p| !p.is_empty()),
        };

        let password_hash = hash_password(&registration.password)?;

        let mut tx = self.pool.begin().await?;
        let user = users::create_with_password(&mut tx, &new_user, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;
        let cart = merge_guest_cart(&mut tx, user.id, guest_cart).await?;

        info!(user_id = %user.id, "User registered");
        Ok(PendingSignIn { tx, user, cart })
    }

    /// Login with email and password and merge the guest cart.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, password, guest_cart))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        guest_cart: &GuestCart,
    ) -> Result<PendingSignIn, AuthError> {
        // Malformed emails get the same answer as unknown ones
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let mut tx = self.pool.begin().await?;
        let user = users::get_by_email(&mut tx, &email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let password_hash = users::get_password_hash(&mut tx, user.id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, &password_hash)?;

        let cart = merge_guest_cart(&mut tx, user.id, guest_cart).await?;

        info!(user_id = %user.id, "User logged in");
        Ok(PendingSignIn { tx, user, cart })
    }

    /// Delete the user's persisted cart as part of logging out.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the delete fails.
    #[instrument(skip(self))]
    pub async fn discard_cart(&self, user_id: UserId) -> Result<u64, AuthError> {
        let mut conn = self.pool.acquire().await?;
        let removed = cart::clear(&mut conn, user_id).await?;
        if removed > 0 {
            info!(user_id = %user_id, lines = removed, "Cart discarded at logout");
        }
        Ok(removed)
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        let mut conn = self.pool.acquire().await?;
        users::get_by_id(&mut conn, user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Update the user's name and phone.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidProfile` if a field is too long.
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    #[instrument(skip(self, update))]
    pub async fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> Result<User, AuthError> {
        let update = ProfileUpdate {
            first_name: update
                .first_name
                .as_deref()
                .map(|v| profile_field("first_name", v))
                .transpose()?,
            last_name: update
                .last_name
                .as_deref()
                .map(|v| profile_field("last_name", v))
                .transpose()?,
            phone: update
                .phone
                .as_deref()
                .map(|v| profile_field("phone", v))
                .transpose()?,
        };

        if update.is_empty() {
            return self.get_user(user_id).await;
        }

        let mut conn = self.pool.acquire().await?;
        users::update_profile(&mut conn, user_id, &update)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })
    }
}

/// Log a failed sign-in attempt with the email that was tried.
pub fn log_failure(action: &str, email: &str, err: &AuthError) {
    match err {
        AuthError::Repository(_) | AuthError::PasswordHash => {
            tracing::error!(action, email, error = %err, "Authentication failed");
        }
        _ => warn!(action, email, error = %err, "Authentication rejected"),
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Trim a profile field and enforce its length limit.
fn profile_field(field: &str, value: &str) -> Result<String, AuthError> {
    let value = value.trim();
    if value.chars().count() > MAX_PROFILE_FIELD_LENGTH {
        return Err(AuthError::InvalidProfile(format!(
            "{field} must be at most {MAX_PROFILE_FIELD_LENGTH} characters"
        )));
    }
    Ok(value.to_string())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
