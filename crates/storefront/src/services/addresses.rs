//! Address book service.

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use marketstall_core::{AddressId, UserId};

use crate::db::{RepositoryError, addresses};
use crate::models::address::{Address, AddressInput, AddressPatch};

/// Errors that can occur during address operations.
#[derive(Debug, Error)]
pub enum AddressError {
    /// The address does not exist or belongs to another user.
    #[error("address not found")]
    NotFound,

    /// A required field is missing or blank.
    #[error("{0}")]
    Validation(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for AddressError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}

/// Address book service.
pub struct AddressService<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressService<'a> {
    /// Create a new address service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List the user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Repository` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, AddressError> {
        let mut conn = self.pool.acquire().await?;
        Ok(addresses::list(&mut conn, user_id).await?)
    }

    /// Get one of the user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::NotFound` if the address is not the user's.
    pub async fn get(&self, user_id: UserId, id: AddressId) -> Result<Address, AddressError> {
        let mut conn = self.pool.acquire().await?;
        addresses::get(&mut conn, user_id, id)
            .await?
            .ok_or(AddressError::NotFound)
    }

    /// Save a new address.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::Validation` if a required field is blank.
    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        user_id: UserId,
        input: AddressInput,
    ) -> Result<Address, AddressError> {
        let input = input.validate().map_err(AddressError::Validation)?;
        let mut tx = self.pool.begin().await?;

        if input.is_default {
            addresses::clear_default(&mut tx, user_id, None).await?;
        }
        let address = addresses::insert(&mut tx, user_id, &input).await?;

        tx.commit().await?;
        info!(address_id = %address.id, is_default = address.is_default, "Address created");
        Ok(address)
    }

    /// Replace every field of an address (`PUT`).
    ///
    /// # Errors
    ///
    /// Returns `AddressError::NotFound` if the address is not the user's.
    /// Returns `AddressError::Validation` if a required field is blank.
    #[instrument(skip(self, input))]
    pub async fn replace(
        &self,
        user_id: UserId,
        id: AddressId,
        input: AddressInput,
    ) -> Result<Address, AddressError> {
        let input = input.validate().map_err(AddressError::Validation)?;
        let mut tx = self.pool.begin().await?;

        if addresses::get(&mut tx, user_id, id).await?.is_none() {
            return Err(AddressError::NotFound);
        }
        let address = write_address(&mut tx, user_id, id, &input).await?;

        tx.commit().await?;
        Ok(address)
    }

    /// Update some fields of an address (`PATCH`).
    ///
    /// # Errors
    ///
    /// Returns `AddressError::NotFound` if the address is not the user's.
    /// Returns `AddressError::Validation` if a required field becomes blank.
    #[instrument(skip(self, patch))]
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        patch: AddressPatch,
    ) -> Result<Address, AddressError> {
        let mut tx = self.pool.begin().await?;

        let current = addresses::get(&mut tx, user_id, id)
            .await?
            .ok_or(AddressError::NotFound)?;
        let input = patch
            .apply(&current)
            .validate()
            .map_err(AddressError::Validation)?;
        let address = write_address(&mut tx, user_id, id, &input).await?;

        tx.commit().await?;
        Ok(address)
    }

    /// Delete one of the user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `AddressError::NotFound` if the address is not the user's.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), AddressError> {
        let mut conn = self.pool.acquire().await?;
        if addresses::delete(&mut conn, user_id, id).await? {
            Ok(())
        } else {
            Err(AddressError::NotFound)
        }
    }
}

/// Write an address, first unsetting the user's other defaults if it is one.
async fn write_address(
    conn: &mut sqlx::PgConnection,
    user_id: UserId,
    id: AddressId,
    input: &AddressInput,
) -> Result<Address, AddressError> {
    if input.is_default {
        addresses::clear_default(conn, user_id, Some(id)).await?;
    }
    addresses::update(conn, user_id, id, input)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AddressError::NotFound,
            other => AddressError::Repository(other),
        })
}
