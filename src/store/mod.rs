pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{GoogleBusiness, GoogleReview};

pub use memory::InMemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("{entity} '{id}' already exists")]
    Conflict { entity: &'static str, id: String },
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
}

/// Persistence for linked Google locations, keyed by bare location id.
#[async_trait]
pub trait BusinessStore: Send + Sync {
    async fn get(&self, location_id: &str) -> Result<Option<GoogleBusiness>, StoreError>;

    /// Secondary lookup; the store does not enforce uniqueness of the profile id.
    async fn get_by_profile_id(
        &self,
        profile_id: Uuid,
    ) -> Result<Option<GoogleBusiness>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the location id is taken.
    async fn create(&self, business: GoogleBusiness) -> Result<GoogleBusiness, StoreError>;

    /// Fails with [`StoreError::NotFound`] when no record exists for the location id.
    async fn update(&self, business: GoogleBusiness) -> Result<GoogleBusiness, StoreError>;

    async fn list(&self) -> Result<Vec<GoogleBusiness>, StoreError>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<GoogleReview>, StoreError>;

    /// Reviews for a location, newest `review_date` first.
    async fn list_by_location(
        &self,
        location_id: &str,
        skip: i64,
        take: i64,
    ) -> Result<Vec<GoogleReview>, StoreError>;

    async fn count_by_location(&self, location_id: &str) -> Result<i64, StoreError>;

    /// Insert-or-replace by id. An existing record keeps its `created_at`.
    async fn upsert(&self, review: GoogleReview) -> Result<GoogleReview, StoreError>;
}
