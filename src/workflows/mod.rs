mod ingest;
mod link;
mod query;

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::clients::{GoogleApiError, ReviewSource};
use crate::store::{BusinessStore, ReviewStore, StoreError};

pub use ingest::run_periodic_sync;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Source(#[from] GoogleApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct LinkBusinessCommand {
    pub profile_id: Uuid,
    /// Bare location id or `accounts/{a}/locations/{l}` resource name.
    pub location_ref: String,
    pub display_name: String,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IngestReviewsCommand {
    pub location_ref: Option<String>,
    pub profile_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct GetReviewsQuery {
    pub location_id: String,
    pub skip: i64,
    pub take: i64,
}

/// Entry point for the link, ingest and read workflows.
///
/// Holds no state of its own between calls; the stores are the only point of
/// coordination between concurrent invocations.
pub struct ConnectorService {
    businesses: Arc<dyn BusinessStore>,
    reviews: Arc<dyn ReviewStore>,
    source: Arc<dyn ReviewSource>,
}

impl ConnectorService {
    pub fn new(
        businesses: Arc<dyn BusinessStore>,
        reviews: Arc<dyn ReviewStore>,
        source: Arc<dyn ReviewSource>,
    ) -> Self {
        Self {
            businesses,
            reviews,
            source,
        }
    }
}
