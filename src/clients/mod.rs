pub mod google;
pub mod google_auth;
pub mod secrets;

use async_trait::async_trait;

use crate::models::GoogleReview;

pub use google::{GoogleApiClient, GoogleApiError};

/// Remote source of reviews for a Google location.
///
/// Implementations page through the remote API themselves and hand back the
/// complete set for one call.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    async fn fetch_reviews(&self, location_ref: &str) -> Result<Vec<GoogleReview>, GoogleApiError>;
}
