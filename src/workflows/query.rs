use super::{ConnectorService, GetReviewsQuery, WorkflowError};
use crate::models::{GetReviewsResult, GoogleReview, MAX_REVIEWS_TAKE};

impl ConnectorService {
    /// A page of stored reviews, newest first, plus the location's total count.
    pub async fn get_reviews(&self, query: GetReviewsQuery) -> Result<GetReviewsResult, WorkflowError> {
        let skip = query.skip.max(0);
        let take = query.take.clamp(0, MAX_REVIEWS_TAKE);

        let reviews = self
            .reviews
            .list_by_location(&query.location_id, skip, take)
            .await?;
        let total_count = self.reviews.count_by_location(&query.location_id).await?;

        Ok(GetReviewsResult {
            reviews,
            total_count,
        })
    }

    /// Stores a review supplied directly by a caller instead of the Google API.
    pub async fn add_review(&self, review: GoogleReview) -> Result<GoogleReview, WorkflowError> {
        if review.location_id.trim().is_empty() {
            return Err(WorkflowError::InvalidInput("BusinessId is required".into()));
        }

        let replaced = self.reviews.get(&review.id).await?.is_some();
        let stored = self.reviews.upsert(review).await?;
        log::info!(
            "Review {}: {} for location {}",
            if replaced { "replaced" } else { "added" },
            stored.id,
            stored.location_id
        );
        Ok(stored)
    }
}
