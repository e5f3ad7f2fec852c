use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{ConnectorService, IngestReviewsCommand, WorkflowError};
use crate::models::{canonical_location_id, BusinessSyncResult, IngestReviewsResult};

impl ConnectorService {
    /// Pulls every review for a location from Google and upserts them one by one.
    ///
    /// Upserts are not transactional: a failure part-way leaves earlier reviews
    /// stored while the result still reports zero ingested.
    pub async fn ingest_reviews(&self, command: IngestReviewsCommand) -> IngestReviewsResult {
        match self.try_ingest_reviews(command).await {
            Ok((count, synced_at)) => IngestReviewsResult::ingested(count, synced_at),
            Err(err) => {
                log::error!("Review ingestion failed: {}", err);
                IngestReviewsResult::failed(err.to_string())
            }
        }
    }

    async fn try_ingest_reviews(
        &self,
        command: IngestReviewsCommand,
    ) -> Result<(usize, DateTime<Utc>), WorkflowError> {
        let location_ref = self.resolve_location_ref(command).await?;
        let location_id = canonical_location_id(&location_ref);
        log::info!("Ingesting reviews for location {}", location_ref);

        let reviews = self.source.fetch_reviews(&location_ref).await?;
        let count = reviews.len();
        for review in reviews {
            self.reviews.upsert(review).await?;
        }

        let synced_at = Utc::now();
        match self.businesses.get(location_id).await? {
            Some(mut business) => {
                business.last_sync_time = Some(synced_at);
                business.updated_at = synced_at.max(business.created_at);
                self.businesses.update(business).await?;
            }
            None => log::debug!("No business record for {}, skipping sync stamp", location_id),
        }

        log::info!("Ingested {} reviews for location {}", count, location_id);
        Ok((count, synced_at))
    }

    /// An explicit location wins; otherwise the profile link decides.
    async fn resolve_location_ref(
        &self,
        command: IngestReviewsCommand,
    ) -> Result<String, WorkflowError> {
        let location_ref = command
            .location_ref
            .map(|location_ref| location_ref.trim().to_string())
            .filter(|location_ref| !location_ref.is_empty());

        match (location_ref, command.profile_id) {
            (Some(location_ref), _) if location_ref.contains('/') => Ok(location_ref),
            // A bare id is the stored key; the record may carry the full resource path.
            (Some(location_id), _) => Ok(self
                .businesses
                .get(&location_id)
                .await?
                .map(|business| business.remote_ref().to_string())
                .unwrap_or(location_id)),
            (None, Some(profile_id)) => match self.businesses.get_by_profile_id(profile_id).await? {
                Some(business) => Ok(business.remote_ref().to_string()),
                None => Err(WorkflowError::NotFound(format!(
                    "No Google business linked to profile business {}",
                    profile_id
                ))),
            },
            (None, None) => Err(WorkflowError::InvalidInput(
                "A Google location id or profile business id is required".into(),
            )),
        }
    }

    /// Ingests every known business in turn. A failing location does not stop the sweep.
    pub async fn sync_all(&self) -> Result<Vec<BusinessSyncResult>, WorkflowError> {
        let businesses = self.businesses.list().await?;
        let mut results = Vec::with_capacity(businesses.len());

        for business in businesses {
            let command = IngestReviewsCommand {
                location_ref: Some(business.remote_ref().to_string()),
                profile_id: None,
            };
            let result = self.ingest_reviews(command).await;
            results.push(BusinessSyncResult {
                location_id: business.location_id,
                result,
            });
        }

        Ok(results)
    }
}

/// Runs [`ConnectorService::sync_all`] every `every`, starting one interval after launch.
pub async fn run_periodic_sync(service: Arc<ConnectorService>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        interval.tick().await;
        log::info!("Scheduled review sync triggered at {}", Utc::now());

        match service.sync_all().await {
            Ok(results) => {
                let failed = results.iter().filter(|entry| !entry.result.success).count();
                let ingested: usize = results.iter().map(|entry| entry.result.reviews_ingested).sum();
                log::info!(
                    "Scheduled review sync finished: {} businesses, {} reviews, {} failures",
                    results.len(),
                    ingested,
                    failed
                );
            }
            Err(err) => log::error!("Scheduled review sync could not list businesses: {}", err),
        }
    }
}
