use std::cmp::Reverse;
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{BusinessStore, ReviewStore, StoreError};
use crate::models::{GoogleBusiness, GoogleReview};

#[derive(Default)]
struct Collections {
    businesses: HashMap<String, GoogleBusiness>,
    reviews: HashMap<String, GoogleReview>,
}

/// Process-local store used for local runs (`STORE_BACKEND=memory`) and tests.
///
/// Both collections sit behind one mutex; nothing is shared beyond the
/// instance handed to the service.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Collections>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BusinessStore for InMemoryStore {
    async fn get(&self, location_id: &str) -> Result<Option<GoogleBusiness>, StoreError> {
        Ok(self.inner.lock().await.businesses.get(location_id).cloned())
    }

    async fn get_by_profile_id(
        &self,
        profile_id: Uuid,
    ) -> Result<Option<GoogleBusiness>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .businesses
            .values()
            .filter(|business| business.linked_profile_id == Some(profile_id))
            .max_by_key(|business| business.updated_at)
            .cloned())
    }

    async fn create(&self, business: GoogleBusiness) -> Result<GoogleBusiness, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.businesses.contains_key(&business.location_id) {
            return Err(StoreError::Conflict {
                entity: "business",
                id: business.location_id,
            });
        }
        inner
            .businesses
            .insert(business.location_id.clone(), business.clone());
        Ok(business)
    }

    async fn update(&self, business: GoogleBusiness) -> Result<GoogleBusiness, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.businesses.get_mut(&business.location_id) {
            Some(slot) => {
                *slot = business.clone();
                Ok(business)
            }
            None => Err(StoreError::NotFound {
                entity: "business",
                id: business.location_id,
            }),
        }
    }

    async fn list(&self) -> Result<Vec<GoogleBusiness>, StoreError> {
        let inner = self.inner.lock().await;
        let mut businesses: Vec<_> = inner.businesses.values().cloned().collect();
        businesses.sort_by(|a, b| a.location_id.cmp(&b.location_id));
        Ok(businesses)
    }
}

#[async_trait]
impl ReviewStore for InMemoryStore {
    async fn get(&self, id: &str) -> Result<Option<GoogleReview>, StoreError> {
        Ok(self.inner.lock().await.reviews.get(id).cloned())
    }

    async fn list_by_location(
        &self,
        location_id: &str,
        skip: i64,
        take: i64,
    ) -> Result<Vec<GoogleReview>, StoreError> {
        let inner = self.inner.lock().await;
        let mut reviews: Vec<_> = inner
            .reviews
            .values()
            .filter(|review| review.location_id == location_id)
            .cloned()
            .collect();
        reviews.sort_by_key(|review| (Reverse(review.review_date), review.id.clone()));

        Ok(reviews
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(take.max(0) as usize)
            .collect())
    }

    async fn count_by_location(&self, location_id: &str) -> Result<i64, StoreError> {
        let inner = self.inner.lock().await;
        let count = inner
            .reviews
            .values()
            .filter(|review| review.location_id == location_id)
            .count();
        Ok(count as i64)
    }

    async fn upsert(&self, mut review: GoogleReview) -> Result<GoogleReview, StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.reviews.get(&review.id) {
            review.created_at = existing.created_at;
        }
        inner.reviews.insert(review.id.clone(), review.clone());
        Ok(review)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn review(id: &str, location_id: &str, day: u32) -> GoogleReview {
        let date = Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap();
        GoogleReview {
            id: id.to_string(),
            location_id: location_id.to_string(),
            reviewer_name: "Ana".into(),
            rating: 5,
            text: String::new(),
            review_date: date,
            reply: None,
            created_at: date,
            updated_at: date,
        }
    }

    fn business(location_id: &str) -> GoogleBusiness {
        let now = Utc::now();
        GoogleBusiness {
            location_id: location_id.to_string(),
            display_name: "Cafe".into(),
            address: String::new(),
            location_path: None,
            linked_profile_id: None,
            last_sync_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn upsert_keeps_original_created_at() {
        let store = InMemoryStore::new();
        let first = review("r1", "L1", 1);
        let created_at = first.created_at;
        store.upsert(first).await.unwrap();

        let mut again = review("r1", "L1", 1);
        again.created_at = created_at + Duration::days(3);
        again.updated_at = created_at + Duration::days(3);
        again.rating = 2;
        let stored = store.upsert(again).await.unwrap();

        assert_eq!(stored.created_at, created_at);
        assert_eq!(stored.rating, 2);
        assert_eq!(store.count_by_location("L1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_windows() {
        let store = InMemoryStore::new();
        for (id, day) in [("d1", 1), ("d5", 5), ("d3", 3)] {
            store.upsert(review(id, "L1", day)).await.unwrap();
        }
        store.upsert(review("other", "L2", 4)).await.unwrap();

        let all = store.list_by_location("L1", 0, 10).await.unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["d5", "d3", "d1"]);

        let page = store.list_by_location("L1", 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "d3");

        assert!(store.list_by_location("missing", 0, 10).await.unwrap().is_empty());
        assert_eq!(store.count_by_location("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_and_update_enforce_existence() {
        let store = InMemoryStore::new();
        BusinessStore::create(&store, business("L1")).await.unwrap();

        let duplicate = BusinessStore::create(&store, business("L1")).await;
        assert!(matches!(duplicate, Err(StoreError::Conflict { .. })));

        let missing = store.update(business("L2")).await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn finds_business_by_profile_id() {
        let store = InMemoryStore::new();
        let profile_id = Uuid::new_v4();
        let mut linked = business("L1");
        linked.linked_profile_id = Some(profile_id);
        BusinessStore::create(&store, linked).await.unwrap();
        BusinessStore::create(&store, business("L2")).await.unwrap();

        let found = store.get_by_profile_id(profile_id).await.unwrap();
        assert_eq!(found.map(|b| b.location_id), Some("L1".to_string()));
        assert!(store.get_by_profile_id(Uuid::new_v4()).await.unwrap().is_none());
    }
}
