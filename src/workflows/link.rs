use chrono::Utc;
use uuid::Uuid;

use super::{ConnectorService, LinkBusinessCommand, WorkflowError};
use crate::models::{canonical_location_id, GoogleBusiness, LinkBusinessResult};

impl ConnectorService {
    /// Creates or updates the business record for a Google location and ties
    /// it to a profile-system business. Re-running with the same input only
    /// moves `updated_at`.
    pub async fn link_business(&self, command: LinkBusinessCommand) -> LinkBusinessResult {
        let profile_id = command.profile_id;
        match self.try_link_business(command).await {
            Ok(business) => {
                log::info!(
                    "Linked profile business {} to Google location {}",
                    profile_id,
                    business.location_id
                );
                LinkBusinessResult::linked(business)
            }
            Err(err) => {
                log::error!("Failed to link profile business {}: {}", profile_id, err);
                LinkBusinessResult::failed(err.to_string())
            }
        }
    }

    async fn try_link_business(
        &self,
        command: LinkBusinessCommand,
    ) -> Result<GoogleBusiness, WorkflowError> {
        let LinkBusinessCommand {
            profile_id,
            location_ref,
            display_name,
            address,
        } = command;

        let location_ref = location_ref.trim();
        let location_id = canonical_location_id(location_ref).to_string();
        if location_id.is_empty() {
            return Err(WorkflowError::InvalidInput(
                "Google location id must not be empty".into(),
            ));
        }
        let location_path = (location_id != location_ref).then(|| location_ref.to_string());

        let previous_holder = self
            .businesses
            .get_by_profile_id(profile_id)
            .await?
            .filter(|holder| holder.location_id != location_id);

        let now = Utc::now();
        let linked = match self.businesses.get(&location_id).await? {
            Some(mut existing) => {
                existing.display_name = display_name;
                if let Some(address) = address.filter(|address| !address.is_empty()) {
                    existing.address = address;
                }
                if location_path.is_some() {
                    existing.location_path = location_path;
                }
                existing.linked_profile_id = Some(profile_id);
                existing.updated_at = now.max(existing.created_at);

                self.businesses.update(existing).await?
            }
            None => {
                let business = GoogleBusiness {
                    location_id,
                    display_name,
                    address: address.unwrap_or_default(),
                    location_path,
                    linked_profile_id: Some(profile_id),
                    last_sync_time: None,
                    created_at: now,
                    updated_at: now,
                };

                self.businesses.create(business).await?
            }
        };

        // The old holder is released only once the new link is stored.
        if let Some(previous) = previous_holder {
            self.release_profile_link(&previous.location_id, profile_id, &linked.location_id)
                .await?;
        }
        Ok(linked)
    }

    /// Keeps a profile id on at most one location by unlinking the previous holder.
    async fn release_profile_link(
        &self,
        previous_location_id: &str,
        profile_id: Uuid,
        location_id: &str,
    ) -> Result<(), WorkflowError> {
        let Some(mut previous) = self.businesses.get(previous_location_id).await? else {
            return Ok(());
        };
        if previous.linked_profile_id != Some(profile_id) {
            return Ok(());
        }

        log::info!(
            "Moving profile business {} from location {} to {}",
            profile_id,
            previous.location_id,
            location_id
        );
        previous.linked_profile_id = None;
        previous.updated_at = Utc::now().max(previous.created_at);
        self.businesses.update(previous).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BusinessStore, InMemoryStore};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use crate::workflows::test_support::{
        memory_service, service_with, FlakyBusinessStore, ScriptedSource,
    };

    fn command(profile_id: Uuid, location_ref: &str, address: Option<&str>) -> LinkBusinessCommand {
        LinkBusinessCommand {
            profile_id,
            location_ref: location_ref.to_string(),
            display_name: "Harbour Cafe".into(),
            address: address.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn link_stores_business_under_bare_location_id() {
        let (service, store) = memory_service(ScriptedSource::default());
        let profile_id = Uuid::new_v4();

        let result = service
            .link_business(command(profile_id, "accounts/123/locations/L1", Some("1 Pier St")))
            .await;

        assert!(result.success, "{:?}", result.error_message);
        let stored = BusinessStore::get(&*store, "L1").await.unwrap().unwrap();
        assert_eq!(stored.linked_profile_id, Some(profile_id));
        assert_eq!(stored.location_path.as_deref(), Some("accounts/123/locations/L1"));
        assert_eq!(stored.address, "1 Pier St");
        assert!(BusinessStore::get(&*store, "accounts/123/locations/L1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn relinking_is_idempotent() {
        let (service, store) = memory_service(ScriptedSource::default());
        let profile_id = Uuid::new_v4();

        let first = service
            .link_business(command(profile_id, "L1", Some("1 Pier St")))
            .await
            .business
            .unwrap();
        let second = service
            .link_business(command(profile_id, "L1", None))
            .await
            .business
            .unwrap();

        assert_eq!(store.list().await.unwrap().len(), 1);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(second.address, "1 Pier St");
        assert_eq!(second.display_name, first.display_name);
        assert!(second.last_sync_time.is_none());
    }

    #[tokio::test]
    async fn profile_moves_to_the_newly_linked_location() {
        let (service, store) = memory_service(ScriptedSource::default());
        let profile_id = Uuid::new_v4();

        service.link_business(command(profile_id, "L1", None)).await;
        service.link_business(command(profile_id, "L2", None)).await;

        let old = BusinessStore::get(&*store, "L1").await.unwrap().unwrap();
        let new = BusinessStore::get(&*store, "L2").await.unwrap().unwrap();
        assert_eq!(old.linked_profile_id, None);
        assert_eq!(new.linked_profile_id, Some(profile_id));
        assert_eq!(
            store.get_by_profile_id(profile_id).await.unwrap().map(|b| b.location_id),
            Some("L2".to_string())
        );
    }

    #[tokio::test]
    async fn empty_location_fails_without_writing() {
        let (service, store) = memory_service(ScriptedSource::default());

        let result = service.link_business(command(Uuid::new_v4(), "  ", None)).await;

        assert!(!result.success);
        assert!(result.error_message.is_some());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_relink_keeps_previous_holder() {
        let store = Arc::new(FlakyBusinessStore::default());
        let service = service_with(
            store.clone(),
            Arc::new(InMemoryStore::new()),
            Arc::new(ScriptedSource::default()),
        );
        let profile_id = Uuid::new_v4();
        assert!(service.link_business(command(profile_id, "L1", None)).await.success);

        store.fail_create.store(true, Ordering::SeqCst);
        let result = service.link_business(command(profile_id, "L2", None)).await;

        assert!(!result.success);
        assert!(result.error_message.is_some());
        let holder = store.get_by_profile_id(profile_id).await.unwrap();
        assert_eq!(holder.map(|b| b.location_id), Some("L1".to_string()));
        assert!(BusinessStore::get(&*store, "L2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_update_of_existing_target_is_reported() {
        let store = Arc::new(FlakyBusinessStore::default());
        let service = service_with(
            store.clone(),
            Arc::new(InMemoryStore::new()),
            Arc::new(ScriptedSource::default()),
        );
        let profile_id = Uuid::new_v4();
        service.link_business(command(profile_id, "L1", Some("1 Pier St"))).await;

        store.fail_update.store(true, Ordering::SeqCst);
        let result = service
            .link_business(command(Uuid::new_v4(), "L1", Some("2 Dock Rd")))
            .await;

        assert!(!result.success);
        assert!(result.business.is_none());
        let stored = BusinessStore::get(&*store, "L1").await.unwrap().unwrap();
        assert_eq!(stored.linked_profile_id, Some(profile_id));
        assert_eq!(stored.address, "1 Pier St");
    }
}
