use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::workflows::{IngestReviewsCommand, LinkBusinessCommand};

/// Marker separating the account prefix from the location id in a Google
/// Business Profile resource name (`accounts/{a}/locations/{l}`).
const LOCATIONS_SEGMENT: &str = "/locations/";

pub const ANONYMOUS_REVIEWER: &str = "Anonymous";
pub const DEFAULT_REVIEWS_TAKE: i64 = 100;
pub const MAX_REVIEWS_TAKE: i64 = 1000;

/// Reduces a location reference to the bare location id used as the business key.
///
/// `accounts/123/locations/L1` and `accounts/123/locations/L1/reviews` both
/// yield `L1`; anything without a `/locations/` segment is returned verbatim.
pub fn canonical_location_id(location_ref: &str) -> &str {
    match location_ref.split_once(LOCATIONS_SEGMENT) {
        Some((_, rest)) => {
            let segment = rest.split('/').next().unwrap_or_default();
            if segment.is_empty() {
                location_ref
            } else {
                segment
            }
        }
        None => location_ref,
    }
}

// ============================================================================
// GOOGLE BUSINESSES
// ============================================================================

/// A Google Business Profile location linked to a business in the profile system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GoogleBusiness {
    pub location_id: String,
    pub display_name: String,
    pub address: String,
    /// Full `accounts/{a}/locations/{l}` resource name, when one was supplied at link time.
    pub location_path: Option<String>,
    pub linked_profile_id: Option<Uuid>,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GoogleBusiness {
    /// Reference handed to the Google API when ingesting this location.
    pub fn remote_ref(&self) -> &str {
        self.location_path.as_deref().unwrap_or(&self.location_id)
    }
}

// ============================================================================
// GOOGLE REVIEWS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GoogleReview {
    pub id: String,
    pub location_id: String,
    pub reviewer_name: String,
    pub rating: i32,
    pub text: String,
    pub review_date: DateTime<Utc>,
    /// Owner response, only present once the business has replied.
    pub reply: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// WORKFLOW RESULTS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkBusinessResult {
    pub success: bool,
    pub business: Option<GoogleBusiness>,
    pub error_message: Option<String>,
}

impl LinkBusinessResult {
    pub fn linked(business: GoogleBusiness) -> Self {
        Self {
            success: true,
            business: Some(business),
            error_message: None,
        }
    }

    pub fn failed(message: String) -> Self {
        Self {
            success: false,
            business: None,
            error_message: Some(message),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReviewsResult {
    pub success: bool,
    pub reviews_ingested: usize,
    pub sync_time: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl IngestReviewsResult {
    pub fn ingested(count: usize, sync_time: DateTime<Utc>) -> Self {
        Self {
            success: true,
            reviews_ingested: count,
            sync_time,
            error_message: None,
        }
    }

    /// Failed runs always report zero, even when some upserts already landed.
    pub fn failed(message: String) -> Self {
        Self {
            success: false,
            reviews_ingested: 0,
            sync_time: Utc::now(),
            error_message: Some(message),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessSyncResult {
    pub location_id: String,
    #[serde(flatten)]
    pub result: IngestReviewsResult,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetReviewsResult {
    pub reviews: Vec<GoogleReview>,
    pub total_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddReviewResult {
    pub success: bool,
    pub review_id: String,
    pub message: String,
}

/// Error body returned for rejected or failed requests
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

// ============================================================================
// REQUEST DTOs
// ============================================================================

fn validate_profile_id(profile_id: &Uuid) -> Result<(), ValidationError> {
    if profile_id.is_nil() {
        return Err(ValidationError::new("nil_profile_business_id"));
    }
    Ok(())
}

/// Links a profile-system business to a Google location
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LinkBusinessRequest {
    #[validate(custom(function = "validate_profile_id"))]
    pub profile_business_id: Uuid,
    #[validate(length(min = 1))]
    pub google_location_id: String,
    #[serde(default)]
    pub business_name: String,
    pub location: Option<String>,
}

impl LinkBusinessRequest {
    pub fn into_command(self) -> LinkBusinessCommand {
        LinkBusinessCommand {
            profile_id: self.profile_business_id,
            location_ref: self.google_location_id,
            display_name: self.business_name,
            address: self.location,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReviewsRequest {
    pub business_id: Option<String>,
    pub profile_business_id: Option<Uuid>,
}

impl IngestReviewsRequest {
    pub fn validate_business_rules(&self) -> Result<(), String> {
        let has_location = self
            .business_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty());
        let has_profile = self.profile_business_id.is_some_and(|id| !id.is_nil());

        if !has_location && !has_profile {
            return Err("BusinessId or ProfileBusinessId is required".into());
        }
        Ok(())
    }

    pub fn into_command(self) -> IngestReviewsCommand {
        IngestReviewsCommand {
            location_ref: self.business_id.filter(|id| !id.trim().is_empty()),
            profile_id: self.profile_business_id.filter(|id| !id.is_nil()),
        }
    }
}

/// Direct review insertion that bypasses the Google API
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddReviewRequest {
    pub id: Option<String>,
    #[serde(alias = "locationId")]
    #[validate(length(min = 1))]
    pub business_id: String,
    pub reviewer_name: Option<String>,
    #[serde(default)]
    pub rating: i32,
    #[serde(alias = "text")]
    pub comment: Option<String>,
    pub review_date: Option<DateTime<Utc>>,
    pub reply: Option<String>,
}

impl AddReviewRequest {
    pub fn into_review(self) -> GoogleReview {
        let now = Utc::now();
        GoogleReview {
            id: self
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            location_id: canonical_location_id(&self.business_id).to_string(),
            reviewer_name: self
                .reviewer_name
                .unwrap_or_else(|| ANONYMOUS_REVIEWER.to_string()),
            rating: self.rating,
            text: self.comment.unwrap_or_default(),
            review_date: self.review_date.unwrap_or(now),
            reply: self.reply,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Paging parameters for `GET /reviews/{businessId}`.
///
/// Kept as raw strings so unparsable values fall back to defaults instead of
/// rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewsPageQuery {
    pub skip: Option<String>,
    pub take: Option<String>,
}

impl ReviewsPageQuery {
    pub fn skip(&self) -> i64 {
        self.skip
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn take(&self) -> i64 {
        self.take
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(DEFAULT_REVIEWS_TAKE)
    }
}
