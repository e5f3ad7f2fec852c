use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::google_auth::ServiceAccountAuth;
use super::ReviewSource;
use crate::models::{canonical_location_id, GoogleReview, ANONYMOUS_REVIEWER};

pub const DEFAULT_API_BASE_URL: &str = "https://mybusiness.googleapis.com/v4";

#[derive(Debug, Error)]
pub enum GoogleApiError {
    #[error("invalid Google credentials: {0}")]
    Credentials(String),
    #[error("failed to sign token assertion: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("token exchange failed ({status}): {body}")]
    TokenExchange { status: u16, body: String },
    #[error("request to Google API failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Google API returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum ReviewParseError {
    #[error("review element is not an object")]
    NotAnObject,
    #[error("field '{0}' has an unexpected type")]
    InvalidField(&'static str),
}

/// One page of `accounts.locations.reviews.list`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsPage {
    #[serde(default)]
    pub reviews: Option<Vec<Value>>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Requests pages until one comes back without a continuation token.
///
/// `fetch_page` receives the token of the previous page (`None` first) and may
/// return `Ok(None)` to end the walk early with what has been gathered.
pub async fn collect_pages<F, Fut>(mut fetch_page: F) -> Result<Vec<Value>, GoogleApiError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Option<ReviewsPage>, GoogleApiError>>,
{
    let mut items = Vec::new();
    let mut page_token = None;

    loop {
        let Some(page) = fetch_page(page_token.take()).await? else {
            break;
        };
        items.extend(page.reviews.unwrap_or_default());

        match page.next_page_token.filter(|token| !token.is_empty()) {
            Some(next) => page_token = Some(next),
            None => break,
        }
    }

    Ok(items)
}

fn optional_str<'a>(
    element: &'a Value,
    field: &'static str,
) -> Result<Option<&'a str>, ReviewParseError> {
    match element.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.as_str())),
        Some(_) => Err(ReviewParseError::InvalidField(field)),
    }
}

/// Star ratings arrive as numbers, numeric strings or the API's enum words.
/// Unknown strings leave the rating at 0.
fn parse_star_rating(value: Option<&Value>) -> Result<i32, ReviewParseError> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(number)) => number
            .as_i64()
            .and_then(|rating| i32::try_from(rating).ok())
            .ok_or(ReviewParseError::InvalidField("starRating")),
        Some(Value::String(raw)) => {
            let raw = raw.trim();
            if let Ok(rating) = raw.parse::<i32>() {
                return Ok(rating);
            }
            Ok(match raw {
                "ONE" => 1,
                "TWO" => 2,
                "THREE" => 3,
                "FOUR" => 4,
                "FIVE" => 5,
                _ => 0,
            })
        }
        Some(_) => Err(ReviewParseError::InvalidField("starRating")),
    }
}

/// Maps one element of the `reviews` array onto a [`GoogleReview`].
pub fn parse_review(
    element: &Value,
    location_id: &str,
    now: DateTime<Utc>,
) -> Result<GoogleReview, ReviewParseError> {
    if !element.is_object() {
        return Err(ReviewParseError::NotAnObject);
    }

    let id = optional_str(element, "reviewId")?
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let reviewer_name = match element.get("reviewer") {
        Some(reviewer) if reviewer.is_object() => optional_str(reviewer, "displayName")?,
        None | Some(Value::Null) => None,
        Some(_) => return Err(ReviewParseError::InvalidField("reviewer")),
    }
    .unwrap_or(ANONYMOUS_REVIEWER)
    .to_string();

    let rating = parse_star_rating(element.get("starRating"))?;
    let text = optional_str(element, "comment")?.unwrap_or_default().to_string();

    let review_date = optional_str(element, "createTime")?
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|date| date.with_timezone(&Utc))
        .unwrap_or(now);

    let reply = match element.get("reviewReply") {
        Some(reply) if reply.is_object() => optional_str(reply, "comment")?.map(str::to_string),
        _ => None,
    };

    Ok(GoogleReview {
        id,
        location_id: location_id.to_string(),
        reviewer_name,
        rating,
        text,
        review_date,
        reply,
        created_at: now,
        updated_at: now,
    })
}

/// Client for the Google Business Profile reviews API
pub struct GoogleApiClient {
    client: Client,
    base_url: String,
    auth: ServiceAccountAuth,
}

impl GoogleApiClient {
    pub fn new(base_url: &str, auth: ServiceAccountAuth) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn reviews_url(&self, location_ref: &str) -> String {
        let location_ref = location_ref.trim_matches('/');
        if location_ref.contains('/') {
            format!("{}/{}/reviews", self.base_url, location_ref)
        } else {
            log::warn!(
                "Location {} has no account path; prefer accounts/{{accountId}}/locations/{{locationId}}",
                location_ref
            );
            format!("{}/locations/{}/reviews", self.base_url, location_ref)
        }
    }

    async fn fetch_page(
        &self,
        url: &str,
        page_token: Option<String>,
    ) -> Result<Option<ReviewsPage>, GoogleApiError> {
        let access_token = self.auth.access_token().await?;

        let mut request = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = page_token.as_deref() {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            log::warn!("Google location not found at {}", url);
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("Google API error: {} - {}", status, body);
            return Err(GoogleApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Some(response.json::<ReviewsPage>().await?))
    }
}

#[async_trait]
impl ReviewSource for GoogleApiClient {
    async fn fetch_reviews(&self, location_ref: &str) -> Result<Vec<GoogleReview>, GoogleApiError> {
        log::info!("Fetching reviews for location {}", location_ref);

        let url = self.reviews_url(location_ref);
        let elements = collect_pages(|token| self.fetch_page(&url, token)).await?;

        let location_id = canonical_location_id(location_ref);
        let now = Utc::now();
        let reviews: Vec<_> = elements
            .iter()
            .filter_map(|element| match parse_review(element, location_id, now) {
                Ok(review) => Some(review),
                Err(err) => {
                    log::warn!("Dropping unparsable review for {}: {}", location_id, err);
                    None
                }
            })
            .collect();

        log::info!(
            "Fetched {} reviews ({} dropped) for location {}",
            reviews.len(),
            elements.len() - reviews.len(),
            location_ref
        );
        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn numeric_and_string_ratings_both_parse() {
        let numeric = parse_review(&json!({"reviewId": "a", "starRating": 5}), "L1", now()).unwrap();
        let string = parse_review(&json!({"reviewId": "b", "starRating": "5"}), "L1", now()).unwrap();
        let word = parse_review(&json!({"reviewId": "c", "starRating": "FIVE"}), "L1", now()).unwrap();

        assert_eq!(numeric.rating, 5);
        assert_eq!(string.rating, 5);
        assert_eq!(word.rating, 5);
    }

    #[test]
    fn missing_fields_get_defaults() {
        let review = parse_review(&json!({"createTime": "not a date"}), "L1", now()).unwrap();

        assert!(!review.id.is_empty());
        assert_eq!(review.reviewer_name, ANONYMOUS_REVIEWER);
        assert_eq!(review.rating, 0);
        assert_eq!(review.text, "");
        assert_eq!(review.review_date, now());
        assert_eq!(review.reply, None);
        assert_eq!(review.location_id, "L1");
    }

    #[test]
    fn full_review_maps_every_field() {
        let element = json!({
            "reviewId": "rev-1",
            "reviewer": {"displayName": "Marta"},
            "starRating": "FOUR",
            "comment": "Great coffee",
            "createTime": "2024-05-03T10:15:00Z",
            "reviewReply": {"comment": "Thanks!", "updateTime": "2024-05-04T00:00:00Z"}
        });

        let review = parse_review(&element, "L1", now()).unwrap();
        assert_eq!(review.id, "rev-1");
        assert_eq!(review.reviewer_name, "Marta");
        assert_eq!(review.rating, 4);
        assert_eq!(review.text, "Great coffee");
        assert_eq!(review.review_date.to_rfc3339(), "2024-05-03T10:15:00+00:00");
        assert_eq!(review.reply.as_deref(), Some("Thanks!"));
    }

    #[test]
    fn reply_without_comment_is_absent() {
        let review =
            parse_review(&json!({"reviewReply": {"updateTime": "x"}}), "L1", now()).unwrap();
        assert_eq!(review.reply, None);
    }

    #[test]
    fn malformed_elements_are_rejected() {
        assert!(matches!(
            parse_review(&json!("oops"), "L1", now()),
            Err(ReviewParseError::NotAnObject)
        ));
        assert!(parse_review(&json!({"reviewId": 42}), "L1", now()).is_err());
        assert!(parse_review(&json!({"starRating": 4.5}), "L1", now()).is_err());
    }

    #[tokio::test]
    async fn collect_pages_follows_continuation_tokens() {
        let mut pages = VecDeque::from([
            ReviewsPage {
                reviews: Some(vec![json!({"reviewId": "1"}), json!({"reviewId": "2"})]),
                next_page_token: Some("p2".into()),
            },
            ReviewsPage {
                reviews: None,
                next_page_token: Some("p3".into()),
            },
            ReviewsPage {
                reviews: Some(vec![json!({"reviewId": "3"})]),
                next_page_token: Some(String::new()),
            },
        ]);
        let mut seen_tokens = Vec::new();

        let items = collect_pages(|token| {
            seen_tokens.push(token);
            let page = pages.pop_front();
            async move { Ok(page) }
        })
        .await
        .unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(seen_tokens, [None, Some("p2".to_string()), Some("p3".to_string())]);
    }

    #[tokio::test]
    async fn collect_pages_stops_on_missing_location() {
        let items = collect_pages(|_| async { Ok(None) }).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn collect_pages_propagates_errors() {
        let result = collect_pages(|_| async {
            Err(GoogleApiError::Status {
                status: 503,
                body: "unavailable".into(),
            })
        })
        .await;
        assert!(matches!(result, Err(GoogleApiError::Status { status: 503, .. })));
    }

    #[test]
    fn reviews_url_uses_resource_path_when_present() {
        let auth = ServiceAccountAuth::from_json(r#"{"client_email": "a@b.c", "private_key": "k"}"#)
            .unwrap();
        let client = GoogleApiClient::new("https://example.test/v4/", auth);

        assert_eq!(
            client.reviews_url("accounts/1/locations/L1"),
            "https://example.test/v4/accounts/1/locations/L1/reviews"
        );
        assert_eq!(
            client.reviews_url("L1"),
            "https://example.test/v4/locations/L1/reviews"
        );
    }
}
