use actix_web::{get, post, web, HttpResponse, Responder};
use validator::Validate;

use crate::models::{
    AddReviewRequest, AddReviewResult, ErrorResponse, IngestReviewsRequest, LinkBusinessRequest,
    ReviewsPageQuery,
};
use crate::workflows::{ConnectorService, GetReviewsQuery, WorkflowError};

// ============================================================================
// HEALTH CHECK
// ============================================================================

#[get("/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "google-review-connector",
        "timestamp": chrono::Utc::now()
    }))
}

// ============================================================================
// BUSINESS LINKING
// ============================================================================

#[post("/businesses/link")]
pub async fn link_business(
    service: web::Data<ConnectorService>,
    payload: web::Json<LinkBusinessRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse::new(format!(
            "ProfileBusinessId and GoogleLocationId are required: {}",
            e
        )));
    }

    let result = service.link_business(body.into_command()).await;
    if result.success {
        HttpResponse::Ok().json(result)
    } else {
        HttpResponse::InternalServerError().json(result)
    }
}

// ============================================================================
// REVIEWS
// ============================================================================

#[post("/reviews/ingest")]
pub async fn ingest_reviews(
    service: web::Data<ConnectorService>,
    payload: web::Json<IngestReviewsRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(message) = body.validate_business_rules() {
        return HttpResponse::BadRequest().json(ErrorResponse::new(message));
    }

    let result = service.ingest_reviews(body.into_command()).await;
    if result.success {
        HttpResponse::Ok().json(result)
    } else {
        HttpResponse::InternalServerError().json(result)
    }
}

#[post("/reviews/sync")]
pub async fn sync_all_reviews(service: web::Data<ConnectorService>) -> impl Responder {
    match service.sync_all().await {
        Ok(results) => HttpResponse::Ok().json(results),
        Err(err) => {
            log::error!("Failed to run review sync: {err:?}");
            HttpResponse::InternalServerError().json(ErrorResponse::new(err.to_string()))
        }
    }
}

#[post("/reviews/add")]
pub async fn add_review(
    service: web::Data<ConnectorService>,
    payload: web::Json<AddReviewRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ErrorResponse::new(format!("BusinessId is required: {}", e)));
    }

    match service.add_review(body.into_review()).await {
        Ok(review) => HttpResponse::Ok().json(AddReviewResult {
            success: true,
            review_id: review.id,
            message: "Review added successfully".into(),
        }),
        Err(WorkflowError::InvalidInput(message)) => {
            HttpResponse::BadRequest().json(ErrorResponse::new(message))
        }
        Err(err) => {
            log::error!("Failed to add review: {err:?}");
            HttpResponse::InternalServerError().json(ErrorResponse::new(err.to_string()))
        }
    }
}

#[get("/reviews/{business_id}")]
pub async fn get_reviews(
    service: web::Data<ConnectorService>,
    business_id: web::Path<String>,
    query: web::Query<ReviewsPageQuery>,
) -> impl Responder {
    let location_id = business_id.into_inner();
    let query = GetReviewsQuery {
        skip: query.skip(),
        take: query.take(),
        location_id,
    };

    match service.get_reviews(query).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(err) => {
            log::error!("Failed to fetch reviews: {err:?}");
            HttpResponse::InternalServerError().json(ErrorResponse::new(err.to_string()))
        }
    }
}

/// Registers every connector route on a scope or app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(link_business)
        .service(ingest_reviews)
        .service(sync_all_reviews)
        .service(add_review)
        .service(get_reviews);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{http::StatusCode, test, App};
    use serde_json::{json, Value};
    use uuid::Uuid;

    use super::*;
    use crate::store::BusinessStore;
    use crate::store::InMemoryStore;
    use crate::workflows::test_support::{day, review, ScriptedSource};

    fn service(source: ScriptedSource) -> (web::Data<ConnectorService>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let service = ConnectorService::new(store.clone(), store.clone(), Arc::new(source));
        (web::Data::new(service), store)
    }

    #[actix_web::test]
    async fn link_rejects_missing_identifiers() {
        let (data, _) = service(ScriptedSource::default());
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/businesses/link")
            .set_json(json!({
                "profileBusinessId": Uuid::nil(),
                "googleLocationId": "L1",
                "businessName": "Cafe"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn link_returns_business_keyed_by_location() {
        let (data, store) = service(ScriptedSource::default());
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/businesses/link")
            .set_json(json!({
                "profileBusinessId": Uuid::new_v4(),
                "googleLocationId": "accounts/1/locations/L1",
                "businessName": "Cafe",
                "location": "Main St"
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], true);
        assert_eq!(body["business"]["locationId"], "L1");
        assert!(BusinessStore::get(&*store, "L1").await.unwrap().is_some());
    }

    #[actix_web::test]
    async fn ingest_requires_an_identifier() {
        let (data, _) = service(ScriptedSource::default());
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/reviews/ingest")
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn ingest_failure_maps_to_server_error_with_payload() {
        let (data, _) = service(ScriptedSource::default());
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/reviews/ingest")
            .set_json(json!({"businessId": "L1"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["reviewsIngested"], 0);
        assert!(body["errorMessage"].as_str().is_some_and(|m| !m.is_empty()));
    }

    #[actix_web::test]
    async fn ingest_then_read_back_with_paging() {
        let source = ScriptedSource::default().with(
            "L1",
            vec![
                review("day1", "L1", day(1)),
                review("day3", "L1", day(3)),
                review("day5", "L1", day(5)),
            ],
        );
        let (data, _) = service(source);
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/reviews/ingest")
            .set_json(json!({"businessId": "L1"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["reviewsIngested"], 3);

        let req = test::TestRequest::get()
            .uri("/reviews/L1?skip=1&take=1")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["totalCount"], 3);
        assert_eq!(body["reviews"][0]["id"], "day3");

        let req = test::TestRequest::get()
            .uri("/reviews/L1?skip=abc&take=")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["reviews"].as_array().map(Vec::len), Some(3));
    }

    #[actix_web::test]
    async fn get_reviews_for_unknown_location_is_empty() {
        let (data, _) = service(ScriptedSource::default());
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::get().uri("/reviews/nowhere").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["totalCount"], 0);
        assert_eq!(body["reviews"], json!([]));
    }

    #[actix_web::test]
    async fn add_review_generates_id() {
        let (data, _) = service(ScriptedSource::default());
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/reviews/add")
            .set_json(json!({"businessId": "L1", "rating": 5, "comment": "Great"}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], true);
        assert!(body["reviewId"].as_str().is_some_and(|id| !id.is_empty()));

        let req = test::TestRequest::post()
            .uri("/reviews/add")
            .set_json(json!({"businessId": "", "rating": 5}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
