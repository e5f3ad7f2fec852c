use std::{borrow::Cow, time::Duration};

use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    Connection, Executor, PgPool,
};
use uuid::Uuid;

use crate::models::{GoogleBusiness, GoogleReview};
use crate::store::{BusinessStore, ReviewStore, StoreError};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = match pool_options().connect(database_url).await {
            Ok(pool) => pool,
            Err(sqlx::Error::Database(db_err)) if db_err.code() == Some(Cow::Borrowed("3D000")) => {
                log::info!("Database missing, attempting to create it");
                create_database_if_missing(database_url).await?;
                pool_options().connect(database_url).await?
            }
            Err(err) => return Err(err.into()),
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        log::info!("Database connection established");

        Ok(Self { pool })
    }
}

fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Some(Duration::from_secs(600)))
        .test_before_acquire(true)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code() == Some(Cow::Borrowed(UNIQUE_VIOLATION)))
}

#[async_trait]
impl BusinessStore for Database {
    async fn get(&self, location_id: &str) -> Result<Option<GoogleBusiness>, StoreError> {
        let business = sqlx::query_as::<_, GoogleBusiness>(
            r#"
            SELECT
                location_id,
                display_name,
                address,
                location_path,
                linked_profile_id,
                last_sync_time,
                created_at,
                updated_at
            FROM google_businesses
            WHERE location_id = $1
            "#,
        )
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(business)
    }

    async fn get_by_profile_id(
        &self,
        profile_id: Uuid,
    ) -> Result<Option<GoogleBusiness>, StoreError> {
        let business = sqlx::query_as::<_, GoogleBusiness>(
            r#"
            SELECT
                location_id,
                display_name,
                address,
                location_path,
                linked_profile_id,
                last_sync_time,
                created_at,
                updated_at
            FROM google_businesses
            WHERE linked_profile_id = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(business)
    }

    async fn create(&self, business: GoogleBusiness) -> Result<GoogleBusiness, StoreError> {
        let result = sqlx::query_as::<_, GoogleBusiness>(
            r#"
            INSERT INTO google_businesses (
                location_id,
                display_name,
                address,
                location_path,
                linked_profile_id,
                last_sync_time,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING
                location_id,
                display_name,
                address,
                location_path,
                linked_profile_id,
                last_sync_time,
                created_at,
                updated_at
            "#,
        )
        .bind(&business.location_id)
        .bind(&business.display_name)
        .bind(&business.address)
        .bind(&business.location_path)
        .bind(business.linked_profile_id)
        .bind(business.last_sync_time)
        .bind(business.created_at)
        .bind(business.updated_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(created) => Ok(created),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict {
                entity: "business",
                id: business.location_id,
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn update(&self, business: GoogleBusiness) -> Result<GoogleBusiness, StoreError> {
        let updated = sqlx::query_as::<_, GoogleBusiness>(
            r#"
            UPDATE google_businesses
            SET
                display_name = $2,
                address = $3,
                location_path = $4,
                linked_profile_id = $5,
                last_sync_time = $6,
                updated_at = $7
            WHERE location_id = $1
            RETURNING
                location_id,
                display_name,
                address,
                location_path,
                linked_profile_id,
                last_sync_time,
                created_at,
                updated_at
            "#,
        )
        .bind(&business.location_id)
        .bind(&business.display_name)
        .bind(&business.address)
        .bind(&business.location_path)
        .bind(business.linked_profile_id)
        .bind(business.last_sync_time)
        .bind(business.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or(StoreError::NotFound {
            entity: "business",
            id: business.location_id,
        })
    }

    async fn list(&self) -> Result<Vec<GoogleBusiness>, StoreError> {
        let businesses = sqlx::query_as::<_, GoogleBusiness>(
            r#"
            SELECT
                location_id,
                display_name,
                address,
                location_path,
                linked_profile_id,
                last_sync_time,
                created_at,
                updated_at
            FROM google_businesses
            ORDER BY location_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(businesses)
    }
}

#[async_trait]
impl ReviewStore for Database {
    async fn get(&self, id: &str) -> Result<Option<GoogleReview>, StoreError> {
        let review = sqlx::query_as::<_, GoogleReview>(
            r#"
            SELECT
                id,
                location_id,
                reviewer_name,
                rating,
                text,
                review_date,
                reply,
                created_at,
                updated_at
            FROM google_reviews
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(review)
    }

    async fn list_by_location(
        &self,
        location_id: &str,
        skip: i64,
        take: i64,
    ) -> Result<Vec<GoogleReview>, StoreError> {
        let reviews = sqlx::query_as::<_, GoogleReview>(
            r#"
            SELECT
                id,
                location_id,
                reviewer_name,
                rating,
                text,
                review_date,
                reply,
                created_at,
                updated_at
            FROM google_reviews
            WHERE location_id = $1
            ORDER BY review_date DESC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(location_id)
        .bind(take)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }

    async fn count_by_location(&self, location_id: &str) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM google_reviews WHERE location_id = $1",
        )
        .bind(location_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn upsert(&self, review: GoogleReview) -> Result<GoogleReview, StoreError> {
        let stored = sqlx::query_as::<_, GoogleReview>(
            r#"
            INSERT INTO google_reviews (
                id,
                location_id,
                reviewer_name,
                rating,
                text,
                review_date,
                reply,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                location_id = EXCLUDED.location_id,
                reviewer_name = EXCLUDED.reviewer_name,
                rating = EXCLUDED.rating,
                text = EXCLUDED.text,
                review_date = EXCLUDED.review_date,
                reply = EXCLUDED.reply,
                updated_at = EXCLUDED.updated_at
            RETURNING
                id,
                location_id,
                reviewer_name,
                rating,
                text,
                review_date,
                reply,
                created_at,
                updated_at
            "#,
        )
        .bind(&review.id)
        .bind(&review.location_id)
        .bind(&review.reviewer_name)
        .bind(review.rating)
        .bind(&review.text)
        .bind(review.review_date)
        .bind(&review.reply)
        .bind(review.created_at)
        .bind(review.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }
}

async fn create_database_if_missing(database_url: &str) -> Result<(), sqlx::Error> {
    let options: PgConnectOptions = database_url.parse()?;
    let database_name = options
        .get_database()
        .map(|name| name.to_string())
        .unwrap_or_else(|| "postgres".to_string());

    if database_name.eq_ignore_ascii_case("postgres") {
        return Ok(());
    }

    let maintenance_options = options.clone().database("postgres");
    let mut connection = sqlx::postgres::PgConnection::connect_with(&maintenance_options).await?;

    let create_stmt = format!("CREATE DATABASE \"{}\"", database_name.replace('"', "\"\""));

    match connection.execute(create_stmt.as_str()).await {
        Ok(_) => {
            log::info!("Created database '{}'", database_name);
            Ok(())
        }
        Err(sqlx::Error::Database(db_err)) if db_err.code() == Some(Cow::Borrowed("42P04")) => {
            log::info!("Database '{}' already exists", database_name);
            Ok(())
        }
        Err(err) => Err(err),
    }
}
