use actix_web::{delete, get, post, put, web, Error, HttpRequest, HttpResponse, Responder};
use ammonia::clean;
use chrono::Utc;
use serde_json::json;
use sqlx::{MySql, Pool};
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

use crate::auth::verify_jwt;
use crate::models::analytics::{dispatch_event, METRIC_REVIEW_SUBMITTED};
use crate::models::review::{Review, ReviewSubmission, ReviewUpdate};
use crate::models::settings::AppSettings;
use crate::notifications::dispatch_review_emails;
use crate::rate_limit::RateLimiter;
use crate::routing::{is_public, RouteDecision};
use crate::utils::{get_ip_address, get_user_agent};
use crate::validation::normalize_optional;

use super::{db_error, sql_error, too_many_requests, validation_failed};

const SUBMIT_LIMIT: u32 = 10;
const SUBMIT_WINDOW: Duration = Duration::from_secs(60);

const REVIEW_COLUMNS: &str = "id, rating, comment, customer_name, customer_phone, \
     customer_email, allow_follow_up, is_public, created_at, updated_at";

/// Public intake. Ratings of 4 and up get routed to the Google Business
/// Profile, everything lower to the private feedback form.
#[post("/api/reviews")]
pub async fn submit_review(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
    limiter: web::Data<RateLimiter>,
    form_data: web::Json<ReviewSubmission>,
) -> HttpResponse {
    if let Err(errors) = form_data.validate() {
        return validation_failed(&errors);
    }

    let ip_address = get_ip_address(&req);
    let decision = limiter.check("reviews:post", &ip_address, SUBMIT_LIMIT, SUBMIT_WINDOW);
    if !decision.ok {
        return too_many_requests(&decision, "Too many requests. Please try again later.");
    }

    let id = Uuid::new_v4().to_string();
    let rating = form_data.rating;
    let public = is_public(rating);
    let customer_name = form_data.customer_name.trim().to_string();
    let customer_phone = normalize_optional(form_data.customer_phone.clone());
    let comment = normalize_optional(form_data.comment.clone()).map(|c| clean(&c));
    let now = Utc::now();

    let insert = sqlx::query(
        "INSERT INTO reviews (id, rating, comment, customer_name, customer_phone, \
         allow_follow_up, is_public, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(rating)
    .bind(&comment)
    .bind(&customer_name)
    .bind(&customer_phone)
    .bind(false)
    .bind(public)
    .bind(now)
    .bind(now)
    .execute(pool.get_ref())
    .await;

    if let Err(e) = insert {
        return sql_error("review insert", e);
    }

    dispatch_event(
        pool.get_ref(),
        METRIC_REVIEW_SUBMITTED,
        json!({
            "review_id": id,
            "rating": rating,
            "is_public": public,
            "ip_address": ip_address,
            "user_agent": get_user_agent(&req),
            "timestamp": now.to_rfc3339(),
        }),
    );

    let settings = match AppSettings::load(pool.get_ref()).await {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Settings lookup failed after review insert: {:?}", e);
            None
        }
    };

    let routing = RouteDecision::decide(
        rating,
        &id,
        settings
            .as_ref()
            .and_then(|s| s.google_business_url.as_deref()),
    );

    if let Some(settings) = settings.as_ref() {
        dispatch_review_emails(
            pool.get_ref(),
            settings,
            rating,
            &customer_name,
            comment.as_deref(),
        );
    }

    HttpResponse::Created().json(json!({
        "success": true,
        "review": {
            "id": id,
            "rating": rating,
            "is_public": public,
        },
        "routing": routing,
    }))
}

#[get("/api/reviews")]
pub async fn get_reviews(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
) -> Result<impl Responder, Error> {
    verify_jwt(&req)?;

    let reviews = sqlx::query_as::<_, Review>(&format!(
        "SELECT {} FROM reviews ORDER BY created_at DESC",
        REVIEW_COLUMNS
    ))
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "reviews": reviews,
    })))
}

#[get("/api/reviews/{id}")]
pub async fn get_review(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
    path: web::Path<String>,
) -> Result<impl Responder, Error> {
    verify_jwt(&req)?;
    let id = path.into_inner();

    let review = sqlx::query_as::<_, Review>(&format!(
        "SELECT {} FROM reviews WHERE id = ?",
        REVIEW_COLUMNS
    ))
    .bind(&id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(db_error)?;

    match review {
        Some(review) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "review": review,
        }))),
        None => Ok(review_not_found()),
    }
}

/// Full replace. The public/private flag is recomputed from the new
/// rating, never taken from the client.
#[put("/api/reviews/{id}")]
pub async fn update_review(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
    path: web::Path<String>,
    form_data: web::Json<ReviewUpdate>,
) -> Result<impl Responder, Error> {
    verify_jwt(&req)?;
    if let Err(errors) = form_data.validate() {
        return Ok(validation_failed(&errors));
    }

    let id = path.into_inner();
    let exists: Option<String> = sqlx::query_scalar("SELECT id FROM reviews WHERE id = ?")
        .bind(&id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(db_error)?;
    if exists.is_none() {
        return Ok(review_not_found());
    }

    let comment = normalize_optional(form_data.comment.clone()).map(|c| clean(&c));
    let customer_name = normalize_optional(form_data.customer_name.clone());
    let customer_email = normalize_optional(form_data.customer_email.clone());

    sqlx::query(
        "UPDATE reviews SET rating = ?, comment = ?, customer_name = ?, customer_email = ?, \
         allow_follow_up = ?, is_public = ?, updated_at = ? WHERE id = ?",
    )
    .bind(form_data.rating)
    .bind(&comment)
    .bind(&customer_name)
    .bind(&customer_email)
    .bind(form_data.allow_follow_up)
    .bind(is_public(form_data.rating))
    .bind(Utc::now())
    .bind(&id)
    .execute(pool.get_ref())
    .await
    .map_err(db_error)?;

    let review = sqlx::query_as::<_, Review>(&format!(
        "SELECT {} FROM reviews WHERE id = ?",
        REVIEW_COLUMNS
    ))
    .bind(&id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(db_error)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "review": review,
    })))
}

#[delete("/api/reviews/{id}")]
pub async fn delete_review(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
    path: web::Path<String>,
) -> Result<impl Responder, Error> {
    verify_jwt(&req)?;
    let id = path.into_inner();

    let result = sqlx::query("DELETE FROM reviews WHERE id = ?")
        .bind(&id)
        .execute(pool.get_ref())
        .await
        .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Ok(review_not_found());
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Review deleted successfully",
    })))
}

fn review_not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "success": false,
        "error": "Review not found",
    }))
}
