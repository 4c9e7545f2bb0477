use actix_web::{post, web, HttpRequest, HttpResponse};
use ammonia::clean;
use chrono::Utc;
use serde_json::json;
use sqlx::{MySql, Pool};
use std::time::Duration;
use validator::Validate;

use crate::models::analytics::{insert_event, METRIC_INTERNAL_FEEDBACK};
use crate::models::review::FeedbackSubmission;
use crate::rate_limit::RateLimiter;
use crate::utils::{get_ip_address, get_user_agent};
use crate::validation::normalize_optional;

use super::{too_many_requests, validation_failed};

const SUBMIT_LIMIT: u32 = 5;
const SUBMIT_WINDOW: Duration = Duration::from_secs(60);

/// Private intake for low ratings. The analytics event row is the
/// feedback record itself, so the insert is awaited.
#[post("/api/feedback")]
pub async fn submit_feedback(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
    limiter: web::Data<RateLimiter>,
    form_data: web::Json<FeedbackSubmission>,
) -> HttpResponse {
    if let Err(errors) = form_data.validate() {
        return validation_failed(&errors);
    }

    let ip_address = get_ip_address(&req);
    let decision = limiter.check("feedback:post", &ip_address, SUBMIT_LIMIT, SUBMIT_WINDOW);
    if !decision.ok {
        return too_many_requests(
            &decision,
            "Too many feedback submissions. Please try again later.",
        );
    }

    let detailed_feedback = clean(form_data.detailed_feedback.trim());
    let submitted_at = Utc::now();

    let metadata = json!({
        "review_id": form_data.review_id,
        "issue_category": form_data.issue_category,
        "detailed_feedback": detailed_feedback,
        "contact_email": normalize_optional(form_data.contact_email.clone()),
        "contact_phone": normalize_optional(form_data.contact_phone.clone()),
        "allow_follow_up": form_data.allow_follow_up,
        "submitted_at": submitted_at.to_rfc3339(),
        "user_agent": get_user_agent(&req),
        "ip_address": ip_address,
    });

    match insert_event(pool.get_ref(), METRIC_INTERNAL_FEEDBACK, 1, metadata).await {
        Ok(id) => HttpResponse::Created().json(json!({
            "success": true,
            "feedback": {
                "id": id,
                "submitted_at": submitted_at.to_rfc3339(),
            },
        })),
        Err(e) => {
            log::error!("Feedback insert failed: {:?}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to save feedback. Please try again.",
            }))
        }
    }
}
