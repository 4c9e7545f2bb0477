pub mod analytics_controller;
pub mod auth_controller;
pub mod feedback_controller;
pub mod health_controller;
pub mod review_controller;
pub mod seo_controller;
pub mod settings_controller;
pub mod sharing_controller;

use actix_web::error::InternalError;
use actix_web::http::header;
use actix_web::HttpResponse;
use serde_json::json;
use validator::ValidationErrors;

use crate::rate_limit::Decision;
use crate::validation::field_errors;

/// 400 with the per-field messages the frontend renders next to inputs.
pub(crate) fn validation_failed(errors: &ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "success": false,
        "error": "Invalid form data",
        "details": field_errors(errors),
    }))
}

/// 429 carrying a Retry-After hint from the limiter decision.
pub(crate) fn too_many_requests(decision: &Decision, message: &str) -> HttpResponse {
    HttpResponse::TooManyRequests()
        .insert_header((header::RETRY_AFTER, decision.retry_after_secs().to_string()))
        .json(json!({
            "success": false,
            "error": message,
        }))
}

/// Uniform 500 for match-style handlers. The step only reaches the log,
/// never the client.
pub(crate) fn sql_error(step: &str, e: sqlx::Error) -> HttpResponse {
    log::error!("Database error during {}: {:?}", step, e);
    HttpResponse::InternalServerError().json(json!({
        "success": false,
        "error": "Database error",
    }))
}

/// Actix error wrapping a JSON 500 envelope, for `?`-style handlers.
pub(crate) fn server_error(message: &str) -> actix_web::Error {
    InternalError::from_response(
        message.to_string(),
        HttpResponse::InternalServerError().json(json!({
            "success": false,
            "error": message,
        })),
    )
    .into()
}

pub(crate) fn db_error(e: sqlx::Error) -> actix_web::Error {
    log::error!("Database error: {:?}", e);
    server_error("Database error")
}
