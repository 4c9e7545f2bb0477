use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::{MySql, Pool};
use std::env;

#[get("/api/health")]
pub async fn health_check(pool: web::Data<Pool<MySql>>) -> HttpResponse {
    let timestamp = Utc::now().to_rfc3339();
    let environment = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

    match sqlx::query("SELECT 1").execute(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "timestamp": timestamp,
            "services": {
                "database": "connected",
                "api": "operational",
            },
            "version": env!("CARGO_PKG_VERSION"),
            "environment": environment,
        })),
        Err(e) => {
            log::error!("Health check query failed: {:?}", e);
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "timestamp": timestamp,
                "services": {
                    "database": "disconnected",
                    "api": "operational",
                },
                "version": env!("CARGO_PKG_VERSION"),
                "environment": environment,
            }))
        }
    }
}
