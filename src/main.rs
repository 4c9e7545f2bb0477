// main.rs
use actix_cors::Cors;
use actix_files::Files;
use actix_web::error::InternalError;
use actix_web::http::header;
use actix_web::middleware::Logger;
use actix_web::web::JsonConfig;
use actix_web::{web, App, HttpResponse, HttpServer};
use dotenv::dotenv;
use serde_json::json;
use std::env;

use reviewflow_backend::controllers::{
    analytics_controller, auth_controller, feedback_controller, health_controller,
    review_controller, seo_controller, settings_controller, sharing_controller,
};
use reviewflow_backend::{db, notifications, rate_limit::RateLimiter};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("starting up...");

    let pool = match db::establish_connection().await {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Failed to initialize database pool: {:?}", e);
            std::process::exit(1);
        }
    };

    // shared across workers; must outlive the factory closure
    let rate_limiter = web::Data::new(RateLimiter::new());

    // keep the handle alive or the cron loop stops
    let _digest_scheduler = match notifications::start_digest_scheduler(pool.clone()).await {
        Ok(scheduler) => scheduler,
        Err(e) => {
            log::error!("Failed to start digest scheduler: {:?}", e);
            None
        }
    };

    let bind_address = env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:8000".to_string());
    log::info!("listening on {}", bind_address);

    HttpServer::new(move || {
        let frontend_origin =
            env::var("FRONTEND_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .supports_credentials()
            .max_age(3600);

        let json_config = JsonConfig::default()
            .limit(1024 * 1024) // form payloads are small
            .content_type_required(false)
            .error_handler(|err, _req| {
                log::warn!("JSON payload error: {}", err);
                let response = HttpResponse::BadRequest().json(json!({
                    "success": false,
                    "error": format!("Invalid JSON payload: {}", err),
                }));
                InternalError::from_response(err, response).into()
            });

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .app_data(rate_limiter.clone())
            .app_data(json_config)
            // public funnel
            .service(review_controller::submit_review)
            .service(feedback_controller::submit_feedback)
            .service(sharing_controller::generate_qr)
            .service(analytics_controller::track_link_click)
            // dashboard: reviews
            .service(review_controller::get_reviews)
            .service(review_controller::get_review)
            .service(review_controller::update_review)
            .service(review_controller::delete_review)
            // dashboard: analytics
            .service(analytics_controller::get_analytics_overview)
            .service(analytics_controller::get_analytics_metrics)
            .service(analytics_controller::get_analytics_trends)
            .service(analytics_controller::get_link_analytics)
            .service(analytics_controller::export_reviews)
            // dashboard: settings and sharing
            .service(settings_controller::get_app_settings)
            .service(settings_controller::update_app_settings)
            .service(settings_controller::upload_logo)
            .service(sharing_controller::generate_sharing_qr)
            .service(sharing_controller::share_review_link)
            // auth
            .service(auth_controller::signup)
            .service(auth_controller::signin)
            .service(auth_controller::signout)
            .service(auth_controller::session)
            // ops and seo
            .service(health_controller::health_check)
            .service(seo_controller::sitemap)
            .service(seo_controller::robots)
            .service(Files::new("/uploads", "./uploads"))
    })
    .bind(bind_address)?
    .run()
    .await
}
