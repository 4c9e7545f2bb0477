use actix_multipart::Multipart;
use actix_web::{error, get, post, put, web, Error, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use futures_util::TryStreamExt;
use sanitize_filename::sanitize;
use serde_json::json;
use sqlx::{MySql, Pool};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use validator::Validate;

use crate::auth::verify_jwt;
use crate::models::settings::{AppSettings, SettingsUpdate};
use crate::rate_limit::RateLimiter;
use crate::utils::{api_base_url, get_ip_address};

use super::{db_error, server_error, too_many_requests, validation_failed};

const LOGO_DIR: &str = "./uploads/logos";
const MAX_LOGO_BYTES: usize = 5 * 1024 * 1024;
const ALLOWED_LOGO_TYPES: [(&str, &str); 4] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/svg+xml", "svg"),
];

#[get("/api/app-settings")]
pub async fn get_app_settings(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
) -> Result<impl Responder, Error> {
    verify_jwt(&req)?;

    let settings = AppSettings::load(pool.get_ref()).await.map_err(db_error)?;

    match settings {
        Some(settings) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "settings": settings,
        }))),
        None => Ok(HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "App settings not initialized",
        }))),
    }
}

#[put("/api/app-settings")]
pub async fn update_app_settings(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
    form_data: web::Json<SettingsUpdate>,
) -> Result<impl Responder, Error> {
    verify_jwt(&req)?;
    if let Err(errors) = form_data.validate() {
        return Ok(validation_failed(&errors));
    }

    let settings = AppSettings::save(pool.get_ref(), &form_data)
        .await
        .map_err(db_error)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "settings": settings,
    })))
}

/// Multipart logo upload. Accepts one `file` part, stores it under
/// ./uploads/logos and points the settings row at it.
#[post("/api/upload/logo")]
pub async fn upload_logo(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
    limiter: web::Data<RateLimiter>,
    mut payload: Multipart,
) -> Result<impl Responder, Error> {
    let ip_address = get_ip_address(&req);
    let decision = limiter.check("upload:logo", &ip_address, 10, Duration::from_secs(60));
    if !decision.ok {
        return Ok(too_many_requests(
            &decision,
            "Too many upload attempts. Please try again later.",
        ));
    }
    verify_jwt(&req)?;

    while let Some(mut field) = payload.try_next().await.map_err(error::ErrorBadRequest)? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default();
        let Some((_, extension)) = ALLOWED_LOGO_TYPES
            .iter()
            .find(|(mime, _)| *mime == content_type)
        else {
            return Ok(HttpResponse::BadRequest().json(json!({
                "success": false,
                "error": "Invalid file type. Only JPEG, PNG, WebP, and SVG are allowed.",
            })));
        };

        let original = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .unwrap_or("logo");
        let stem = sanitize(
            Path::new(original)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("logo"),
        );

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(error::ErrorBadRequest)? {
            if data.len() + chunk.len() > MAX_LOGO_BYTES {
                return Ok(HttpResponse::BadRequest().json(json!({
                    "success": false,
                    "error": "File size too large. Maximum size is 5MB.",
                })));
            }
            data.extend_from_slice(&chunk);
        }

        fs::create_dir_all(LOGO_DIR).map_err(|e| {
            log::error!("Could not create upload directory: {:?}", e);
            server_error("Failed to store file")
        })?;

        let file_name = format!("{}_{}.{}", Utc::now().timestamp(), stem, extension);
        let file_path = format!("{}/{}", LOGO_DIR, file_name);
        let mut file = fs::File::create(&file_path).map_err(|e| {
            log::error!("Could not create {}: {:?}", file_path, e);
            server_error("Failed to store file")
        })?;
        file.write_all(&data).map_err(|e| {
            log::error!("Could not write {}: {:?}", file_path, e);
            server_error("Failed to store file")
        })?;

        let logo_url = format!("{}/uploads/logos/{}", api_base_url(), file_name);
        AppSettings::set_logo_url(pool.get_ref(), &logo_url)
            .await
            .map_err(db_error)?;

        return Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "logo_url": logo_url,
            "file_name": file_name,
            "file_size": data.len(),
            "file_type": content_type,
        })));
    }

    Ok(HttpResponse::BadRequest().json(json!({
        "success": false,
        "error": "No file provided",
    })))
}
