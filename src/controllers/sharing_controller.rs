use actix_web::{post, web, Error, HttpRequest, HttpResponse, Responder};
use ammonia::clean;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageFormat, Luma};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};
use serde::Deserialize;
use serde_json::json;
use sqlx::{MySql, Pool};
use std::io::Cursor;
use std::time::Duration;
use validator::Validate;

use crate::auth::verify_jwt;
use crate::models::analytics::insert_link_tracking;
use crate::models::settings::AppSettings;
use crate::rate_limit::RateLimiter;
use crate::utils::{app_base_url, get_ip_address};
use crate::validation::normalize_optional;

use super::{db_error, server_error, sql_error, too_many_requests, validation_failed};

// Matches JavaScript's encodeURIComponent: alphanumerics and -_.!~*'()
// pass through untouched.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const SHARE_PLATFORMS: [&str; 6] = [
    "whatsapp", "email", "sms", "facebook", "twitter", "linkedin",
];

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

fn default_share_message(business_name: &str, review_url: &str) -> String {
    format!(
        "Please share your experience with {}: {}",
        business_name, review_url
    )
}

/// Deep link for one platform, or None when the platform is unknown.
/// Message-based targets carry the text, link-based ones just the URL.
fn build_share_url(
    platform: &str,
    message: &str,
    review_url: &str,
    business_name: &str,
) -> Option<String> {
    let encoded_message = encode_component(message);
    let encoded_url = encode_component(review_url);

    match platform {
        "whatsapp" => Some(format!("https://wa.me/?text={}", encoded_message)),
        "email" => Some(format!(
            "mailto:?subject=Share your experience with {}&body={}",
            business_name, encoded_message
        )),
        "sms" => Some(format!("sms:?body={}", encoded_message)),
        "facebook" => Some(format!(
            "https://www.facebook.com/sharer/sharer.php?u={}",
            encoded_url
        )),
        "twitter" => Some(format!(
            "https://twitter.com/intent/tweet?text={}",
            encoded_message
        )),
        "linkedin" => Some(format!(
            "https://www.linkedin.com/sharing/share-offsite/?url={}",
            encoded_url
        )),
        _ => None,
    }
}

fn qr_png_data_url(url: &str, size: u32) -> Result<String, String> {
    let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::M)
        .map_err(|e| format!("QR encoding failed: {:?}", e))?;
    let image = code.render::<Luma<u8>>().min_dimensions(size, size).build();

    let mut png: Vec<u8> = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| format!("PNG encoding failed: {:?}", e))?;

    Ok(format!("data:image/png;base64,{}", STANDARD.encode(&png)))
}

fn qr_png_base64(url: &str, size: u32) -> Result<String, String> {
    qr_png_data_url(url, size).map(|data_url| {
        data_url
            .trim_start_matches("data:image/png;base64,")
            .to_string()
    })
}

fn qr_svg(url: &str, size: u32) -> Result<String, String> {
    let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::M)
        .map_err(|e| format!("QR encoding failed: {:?}", e))?;
    Ok(code
        .render::<svg::Color>()
        .min_dimensions(size, size)
        .build())
}

#[derive(Debug, Deserialize)]
pub struct QrGeneratePayload {
    pub size: Option<String>,
    pub include_tracking: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QrCodePayload {
    #[validate(range(min = 100, max = 1000, message = "Size must be between 100 and 1000"))]
    pub size: Option<u32>,
    pub include_logo: Option<bool>,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SharePayload {
    #[validate(length(max = 500, message = "Custom message must be less than 500 characters"))]
    pub custom_message: Option<String>,
}

/// Public QR endpoint used by the funnel itself. Named sizes only.
#[post("/api/qr-generate")]
pub async fn generate_qr(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
    limiter: web::Data<RateLimiter>,
    payload: web::Json<QrGeneratePayload>,
) -> HttpResponse {
    let size_label = payload.size.clone().unwrap_or_else(|| "medium".to_string());
    let pixels = match size_label.as_str() {
        "small" => 128,
        "medium" => 256,
        "large" => 512,
        _ => {
            return HttpResponse::BadRequest().json(json!({
                "success": false,
                "error": "Invalid form data",
                "details": [{"field": "size", "message": "Expected small, medium, or large"}],
            }))
        }
    };

    let ip_address = get_ip_address(&req);
    let decision = limiter.check("qr:post", &ip_address, 20, Duration::from_secs(60));
    if !decision.ok {
        return too_many_requests(&decision, "Too many requests. Please try again later.");
    }

    let settings = match AppSettings::load(pool.get_ref()).await {
        Ok(Some(settings)) => settings,
        Ok(None) => {
            return HttpResponse::NotFound().json(json!({
                "success": false,
                "error": "Business not found",
            }))
        }
        Err(e) => return sql_error("settings load", e),
    };

    let review_url = if payload.include_tracking.unwrap_or(true) {
        format!("{}/review?source=qr_code", app_base_url())
    } else {
        format!("{}/review", app_base_url())
    };

    let qr_code = match qr_png_data_url(&review_url, pixels) {
        Ok(data_url) => data_url,
        Err(e) => {
            log::error!("{}", e);
            return HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Failed to generate QR code",
            }));
        }
    };

    if let Err(e) = insert_link_tracking(
        pool.get_ref(),
        "qr_code",
        &review_url,
        json!({ "size": size_label, "source": "qr_generate" }),
    )
    .await
    {
        log::error!("Failed to record QR generation: {:?}", e);
    }

    HttpResponse::Ok().json(json!({
        "success": true,
        "qr_code": qr_code,
        "url": review_url,
        "business_name": settings.name,
        "size": size_label,
    }))
}

/// Dashboard QR endpoint with free pixel sizes and selectable output
/// format.
#[post("/api/sharing/qr-code")]
pub async fn generate_sharing_qr(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
    payload: web::Json<QrCodePayload>,
) -> Result<impl Responder, Error> {
    verify_jwt(&req)?;
    if let Err(errors) = payload.validate() {
        return Ok(validation_failed(&errors));
    }

    let format = payload.format.as_deref().unwrap_or("png");
    if !matches!(format, "png" | "svg" | "base64") {
        return Ok(HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "Invalid form data",
            "details": [{"field": "format", "message": "Expected png, svg, or base64"}],
        })));
    }

    let size = payload.size.unwrap_or(300);
    let include_logo = payload.include_logo.unwrap_or(false);

    let settings = AppSettings::load(pool.get_ref()).await.map_err(db_error)?;
    let Some(settings) = settings else {
        return Ok(HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Business not found",
        })));
    };

    let review_url = format!("{}/review", app_base_url());
    let data = match format {
        "svg" => qr_svg(&review_url, size),
        "base64" => qr_png_base64(&review_url, size),
        _ => qr_png_data_url(&review_url, size),
    }
    .map_err(|e| {
        log::error!("{}", e);
        server_error("Failed to generate QR code")
    })?;

    if let Err(e) = insert_link_tracking(
        pool.get_ref(),
        "qr_code",
        &review_url,
        json!({ "size": size, "format": format, "include_logo": include_logo }),
    )
    .await
    {
        log::error!("Failed to record QR generation: {:?}", e);
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "qr_code": {
            "data": data,
            "url": review_url,
            "business_name": settings.name,
            "format": format,
            "size": size,
        },
    })))
}

/// Prebuilt share deep link for one platform, recorded as a social click.
#[post("/api/share/{platform}")]
pub async fn share_review_link(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
    path: web::Path<String>,
    payload: web::Json<SharePayload>,
) -> Result<impl Responder, Error> {
    verify_jwt(&req)?;
    if let Err(errors) = payload.validate() {
        return Ok(validation_failed(&errors));
    }

    let platform = path.into_inner();
    if !SHARE_PLATFORMS.contains(&platform.as_str()) {
        return Ok(HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "Unsupported platform",
        })));
    }

    let settings = AppSettings::load(pool.get_ref()).await.map_err(db_error)?;
    let Some(settings) = settings else {
        return Ok(HttpResponse::NotFound().json(json!({
            "success": false,
            "error": "Business not found",
        })));
    };

    let review_url = format!("{}/review", app_base_url());
    let custom_message =
        normalize_optional(payload.custom_message.clone()).map(|m| clean(&m));
    let message = custom_message
        .clone()
        .unwrap_or_else(|| default_share_message(&settings.name, &review_url));

    let Some(share_url) = build_share_url(&platform, &message, &review_url, &settings.name)
    else {
        return Ok(HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "Unsupported platform",
        })));
    };

    if let Err(e) = insert_link_tracking(
        pool.get_ref(),
        "social",
        &share_url,
        json!({
            "platform": platform,
            "custom_message": custom_message,
            "share_message": message,
        }),
    )
    .await
    {
        log::error!("Failed to record share link: {:?}", e);
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "share": {
            "platform": platform,
            "url": share_url,
            "message": message,
            "business_name": settings.name,
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_encoding_matches_encode_uri_component() {
        assert_eq!(encode_component("hello world"), "hello%20world");
        assert_eq!(encode_component("it's fine!"), "it's%20fine!");
        assert_eq!(
            encode_component("https://x.example/review?a=b"),
            "https%3A%2F%2Fx.example%2Freview%3Fa%3Db"
        );
        assert_eq!(encode_component("(~star~)"), "(~star~)");
    }

    #[test]
    fn default_message_names_business_and_link() {
        let message = default_share_message("Aurora Cafe", "https://x.example/review");
        assert_eq!(
            message,
            "Please share your experience with Aurora Cafe: https://x.example/review"
        );
    }

    #[test]
    fn message_platforms_carry_encoded_text() {
        let url = build_share_url("whatsapp", "go here: https://x.example/review", "", "").unwrap();
        assert_eq!(
            url,
            "https://wa.me/?text=go%20here%3A%20https%3A%2F%2Fx.example%2Freview"
        );

        let url = build_share_url("sms", "hi there", "", "").unwrap();
        assert_eq!(url, "sms:?body=hi%20there");
    }

    #[test]
    fn email_keeps_subject_readable_but_encodes_body() {
        let url = build_share_url("email", "see link", "", "Aurora Cafe").unwrap();
        assert_eq!(
            url,
            "mailto:?subject=Share your experience with Aurora Cafe&body=see%20link"
        );
    }

    #[test]
    fn link_platforms_carry_the_encoded_url() {
        let url =
            build_share_url("facebook", "ignored", "https://x.example/review", "").unwrap();
        assert_eq!(
            url,
            "https://www.facebook.com/sharer/sharer.php?u=https%3A%2F%2Fx.example%2Freview"
        );

        let url =
            build_share_url("linkedin", "ignored", "https://x.example/review", "").unwrap();
        assert_eq!(
            url,
            "https://www.linkedin.com/sharing/share-offsite/?url=https%3A%2F%2Fx.example%2Freview"
        );
    }

    #[test]
    fn unknown_platform_builds_nothing() {
        assert!(build_share_url("myspace", "m", "u", "b").is_none());
    }

    #[test]
    fn png_output_is_a_data_url() {
        let data_url = qr_png_data_url("https://x.example/review", 128).unwrap();
        assert!(data_url.starts_with("data:image/png;base64,"));
        assert!(data_url.len() > 100);

        let bare = qr_png_base64("https://x.example/review", 128).unwrap();
        assert!(!bare.starts_with("data:"));
    }

    #[test]
    fn svg_output_is_markup() {
        let markup = qr_svg("https://x.example/review", 200).unwrap();
        assert!(markup.contains("<svg"));
        assert!(markup.ends_with("</svg>"));
    }
}
