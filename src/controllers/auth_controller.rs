use actix_web::cookie::time::Duration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{get, post, web, Error, HttpRequest, HttpResponse, Responder};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::{MySql, Pool};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{generate_jwt, verify_jwt};
use crate::models::user::User;

use super::{db_error, server_error, validation_failed};

const SESSION_COOKIE: &str = "access_token";
const SESSION_DAYS: i64 = 2;

#[derive(Debug, Deserialize, Validate)]
pub struct SignupData {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 2, message = "Full name must be at least 2 characters"))]
    pub full_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SigninData {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .secure(false)
        .same_site(SameSite::Lax)
        .max_age(Duration::days(SESSION_DAYS))
        .finish()
}

fn invalid_credentials() -> HttpResponse {
    HttpResponse::BadRequest().json(json!({
        "success": false,
        "error": "Invalid login credentials",
    }))
}

#[post("/api/auth/signup")]
pub async fn signup(
    pool: web::Data<Pool<MySql>>,
    form_data: web::Json<SignupData>,
) -> Result<impl Responder, Error> {
    if let Err(errors) = form_data.validate() {
        return Ok(validation_failed(&errors));
    }

    let email = form_data.email.trim().to_lowercase();

    let existing: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(db_error)?;
    if existing.is_some() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "Email already registered",
        })));
    }

    let password_hash = hash(&form_data.password, DEFAULT_COST).map_err(|e| {
        log::error!("Password hashing failed: {:?}", e);
        server_error("Internal server error")
    })?;

    let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        password_hash,
        full_name: Some(form_data.full_name.trim().to_string()),
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, full_name, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.full_name)
    .bind(user.created_at)
    .execute(pool.get_ref())
    .await
    .map_err(db_error)?;

    let token = generate_jwt(&user).map_err(|e| {
        log::error!("JWT generation failed: {:?}", e);
        server_error("Internal server error")
    })?;

    Ok(HttpResponse::Created()
        .cookie(session_cookie(token))
        .json(json!({
            "success": true,
            "user": {
                "id": user.id,
                "email": user.email,
                "full_name": user.full_name,
                "created_at": user.created_at,
            },
            "message": "Account created successfully.",
        })))
}

#[post("/api/auth/signin")]
pub async fn signin(
    pool: web::Data<Pool<MySql>>,
    form_data: web::Json<SigninData>,
) -> Result<impl Responder, Error> {
    if let Err(errors) = form_data.validate() {
        return Ok(validation_failed(&errors));
    }

    let email = form_data.email.trim().to_lowercase();

    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash, full_name, created_at FROM users WHERE email = ?",
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(db_error)?;

    let Some(user) = user else {
        return Ok(invalid_credentials());
    };

    if !verify(&form_data.password, &user.password_hash).unwrap_or(false) {
        return Ok(invalid_credentials());
    }

    let token = generate_jwt(&user).map_err(|e| {
        log::error!("JWT generation failed: {:?}", e);
        server_error("Internal server error")
    })?;

    Ok(HttpResponse::Ok().cookie(session_cookie(token)).json(json!({
        "success": true,
        "user": {
            "id": user.id,
            "email": user.email,
            "full_name": user.full_name,
            "created_at": user.created_at,
        },
    })))
}

#[post("/api/auth/signout")]
pub async fn signout() -> HttpResponse {
    let expired = Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .secure(false)
        .same_site(SameSite::Lax)
        .max_age(Duration::seconds(0))
        .finish();

    HttpResponse::Ok().cookie(expired).json(json!({
        "success": true,
        "message": "Signed out successfully",
    }))
}

#[get("/api/auth/session")]
pub async fn session(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
) -> Result<impl Responder, Error> {
    let claims = match verify_jwt(&req) {
        Ok(claims) => claims,
        Err(_) => {
            return Ok(HttpResponse::Unauthorized().json(json!({
                "success": false,
                "error": "Not authenticated",
            })))
        }
    };

    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash, full_name, created_at FROM users WHERE id = ?",
    )
    .bind(&claims.user_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(db_error)?;

    match user {
        Some(user) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "user": {
                "id": user.id,
                "email": user.email,
                "full_name": user.full_name,
                "created_at": user.created_at,
            },
        }))),
        None => Ok(HttpResponse::Unauthorized().json(json!({
            "success": false,
            "error": "Not authenticated",
        }))),
    }
}
