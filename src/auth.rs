use actix_web::error::InternalError;
use actix_web::{Error, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;

use crate::models::user::User;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub user_id: String,
    pub full_name: Option<String>,
    pub exp: usize,
}

pub fn generate_jwt(user: &User) -> Result<String, jsonwebtoken::errors::Error> {
    let secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");
    let expiration = Utc::now() + Duration::days(2);

    let claims = Claims {
        sub: user.email.clone(),
        user_id: user.id.clone(),
        full_name: user.full_name.clone(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Resolves the dashboard session from the `access_token` cookie.
pub fn verify_jwt(req: &HttpRequest) -> Result<Claims, Error> {
    let token = match req.cookie("access_token") {
        Some(cookie) => cookie.value().to_string(),
        None => return Err(unauthorized()),
    };

    let secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");
    decode::<Claims>(
        &token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| unauthorized())
}

fn unauthorized() -> Error {
    InternalError::from_response(
        "unauthorized",
        HttpResponse::Unauthorized().json(json!({ "success": false, "error": "Unauthorized" })),
    )
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    fn test_user() -> User {
        User {
            id: "u-1".to_string(),
            email: "owner@example.com".to_string(),
            password_hash: "x".to_string(),
            full_name: Some("Owner".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn jwt_round_trip() {
        env::set_var("JWT_SECRET", "test-secret");
        let token = generate_jwt(&test_user()).unwrap();
        let req = TestRequest::default()
            .cookie(Cookie::new("access_token", token))
            .to_http_request();

        let claims = verify_jwt(&req).unwrap();
        assert_eq!(claims.sub, "owner@example.com");
        assert_eq!(claims.user_id, "u-1");
        assert_eq!(claims.full_name.as_deref(), Some("Owner"));
    }

    #[test]
    fn missing_cookie_is_unauthorized() {
        env::set_var("JWT_SECRET", "test-secret");
        let req = TestRequest::default().to_http_request();
        assert!(verify_jwt(&req).is_err());
    }

    #[test]
    fn garbage_token_is_unauthorized() {
        env::set_var("JWT_SECRET", "test-secret");
        let req = TestRequest::default()
            .cookie(Cookie::new("access_token", "not-a-jwt"))
            .to_http_request();
        assert!(verify_jwt(&req).is_err());
    }
}
