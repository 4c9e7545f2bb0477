use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::MySqlPool;
use validator::Validate;

use crate::validation::normalize_optional;

const DEFAULT_BRAND_COLOR: &str = "#2563eb";
const DEFAULT_WELCOME_MESSAGE: &str = "How was your experience with us?";
const DEFAULT_THANK_YOU_MESSAGE: &str = "Thank you for your feedback!";

/// The single business configuration row. A missing row means the app has
/// never been configured, which callers treat as a first-class state.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AppSettings {
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub google_business_url: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub brand_color: String,
    pub welcome_message: String,
    pub thank_you_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Update payload; blank optionals collapse to NULL before persisting.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SettingsUpdate {
    #[validate(custom = "crate::validation::validate_business_name")]
    pub name: String,
    #[validate(length(max = 500, message = "Description must be less than 500 characters"))]
    pub description: Option<String>,
    #[validate(custom = "crate::validation::validate_logo_url")]
    pub logo_url: Option<String>,
    #[validate(custom = "crate::validation::validate_google_business_url")]
    pub google_business_url: Option<String>,
    #[validate(custom = "crate::validation::validate_phone")]
    pub phone: Option<String>,
    #[validate(custom = "crate::validation::validate_optional_email")]
    pub email: Option<String>,
    #[validate(length(max = 500, message = "Address must be less than 500 characters"))]
    pub address: Option<String>,
    #[validate(custom = "crate::validation::validate_website_url")]
    pub website: Option<String>,
    #[validate(custom = "crate::validation::validate_brand_color")]
    pub brand_color: Option<String>,
    #[validate(length(
        max = 200,
        message = "Welcome message must be less than 200 characters"
    ))]
    pub welcome_message: Option<String>,
    #[validate(length(
        max = 500,
        message = "Thank you message must be less than 500 characters"
    ))]
    pub thank_you_message: Option<String>,
}

/// The exact column values a `SettingsUpdate` persists.
#[derive(Debug, PartialEq)]
pub struct NormalizedSettings {
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub google_business_url: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub brand_color: String,
    pub welcome_message: String,
    pub thank_you_message: String,
}

impl SettingsUpdate {
    pub fn normalized(&self) -> NormalizedSettings {
        NormalizedSettings {
            name: self.name.trim().to_string(),
            description: normalize_optional(self.description.clone()),
            logo_url: normalize_optional(self.logo_url.clone()),
            google_business_url: normalize_optional(self.google_business_url.clone()),
            phone: normalize_optional(self.phone.clone()),
            email: normalize_optional(self.email.clone()),
            address: normalize_optional(self.address.clone()),
            website: normalize_optional(self.website.clone()),
            brand_color: normalize_optional(self.brand_color.clone())
                .unwrap_or_else(|| DEFAULT_BRAND_COLOR.to_string()),
            welcome_message: normalize_optional(self.welcome_message.clone())
                .unwrap_or_else(|| DEFAULT_WELCOME_MESSAGE.to_string()),
            thank_you_message: normalize_optional(self.thank_you_message.clone())
                .unwrap_or_else(|| DEFAULT_THANK_YOU_MESSAGE.to_string()),
        }
    }
}

impl AppSettings {
    pub async fn load(pool: &MySqlPool) -> Result<Option<AppSettings>, sqlx::Error> {
        sqlx::query_as::<_, AppSettings>(
            "SELECT name, description, logo_url, google_business_url, phone, email, address, \
             website, brand_color, welcome_message, thank_you_message, created_at, updated_at \
             FROM app_settings LIMIT 1",
        )
        .fetch_optional(pool)
        .await
    }

    /// Upserts the singleton row. Update-first inside a transaction, so a
    /// second row can never appear.
    pub async fn save(pool: &MySqlPool, update: &SettingsUpdate) -> Result<AppSettings, sqlx::Error> {
        let values = update.normalized();
        let mut tx = pool.begin().await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM app_settings")
            .fetch_one(&mut *tx)
            .await?;

        if existing > 0 {
            sqlx::query(
                "UPDATE app_settings SET name = ?, description = ?, logo_url = ?, \
                 google_business_url = ?, phone = ?, email = ?, address = ?, website = ?, \
                 brand_color = ?, welcome_message = ?, thank_you_message = ?",
            )
            .bind(&values.name)
            .bind(&values.description)
            .bind(&values.logo_url)
            .bind(&values.google_business_url)
            .bind(&values.phone)
            .bind(&values.email)
            .bind(&values.address)
            .bind(&values.website)
            .bind(&values.brand_color)
            .bind(&values.welcome_message)
            .bind(&values.thank_you_message)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                "INSERT INTO app_settings (name, description, logo_url, google_business_url, \
                 phone, email, address, website, brand_color, welcome_message, thank_you_message) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&values.name)
            .bind(&values.description)
            .bind(&values.logo_url)
            .bind(&values.google_business_url)
            .bind(&values.phone)
            .bind(&values.email)
            .bind(&values.address)
            .bind(&values.website)
            .bind(&values.brand_color)
            .bind(&values.welcome_message)
            .bind(&values.thank_you_message)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Self::load(pool).await?.ok_or(sqlx::Error::RowNotFound)
    }

    /// Points the singleton at a freshly stored logo file.
    pub async fn set_logo_url(pool: &MySqlPool, logo_url: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE app_settings SET logo_url = ?")
            .bind(logo_url)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(value: serde_json::Value) -> SettingsUpdate {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn blank_urls_normalize_to_absent() {
        let payload = update(json!({
            "name": "All Fresh Cleaning",
            "google_business_url": "",
            "website": "   ",
            "logo_url": "https://cdn.example.com/logo.png"
        }));
        assert!(payload.validate().is_ok());

        let values = payload.normalized();
        assert_eq!(values.google_business_url, None);
        assert_eq!(values.website, None);
        assert_eq!(
            values.logo_url.as_deref(),
            Some("https://cdn.example.com/logo.png")
        );
    }

    #[test]
    fn branding_fields_fall_back_to_defaults() {
        let values = update(json!({ "name": "Studio" })).normalized();
        assert_eq!(values.brand_color, DEFAULT_BRAND_COLOR);
        assert_eq!(values.welcome_message, DEFAULT_WELCOME_MESSAGE);
        assert_eq!(values.thank_you_message, DEFAULT_THANK_YOU_MESSAGE);
    }

    #[test]
    fn invalid_fields_are_reported_per_field() {
        let payload = update(json!({
            "name": "",
            "google_business_url": "not a url",
            "brand_color": "blue"
        }));
        let errors = payload.validate().unwrap_err();
        let details = crate::validation::field_errors(&errors);
        let fields: Vec<&str> = details.iter().map(|d| d.field.as_str()).collect();
        assert_eq!(fields, ["brand_color", "google_business_url", "name"]);
    }

    #[test]
    fn unknown_settings_keys_are_rejected() {
        let result: Result<SettingsUpdate, _> =
            serde_json::from_value(json!({ "name": "Studio", "id": 2 }));
        assert!(result.is_err());
    }
}
