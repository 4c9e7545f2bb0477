use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Review {
    pub id: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub allow_follow_up: bool,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public funnel submission. Visibility is derived server-side from the
/// rating; the payload has no `is_public` field and unknown keys are
/// rejected outright.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ReviewSubmission {
    #[validate(custom = "crate::validation::validate_customer_name")]
    pub customer_name: String,
    #[validate(custom = "crate::validation::validate_phone")]
    pub customer_phone: Option<String>,
    #[validate(length(max = 1000, message = "Comment must be less than 1000 characters"))]
    pub comment: Option<String>,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
}

/// Management-side edit; replaces the editable columns wholesale.
#[derive(Debug, Deserialize, Validate)]
pub struct ReviewUpdate {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(max = 1000, message = "Comment must be less than 1000 characters"))]
    pub comment: Option<String>,
    #[validate(length(max = 100, message = "Customer name must be less than 100 characters"))]
    pub customer_name: Option<String>,
    #[validate(custom = "crate::validation::validate_optional_email")]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub allow_follow_up: bool,
}

/// Private feedback form body. `allow_follow_up` is deliberately required:
/// the form forces an explicit consent choice.
#[derive(Debug, Deserialize, Validate)]
pub struct FeedbackSubmission {
    #[validate(custom = "crate::validation::validate_review_id")]
    pub review_id: Option<String>,
    #[validate(custom = "crate::validation::validate_issue_category")]
    pub issue_category: String,
    #[validate(length(
        min = 10,
        message = "Please provide at least 10 characters of feedback"
    ))]
    pub detailed_feedback: String,
    #[validate(custom = "crate::validation::validate_optional_email")]
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub allow_follow_up: bool,
}
