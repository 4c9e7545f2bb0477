use serde::Serialize;
use url::Url;
use validator::{ValidationError, ValidationErrors};

/// One entry of the `details` array in a 400 response.
#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Flattens derive-generated validation errors into the wire shape, sorted
/// by field name for stable output.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut details: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect();
    details.sort_by(|a, b| a.field.cmp(&b.field));
    details
}

/// Collapses empty or whitespace-only optional strings to absent.
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

pub fn validate_customer_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(invalid("required", "Customer name is required"));
    }
    if name.chars().count() > 100 {
        return Err(invalid(
            "length",
            "Customer name must be less than 100 characters",
        ));
    }
    Ok(())
}

pub fn validate_business_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(invalid("required", "Business name is required"));
    }
    if name.chars().count() > 100 {
        return Err(invalid(
            "length",
            "Business name must be less than 100 characters",
        ));
    }
    Ok(())
}

pub const ISSUE_CATEGORIES: [&str; 8] = [
    "service_quality",
    "staff_behavior",
    "cleanliness",
    "wait_time",
    "pricing",
    "product_quality",
    "communication",
    "other",
];

pub fn validate_issue_category(value: &str) -> Result<(), ValidationError> {
    if ISSUE_CATEGORIES.contains(&value) {
        Ok(())
    } else {
        Err(invalid("category", "Please select an issue category"))
    }
}

/// Loose E.164-style check: optional leading '+', first digit 1-9, at most
/// 16 digits in total, spaces ignored. Empty strings pass (optional field).
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.is_empty() {
        return Ok(());
    }

    let compact: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact.strip_prefix('+').unwrap_or(&compact);

    let mut chars = digits.chars();
    let valid = match chars.next() {
        Some(first) if ('1'..='9').contains(&first) => {
            let rest: Vec<char> = chars.collect();
            rest.len() <= 15 && rest.iter().all(|c| c.is_ascii_digit())
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(invalid("phone", "Please enter a valid phone number"))
    }
}

pub fn validate_optional_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Ok(());
    }
    if validator::validate_email(email) {
        Ok(())
    } else {
        Err(invalid("email", "Invalid email address"))
    }
}

/// Review ids referenced by feedback must at least look like UUIDs.
pub fn validate_review_id(value: &str) -> Result<(), ValidationError> {
    match uuid::Uuid::parse_str(value) {
        Ok(_) => Ok(()),
        Err(_) => Err(invalid("uuid", "Invalid review ID")),
    }
}

fn check_http_url(url: &str, message: &'static str) -> Result<(), ValidationError> {
    if url.is_empty() {
        return Ok(());
    }
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(invalid("url", message)),
    }
}

pub fn validate_google_business_url(url: &str) -> Result<(), ValidationError> {
    check_http_url(url, "Invalid Google Business URL")
}

pub fn validate_logo_url(url: &str) -> Result<(), ValidationError> {
    check_http_url(url, "Invalid logo URL")
}

pub fn validate_website_url(url: &str) -> Result<(), ValidationError> {
    check_http_url(url, "Invalid website URL")
}

pub fn validate_brand_color(color: &str) -> Result<(), ValidationError> {
    if color.is_empty() {
        return Ok(());
    }
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(invalid("color", "Invalid brand color format"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_accepts_loose_e164_shapes() {
        for ok in ["", "+14155552671", "14155552671", "12 345 678", "9"] {
            assert!(validate_phone(ok).is_ok(), "{:?} should pass", ok);
        }
        // 1 + 15 more digits is the longest accepted form
        assert!(validate_phone("1234567890123456").is_ok());
    }

    #[test]
    fn phone_rejects_bad_shapes() {
        for bad in [
            "+04155552671",
            "0800123456",
            "abc",
            "+1 (415) 555-2671",
            "12345678901234567",
            "   ",
        ] {
            assert!(validate_phone(bad).is_err(), "{:?} should fail", bad);
        }
    }

    #[test]
    fn optional_email_allows_empty() {
        assert!(validate_optional_email("").is_ok());
        assert!(validate_optional_email("user@example.com").is_ok());
        assert!(validate_optional_email("not-an-email").is_err());
    }

    #[test]
    fn urls_must_be_http_or_https() {
        assert!(validate_google_business_url("").is_ok());
        assert!(validate_google_business_url("https://g.page/r/biz/review").is_ok());
        assert!(validate_website_url("http://example.com").is_ok());
        assert!(validate_logo_url("notaurl").is_err());
        assert!(validate_website_url("ftp://example.com/x").is_err());
        assert!(validate_logo_url("javascript:alert(1)").is_err());
    }

    #[test]
    fn brand_color_is_a_hex_triplet() {
        assert!(validate_brand_color("").is_ok());
        assert!(validate_brand_color("#2563eb").is_ok());
        assert!(validate_brand_color("#FFFFFF").is_ok());
        assert!(validate_brand_color("2563eb").is_err());
        assert!(validate_brand_color("#25636").is_err());
        assert!(validate_brand_color("#GGGGGG").is_err());
    }

    #[test]
    fn customer_name_bounds() {
        assert!(validate_customer_name("a").is_ok());
        assert!(validate_customer_name(&"x".repeat(100)).is_ok());

        let required = validate_customer_name("   ").unwrap_err();
        assert_eq!(
            required.message.as_deref(),
            Some("Customer name is required")
        );
        assert!(validate_customer_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn issue_category_must_be_a_known_value() {
        assert!(validate_issue_category("service_quality").is_ok());
        assert!(validate_issue_category("other").is_ok());
        assert!(validate_issue_category("").is_err());
        assert!(validate_issue_category("something_else").is_err());
    }

    #[test]
    fn review_id_must_be_a_uuid() {
        assert!(validate_review_id("3f6c0b4e-5f0a-4f7e-9d3b-2a1c8e7d6f50").is_ok());
        assert!(validate_review_id("123").is_err());
    }

    #[test]
    fn normalize_collapses_blank_strings() {
        assert_eq!(normalize_optional(None), None);
        assert_eq!(normalize_optional(Some("".to_string())), None);
        assert_eq!(normalize_optional(Some("   ".to_string())), None);
        assert_eq!(
            normalize_optional(Some("  fine  ".to_string())),
            Some("fine".to_string())
        );
    }

    #[test]
    fn field_errors_flatten_sorted_with_messages() {
        let mut errors = ValidationErrors::new();
        errors.add("rating", invalid("range", "Rating must be between 1 and 5"));
        errors.add("customer_name", invalid("required", "Customer name is required"));

        let details = field_errors(&errors);
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].field, "customer_name");
        assert_eq!(details[0].message, "Customer name is required");
        assert_eq!(details[1].field, "rating");
        assert_eq!(details[1].message, "Rating must be between 1 and 5");
    }
}
