use serde::Serialize;

/// Visibility rule: four stars and up is a public review.
pub fn is_public(rating: i32) -> bool {
    rating >= 4
}

/// Post-submission destination for a just-created review.
///
/// High ratings go to the configured external review platform; if that URL
/// is missing the decision fails closed as a configuration error instead of
/// redirecting anywhere. Low ratings stay internal, carrying the review id
/// so the feedback form can correlate its submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RouteDecision {
    ExternalReview { url: String },
    InternalFeedback { url: String },
    NotConfigured { message: String },
}

impl RouteDecision {
    pub fn decide(rating: i32, review_id: &str, google_business_url: Option<&str>) -> Self {
        if is_public(rating) {
            match google_business_url.map(str::trim).filter(|u| !u.is_empty()) {
                Some(url) => RouteDecision::ExternalReview {
                    url: url.to_string(),
                },
                None => RouteDecision::NotConfigured {
                    message: "Google Business Profile URL is not configured. Please contact the business owner.".to_string(),
                },
            }
        } else {
            RouteDecision::InternalFeedback {
                url: format!("/feedback?review_id={}", review_id),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOGLE_URL: &str = "https://g.page/r/example/review";

    #[test]
    fn visibility_follows_the_four_star_rule() {
        assert!(!is_public(1));
        assert!(!is_public(2));
        assert!(!is_public(3));
        assert!(is_public(4));
        assert!(is_public(5));
    }

    #[test]
    fn high_ratings_route_to_the_configured_url() {
        for rating in [4, 5] {
            let decision = RouteDecision::decide(rating, "r-1", Some(GOOGLE_URL));
            assert_eq!(
                decision,
                RouteDecision::ExternalReview {
                    url: GOOGLE_URL.to_string()
                }
            );
        }
    }

    #[test]
    fn missing_url_fails_closed_for_high_ratings() {
        let decision = RouteDecision::decide(5, "r-1", None);
        match decision {
            RouteDecision::NotConfigured { message } => {
                assert!(message.contains("not configured"));
            }
            other => panic!("expected NotConfigured, got {:?}", other),
        }
    }

    #[test]
    fn blank_url_counts_as_missing() {
        let decision = RouteDecision::decide(4, "r-1", Some("   "));
        assert!(matches!(decision, RouteDecision::NotConfigured { .. }));
    }

    #[test]
    fn low_ratings_route_to_internal_feedback_with_the_review_id() {
        for rating in [1, 2, 3] {
            let decision = RouteDecision::decide(rating, "abc-123", Some(GOOGLE_URL));
            assert_eq!(
                decision,
                RouteDecision::InternalFeedback {
                    url: "/feedback?review_id=abc-123".to_string()
                }
            );
        }
    }

    #[test]
    fn decision_serializes_with_an_action_tag() {
        let json =
            serde_json::to_string(&RouteDecision::decide(5, "r-1", Some(GOOGLE_URL))).unwrap();
        assert!(json.contains("\"action\":\"external_review\""));

        let json = serde_json::to_string(&RouteDecision::decide(2, "r-1", None)).unwrap();
        assert!(json.contains("\"action\":\"internal_feedback\""));
    }
}
