use actix_web::http::header;
use actix_web::HttpRequest;
use std::env;

/// Client IP as seen through the usual proxy headers, falling back to the
/// peer address. Returns "unknown" when nothing is available.
pub fn get_ip_address(req: &HttpRequest) -> String {
    req.headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            req.headers()
                .get("X-Real-IP")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
        })
        .or_else(|| {
            req.headers()
                .get("CF-Connecting-IP")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
        })
        .or_else(|| {
            req.connection_info()
                .realip_remote_addr()
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn get_user_agent(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Public base URL of the funnel frontend, used for review links, share
/// URLs, QR payloads and sitemap entries.
pub fn app_base_url() -> String {
    env::var("APP_URL")
        .unwrap_or_else(|_| "http://localhost:3000".to_string())
        .trim_end_matches('/')
        .to_string()
}

/// Base URL this API is reachable at. Uploaded files are served from here,
/// not from the frontend origin.
pub fn api_base_url() -> String {
    env::var("API_URL")
        .unwrap_or_else(|_| "http://localhost:8000".to_string())
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn ip_prefers_first_forwarded_for_entry() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .insert_header(("X-Real-IP", "198.51.100.2"))
            .to_http_request();
        assert_eq!(get_ip_address(&req), "203.0.113.7");
    }

    #[test]
    fn ip_falls_back_to_real_ip_then_cf() {
        let req = TestRequest::default()
            .insert_header(("X-Real-IP", "198.51.100.2"))
            .to_http_request();
        assert_eq!(get_ip_address(&req), "198.51.100.2");

        let req = TestRequest::default()
            .insert_header(("CF-Connecting-IP", "192.0.2.9"))
            .to_http_request();
        assert_eq!(get_ip_address(&req), "192.0.2.9");
    }

    #[test]
    fn ip_is_unknown_without_headers_or_peer() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(get_ip_address(&req), "unknown");
    }

    #[test]
    fn user_agent_is_optional() {
        let req = TestRequest::default()
            .insert_header(("User-Agent", "Mozilla/5.0"))
            .to_http_request();
        assert_eq!(get_user_agent(&req).as_deref(), Some("Mozilla/5.0"));

        let req = TestRequest::default().to_http_request();
        assert_eq!(get_user_agent(&req), None);
    }
}
