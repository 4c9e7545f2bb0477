use actix_web::http::header;
use actix_web::{get, post, web, Error, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::prelude::FromRow;
use sqlx::{MySql, Pool};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::auth::verify_jwt;
use crate::models::analytics::{
    average_rating, conversion_rate, daily_trends, insert_event, link_click_stats,
    rating_distribution, review_growth, seven_day_averages, trend_rows, AnalyticsEvent,
    Granularity, RatingSample, METRIC_INTERNAL_FEEDBACK, METRIC_LINK_CLICK,
};
use crate::models::settings::AppSettings;
use crate::rate_limit::RateLimiter;
use crate::routing::is_public;
use crate::utils::{get_ip_address, get_user_agent};

use super::{db_error, sql_error, too_many_requests};

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    period: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    period: Option<String>,
    granularity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    format: Option<String>,
    period: Option<String>,
    include_analytics: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct LinkTrackingPayload {
    pub link_type: Option<String>,
    pub source: Option<String>,
    pub referrer: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize, FromRow)]
struct ExportRow {
    id: String,
    rating: i32,
    comment: Option<String>,
    customer_name: Option<String>,
    customer_email: Option<String>,
    allow_follow_up: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Non-numeric or out-of-range periods collapse to the default rather
/// than erroring.
fn period_days(period: &Option<String>, default: i64) -> i64 {
    period
        .as_deref()
        .and_then(|p| p.parse::<i64>().ok())
        .unwrap_or(default)
        .clamp(1, 365)
}

async fn rating_samples_since(
    pool: &Pool<MySql>,
    since: DateTime<Utc>,
) -> Result<Vec<RatingSample>, sqlx::Error> {
    sqlx::query_as::<_, RatingSample>(
        "SELECT rating, created_at FROM reviews WHERE created_at >= ? ORDER BY created_at ASC",
    )
    .bind(since)
    .fetch_all(pool)
    .await
}

#[get("/api/analytics")]
pub async fn get_analytics_overview(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
    query: web::Query<PeriodQuery>,
) -> Result<impl Responder, Error> {
    verify_jwt(&req)?;

    let days = period_days(&query.period, 30);
    let since = Utc::now() - chrono::Duration::days(days);

    let samples = rating_samples_since(pool.get_ref(), since)
        .await
        .map_err(db_error)?;
    let feedback_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM analytics WHERE metric_type = ? AND created_at >= ?",
    )
    .bind(METRIC_INTERNAL_FEEDBACK)
    .bind(since)
    .fetch_one(pool.get_ref())
    .await
    .map_err(db_error)?;

    let ratings: Vec<i32> = samples.iter().map(|s| s.rating).collect();
    let total = ratings.len();
    let positive = ratings.iter().filter(|&&r| is_public(r)).count();
    let distribution: BTreeMap<String, usize> = (1..=5)
        .map(|rating| {
            (
                rating.to_string(),
                ratings.iter().filter(|&&r| r == rating).count(),
            )
        })
        .collect();

    Ok(HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "private, max-age=30"))
        .json(json!({
            "success": true,
            "metrics": {
                "total_reviews": total,
                "positive_reviews": positive,
                "internal_feedback": feedback_count,
                "conversion_rate": conversion_rate(positive, total),
            },
            "trends": daily_trends(&samples, days, Utc::now().date_naive()),
            "rating_distribution": distribution,
        })))
}

#[get("/api/analytics/metrics")]
pub async fn get_analytics_metrics(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
    query: web::Query<PeriodQuery>,
) -> Result<impl Responder, Error> {
    verify_jwt(&req)?;

    let days = period_days(&query.period, 30);
    let since = Utc::now() - chrono::Duration::days(days);
    let samples = rating_samples_since(pool.get_ref(), since)
        .await
        .map_err(db_error)?;
    let ratings: Vec<i32> = samples.iter().map(|s| s.rating).collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "metrics": {
            "total_reviews": ratings.len(),
            "average_rating": average_rating(&ratings),
            "rating_distribution": rating_distribution(&ratings),
            "daily_trends": seven_day_averages(&samples, Utc::now().date_naive()),
            "period": days,
        },
    })))
}

#[get("/api/analytics/trends")]
pub async fn get_analytics_trends(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
    query: web::Query<TrendsQuery>,
) -> Result<impl Responder, Error> {
    verify_jwt(&req)?;

    let days = period_days(&query.period, 90);
    let granularity = Granularity::parse(query.granularity.as_deref().unwrap_or("week"));
    let since = Utc::now() - chrono::Duration::days(days);

    let samples = rating_samples_since(pool.get_ref(), since)
        .await
        .map_err(db_error)?;
    let rows = trend_rows(&samples, granularity);
    let growth = review_growth(&rows);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "trends": {
            "data": rows,
            "summary": {
                "total_reviews": samples.len(),
                "review_growth": growth,
                "period": days,
                "granularity": granularity.as_str(),
            },
        },
    })))
}

/// Public click beacon fired by the funnel frontend.
#[post("/api/analytics/link-tracking")]
pub async fn track_link_click(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
    limiter: web::Data<RateLimiter>,
    payload: web::Json<LinkTrackingPayload>,
) -> HttpResponse {
    let Some(link_type) = payload
        .link_type
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    else {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "Missing required fields",
        }));
    };

    let ip_address = get_ip_address(&req);
    let decision = limiter.check("tracking:post", &ip_address, 60, Duration::from_secs(60));
    if !decision.ok {
        return too_many_requests(&decision, "Too many requests. Please try again later.");
    }

    let mut metadata = json!({
        "link_type": link_type,
        "source": payload.source,
        "referrer": payload.referrer,
        "user_agent": get_user_agent(&req),
        "ip_address": ip_address,
        "timestamp": Utc::now().to_rfc3339(),
    });
    // client-supplied extras ride along without clobbering the basics
    if let (Value::Object(base), Some(Value::Object(extra))) =
        (&mut metadata, payload.metadata.clone())
    {
        for (key, value) in extra {
            base.entry(key).or_insert(value);
        }
    }

    match insert_event(pool.get_ref(), METRIC_LINK_CLICK, 1, metadata).await {
        Ok(_) => HttpResponse::Created().json(json!({
            "success": true,
            "message": "Link click tracked successfully",
        })),
        Err(e) => sql_error("link click insert", e),
    }
}

#[get("/api/analytics/link-tracking")]
pub async fn get_link_analytics(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
    query: web::Query<PeriodQuery>,
) -> Result<impl Responder, Error> {
    verify_jwt(&req)?;

    let days = period_days(&query.period, 30);
    let since = Utc::now() - chrono::Duration::days(days);

    let events = sqlx::query_as::<_, AnalyticsEvent>(
        "SELECT id, business_id, metric_type, value, metadata, created_at FROM analytics \
         WHERE metric_type = ? AND created_at >= ? ORDER BY created_at ASC",
    )
    .bind(METRIC_LINK_CLICK)
    .bind(since)
    .fetch_all(pool.get_ref())
    .await
    .map_err(db_error)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "analytics": link_click_stats(&events),
    })))
}

#[get("/api/analytics/export")]
pub async fn export_reviews(
    req: HttpRequest,
    pool: web::Data<Pool<MySql>>,
    query: web::Query<ExportQuery>,
) -> Result<impl Responder, Error> {
    let claims = verify_jwt(&req)?;

    let format = query.format.as_deref().unwrap_or("csv");
    if format != "csv" && format != "json" {
        return Ok(HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "Invalid form data",
            "details": [{"field": "format", "message": "Expected csv or json"}],
        })));
    }

    let period = query
        .period
        .as_deref()
        .and_then(|p| p.parse::<i64>().ok())
        .map(|days| days.clamp(1, 365));

    let rows = match period {
        Some(days) => {
            let since = Utc::now() - chrono::Duration::days(days);
            sqlx::query_as::<_, ExportRow>(
                "SELECT id, rating, comment, customer_name, customer_email, allow_follow_up, \
                 created_at, updated_at FROM reviews WHERE created_at >= ? \
                 ORDER BY created_at DESC",
            )
            .bind(since)
            .fetch_all(pool.get_ref())
            .await
        }
        None => {
            sqlx::query_as::<_, ExportRow>(
                "SELECT id, rating, comment, customer_name, customer_email, allow_follow_up, \
                 created_at, updated_at FROM reviews ORDER BY created_at DESC",
            )
            .fetch_all(pool.get_ref())
            .await
        }
    }
    .map_err(db_error)?;

    let business_name = AppSettings::load(pool.get_ref())
        .await
        .map_err(db_error)?
        .map(|s| s.name)
        .unwrap_or_default();

    if format == "csv" {
        let file_name = format!("reviews-export-{}.csv", Utc::now().format("%Y-%m-%d"));
        return Ok(HttpResponse::Ok()
            .content_type("text/csv")
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ))
            .body(reviews_csv(&rows, &business_name)));
    }

    let data: Vec<Value> = rows
        .iter()
        .map(|row| {
            json!({
                "id": row.id,
                "business_name": business_name,
                "rating": row.rating,
                "comment": row.comment,
                "customer_name": row.customer_name,
                "customer_email": row.customer_email,
                "allow_follow_up": row.allow_follow_up,
                "created_at": row.created_at,
                "updated_at": row.updated_at,
            })
        })
        .collect();

    let analytics = if query.include_analytics.unwrap_or(true) {
        let ratings: Vec<i32> = rows.iter().map(|r| r.rating).collect();
        json!({
            "total_reviews": ratings.len(),
            "average_rating": average_rating(&ratings),
            "rating_distribution": rating_distribution(&ratings),
            "export_date": Utc::now().to_rfc3339(),
            "period": period,
        })
    } else {
        Value::Null
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": data,
        "analytics": analytics,
        "metadata": {
            "format": "json",
            "total_records": rows.len(),
            "exported_at": Utc::now().to_rfc3339(),
            "user_id": claims.user_id,
        },
    })))
}

fn csv_escape(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn reviews_csv(rows: &[ExportRow], business_name: &str) -> String {
    let mut out = String::from(
        "ID,Business Name,Rating,Comment,Customer Name,Customer Email,\
         Allow Follow Up,Created At,Updated At\n",
    );
    for row in rows {
        let cells = [
            row.id.clone(),
            business_name.to_string(),
            row.rating.to_string(),
            row.comment.clone().unwrap_or_default(),
            row.customer_name.clone().unwrap_or_default(),
            row.customer_email.clone().unwrap_or_default(),
            if row.allow_follow_up { "Yes" } else { "No" }.to_string(),
            row.created_at.to_rfc3339(),
            row.updated_at.to_rfc3339(),
        ];
        let line: Vec<String> = cells.iter().map(|cell| csv_escape(cell)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(rating: i32, comment: Option<&str>) -> ExportRow {
        let at = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        ExportRow {
            id: "r-1".to_string(),
            rating,
            comment: comment.map(|c| c.to_string()),
            customer_name: Some("Dana".to_string()),
            customer_email: None,
            allow_follow_up: true,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn period_parsing_clamps_and_defaults() {
        assert_eq!(period_days(&Some("30".to_string()), 90), 30);
        assert_eq!(period_days(&Some("9999".to_string()), 90), 365);
        assert_eq!(period_days(&Some("0".to_string()), 90), 1);
        assert_eq!(period_days(&Some("abc".to_string()), 90), 90);
        assert_eq!(period_days(&None, 90), 90);
    }

    #[test]
    fn csv_has_header_and_quoted_cells() {
        let csv = reviews_csv(&[row(5, Some("Great place"))], "Aurora Cafe");
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "ID,Business Name,Rating,Comment,Customer Name,Customer Email,\
             Allow Follow Up,Created At,Updated At"
        );
        let data = lines.next().unwrap();
        assert!(data.starts_with("\"r-1\",\"Aurora Cafe\",\"5\",\"Great place\""));
        assert!(data.contains("\"Yes\""));
    }

    #[test]
    fn csv_doubles_embedded_quotes() {
        let csv = reviews_csv(&[row(3, Some("said \"meh\""))], "Aurora Cafe");
        assert!(csv.contains("\"said \"\"meh\"\"\""));
    }

    #[test]
    fn csv_leaves_missing_fields_empty() {
        let csv = reviews_csv(&[row(4, None)], "Aurora Cafe");
        assert!(csv.contains("\"4\",\"\",\"Dana\""));
    }
}
