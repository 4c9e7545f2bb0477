use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::prelude::FromRow;
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::routing::is_public;

pub const METRIC_REVIEW_SUBMITTED: &str = "review_submitted";
pub const METRIC_INTERNAL_FEEDBACK: &str = "internal_feedback";
pub const METRIC_LINK_CLICK: &str = "link_click";

// single-business deployments keep the legacy tenant column constant
pub const DEFAULT_BUSINESS_ID: &str = "default";

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AnalyticsEvent {
    pub id: String,
    pub business_id: String,
    pub metric_type: String,
    pub value: i32,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// Minimal projection used by all review aggregations.
#[derive(Debug, Clone, FromRow)]
pub struct RatingSample {
    pub rating: i32,
    pub created_at: DateTime<Utc>,
}

/// Appends one event row. Returns the generated id.
pub async fn insert_event(
    pool: &MySqlPool,
    metric_type: &str,
    value: i32,
    metadata: Value,
) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO analytics (id, business_id, metric_type, value, metadata) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(DEFAULT_BUSINESS_ID)
    .bind(metric_type)
    .bind(value)
    .bind(&metadata)
    .execute(pool)
    .await?;
    Ok(id)
}

/// Best-effort event emission, detached from the caller. A failed insert is
/// logged and dropped; it never affects the primary write.
pub fn dispatch_event(pool: &MySqlPool, metric_type: &'static str, metadata: Value) {
    let pool = pool.clone();
    tokio::spawn(async move {
        if let Err(e) = insert_event(&pool, metric_type, 1, metadata).await {
            log::error!("Failed to record {} event: {:?}", metric_type, e);
        }
    });
}

/// Records a share/QR link interaction. Returns the generated id.
pub async fn insert_link_tracking(
    pool: &MySqlPool,
    link_type: &str,
    link_url: &str,
    metadata: Value,
) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO link_tracking (id, business_id, link_type, link_url, metadata) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(DEFAULT_BUSINESS_ID)
    .bind(link_type)
    .bind(link_url)
    .bind(&metadata)
    .execute(pool)
    .await?;
    Ok(id)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn average_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i32 = ratings.iter().sum();
    round2(f64::from(sum) / ratings.len() as f64)
}

pub fn conversion_rate(positive: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(positive as f64 / total as f64 * 100.0)
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RatingBucket {
    pub rating: i32,
    pub count: usize,
    pub percentage: f64,
}

pub fn rating_distribution(ratings: &[i32]) -> Vec<RatingBucket> {
    (1..=5)
        .map(|rating| {
            let count = ratings.iter().filter(|&&r| r == rating).count();
            let percentage = if ratings.is_empty() {
                0.0
            } else {
                round2(count as f64 / ratings.len() as f64 * 100.0)
            };
            RatingBucket {
                rating,
                count,
                percentage,
            }
        })
        .collect()
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DailyTrend {
    pub date: String,
    pub count: usize,
    pub positive_count: usize,
    pub negative_count: usize,
}

/// One row per day over the trailing `days` window, oldest first,
/// zero-filled for days without reviews. Negative means rating <= 2.
pub fn daily_trends(samples: &[RatingSample], days: i64, today: NaiveDate) -> Vec<DailyTrend> {
    (0..days)
        .rev()
        .map(|offset| {
            let day = today - Duration::days(offset);
            let of_day: Vec<i32> = samples
                .iter()
                .filter(|s| s.created_at.date_naive() == day)
                .map(|s| s.rating)
                .collect();
            DailyTrend {
                date: day.format("%Y-%m-%d").to_string(),
                count: of_day.len(),
                positive_count: of_day.iter().filter(|&&r| is_public(r)).count(),
                negative_count: of_day.iter().filter(|&&r| r <= 2).count(),
            }
        })
        .collect()
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DailyAverage {
    pub date: String,
    pub reviews: usize,
    pub average_rating: f64,
}

/// Last seven days, oldest first, with per-day averages.
pub fn seven_day_averages(samples: &[RatingSample], today: NaiveDate) -> Vec<DailyAverage> {
    (0..7)
        .rev()
        .map(|offset| {
            let day = today - Duration::days(offset);
            let of_day: Vec<i32> = samples
                .iter()
                .filter(|s| s.created_at.date_naive() == day)
                .map(|s| s.rating)
                .collect();
            DailyAverage {
                date: day.format("%Y-%m-%d").to_string(),
                reviews: of_day.len(),
                average_rating: average_rating(&of_day),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    /// Unknown values fall back to weekly grouping.
    pub fn parse(value: &str) -> Granularity {
        match value {
            "day" => Granularity::Day,
            "month" => Granularity::Month,
            _ => Granularity::Week,
        }
    }

    /// Grouping key: the day itself, the week's Sunday, or the calendar
    /// month.
    pub fn key_for(&self, date: NaiveDate) -> String {
        match self {
            Granularity::Day => date.format("%Y-%m-%d").to_string(),
            Granularity::Week => {
                let start = date - Duration::days(i64::from(date.weekday().num_days_from_sunday()));
                start.format("%Y-%m-%d").to_string()
            }
            Granularity::Month => date.format("%Y-%m").to_string(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TrendBucket {
    pub rating: i32,
    pub count: usize,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TrendRow {
    pub period: String,
    pub reviews: usize,
    pub average_rating: f64,
    pub rating_distribution: Vec<TrendBucket>,
}

pub fn trend_rows(samples: &[RatingSample], granularity: Granularity) -> Vec<TrendRow> {
    let mut groups: BTreeMap<String, Vec<i32>> = BTreeMap::new();
    for sample in samples {
        groups
            .entry(granularity.key_for(sample.created_at.date_naive()))
            .or_default()
            .push(sample.rating);
    }

    groups
        .into_iter()
        .map(|(period, ratings)| TrendRow {
            period,
            reviews: ratings.len(),
            average_rating: average_rating(&ratings),
            rating_distribution: (1..=5)
                .map(|rating| TrendBucket {
                    rating,
                    count: ratings.iter().filter(|&&r| r == rating).count(),
                })
                .collect(),
        })
        .collect()
}

/// Percentage change of the newest bucket against the one before it.
pub fn review_growth(rows: &[TrendRow]) -> f64 {
    if rows.len() < 2 {
        return 0.0;
    }
    let previous = rows[rows.len() - 2].reviews;
    let latest = rows[rows.len() - 1].reviews;
    if previous == 0 {
        return 0.0;
    }
    round2((latest as f64 - previous as f64) / previous as f64 * 100.0)
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DailyCount {
    pub date: String,
    pub count: usize,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LinkClickStats {
    pub total_clicks: usize,
    pub by_source: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub daily_clicks: Vec<DailyCount>,
}

pub fn link_click_stats(events: &[AnalyticsEvent]) -> LinkClickStats {
    let mut by_source: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
    let mut daily: BTreeMap<String, usize> = BTreeMap::new();

    for event in events {
        let source = event
            .metadata
            .as_ref()
            .and_then(|m| m.get("source"))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let link_type = event
            .metadata
            .as_ref()
            .and_then(|m| m.get("link_type"))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        *by_source.entry(source).or_default() += 1;
        *by_type.entry(link_type).or_default() += 1;
        *daily
            .entry(event.created_at.date_naive().format("%Y-%m-%d").to_string())
            .or_default() += 1;
    }

    LinkClickStats {
        total_clicks: events.len(),
        by_source,
        by_type,
        daily_clicks: daily
            .into_iter()
            .map(|(date, count)| DailyCount { date, count })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample(rating: i32, y: i32, m: u32, d: u32) -> RatingSample {
        RatingSample {
            rating,
            created_at: Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn average_is_rounded_and_zero_safe() {
        assert_eq!(average_rating(&[5, 5, 4, 2, 1]), 3.4);
        assert_eq!(average_rating(&[]), 0.0);
        assert_eq!(average_rating(&[4, 4, 5]), 4.33);
    }

    #[test]
    fn distribution_counts_and_percentages() {
        let buckets = rating_distribution(&[5, 5, 4, 2, 1]);
        let counts: Vec<usize> = buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, [1, 1, 0, 1, 2]);
        assert_eq!(buckets[4].percentage, 40.0);
        assert_eq!(buckets[2].percentage, 0.0);
    }

    #[test]
    fn empty_distribution_has_no_nan() {
        for bucket in rating_distribution(&[]) {
            assert_eq!(bucket.count, 0);
            assert_eq!(bucket.percentage, 0.0);
        }
    }

    #[test]
    fn conversion_rate_is_zero_guarded() {
        assert_eq!(conversion_rate(3, 5), 60.0);
        assert_eq!(conversion_rate(0, 0), 0.0);
    }

    #[test]
    fn daily_trends_zero_fill_and_classify() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 20).unwrap();
        let samples = vec![
            sample(5, 2026, 8, 20),
            sample(4, 2026, 8, 20),
            sample(1, 2026, 8, 20),
            sample(3, 2026, 8, 19),
        ];

        let trends = daily_trends(&samples, 3, today);
        assert_eq!(trends.len(), 3);
        assert_eq!(trends[0].date, "2026-08-18");
        assert_eq!(trends[0].count, 0);
        assert_eq!(trends[1].date, "2026-08-19");
        assert_eq!(trends[1].count, 1);
        assert_eq!(trends[1].negative_count, 0);

        let today_row = &trends[2];
        assert_eq!(today_row.count, 3);
        assert_eq!(today_row.positive_count, 2);
        assert_eq!(today_row.negative_count, 1);
    }

    #[test]
    fn seven_day_averages_cover_exactly_a_week() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 20).unwrap();
        let rows = seven_day_averages(&[sample(4, 2026, 8, 20), sample(2, 2026, 8, 20)], today);
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[0].date, "2026-08-14");
        assert_eq!(rows[6].reviews, 2);
        assert_eq!(rows[6].average_rating, 3.0);
        assert_eq!(rows[5].average_rating, 0.0);
    }

    #[test]
    fn week_keys_start_on_sunday() {
        // 2026-08-19 is a Wednesday; its week starts Sunday the 16th
        let date = NaiveDate::from_ymd_opt(2026, 8, 19).unwrap();
        assert_eq!(Granularity::Week.key_for(date), "2026-08-16");
        assert_eq!(Granularity::Day.key_for(date), "2026-08-19");
        assert_eq!(Granularity::Month.key_for(date), "2026-08");
    }

    #[test]
    fn unknown_granularity_defaults_to_week() {
        assert_eq!(Granularity::parse("day"), Granularity::Day);
        assert_eq!(Granularity::parse("month"), Granularity::Month);
        assert_eq!(Granularity::parse("fortnight"), Granularity::Week);
    }

    #[test]
    fn trend_rows_group_and_sort_ascending() {
        let samples = vec![
            sample(5, 2026, 7, 10),
            sample(3, 2026, 8, 2),
            sample(4, 2026, 8, 15),
        ];
        let rows = trend_rows(&samples, Granularity::Month);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].period, "2026-07");
        assert_eq!(rows[1].period, "2026-08");
        assert_eq!(rows[1].reviews, 2);
        assert_eq!(rows[1].average_rating, 3.5);
        assert_eq!(rows[1].rating_distribution[2].count, 1);
    }

    #[test]
    fn growth_compares_the_last_two_buckets() {
        let rows = trend_rows(
            &[
                sample(4, 2026, 7, 1),
                sample(4, 2026, 7, 2),
                sample(5, 2026, 8, 1),
                sample(5, 2026, 8, 2),
                sample(5, 2026, 8, 3),
            ],
            Granularity::Month,
        );
        assert_eq!(review_growth(&rows), 50.0);
        assert_eq!(review_growth(&rows[..1]), 0.0);
        assert_eq!(review_growth(&[]), 0.0);
    }

    #[test]
    fn link_clicks_bucket_by_metadata() {
        let event = |source: Option<&str>, link_type: &str, day: u32| AnalyticsEvent {
            id: "e".to_string(),
            business_id: DEFAULT_BUSINESS_ID.to_string(),
            metric_type: METRIC_LINK_CLICK.to_string(),
            value: 1,
            metadata: Some(json!({
                "source": source,
                "link_type": link_type
            })),
            created_at: Utc.with_ymd_and_hms(2026, 8, day, 9, 0, 0).unwrap(),
        };

        let stats = link_click_stats(&[
            event(Some("qr_code"), "social", 18),
            event(Some("qr_code"), "qr_code", 19),
            event(None, "social", 19),
        ]);

        assert_eq!(stats.total_clicks, 3);
        assert_eq!(stats.by_source.get("qr_code"), Some(&2));
        assert_eq!(stats.by_source.get("unknown"), Some(&1));
        assert_eq!(stats.by_type.get("social"), Some(&2));
        assert_eq!(stats.daily_clicks.len(), 2);
        assert_eq!(stats.daily_clicks[0].date, "2026-08-18");
    }
}
