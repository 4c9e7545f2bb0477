use chrono::{Duration, Utc};
use mail_send::{mail_builder::MessageBuilder, Credentials, SmtpClientBuilder};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::prelude::FromRow;
use sqlx::MySqlPool;
use std::env;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use uuid::Uuid;

use crate::models::analytics::round2;
use crate::models::settings::AppSettings;
use crate::utils::app_base_url;

/// Low ratings get an extra priority alert next to the regular notice.
pub fn is_low_rating(rating: i32) -> bool {
    rating <= 2
}

fn stars(rating: i32) -> String {
    let filled = rating.clamp(0, 5) as usize;
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

pub fn new_review_email(
    business_name: &str,
    customer_name: &str,
    rating: i32,
    comment: Option<&str>,
    review_url: &str,
) -> (String, String, String) {
    let subject = format!("New {}-Star Review for {}", rating, business_name);

    let comment_html = match comment {
        Some(text) => format!(
            "<blockquote style=\"margin:16px 0;padding:12px;background:#f3f4f6;border-radius:6px;\">{}</blockquote>",
            text
        ),
        None => String::new(),
    };
    let html = format!(
        "<div style=\"font-family:Arial,sans-serif;max-width:600px;margin:0 auto;\">\
         <h2 style=\"color:#111827;\">New review for {business}</h2>\
         <p style=\"font-size:20px;letter-spacing:2px;color:#f59e0b;\">{stars}</p>\
         <p><strong>{customer}</strong> rated you {rating} out of 5.</p>\
         {comment}\
         <p><a href=\"{url}\" style=\"display:inline-block;padding:10px 18px;background:#2563eb;color:#ffffff;text-decoration:none;border-radius:6px;\">View in dashboard</a></p>\
         <p style=\"color:#6b7280;font-size:12px;\">This is an automated notification from your review management system.</p>\
         </div>",
        business = business_name,
        stars = stars(rating),
        customer = customer_name,
        rating = rating,
        comment = comment_html,
        url = review_url,
    );

    let comment_text = comment
        .map(|c| format!("\nComment: {}\n", c))
        .unwrap_or_default();
    let text = format!(
        "New review for {}\n\n{} rated you {}/5 {}\n{}\nView it here: {}\n",
        business_name,
        customer_name,
        rating,
        stars(rating),
        comment_text,
        review_url,
    );

    (subject, html, text)
}

pub fn low_rating_alert(
    business_name: &str,
    customer_name: &str,
    rating: i32,
    comment: Option<&str>,
    review_url: &str,
) -> (String, String, String) {
    let subject = format!(
        "⚠️ Low Rating Alert: {}-Star Review for {}",
        rating, business_name
    );

    let comment_html = match comment {
        Some(text) => format!(
            "<blockquote style=\"margin:16px 0;padding:12px;background:#fef2f2;border-radius:6px;\">{}</blockquote>",
            text
        ),
        None => String::new(),
    };
    let html = format!(
        "<div style=\"font-family:Arial,sans-serif;max-width:600px;margin:0 auto;\">\
         <h2 style=\"color:#b91c1c;\">Low rating received</h2>\
         <p style=\"font-size:20px;letter-spacing:2px;color:#b91c1c;\">{stars}</p>\
         <p><strong>{customer}</strong> rated {business} {rating} out of 5. A quick follow-up can often turn this around.</p>\
         {comment}\
         <p><a href=\"{url}\" style=\"display:inline-block;padding:10px 18px;background:#b91c1c;color:#ffffff;text-decoration:none;border-radius:6px;\">Review and respond</a></p>\
         <p style=\"color:#6b7280;font-size:12px;\">This is an automated notification from your review management system.</p>\
         </div>",
        business = business_name,
        stars = stars(rating),
        customer = customer_name,
        rating = rating,
        comment = comment_html,
        url = review_url,
    );

    let comment_text = comment
        .map(|c| format!("\nComment: {}\n", c))
        .unwrap_or_default();
    let text = format!(
        "LOW RATING ALERT for {}\n\n{} left a {}/5 review {}\n{}\nRespond here: {}\n",
        business_name,
        customer_name,
        rating,
        stars(rating),
        comment_text,
        review_url,
    );

    (subject, html, text)
}

#[derive(Debug, FromRow)]
pub struct TopReview {
    pub customer_name: Option<String>,
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug)]
pub struct WeeklyReport {
    pub total_reviews: i64,
    pub average_rating: f64,
    pub new_reviews: i64,
    pub low_rating_reviews: i64,
    pub top_reviews: Vec<TopReview>,
    pub report_url: String,
}

pub fn weekly_digest_email(business_name: &str, report: &WeeklyReport) -> (String, String, String) {
    let subject = format!("📊 Weekly Review Summary for {}", business_name);

    let top_html: String = report
        .top_reviews
        .iter()
        .map(|r| {
            format!(
                "<li>{} - {} ({}/5){}</li>",
                r.customer_name.as_deref().unwrap_or("Anonymous"),
                stars(r.rating),
                r.rating,
                r.comment
                    .as_deref()
                    .map(|c| format!(": {}", c))
                    .unwrap_or_default(),
            )
        })
        .collect();
    let html = format!(
        "<div style=\"font-family:Arial,sans-serif;max-width:600px;margin:0 auto;\">\
         <h2 style=\"color:#111827;\">Weekly summary for {business}</h2>\
         <ul>\
         <li>Total reviews: {total}</li>\
         <li>Average rating: {avg}</li>\
         <li>New this week: {new}</li>\
         <li>Low ratings this week: {low}</li>\
         </ul>\
         <h3>Highlights</h3>\
         <ol>{top}</ol>\
         <p><a href=\"{url}\" style=\"display:inline-block;padding:10px 18px;background:#2563eb;color:#ffffff;text-decoration:none;border-radius:6px;\">Open the dashboard</a></p>\
         <p style=\"color:#6b7280;font-size:12px;\">This is an automated notification from your review management system.</p>\
         </div>",
        business = business_name,
        total = report.total_reviews,
        avg = report.average_rating,
        new = report.new_reviews,
        low = report.low_rating_reviews,
        top = top_html,
        url = report.report_url,
    );

    let text = format!(
        "Weekly summary for {}\n\nTotal reviews: {}\nAverage rating: {}\nNew this week: {}\nLow ratings this week: {}\n\nDashboard: {}\n",
        business_name,
        report.total_reviews,
        report.average_rating,
        report.new_reviews,
        report.low_rating_reviews,
        report.report_url,
    );

    (subject, html, text)
}

/// Sends one email over SMTP. Configuration comes from SMTP_* environment
/// variables; `SMTP_ENCRYPTION` picks implicit TLS ("SSL"/"SMTPS") or
/// STARTTLS (anything else).
pub async fn send_email(
    to_email: &str,
    subject: &str,
    html_body: &str,
    text_body: &str,
) -> Result<(), String> {
    let smtp_host = env::var("SMTP_HOST").map_err(|_| "SMTP_HOST not set".to_string())?;
    let smtp_port: u16 = env::var("SMTP_PORT")
        .unwrap_or_else(|_| "587".to_string())
        .parse()
        .map_err(|_| "invalid SMTP_PORT".to_string())?;
    let smtp_user = env::var("SMTP_USER").map_err(|_| "SMTP_USER not set".to_string())?;
    let smtp_pass = env::var("SMTP_PASS").map_err(|_| "SMTP_PASS not set".to_string())?;
    let from_name = env::var("SMTP_FROM_NAME")
        .or_else(|_| env::var("APP_NAME"))
        .unwrap_or_else(|_| "ReviewFlow".to_string());
    let from_address = env::var("SMTP_FROM_ADDRESS").unwrap_or_else(|_| smtp_user.clone());
    let encryption = env::var("SMTP_ENCRYPTION").unwrap_or_else(|_| "STARTTLS".to_string());

    let message = MessageBuilder::new()
        .from((from_name.as_str(), from_address.as_str()))
        .to(("", to_email))
        .subject(subject)
        .html_body(html_body)
        .text_body(text_body);

    let credentials = Credentials::new(smtp_user.clone(), smtp_pass.clone());
    let implicit_tls = matches!(encryption.to_uppercase().as_str(), "SSL" | "SMTPS");

    SmtpClientBuilder::new(smtp_host, smtp_port)
        .implicit_tls(implicit_tls)
        .credentials(credentials)
        .connect()
        .await
        .map_err(|e| format!("SMTP connect error: {}", e))?
        .send(message)
        .await
        .map_err(|e| format!("SMTP send error: {}", e))?;

    Ok(())
}

async fn log_email(
    pool: &MySqlPool,
    to_email: &str,
    subject: &str,
    html: &str,
    text: &str,
    status: &str,
    error: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO email_logs (id, to_email, subject, html_content, text_content, status, error) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(to_email)
    .bind(subject)
    .bind(html)
    .bind(text)
    .bind(status)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

async fn send_and_log(pool: &MySqlPool, to: &str, subject: &str, html: &str, text: &str) {
    let (status, error) = match send_email(to, subject, html, text).await {
        Ok(()) => ("sent", None),
        Err(e) => {
            log::error!("Failed to send '{}' to {}: {}", subject, to, e);
            ("failed", Some(e))
        }
    };
    if let Err(e) = log_email(pool, to, subject, html, text, status, error.as_deref()).await {
        log::error!("Failed to record email log: {:?}", e);
    }
}

/// Owner notifications for a fresh review, on a detached task so the
/// submission response never waits on SMTP.
pub fn dispatch_review_emails(
    pool: &MySqlPool,
    settings: &AppSettings,
    rating: i32,
    customer_name: &str,
    comment: Option<&str>,
) {
    let Some(owner) = settings.email.clone() else {
        log::debug!("owner email not configured, skipping review notifications");
        return;
    };

    let business_name = settings.name.clone();
    let customer = customer_name.to_string();
    let comment = comment.map(|c| c.to_string());
    let pool = pool.clone();

    tokio::spawn(async move {
        let review_url = format!("{}/dashboard/reviews", app_base_url());

        let (subject, html, text) =
            new_review_email(&business_name, &customer, rating, comment.as_deref(), &review_url);
        send_and_log(&pool, &owner, &subject, &html, &text).await;

        if is_low_rating(rating) {
            let (subject, html, text) =
                low_rating_alert(&business_name, &customer, rating, comment.as_deref(), &review_url);
            send_and_log(&pool, &owner, &subject, &html, &text).await;
        }
    });
}

/// Gathers the weekly numbers and mails the digest to the owner.
pub async fn send_weekly_digest(pool: &MySqlPool) -> Result<(), String> {
    let settings = AppSettings::load(pool)
        .await
        .map_err(|e| format!("settings load failed: {}", e))?
        .ok_or_else(|| "app settings not configured".to_string())?;
    let owner = settings
        .email
        .clone()
        .ok_or_else(|| "owner email not configured".to_string())?;

    let week_ago = Utc::now() - Duration::days(7);

    let total_reviews: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews")
        .fetch_one(pool)
        .await
        .map_err(|e| format!("review count failed: {}", e))?;
    let average: Decimal = sqlx::query_scalar("SELECT COALESCE(AVG(rating), 0) FROM reviews")
        .fetch_one(pool)
        .await
        .map_err(|e| format!("average failed: {}", e))?;
    let new_reviews: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE created_at >= ?")
            .bind(week_ago)
            .fetch_one(pool)
            .await
            .map_err(|e| format!("new review count failed: {}", e))?;
    let low_rating_reviews: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM reviews WHERE created_at >= ? AND rating <= 2",
    )
    .bind(week_ago)
    .fetch_one(pool)
    .await
    .map_err(|e| format!("low rating count failed: {}", e))?;
    let top_reviews = sqlx::query_as::<_, TopReview>(
        "SELECT customer_name, rating, comment FROM reviews \
         WHERE created_at >= ? ORDER BY rating DESC, created_at DESC LIMIT 3",
    )
    .bind(week_ago)
    .fetch_all(pool)
    .await
    .map_err(|e| format!("top reviews failed: {}", e))?;

    let report = WeeklyReport {
        total_reviews,
        average_rating: round2(average.to_f64().unwrap_or(0.0)),
        new_reviews,
        low_rating_reviews,
        top_reviews,
        report_url: format!("{}/dashboard", app_base_url()),
    };

    let (subject, html, text) = weekly_digest_email(&settings.name, &report);
    send_and_log(pool, &owner, &subject, &html, &text).await;
    Ok(())
}

/// Boots the digest cron job. Disabled unless DIGEST_CRON is configured;
/// the returned scheduler must be kept alive by the caller.
pub async fn start_digest_scheduler(
    pool: MySqlPool,
) -> Result<Option<JobScheduler>, JobSchedulerError> {
    let Ok(schedule) = env::var("DIGEST_CRON") else {
        log::info!("DIGEST_CRON not set, weekly digest disabled");
        return Ok(None);
    };

    let scheduler = JobScheduler::new().await?;
    let job = Job::new_async(schedule.as_str(), move |_id, _scheduler| {
        let pool = pool.clone();
        Box::pin(async move {
            if let Err(e) = send_weekly_digest(&pool).await {
                log::error!("Weekly digest failed: {}", e);
            }
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    log::info!("Weekly digest scheduled: {}", schedule);

    Ok(Some(scheduler))
}
