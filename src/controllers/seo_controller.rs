use actix_web::http::header;
use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use sqlx::{MySql, Pool};

use crate::models::settings::AppSettings;
use crate::utils::app_base_url;

pub(crate) fn build_sitemap(base_url: &str, last_modified: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n\
         <url><loc>{base}</loc><lastmod>{lastmod}</lastmod><changefreq>daily</changefreq><priority>1.0</priority></url>\n\
         <url><loc>{base}/dashboard</loc><lastmod>{lastmod}</lastmod><changefreq>weekly</changefreq><priority>0.8</priority></url>\n\
         <url><loc>{base}/review</loc><lastmod>{lastmod}</lastmod><changefreq>weekly</changefreq><priority>0.6</priority></url>\n\
         </urlset>\n",
        base = base_url,
        lastmod = last_modified,
    )
}

pub(crate) fn build_robots(base_url: &str) -> String {
    format!(
        "User-agent: *\n\
         Allow: /\n\
         Disallow: /dashboard/\n\
         Disallow: /api/\n\
         Disallow: /admin/\n\
         \n\
         Sitemap: {}/sitemap.xml\n",
        base_url
    )
}

/// Crawlers get the sitemap even when the database is down; lastmod just
/// falls back to the current time.
#[get("/sitemap.xml")]
pub async fn sitemap(pool: web::Data<Pool<MySql>>) -> HttpResponse {
    let last_modified = match AppSettings::load(pool.get_ref()).await {
        Ok(Some(settings)) => settings.updated_at.to_rfc3339(),
        Ok(None) => Utc::now().to_rfc3339(),
        Err(e) => {
            log::warn!("Sitemap using current time as lastmod: {:?}", e);
            Utc::now().to_rfc3339()
        }
    };

    HttpResponse::Ok()
        .content_type("application/xml")
        .insert_header((
            header::CACHE_CONTROL,
            "public, max-age=3600, stale-while-revalidate=86400",
        ))
        .body(build_sitemap(&app_base_url(), &last_modified))
}

#[get("/robots.txt")]
pub async fn robots() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain")
        .insert_header((header::CACHE_CONTROL, "public, max-age=86400"))
        .body(build_robots(&app_base_url()))
}
