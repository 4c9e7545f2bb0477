use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySql, Pool};
use std::env;

pub async fn establish_connection() -> Result<Pool<MySql>, sqlx::Error> {
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    MySqlPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
}
