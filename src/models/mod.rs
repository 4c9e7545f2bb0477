pub mod analytics;
pub mod review;
pub mod settings;
pub mod user;
