pub mod auth;
pub mod controllers;
pub mod db;
pub mod models;
pub mod notifications;
pub mod rate_limit;
pub mod routing;
pub mod utils;
pub mod validation;
