pub mod auth;
pub mod config;
pub mod history;
pub mod products;
pub mod ticker;
