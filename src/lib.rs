pub mod clock;
pub mod config;
pub mod discord;
pub mod engine;
pub mod error;
pub mod feed;
pub mod notify;
pub mod store;
