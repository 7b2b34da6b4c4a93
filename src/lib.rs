pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod geo;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod outbound;
pub mod state;
pub mod store;
