pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod routes;
pub mod state;
