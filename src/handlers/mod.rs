pub mod auth;
pub mod data;
pub mod diag;
pub mod meta;
