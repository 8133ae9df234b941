// Library exports for watchparty
// The binary and the integration tests both build on these modules

pub mod api;
pub mod config;
pub mod controllers;
pub mod error;
pub mod models;
pub mod realtime;
pub mod session;
