// Public API for integration tests and potential library usage

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod round_timer;
pub mod scoring;
pub mod state;
pub mod suggest;
pub mod types;
pub mod ws;
