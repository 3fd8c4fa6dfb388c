//! Shared utilities for scalp-trader
//!
//! This crate provides common functionality used across the workspace:
//! tracing setup and environment handling (`.env` loading, typed lookups).

pub mod config;
pub mod logging;

pub use config::{
    DotenvResult, env_opt, env_parse, load_dotenv, load_dotenv_from, report_dotenv,
};
pub use logging::{init_tracing_json, init_tracing_with};
