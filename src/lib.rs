//! Incremental month-by-month builder for per-user wrapped statistics

pub mod cli;
pub mod config;
pub mod services;
pub mod types;
