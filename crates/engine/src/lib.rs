//! Service host for the maintenance decision engine

pub mod api;
pub mod config;
