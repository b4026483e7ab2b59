//! HTTP handlers

pub mod health;
pub mod auth;
pub mod dogs;
pub mod collars;
pub mod readings;
pub mod interventions;
pub mod analytics;
pub mod ws;
