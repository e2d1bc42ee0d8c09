//! # MartialBase API Server Library
//!
//! HTTP surface of MartialBase: configuration, the axum router, error
//! mapping and route handlers. Domain logic lives in `martialbase-shared`.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Response hardening
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
