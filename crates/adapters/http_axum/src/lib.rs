//! # homelink-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve the JSON API for device lifecycle, smart locks and gas-warning
//!   controls (`/device/…`, `/smartlock/…`, `/gaswarning/…`)
//! - Serve the telemetry WebSocket (`/ws`) where clients join and leave
//!   per-device subscriber groups
//! - Map HTTP requests into application service calls (driving adapter)
//! - Map application results and errors into HTTP responses
//!
//! ## Dependency rule
//! Depends on `homelink-app` (for port traits and services) and
//! `homelink-domain` (for domain types used in request/response mapping).
//! Never leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
pub mod ws;
