//! # homelink-domain
//!
//! Pure domain model for the homelink device gateway.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error taxonomy, timestamps
//! - Define **Devices** and their verify/connect/disconnect lifecycle
//! - Define the **topic model** shared by every message-bus exchange
//! - Define **commands**: operations, correlation keys, correlated vs
//!   fire-and-forget kinds, and the caller-facing outcome
//! - Define **telemetry** readings and their sanitization rules
//! - Define **lock snapshots** and door-log entries pushed by devices
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod command;
pub mod device;
pub mod lock;
pub mod telemetry;
pub mod topic;
