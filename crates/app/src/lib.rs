//! # homelink-app
//!
//! Application layer — the correlation and fan-out core plus **port
//! definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceRepository` — device records
//!   - `LockSnapshotStore` — append-only lock snapshots and door logs
//!   - `MessagePublisher` — publish to the message bus
//! - Define the **driving/inbound port** `InboundHandler`, fed by the transport
//! - Provide the in-process infrastructure that doesn't need IO:
//!   - `CommandBroker` — pending command registry with deadlines
//!   - `CommandDispatcher` — correlated vs fire-and-forget delivery
//!   - `TelemetryHub` — per-device subscriber groups
//!   - `InboundRouter` — topic-based routing of inbound messages
//! - Use-case services: `DeviceLifecycle`, `SmartLockService`, `GasWarningService`
//!
//! ## Dependency rule
//! Depends on `homelink-domain` only (plus `tokio::sync`/`tokio::time`).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod command_broker;
pub mod dispatcher;
pub mod inbound;
pub mod ports;
pub mod services;
pub mod telemetry_hub;

#[cfg(test)]
pub(crate) mod testing;
