//! # devlink-app
//!
//! Application layer: command registry, dispatcher, state store and
//! **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `SettingsStore`: load & save opaque named blobs
//!   - `TaskScheduler`: post deferred work onto the device's run loop
//!   - `EventPublisher`: publish lifecycle and state-change events
//!   - `Integration`: wire command handlers and state into a [`services::Device`]
//! - Define **driving/inbound** use-cases:
//!   - `CommandRegistry`: load, look up and render command definitions
//!   - `CommandDispatcher`: authorize, validate and route command requests
//!   - `StateStore`: validated, atomic device state updates
//!   - `Device`: facade bundling all of the above for one device session
//! - Provide **in-process infrastructure** (event bus, task runner) that
//!   doesn't need IO
//!
//! ## Dependency rule
//! Depends on `devlink-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod command_registry;
pub mod event_bus;
pub mod ports;
pub mod scheduler;
pub mod services;
