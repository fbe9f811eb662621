//! # devlink-domain
//!
//! Pure domain model for the devlink device command/state engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Value schemas** (typed, constrained property definitions) and
//!   validate untrusted JSON against them, producing typed [`value::Value`] trees
//! - Define **Roles** (the ordered authorization levels of a remote actor)
//! - Define **Command definitions** (parameters / progress / results schemas)
//!   and **Command instances** with their lifecycle state machine
//! - Define **Events** (lifecycle and state-change notifications)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod command;
pub mod event;
pub mod role;
pub mod schema;
pub mod value;
