//! Commands: invocable operations a device exposes to remote actors.
//!
//! A [`CommandDefinition`] describes one `package.command` with its
//! parameters, progress and results schemas, the minimal [`Role`](crate::role::Role)
//! allowed to invoke it and where it is visible. A [`CommandInstance`] is a
//! single invocation moving through the lifecycle
//! `queued → inProgress → {done, aborted}`.

mod definition;
mod instance;

pub use definition::{CommandDefinition, Visibility};
pub use instance::{CommandError, CommandInstance, CommandState};
