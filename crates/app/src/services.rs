//! Application services: use-case implementations.
//!
//! Services receive their outbound ports as shared trait objects
//! (constructor injection), keeping this layer decoupled from concrete
//! adapters.

pub mod command_dispatcher;
pub mod device;
pub mod state_store;

pub use command_dispatcher::{CommandDispatcher, CommandHandle, CommandHandler};
pub use device::Device;
pub use state_store::StateStore;
