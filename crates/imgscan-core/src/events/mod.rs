//! Event system: a handler trait with no-op defaults and a synchronous
//! dispatcher that isolates panicking handlers.

pub mod dispatcher;
pub mod handler;
pub mod types;

pub use dispatcher::EventDispatcher;
pub use handler::ImgscanEventHandler;
pub use types::*;
