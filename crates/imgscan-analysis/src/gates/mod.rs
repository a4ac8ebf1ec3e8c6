//! Gate evaluation: named bundles of triggers checked against stored facts,
//! built in or backed by an external script.

pub mod builtin;
pub mod engine;
pub mod registry;
pub mod script;
pub mod trigger;
pub mod types;

pub use engine::GateEngine;
pub use registry::GateRegistry;
pub use script::ScriptGate;
pub use trigger::{Gate, Trigger};
pub use types::{FactView, ParamSpec, TriggerParams};
