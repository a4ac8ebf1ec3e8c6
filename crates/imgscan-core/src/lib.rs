//! # imgscan-core
//!
//! Foundation crate for the imgscan image analysis engine.
//! Defines identifiers, the image data model, the store contract, errors,
//! config, events and tracing. Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod tracing;
pub mod traits;
pub mod types;

// Re-export the most commonly used types at the crate root.
pub use config::ImgscanConfig;
pub use errors::error_code::ImgscanErrorCode;
pub use events::dispatcher::EventDispatcher;
pub use events::handler::ImgscanEventHandler;
pub use traits::cancellation::{Cancellable, CancellationToken};
pub use traits::store::{list_images, ImageState, ImageStore};
pub use types::collections::{FxHashMap, FxHashSet};
pub use types::identifiers::ImageId;
