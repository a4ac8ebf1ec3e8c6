//! Trait seams shared across the workspace.

pub mod cancellation;
pub mod store;

pub use cancellation::{Cancellable, CancellationToken};
pub use store::{list_images, ImageIter, ImageState, ImageStore};
