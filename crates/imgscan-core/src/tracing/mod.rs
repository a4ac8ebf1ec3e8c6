//! Logging for imgscan: `tracing` with an `EnvFilter` read from `IMGSCAN_LOG`.

pub mod setup;

pub use setup::init_tracing;
