//! Tests for tracing initialization.

use std::sync::Mutex;

use imgscan_core::tracing::init_tracing;
use imgscan_core::tracing::setup::LOG_ENV;

static TRACING_MUTEX: Mutex<()> = Mutex::new(());

#[test]
fn accepts_per_crate_directives() {
    let _lock = TRACING_MUTEX.lock().unwrap();
    std::env::set_var(LOG_ENV, "imgscan_analysis=debug,imgscan_storage=warn");
    init_tracing();
    std::env::remove_var(LOG_ENV);
    tracing::info!(target: "imgscan_analysis", "after init");
}

#[test]
fn repeated_init_is_harmless() {
    let _lock = TRACING_MUTEX.lock().unwrap();
    init_tracing();
    init_tracing();
    tracing::debug!("still running");
}

#[test]
fn invalid_filter_falls_back() {
    let _lock = TRACING_MUTEX.lock().unwrap();
    std::env::set_var(LOG_ENV, "[[[not a filter");
    init_tracing();
    std::env::remove_var(LOG_ENV);
}
