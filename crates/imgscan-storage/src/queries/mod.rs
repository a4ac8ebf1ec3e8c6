//! SQL query functions, one module per table group. Every function takes a
//! borrowed connection so it works on the writer, a reader or a transaction.

pub mod facts;
pub mod gates;
pub mod images;
pub mod status;

use imgscan_core::errors::StoreError;
use rusqlite::ErrorCode;

/// Classify a rusqlite error. Lock contention is transient; the rest is not.
pub fn sql_err(e: rusqlite::Error) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            StoreError::BackendUnavailable {
                message: e.to_string(),
            }
        }
        _ => StoreError::Sqlite {
            message: e.to_string(),
        },
    }
}
