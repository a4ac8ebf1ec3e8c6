//! Write helpers: BEGIN IMMEDIATE transactions.

use imgscan_core::errors::StoreError;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::queries::sql_err;

/// Run `f` inside a BEGIN IMMEDIATE transaction on the writer.
///
/// The write lock is taken at transaction start, so `f` never hits
/// SQLITE_BUSY halfway through. Any error rolls the transaction back.
pub fn with_immediate_transaction<F, T>(conn: &Connection, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate).map_err(sql_err)?;
    let result = f(&tx)?;
    tx.commit().map_err(sql_err)?;
    Ok(result)
}
