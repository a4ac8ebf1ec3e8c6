//! fact_records table queries.

use imgscan_core::errors::StoreError;
use imgscan_core::types::{FactMap, FactSet, ImageId};
use rusqlite::{params, Connection, OptionalExtension};

use super::sql_err;

pub fn put_fact(
    conn: &Connection,
    id: &ImageId,
    category: &str,
    key: &str,
    value: &str,
) -> Result<(), StoreError> {
    conn.prepare_cached(
        "INSERT INTO fact_records (image_id, category, key, value) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(image_id, category, key) DO UPDATE SET value = excluded.value",
    )
    .and_then(|mut stmt| stmt.execute(params![id.as_str(), category, key, value]))
    .map_err(sql_err)?;
    Ok(())
}

pub fn get_fact(
    conn: &Connection,
    id: &ImageId,
    category: &str,
    key: &str,
) -> Result<Option<String>, StoreError> {
    conn.prepare_cached(
        "SELECT value FROM fact_records WHERE image_id = ?1 AND category = ?2 AND key = ?3",
    )
    .and_then(|mut stmt| {
        stmt.query_row(params![id.as_str(), category, key], |row| row.get(0))
            .optional()
    })
    .map_err(sql_err)
}

/// Delete the category, then insert `facts`. Callers wrap this in a transaction.
pub fn replace_category(
    conn: &Connection,
    id: &ImageId,
    category: &str,
    facts: &FactSet,
) -> Result<(), StoreError> {
    conn.prepare_cached("DELETE FROM fact_records WHERE image_id = ?1 AND category = ?2")
        .and_then(|mut stmt| stmt.execute(params![id.as_str(), category]))
        .map_err(sql_err)?;

    let mut insert = conn
        .prepare_cached(
            "INSERT INTO fact_records (image_id, category, key, value) VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(sql_err)?;
    for (key, value) in facts {
        insert
            .execute(params![id.as_str(), category, key, value])
            .map_err(sql_err)?;
    }
    Ok(())
}

pub fn load_category(
    conn: &Connection,
    id: &ImageId,
    category: &str,
) -> Result<FactSet, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT key, value FROM fact_records WHERE image_id = ?1 AND category = ?2",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![id.as_str(), category], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(sql_err)?;

    let mut facts = FactSet::new();
    for row in rows {
        let (key, value) = row.map_err(sql_err)?;
        facts.insert(key, value);
    }
    Ok(facts)
}

pub fn load_all(conn: &Connection, id: &ImageId) -> Result<FactMap, StoreError> {
    let mut stmt = conn
        .prepare_cached("SELECT category, key, value FROM fact_records WHERE image_id = ?1")
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .map_err(sql_err)?;

    let mut facts = FactMap::new();
    for row in rows {
        let (category, key, value) = row.map_err(sql_err)?;
        facts.entry(category).or_default().insert(key, value);
    }
    Ok(facts)
}

pub fn list_categories(conn: &Connection, id: &ImageId) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT DISTINCT category FROM fact_records WHERE image_id = ?1 ORDER BY category",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![id.as_str()], |row| row.get::<_, String>(0))
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}
