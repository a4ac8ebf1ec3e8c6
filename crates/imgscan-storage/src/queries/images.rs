//! images table queries.

use imgscan_core::errors::StoreError;
use imgscan_core::types::{ImageId, ImageRecord, Manifest};
use rusqlite::{params, Connection, OptionalExtension};

use super::sql_err;

pub const STATE_PRESENT: &str = "present";
pub const STATE_DELETING: &str = "deleting";

/// Insert a placeholder row unless the image is already known.
pub fn ensure_image(conn: &Connection, id: &ImageId, now: i64) -> Result<(), StoreError> {
    conn.prepare_cached(
        "INSERT OR IGNORE INTO images (image_id, short_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)",
    )
    .and_then(|mut stmt| stmt.execute(params![id.as_str(), id.short_id(), now]))
    .map_err(sql_err)?;
    Ok(())
}

pub fn upsert_image(conn: &Connection, record: &ImageRecord, now: i64) -> Result<(), StoreError> {
    let current_tags = serde_json::to_string(&record.current_tags)?;
    let all_tags = serde_json::to_string(&record.all_tags)?;
    let family_tree = serde_json::to_string(&record.family_tree)?;
    let m = &record.manifest;
    conn.prepare_cached(
        "INSERT INTO images (image_id, state, human_name, short_id, parent_id, size_bytes,
                             user_type, current_tags, all_tags, family_tree, created_at, updated_at)
         VALUES (?1, 'present', ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
         ON CONFLICT(image_id) DO UPDATE SET
             state = 'present',
             human_name = excluded.human_name,
             short_id = excluded.short_id,
             parent_id = excluded.parent_id,
             size_bytes = excluded.size_bytes,
             user_type = excluded.user_type,
             current_tags = excluded.current_tags,
             all_tags = excluded.all_tags,
             family_tree = excluded.family_tree,
             updated_at = excluded.updated_at",
    )
    .and_then(|mut stmt| {
        stmt.execute(params![
            record.image_id.as_str(),
            m.human_name,
            m.short_id,
            m.parent_id,
            m.size_bytes as i64,
            m.user_type,
            current_tags,
            all_tags,
            family_tree,
            now,
        ])
    })
    .map_err(sql_err)?;
    Ok(())
}

type ImageRow = (
    Option<String>,
    String,
    Option<String>,
    i64,
    Option<String>,
    String,
    String,
    String,
);

pub fn load_image(conn: &Connection, id: &ImageId) -> Result<Option<ImageRecord>, StoreError> {
    let row: Option<ImageRow> = conn
        .prepare_cached(
            "SELECT human_name, short_id, parent_id, size_bytes, user_type,
                    current_tags, all_tags, family_tree
             FROM images WHERE image_id = ?1",
        )
        .and_then(|mut stmt| {
            stmt.query_row(params![id.as_str()], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            })
            .optional()
        })
        .map_err(sql_err)?;

    let Some((human_name, short_id, parent_id, size, user_type, current, all, tree)) = row else {
        return Ok(None);
    };
    let decode = |column: &str, text: &str| -> Result<Vec<String>, StoreError> {
        serde_json::from_str(text).map_err(|e| StoreError::Corrupt {
            image_id: id.to_string(),
            details: format!("{column}: {e}"),
        })
    };
    Ok(Some(ImageRecord {
        image_id: id.clone(),
        manifest: Manifest {
            human_name,
            short_id,
            parent_id,
            size_bytes: size.max(0) as u64,
            user_type,
        },
        current_tags: decode("current_tags", &current)?,
        all_tags: decode("all_tags", &all)?,
        family_tree: decode("family_tree", &tree)?,
    }))
}

/// Returns the number of rows touched (0 when the image is absent).
pub fn set_tags(
    conn: &Connection,
    id: &ImageId,
    current: &[String],
    all: &[String],
    now: i64,
) -> Result<usize, StoreError> {
    let current = serde_json::to_string(current)?;
    let all = serde_json::to_string(all)?;
    conn.prepare_cached(
        "UPDATE images SET current_tags = ?2, all_tags = ?3, updated_at = ?4 WHERE image_id = ?1",
    )
    .and_then(|mut stmt| stmt.execute(params![id.as_str(), current, all, now]))
    .map_err(sql_err)
}

pub fn set_family_tree(
    conn: &Connection,
    id: &ImageId,
    tree: &[String],
    now: i64,
) -> Result<usize, StoreError> {
    let tree = serde_json::to_string(tree)?;
    conn.prepare_cached("UPDATE images SET family_tree = ?2, updated_at = ?3 WHERE image_id = ?1")
        .and_then(|mut stmt| stmt.execute(params![id.as_str(), tree, now]))
        .map_err(sql_err)
}

/// Every image id, sorted. Rows whose id no longer parses are skipped.
pub fn list_image_ids(conn: &Connection) -> Result<Vec<ImageId>, StoreError> {
    let mut stmt = conn
        .prepare_cached("SELECT image_id FROM images ORDER BY image_id")
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(sql_err)?;

    let mut ids = Vec::new();
    for row in rows {
        let raw = row.map_err(sql_err)?;
        match ImageId::parse(&raw) {
            Ok(id) => ids.push(id),
            Err(e) => tracing::warn!(image_id = %raw, error = %e, "skipping malformed image row"),
        }
    }
    Ok(ids)
}

pub fn image_state(conn: &Connection, id: &ImageId) -> Result<Option<String>, StoreError> {
    conn.prepare_cached("SELECT state FROM images WHERE image_id = ?1")
        .and_then(|mut stmt| {
            stmt.query_row(params![id.as_str()], |row| row.get(0))
                .optional()
        })
        .map_err(sql_err)
}

pub fn mark_deleting(conn: &Connection, id: &ImageId, now: i64) -> Result<usize, StoreError> {
    conn.prepare_cached("UPDATE images SET state = ?2, updated_at = ?3 WHERE image_id = ?1")
        .and_then(|mut stmt| stmt.execute(params![id.as_str(), STATE_DELETING, now]))
        .map_err(sql_err)
}

/// Remove every row keyed under the image, children first.
pub fn delete_image_rows(conn: &Connection, id: &ImageId) -> Result<(), StoreError> {
    for sql in [
        "DELETE FROM gate_findings WHERE image_id = ?1",
        "DELETE FROM gate_runs WHERE image_id = ?1",
        "DELETE FROM analyzer_status WHERE image_id = ?1",
        "DELETE FROM fact_records WHERE image_id = ?1",
        "DELETE FROM images WHERE image_id = ?1",
    ] {
        conn.prepare_cached(sql)
            .and_then(|mut stmt| stmt.execute(params![id.as_str()]))
            .map_err(sql_err)?;
    }
    Ok(())
}
