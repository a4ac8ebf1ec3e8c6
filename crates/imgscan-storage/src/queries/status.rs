//! analyzer_status table queries.

use imgscan_core::errors::StoreError;
use imgscan_core::types::{AnalyzerStatus, ImageId, StageStatus};
use rusqlite::{params, Connection};

use super::sql_err;

pub fn upsert_status(
    conn: &Connection,
    id: &ImageId,
    status: &AnalyzerStatus,
) -> Result<(), StoreError> {
    conn.prepare_cached(
        "INSERT INTO analyzer_status
             (image_id, stage, priority, status, result_code, checksum, last_run_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(image_id, stage) DO UPDATE SET
             priority = excluded.priority,
             status = excluded.status,
             result_code = excluded.result_code,
             checksum = excluded.checksum,
             last_run_at = excluded.last_run_at",
    )
    .and_then(|mut stmt| {
        stmt.execute(params![
            id.as_str(),
            status.stage,
            status.priority,
            status.status.as_str(),
            status.result_code,
            status.checksum,
            status.last_run_at,
        ])
    })
    .map_err(sql_err)?;
    Ok(())
}

pub fn load_statuses(conn: &Connection, id: &ImageId) -> Result<Vec<AnalyzerStatus>, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT stage, priority, status, result_code, checksum, last_run_at
             FROM analyzer_status WHERE image_id = ?1
             ORDER BY priority, stage",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })
        .map_err(sql_err)?;

    let mut statuses = Vec::new();
    for row in rows {
        let (stage, priority, raw_status, result_code, checksum, last_run_at) =
            row.map_err(sql_err)?;
        let status = StageStatus::parse(&raw_status).ok_or_else(|| StoreError::Corrupt {
            image_id: id.to_string(),
            details: format!("stage {stage} has unknown status {raw_status:?}"),
        })?;
        statuses.push(AnalyzerStatus {
            stage,
            priority,
            status,
            result_code,
            checksum,
            last_run_at,
        });
    }
    Ok(statuses)
}
