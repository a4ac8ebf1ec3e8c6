//! gate_runs / gate_findings queries.

use imgscan_core::errors::StoreError;
use imgscan_core::types::{Finding, GateResult, ImageId};
use rusqlite::{params, Connection, OptionalExtension};

use super::sql_err;

/// Overwrite the result for (image, gate). Callers wrap this in a transaction.
pub fn save_gate_result(
    conn: &Connection,
    id: &ImageId,
    result: &GateResult,
) -> Result<(), StoreError> {
    conn.prepare_cached("DELETE FROM gate_findings WHERE image_id = ?1 AND gate = ?2")
        .and_then(|mut stmt| stmt.execute(params![id.as_str(), result.gate]))
        .map_err(sql_err)?;
    conn.prepare_cached(
        "INSERT INTO gate_runs (image_id, gate, evaluated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(image_id, gate) DO UPDATE SET evaluated_at = excluded.evaluated_at",
    )
    .and_then(|mut stmt| stmt.execute(params![id.as_str(), result.gate, result.evaluated_at]))
    .map_err(sql_err)?;

    let mut insert = conn
        .prepare_cached(
            "INSERT INTO gate_findings (image_id, gate, seq, trigger_name, detail)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(sql_err)?;
    for (seq, finding) in result.findings.iter().enumerate() {
        insert
            .execute(params![
                id.as_str(),
                result.gate,
                seq as i64,
                finding.trigger,
                finding.detail
            ])
            .map_err(sql_err)?;
    }
    Ok(())
}

pub fn load_gate_result(
    conn: &Connection,
    id: &ImageId,
    gate: &str,
) -> Result<Option<GateResult>, StoreError> {
    let evaluated_at: Option<i64> = conn
        .prepare_cached("SELECT evaluated_at FROM gate_runs WHERE image_id = ?1 AND gate = ?2")
        .and_then(|mut stmt| {
            stmt.query_row(params![id.as_str(), gate], |row| row.get(0))
                .optional()
        })
        .map_err(sql_err)?;
    let Some(evaluated_at) = evaluated_at else {
        return Ok(None);
    };

    let mut stmt = conn
        .prepare_cached(
            "SELECT trigger_name, detail FROM gate_findings
             WHERE image_id = ?1 AND gate = ?2 ORDER BY seq",
        )
        .map_err(sql_err)?;
    let rows = stmt
        .query_map(params![id.as_str(), gate], |row| {
            Ok(Finding {
                trigger: row.get(0)?,
                detail: row.get(1)?,
            })
        })
        .map_err(sql_err)?;
    let findings = rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)?;

    Ok(Some(GateResult {
        gate: gate.to_string(),
        findings,
        evaluated_at,
    }))
}

pub fn load_gate_results(conn: &Connection, id: &ImageId) -> Result<Vec<GateResult>, StoreError> {
    let gates: Vec<String> = {
        let mut stmt = conn
            .prepare_cached("SELECT gate FROM gate_runs WHERE image_id = ?1 ORDER BY gate")
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![id.as_str()], |row| row.get::<_, String>(0))
            .map_err(sql_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)?
    };

    let mut results = Vec::with_capacity(gates.len());
    for gate in gates {
        if let Some(result) = load_gate_result(conn, id, &gate)? {
            results.push(result);
        }
    }
    Ok(results)
}
