//! v001: images, fact records, analyzer status, gate results.

pub const MIGRATION_SQL: &str = r#"
-- One row per known image. state is 'present' or 'deleting'; a row left in
-- 'deleting' is a delete that did not finish.
CREATE TABLE IF NOT EXISTS images (
    image_id TEXT PRIMARY KEY,
    state TEXT NOT NULL DEFAULT 'present',
    human_name TEXT,
    short_id TEXT NOT NULL,
    parent_id TEXT,
    size_bytes INTEGER NOT NULL DEFAULT 0,
    user_type TEXT,
    current_tags TEXT NOT NULL DEFAULT '[]',
    all_tags TEXT NOT NULL DEFAULT '[]',
    family_tree TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
) STRICT;

CREATE TABLE IF NOT EXISTS fact_records (
    image_id TEXT NOT NULL REFERENCES images(image_id),
    category TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (image_id, category, key)
) STRICT, WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS analyzer_status (
    image_id TEXT NOT NULL REFERENCES images(image_id),
    stage TEXT NOT NULL,
    priority INTEGER NOT NULL,
    status TEXT NOT NULL,
    result_code INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    last_run_at INTEGER NOT NULL,
    PRIMARY KEY (image_id, stage)
) STRICT, WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS gate_runs (
    image_id TEXT NOT NULL REFERENCES images(image_id),
    gate TEXT NOT NULL,
    evaluated_at INTEGER NOT NULL,
    PRIMARY KEY (image_id, gate)
) STRICT, WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS gate_findings (
    image_id TEXT NOT NULL,
    gate TEXT NOT NULL,
    seq INTEGER NOT NULL,
    trigger_name TEXT NOT NULL,
    detail TEXT NOT NULL,
    PRIMARY KEY (image_id, gate, seq),
    FOREIGN KEY (image_id, gate) REFERENCES gate_runs(image_id, gate)
) STRICT, WITHOUT ROWID;
"#;
