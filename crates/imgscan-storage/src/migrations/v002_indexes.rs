//! v002: lookups by state and by stage.

pub const MIGRATION_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_images_state ON images(state);
CREATE INDEX IF NOT EXISTS idx_analyzer_status_stage ON analyzer_status(stage);
"#;
