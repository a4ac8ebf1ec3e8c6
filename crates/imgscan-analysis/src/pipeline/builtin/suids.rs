//! `file_suids`: every setuid entry with its octal permission mode.

use imgscan_core::constants::CATEGORY_SUIDS;
use imgscan_core::errors::StageError;
use imgscan_core::types::{FactMap, FactSet};

use crate::pipeline::analyzer::{Analyzer, StageContext, StageOutput};

const DEFINITION: &[u8] = b"file_suids/1 mode&S_ISUID -> 0%o(mode&07777)";

pub struct FileSuids;

impl Analyzer for FileSuids {
    fn name(&self) -> &str {
        "file_suids"
    }

    fn priority(&self) -> u32 {
        40
    }

    fn outputs(&self) -> Vec<String> {
        vec![CATEGORY_SUIDS.to_string()]
    }

    fn definition(&self) -> &[u8] {
        DEFINITION
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError> {
        let suids: FactSet = ctx
            .inventory
            .entries
            .iter()
            .filter(|e| e.is_setuid())
            .map(|e| (e.path.clone(), e.permission_string()))
            .collect();
        let mut out = FactMap::new();
        out.insert(CATEGORY_SUIDS.to_string(), suids);
        Ok(out)
    }
}
