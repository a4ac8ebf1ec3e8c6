use imgscan_core::constants::CATEGORY_SUIDS;

use crate::gates::trigger::{Gate, Trigger};
use crate::gates::types::{FactView, ParamSpec, TriggerParams};

pub const SUIDCHECK: &str = "SUIDCHECK";

pub fn suid_check() -> Gate {
    Gate::new(SUIDCHECK, "Checks for setuid files in the image").with_trigger(SuidFound)
}

struct SuidFound;

const SUID_PARAMS: &[ParamSpec] = &[ParamSpec::optional(
    "ALLOWED",
    "comma-separated paths that may be setuid",
)];

impl Trigger for SuidFound {
    fn name(&self) -> &str {
        "SUID_FOUND"
    }

    fn description(&self) -> &str {
        "triggers once if any setuid file not in ALLOWED is found in the image"
    }

    fn params(&self) -> &[ParamSpec] {
        SUID_PARAMS
    }

    fn requires(&self) -> &[&'static str] {
        &[CATEGORY_SUIDS]
    }

    fn check(&self, facts: &FactView<'_>, params: &TriggerParams) -> Vec<String> {
        let allowed = params.list("ALLOWED");
        let found: Vec<String> = facts
            .category(CATEGORY_SUIDS)
            .into_iter()
            .flatten()
            .filter(|(path, _)| !allowed.contains(&path.as_str()))
            .map(|(path, mode)| format!("{path} ({mode})"))
            .collect();
        if found.is_empty() {
            return Vec::new();
        }
        vec![format!("SUID file(s) found in image: {}", found.join(", "))]
    }
}
