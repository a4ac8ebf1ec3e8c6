use imgscan_core::constants::CATEGORY_GEMS;

use crate::gates::trigger::{Gate, Trigger};
use crate::gates::types::{FactView, ParamSpec, TriggerParams};
use crate::pipeline::builtin::GemRecord;

pub const GEMCHECK: &str = "GEMCHECK";

pub fn gem_check() -> Gate {
    Gate::new(GEMCHECK, "Checks installed Ruby gems")
        .with_trigger(GemDenylist)
        .with_trigger(GemFound)
}

/// Gem name of a `pkgs.gems` record; the record key is the gemspec path.
fn gem_name(value: &str) -> Option<String> {
    serde_json::from_str::<GemRecord>(value).ok().map(|g| g.name)
}

struct GemDenylist;

const DENYLIST_PARAMS: &[ParamSpec] =
    &[ParamSpec::required("NAMES", "comma-separated gem names that must not be installed")];

impl Trigger for GemDenylist {
    fn name(&self) -> &str {
        "GEM_DENYLIST"
    }

    fn description(&self) -> &str {
        "triggers for every installed gem whose name is in NAMES"
    }

    fn params(&self) -> &[ParamSpec] {
        DENYLIST_PARAMS
    }

    fn requires(&self) -> &[&'static str] {
        &[CATEGORY_GEMS]
    }

    fn check(&self, facts: &FactView<'_>, params: &TriggerParams) -> Vec<String> {
        let denied = params.list("NAMES");
        let mut details = Vec::new();
        for (path, value) in facts.category(CATEGORY_GEMS).into_iter().flatten() {
            let Some(name) = gem_name(value) else {
                tracing::debug!(path = %path, "skipping unreadable gem record");
                continue;
            };
            if denied.contains(&name.as_str()) {
                details.push(format!("Denylisted gem {name} installed at {path}"));
            }
        }
        details
    }
}

struct GemFound;

impl Trigger for GemFound {
    fn name(&self) -> &str {
        "GEM_FOUND"
    }

    fn description(&self) -> &str {
        "triggers once if any gem is installed"
    }

    fn requires(&self) -> &[&'static str] {
        &[CATEGORY_GEMS]
    }

    fn check(&self, facts: &FactView<'_>, _params: &TriggerParams) -> Vec<String> {
        match facts.category(CATEGORY_GEMS).map(|g| g.len()) {
            Some(n) if n > 0 => vec![format!("{n} gem(s) installed")],
            _ => Vec::new(),
        }
    }
}
