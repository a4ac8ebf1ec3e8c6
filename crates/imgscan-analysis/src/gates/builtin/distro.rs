use imgscan_core::constants::CATEGORY_ANALYZER_META;

use crate::gates::trigger::{Gate, Trigger};
use crate::gates::types::{FactView, ParamSpec, TriggerParams};

pub const DISTROCHECK: &str = "DISTROCHECK";

pub fn distro_check() -> Gate {
    Gate::new(DISTROCHECK, "Checks the detected distro")
        .with_trigger(DistroUnknown)
        .with_trigger(DistroMismatch)
}

struct DistroUnknown;

impl Trigger for DistroUnknown {
    fn name(&self) -> &str {
        "DISTRO_UNKNOWN"
    }

    fn description(&self) -> &str {
        "triggers if no distro could be detected"
    }

    fn requires(&self) -> &[&'static str] {
        &[CATEGORY_ANALYZER_META]
    }

    fn check(&self, facts: &FactView<'_>, _params: &TriggerParams) -> Vec<String> {
        if facts.distro().is_unknown() {
            vec!["Distro could not be detected".to_string()]
        } else {
            Vec::new()
        }
    }
}

struct DistroMismatch;

const MISMATCH_PARAMS: &[ParamSpec] = &[ParamSpec::required(
    "EXPECTED",
    "distro name, optionally name:version",
)];

impl Trigger for DistroMismatch {
    fn name(&self) -> &str {
        "DISTRO_MISMATCH"
    }

    fn description(&self) -> &str {
        "triggers if the detected distro differs from EXPECTED"
    }

    fn params(&self) -> &[ParamSpec] {
        MISMATCH_PARAMS
    }

    fn requires(&self) -> &[&'static str] {
        &[CATEGORY_ANALYZER_META]
    }

    fn check(&self, facts: &FactView<'_>, params: &TriggerParams) -> Vec<String> {
        let Some(expected) = params.get("EXPECTED") else {
            return Vec::new();
        };
        let distro = facts.distro();
        let (name, version) = match expected.split_once(':') {
            Some((n, v)) => (n, Some(v)),
            None => (expected, None),
        };
        let matches = distro.name.eq_ignore_ascii_case(name)
            && version.map_or(true, |v| distro.version == v);
        if matches {
            Vec::new()
        } else {
            vec![format!(
                "Detected distro {}:{} does not match expected {expected}",
                distro.name, distro.version
            )]
        }
    }
}
