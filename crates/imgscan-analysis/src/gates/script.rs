//! External executable gates.
//!
//! An executable in the configured directory becomes a gate named after the
//! file. It is run without a shell as
//! `script <imageId> <gateName> <factsDir>`, where `factsDir` holds one
//! `key value` file per fact category, with every gate parameter exported as
//! `IMGSCAN_PARAM_<KEY>`. Exit code 0 means success; each non-blank stdout
//! line is one finding written as `TRIGGER detail`.
//!
//! Header comments declare the gate's triggers and their parameters:
//!
//! ```text
//! # imgscan-gate: Checks installed npm packages
//! # imgscan-trigger: NPM_FOUND triggers if any npm is installed
//! # imgscan-trigger: NPM_DENYLIST triggers for every denylisted npm
//! # imgscan-param: NPM_DENYLIST NAMES required comma-separated npm names
//! ```

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use imgscan_core::errors::{ConfigError, GateError};
use imgscan_core::types::facts::render_kv;
use regex::Regex;

use super::trigger::{Gate, Trigger};
use super::types::{FactView, ParamSpec, TriggerParams};
use crate::pipeline::script::{header_lines, is_executable, is_plain_name, param_env_var};

static GATE_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.-]*$").ok());

static TRIGGER_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").ok());

const GATE_HEADER: &str = "imgscan-gate:";
const TRIGGER_HEADER: &str = "imgscan-trigger:";
const PARAM_HEADER: &str = "imgscan-param:";
const CONFIG_FIELD: &str = "gates.script_dir";

#[derive(Debug, Clone)]
pub struct ScriptGate {
    name: String,
    path: PathBuf,
}

impl ScriptGate {
    /// Gate name for a script file, `None` when the file name cannot be one.
    pub fn parse_file_name(path: &Path) -> Option<String> {
        let file_name = path.file_name()?.to_str()?;
        GATE_NAME
            .as_ref()?
            .is_match(file_name)
            .then(|| file_name.to_string())
    }

    /// Read the script's header and build the gate it declares.
    pub fn load(path: &Path) -> Result<Gate, ConfigError> {
        let invalid = |message: String| ConfigError::ValidationFailed {
            field: CONFIG_FIELD.to_string(),
            message: format!("{}: {message}", path.display()),
        };
        let name = Self::parse_file_name(path).ok_or_else(|| invalid("not a valid gate name".to_string()))?;
        let definition = std::fs::read(path).map_err(|e| invalid(e.to_string()))?;
        let header = String::from_utf8_lossy(&definition);

        let mut triggers: Vec<DeclaredTrigger> = Vec::new();
        for line in header_lines(&header, TRIGGER_HEADER) {
            let (trigger, description) = split_word(line);
            if !TRIGGER_NAME.as_ref().is_some_and(|re| re.is_match(trigger)) {
                return Err(invalid(format!("invalid trigger name {trigger:?}")));
            }
            let trigger = trigger.to_ascii_uppercase();
            if triggers.iter().any(|t| t.name == trigger) {
                return Err(invalid(format!("trigger {trigger} declared twice")));
            }
            triggers.push(DeclaredTrigger {
                name: trigger,
                description: description.to_string(),
                params: Vec::new(),
            });
        }
        if triggers.is_empty() {
            return Err(invalid("declares no triggers".to_string()));
        }

        for line in header_lines(&header, PARAM_HEADER) {
            let (trigger, rest) = split_word(line);
            let (param, rest) = split_word(rest);
            let (kind, description) = split_word(rest);
            let required = match kind {
                "required" => true,
                "optional" => false,
                other => {
                    return Err(invalid(format!(
                        "parameter {param:?} must be required or optional, got {other:?}"
                    )))
                }
            };
            let declared = triggers
                .iter_mut()
                .find(|t| t.name.eq_ignore_ascii_case(trigger))
                .ok_or_else(|| invalid(format!("parameter {param} for undeclared trigger {trigger}")))?;
            declared.params.push(ParamSpec::declared(param, description, required));
        }

        let description = header_lines(&header, GATE_HEADER)
            .next()
            .unwrap_or_default()
            .to_string();
        let script = Self {
            name: name.clone(),
            path: path.to_path_buf(),
        };
        let gate = triggers
            .into_iter()
            .fold(Gate::new(name, description), |gate, trigger| gate.with_trigger(trigger));
        Ok(gate.with_script(script))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn failed(&self, message: impl Into<String>) -> GateError {
        GateError::ScriptFailed {
            gate: self.name.clone(),
            message: message.into(),
        }
    }

    /// Run the script against `facts` and return its `(trigger, detail)`
    /// lines in output order.
    pub(crate) fn run(
        &self,
        facts: &FactView<'_>,
        params: &TriggerParams,
    ) -> Result<Vec<(String, String)>, GateError> {
        let facts_dir = tempfile::Builder::new()
            .prefix("imgscan-gate-")
            .tempdir()
            .map_err(|e| self.failed(format!("creating facts dir: {e}")))?;
        for (category, set) in facts.categories() {
            if !is_plain_name(category) {
                tracing::debug!(gate = %self.name, category, "category not passed to gate script");
                continue;
            }
            std::fs::write(facts_dir.path().join(category), render_kv(set))
                .map_err(|e| self.failed(format!("writing category {category}: {e}")))?;
        }

        let mut cmd = Command::new(&self.path);
        cmd.arg(facts.image_id().as_str())
            .arg(&self.name)
            .arg(facts_dir.path())
            .current_dir(facts_dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in params.iter() {
            cmd.env(param_env_var(key), value);
        }

        let output = cmd
            .output()
            .map_err(|e| self.failed(format!("launch failed: {e}")))?;
        if !output.stderr.is_empty() {
            tracing::debug!(
                gate = %self.name,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "gate script stderr"
            );
        }
        match output.status.code() {
            Some(0) => {}
            Some(code) => return Err(self.failed(format!("exited with code {code}"))),
            None => return Err(self.failed("terminated by a signal")),
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|_| self.failed("output is not valid UTF-8"))?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                let (trigger, detail) = split_word(line);
                (trigger.to_string(), detail.to_string())
            })
            .collect())
    }
}

/// A gate for every executable, validly named file in `dir`, in file name
/// order.
pub(crate) fn discover(dir: &Path) -> Result<Vec<Gate>, ConfigError> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| ConfigError::ValidationFailed {
        field: CONFIG_FIELD.to_string(),
        message: format!("{}: {e}", dir.display()),
    })?;
    let mut paths: Vec<_> = read_dir
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut gates = Vec::new();
    for path in paths {
        if ScriptGate::parse_file_name(&path).is_none() {
            tracing::debug!(path = %path.display(), "ignoring non-gate file in gate script dir");
            continue;
        }
        if !is_executable(&path) {
            tracing::warn!(path = %path.display(), "gate script is not executable, skipping");
            continue;
        }
        gates.push(ScriptGate::load(&path)?);
    }
    Ok(gates)
}

/// First whitespace-separated word and the trimmed rest.
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

/// A trigger declared in a script header. Its findings come from the
/// script's output, so `check` never reports anything itself.
struct DeclaredTrigger {
    name: String,
    description: String,
    params: Vec<ParamSpec>,
}

impl Trigger for DeclaredTrigger {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    fn requires(&self) -> &[&'static str] {
        &[]
    }

    fn check(&self, _facts: &FactView<'_>, _params: &TriggerParams) -> Vec<String> {
        Vec::new()
    }
}
