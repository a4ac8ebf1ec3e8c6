//! External executable stages.
//!
//! A script named `NN_name` in the configured directory becomes stage
//! `name` with priority `NN`. It is run without a shell as
//! `script <imageId> <unpackedRoot> <outputDir>` with each stage parameter
//! exported as `IMGSCAN_PARAM_<KEY>`. Exit code 0 means success; each
//! declared output category is read back from `<outputDir>/<category>` as a
//! `key value` per line file.
//!
//! Header comments declare the contract:
//!
//! ```text
//! # imgscan-outputs: pkgs.npms files.world_writable
//! # imgscan-depends: analyzer_meta
//! ```
//!
//! Without an outputs header the stage's only output is a category named
//! after the stage.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use imgscan_core::errors::{ConfigError, StageError};
use imgscan_core::types::facts::parse_kv;
use imgscan_core::types::FactMap;
use regex::Regex;

use super::analyzer::{Analyzer, StageContext, StageOutput};

static SCRIPT_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d+)_([A-Za-z0-9_.-]+)$").ok());

const OUTPUTS_HEADER: &str = "imgscan-outputs:";
const DEPENDS_HEADER: &str = "imgscan-depends:";
const PARAM_ENV_PREFIX: &str = "IMGSCAN_PARAM_";
const OUTPUT_DIR: &str = "output";

#[derive(Debug, Clone)]
pub struct ScriptAnalyzer {
    name: String,
    priority: u32,
    path: PathBuf,
    outputs: Vec<String>,
    depends_on: Vec<String>,
    definition: Vec<u8>,
}

impl ScriptAnalyzer {
    /// `(priority, name)` from an `NN_name` file name.
    pub fn parse_file_name(path: &Path) -> Option<(u32, String)> {
        let file_name = path.file_name()?.to_str()?;
        let re = SCRIPT_NAME.as_ref()?;
        let caps = re.captures(file_name)?;
        let priority = caps.get(1)?.as_str().parse().ok()?;
        Some((priority, caps.get(2)?.as_str().to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let (priority, name) =
            Self::parse_file_name(path).ok_or_else(|| ConfigError::ValidationFailed {
                field: "pipeline.script_dir".to_string(),
                message: format!("{} is not named NN_name", path.display()),
            })?;
        let definition = std::fs::read(path).map_err(|e| ConfigError::ValidationFailed {
            field: "pipeline.script_dir".to_string(),
            message: format!("{}: {e}", path.display()),
        })?;

        let header = String::from_utf8_lossy(&definition);
        let mut outputs = header_list(&header, OUTPUTS_HEADER);
        if outputs.is_empty() {
            outputs.push(name.clone());
        }
        if let Some(bad) = outputs.iter().find(|c| !is_plain_name(c)) {
            return Err(ConfigError::ValidationFailed {
                field: "pipeline.script_dir".to_string(),
                message: format!("{}: output category {bad:?} is not a plain file name", path.display()),
            });
        }
        let depends_on = header_list(&header, DEPENDS_HEADER);

        Ok(Self {
            name,
            priority,
            path: path.to_path_buf(),
            outputs,
            depends_on,
            definition,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_outputs(&self, output_dir: &Path) -> Result<FactMap, StageError> {
        let mut facts = FactMap::new();
        for category in &self.outputs {
            let file = output_dir.join(category);
            let content = match std::fs::read_to_string(&file) {
                Ok(c) => c,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StageError::InvalidOutput {
                        stage: self.name.clone(),
                        category: category.clone(),
                        message: e.to_string(),
                    })
                }
            };
            let set = parse_kv(&content).map_err(|line| StageError::InvalidOutput {
                stage: self.name.clone(),
                category: category.clone(),
                message: format!("line {line} has an empty key"),
            })?;
            facts.insert(category.clone(), set);
        }

        if let Ok(entries) = std::fs::read_dir(output_dir) {
            for entry in entries.flatten() {
                let file_name = entry.file_name().to_string_lossy().into_owned();
                if !self.outputs.contains(&file_name) {
                    tracing::debug!(stage = %self.name, file = %file_name, "ignoring undeclared output file");
                }
            }
        }
        Ok(facts)
    }
}

impl Analyzer for ScriptAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn outputs(&self) -> Vec<String> {
        self.outputs.clone()
    }

    fn depends_on(&self) -> Vec<String> {
        self.depends_on.clone()
    }

    fn definition(&self) -> &[u8] {
        &self.definition
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError> {
        let output_dir = ctx.work_dir.join(OUTPUT_DIR);
        std::fs::create_dir_all(&output_dir).map_err(|source| StageError::Io {
            stage: self.name.clone(),
            source,
        })?;

        let mut cmd = Command::new(&self.path);
        cmd.arg(ctx.image_id.as_str())
            .arg(ctx.root)
            .arg(&output_dir)
            .current_dir(ctx.work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in ctx.params {
            cmd.env(param_env_var(key), value);
        }

        let output = cmd.output().map_err(|e| StageError::Launch {
            stage: self.name.clone(),
            message: e.to_string(),
        })?;
        if !output.stderr.is_empty() {
            tracing::debug!(
                stage = %self.name,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "script stage stderr"
            );
        }

        // A signal-terminated process has no exit code.
        let code = output.status.code().unwrap_or(-1);
        if code != 0 {
            return Err(StageError::Failed {
                stage: self.name.clone(),
                code,
            });
        }
        self.read_outputs(&output_dir)
    }
}

/// `IMGSCAN_PARAM_` + the key uppercased, anything outside `[A-Z0-9]` as `_`.
pub fn param_env_var(key: &str) -> String {
    let mut var = String::with_capacity(PARAM_ENV_PREFIX.len() + key.len());
    var.push_str(PARAM_ENV_PREFIX);
    var.extend(key.chars().map(|c| {
        if c.is_ascii_alphanumeric() {
            c.to_ascii_uppercase()
        } else {
            '_'
        }
    }));
    var
}

/// Text after `marker` on every `# marker ...` comment line.
pub(crate) fn header_lines<'s>(script: &'s str, marker: &'s str) -> impl Iterator<Item = &'s str> {
    script
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix('#'))
        .filter_map(move |comment| comment.trim_start().strip_prefix(marker))
        .map(str::trim)
}

fn header_list(script: &str, marker: &str) -> Vec<String> {
    header_lines(script, marker)
        .flat_map(|rest| rest.split(|c: char| c.is_whitespace() || c == ','))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// A single path component: no separators, not `.` or `..`.
pub(crate) fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

pub(crate) fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names() {
        assert_eq!(
            ScriptAnalyzer::parse_file_name(Path::new("/m/analyzers/12_gem_list")),
            Some((12, "gem_list".to_string()))
        );
        assert_eq!(ScriptAnalyzer::parse_file_name(Path::new("README.md")), None);
        assert_eq!(ScriptAnalyzer::parse_file_name(Path::new("12-gem")), None);
    }

    #[test]
    fn env_var_names() {
        assert_eq!(param_env_var("max-size"), "IMGSCAN_PARAM_MAX_SIZE");
        assert_eq!(param_env_var("Mode"), "IMGSCAN_PARAM_MODE");
    }

    #[test]
    fn headers() {
        let script = "#!/bin/sh\n# imgscan-outputs: a.b, c\n# imgscan-depends: analyzer_meta\necho hi\n";
        assert_eq!(header_list(script, OUTPUTS_HEADER), vec!["a.b", "c"]);
        assert_eq!(header_list(script, DEPENDS_HEADER), vec!["analyzer_meta"]);
        assert!(header_list("echo # imgscan-outputs: x", OUTPUTS_HEADER).is_empty());
    }

    #[test]
    fn plain_names() {
        assert!(is_plain_name("pkgs.npms"));
        assert!(!is_plain_name("../x"));
        assert!(!is_plain_name("a/b"));
        assert!(!is_plain_name(".."));
        assert!(!is_plain_name(""));
    }

    #[test]
    fn output_categories_must_stay_in_the_output_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("20_escape");
        std::fs::write(&path, "#!/bin/sh\n# imgscan-outputs: ok ../x\n").unwrap();
        let err = ScriptAnalyzer::from_path(&path).unwrap_err();
        assert!(
            matches!(err, ConfigError::ValidationFailed { ref message, .. } if message.contains("../x"))
        );
    }
}
