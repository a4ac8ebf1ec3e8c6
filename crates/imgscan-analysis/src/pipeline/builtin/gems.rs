//! `gem_package_list`: installed Ruby gems, read from their gemspecs.

use std::sync::LazyLock;

use imgscan_core::constants::CATEGORY_GEMS;
use imgscan_core::errors::StageError;
use imgscan_core::types::{FactMap, FactSet};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::read_image_file;
use crate::pipeline::analyzer::{Analyzer, StageContext, StageOutput};

const DEFINITION: &[u8] = b"gem_package_list/1 .*specifications.*\\.gemspec$";

static GEMSPEC_PATH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r".*specifications.*\.gemspec$").ok());

/// `<var>.<attr> = <value>` inside a `Gem::Specification.new` block.
static ASSIGNMENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*\w+\.(\w+)\s*=\s*(.+?)\s*$").ok());

static STRING_LITERAL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""([^"]*)"|'([^']*)'"#).ok());

/// Stored as the JSON value of one `pkgs.gems` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemRecord {
    pub name: String,
    pub versions: Vec<String>,
    pub latest: String,
    pub sourcepkg: String,
    pub lics: Vec<String>,
    pub origins: Vec<String>,
    pub files: Vec<String>,
}

pub struct GemPackageList;

impl Analyzer for GemPackageList {
    fn name(&self) -> &str {
        "gem_package_list"
    }

    fn priority(&self) -> u32 {
        12
    }

    fn outputs(&self) -> Vec<String> {
        vec![CATEGORY_GEMS.to_string()]
    }

    fn definition(&self) -> &[u8] {
        DEFINITION
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError> {
        let Some(pattern) = GEMSPEC_PATH.as_ref() else {
            return Err(StageError::Failed {
                stage: self.name().to_string(),
                code: 1,
            });
        };

        let mut gems = FactSet::new();
        for entry in ctx.inventory.files().filter(|e| pattern.is_match(&e.path)) {
            let Some(bytes) = read_image_file(ctx.root, ctx.inventory, &entry.path) else {
                tracing::warn!(path = %entry.path, "gemspec listed in inventory but unreadable");
                continue;
            };
            let Some(record) = parse_gemspec(&String::from_utf8_lossy(&bytes)) else {
                tracing::warn!(path = %entry.path, "found gemspec but cannot parse it");
                continue;
            };
            let json = serde_json::to_string(&record).map_err(|e| StageError::InvalidOutput {
                stage: self.name().to_string(),
                category: CATEGORY_GEMS.to_string(),
                message: e.to_string(),
            })?;
            gems.insert(entry.path.clone(), json);
        }

        let mut out = FactMap::new();
        out.insert(CATEGORY_GEMS.to_string(), gems);
        Ok(out)
    }
}

/// Pull name, version, licenses, authors, homepage and files out of a
/// gemspec. `None` when no name or version can be found.
pub fn parse_gemspec(content: &str) -> Option<GemRecord> {
    let assignment = ASSIGNMENT.as_ref()?;
    let mut name = None;
    let mut version = None;
    let mut sourcepkg = String::new();
    let mut lics = Vec::new();
    let mut origins = Vec::new();
    let mut files = Vec::new();

    for line in content.lines() {
        let Some(caps) = assignment.captures(line) else {
            continue;
        };
        let (Some(attr), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let values = string_literals(value.as_str());
        match attr.as_str() {
            "name" => name = values.into_iter().next(),
            "version" => version = values.into_iter().next(),
            "license" | "licenses" => lics.extend(values),
            "authors" | "author" => origins.extend(values),
            "homepage" => sourcepkg = values.into_iter().next().unwrap_or_default(),
            "files" => files.extend(values),
            _ => {}
        }
    }

    let name = name.filter(|n| !n.is_empty())?;
    let version = version.filter(|v| !v.is_empty())?;
    Some(GemRecord {
        name,
        versions: vec![version.clone()],
        latest: version,
        sourcepkg,
        lics,
        origins,
        files,
    })
}

fn string_literals(value: &str) -> Vec<String> {
    let Some(re) = STRING_LITERAL.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(value)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}
