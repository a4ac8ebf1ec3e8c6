//! `analyzer_meta`: distro detection plus the image's Dockerfile.

use std::path::Path;
use std::sync::LazyLock;

use imgscan_core::constants::{CATEGORY_ANALYZER_META, CATEGORY_DOCKERFILE, UNKNOWN_DISTRO_VERSION};
use imgscan_core::errors::StageError;
use imgscan_core::types::{Distro, FactMap, FactSet};
use regex::Regex;

use super::read_image_file;
use crate::inventory::FileInventory;
use crate::pipeline::analyzer::{Analyzer, StageContext, StageOutput};

const DEFINITION: &[u8] =
    b"analyzer_meta/1 os-release lsb-release alpine-release redhat-release debian_version dockerfile";

/// Fact key the Dockerfile contents are stored under.
pub const DOCKERFILE_KEY: &str = "Dockerfile";

static VERSION_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)*").ok());

pub struct AnalyzerMeta;

impl Analyzer for AnalyzerMeta {
    fn name(&self) -> &str {
        "analyzer_meta"
    }

    fn priority(&self) -> u32 {
        1
    }

    fn outputs(&self) -> Vec<String> {
        vec![CATEGORY_ANALYZER_META.to_string(), CATEGORY_DOCKERFILE.to_string()]
    }

    fn definition(&self) -> &[u8] {
        DEFINITION
    }

    fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, StageError> {
        let distro = detect_distro(ctx.root, ctx.inventory);
        tracing::debug!(image_id = %ctx.image_id, distro = %distro.name, version = %distro.version, "distro detected");

        let mut out = FactMap::new();
        out.insert(CATEGORY_ANALYZER_META.to_string(), distro.to_meta());

        let mut dockerfile = FactSet::new();
        if let Some(contents) = ctx.dockerfile.filter(|c| !c.is_empty()) {
            dockerfile.insert(DOCKERFILE_KEY.to_string(), contents.to_string());
        }
        out.insert(CATEGORY_DOCKERFILE.to_string(), dockerfile);
        Ok(out)
    }
}

/// First release file that yields a distro wins; `Unknown`/`0` otherwise.
pub fn detect_distro(root: &Path, inventory: &FileInventory) -> Distro {
    let read = |path: &str| {
        read_image_file(root, inventory, path).map(|b| String::from_utf8_lossy(&b).into_owned())
    };

    read("/etc/os-release")
        .and_then(|c| from_os_release(&c))
        .or_else(|| read("/etc/lsb-release").and_then(|c| from_lsb_release(&c)))
        .or_else(|| read("/etc/alpine-release").and_then(|c| single_line("alpine", &c)))
        .or_else(|| read("/etc/redhat-release").and_then(|c| from_redhat_release(&c)))
        .or_else(|| read("/etc/debian_version").and_then(|c| single_line("debian", &c)))
        .unwrap_or_else(Distro::unknown)
}

fn shell_vars(content: &str) -> impl Iterator<Item = (&str, &str)> {
    content.lines().filter_map(|line| {
        let line = line.trim();
        if line.starts_with('#') {
            return None;
        }
        let (key, value) = line.split_once('=')?;
        Some((key.trim(), value.trim().trim_matches(|c| c == '"' || c == '\'')))
    })
}

fn from_os_release(content: &str) -> Option<Distro> {
    let (mut name, mut version, mut like) = (None, None, None);
    for (key, value) in shell_vars(content) {
        match key {
            "ID" => name = Some(value.to_string()),
            "VERSION_ID" => version = Some(value.to_string()),
            "ID_LIKE" => like = Some(value.split_whitespace().collect::<Vec<_>>().join(",")),
            _ => {}
        }
    }
    let name = name.filter(|n| !n.is_empty())?;
    Some(Distro {
        like: like.filter(|l| !l.is_empty()).unwrap_or_else(|| name.clone()),
        version: version
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| UNKNOWN_DISTRO_VERSION.to_string()),
        name,
    })
}

fn from_lsb_release(content: &str) -> Option<Distro> {
    let (mut name, mut version) = (None, None);
    for (key, value) in shell_vars(content) {
        match key {
            "DISTRIB_ID" => name = Some(value.to_lowercase()),
            "DISTRIB_RELEASE" => version = Some(value.to_string()),
            _ => {}
        }
    }
    let name = name.filter(|n| !n.is_empty())?;
    Some(Distro {
        like: name.clone(),
        version: version.unwrap_or_else(|| UNKNOWN_DISTRO_VERSION.to_string()),
        name,
    })
}

fn from_redhat_release(content: &str) -> Option<Distro> {
    let line = content.lines().next()?.trim();
    let name = line.split_whitespace().next()?.to_lowercase();
    let name = match name.as_str() {
        "red" => "rhel".to_string(),
        _ => name,
    };
    let version = VERSION_NUMBER
        .as_ref()
        .and_then(|re| re.find(line))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN_DISTRO_VERSION.to_string());
    Some(Distro {
        name,
        version,
        like: "rhel".to_string(),
    })
}

fn single_line(name: &str, content: &str) -> Option<Distro> {
    let version = content.lines().next()?.trim();
    if version.is_empty() {
        return None;
    }
    Some(Distro {
        name: name.to_string(),
        version: version.to_string(),
        like: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_release() {
        let d = from_os_release("NAME=\"Ubuntu\"\nID=ubuntu\nID_LIKE=debian\nVERSION_ID=\"22.04\"\n").unwrap();
        assert_eq!((d.name.as_str(), d.version.as_str(), d.like.as_str()), ("ubuntu", "22.04", "debian"));

        let d = from_os_release("ID=\"centos\"\nID_LIKE=\"rhel fedora\"\nVERSION_ID=\"7\"").unwrap();
        assert_eq!(d.like, "rhel,fedora");

        let d = from_os_release("ID=alpine\n").unwrap();
        assert_eq!((d.version.as_str(), d.like.as_str()), ("0", "alpine"));

        assert!(from_os_release("NAME=nothing\n").is_none());
    }

    #[test]
    fn redhat_release() {
        let d = from_redhat_release("CentOS Linux release 7.9.2009 (Core)\n").unwrap();
        assert_eq!((d.name.as_str(), d.version.as_str()), ("centos", "7.9.2009"));
        let d = from_redhat_release("Red Hat Enterprise Linux Server release 6.10 (Santiago)").unwrap();
        assert_eq!(d.name, "rhel");
    }

    #[test]
    fn lsb_and_single_line() {
        let d = from_lsb_release("DISTRIB_ID=Ubuntu\nDISTRIB_RELEASE=14.04\n").unwrap();
        assert_eq!((d.name.as_str(), d.version.as_str()), ("ubuntu", "14.04"));
        let d = single_line("debian", "10.13\n").unwrap();
        assert_eq!(d.version, "10.13");
        assert!(single_line("alpine", "\n").is_none());
    }
}
