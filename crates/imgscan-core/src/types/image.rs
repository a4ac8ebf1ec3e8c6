//! Image records: manifest, tags, family tree, detected distro.

use serde::{Deserialize, Serialize};

use super::facts::FactSet;
use super::identifiers::ImageId;
use crate::constants::{
    META_DISTRO, META_DISTRO_VERSION, META_LIKE_DISTRO, UNKNOWN_DISTRO, UNKNOWN_DISTRO_VERSION,
};

/// Descriptive attributes recorded when an image is first saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Human name, usually `repo:tag`.
    pub human_name: Option<String>,
    pub short_id: String,
    pub parent_id: Option<String>,
    pub size_bytes: u64,
    /// User-supplied image type ("base", "oldanchorbase", ...).
    pub user_type: Option<String>,
}

/// Distro detected from the root filesystem by the metadata stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distro {
    pub name: String,
    pub version: String,
    pub like: String,
}

impl Distro {
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN_DISTRO.to_string(),
            version: UNKNOWN_DISTRO_VERSION.to_string(),
            like: UNKNOWN_DISTRO.to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.name == UNKNOWN_DISTRO
    }

    /// Read the distro out of an `analyzer_meta` fact set.
    pub fn from_meta(meta: &FactSet) -> Self {
        let unknown = Self::unknown();
        Self {
            name: meta.get(META_DISTRO).cloned().unwrap_or(unknown.name),
            version: meta
                .get(META_DISTRO_VERSION)
                .cloned()
                .unwrap_or(unknown.version),
            like: meta.get(META_LIKE_DISTRO).cloned().unwrap_or(unknown.like),
        }
    }

    /// Write the distro as an `analyzer_meta` fact set.
    pub fn to_meta(&self) -> FactSet {
        let mut meta = FactSet::new();
        meta.insert(META_DISTRO.to_string(), self.name.clone());
        meta.insert(META_DISTRO_VERSION.to_string(), self.version.clone());
        meta.insert(META_LIKE_DISTRO.to_string(), self.like.clone());
        meta
    }
}

/// Everything the store keeps about an image besides its facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub image_id: ImageId,
    pub manifest: Manifest,
    /// Tags currently pointing at this image.
    #[serde(default)]
    pub current_tags: Vec<String>,
    /// Every tag ever seen for this image, current ones included.
    #[serde(default)]
    pub all_tags: Vec<String>,
    /// Ancestor ids, earliest first.
    #[serde(default)]
    pub family_tree: Vec<String>,
}

impl ImageRecord {
    /// A bare record with only the identifier filled in.
    pub fn new(image_id: ImageId) -> Self {
        let manifest = Manifest {
            short_id: image_id.short_id().to_string(),
            ..Default::default()
        };
        Self {
            image_id,
            manifest,
            current_tags: Vec::new(),
            all_tags: Vec::new(),
            family_tree: Vec::new(),
        }
    }

    /// Earliest ancestor, or the image itself when it has no recorded family.
    pub fn base_id(&self) -> &str {
        self.family_tree
            .first()
            .map(String::as_str)
            .unwrap_or_else(|| self.image_id.as_str())
    }
}
